//! The instruction handler and the multi-pass engine.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::context::Context;
use crate::error::{ActionError, Error};
use crate::eval::evaluate;
use crate::grammar::{self, Grammar};
use crate::output::{AssemblyResult, InstructionOutput};
use crate::registry::registry;
use crate::value::Value;

type GrammarKey = (Vec<&'static str>, Vec<String>);

/// The assembler: drives the composed grammar over source lines and runs
/// passes until the symbol table reaches a fixed point.
pub struct Assembler {
    /// The runtime assembly state. Snapshotted and restored around passes.
    pub context: Context,
    grammar: Rc<Grammar>,
    grammar_cache: HashMap<GrammarKey, Rc<Grammar>>,
    verbosity: u8,
}

impl Assembler {
    /// Create an assembler with the given verbosity, initial mode set, and
    /// available-extension subset (defaults to every registered extension).
    pub fn new(
        verbosity: u8,
        default_modes: Option<BTreeSet<String>>,
        available_extensions: Option<BTreeSet<String>>,
    ) -> Result<Self, Error> {
        let catalogue = registry();
        let available = available_extensions
            .unwrap_or_else(|| catalogue.iter().map(|e| e.strid.to_string()).collect());
        let mut context = Context::fresh(available);
        context.enabled_extensions = catalogue
            .iter()
            .filter(|e| e.default_on && context.available_extensions.contains(e.strid))
            .collect();

        for extension in context.enabled_extensions.clone() {
            if let Some(init) = extension.init {
                init(&mut context);
            }
        }
        context.modes = default_modes.unwrap_or_default();

        let mut assembler = Assembler {
            context,
            grammar: Rc::new(unloaded_grammar()),
            grammar_cache: HashMap::new(),
            verbosity,
        };
        assembler.reload_extensions()?;
        Ok(assembler)
    }

    /// The configured verbosity level.
    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Recompute the default operand size and recompose the grammar for the
    /// current enabled extensions and modes. Compositions are cached per
    /// (extension set, mode set).
    pub fn reload_extensions(&mut self) -> Result<(), Error> {
        self.set_default_size();
        let key: GrammarKey = (
            self.context.enabled_extensions.iter().map(|e| e.strid).collect(),
            self.context.modes.iter().cloned().collect(),
        );
        if let Some(grammar) = self.grammar_cache.get(&key) {
            self.grammar = grammar.clone();
            return Ok(());
        }
        let grammar = Rc::new(grammar::compose(
            &self.context.enabled_extensions,
            &self.context.modes,
        )?);
        if self.verbosity >= 5 {
            tracing::debug!(grammar = %grammar, "composed grammar");
        }
        self.grammar_cache.insert(key, grammar.clone());
        self.grammar = grammar;
        Ok(())
    }

    fn set_default_size(&mut self) {
        self.context.default_size = if self.context.extension_enabled("qword_operations") {
            etca_asm::Size::QuadWord
        } else if self.context.extension_enabled("dword_operations") {
            etca_asm::Size::DoubleWord
        } else {
            etca_asm::Size::Word
        };
    }

    /// Assemble one line: parse it, run every alternative's actions, commit
    /// the chosen encoding, advance the instruction pointer.
    pub fn handle_instruction(&mut self, line: &str) -> Result<(), Error> {
        let text = strip_comment(line).trim();
        if text.is_empty() {
            return Ok(());
        }
        if self.verbosity >= 3 {
            tracing::debug!(
                extensions = ?self.context.enabled_extensions,
                modes = ?self.context.modes,
                "dispatching line"
            );
        }

        let grammar = self.grammar.clone();
        let trees = grammar::parse(&grammar, text);
        let mut results = Vec::new();
        let mut reasons = Vec::new();
        for tree in &trees {
            match evaluate(self, &grammar, tree, text) {
                Ok(value) => results.push(value),
                Err(ActionError::Reject(rejection)) => {
                    if let Some(reason) = rejection.reason {
                        reasons.push(reason);
                    }
                }
                Err(ActionError::Fatal(error)) => return Err(error),
            }
        }

        let chosen = match results.into_iter().min_by_key(Value::emitted_len) {
            Some(value) => value,
            None => {
                return Err(Error::UnknownInstruction {
                    line: line.to_string(),
                    reasons,
                })
            }
        };
        self.commit(chosen, line);
        Ok(())
    }

    /// Apply the winning alternative. Instruction-pointer moves are part of
    /// the committed value, so discarded alternatives leave no trace.
    fn commit(&mut self, value: Value, line: &str) {
        match value {
            Value::Bytes(binary) => {
                let advance = binary.len() as u64;
                self.context.output.push(InstructionOutput {
                    start_ip: self.context.full_ip,
                    binary,
                    raw_line: line.to_string(),
                });
                self.context.advance_ip(advance);
            }
            Value::SetIp(target) => self.context.set_ip(target),
            _ => {}
        }
    }

    /// Assemble a text under the current context while capturing its output:
    /// the emitted bytes are returned as one payload and the instruction
    /// pointer is restored, so the caller's emission site decides placement.
    pub fn expand_macro(&mut self, instructions: &str) -> Result<Vec<u8>, Error> {
        let saved_output = std::mem::take(&mut self.context.output);
        let saved_ip = self.context.ip();
        let mut outcome = Ok(());
        for line in instructions.lines() {
            if let Err(error) = self.handle_instruction(line) {
                outcome = Err(error);
                break;
            }
        }
        let captured = std::mem::replace(&mut self.context.output, saved_output);
        self.context.set_ip(saved_ip);
        outcome?;
        Ok(captured.into_iter().flat_map(|entry| entry.binary).collect())
    }

    /// Run one pass over the whole text. `.macro`/`.endmacro` blocks are
    /// collected textually; everything else goes through the grammar.
    pub fn single_pass(&mut self, full_text: &str) -> Result<(), Error> {
        let mut pending: Option<(String, usize, Vec<String>)> = None;
        for line in full_text.lines() {
            if self.verbosity >= 2 {
                tracing::debug!(line, "starting line");
            }
            let trimmed = line.trim_start();
            let closes = pending.is_some() && trimmed.starts_with(".endmacro");
            if closes {
                if let Some((name, argc, body)) = pending.take() {
                    self.context.known_macros.insert(
                        name,
                        crate::context::Macro {
                            argc,
                            body: body.join("\n"),
                        },
                    );
                }
            } else if let Some((_, _, body)) = pending.as_mut() {
                body.push(line.to_string());
            } else if trimmed.starts_with(".macro") {
                pending = Some(parse_macro_header(line)?);
            } else {
                self.handle_instruction(line)?;
            }
        }
        Ok(())
    }

    /// Run passes until neither missing nor changed symbols remain, restoring
    /// the starting context between passes and carrying the symbol table
    /// forward. Symbols that stay undefined over a completed pass become
    /// illegal so the next pass fails loudly instead of looping.
    pub fn n_pass(&mut self, full_text: &str) -> Result<AssemblyResult, Error> {
        let start_context = self.context.clone();
        self.single_pass(full_text)?;
        let mut pass = 1u32;
        while !self.context.missing_symbols.is_empty() || !self.context.changed_symbols.is_empty() {
            let old_missing = self.context.missing_symbols.clone();
            let old_changed = self.context.changed_symbols.clone();
            let symbols = self.context.symbols.clone();
            tracing::debug!(
                pass,
                missing = ?old_missing,
                changed = ?old_changed,
                "symbols not settled, rerunning"
            );

            self.context = start_context.clone();
            self.context.illegal_symbols = old_missing
                .iter()
                .filter(|name| !symbols.contains_key(*name))
                .cloned()
                .collect();
            self.context.symbols = symbols;
            self.reload_extensions()?;
            self.single_pass(full_text)?;
            pass += 1;

            if old_missing == self.context.missing_symbols
                && old_changed == self.context.changed_symbols
            {
                return Err(Error::StuckProgress {
                    missing: self.context.missing_symbols.clone(),
                });
            }
        }
        Ok(AssemblyResult {
            output: self.context.output.clone(),
            max_address_width: self.context.ip_mask.count_ones(),
            fill_value: 0x00,
        })
    }
}

/// Stand-in grammar used only between construction and the first
/// [`Assembler::reload_extensions`]; it recognizes nothing.
fn unloaded_grammar() -> Grammar {
    Grammar {
        start: 0,
        nt_names: vec!["instruction".to_string()],
        productions: Vec::new(),
        by_lhs: vec![Vec::new()],
        terminals: Vec::new(),
        nullable: vec![false],
    }
}

fn parse_macro_header(line: &str) -> Result<(String, usize, Vec<String>), Error> {
    let mut parts = line.split_whitespace();
    let malformed = || Error::MalformedDirective {
        line: line.to_string(),
    };
    let directive = parts.next().ok_or_else(malformed)?;
    if directive != ".macro" {
        return Err(malformed());
    }
    let name = parts.next().ok_or_else(malformed)?;
    let argc: usize = parts
        .next()
        .ok_or_else(malformed)?
        .parse()
        .map_err(|_| malformed())?;
    if parts.next().is_some() {
        return Err(malformed());
    }
    Ok((name.to_string(), argc, Vec::new()))
}

/// Cut a trailing `;` or `#` comment, quote- and char-literal-aware.
fn strip_comment(line: &str) -> &str {
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;
    for (at, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_double || in_single => escaped = true,
            '"' if !in_single => in_double = !in_double,
            '\'' if !in_double => in_single = !in_single,
            ';' | '#' if !in_double && !in_single => return &line[..at],
            _ => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_respect_quotes() {
        assert_eq!(strip_comment("add r0, r1 ; trailing"), "add r0, r1 ");
        assert_eq!(strip_comment("# full line"), "");
        assert_eq!(strip_comment(".ascii \"a;b\""), ".ascii \"a;b\"");
        assert_eq!(strip_comment(".half ';'"), ".half ';'");
        assert_eq!(strip_comment(".half '\\'' ; x"), ".half '\\'' ");
    }

    #[test]
    fn macro_headers_parse_strictly() {
        assert!(parse_macro_header(".macro put2 2").is_ok());
        assert!(parse_macro_header(".macro put2").is_err());
        assert!(parse_macro_header(".macro put2 two").is_err());
        assert!(parse_macro_header(".macro put2 2 extra").is_err());
    }
}
