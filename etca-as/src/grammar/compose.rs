//! The grammar composer: fuses base rules with the syntax elements of the
//! enabled extensions into one executable [`Grammar`].
//!
//! Composition walks the enabled extensions in order. The first element of a
//! category defines the category rule and its `_raw` duplicate; later
//! elements extend the category with further alternatives. Enabling order
//! therefore becomes alternative order, which the ambiguity resolver uses as
//! the tie-break.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;

use super::fragment::{self, Alternation, Item, Sequence};
use super::{Grammar, Matcher, NodeAction, NtId, Sym, TermId, Terminal};
use crate::error::Error;
use crate::registry::{Extension, SyntaxElement};

const WS_PATTERN: &str = "[ \\t]+";
const NAME_PATTERN: &str = "[A-Za-z_][A-Za-z0-9_]*";
const ESCAPED_STRING_PATTERN: &str = "\"(?:\\\\.|[^\"\\\\])*\"";

/// Compose the grammar for the given enabled extensions and active modes.
pub fn compose(enabled: &[&'static Extension], modes: &BTreeSet<String>) -> Result<Grammar, Error> {
    let mut builder = Builder::new()?;
    for extension in enabled {
        for element in extension.elements() {
            if element.predicate.matches(modes) {
                builder.add_element(element)?;
            }
        }
    }
    builder.finish()
}

struct Builder {
    nt_names: Vec<String>,
    nt_ids: HashMap<String, NtId>,
    by_lhs: Vec<Vec<usize>>,
    productions: Vec<super::Production>,
    terminals: Vec<Terminal>,
    literal_ids: HashMap<String, TermId>,
    pattern_ids: HashMap<(String, bool), TermId>,
    referenced: BTreeSet<NtId>,
    defined_categories: BTreeSet<String>,
    ws: NtId,
    start: NtId,
    synth_counter: usize,
    repetitions: Vec<(NtId, Sym)>,
}

impl Builder {
    fn new() -> Result<Self, Error> {
        let mut builder = Builder {
            nt_names: Vec::new(),
            nt_ids: HashMap::new(),
            by_lhs: Vec::new(),
            productions: Vec::new(),
            terminals: Vec::new(),
            literal_ids: HashMap::new(),
            pattern_ids: HashMap::new(),
            referenced: BTreeSet::new(),
            defined_categories: BTreeSet::new(),
            ws: 0,
            start: 0,
            synth_counter: 0,
            repetitions: Vec::new(),
        };
        let ws_term = builder.intern_pattern(WS_PATTERN, false, false)?;
        builder.ws = builder.intern_nt("__ws");
        builder.push_production(builder.ws, Vec::new(), NodeAction::Discard);
        builder.push_production(builder.ws, vec![Sym::Terminal(ws_term)], NodeAction::Discard);
        builder.start = builder.intern_nt("instruction");
        builder.referenced.insert(builder.start);
        builder.defined_categories.insert("instruction".to_string());
        Ok(builder)
    }

    fn intern_nt(&mut self, name: &str) -> NtId {
        if let Some(&id) = self.nt_ids.get(name) {
            return id;
        }
        let id = self.nt_names.len();
        self.nt_names.push(name.to_string());
        self.nt_ids.insert(name.to_string(), id);
        self.by_lhs.push(Vec::new());
        id
    }

    fn synth_nt(&mut self, kind: &str) -> NtId {
        self.synth_counter += 1;
        let name = format!("__{}{}", kind, self.synth_counter);
        self.intern_nt(&name)
    }

    fn push_production(&mut self, lhs: NtId, rhs: Vec<Sym>, node: NodeAction) {
        let id = self.productions.len();
        self.productions.push(super::Production { lhs, rhs, node });
        self.by_lhs[lhs].push(id);
    }

    fn intern_literal(&mut self, text: &str) -> TermId {
        if let Some(&id) = self.literal_ids.get(text) {
            return id;
        }
        let id = self.terminals.len();
        self.terminals.push(Terminal {
            matcher: Matcher::Literal(text.to_string()),
            keep: false,
        });
        self.literal_ids.insert(text.to_string(), id);
        id
    }

    fn intern_pattern(&mut self, pattern: &str, case_insensitive: bool, keep: bool) -> Result<TermId, Error> {
        let key = (pattern.to_string(), case_insensitive);
        if let Some(&id) = self.pattern_ids.get(&key) {
            return Ok(id);
        }
        let anchored = if case_insensitive {
            format!("\\A(?i:{pattern})")
        } else {
            format!("\\A(?:{pattern})")
        };
        let regex = Regex::new(&anchored)
            .map_err(|e| Error::Grammar(format!("invalid terminal /{pattern}/: {e}")))?;
        let id = self.terminals.len();
        self.terminals.push(Terminal {
            matcher: Matcher::Pattern(regex),
            keep,
        });
        self.pattern_ids.insert(key, id);
        Ok(id)
    }

    fn add_element(&mut self, element: &'static SyntaxElement) -> Result<(), Error> {
        let category = self.intern_nt(&element.category);
        if self.defined_categories.insert(element.category.clone()) {
            let raw = self.intern_nt(&format!("{}_raw", element.category));
            self.push_production(raw, vec![Sym::Nonterminal(category)], NodeAction::Raw);
        }
        let alternation = fragment::parse_fragment(&element.grammar).map_err(|message| {
            Error::Grammar(format!("in element {}: {message}", element.alias()))
        })?;
        for sequence in &alternation.0 {
            let rhs = self.compile_sequence(sequence)?;
            self.push_production(category, rhs, NodeAction::Element(element));
        }
        Ok(())
    }

    fn compile_sequence(&mut self, sequence: &Sequence) -> Result<Vec<Sym>, Error> {
        let mut rhs = Vec::new();
        for (index, seq_item) in sequence.0.iter().enumerate() {
            if index > 0 && !seq_item.glued {
                rhs.push(Sym::Nonterminal(self.ws));
            }
            let sym = self.compile_item(&seq_item.item)?;
            rhs.push(sym);
        }
        Ok(rhs)
    }

    fn compile_item(&mut self, item: &Item) -> Result<Sym, Error> {
        match item {
            Item::Literal(text) => Ok(Sym::Terminal(self.intern_literal(text))),
            Item::Regex {
                pattern,
                case_insensitive,
            } => Ok(Sym::Terminal(self.intern_pattern(pattern, *case_insensitive, true)?)),
            Item::Terminal(name) => match name.as_str() {
                "NAME" => Ok(Sym::Terminal(self.intern_pattern(NAME_PATTERN, false, true)?)),
                "ESCAPED_STRING" => {
                    Ok(Sym::Terminal(self.intern_pattern(ESCAPED_STRING_PATTERN, false, true)?))
                }
                _ => Err(Error::Grammar(format!("unknown terminal {name}"))),
            },
            Item::Category(name) => {
                let nt = self.intern_nt(name);
                self.referenced.insert(nt);
                Ok(Sym::Nonterminal(nt))
            }
            Item::Group(alternation) => self.compile_group(alternation, false),
            Item::Maybe(alternation) => self.compile_group(alternation, true),
            Item::Opt(inner) => {
                let sym = self.compile_item(inner)?;
                let nt = self.synth_nt("opt");
                self.push_production(nt, Vec::new(), NodeAction::Inline);
                self.push_production(nt, vec![sym], NodeAction::Inline);
                Ok(Sym::Nonterminal(nt))
            }
            Item::Star(inner) => {
                let body = self.compile_repetition(inner)?;
                let nt = self.synth_nt("star");
                self.push_production(nt, Vec::new(), NodeAction::Inline);
                self.push_production(nt, vec![Sym::Nonterminal(body)], NodeAction::Inline);
                Ok(Sym::Nonterminal(nt))
            }
            Item::Plus(inner) => {
                let body = self.compile_repetition(inner)?;
                Ok(Sym::Nonterminal(body))
            }
        }
    }

    /// `body: item | body __ws item` — whitespace between repeated items is
    /// optional, but only one nullable slot exists per gap so ambiguity does
    /// not multiply.
    fn compile_repetition(&mut self, inner: &Item) -> Result<NtId, Error> {
        let sym = self.compile_item(inner)?;
        let nt = self.synth_nt("rep");
        self.push_production(nt, vec![sym], NodeAction::Inline);
        self.push_production(
            nt,
            vec![Sym::Nonterminal(nt), Sym::Nonterminal(self.ws), sym],
            NodeAction::Inline,
        );
        self.repetitions.push((nt, sym));
        Ok(nt)
    }

    fn compile_group(&mut self, alternation: &Alternation, placeholder: bool) -> Result<Sym, Error> {
        let nt = self.synth_nt(if placeholder { "maybe" } else { "group" });
        for sequence in &alternation.0 {
            let rhs = self.compile_sequence(sequence)?;
            self.push_production(nt, rhs, NodeAction::Inline);
        }
        if placeholder {
            self.push_production(nt, Vec::new(), NodeAction::NonePlaceholder);
        }
        Ok(Sym::Nonterminal(nt))
    }

    fn finish(self) -> Result<Grammar, Error> {
        for &nt in &self.referenced {
            if self.by_lhs[nt].is_empty() {
                return Err(Error::Grammar(format!(
                    "category {} is referenced but never defined under the enabled extensions",
                    self.nt_names[nt]
                )));
            }
        }

        let nullable = compute_nullable(&self.productions, self.nt_names.len());
        for &(nt, sym) in &self.repetitions {
            if let Sym::Nonterminal(inner) = sym {
                if nullable[inner] {
                    return Err(Error::Grammar(format!(
                        "repetition over the nullable category {} in {}",
                        self.nt_names[inner], self.nt_names[nt]
                    )));
                }
            }
        }

        Ok(Grammar {
            start: self.start,
            nt_names: self.nt_names,
            productions: self.productions,
            by_lhs: self.by_lhs,
            terminals: self.terminals,
            nullable,
        })
    }
}

fn compute_nullable(productions: &[super::Production], nt_count: usize) -> Vec<bool> {
    let mut nullable = vec![false; nt_count];
    loop {
        let mut changed = false;
        for production in productions {
            if nullable[production.lhs] {
                continue;
            }
            let derives_empty = production.rhs.iter().all(|sym| match *sym {
                Sym::Terminal(_) => false,
                Sym::Nonterminal(nt) => nullable[nt],
            });
            if derives_empty {
                nullable[production.lhs] = true;
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::registry;

    fn default_extensions() -> Vec<&'static Extension> {
        registry().iter().filter(|e| e.default_on).collect()
    }

    #[test]
    fn composes_default_grammar() {
        let grammar = compose(&default_extensions(), &BTreeSet::new()).unwrap();
        assert!(!grammar.by_lhs[grammar.start].is_empty());
        assert!(grammar.nullable[grammar.nt_ids_for_test("__ws")]);
        assert!(grammar.nullable[grammar.nt_ids_for_test("size_postfix")]);
        assert!(!grammar.nullable[grammar.nt_ids_for_test("register")]);
    }

    #[test]
    fn missing_category_is_a_grammar_error() {
        // Core alone references categories only the base ISA defines.
        let core = registry().get("core").unwrap();
        let err = compose(&[core], &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, Error::Grammar(_)));
    }

    impl Grammar {
        fn nt_ids_for_test(&self, name: &str) -> NtId {
            self.nt_names.iter().position(|n| n == name).unwrap()
        }
    }
}
