//! The mutable assembly state carried between instructions.

use std::collections::{BTreeMap, BTreeSet};

use etca_asm::Size;

use crate::error::{ActionError, Rejection};
use crate::output::InstructionOutput;
use crate::registry::Extension;

/// A recorded `.macro` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    /// Declared parameter count.
    pub argc: usize,
    /// Raw body text with `{0}`, `{1}`, … placeholders.
    pub body: String,
}

/// Mutable state carried between instructions: instruction pointer, modes,
/// enabled extensions, symbols, register sizes, emitted output.
///
/// The context is deliberately a plain data bag so a pass restart can
/// deep-copy it; everything that needs behavior lives on the
/// [`Assembler`](crate::Assembler).
#[derive(Debug, Clone)]
pub struct Context {
    /// The unmasked internal instruction counter.
    pub full_ip: u64,
    /// Mask selecting the visible address bits; its population count is the
    /// address width.
    pub ip_mask: u64,
    /// Active mode flags (`prefix`, `strict`, …).
    pub modes: BTreeSet<String>,
    /// Enabled extensions, in enabling order. The order is grammar-rule
    /// priority.
    pub enabled_extensions: Vec<&'static Extension>,
    /// The extensions this run may enable.
    pub available_extensions: BTreeSet<String>,
    /// Fully-qualified symbol name → value.
    pub symbols: BTreeMap<String, i128>,
    /// Current hierarchical label scope; index `k` holds the name that
    /// established scope depth `k`.
    pub symbol_path: Vec<String>,
    /// Symbols looked up but not yet defined in this pass.
    pub missing_symbols: BTreeSet<String>,
    /// Symbols whose value changed in this pass.
    pub changed_symbols: BTreeSet<String>,
    /// Symbols that stayed undefined over a completed pass; referencing one
    /// is now a hard failure instead of a deferred zero.
    pub illegal_symbols: BTreeSet<String>,
    /// Size tag → encoded size exponent, populated by extension init hooks.
    pub register_sizes: BTreeMap<Size, u8>,
    /// Size assumed when the source spells none.
    pub default_size: Size,
    /// Committed emissions, in source order.
    pub output: Vec<InstructionOutput>,
    /// Known `.macro` templates by name.
    pub known_macros: BTreeMap<String, Macro>,
}

impl Context {
    /// A fresh context over the given available-extension set. The masked
    /// instruction pointer starts at `0x8000` in a 16-bit address space.
    pub fn fresh(available_extensions: BTreeSet<String>) -> Self {
        Context {
            full_ip: 0xFFFF_FFFF_FFFF_8000,
            ip_mask: 0xFFFF,
            modes: BTreeSet::new(),
            enabled_extensions: Vec::new(),
            available_extensions,
            symbols: BTreeMap::new(),
            symbol_path: vec![String::new()],
            missing_symbols: BTreeSet::new(),
            changed_symbols: BTreeSet::new(),
            illegal_symbols: BTreeSet::new(),
            register_sizes: BTreeMap::new(),
            default_size: Size::Word,
            output: Vec::new(),
            known_macros: BTreeMap::new(),
        }
    }

    /// The masked instruction pointer.
    pub fn ip(&self) -> u64 {
        self.full_ip & self.ip_mask
    }

    /// Set the masked instruction pointer, preserving the bits above the
    /// mask.
    pub fn set_ip(&mut self, value: u64) {
        self.full_ip = (self.full_ip & !self.ip_mask) | (value & self.ip_mask);
    }

    /// Advance the masked instruction pointer.
    pub fn advance_ip(&mut self, by: u64) {
        self.set_ip(self.ip().wrapping_add(by));
    }

    /// Whether an extension is currently enabled.
    pub fn extension_enabled(&self, strid: &str) -> bool {
        self.enabled_extensions.iter().any(|e| e.strid == strid)
    }

    /// The encoded size exponent of a tag. Rejects tags no enabled extension
    /// provides (reachable only through unusual available-extension sets).
    pub fn register_size(&self, size: Size) -> Result<u8, ActionError> {
        match self.register_sizes.get(&size) {
            Some(&exponent) => Ok(exponent),
            None => Err(Rejection::new(format!("operand size `{size}' is not enabled")).into()),
        }
    }

    /// The fully-qualified name of a symbol reference: the first `dots`
    /// entries of the scope path joined with the name.
    pub fn symbol_full_name(&self, dots: usize, name: &str) -> String {
        let mut parts: Vec<&str> = self
            .symbol_path
            .iter()
            .take(dots)
            .map(String::as_str)
            .collect();
        parts.push(name);
        parts.join(".")
    }

    /// Define or redefine a symbol, adjusting the scope path and recording a
    /// change when the value moved.
    pub fn set_symbol(&mut self, dots: usize, name: &str, value: i128) {
        while self.symbol_path.len() < dots {
            self.symbol_path.push(String::new());
        }
        let full_name = self.symbol_full_name(dots, name);
        self.symbol_path.truncate(dots);
        self.symbol_path.push(name.to_string());
        if self.symbols.get(&full_name) != Some(&value) {
            self.changed_symbols.insert(full_name.clone());
        }
        self.symbols.insert(full_name, value);
    }

    /// Resolve a symbol reference. `Ok(None)` means the symbol is deferred:
    /// it was recorded as missing and the caller should substitute zero for
    /// this pass. A symbol that stayed undefined over a whole pass rejects.
    pub fn resolve_symbol(&mut self, dots: usize, name: &str) -> Result<Option<i128>, Rejection> {
        let full_name = self.symbol_full_name(dots, name);
        if let Some(&value) = self.symbols.get(&full_name) {
            return Ok(Some(value));
        }
        if self.illegal_symbols.contains(&full_name) {
            return Err(Rejection::new(format!("Symbol {full_name} is not defined")));
        }
        tracing::trace!(symbol = %full_name, "deferred unresolved symbol");
        self.missing_symbols.insert(full_name);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context::fresh(BTreeSet::new())
    }

    #[test]
    fn ip_is_masked_over_the_full_counter() {
        let mut ctx = context();
        assert_eq!(ctx.ip(), 0x8000);
        ctx.set_ip(0x1_2345);
        assert_eq!(ctx.ip(), 0x2345);
        assert_eq!(ctx.full_ip, 0xFFFF_FFFF_FFFF_2345);
        ctx.advance_ip(2);
        assert_eq!(ctx.ip(), 0x2347);
    }

    #[test]
    fn nested_definitions_scope_and_truncate() {
        let mut ctx = context();
        ctx.set_symbol(0, "main", 0x8000);
        ctx.set_symbol(1, "loop", 0x8004);
        assert_eq!(ctx.symbols.get("main.loop"), Some(&0x8004));
        assert_eq!(ctx.resolve_symbol(1, "loop").unwrap(), Some(0x8004));

        // A new global truncates the deeper scope.
        ctx.set_symbol(0, "other", 0x9000);
        assert_eq!(ctx.symbol_path, ["other"]);
        assert_eq!(ctx.resolve_symbol(1, "loop").unwrap(), None);
        assert!(ctx.missing_symbols.contains("other.loop"));
    }

    #[test]
    fn changed_tracking_only_fires_on_movement() {
        let mut ctx = context();
        ctx.set_symbol(0, "x", 5);
        assert!(ctx.changed_symbols.contains("x"));
        ctx.changed_symbols.clear();
        ctx.set_symbol(0, "x", 5);
        assert!(ctx.changed_symbols.is_empty());
        ctx.set_symbol(0, "x", 6);
        assert!(ctx.changed_symbols.contains("x"));
    }

    #[test]
    fn illegal_symbols_reject() {
        let mut ctx = context();
        ctx.illegal_symbols.insert("ghost".to_string());
        let rejection = ctx.resolve_symbol(0, "ghost").unwrap_err();
        assert_eq!(rejection.reason.as_deref(), Some("Symbol ghost is not defined"));
    }
}
