//! The process-wide extension catalogue.
//!
//! Extensions are bundles of [`SyntaxElement`]s registered once at startup;
//! enabling and disabling them only affects an individual
//! [`Context`](crate::Context), never the catalogue itself.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::OnceLock;

use crate::assembler::Assembler;
use crate::context::Context;
use crate::error::ActionError;
use crate::value::Value;

/// Semantic action attached to a syntax element.
///
/// Actions are free functions over the assembler so that the context stays
/// deep-cloneable between passes.
pub type Action = fn(&mut Assembler, &[Value]) -> Result<Value, ActionError>;

/// Initialization hook run when an extension is enabled in a context.
pub type InitHook = fn(&mut Context);

/// Finite requirement map over mode names: a predicate is satisfied iff every
/// listed mode's presence in the active mode set matches the expected flag.
/// The empty predicate matches all modes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModePredicate(Vec<(String, bool)>);

impl ModePredicate {
    /// The predicate that matches every mode set.
    pub fn always() -> Self {
        ModePredicate::default()
    }

    /// Build a predicate from `(mode, required_presence)` pairs.
    pub fn from_pairs(pairs: &[(&str, bool)]) -> Self {
        ModePredicate(pairs.iter().map(|&(m, v)| (m.to_string(), v)).collect())
    }

    /// Whether the predicate is satisfied by `modes`.
    pub fn matches(&self, modes: &BTreeSet<String>) -> bool {
        self.0
            .iter()
            .all(|(mode, expected)| modes.contains(mode) == *expected)
    }
}

/// One grammar fragment plus its semantic action and mode predicate.
pub struct SyntaxElement {
    /// Short id of the owning extension.
    pub extension: &'static str,
    /// Nonterminal the fragment is grafted into.
    pub category: String,
    /// The grammar fragment source, in the fragment DSL.
    pub grammar: String,
    /// The semantic action run over the node's child values.
    pub action: Action,
    /// Stable id, unique within the owning extension.
    pub strid: String,
    /// Mode predicate gating parse visibility.
    pub predicate: ModePredicate,
}

impl SyntaxElement {
    /// The alias this element's rule carries in the composed grammar.
    pub fn alias(&self) -> String {
        format!("{}__{}", self.extension, self.strid)
    }
}

impl fmt::Debug for SyntaxElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxElement")
            .field("extension", &self.extension)
            .field("category", &self.category)
            .field("grammar", &self.grammar)
            .field("strid", &self.strid)
            .field("predicate", &self.predicate)
            .finish()
    }
}

/// A named bundle of syntax elements activated together, usually mapped to a
/// CPU feature bit.
pub struct Extension {
    /// CPUID feature bit, when the extension corresponds to one.
    pub cpuid: Option<u32>,
    /// Short id used by `.extension` and in composed-grammar aliases.
    pub strid: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Whether a fresh context enables this extension automatically.
    pub default_on: bool,
    /// Hook run when the extension is enabled in a context.
    pub init: Option<InitHook>,
    elements: Vec<SyntaxElement>,
    ids: BTreeSet<String>,
}

impl Extension {
    /// Create an extension; it still has to be put into the [`Registry`].
    pub fn new(cpuid: Option<u32>, strid: &'static str, name: &'static str, default_on: bool) -> Self {
        Extension {
            cpuid,
            strid,
            name,
            default_on,
            init: None,
            elements: Vec::new(),
            ids: BTreeSet::new(),
        }
    }

    /// Attach the enable-time initialization hook.
    pub fn set_init(&mut self, init: InitHook) {
        self.init = Some(init);
    }

    /// Register a syntax element under `category`, visible in every mode.
    pub fn register_syntax(&mut self, category: &str, grammar: &str, func: &str, action: Action) {
        self.register_syntax_in_modes(category, grammar, &[], func, action);
    }

    /// Register a syntax element gated by a mode predicate.
    pub fn register_syntax_in_modes(
        &mut self,
        category: &str,
        grammar: &str,
        modes: &[(&str, bool)],
        func: &str,
        action: Action,
    ) {
        let mut counter = 0usize;
        let strid = loop {
            let candidate = format!("{func}_{counter}");
            if !self.ids.contains(&candidate) {
                break candidate;
            }
            counter += 1;
        };
        self.ids.insert(strid.clone());
        self.elements.push(SyntaxElement {
            extension: self.strid,
            category: category.to_string(),
            grammar: grammar.to_string(),
            action,
            strid,
            predicate: ModePredicate::from_pairs(modes),
        });
    }

    /// Shorthand for an `instruction`-category element.
    pub fn inst(&mut self, grammar: &str, func: &str, action: Action) {
        self.register_syntax("instruction", grammar, func, action);
    }

    /// Shorthand for a mode-gated `instruction`-category element.
    pub fn inst_in_modes(&mut self, grammar: &str, modes: &[(&str, bool)], func: &str, action: Action) {
        self.register_syntax_in_modes("instruction", grammar, modes, func, action);
    }

    /// Shorthand for a `register`-category element.
    pub fn reg(&mut self, grammar: &str, func: &str, action: Action) {
        self.register_syntax("register", grammar, func, action);
    }

    /// Shorthand for a mode-gated `register`-category element.
    pub fn reg_in_modes(&mut self, grammar: &str, modes: &[(&str, bool)], func: &str, action: Action) {
        self.register_syntax_in_modes("register", grammar, modes, func, action);
    }

    /// The elements in registration order.
    pub fn elements(&self) -> &[SyntaxElement] {
        &self.elements
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Extension: {} {:?}>", self.strid, self.name)
    }
}

/// The catalogue of compiled-in extensions.
#[derive(Debug, Default)]
pub struct Registry {
    extensions: Vec<Extension>,
    by_strid: HashMap<&'static str, usize>,
}

impl Registry {
    /// Add an extension. Duplicate short ids are registration bugs.
    pub fn register(&mut self, extension: Extension) {
        assert!(
            !self.by_strid.contains_key(extension.strid),
            "duplicate extension strid {:?}",
            extension.strid
        );
        self.by_strid.insert(extension.strid, self.extensions.len());
        self.extensions.push(extension);
    }

    /// Look an extension up by short id.
    pub fn get(&self, strid: &str) -> Option<&Extension> {
        self.by_strid.get(strid).map(|&index| &self.extensions[index])
    }

    /// All extensions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter()
    }
}

/// The process-wide catalogue, built once on first use from the compiled-in
/// extension modules.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = Registry::default();
        crate::extensions::register_all(&mut registry);
        registry
    })
}

/// Render a regex alternation matching any of `names`, longest first so that
/// leftmost-first matching prefers the longest mnemonic.
pub fn one_of<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut names: Vec<&str> = names.into_iter().collect();
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));
    let body: Vec<String> = names.iter().map(|name| regex::escape(name)).collect();
    format!("({})", body.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_predicates_filter() {
        let mut modes = BTreeSet::new();
        assert!(ModePredicate::always().matches(&modes));

        let needs_prefix = ModePredicate::from_pairs(&[("prefix", true)]);
        let bans_strict = ModePredicate::from_pairs(&[("strict", false)]);
        assert!(!needs_prefix.matches(&modes));
        assert!(bans_strict.matches(&modes));

        modes.insert("prefix".to_string());
        modes.insert("strict".to_string());
        assert!(needs_prefix.matches(&modes));
        assert!(!bans_strict.matches(&modes));
    }

    #[test]
    fn stable_ids_count_up() {
        fn noop(_: &mut Assembler, _: &[Value]) -> Result<Value, ActionError> {
            Ok(Value::None)
        }
        let mut ext = Extension::new(None, "t", "Test", false);
        ext.inst("\"a\"", "rule", noop);
        ext.inst("\"b\"", "rule", noop);
        let ids: Vec<&str> = ext.elements().iter().map(|e| e.strid.as_str()).collect();
        assert_eq!(ids, ["rule_0", "rule_1"]);
    }

    #[test]
    fn one_of_prefers_longest() {
        assert_eq!(one_of(["st", "store"]), "(store|st)");
        assert_eq!(one_of(["mp", ""]), "(mp|)");
    }
}
