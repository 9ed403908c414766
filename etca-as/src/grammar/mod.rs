//! Grammar composition and parsing.
//!
//! [`compose`] fuses the base rules with the syntax elements of the enabled
//! extensions into a [`Grammar`]; [`earley::parse`] runs that grammar over a
//! single source line and enumerates every parse tree.

mod compose;
mod earley;
pub mod fragment;

pub use compose::compose;
pub use earley::{parse, Tree};

use std::fmt;

use regex::Regex;

use crate::registry::SyntaxElement;

/// Index of a nonterminal in a [`Grammar`].
pub type NtId = usize;
/// Index of a terminal in a [`Grammar`].
pub type TermId = usize;
/// Index of a production in a [`Grammar`].
pub type ProdId = usize;

/// A grammar symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sym {
    /// Terminal reference.
    Terminal(TermId),
    /// Nonterminal reference.
    Nonterminal(NtId),
}

/// How a production's node surfaces during semantic evaluation.
#[derive(Clone, Copy)]
pub enum NodeAction {
    /// Run the owning syntax element's action over the child values.
    Element(&'static SyntaxElement),
    /// Yield the raw source slice covered by the node, without evaluating
    /// children.
    Raw,
    /// Splice the child values into the parent's list.
    Inline,
    /// Contribute a single `None` placeholder (empty `[ ... ]` optional).
    NonePlaceholder,
    /// Drop the node entirely (whitespace).
    Discard,
}

impl fmt::Debug for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAction::Element(element) => write!(f, "Element({})", element.alias()),
            NodeAction::Raw => write!(f, "Raw"),
            NodeAction::Inline => write!(f, "Inline"),
            NodeAction::NonePlaceholder => write!(f, "NonePlaceholder"),
            NodeAction::Discard => write!(f, "Discard"),
        }
    }
}

/// One production of the composed grammar.
#[derive(Debug)]
pub struct Production {
    /// Left-hand side nonterminal.
    pub lhs: NtId,
    /// Right-hand side symbols.
    pub rhs: Vec<Sym>,
    /// Semantic role of nodes built from this production.
    pub node: NodeAction,
}

/// How a terminal matches input.
#[derive(Debug)]
pub enum Matcher {
    /// Exact text match.
    Literal(String),
    /// Anchored regex match, leftmost-first, one length per position.
    Pattern(Regex),
}

/// One terminal of the composed grammar.
#[derive(Debug)]
pub struct Terminal {
    /// How the terminal matches.
    pub matcher: Matcher,
    /// Whether matched text becomes a semantic child.
    pub keep: bool,
}

/// A composed, executable grammar.
#[derive(Debug)]
pub struct Grammar {
    /// The start nonterminal (`instruction`).
    pub start: NtId,
    pub(crate) nt_names: Vec<String>,
    /// All productions.
    pub productions: Vec<Production>,
    /// Productions grouped by left-hand side, in composition order.
    pub by_lhs: Vec<Vec<ProdId>>,
    /// All terminals.
    pub terminals: Vec<Terminal>,
    /// Which nonterminals can derive the empty string.
    pub nullable: Vec<bool>,
}

impl Grammar {
    /// Name of a nonterminal, for diagnostics.
    pub fn nt_name(&self, nt: NtId) -> &str {
        &self.nt_names[nt]
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for production in &self.productions {
            write!(f, "{}:", self.nt_name(production.lhs))?;
            for sym in &production.rhs {
                match *sym {
                    Sym::Nonterminal(nt) => write!(f, " {}", self.nt_name(nt))?,
                    Sym::Terminal(term) => match &self.terminals[term].matcher {
                        Matcher::Literal(text) => write!(f, " {text:?}")?,
                        Matcher::Pattern(regex) => write!(f, " /{}/", regex.as_str())?,
                    },
                }
            }
            if let NodeAction::Element(element) = production.node {
                write!(f, " -> {}", element.alias())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
