//! Earley parser with explicit ambiguity.
//!
//! The parser recognizes one source line against a composed [`Grammar`] and
//! enumerates every concrete parse tree. Terminals scan the input directly
//! (dynamic tokenization): literals match exactly, regexes match anchored
//! with leftmost-first semantics, one match length per position.
//!
//! Each chart item keeps derivation links; an item reached along several
//! routes accumulates several links, and tree extraction walks all of them,
//! which is where the alternative parses come from. Nullable nonterminals are
//! advanced over at prediction time (the Aycock–Horspool treatment), with a
//! dedicated link kind that re-derives the empty subtree during extraction.

use std::collections::HashMap;
use std::rc::Rc;

use super::{Grammar, Matcher, NtId, ProdId, Sym, TermId, Terminal};

/// A concrete parse tree over one source line. Spans are byte offsets into
/// the parsed (trimmed) line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tree {
    /// An inner node built from a production.
    Node {
        /// The production that formed this node.
        prod: ProdId,
        /// Start byte offset.
        start: usize,
        /// End byte offset.
        end: usize,
        /// Child subtrees, one per right-hand-side symbol.
        children: Vec<Tree>,
    },
    /// A scanned terminal.
    Token {
        /// The terminal that matched.
        term: TermId,
        /// Start byte offset.
        start: usize,
        /// End byte offset.
        end: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ItemKey {
    prod: ProdId,
    dot: usize,
    origin: usize,
}

#[derive(Debug, Clone, Copy)]
enum ChildRef {
    Token { term: TermId, start: usize, end: usize },
    Node { set: usize, item: usize },
    Null { nt: NtId, at: usize },
}

#[derive(Debug, Clone, Copy)]
struct Link {
    prev: (usize, usize),
    child: ChildRef,
}

struct EItem {
    key: ItemKey,
    links: Vec<Link>,
}

#[derive(Default)]
struct StateSet {
    items: Vec<EItem>,
    index: HashMap<ItemKey, usize>,
}

impl StateSet {
    fn insert(&mut self, key: ItemKey) -> usize {
        if let Some(&at) = self.index.get(&key) {
            return at;
        }
        let at = self.items.len();
        self.items.push(EItem {
            key,
            links: Vec::new(),
        });
        self.index.insert(key, at);
        at
    }

    fn link(&mut self, key: ItemKey, link: Link) {
        let at = self.insert(key);
        self.items[at].links.push(link);
    }
}

/// Parse `input` from the grammar's start symbol and return every parse tree.
/// An empty result means the line is not recognized at all.
pub fn parse(grammar: &Grammar, input: &str) -> Vec<Tree> {
    let n = input.len();
    let mut sets: Vec<StateSet> = (0..=n).map(|_| StateSet::default()).collect();
    for &prod in &grammar.by_lhs[grammar.start] {
        sets[0].insert(ItemKey {
            prod,
            dot: 0,
            origin: 0,
        });
    }

    for k in 0..=n {
        let mut i = 0;
        while i < sets[k].items.len() {
            let key = sets[k].items[i].key;
            let production = &grammar.productions[key.prod];
            match production.rhs.get(key.dot) {
                None => {
                    // Completion. Zero-width completions are covered by the
                    // nullable advance below, so only spanning items walk
                    // back to their origin set.
                    if k > key.origin {
                        let lhs = production.lhs;
                        let parents: Vec<(usize, ItemKey)> = sets[key.origin]
                            .items
                            .iter()
                            .enumerate()
                            .filter(|(_, item)| {
                                let p = &grammar.productions[item.key.prod];
                                p.rhs.get(item.key.dot) == Some(&Sym::Nonterminal(lhs))
                            })
                            .map(|(index, item)| (index, item.key))
                            .collect();
                        for (parent_index, parent_key) in parents {
                            let advanced = ItemKey {
                                prod: parent_key.prod,
                                dot: parent_key.dot + 1,
                                origin: parent_key.origin,
                            };
                            sets[k].link(
                                advanced,
                                Link {
                                    prev: (key.origin, parent_index),
                                    child: ChildRef::Node { set: k, item: i },
                                },
                            );
                        }
                    }
                }
                Some(&Sym::Nonterminal(nt)) => {
                    for &prod in &grammar.by_lhs[nt] {
                        sets[k].insert(ItemKey {
                            prod,
                            dot: 0,
                            origin: k,
                        });
                    }
                    if grammar.nullable[nt] {
                        let advanced = ItemKey {
                            prod: key.prod,
                            dot: key.dot + 1,
                            origin: key.origin,
                        };
                        sets[k].link(
                            advanced,
                            Link {
                                prev: (k, i),
                                child: ChildRef::Null { nt, at: k },
                            },
                        );
                    }
                }
                Some(&Sym::Terminal(term)) => {
                    if let Some(len) = match_terminal(&grammar.terminals[term], &input[k..]) {
                        if len > 0 {
                            let advanced = ItemKey {
                                prod: key.prod,
                                dot: key.dot + 1,
                                origin: key.origin,
                            };
                            sets[k + len].link(
                                advanced,
                                Link {
                                    prev: (k, i),
                                    child: ChildRef::Token {
                                        term,
                                        start: k,
                                        end: k + len,
                                    },
                                },
                            );
                        }
                    }
                }
            }
            i += 1;
        }
    }

    let mut extractor = Extractor {
        grammar,
        sets: &sets,
        memo: HashMap::new(),
    };
    let mut trees = Vec::new();
    for index in 0..sets[n].items.len() {
        let key = sets[n].items[index].key;
        let production = &grammar.productions[key.prod];
        if key.origin == 0 && production.lhs == grammar.start && key.dot == production.rhs.len() {
            trees.extend(extractor.node_trees(n, index));
        }
    }
    trees
}

fn match_terminal(terminal: &Terminal, rest: &str) -> Option<usize> {
    match &terminal.matcher {
        Matcher::Literal(text) => rest.starts_with(text.as_str()).then(|| text.len()),
        Matcher::Pattern(regex) => regex.find(rest).map(|found| found.end()),
    }
}

struct Extractor<'a> {
    grammar: &'a Grammar,
    sets: &'a [StateSet],
    memo: HashMap<(usize, usize), Rc<Vec<Vec<Tree>>>>,
}

impl Extractor<'_> {
    fn node_trees(&mut self, set: usize, item: usize) -> Vec<Tree> {
        let key = self.sets[set].items[item].key;
        self.derivations(set, item)
            .iter()
            .map(|children| Tree::Node {
                prod: key.prod,
                start: key.origin,
                end: set,
                children: children.clone(),
            })
            .collect()
    }

    fn derivations(&mut self, set: usize, item: usize) -> Rc<Vec<Vec<Tree>>> {
        if let Some(cached) = self.memo.get(&(set, item)) {
            return cached.clone();
        }
        let key = self.sets[set].items[item].key;
        let result = if key.dot == 0 {
            Rc::new(vec![Vec::new()])
        } else {
            let links: Vec<Link> = self.sets[set].items[item].links.clone();
            let mut out = Vec::new();
            for link in links {
                let prefixes = self.derivations(link.prev.0, link.prev.1);
                let children = match link.child {
                    ChildRef::Token { term, start, end } => vec![Tree::Token { term, start, end }],
                    ChildRef::Node { set, item } => self.node_trees(set, item),
                    ChildRef::Null { nt, at } => null_trees(self.grammar, nt, at),
                };
                for prefix in prefixes.iter() {
                    for child in &children {
                        let mut derivation = prefix.clone();
                        derivation.push(child.clone());
                        out.push(derivation);
                    }
                }
            }
            Rc::new(out)
        };
        self.memo.insert((set, item), result.clone());
        result
    }
}

/// Every zero-width derivation of a nullable nonterminal at position `at`.
fn null_trees(grammar: &Grammar, nt: NtId, at: usize) -> Vec<Tree> {
    let mut out = Vec::new();
    for &prod in &grammar.by_lhs[nt] {
        let production = &grammar.productions[prod];
        let all_nullable = production.rhs.iter().all(|sym| match *sym {
            Sym::Terminal(_) => false,
            Sym::Nonterminal(inner) => grammar.nullable[inner],
        });
        if !all_nullable {
            continue;
        }
        let mut sequences: Vec<Vec<Tree>> = vec![Vec::new()];
        for sym in &production.rhs {
            let Sym::Nonterminal(inner) = *sym else {
                unreachable!("terminals are never nullable");
            };
            let subtrees = null_trees(grammar, inner, at);
            let mut next = Vec::new();
            for sequence in &sequences {
                for subtree in &subtrees {
                    let mut extended = sequence.clone();
                    extended.push(subtree.clone());
                    next.push(extended);
                }
            }
            sequences = next;
        }
        for children in sequences {
            out.push(Tree::Node {
                prod,
                start: at,
                end: at,
                children,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{NodeAction, Production};

    /// Hand-built grammar: start → "a" | start __ws start, with __ws → ε | WS.
    fn toy_grammar() -> Grammar {
        let ws = regex::Regex::new("\\A(?:[ \\t]+)").unwrap();
        Grammar {
            start: 1,
            nt_names: vec!["__ws".into(), "start".into()],
            productions: vec![
                Production {
                    lhs: 0,
                    rhs: vec![],
                    node: NodeAction::Discard,
                },
                Production {
                    lhs: 0,
                    rhs: vec![Sym::Terminal(1)],
                    node: NodeAction::Discard,
                },
                Production {
                    lhs: 1,
                    rhs: vec![Sym::Terminal(0)],
                    node: NodeAction::Inline,
                },
                Production {
                    lhs: 1,
                    rhs: vec![Sym::Nonterminal(1), Sym::Nonterminal(0), Sym::Nonterminal(1)],
                    node: NodeAction::Inline,
                },
            ],
            by_lhs: vec![vec![0, 1], vec![2, 3]],
            terminals: vec![
                Terminal {
                    matcher: Matcher::Literal("a".into()),
                    keep: false,
                },
                Terminal {
                    matcher: Matcher::Pattern(ws),
                    keep: false,
                },
            ],
            nullable: vec![true, false],
        }
    }

    #[test]
    fn recognizes_and_rejects() {
        let grammar = toy_grammar();
        assert_eq!(parse(&grammar, "a").len(), 1);
        assert!(parse(&grammar, "b").is_empty());
        assert!(parse(&grammar, "").is_empty());
    }

    #[test]
    fn enumerates_ambiguous_parses() {
        let grammar = toy_grammar();
        // "aa" splits one way, "aaa" two ways (left or right association).
        assert_eq!(parse(&grammar, "aa").len(), 1);
        assert_eq!(parse(&grammar, "aaa").len(), 2);
    }

    #[test]
    fn whitespace_between_items_is_optional() {
        let grammar = toy_grammar();
        assert_eq!(parse(&grammar, "a a").len(), 1);
        assert_eq!(parse(&grammar, "a  a a").len(), 2);
    }
}
