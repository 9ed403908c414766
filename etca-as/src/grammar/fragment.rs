//! Parser for the grammar-fragment DSL extensions register their syntax in.
//!
//! The dialect is a small EBNF: `"lit"` literals, `/regex/` terminals
//! (optional `i` flag), `NAME`-style built-in terminals, lowercase category
//! references, `( a | b )` groups, `[ x ]` optionals with a placeholder,
//! `x?`/`x*`/`x+` repetition, and `~` glue forbidding whitespace between two
//! adjacent items. The empty fragment is a valid epsilon rule.

/// A whole fragment: one or more alternative sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternation(pub Vec<Sequence>);

/// One alternative: items in order, each knowing whether it is glued to its
/// predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence(pub Vec<SeqItem>);

/// An item of a sequence plus its glue flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqItem {
    /// No whitespace may separate this item from the previous one.
    pub glued: bool,
    /// The item itself.
    pub item: Item,
}

/// One grammar item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// Quoted literal terminal; dropped from semantic children.
    Literal(String),
    /// Regex terminal, kept as a string child.
    Regex {
        /// The pattern body between the slashes.
        pattern: String,
        /// Whether the `i` flag was present.
        case_insensitive: bool,
    },
    /// Built-in named terminal (`NAME`, `ESCAPED_STRING`), kept as a child.
    Terminal(String),
    /// Category (nonterminal) reference.
    Category(String),
    /// Parenthesized alternation.
    Group(Alternation),
    /// `[ ... ]`: optional; when absent a `None` placeholder child appears.
    Maybe(Alternation),
    /// `x?`: optional without a placeholder.
    Opt(Box<Item>),
    /// `x*`.
    Star(Box<Item>),
    /// `x+`.
    Plus(Box<Item>),
}

/// Parse a fragment. Errors carry a message suitable for wrapping into a
/// grammar error.
pub fn parse_fragment(source: &str) -> Result<Alternation, String> {
    let mut parser = FragmentParser {
        source,
        chars: source.char_indices().peekable(),
    };
    let alternation = parser.alternation()?;
    parser.skip_ws();
    match parser.chars.peek() {
        None => Ok(alternation),
        Some(&(at, c)) => Err(format!("unexpected {c:?} at byte {at} in fragment {source:?}")),
    }
}

struct FragmentParser<'s> {
    source: &'s str,
    chars: std::iter::Peekable<std::str::CharIndices<'s>>,
}

impl<'s> FragmentParser<'s> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn alternation(&mut self) -> Result<Alternation, String> {
        let mut sequences = vec![self.sequence()?];
        loop {
            self.skip_ws();
            if matches!(self.chars.peek(), Some(&(_, '|'))) {
                self.chars.next();
                sequences.push(self.sequence()?);
            } else {
                break;
            }
        }
        Ok(Alternation(sequences))
    }

    fn sequence(&mut self) -> Result<Sequence, String> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            let glued = if matches!(self.chars.peek(), Some(&(_, '~'))) {
                self.chars.next();
                self.skip_ws();
                if items.is_empty() {
                    return Err(format!("leading ~ in fragment {:?}", self.source));
                }
                true
            } else {
                false
            };
            match self.chars.peek() {
                None | Some(&(_, '|')) | Some(&(_, ')')) | Some(&(_, ']')) => {
                    if glued {
                        return Err(format!("dangling ~ in fragment {:?}", self.source));
                    }
                    break;
                }
                _ => {}
            }
            let item = self.item()?;
            items.push(SeqItem { glued, item });
        }
        Ok(Sequence(items))
    }

    fn item(&mut self) -> Result<Item, String> {
        let mut item = self.primary()?;
        loop {
            match self.chars.peek() {
                Some(&(_, '?')) => {
                    self.chars.next();
                    item = Item::Opt(Box::new(item));
                }
                Some(&(_, '*')) => {
                    self.chars.next();
                    item = Item::Star(Box::new(item));
                }
                Some(&(_, '+')) => {
                    self.chars.next();
                    item = Item::Plus(Box::new(item));
                }
                _ => break,
            }
        }
        Ok(item)
    }

    fn primary(&mut self) -> Result<Item, String> {
        match self.chars.peek() {
            Some(&(_, '"')) => self.literal(),
            Some(&(_, '/')) => self.regex(),
            Some(&(_, '(')) => {
                self.chars.next();
                let inner = self.alternation()?;
                self.expect(')')?;
                Ok(Item::Group(inner))
            }
            Some(&(_, '[')) => {
                self.chars.next();
                let inner = self.alternation()?;
                self.expect(']')?;
                Ok(Item::Maybe(inner))
            }
            Some(&(_, c)) if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
            Some(&(at, c)) => Err(format!("unexpected {c:?} at byte {at} in fragment {:?}", self.source)),
            None => Err(format!("unexpected end of fragment {:?}", self.source)),
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), String> {
        self.skip_ws();
        match self.chars.next() {
            Some((_, c)) if c == wanted => Ok(()),
            _ => Err(format!("expected {wanted:?} in fragment {:?}", self.source)),
        }
    }

    fn literal(&mut self) -> Result<Item, String> {
        self.chars.next(); // opening quote
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(Item::Literal(text)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c)) => text.push(c),
                    None => break,
                },
                Some((_, c)) => text.push(c),
                None => break,
            }
        }
        Err(format!("unterminated literal in fragment {:?}", self.source))
    }

    fn regex(&mut self) -> Result<Item, String> {
        self.chars.next(); // opening slash
        let mut pattern = String::new();
        loop {
            match self.chars.next() {
                Some((_, '/')) => {
                    let case_insensitive = if matches!(self.chars.peek(), Some(&(_, 'i'))) {
                        self.chars.next();
                        true
                    } else {
                        false
                    };
                    return Ok(Item::Regex {
                        pattern,
                        case_insensitive,
                    });
                }
                Some((_, '\\')) => match self.chars.next() {
                    // Escaped slashes lose the backslash; every other escape
                    // passes through to the regex engine untouched.
                    Some((_, '/')) => pattern.push('/'),
                    Some((_, c)) => {
                        pattern.push('\\');
                        pattern.push(c);
                    }
                    None => break,
                },
                Some((_, c)) => pattern.push(c),
                None => break,
            }
        }
        Err(format!("unterminated regex in fragment {:?}", self.source))
    }

    fn identifier(&mut self) -> Result<Item, String> {
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if name.chars().any(|c| c.is_ascii_lowercase()) {
            Ok(Item::Category(name))
        } else {
            Ok(Item::Terminal(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(source: &str) -> Vec<SeqItem> {
        let alternation = parse_fragment(source).unwrap();
        assert_eq!(alternation.0.len(), 1);
        alternation.0.into_iter().next().unwrap().0
    }

    #[test]
    fn empty_fragment_is_epsilon() {
        let alternation = parse_fragment("").unwrap();
        assert_eq!(alternation, Alternation(vec![Sequence::default()]));
    }

    #[test]
    fn parses_mixed_sequence() {
        let items = items(r#""mov" ~ size_postfix register "," immediate"#);
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].item, Item::Literal("mov".to_string()));
        assert!(items[1].glued);
        assert_eq!(items[1].item, Item::Category("size_postfix".to_string()));
        assert_eq!(items[3].item, Item::Literal(",".to_string()));
    }

    #[test]
    fn parses_regex_with_flag_and_escaped_slash() {
        let items = items(r"/a\/b/i");
        assert_eq!(
            items[0].item,
            Item::Regex {
                pattern: "a/b".to_string(),
                case_insensitive: true,
            }
        );
    }

    #[test]
    fn parses_repetition_and_optionals() {
        let items = items(r#"immediate* [ "," immediate ] NAME?"#);
        assert!(matches!(items[0].item, Item::Star(_)));
        assert!(matches!(items[1].item, Item::Maybe(_)));
        assert!(matches!(items[2].item, Item::Opt(_)));
    }

    #[test]
    fn parses_nested_alternation() {
        let alternation = parse_fragment(r#""halt" | "hlt""#).unwrap();
        assert_eq!(alternation.0.len(), 2);
        let items = items(r#""[" (register_raw | immediate_raw) "]""#);
        assert!(matches!(items[1].item, Item::Group(_)));
    }

    #[test]
    fn rejects_malformed_fragments() {
        assert!(parse_fragment(r#""unterminated"#).is_err());
        assert!(parse_fragment(r"/unterminated").is_err());
        assert!(parse_fragment("~ register").is_err());
        assert!(parse_fragment("register )").is_err());
    }
}
