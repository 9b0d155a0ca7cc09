use crate::errors::PerceiverError;
use crate::model::{DomNode, DomTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
    DashMatch,
}

#[derive(Debug, Clone)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
    case_insensitive: bool,
}

impl AttrTest {
    fn matches(&self, node: &DomNode) -> bool {
        let Some(actual) = node.attr(&self.name) else {
            return false;
        };
        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), self.value.to_lowercase())
        } else {
            (actual.to_string(), self.value.clone())
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Contains => !expected.is_empty() && actual.contains(&expected),
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Word => actual.split_whitespace().any(|word| word == expected),
            AttrOp::DashMatch => actual == expected || actual.starts_with(&format!("{expected}-")),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, node: &DomNode) -> bool {
        if let Some(tag) = &self.tag {
            if &node.tag != tag {
                return false;
            }
        }
        self.ids.iter().all(|id| node.id() == Some(id.as_str()))
            && self.classes.iter().all(|class| node.has_class(class))
            && self.attrs.iter().all(|attr| attr.matches(node))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone)]
pub(super) struct ComplexSelector {
    parts: Vec<(Combinator, Compound)>,
}

pub(super) fn select(tree: &DomTree, selector: &str) -> Result<Vec<usize>, PerceiverError> {
    let list = parse(selector)?;
    Ok(tree
        .nodes()
        .iter()
        .filter(|node| {
            list.iter()
                .any(|complex| matches_parts(tree, node.index, &complex.parts))
        })
        .map(|node| node.index)
        .collect())
}

fn matches_parts(tree: &DomTree, index: usize, parts: &[(Combinator, Compound)]) -> bool {
    let Some(((combinator, compound), rest)) = parts.split_last() else {
        return true;
    };
    let Some(node) = tree.get(index) else {
        return false;
    };
    if !compound.matches(node) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match combinator {
        Combinator::Child => node
            .parent
            .map(|parent| matches_parts(tree, parent, rest))
            .unwrap_or(false),
        Combinator::Descendant => {
            let mut ancestor = node.parent;
            while let Some(current) = ancestor {
                if matches_parts(tree, current, rest) {
                    return true;
                }
                ancestor = tree.get(current).and_then(|n| n.parent);
            }
            false
        }
    }
}

pub(super) fn parse(selector: &str) -> Result<Vec<ComplexSelector>, PerceiverError> {
    Parser::new(selector).parse_list()
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn invalid(&self, reason: impl Into<String>) -> PerceiverError {
        PerceiverError::invalid_selector(self.source, reason)
    }

    fn unsupported(&self, reason: impl Into<String>) -> PerceiverError {
        PerceiverError::unsupported(self.source, reason)
    }

    fn parse_list(&mut self) -> Result<Vec<ComplexSelector>, PerceiverError> {
        let mut list = Vec::new();
        let mut parts: Vec<(Combinator, Compound)> = Vec::new();
        let mut pending: Option<Combinator> = None;

        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek() else {
                break;
            };
            match ch {
                ',' => {
                    if parts.is_empty() || pending.is_some() {
                        return Err(self.invalid("empty selector in list"));
                    }
                    list.push(ComplexSelector {
                        parts: std::mem::take(&mut parts),
                    });
                    self.bump();
                }
                '>' => {
                    if parts.is_empty() || pending.is_some() {
                        return Err(self.invalid("misplaced child combinator"));
                    }
                    pending = Some(Combinator::Child);
                    self.bump();
                }
                '+' | '~' => return Err(self.unsupported("sibling combinators")),
                _ => {
                    let combinator = pending.take().unwrap_or(Combinator::Descendant);
                    let compound = self.parse_compound()?;
                    parts.push((combinator, compound));
                }
            }
        }

        if pending.is_some() {
            return Err(self.invalid("dangling combinator"));
        }
        if parts.is_empty() {
            return Err(self.invalid("empty selector"));
        }
        list.push(ComplexSelector { parts });
        Ok(list)
    }

    fn parse_compound(&mut self) -> Result<Compound, PerceiverError> {
        let mut compound = Compound::default();
        let mut any = false;

        match self.peek() {
            Some('*') => {
                self.bump();
                any = true;
            }
            Some(ch) if is_ident_char(ch) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
                any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    let id = self.ident()?;
                    compound.ids.push(id);
                }
                Some('.') => {
                    self.bump();
                    let class = self.ident()?;
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.bump();
                    let attr = self.parse_attribute()?;
                    compound.attrs.push(attr);
                }
                Some(':') => return Err(self.unsupported("pseudo-classes")),
                Some(ch) if ch.is_whitespace() || matches!(ch, ',' | '>' | '+' | '~') => break,
                None => break,
                Some(ch) => return Err(self.invalid(format!("unexpected character '{ch}'"))),
            }
            any = true;
        }

        if !any {
            return Err(self.invalid("expected a selector"));
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, PerceiverError> {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\\' {
                self.bump();
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.invalid("dangling escape")),
                }
            } else if is_ident_char(ch) {
                out.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.invalid("expected an identifier"));
        }
        Ok(out)
    }

    fn parse_attribute(&mut self) -> Result<AttrTest, PerceiverError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.bump() {
            Some(']') => {
                return Ok(AttrTest {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                    case_insensitive: false,
                })
            }
            Some('=') => AttrOp::Equals,
            Some(prefix @ ('*' | '^' | '$' | '~' | '|')) => {
                if self.bump() != Some('=') {
                    return Err(self.invalid("expected '=' in attribute operator"));
                }
                match prefix {
                    '*' => AttrOp::Contains,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '~' => AttrOp::Word,
                    _ => AttrOp::DashMatch,
                }
            }
            _ => return Err(self.invalid("malformed attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.quoted(quote)?
            }
            Some(_) => self.ident()?,
            None => return Err(self.invalid("unterminated attribute selector")),
        };

        self.skip_whitespace();
        let mut case_insensitive = false;
        if matches!(self.peek(), Some('i' | 'I')) {
            self.bump();
            case_insensitive = true;
            self.skip_whitespace();
        } else if matches!(self.peek(), Some('s' | 'S')) {
            self.bump();
            self.skip_whitespace();
        }
        if self.bump() != Some(']') {
            return Err(self.invalid("unterminated attribute selector"));
        }

        Ok(AttrTest {
            name,
            op,
            value,
            case_insensitive,
        })
    }

    fn quoted(&mut self, quote: char) -> Result<String, PerceiverError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.invalid("dangling escape")),
                },
                Some(ch) if ch == quote => return Ok(out),
                Some(ch) => out.push(ch),
                None => return Err(self.invalid("unterminated string")),
            }
        }
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()
}
