use crate::errors::PerceiverError;
use crate::model::{normalize_space, DomNode, DomTree};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Eq,
    NotEq,
    Star,
    Dot,
    Name(String),
    Literal(String),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone)]
enum NameTest {
    Any,
    Tag(String),
}

impl NameTest {
    fn matches(&self, node: &DomNode) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Tag(tag) => &node.tag == tag,
        }
    }
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub(super) struct Query {
    steps: Vec<Step>,
    position: Option<usize>,
}

#[derive(Debug, Clone)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        negate: bool,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Contains(Box<Expr>, Box<Expr>),
    StartsWith(Box<Expr>, Box<Expr>),
    NormalizeSpace(Option<Box<Expr>>),
    Translate(Box<Expr>, Box<Expr>, Box<Expr>),
    Concat(Vec<Expr>),
    Attr(String),
    Text,
    Context,
    Position,
    Last,
    Literal(String),
    Number(f64),
}

enum Value {
    /// Zero or one node, carried by its string-value.
    Node(Option<String>),
    Str(String),
    Bool(bool),
    Num(f64),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Node(node) => node.is_some(),
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
        }
    }

    fn into_string(self) -> String {
        match self {
            Value::Node(node) => node.unwrap_or_default(),
            Value::Str(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Num(n) if n.fract() == 0.0 => format!("{}", n as i64),
            Value::Num(n) => n.to_string(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Node(Some(s)) | Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Node(None) => None,
        }
    }
}

struct EvalCtx<'a> {
    node: &'a DomNode,
    position: usize,
    size: usize,
}

pub(super) fn select(tree: &DomTree, selector: &str) -> Result<Vec<usize>, PerceiverError> {
    let query = parse(selector)?;
    let mut contexts: Vec<Option<usize>> = vec![None];

    for step in &query.steps {
        let mut next = Vec::new();
        for context in &contexts {
            next.extend(apply_step(tree, *context, step));
        }
        next.sort_unstable();
        next.dedup();
        contexts = next.into_iter().map(Some).collect();
    }

    let mut matched: Vec<usize> = contexts.into_iter().flatten().collect();
    if let Some(position) = query.position {
        matched = matched
            .get(position.wrapping_sub(1))
            .map(|index| vec![*index])
            .unwrap_or_default();
    }
    Ok(matched)
}

fn children_of(tree: &DomTree, origin: Option<usize>) -> Vec<usize> {
    match origin {
        None => tree.roots().map(|node| node.index).collect(),
        Some(index) => tree
            .get(index)
            .map(|node| node.children.clone())
            .unwrap_or_default(),
    }
}

fn apply_step(tree: &DomTree, context: Option<usize>, step: &Step) -> Vec<usize> {
    let origins: Vec<Option<usize>> = match step.axis {
        Axis::Child => vec![context],
        Axis::Descendant => {
            let mut origins = vec![context];
            match context {
                None => origins.extend((0..tree.len()).map(Some)),
                Some(index) => origins.extend(tree.descendants(index).into_iter().map(Some)),
            }
            origins
        }
    };

    let mut out = Vec::new();
    for origin in origins {
        let mut candidates: Vec<usize> = children_of(tree, origin)
            .into_iter()
            .filter(|&index| tree.get(index).is_some_and(|node| step.test.matches(node)))
            .collect();
        for predicate in &step.predicates {
            candidates = filter_predicate(tree, candidates, predicate);
        }
        out.extend(candidates);
    }
    out
}

fn filter_predicate(tree: &DomTree, candidates: Vec<usize>, predicate: &Expr) -> Vec<usize> {
    let size = candidates.len();
    candidates
        .into_iter()
        .enumerate()
        .filter(|(offset, index)| {
            let Some(node) = tree.get(*index) else {
                return false;
            };
            let ctx = EvalCtx {
                node,
                position: offset + 1,
                size,
            };
            match evaluate(predicate, &ctx) {
                Value::Num(n) => n.fract() == 0.0 && n as usize == offset + 1,
                other => other.truthy(),
            }
        })
        .map(|(_, index)| index)
        .collect()
}

fn evaluate(expr: &Expr, ctx: &EvalCtx<'_>) -> Value {
    match expr {
        Expr::Or(left, right) => {
            Value::Bool(evaluate(left, ctx).truthy() || evaluate(right, ctx).truthy())
        }
        Expr::And(left, right) => {
            Value::Bool(evaluate(left, ctx).truthy() && evaluate(right, ctx).truthy())
        }
        Expr::Not(inner) => Value::Bool(!evaluate(inner, ctx).truthy()),
        Expr::Compare {
            negate,
            left,
            right,
        } => Value::Bool(compare(evaluate(left, ctx), evaluate(right, ctx), *negate)),
        Expr::Contains(haystack, needle) => {
            let haystack = evaluate(haystack, ctx).into_string();
            let needle = evaluate(needle, ctx).into_string();
            Value::Bool(haystack.contains(&needle))
        }
        Expr::StartsWith(haystack, prefix) => {
            let haystack = evaluate(haystack, ctx).into_string();
            let prefix = evaluate(prefix, ctx).into_string();
            Value::Bool(haystack.starts_with(&prefix))
        }
        Expr::NormalizeSpace(inner) => {
            let raw = match inner {
                Some(inner) => evaluate(inner, ctx).into_string(),
                None => ctx.node.text.clone(),
            };
            Value::Str(normalize_space(&raw))
        }
        Expr::Translate(source, from, to) => {
            let source = evaluate(source, ctx).into_string();
            let from: Vec<char> = evaluate(from, ctx).into_string().chars().collect();
            let to: Vec<char> = evaluate(to, ctx).into_string().chars().collect();
            let translated = source
                .chars()
                .filter_map(|ch| match from.iter().position(|&f| f == ch) {
                    Some(at) => to.get(at).copied(),
                    None => Some(ch),
                })
                .collect();
            Value::Str(translated)
        }
        Expr::Concat(parts) => Value::Str(
            parts
                .iter()
                .map(|part| evaluate(part, ctx).into_string())
                .collect(),
        ),
        Expr::Attr(name) => Value::Node(ctx.node.attr(name).map(str::to_string)),
        Expr::Text => Value::Node(
            Some(ctx.node.own_text.clone()).filter(|text| !text.is_empty()),
        ),
        Expr::Context => Value::Node(Some(ctx.node.text.clone())),
        Expr::Position => Value::Num(ctx.position as f64),
        Expr::Last => Value::Num(ctx.size as f64),
        Expr::Literal(value) => Value::Str(value.clone()),
        Expr::Number(value) => Value::Num(*value),
    }
}

fn compare(left: Value, right: Value, negate: bool) -> bool {
    if matches!(left, Value::Node(None)) || matches!(right, Value::Node(None)) {
        return false;
    }
    let numeric = matches!(left, Value::Num(_)) || matches!(right, Value::Num(_));
    let equal = if numeric {
        match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    } else {
        left.into_string() == right.into_string()
    };
    equal != negate
}

pub(super) fn parse(selector: &str) -> Result<Query, PerceiverError> {
    let tokens = tokenize(selector)?;
    let mut parser = Parser {
        source: selector,
        tokens,
        pos: 0,
    };
    let query = parser.parse_query()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.invalid("unexpected trailing input"));
    }
    Ok(query)
}

fn tokenize(source: &str) -> Result<Vec<Token>, PerceiverError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    tokens.push(Token::DoubleSlash);
                    i += 2;
                } else {
                    tokens.push(Token::Slash);
                    i += 1;
                }
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '.' if chars.get(i + 1) == Some(&'.') => {
                return Err(PerceiverError::unsupported(source, "parent steps"));
            }
            '.' if chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) => {
                let (number, next) = read_number(&chars, i);
                tokens.push(Token::Number(number));
                i = next;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '"' | '\'' => {
                let quote = ch;
                let start = i + 1;
                let Some(len) = chars[start..].iter().position(|&c| c == quote) else {
                    return Err(PerceiverError::invalid_selector(source, "unterminated string"));
                };
                tokens.push(Token::Literal(chars[start..start + len].iter().collect()));
                i = start + len + 1;
            }
            c if c.is_ascii_digit() => {
                let (number, next) = read_number(&chars, i);
                tokens.push(Token::Number(number));
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '-' | '_' | '.'))
                {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                if chars.get(i) == Some(&':') {
                    return Err(PerceiverError::unsupported(source, "axes and namespaces"));
                }
                tokens.push(Token::Name(name));
            }
            '|' => return Err(PerceiverError::unsupported(source, "union expressions")),
            '<' | '>' | '+' | '-' => {
                return Err(PerceiverError::unsupported(source, "arithmetic and relational operators"))
            }
            other => {
                return Err(PerceiverError::invalid_selector(
                    source,
                    format!("unexpected character '{other}'"),
                ))
            }
        }
    }
    Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> (f64, usize) {
    let mut end = start;
    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
        end += 1;
    }
    let text: String = chars[start..end].iter().collect();
    (text.parse().unwrap_or(f64::NAN), end)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn invalid(&self, reason: impl Into<String>) -> PerceiverError {
        PerceiverError::invalid_selector(self.source, reason)
    }

    fn unsupported(&self, reason: impl Into<String>) -> PerceiverError {
        PerceiverError::unsupported(self.source, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), PerceiverError> {
        match self.bump() {
            Some(token) if token == expected => Ok(()),
            _ => Err(self.invalid(format!("expected {what}"))),
        }
    }

    fn parse_query(&mut self) -> Result<Query, PerceiverError> {
        if self.peek() == Some(&Token::LParen) {
            self.bump();
            let steps = self.parse_path()?;
            self.expect(Token::RParen, "')'")?;
            let mut position = None;
            if self.peek() == Some(&Token::LBracket) {
                self.bump();
                match self.bump() {
                    Some(Token::Number(n)) if n.fract() == 0.0 && n >= 1.0 => {
                        position = Some(n as usize)
                    }
                    _ => return Err(self.unsupported("only numeric positions after a grouped path")),
                }
                self.expect(Token::RBracket, "']'")?;
            }
            return Ok(Query { steps, position });
        }
        let steps = self.parse_path()?;
        Ok(Query {
            steps,
            position: None,
        })
    }

    fn parse_path(&mut self) -> Result<Vec<Step>, PerceiverError> {
        let mut steps = Vec::new();
        loop {
            let axis = match self.peek() {
                Some(Token::Slash) => Axis::Child,
                Some(Token::DoubleSlash) => Axis::Descendant,
                _ => break,
            };
            self.bump();

            let test = match self.bump() {
                Some(Token::Star) => NameTest::Any,
                Some(Token::Name(name)) => {
                    if self.peek() == Some(&Token::LParen) {
                        return Err(self.unsupported(format!("node test '{name}()'")));
                    }
                    NameTest::Tag(name.to_ascii_lowercase())
                }
                Some(Token::At) => return Err(self.unsupported("attribute steps")),
                Some(Token::Dot) => return Err(self.unsupported("self steps")),
                _ => return Err(self.invalid("expected a name test")),
            };

            let mut predicates = Vec::new();
            while self.peek() == Some(&Token::LBracket) {
                self.bump();
                predicates.push(self.parse_or()?);
                self.expect(Token::RBracket, "']'")?;
            }
            steps.push(Step {
                axis,
                test,
                predicates,
            });
        }

        if steps.is_empty() {
            return match self.peek() {
                Some(Token::Name(_)) | Some(Token::Star) | Some(Token::Dot) => {
                    Err(self.unsupported("relative location paths"))
                }
                _ => Err(self.invalid("expected an absolute location path")),
            };
        }
        Ok(steps)
    }

    fn parse_or(&mut self) -> Result<Expr, PerceiverError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Name(name)) if name == "or") {
            self.bump();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, PerceiverError> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), Some(Token::Name(name)) if name == "and") {
            self.bump();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, PerceiverError> {
        let left = self.parse_primary()?;
        let negate = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => return Ok(left),
        };
        self.bump();
        let right = self.parse_primary()?;
        Ok(Expr::Compare {
            negate,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, PerceiverError> {
        match self.bump() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::At) => match self.bump() {
                Some(Token::Name(name)) => Ok(Expr::Attr(name.to_ascii_lowercase())),
                _ => Err(self.invalid("expected attribute name after '@'")),
            },
            Some(Token::Dot) => Ok(Expr::Context),
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Number(value)) if !value.is_nan() => Ok(Expr::Number(value)),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.bump();
                let args = self.parse_arguments()?;
                self.function(&name, args)
            }
            Some(Token::Name(name)) => Err(self.unsupported(format!("child path '{name}' in predicate"))),
            Some(Token::Slash) | Some(Token::DoubleSlash) => {
                Err(self.unsupported("nested location paths in predicates"))
            }
            _ => Err(self.invalid("expected an expression")),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, PerceiverError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.bump() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.invalid("expected ',' or ')' in argument list")),
            }
        }
    }

    fn function(&self, name: &str, mut args: Vec<Expr>) -> Result<Expr, PerceiverError> {
        let arity = args.len();
        let bad_arity = || self.invalid(format!("wrong number of arguments to {name}()"));
        match name {
            "text" if arity == 0 => Ok(Expr::Text),
            "position" if arity == 0 => Ok(Expr::Position),
            "last" if arity == 0 => Ok(Expr::Last),
            "not" if arity == 1 => Ok(Expr::Not(Box::new(args.remove(0)))),
            "contains" if arity == 2 => {
                let needle = args.remove(1);
                Ok(Expr::Contains(Box::new(args.remove(0)), Box::new(needle)))
            }
            "starts-with" if arity == 2 => {
                let prefix = args.remove(1);
                Ok(Expr::StartsWith(Box::new(args.remove(0)), Box::new(prefix)))
            }
            "normalize-space" if arity <= 1 => {
                Ok(Expr::NormalizeSpace(args.pop().map(Box::new)))
            }
            "translate" if arity == 3 => {
                let to = args.remove(2);
                let from = args.remove(1);
                Ok(Expr::Translate(
                    Box::new(args.remove(0)),
                    Box::new(from),
                    Box::new(to),
                ))
            }
            "concat" if arity >= 2 => Ok(Expr::Concat(args)),
            "text" | "position" | "last" | "not" | "contains" | "starts-with"
            | "normalize-space" | "translate" | "concat" => Err(bad_arity()),
            other => Err(self.unsupported(format!("function {other}()"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_with_apostrophe_via_concat() {
        let tree = crate::markup::parse_markup(r#"<p>Don't stop</p><p>Other</p>"#);
        let found = select(&tree, r#"//p[text()=concat('Don', "'", 't stop')]"#).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn inequality_ignores_missing_attributes() {
        let tree = crate::markup::parse_markup(
            r#"<input type="text"><input type="email"><input>"#,
        );
        let found = select(&tree, "//input[@type!='text']").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn tokenizer_reports_unterminated_literal() {
        assert!(matches!(
            parse("//p[text()='open]"),
            Err(PerceiverError::InvalidSelector { .. })
        ));
    }
}
