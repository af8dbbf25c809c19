//! Template expansion for dynamic SQL.
//!
//! A small text template language evaluated against the normalized
//! argument context before the result is compiled as a named query.
//!
//! ```text
//! SELECT * FROM users WHERE 1=1
//! {{- if .name }} AND name = #{name}{{ end }}
//! {{- if eq .status "active" }} AND active = true
//! {{- else if .status }} AND status = #{status}
//! {{- end }}
//! ```
//!
//! | Action                          | Meaning                                   |
//! |---------------------------------|-------------------------------------------|
//! | `{{ .a.b }}`                    | Write a value                             |
//! | `{{ if C }} … {{ else }} … {{ end }}` | Conditional, `else if C` chains      |
//! | `{{ range .xs }} … {{ end }}`   | Repeat with `.` bound to each element     |
//! | `$`, `$.a`                      | Root context, also inside `range`         |
//! | `{{-` / `-}}`                   | Trim whitespace before / after the action |
//!
//! Conditions are `PATH`, `not PATH`, `eq PATH LITERAL` and `ne PATH LITERAL`.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{pair, preceded, tuple},
    IResult,
};

use crate::error::{MintError, MintResult};
use crate::value::Value;

/// Whether text needs template expansion.
pub fn is_template(text: &str) -> bool {
    text.contains("{{")
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
enum Path {
    /// Relative to the current `.`.
    Dot(Vec<String>),
    /// Relative to the root context `$`.
    Root(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
enum Cond {
    Truthy(Path),
    Not(Path),
    Eq(Path, Value),
    Ne(Path, Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Output(Path),
    If(Cond),
    Else(Option<Cond>),
    Range(Path),
    End,
}

#[derive(Debug, Clone)]
enum Piece {
    Text(String),
    Action { action: Action, at: usize },
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Output { path: Path, at: usize },
    If { cond: Cond, then: Vec<Node>, otherwise: Vec<Node> },
    Range { path: Path, at: usize, body: Vec<Node>, otherwise: Vec<Node> },
}

impl Template {
    /// Parse template source.
    pub fn parse(source: &str) -> MintResult<Self> {
        let pieces = lex(source)?;
        let mut pos = 0;
        let (nodes, term) = parse_block(&pieces, &mut pos)?;
        if let Some((action, at)) = term {
            return Err(MintError::template(at, format!("unexpected {}", action_keyword(&action))));
        }
        Ok(Self { nodes })
    }

    /// Expand the template against a context value.
    pub fn render(&self, context: &Value) -> MintResult<String> {
        let mut out = String::new();
        exec(&self.nodes, context, context, &mut out)?;
        Ok(out)
    }
}

// ==================== Lexing ====================

/// Split source into literal text and parsed actions, applying trim markers.
fn lex(source: &str) -> MintResult<Vec<Piece>> {
    let mut pieces = Vec::new();
    let mut rest = source;
    let mut trim_next = false;

    while let Some(open) = rest.find("{{") {
        let at = source.len() - rest.len() + open;
        let after = &rest[open + 2..];
        let close = after
            .find("}}")
            .ok_or_else(|| MintError::template(at, "unterminated action"))?;
        let mut inner = &after[..close];

        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start();
        }
        if inner.starts_with('-') && inner[1..].starts_with(char::is_whitespace) {
            text = text.trim_end();
            inner = &inner[1..];
        }
        trim_next = inner.ends_with('-') && inner[..inner.len() - 1].ends_with(char::is_whitespace);
        if trim_next {
            inner = &inner[..inner.len() - 1];
        }

        if !text.is_empty() {
            pieces.push(Piece::Text(text.to_string()));
        }
        pieces.push(Piece::Action {
            action: parse_action_text(inner, at)?,
            at,
        });
        rest = &after[close + 2..];
    }

    let text = if trim_next { rest.trim_start() } else { rest };
    if !text.is_empty() {
        pieces.push(Piece::Text(text.to_string()));
    }
    Ok(pieces)
}

fn parse_action_text(inner: &str, at: usize) -> MintResult<Action> {
    match parse_action(inner.trim()) {
        Ok(("", action)) => Ok(action),
        Ok((remaining, _)) => Err(MintError::template(
            at,
            format!("unexpected trailing content: '{}'", remaining),
        )),
        Err(_) => Err(MintError::template(
            at,
            format!("invalid action: '{}'", inner.trim()),
        )),
    }
}

/// Parse the body of one `{{ ... }}` action.
fn parse_action(input: &str) -> IResult<&str, Action> {
    alt((
        map(preceded(pair(tag("if"), multispace1), parse_cond), Action::If),
        map(
            preceded(
                tag("else"),
                opt(preceded(tuple((multispace1, tag("if"), multispace1)), parse_cond)),
            ),
            Action::Else,
        ),
        map(preceded(pair(tag("range"), multispace1), parse_path), Action::Range),
        value(Action::End, tag("end")),
        map(parse_path, Action::Output),
    ))(input)
}

fn parse_cond(input: &str) -> IResult<&str, Cond> {
    alt((
        map(preceded(pair(tag("not"), multispace1), parse_path), Cond::Not),
        map(
            tuple((tag("eq"), multispace1, parse_path, multispace1, parse_literal)),
            |(_, _, path, _, lit)| Cond::Eq(path, lit),
        ),
        map(
            tuple((tag("ne"), multispace1, parse_path, multispace1, parse_literal)),
            |(_, _, path, _, lit)| Cond::Ne(path, lit),
        ),
        map(parse_path, Cond::Truthy),
    ))(input)
}

/// Parse `.`, `.a.b`, `$` or `$.a.b`.
fn parse_path(input: &str) -> IResult<&str, Path> {
    alt((
        map(preceded(char('$'), many0(parse_segment)), Path::Root),
        map(
            alt((
                many1_segments,
                map(char('.'), |_| Vec::new()),
            )),
            Path::Dot,
        ),
    ))(input)
}

fn many1_segments(input: &str) -> IResult<&str, Vec<String>> {
    let (input, first) = parse_segment(input)?;
    let (input, mut rest) = many0(parse_segment)(input)?;
    rest.insert(0, first);
    Ok((input, rest))
}

fn parse_segment(input: &str) -> IResult<&str, String> {
    map(
        preceded(char('.'), take_while1(|c: char| c.is_alphanumeric() || c == '_')),
        |s: &str| s.to_string(),
    )(input)
}

fn parse_literal(input: &str) -> IResult<&str, Value> {
    let (input, _) = multispace0(input)?;

    alt((
        value(Value::Bool(true), tag("true")),
        value(Value::Bool(false), tag("false")),
        value(Value::Null, tag("nil")),
        parse_number,
        map(
            tuple((char('"'), take_while(|c: char| c != '"'), char('"'))),
            |(_, s, _): (char, &str, char)| Value::String(s.to_string()),
        ),
    ))(input)
}

/// Out-of-range numbers fail the parse rather than wrapping.
fn parse_number(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))),
        |num: &str| {
            if num.contains('.') {
                num.parse::<f64>().map(Value::Float).map_err(|e| e.to_string())
            } else {
                num.parse::<i64>().map(Value::Int).map_err(|e| e.to_string())
            }
        },
    )(input)
}

// ==================== Tree building ====================

type Terminator = Option<(Action, usize)>;

/// Collect nodes until `else`, `end` or the end of input.
fn parse_block(pieces: &[Piece], pos: &mut usize) -> MintResult<(Vec<Node>, Terminator)> {
    let mut nodes = Vec::new();

    while let Some(piece) = pieces.get(*pos) {
        *pos += 1;
        match piece {
            Piece::Text(text) => nodes.push(Node::Text(text.clone())),
            Piece::Action { action, at } => match action {
                Action::Output(path) => nodes.push(Node::Output {
                    path: path.clone(),
                    at: *at,
                }),
                Action::If(cond) => nodes.push(parse_if(pieces, pos, cond.clone(), *at)?),
                Action::Range(path) => nodes.push(parse_range(pieces, pos, path.clone(), *at)?),
                Action::Else(_) | Action::End => return Ok((nodes, Some((action.clone(), *at)))),
            },
        }
    }

    Ok((nodes, None))
}

fn parse_if(pieces: &[Piece], pos: &mut usize, cond: Cond, at: usize) -> MintResult<Node> {
    let (then, term) = parse_block(pieces, pos)?;
    let otherwise = match term {
        Some((Action::End, _)) => Vec::new(),
        Some((Action::Else(None), _)) => {
            let (nodes, term) = parse_block(pieces, pos)?;
            expect_end(term, "if", at)?;
            nodes
        }
        // `else if` shares the closing `end` of the outer `if`
        Some((Action::Else(Some(next)), else_at)) => vec![parse_if(pieces, pos, next, else_at)?],
        _ => return Err(MintError::template(at, "unclosed if")),
    };
    Ok(Node::If {
        cond,
        then,
        otherwise,
    })
}

fn parse_range(pieces: &[Piece], pos: &mut usize, path: Path, at: usize) -> MintResult<Node> {
    let (body, term) = parse_block(pieces, pos)?;
    let otherwise = match term {
        Some((Action::End, _)) => Vec::new(),
        Some((Action::Else(None), _)) => {
            let (nodes, term) = parse_block(pieces, pos)?;
            expect_end(term, "range", at)?;
            nodes
        }
        Some((Action::Else(Some(_)), else_at)) => {
            return Err(MintError::template(else_at, "else if is not allowed in range"));
        }
        _ => return Err(MintError::template(at, "unclosed range")),
    };
    Ok(Node::Range {
        path,
        at,
        body,
        otherwise,
    })
}

fn expect_end(term: Terminator, block: &str, at: usize) -> MintResult<()> {
    match term {
        Some((Action::End, _)) => Ok(()),
        Some((action, other)) => Err(MintError::template(
            other,
            format!("unexpected {} in {}", action_keyword(&action), block),
        )),
        None => Err(MintError::template(at, format!("unclosed {}", block))),
    }
}

fn action_keyword(action: &Action) -> &'static str {
    match action {
        Action::Output(_) => "output",
        Action::If(_) => "if",
        Action::Else(_) => "else",
        Action::Range(_) => "range",
        Action::End => "end",
    }
}

// ==================== Execution ====================

fn exec(nodes: &[Node], dot: &Value, root: &Value, out: &mut String) -> MintResult<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output { path, at } => {
                let v = resolve(path, dot, root)
                    .ok_or_else(|| MintError::template(*at, format!("no value for '{}'", path)))?;
                out.push_str(&v.to_string());
            }
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if eval(cond, dot, root) { then } else { otherwise };
                exec(branch, dot, root, out)?;
            }
            Node::Range {
                path,
                at,
                body,
                otherwise,
            } => {
                let items: Vec<&Value> = match resolve(path, dot, root) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::List(items)) => items.iter().collect(),
                    Some(Value::Map(m)) => m.values().collect(),
                    Some(other) => {
                        return Err(MintError::template(
                            *at,
                            format!("cannot range over '{}' ({})", path, other),
                        ));
                    }
                };
                if items.is_empty() {
                    exec(otherwise, dot, root, out)?;
                }
                for item in items {
                    exec(body, item, root, out)?;
                }
            }
        }
    }
    Ok(())
}

fn resolve<'a>(path: &Path, dot: &'a Value, root: &'a Value) -> Option<&'a Value> {
    let (start, segments) = match path {
        Path::Dot(s) => (dot, s),
        Path::Root(s) => (root, s),
    };
    segments.iter().try_fold(start, |current, seg| current.get(seg))
}

/// Missing values evaluate as null.
fn eval(cond: &Cond, dot: &Value, root: &Value) -> bool {
    let get = |path: &Path| resolve(path, dot, root).cloned().unwrap_or(Value::Null);
    match cond {
        Cond::Truthy(path) => get(path).is_truthy(),
        Cond::Not(path) => !get(path).is_truthy(),
        Cond::Eq(path, lit) => loosely_equal(&get(path), lit),
        Cond::Ne(path, lit) => !loosely_equal(&get(path), lit),
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        _ => a == b,
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, segments) = match self {
            Path::Dot(s) => ("", s),
            Path::Root(s) => ("$", s),
        };
        if segments.is_empty() {
            return write!(f, "{}", if prefix.is_empty() { "." } else { prefix });
        }
        write!(f, "{}.{}", prefix, segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ctx(pairs: &[(&str, Value)]) -> Value {
        let map: BTreeMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Value::Map(map)
    }

    fn render(src: &str, context: &Value) -> String {
        Template::parse(src).unwrap().render(context).unwrap()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render("SELECT 1", &Value::Null), "SELECT 1");
    }

    #[test]
    fn test_output() {
        let c = ctx(&[("table", Value::from("users"))]);
        assert_eq!(render("SELECT * FROM {{ .table }}", &c), "SELECT * FROM users");
    }

    #[test]
    fn test_if_else_trim() {
        let src = "SELECT * FROM t WHERE 1=1 {{- if .name }} AND name = #{name}{{ else }} AND name IS NULL{{ end }}";
        assert_eq!(
            render(src, &ctx(&[("name", Value::from("ann"))])),
            "SELECT * FROM t WHERE 1=1 AND name = #{name}"
        );
        assert_eq!(
            render(src, &ctx(&[("name", Value::from(""))])),
            "SELECT * FROM t WHERE 1=1 AND name IS NULL"
        );
    }

    #[test]
    fn test_else_if_chain() {
        let src = "{{ if eq .s \"a\" }}A{{ else if eq .s 2 }}TWO{{ else if not .s }}NONE{{ else }}OTHER{{ end }}";
        assert_eq!(render(src, &ctx(&[("s", Value::from("a"))])), "A");
        assert_eq!(render(src, &ctx(&[("s", Value::Int(2))])), "TWO");
        assert_eq!(render(src, &ctx(&[])), "NONE");
        assert_eq!(render(src, &ctx(&[("s", Value::from("z"))])), "OTHER");
    }

    #[test]
    fn test_range_with_root() {
        let c = ctx(&[
            ("cols", Value::List(vec![Value::from("a"), Value::from("b")])),
            ("sep", Value::from(",")),
        ]);
        assert_eq!(render("{{ range .cols }}{{ . }}{{ $.sep }}{{ end }}", &c), "a,b,");
        assert_eq!(
            render("{{ range .missing }}x{{ else }}empty{{ end }}", &c),
            "empty"
        );
    }

    #[test]
    fn test_right_trim() {
        let c = ctx(&[("x", Value::Int(1))]);
        assert_eq!(render("a {{ .x -}}   b", &c), "a 1b");
    }

    #[test]
    fn test_missing_output_fails() {
        let err = Template::parse("x {{ .nope }}").unwrap().render(&ctx(&[])).unwrap_err();
        assert_eq!(err.to_string(), "Template error at position 2: no value for '.nope'");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Template::parse("a {{ if .x }}b"), Err(MintError::Template { position: 2, .. })));
        assert!(matches!(Template::parse("a {{ end }}"), Err(MintError::Template { position: 2, .. })));
        assert!(matches!(Template::parse("a {{ .x "), Err(MintError::Template { position: 2, .. })));
        assert!(Template::parse("{{ bogus }}").is_err());
        assert!(Template::parse("{{ range .x }}{{ else if .y }}{{ end }}").is_err());
    }

    #[test]
    fn test_out_of_range_literal() {
        let err = Template::parse("x {{ if eq .n 99999999999999999999 }}y{{ end }}").unwrap_err();
        assert!(matches!(err, MintError::Template { position: 2, .. }));

        let c = ctx(&[("n", Value::Int(-42))]);
        assert_eq!(render("{{ if eq .n -42 }}neg{{ end }}", &c), "neg");
    }

    #[test]
    fn test_is_template() {
        assert!(is_template("SELECT {{ .x }}"));
        assert!(!is_template("SELECT #{x}"));
    }
}
