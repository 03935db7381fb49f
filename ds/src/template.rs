//! A small, sandboxed template language used to compute release asset names.
//!
//! A template is text with actions embedded in `{{ ... }}`:
//!
//! - `{{ .OS }}` inserts a context field. Referring to a field that isn't in the context is an
//!   error at render time.
//! - `{{ $arch := .Arch }}` declares a variable in the current scope and `{{ $arch = "arm" }}`
//!   assigns to the innermost variable with that name. Variables must be declared before use,
//!   which is checked when the template is parsed.
//! - `{{ if ... }}`, `{{ else if ... }}`, `{{ else }}` and `{{ end }}` are conditionals. Each
//!   branch is its own variable scope. Only `false` and the empty string are false.
//! - `{{ ToLower $os }}` calls a function. The set of functions is fixed: `eq`, `ne`, `not`,
//!   `and`, `or`, `HasPrefix`, `HasSuffix`, `ToLower` and `ToUpper`.
//! - `{{ .OS | ToLower }}` pipes the result of one command into the last argument of the next.
//! - `{{- ` and ` -}}` trim the whitespace before and after an action, and `{{/* ... */}}` is a
//!   comment.
//!
//! Rendering has no side effects and never touches anything outside of the context it is given.
use crate::error::GetError;
use anyhow::Result;
use std::{collections::HashMap, fmt, str::FromStr};
use strum::{AsRefStr, EnumString};

/// The values a template can see through `.Field` references.
pub type Context<'a> = HashMap<&'a str, String>;

#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parses a template. The name is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns a [`GetError::Template`] when the template has a syntax error, calls an unknown
    /// function, or refers to a variable which was never declared.
    pub fn parse(name: &str, source: &str) -> Result<Template> {
        let nodes = split(source)
            .and_then(|items| Parser::new(items).parse())
            .map_err(|e| GetError::template(format!("{name}: {e}")))?;
        Ok(Template {
            name: name.to_string(),
            nodes,
        })
    }

    /// Renders the template against the given context.
    ///
    /// # Errors
    ///
    /// Returns a [`GetError::Template`] when the template refers to a field which is not in the
    /// context or passes the wrong kind of value to a function.
    pub fn render(&self, context: &Context<'_>) -> Result<String> {
        let mut eval = Evaluator {
            context,
            scopes: vec![vec![]],
        };
        let mut out = String::new();
        eval.exec_list(&self.nodes, &mut out)
            .map_err(|e| GetError::template(format!("{}: {e}", self.name)))?;
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String),
    Bool(bool),
}

impl Value {
    fn is_true(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    fn as_str(&self, func: Func) -> Result<&str, String> {
        match self {
            Value::Str(s) => Ok(s),
            Value::Bool(b) => Err(format!(
                "{} expects string arguments but was given the boolean {b}",
                func.as_ref()
            )),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(AsRefStr, Clone, Copy, Debug, EnumString, PartialEq, Eq)]
enum Func {
    #[strum(serialize = "eq")]
    Eq,
    #[strum(serialize = "ne")]
    Ne,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    HasPrefix,
    HasSuffix,
    ToLower,
    ToUpper,
}

impl Func {
    fn check_arity(self, n: usize) -> Result<(), String> {
        let ok = match self {
            Func::Eq => n >= 2,
            Func::And | Func::Or => n >= 1,
            Func::Ne | Func::HasPrefix | Func::HasSuffix => n == 2,
            Func::Not | Func::ToLower | Func::ToUpper => n == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(format!(
                "wrong number of arguments for {}: got {n}",
                self.as_ref()
            ))
        }
    }

    fn call(self, args: Vec<Value>) -> Result<Value, String> {
        Ok(match self {
            Func::Eq => {
                let (first, rest) = args.split_first().ok_or("eq needs arguments")?;
                let mut found = false;
                for other in rest {
                    if std::mem::discriminant(first) != std::mem::discriminant(other) {
                        return Err(format!("incompatible types for comparison: {first} and {other}"));
                    }
                    found |= first == other;
                }
                Value::Bool(found)
            }
            Func::Ne => {
                if std::mem::discriminant(&args[0]) != std::mem::discriminant(&args[1]) {
                    return Err(format!(
                        "incompatible types for comparison: {} and {}",
                        args[0], args[1],
                    ));
                }
                Value::Bool(args[0] != args[1])
            }
            Func::Not => Value::Bool(!args[0].is_true()),
            Func::And => {
                let last = args.len() - 1;
                args.into_iter()
                    .enumerate()
                    .find(|(i, v)| !v.is_true() || *i == last)
                    .map(|(_, v)| v)
                    .ok_or("and needs arguments")?
            }
            Func::Or => {
                let last = args.len() - 1;
                args.into_iter()
                    .enumerate()
                    .find(|(i, v)| v.is_true() || *i == last)
                    .map(|(_, v)| v)
                    .ok_or("or needs arguments")?
            }
            Func::HasPrefix => Value::Bool(args[0].as_str(self)?.starts_with(args[1].as_str(self)?)),
            Func::HasSuffix => Value::Bool(args[0].as_str(self)?.ends_with(args[1].as_str(self)?)),
            Func::ToLower => Value::Str(args[0].as_str(self)?.to_lowercase()),
            Func::ToUpper => Value::Str(args[0].as_str(self)?.to_uppercase()),
        })
    }
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Output(Pipeline),
    Declare(String, Pipeline),
    Assign(String, Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
}

#[derive(Debug, Clone)]
struct Pipeline(Vec<Command>);

#[derive(Debug, Clone)]
enum Command {
    Operand(Operand),
    Call(Func, Vec<Operand>),
}

#[derive(Debug, Clone)]
enum Operand {
    Field(String),
    Variable(String),
    Literal(Value),
    Nested(Pipeline),
}

// ---- lexing ----

#[derive(Debug)]
enum Item {
    Text(String),
    Action(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Field(String),
    Variable(String),
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Pipe,
    Declare,
    Assign,
}

fn split(source: &str) -> Result<Vec<Item>, String> {
    let mut items = vec![];
    let mut rest = source;
    let mut trim_next = false;

    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let trim_left = is_trim_marker(after_open);
        push_text(&mut items, &rest[..start], trim_next, trim_left);

        let body_start = usize::from(trim_left);
        let end = find_action_end(&after_open[body_start..])
            .ok_or_else(|| format!("unclosed action starting at {:?}", truncate(after_open)))?;
        let mut body = &after_open[body_start..body_start + end];

        trim_next = body.len() >= 2
            && body.ends_with('-')
            && body[..body.len() - 1].ends_with(char::is_whitespace);
        if trim_next {
            body = &body[..body.len() - 1];
        }

        let body = body.trim();
        if body.starts_with("/*") {
            if !body.ends_with("*/") {
                return Err(format!("unclosed comment: {}", truncate(body)));
            }
        } else {
            items.push(Item::Action(tokenize(body)?));
        }

        rest = &after_open[body_start + end + 2..];
    }
    push_text(&mut items, rest, trim_next, false);

    Ok(items)
}

fn is_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

// Finds the closing `}}`, skipping over anything inside of string literals or a comment.
fn find_action_end(s: &str) -> Option<usize> {
    if let Some(comment) = s.trim_start().strip_prefix("/*") {
        let after = s.len() - comment.len() + comment.find("*/")? + 2;
        return s[after..].find("}}").map(|i| after + i);
    }

    let bytes = s.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'`' => quote = Some(b),
            None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

fn truncate(s: &str) -> String {
    s.chars().take(20).collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(body: &str) -> Result<Vec<Token>, String> {
    let mut tokens = vec![];
    let mut chars = body.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '|' => tokens.push(Token::Pipe),
            '=' => tokens.push(Token::Assign),
            ':' => {
                if chars.next_if(|&(_, c)| c == '=').is_none() {
                    return Err(format!("expected := in {body:?}"));
                }
                tokens.push(Token::Declare);
            }
            '.' | '$' => {
                let mut name = String::new();
                while let Some((_, c)) = chars.next_if(|&(_, c)| is_ident_char(c)) {
                    name.push(c);
                }
                if name.is_empty() {
                    return Err(format!("bare {c:?} is not supported in {body:?}"));
                }
                tokens.push(if c == '.' {
                    Token::Field(name)
                } else {
                    Token::Variable(name)
                });
            }
            '"' => {
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, c @ ('"' | '\\'))) => s.push(c),
                            Some((_, c)) => return Err(format!("unknown escape sequence \\{c}")),
                            None => return Err("unterminated quoted string".to_string()),
                        },
                        Some((_, c)) => s.push(c),
                        None => return Err("unterminated quoted string".to_string()),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '`' => {
                let rest = &body[i + 1..];
                let end = rest
                    .find('`')
                    .ok_or_else(|| "unterminated raw string".to_string())?;
                tokens.push(Token::Str(rest[..end].to_string()));
                // Skip the raw string's contents and the closing backtick.
                for _ in 0..=rest[..end].chars().count() {
                    chars.next();
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = c.to_string();
                while let Some((_, c)) = chars.next_if(|&(_, c)| is_ident_char(c)) {
                    name.push(c);
                }
                tokens.push(Token::Ident(name));
            }
            c => return Err(format!("unexpected {c:?} in {body:?}")),
        }
    }

    Ok(tokens)
}

// ---- parsing ----

enum Terminator {
    Eof,
    Else,
    ElseIf(Vec<Token>),
    End,
}

struct Parser {
    items: std::vec::IntoIter<Item>,
    scopes: Vec<Vec<String>>,
}

impl Parser {
    fn new(items: Vec<Item>) -> Self {
        Parser {
            items: items.into_iter(),
            scopes: vec![vec![]],
        }
    }

    fn parse(mut self) -> Result<Vec<Node>, String> {
        let (nodes, term) = self.parse_list()?;
        match term {
            Terminator::Eof => Ok(nodes),
            Terminator::Else | Terminator::ElseIf(_) => Err("unexpected {{else}}".to_string()),
            Terminator::End => Err("unexpected {{end}}".to_string()),
        }
    }

    fn parse_list(&mut self) -> Result<(Vec<Node>, Terminator), String> {
        let mut nodes = vec![];
        while let Some(item) = self.items.next() {
            let tokens = match item {
                Item::Text(t) => {
                    nodes.push(Node::Text(t));
                    continue;
                }
                Item::Action(tokens) => tokens,
            };

            match tokens.as_slice() {
                [] => return Err("missing value for command".to_string()),
                [Token::Ident(kw), rest @ ..] if kw == "if" => {
                    let cond = self.parse_pipeline(rest)?;
                    nodes.push(self.parse_if(cond)?);
                }
                [Token::Ident(kw), rest @ ..] if kw == "else" => {
                    return match rest {
                        [] => Ok((nodes, Terminator::Else)),
                        [Token::Ident(kw), cond @ ..] if kw == "if" => {
                            Ok((nodes, Terminator::ElseIf(cond.to_vec())))
                        }
                        _ => Err("unexpected tokens after else".to_string()),
                    };
                }
                [Token::Ident(kw), rest @ ..] if kw == "end" => {
                    if !rest.is_empty() {
                        return Err("unexpected tokens after end".to_string());
                    }
                    return Ok((nodes, Terminator::End));
                }
                [Token::Variable(name), Token::Declare, rest @ ..] => {
                    let pipe = self.parse_pipeline(rest)?;
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.push(name.clone());
                    }
                    nodes.push(Node::Declare(name.clone(), pipe));
                }
                [Token::Variable(name), Token::Assign, rest @ ..] => {
                    self.check_declared(name)?;
                    nodes.push(Node::Assign(name.clone(), self.parse_pipeline(rest)?));
                }
                tokens => nodes.push(Node::Output(self.parse_pipeline(tokens)?)),
            }
        }

        Ok((nodes, Terminator::Eof))
    }

    fn parse_if(&mut self, cond: Pipeline) -> Result<Node, String> {
        let mut branches = vec![];
        let mut cond = cond;
        loop {
            let (body, term) = self.parse_scoped_list()?;
            branches.push((cond, body));
            match term {
                // The condition is outside the scope of the branch before it.
                Terminator::ElseIf(next) => cond = self.parse_pipeline(&next)?,
                Terminator::Else => {
                    let (otherwise, term) = self.parse_scoped_list()?;
                    return match term {
                        Terminator::End => Ok(Node::If {
                            branches,
                            otherwise: Some(otherwise),
                        }),
                        Terminator::Else | Terminator::ElseIf(_) => {
                            Err("expected {{end}} after {{else}} block".to_string())
                        }
                        Terminator::Eof => Err("unexpected EOF in {{if}}".to_string()),
                    };
                }
                Terminator::End => {
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                    })
                }
                Terminator::Eof => return Err("unexpected EOF in {{if}}".to_string()),
            }
        }
    }

    fn parse_scoped_list(&mut self) -> Result<(Vec<Node>, Terminator), String> {
        self.scopes.push(vec![]);
        let res = self.parse_list();
        self.scopes.pop();
        res
    }

    fn check_declared(&self, name: &str) -> Result<(), String> {
        if self.scopes.iter().flatten().any(|n| n == name) {
            Ok(())
        } else {
            Err(format!("undefined variable: ${name}"))
        }
    }

    fn parse_pipeline(&self, tokens: &[Token]) -> Result<Pipeline, String> {
        let mut commands = vec![];
        let mut depth = 0usize;
        let mut start = 0;
        for (i, t) in tokens.iter().enumerate() {
            match t {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth = depth.checked_sub(1).ok_or("unexpected right paren")?;
                }
                Token::Pipe if depth == 0 => {
                    commands.push(self.parse_command(&tokens[start..i], !commands.is_empty())?);
                    start = i + 1;
                }
                Token::Pipe
                | Token::Field(_)
                | Token::Variable(_)
                | Token::Ident(_)
                | Token::Str(_)
                | Token::Declare
                | Token::Assign => {}
            }
        }
        if depth != 0 {
            return Err("unclosed left paren".to_string());
        }
        commands.push(self.parse_command(&tokens[start..], !commands.is_empty())?);
        Ok(Pipeline(commands))
    }

    fn parse_command(&self, tokens: &[Token], piped: bool) -> Result<Command, String> {
        let Some((first, rest)) = tokens.split_first() else {
            return Err("missing value for command".to_string());
        };

        if let Token::Ident(name) = first {
            if !matches!(name.as_str(), "true" | "false") {
                let func = Func::from_str(name)
                    .map_err(|_| format!("function {name:?} not defined"))?;
                let args = self.parse_operands(rest)?;
                func.check_arity(args.len() + usize::from(piped))?;
                return Ok(Command::Call(func, args));
            }
        }

        if piped {
            return Err("only functions can receive piped values".to_string());
        }
        let mut operands = self.parse_operands(tokens)?;
        if operands.len() > 1 {
            return Err("can't give arguments to a non-function".to_string());
        }
        Ok(Command::Operand(operands.remove(0)))
    }

    fn parse_operands(&self, tokens: &[Token]) -> Result<Vec<Operand>, String> {
        let mut operands = vec![];
        let mut i = 0;
        while i < tokens.len() {
            let operand = match &tokens[i] {
                Token::Field(name) => Operand::Field(name.clone()),
                Token::Variable(name) => {
                    self.check_declared(name)?;
                    Operand::Variable(name.clone())
                }
                Token::Str(s) => Operand::Literal(Value::Str(s.clone())),
                Token::Ident(name) if name == "true" => Operand::Literal(Value::Bool(true)),
                Token::Ident(name) if name == "false" => Operand::Literal(Value::Bool(false)),
                Token::LParen => {
                    let close = matching_paren(&tokens[i..])? + i;
                    let nested = self.parse_pipeline(&tokens[i + 1..close])?;
                    i = close;
                    Operand::Nested(nested)
                }
                Token::Ident(name) => {
                    return Err(format!(
                        "function {name:?} must be called inside of parentheses when used as an argument"
                    ))
                }
                Token::RParen | Token::Pipe | Token::Declare | Token::Assign => {
                    return Err(format!("unexpected {:?} in operand list", tokens[i]))
                }
            };
            operands.push(operand);
            i += 1;
        }
        Ok(operands)
    }
}

fn matching_paren(tokens: &[Token]) -> Result<usize, String> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate() {
        match t {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            Token::Field(_)
            | Token::Variable(_)
            | Token::Ident(_)
            | Token::Str(_)
            | Token::Pipe
            | Token::Declare
            | Token::Assign => {}
        }
    }
    Err("unclosed left paren".to_string())
}

// ---- evaluation ----

struct Evaluator<'a, 'c> {
    context: &'a Context<'c>,
    scopes: Vec<Vec<(String, Value)>>,
}

impl Evaluator<'_, '_> {
    fn exec_list(&mut self, nodes: &[Node], out: &mut String) -> Result<(), String> {
        for node in nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Output(pipe) => out.push_str(&self.eval_pipeline(pipe)?.to_string()),
                Node::Declare(name, pipe) => {
                    let value = self.eval_pipeline(pipe)?;
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.push((name.clone(), value));
                    }
                }
                Node::Assign(name, pipe) => {
                    let value = self.eval_pipeline(pipe)?;
                    let slot = self
                        .scopes
                        .iter_mut()
                        .rev()
                        .flat_map(|s| s.iter_mut().rev())
                        .find(|(n, _)| n == name)
                        .ok_or_else(|| format!("undefined variable: ${name}"))?;
                    slot.1 = value;
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut body = otherwise.as_deref();
                    for (cond, branch) in branches {
                        if self.eval_pipeline(cond)?.is_true() {
                            body = Some(branch.as_slice());
                            break;
                        }
                    }
                    if let Some(body) = body {
                        self.scopes.push(vec![]);
                        let res = self.exec_list(body, out);
                        self.scopes.pop();
                        res?;
                    }
                }
            }
        }
        Ok(())
    }

    fn eval_pipeline(&self, pipe: &Pipeline) -> Result<Value, String> {
        let mut piped: Option<Value> = None;
        for command in &pipe.0 {
            let value = match command {
                Command::Operand(op) => self.eval_operand(op)?,
                Command::Call(func, args) => {
                    let mut values = args
                        .iter()
                        .map(|a| self.eval_operand(a))
                        .collect::<Result<Vec<_>, _>>()?;
                    if let Some(p) = piped.take() {
                        values.push(p);
                    }
                    func.call(values)?
                }
            };
            piped = Some(value);
        }
        piped.ok_or_else(|| "empty pipeline".to_string())
    }

    fn eval_operand(&self, op: &Operand) -> Result<Value, String> {
        match op {
            Operand::Field(name) => self
                .context
                .get(name.as_str())
                .map(|v| Value::Str(v.clone()))
                .ok_or_else(|| format!("undefined field: .{name}")),
            Operand::Variable(name) => self
                .scopes
                .iter()
                .rev()
                .flat_map(|s| s.iter().rev())
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| format!("undefined variable: ${name}")),
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Nested(pipe) => self.eval_pipeline(pipe),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn context() -> Context<'static> {
        HashMap::from([
            ("OS", "linux".to_string()),
            ("Arch", "x86_64".to_string()),
            ("Name", "demo".to_string()),
            ("Version", "v1.2.0".to_string()),
        ])
    }

    fn render(source: &str) -> Result<String> {
        Template::parse("test", source)?.render(&context())
    }

    #[rstest]
    #[case::plain_text("demo.tar.gz", "demo.tar.gz")]
    #[case::field("{{.Name}}_{{ .OS }}", "demo_linux")]
    #[case::string_literal(r#"{{ "a\"b" }}"#, r#"a"b"#)]
    #[case::raw_string("{{ `x}}y` }}", "x}}y")]
    #[case::comment("a{{/* ignored */}}b", "ab")]
    #[case::comment_with_quote(r#"{{/* say "hi */}}x"#, "x")]
    #[case::comment_with_braces("{{- /* }} */ -}} x", "x")]
    #[case::trim_markers("a  {{- .OS -}}  b", "alinuxb")]
    #[case::untrimmed_whitespace_is_kept("a {{.OS}} b", "a linux b")]
    #[case::declare_and_use(r#"{{$os := "Linux"}}{{$os}}"#, "Linux")]
    #[case::assign_in_branch(
        r#"{{$ext := "tar.gz"}}{{if eq .OS "linux"}}{{$ext = "zip"}}{{end}}{{$ext}}"#,
        "zip"
    )]
    #[case::else_if(
        r#"{{if eq .OS "darwin"}}mac{{else if eq .OS "linux"}}tux{{else}}other{{end}}"#,
        "tux"
    )]
    #[case::else_branch(r#"{{if eq .Arch "arm64"}}arm{{else}}intel{{end}}"#, "intel")]
    #[case::eq_with_many_args(r#"{{if eq .Arch "armv6l" "x86_64"}}yes{{end}}"#, "yes")]
    #[case::has_prefix(r#"{{if HasPrefix .OS "lin"}}yes{{end}}"#, "yes")]
    #[case::to_lower(r#"{{ ToLower "Darwin" }}"#, "darwin")]
    #[case::pipe("{{ .OS | ToUpper }}", "LINUX")]
    #[case::nested(r#"{{ if not (eq .OS "darwin") }}ok{{ end }}"#, "ok")]
    #[case::and_or(r#"{{ if and (eq .OS "linux") (or false "x") }}ok{{ end }}"#, "ok")]
    #[case::empty_string_is_false(r#"{{$s := ""}}{{if $s}}yes{{else}}no{{end}}"#, "no")]
    #[case::bool_output("{{ eq .OS .OS }}", "true")]
    fn renders(#[case] source: &str, #[case] expect: &str) -> Result<()> {
        assert_eq!(render(source)?, expect);
        Ok(())
    }

    #[rstest]
    #[case::unclosed_action("{{ .OS ", "unclosed action")]
    #[case::unknown_function("{{ Explode .OS }}", "function \"Explode\" not defined")]
    #[case::undeclared_variable("{{ $nope }}", "undefined variable: $nope")]
    #[case::assign_undeclared(r#"{{ $nope = "x" }}"#, "undefined variable: $nope")]
    #[case::variable_out_of_scope(
        r#"{{if true}}{{$x := "a"}}{{end}}{{$x}}"#,
        "undefined variable: $x"
    )]
    #[case::variable_from_if_in_else_if(
        r#"{{if false}}{{$x := "a"}}{{else if $x}}y{{end}}"#,
        "undefined variable: $x"
    )]
    #[case::missing_end("{{ if true }}x", "unexpected EOF")]
    #[case::stray_end("x{{ end }}", "unexpected {{end}}")]
    #[case::stray_else("x{{ else }}", "unexpected {{else}}")]
    #[case::wrong_arity("{{ ToLower }}", "wrong number of arguments for ToLower")]
    #[case::args_to_non_function(r#"{{ "a" "b" }}"#, "non-function")]
    #[case::unterminated_string(r#"{{ "abc }}"#, "unclosed action")]
    fn parse_errors(#[case] source: &str, #[case] expect: &str) {
        let err = Template::parse("test", source).expect_err("template should not parse");
        assert!(
            matches!(err.downcast_ref::<GetError>(), Some(GetError::Template(_))),
            "got a template error for {source:?}",
        );
        let msg = err.to_string();
        assert!(msg.contains(expect), "{msg:?} contains {expect:?}");
    }

    #[rstest]
    #[case::undefined_field("{{ .Nope }}", "undefined field: .Nope")]
    #[case::bool_to_string_function("{{ ToLower true }}", "expects string arguments")]
    #[case::incompatible_comparison(r#"{{ eq true "true" }}"#, "incompatible types")]
    fn render_errors(#[case] source: &str, #[case] expect: &str) -> Result<()> {
        let template = Template::parse("test", source)?;
        let err = template
            .render(&context())
            .expect_err("template should not render");
        let msg = err.to_string();
        assert!(msg.contains(expect), "{msg:?} contains {expect:?}");
        Ok(())
    }

    #[test]
    fn rendering_is_idempotent() -> Result<()> {
        let template = Template::parse(
            "test",
            r#"{{$a := .Arch}}{{if eq .Arch "x86_64"}}{{$a = "amd64"}}{{end}}{{.Name}}_{{$a}}"#,
        )?;
        let first = template.render(&context())?;
        assert_eq!(first, "demo_amd64");
        assert_eq!(template.render(&context())?, first);
        Ok(())
    }
}
