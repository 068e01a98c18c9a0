//! Static reader for `setup.py`.
//!
//! The file is tokenized, never executed. The first `setup(...)` call is
//! located and its keyword arguments are read as Python literals: strings
//! (with prefixes, escapes, triple quotes and implicit concatenation),
//! lists and tuples, `True`/`False`/`None`, numbers, and calls such as
//! `find_packages(exclude=["tests"])`. Anything else is an opaque
//! expression, which is an error only when it appears in a field the
//! descriptor needs.

use crate::error::{PythonError, Result};
use crate::types::{DiscoveryRule, ManifestFormat, PackageSelection};
use std::collections::HashMap;
use std::path::PathBuf;

use super::RawDescriptor;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    /// `literal` is false for f-strings and bytes, whose value is not a
    /// plain `str` constant.
    Str {
        value: String,
        literal: bool,
    },
    Number(String),
    Op(char),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                line += 1;
                i += 2;
            }
            c if c.is_whitespace() => i += 1,
            '"' | '\'' => {
                let scanned = scan_string(&chars, i, false, line)?;
                tokens.push(Token {
                    tok: Tok::Str {
                        value: scanned.value,
                        literal: true,
                    },
                    line,
                });
                line += scanned.newlines;
                i = scanned.end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();

                if matches!(chars.get(i), Some('"' | '\'')) && is_string_prefix(&ident) {
                    let prefix = ident.to_ascii_lowercase();
                    let scanned = scan_string(&chars, i, prefix.contains('r'), line)?;
                    tokens.push(Token {
                        tok: Tok::Str {
                            value: scanned.value,
                            literal: !prefix.contains('f') && !prefix.contains('b'),
                        },
                        line,
                    });
                    line += scanned.newlines;
                    i = scanned.end;
                } else {
                    tokens.push(Token {
                        tok: Tok::Name(ident),
                        line,
                    });
                }
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_')
                {
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Number(chars[start..i].iter().collect()),
                    line,
                });
            }
            other => {
                tokens.push(Token {
                    tok: Tok::Op(other),
                    line,
                });
                i += 1;
            }
        }
    }

    Ok(tokens)
}

fn is_string_prefix(ident: &str) -> bool {
    matches!(
        ident.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

struct ScannedString {
    value: String,
    end: usize,
    newlines: usize,
}

fn scan_string(chars: &[char], start: usize, raw: bool, line: usize) -> Result<ScannedString> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = start + if triple { 3 } else { 1 };
    let mut value = String::new();
    let mut newlines = 0;

    let unterminated = || PythonError::setup_parse(line, "unterminated string literal");

    loop {
        let Some(&c) = chars.get(i) else {
            return Err(unterminated());
        };

        if c == quote {
            if !triple {
                return Ok(ScannedString {
                    value,
                    end: i + 1,
                    newlines,
                });
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok(ScannedString {
                    value,
                    end: i + 3,
                    newlines,
                });
            }
            value.push(c);
            i += 1;
            continue;
        }

        if c == '\n' {
            if !triple {
                return Err(unterminated());
            }
            newlines += 1;
            value.push(c);
            i += 1;
            continue;
        }

        if c == '\\' {
            let Some(&next) = chars.get(i + 1) else {
                return Err(unterminated());
            };
            if next == '\n' {
                newlines += 1;
            }
            i += 2;
            if raw {
                value.push('\\');
                value.push(next);
                continue;
            }
            match next {
                '\n' => {}
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                'a' => value.push('\u{7}'),
                'b' => value.push('\u{8}'),
                'f' => value.push('\u{c}'),
                'v' => value.push('\u{b}'),
                '0'..='7' => value.push(scan_octal_escape(chars, &mut i, next)),
                'N' => {
                    return Err(PythonError::setup_parse(
                        line + newlines,
                        "named unicode escapes are not supported",
                    ));
                }
                '\\' | '\'' | '"' => value.push(next),
                'x' => value.push(scan_hex_escape(chars, &mut i, 2, line + newlines)?),
                'u' => value.push(scan_hex_escape(chars, &mut i, 4, line + newlines)?),
                'U' => value.push(scan_hex_escape(chars, &mut i, 8, line + newlines)?),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
            continue;
        }

        value.push(c);
        i += 1;
    }
}

// Up to three octal digits; the first one was already consumed.
fn scan_octal_escape(chars: &[char], i: &mut usize, first: char) -> char {
    let mut code = first.to_digit(8).unwrap_or(0);
    for _ in 0..2 {
        match chars.get(*i).and_then(|c| c.to_digit(8)) {
            Some(digit) => {
                code = code * 8 + digit;
                *i += 1;
            }
            None => break,
        }
    }
    // At most 0o777, always a valid scalar value
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}

fn scan_hex_escape(chars: &[char], i: &mut usize, digits: usize, line: usize) -> Result<char> {
    let end = *i + digits;
    let hex: String = chars.get(*i..end).unwrap_or_default().iter().collect();
    let decoded = (hex.len() == digits)
        .then(|| u32::from_str_radix(&hex, 16).ok())
        .flatten()
        .and_then(char::from_u32)
        .ok_or_else(|| PythonError::setup_parse(line, "invalid escape sequence"))?;
    *i = end;
    Ok(decoded)
}

/// A Python value as far as a static reader can know it.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    List(Vec<Value>),
    Bool(bool),
    None,
    Number(String),
    Call { callee: String, args: Vec<Arg> },
    /// Any expression that is not a literal
    Expr,
}

#[derive(Debug, Clone, PartialEq)]
struct Arg {
    keyword: Option<String>,
    value: Value,
    line: usize,
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Tok> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Tok> {
        self.tokens.get(self.pos + offset).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_value_end(&self) -> bool {
        matches!(self.peek(), None | Some(Tok::Op(',' | ')' | ']' | '}')))
    }

    /// Consumes arguments after an opening `(` up to and including `)`.
    fn parse_args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();

        loop {
            let line = self.line();
            match self.peek() {
                None => return Err(PythonError::setup_parse(line, "unclosed '('")),
                Some(Tok::Op(')')) => {
                    self.bump();
                    return Ok(args);
                }
                Some(Tok::Op('*')) => {
                    while self.peek() == Some(&Tok::Op('*')) {
                        self.bump();
                    }
                    self.skip_expression();
                    args.push(Arg {
                        keyword: None,
                        value: Value::Expr,
                        line,
                    });
                }
                Some(Tok::Name(name))
                    if self.peek_at(1) == Some(&Tok::Op('='))
                        && self.peek_at(2) != Some(&Tok::Op('=')) =>
                {
                    self.pos += 2;
                    let value = self.parse_value()?;
                    args.push(Arg {
                        keyword: Some(name.clone()),
                        value,
                        line,
                    });
                }
                Some(_) => {
                    let value = self.parse_value()?;
                    args.push(Arg {
                        keyword: None,
                        value,
                        line,
                    });
                }
            }

            match self.peek() {
                Some(Tok::Op(',')) => self.bump(),
                Some(Tok::Op(')')) => {}
                None => return Err(PythonError::setup_parse(self.line(), "unclosed '('")),
                Some(_) => {
                    return Err(PythonError::setup_parse(
                        self.line(),
                        "expected ',' or ')' after argument",
                    ));
                }
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        if self.at_value_end() {
            return Err(PythonError::setup_parse(self.line(), "expected a value"));
        }

        let value = self.parse_atom()?;
        if self.at_value_end() {
            Ok(value)
        } else {
            self.skip_expression();
            Ok(Value::Expr)
        }
    }

    fn parse_atom(&mut self) -> Result<Value> {
        match self.peek() {
            Some(Tok::Str { .. }) => {
                let mut joined = String::new();
                let mut literal = true;
                while let Some(Tok::Str { value, literal: is_literal }) = self.peek() {
                    joined.push_str(value);
                    literal &= *is_literal;
                    self.bump();
                }
                Ok(if literal { Value::Str(joined) } else { Value::Expr })
            }
            Some(Tok::Number(number)) => {
                self.bump();
                Ok(Value::Number(number.clone()))
            }
            Some(Tok::Name(name)) => {
                self.bump();
                match name.as_str() {
                    "True" => return Ok(Value::Bool(true)),
                    "False" => return Ok(Value::Bool(false)),
                    "None" => return Ok(Value::None),
                    _ => {}
                }

                let mut callee = name.clone();
                while let (Some(Tok::Op('.')), Some(Tok::Name(part))) =
                    (self.peek(), self.peek_at(1))
                {
                    callee.push('.');
                    callee.push_str(part);
                    self.pos += 2;
                }

                if self.peek() == Some(&Tok::Op('(')) {
                    self.bump();
                    let args = self.parse_args()?;
                    Ok(Value::Call { callee, args })
                } else {
                    Ok(Value::Expr)
                }
            }
            Some(Tok::Op('[')) => {
                self.bump();
                let (items, _) = self.parse_sequence(']')?;
                Ok(Value::List(items))
            }
            Some(Tok::Op('(')) => {
                self.bump();
                let (mut items, trailing_comma) = self.parse_sequence(')')?;
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Value::List(items))
                }
            }
            // Dicts, unary operators, lambdas: left for `skip_expression`.
            Some(_) => Ok(Value::Expr),
            None => Err(PythonError::setup_parse(
                self.line(),
                "unexpected end of file",
            )),
        }
    }

    /// Consumes list or tuple items up to and including `close`.
    ///
    /// Returns the items and whether the last item had a trailing comma.
    fn parse_sequence(&mut self, close: char) -> Result<(Vec<Value>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;

        loop {
            match self.peek() {
                None => {
                    return Err(PythonError::setup_parse(
                        self.line(),
                        format!("unclosed bracket, expected '{}'", close),
                    ));
                }
                Some(Tok::Op(c)) if *c == close => {
                    self.bump();
                    return Ok((items, trailing_comma));
                }
                Some(Tok::Op('*')) => {
                    self.bump();
                    self.skip_expression();
                    items.push(Value::Expr);
                }
                Some(_) => items.push(self.parse_value()?),
            }

            trailing_comma = false;
            match self.peek() {
                Some(Tok::Op(',')) => {
                    self.bump();
                    trailing_comma = true;
                }
                Some(Tok::Op(c)) if *c == close => {}
                None => {}
                Some(_) => {
                    return Err(PythonError::setup_parse(
                        self.line(),
                        format!("expected ',' or '{}'", close),
                    ));
                }
            }
        }
    }

    /// Skips to the next top-level `,` or closing bracket without consuming it.
    fn skip_expression(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::Op('(' | '[' | '{') => depth += 1,
                Tok::Op(')' | ']' | '}') => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                Tok::Op(',') if depth == 0 => return,
                _ => {}
            }
            self.bump();
        }
    }
}

/// Index of the `setup` name token of the first `setup(` call.
///
/// Accepts `setup(` and `setuptools.setup(`; ignores `def setup(` and
/// calls on other objects.
fn find_setup_call(tokens: &[Token]) -> Option<usize> {
    tokens.iter().enumerate().position(|(i, token)| {
        if token.tok != Tok::Name("setup".into()) {
            return false;
        }
        if tokens.get(i + 1).map(|t| &t.tok) != Some(&Tok::Op('(')) {
            return false;
        }
        match i.checked_sub(1).map(|p| &tokens[p].tok) {
            None => true,
            Some(Tok::Name(prev)) => prev != "def",
            Some(Tok::Op('.')) => {
                i >= 2 && tokens[i - 2].tok == Tok::Name("setuptools".into())
            }
            Some(_) => true,
        }
    })
}

const SETUP_PY: &str = "setup.py";

/// Reads the descriptor fields out of `setup.py` source.
pub(super) fn read_setup_py(content: &str) -> Result<RawDescriptor> {
    let tokens = tokenize(content)?;

    let Some(call) = find_setup_call(&tokens) else {
        let line = tokens.last().map_or(1, |t| t.line);
        return Err(PythonError::setup_parse(line, "no setup() call found"));
    };

    let mut cursor = Cursor {
        tokens: &tokens,
        pos: call + 2,
    };
    let args = cursor.parse_args()?;

    let mut fields: HashMap<String, (Value, usize)> = HashMap::new();
    for arg in args {
        let Some(keyword) = arg.keyword else {
            continue;
        };
        if fields.contains_key(&keyword) {
            return Err(PythonError::setup_parse(
                arg.line,
                format!("keyword argument repeated: {}", keyword),
            ));
        }
        fields.insert(keyword, (arg.value, arg.line));
    }

    for key in fields.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            tracing::debug!("ignoring setup() argument '{}'", key);
        }
    }

    let name = take_string(&mut fields, "name")?
        .ok_or_else(|| PythonError::missing_field(SETUP_PY, "name"))?;
    let version = take_string(&mut fields, "version")?
        .ok_or_else(|| PythonError::missing_field(SETUP_PY, "version"))?;
    let description = take_string(&mut fields, "description")?;
    let python_requires = take_string(&mut fields, "python_requires")?;
    let dependencies = take_requirements(&mut fields)?;
    let packages = take_packages(&mut fields)?;

    Ok(RawDescriptor {
        name,
        version,
        description,
        packages,
        dependencies,
        python_requires,
        format: ManifestFormat::SetupPy,
    })
}

const KNOWN_FIELDS: &[&str] = &[
    "name",
    "version",
    "description",
    "packages",
    "install_requires",
    "python_requires",
];

fn take_string(fields: &mut HashMap<String, (Value, usize)>, field: &str) -> Result<Option<String>> {
    match fields.remove(field) {
        None | Some((Value::None, _)) => Ok(None),
        Some((Value::Str(s), _)) => Ok(Some(s)),
        Some((Value::Expr | Value::Call { .. }, _)) => Err(PythonError::NonLiteralField {
            field: field.to_string(),
        }),
        Some(_) => Err(PythonError::invalid_field(field, "expected a string")),
    }
}

fn string_items(field: &str, items: Vec<Value>) -> Result<Vec<String>> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Str(s) => Ok(s),
            Value::Expr | Value::Call { .. } => Err(PythonError::NonLiteralField {
                field: field.to_string(),
            }),
            _ => Err(PythonError::invalid_field(field, "expected a list of strings")),
        })
        .collect()
}

/// `install_requires` as a list of requirement strings.
///
/// A single string is split into lines, like setuptools does.
fn take_requirements(fields: &mut HashMap<String, (Value, usize)>) -> Result<Vec<String>> {
    const FIELD: &str = "install_requires";
    match fields.remove(FIELD) {
        None | Some((Value::None, _)) => Ok(Vec::new()),
        Some((Value::List(items), _)) => string_items(FIELD, items),
        Some((Value::Str(block), _)) => Ok(block
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect()),
        Some((Value::Expr | Value::Call { .. }, _)) => Err(PythonError::NonLiteralField {
            field: FIELD.to_string(),
        }),
        Some(_) => Err(PythonError::invalid_field(FIELD, "expected a list of strings")),
    }
}

fn take_packages(fields: &mut HashMap<String, (Value, usize)>) -> Result<PackageSelection> {
    const FIELD: &str = "packages";
    match fields.remove(FIELD) {
        None => Ok(PackageSelection::default()),
        Some((Value::None, _)) => Ok(PackageSelection::Explicit {
            packages: Vec::new(),
        }),
        Some((Value::List(items), _)) => Ok(PackageSelection::Explicit {
            packages: string_items(FIELD, items)?,
        }),
        Some((Value::Call { callee, args }, line)) => discovery_call(&callee, args, line),
        Some((Value::Expr, _)) => Err(PythonError::NonLiteralField {
            field: FIELD.to_string(),
        }),
        Some(_) => Err(PythonError::invalid_field(
            FIELD,
            "expected a list of package names or a find_packages() call",
        )),
    }
}

/// Translates `find_packages(...)` / `find_namespace_packages(...)`.
fn discovery_call(callee: &str, args: Vec<Arg>, line: usize) -> Result<PackageSelection> {
    let function = callee.rsplit('.').next().unwrap_or(callee);
    let namespaces = match function {
        "find_packages" => false,
        "find_namespace_packages" => true,
        _ => {
            return Err(PythonError::NonLiteralField {
                field: "packages".to_string(),
            });
        }
    };

    let mut rule = DiscoveryRule {
        namespaces,
        ..DiscoveryRule::default()
    };

    for (position, arg) in args.into_iter().enumerate() {
        let keyword = match (&arg.keyword, position) {
            (Some(keyword), _) => keyword.as_str(),
            (None, 0) => "where",
            (None, 1) => "exclude",
            (None, 2) => "include",
            (None, _) => {
                return Err(PythonError::setup_parse(
                    line,
                    format!("too many positional arguments to {}()", function),
                ));
            }
        };

        match (keyword, arg.value) {
            ("where", Value::Str(root)) => rule.root = PathBuf::from(root),
            ("exclude", Value::List(items)) => rule.exclude = string_items("exclude", items)?,
            ("include", Value::List(items)) => rule.include = string_items("include", items)?,
            (field @ ("where" | "exclude" | "include"), Value::Expr | Value::Call { .. }) => {
                return Err(PythonError::NonLiteralField {
                    field: field.to_string(),
                });
            }
            (field @ ("where" | "exclude" | "include"), _) => {
                return Err(PythonError::invalid_field(
                    field,
                    "unsupported value in package discovery call",
                ));
            }
            (other, _) => {
                return Err(PythonError::setup_parse(
                    arg.line,
                    format!("unexpected argument '{}' to {}()", other, function),
                ));
            }
        }
    }

    Ok(PackageSelection::Discover(rule))
}
