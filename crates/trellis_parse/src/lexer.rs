//! Reference tokenizer for manifest text.
//!
//! Token patterns are anchored regexes tried in order at the current
//! position; the first match wins.

use crate::error::{ParseError, ParseResult};
use crate::token::{TemplatePart, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;
use trellis_core::Location;

#[derive(Debug, Clone, Copy)]
enum Rule {
    Skip,
    Variable,
    TypeName,
    Word,
    Integer,
    SingleQuoted,
    DoubleQuoted,
    Symbol,
}

static RULES: Lazy<Vec<(Regex, Rule)>> = Lazy::new(|| {
    [
        (r"\A\s+", Rule::Skip),
        (r"\A#[^\n]*", Rule::Skip),
        (r"\A(?s)/\*.*?\*/", Rule::Skip),
        (r"\A\$(?:::)?[A-Za-z_]\w*(?:::[A-Za-z_]\w*)*", Rule::Variable),
        (r"\A(?:::)?[A-Z]\w*(?:::[A-Za-z_]\w*)*", Rule::TypeName),
        (r"\A(?:::)?[a-z_]\w*(?:::[a-z_]\w*)*", Rule::Word),
        (r"\A\d+", Rule::Integer),
        (r"\A'(?:[^'\\]|\\.)*'", Rule::SingleQuoted),
        (r#"\A"(?:[^"\\]|\\.)*""#, Rule::DoubleQuoted),
        (r"\A(?:=>|==|!=|->|~>|[{}()\[\],:;=!])", Rule::Symbol),
    ]
    .into_iter()
    .map(|(pattern, rule)| (Regex::new(pattern).expect("valid token pattern"), rule))
    .collect()
});

/// Tokenize manifest text
///
/// The returned stream always ends with an [`TokenKind::Eof`] token.
///
/// # Errors
///
/// Returns error on characters that start no token, unterminated strings
/// or comments, and out-of-range integers
pub fn lex(file: &str, text: &str) -> ParseResult<Vec<Token>> {
    Lexer::new(file, text).tokenize()
}

struct Lexer<'a> {
    file: &'a str,
    text: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(file: &'a str, text: &'a str) -> Self {
        Self {
            file,
            text,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn location(&self) -> Location {
        Location::new(self.file, self.line, self.column)
    }

    fn tokenize(mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        let text = self.text;
        while self.pos < text.len() {
            let rest = &text[self.pos..];
            let location = self.location();
            let Some((lexeme, rule)) = RULES
                .iter()
                .find_map(|(re, rule)| re.find(rest).map(|m| (m.as_str(), *rule)))
            else {
                return Err(self.unmatched(rest, location));
            };

            let kind = match rule {
                Rule::Skip => None,
                Rule::Variable => Some(TokenKind::Variable(lexeme[1..].to_string())),
                Rule::TypeName => Some(TokenKind::TypeName(lexeme.to_string())),
                Rule::Word => {
                    Some(TokenKind::keyword(lexeme).unwrap_or_else(|| TokenKind::Name(lexeme.to_string())))
                }
                Rule::Integer => {
                    let value = lexeme.parse().map_err(|_| ParseError::InvalidNumber {
                        text: lexeme.to_string(),
                        location: location.clone(),
                    })?;
                    Some(TokenKind::Integer(value))
                }
                Rule::SingleQuoted => Some(TokenKind::String(unescape_single(
                    &lexeme[1..lexeme.len() - 1],
                ))),
                Rule::DoubleQuoted => Some(TokenKind::Template(template_parts(
                    &lexeme[1..lexeme.len() - 1],
                ))),
                Rule::Symbol => Some(symbol(lexeme)),
            };

            self.consume(lexeme);
            if let Some(kind) = kind {
                tokens.push(Token::new(kind, location));
            }
        }
        tokens.push(Token::new(TokenKind::Eof, self.location()));
        Ok(tokens)
    }

    fn consume(&mut self, lexeme: &str) {
        for ch in lexeme.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos += lexeme.len();
    }

    fn unmatched(&self, rest: &str, location: Location) -> ParseError {
        if rest.starts_with('\'') || rest.starts_with('"') {
            ParseError::Unterminated {
                what: "string",
                location,
            }
        } else if rest.starts_with("/*") {
            ParseError::Unterminated {
                what: "comment",
                location,
            }
        } else {
            ParseError::UnexpectedChar {
                found: rest.chars().next().unwrap_or_default(),
                location,
            }
        }
    }
}

fn symbol(lexeme: &str) -> TokenKind {
    match lexeme {
        "=>" => TokenKind::FatArrow,
        "==" => TokenKind::EqEq,
        "!=" => TokenKind::NotEq,
        "->" => TokenKind::Arrow,
        "~>" => TokenKind::TildeArrow,
        "{" => TokenKind::LBrace,
        "}" => TokenKind::RBrace,
        "(" => TokenKind::LParen,
        ")" => TokenKind::RParen,
        "[" => TokenKind::LBracket,
        "]" => TokenKind::RBracket,
        "," => TokenKind::Comma,
        ":" => TokenKind::Colon,
        ";" => TokenKind::Semicolon,
        "=" => TokenKind::Assign,
        _ => TokenKind::Bang,
    }
}

/// Single-quoted strings only honour `\'` and `\\`
fn unescape_single(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        match (ch, chars.peek()) {
            ('\\', Some(&next @ ('\'' | '\\'))) => {
                out.push(next);
                chars.next();
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Split a double-quoted body into literal text and `$var` / `${var}` parts
fn template_parts(body: &str) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                match chars[i + 1] {
                    'n' => literal.push('\n'),
                    't' => literal.push('\t'),
                    other @ ('"' | '\\' | '$') => literal.push(other),
                    other => {
                        literal.push('\\');
                        literal.push(other);
                    }
                }
                i += 2;
            }
            '$' => {
                let (name, consumed) = interpolated_name(&chars[i + 1..]);
                if name.is_empty() {
                    literal.push('$');
                    i += 1;
                } else {
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Variable(name));
                    i += 1 + consumed;
                }
            }
            ch => {
                literal.push(ch);
                i += 1;
            }
        }
    }

    if !literal.is_empty() || parts.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    parts
}

/// Read a variable name after `$`; returns the name and characters consumed
fn interpolated_name(chars: &[char]) -> (String, usize) {
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == ':';
    if chars.first() == Some(&'{') {
        let Some(end) = chars.iter().position(|&c| c == '}') else {
            return (String::new(), 0);
        };
        let name: String = chars[1..end].iter().collect();
        if name.is_empty() || !name.chars().all(is_name_char) {
            return (String::new(), 0);
        }
        return (name, end + 1);
    }

    let mut len = chars.iter().take_while(|&&c| is_name_char(c)).count();
    // A trailing `:` or `::` belongs to the surrounding text
    while len > 0 && chars[len - 1] == ':' {
        len -= 1;
    }
    (chars[..len].iter().collect(), len)
}
