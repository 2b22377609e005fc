use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Integer,
    Decimal,
    Character,
    String,
    Operator,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Identifier => write!(f, "identifier"),
            TokenKind::Integer => write!(f, "integer"),
            TokenKind::Decimal => write!(f, "decimal"),
            TokenKind::Character => write!(f, "character"),
            TokenKind::String => write!(f, "string"),
            TokenKind::Operator => write!(f, "operator"),
        }
    }
}

/// A lexeme carved out of the source, with the character offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub index: usize,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, index: usize) -> Self {
        Self {
            kind,
            literal: literal.into(),
            index,
        }
    }

    /// Offset one past the last character of this token.
    pub fn end(&self) -> usize {
        self.index + self.literal.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at index {index}")]
pub struct TokenizeError {
    pub kind: TokenizeErrorKind,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeErrorKind {
    #[error("Leading zero in number literal")]
    LeadingZero,
    #[error("Invalid escape sequence")]
    InvalidEscape,
    #[error("Empty character literal")]
    EmptyCharacter,
    #[error("Unterminated character literal")]
    UnterminatedCharacter,
    #[error("Unterminated string literal")]
    UnterminatedString,
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    while tokenizer.chars.has(0) {
        if tokenizer.match_(&[whitespace]) {
            tokenizer.chars.skip();
            continue;
        }
        let signed = tokens.last().map_or(true, |token| !ends_operand(token));
        tokens.push(tokenizer.token(signed)?);
    }

    tracing::debug!(count = tokens.len(), "tokenized source");
    Ok(tokens)
}

/// Keywords that can be directly followed by an expression.
const KEYWORDS: &[&str] = &[
    "LIST", "VAR", "VAL", "FUN", "DO", "END", "LET", "SWITCH", "CASE", "DEFAULT", "IF", "ELSE",
    "WHILE", "RETURN",
];

/// Whether `token` can be the last token of an operand. A `-` right after one
/// is subtraction, never the sign of a number.
fn ends_operand(token: &Token) -> bool {
    match token.kind {
        TokenKind::Identifier => !KEYWORDS.contains(&token.literal.as_str()),
        TokenKind::Operator => matches!(token.literal.as_str(), ")" | "]"),
        TokenKind::Integer | TokenKind::Decimal | TokenKind::Character | TokenKind::String => true,
    }
}

type Pattern = fn(char) -> bool;

struct Tokenizer {
    chars: CharStream,
}

impl Tokenizer {
    fn new(source: &str) -> Self {
        Self {
            chars: CharStream::new(source),
        }
    }

    fn token(&mut self, signed: bool) -> Result<Token, TokenizeError> {
        if self.peek(&[letter]) || self.peek(&[at, letter]) {
            Ok(self.identifier())
        } else if self.peek(&[digit]) || (signed && self.peek(&[minus, digit])) {
            self.number()
        } else if self.peek(&[single_quote]) {
            self.character()
        } else if self.peek(&[double_quote]) {
            self.string()
        } else {
            Ok(self.operator())
        }
    }

    fn identifier(&mut self) -> Token {
        self.match_(&[at]);
        self.match_(&[letter]);
        while self.match_(&[identifier_part]) {}
        self.chars.emit(TokenKind::Identifier)
    }

    fn number(&mut self) -> Result<Token, TokenizeError> {
        self.match_(&[minus]);
        if self.match_(&[zero]) {
            if self.peek(&[digit]) {
                return Err(self.error(TokenizeErrorKind::LeadingZero));
            }
        } else {
            while self.match_(&[digit]) {}
        }

        if self.match_(&[dot, digit]) {
            while self.match_(&[digit]) {}
            Ok(self.chars.emit(TokenKind::Decimal))
        } else {
            Ok(self.chars.emit(TokenKind::Integer))
        }
    }

    fn character(&mut self) -> Result<Token, TokenizeError> {
        self.match_(&[single_quote]);
        if self.match_(&[backslash]) {
            self.escape()?;
        } else if !self.match_(&[character_part]) {
            return Err(if self.peek(&[single_quote]) {
                self.error(TokenizeErrorKind::EmptyCharacter)
            } else {
                self.error(TokenizeErrorKind::UnterminatedCharacter)
            });
        }

        if !self.match_(&[single_quote]) {
            return Err(self.error(TokenizeErrorKind::UnterminatedCharacter));
        }
        Ok(self.chars.emit(TokenKind::Character))
    }

    fn string(&mut self) -> Result<Token, TokenizeError> {
        self.match_(&[double_quote]);
        loop {
            if self.match_(&[double_quote]) {
                return Ok(self.chars.emit(TokenKind::String));
            } else if self.match_(&[backslash]) {
                self.escape()?;
            } else if !self.match_(&[string_part]) {
                return Err(self.error(TokenizeErrorKind::UnterminatedString));
            }
        }
    }

    fn escape(&mut self) -> Result<(), TokenizeError> {
        if self.match_(&[escape]) {
            Ok(())
        } else {
            Err(self.error(TokenizeErrorKind::InvalidEscape))
        }
    }

    fn operator(&mut self) -> Token {
        if !(self.match_(&[bang_or_equal, equal])
            || self.match_(&[ampersand, ampersand])
            || self.match_(&[pipe, pipe]))
        {
            self.chars.advance();
        }
        self.chars.emit(TokenKind::Operator)
    }

    /// True if the upcoming characters satisfy `patterns` one-for-one. Never consumes.
    fn peek(&self, patterns: &[Pattern]) -> bool {
        patterns
            .iter()
            .enumerate()
            .all(|(offset, pattern)| self.chars.get(offset).is_some_and(pattern))
    }

    /// Like [`Tokenizer::peek`], but consumes the characters when the whole pattern matches.
    fn match_(&mut self, patterns: &[Pattern]) -> bool {
        let matched = self.peek(patterns);
        if matched {
            for _ in patterns {
                self.chars.advance();
            }
        }
        matched
    }

    fn error(&self, kind: TokenizeErrorKind) -> TokenizeError {
        TokenizeError {
            kind,
            index: self.chars.index,
        }
    }
}

struct CharStream {
    input: Vec<char>,
    index: usize,
    length: usize,
}

impl CharStream {
    fn new(source: &str) -> Self {
        Self {
            input: source.chars().collect(),
            index: 0,
            length: 0,
        }
    }

    fn has(&self, offset: usize) -> bool {
        self.index + offset < self.input.len()
    }

    fn get(&self, offset: usize) -> Option<char> {
        self.input.get(self.index + offset).copied()
    }

    fn advance(&mut self) {
        self.index += 1;
        self.length += 1;
    }

    fn skip(&mut self) {
        self.length = 0;
    }

    fn emit(&mut self, kind: TokenKind) -> Token {
        let start = self.index - self.length;
        self.skip();
        Token {
            kind,
            literal: self.input[start..self.index].iter().collect(),
            index: start,
        }
    }
}

fn whitespace(c: char) -> bool {
    c.is_whitespace()
}

fn letter(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn escape(c: char) -> bool {
    matches!(c, 'b' | 'n' | 't' | 'r' | '\'' | '"' | '\\')
}

fn character_part(c: char) -> bool {
    c != '\'' && c != '\\'
}

fn string_part(c: char) -> bool {
    c != '"' && c != '\n' && c != '\\'
}

fn bang_or_equal(c: char) -> bool {
    c == '!' || c == '='
}

macro_rules! match_char {
    ($name:ident, $char:literal) => {
        fn $name(c: char) -> bool {
            c == $char
        }
    };
}

match_char! { at, '@' }
match_char! { minus, '-' }
match_char! { zero, '0' }
match_char! { dot, '.' }
match_char! { single_quote, '\'' }
match_char! { double_quote, '"' }
match_char! { backslash, '\\' }
match_char! { equal, '=' }
match_char! { ampersand, '&' }
match_char! { pipe, '|' }
