//! Expression tokenizer implementation.

use super::{Keyword, Span, Token, TokenKind};

/// A lexer that tokenizes JPQL-like expression text.
pub struct Lexer<'a> {
    /// The input text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
    /// Whether the previous token was a `.`; words after a dot are never keywords.
    after_dot: bool,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
            after_dot: false,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the next character without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.start, self.pos))
    }

    fn error(&self, message: impl Into<String>) -> Token {
        self.make_token(TokenKind::Error(message.into()))
    }

    fn scan_word(&mut self) -> &'a str {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$') {
            self.advance();
        }
        &self.input[self.start..self.pos]
    }

    /// Scans an identifier or keyword.
    fn scan_identifier(&mut self, after_dot: bool) -> Token {
        let text = self.scan_word();
        match Keyword::from_str(text) {
            Some(keyword) if !after_dot => self.make_token(TokenKind::Keyword(keyword)),
            _ => self.make_token(TokenKind::Identifier(String::from(text))),
        }
    }

    /// Scans a number (integer or decimal).
    fn scan_number(&mut self) -> Token {
        let mut is_decimal = false;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_decimal = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            is_decimal = true;
            self.advance();
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Type suffixes such as 10L or 2.5D
        let input = self.input;
        let text = &input[self.start..self.pos];
        if self
            .peek()
            .is_some_and(|c| matches!(c, 'l' | 'L' | 'd' | 'D' | 'f' | 'F'))
        {
            self.advance();
        }

        if is_decimal {
            match text.parse::<f64>() {
                Ok(f) => self.make_token(TokenKind::Decimal(f)),
                Err(e) => self.error(format!("Invalid decimal: {e}")),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => self.make_token(TokenKind::Integer(i)),
                Err(e) => self.error(format!("Invalid integer: {e}")),
            }
        }
    }

    /// Scans a string literal. Quotes are escaped by doubling them.
    fn scan_string(&mut self) -> Token {
        self.advance();
        let mut value = String::new();

        loop {
            match self.peek() {
                Some('\'') => {
                    if self.peek_next() == Some('\'') {
                        value.push('\'');
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => return self.error("Unterminated string literal"),
            }
        }

        self.advance();
        self.make_token(TokenKind::String(value))
    }

    fn scan_named_parameter(&mut self) -> Token {
        let name_start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        if self.pos == name_start {
            return self.error("Expected a parameter name after ':'");
        }
        let name = String::from(&self.input[name_start..self.pos]);
        self.make_token(TokenKind::NamedParameter(name))
    }

    fn scan_positional_parameter(&mut self) -> Token {
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        match self.input[digits_start..self.pos].parse::<u32>() {
            Ok(position) if position > 0 => {
                self.make_token(TokenKind::PositionalParameter(position))
            }
            _ => self.error("Positional parameters must be written as ?1, ?2, ..."),
        }
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.pos;
        let after_dot = std::mem::take(&mut self.after_dot);

        let Some(c) = self.advance() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            ',' => self.make_token(TokenKind::Comma),
            '+' => self.make_token(TokenKind::Plus),
            '-' => self.make_token(TokenKind::Minus),
            '*' => self.make_token(TokenKind::Star),
            '/' => self.make_token(TokenKind::Slash),
            '=' => self.make_token(TokenKind::Eq),
            '.' => {
                self.after_dot = true;
                self.make_token(TokenKind::Dot)
            }
            ':' => self.scan_named_parameter(),
            '?' => self.scan_positional_parameter(),
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::LtEq)
                } else if self.peek() == Some('>') {
                    self.advance();
                    self.make_token(TokenKind::NotEq)
                } else {
                    self.make_token(TokenKind::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::GtEq)
                } else {
                    self.make_token(TokenKind::Gt)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::NotEq)
                } else {
                    self.error("Unexpected character: !")
                }
            }
            '\'' => {
                self.pos = self.start;
                self.scan_string()
            }
            c if c.is_ascii_digit() => {
                self.pos = self.start;
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' => {
                self.pos = self.start;
                self.scan_identifier(after_dot)
            }
            _ => self.error(format!("Unexpected character: {c}")),
        }
    }

    /// Tokenizes the entire input and returns all tokens.
    #[must_use]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}
