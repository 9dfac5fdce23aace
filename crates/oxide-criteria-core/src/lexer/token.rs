//! Token types for the expression lexer.

use super::Span;

/// Reserved words of the expression grammar.
///
/// Function-like words such as `SIZE`, `INDEX` or `COALESCE` are not reserved.
/// They lex as identifiers and are recognised by the parser when followed by
/// a parenthesis, so they stay usable as attribute names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    And,
    Or,
    Not,
    In,
    Between,
    Like,
    Escape,
    Is,
    Null,
    True,
    False,
    Exists,
    Empty,
    Member,
    Of,
    Case,
    When,
    Then,
    Else,
    End,
    Distinct,
    All,
    Any,
    Some,
    Over,
    Partition,
    Order,
    By,
    Asc,
    Desc,
    Nulls,
    Filter,
    Where,
    CurrentDate,
    CurrentTime,
    CurrentTimestamp,
}

impl Keyword {
    /// Attempts to parse a keyword from a string (case-insensitive).
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Self::Select),
            "FROM" => Some(Self::From),
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            "NOT" => Some(Self::Not),
            "IN" => Some(Self::In),
            "BETWEEN" => Some(Self::Between),
            "LIKE" => Some(Self::Like),
            "ESCAPE" => Some(Self::Escape),
            "IS" => Some(Self::Is),
            "NULL" => Some(Self::Null),
            "TRUE" => Some(Self::True),
            "FALSE" => Some(Self::False),
            "EXISTS" => Some(Self::Exists),
            "EMPTY" => Some(Self::Empty),
            "MEMBER" => Some(Self::Member),
            "OF" => Some(Self::Of),
            "CASE" => Some(Self::Case),
            "WHEN" => Some(Self::When),
            "THEN" => Some(Self::Then),
            "ELSE" => Some(Self::Else),
            "END" => Some(Self::End),
            "DISTINCT" => Some(Self::Distinct),
            "ALL" => Some(Self::All),
            "ANY" => Some(Self::Any),
            "SOME" => Some(Self::Some),
            "OVER" => Some(Self::Over),
            "PARTITION" => Some(Self::Partition),
            "ORDER" => Some(Self::Order),
            "BY" => Some(Self::By),
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            "NULLS" => Some(Self::Nulls),
            "FILTER" => Some(Self::Filter),
            "WHERE" => Some(Self::Where),
            "CURRENT_DATE" => Some(Self::CurrentDate),
            "CURRENT_TIME" => Some(Self::CurrentTime),
            "CURRENT_TIMESTAMP" => Some(Self::CurrentTimestamp),
            _ => None,
        }
    }

    /// Returns the keyword as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::In => "IN",
            Self::Between => "BETWEEN",
            Self::Like => "LIKE",
            Self::Escape => "ESCAPE",
            Self::Is => "IS",
            Self::Null => "NULL",
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Exists => "EXISTS",
            Self::Empty => "EMPTY",
            Self::Member => "MEMBER",
            Self::Of => "OF",
            Self::Case => "CASE",
            Self::When => "WHEN",
            Self::Then => "THEN",
            Self::Else => "ELSE",
            Self::End => "END",
            Self::Distinct => "DISTINCT",
            Self::All => "ALL",
            Self::Any => "ANY",
            Self::Some => "SOME",
            Self::Over => "OVER",
            Self::Partition => "PARTITION",
            Self::Order => "ORDER",
            Self::By => "BY",
            Self::Asc => "ASC",
            Self::Desc => "DESC",
            Self::Nulls => "NULLS",
            Self::Filter => "FILTER",
            Self::Where => "WHERE",
            Self::CurrentDate => "CURRENT_DATE",
            Self::CurrentTime => "CURRENT_TIME",
            Self::CurrentTimestamp => "CURRENT_TIMESTAMP",
        }
    }
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Decimal literal (e.g., 3.14)
    Decimal(f64),
    /// String literal (e.g., 'hello')
    String(String),
    /// Identifier (e.g., c, name, SIZE)
    Identifier(String),
    /// Reserved word
    Keyword(Keyword),
    /// Named parameter (e.g., :minAge)
    NamedParameter(String),
    /// Positional parameter (e.g., ?1)
    PositionalParameter(u32),

    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// =
    Eq,
    /// != or <>
    NotEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,

    /// (
    LeftParen,
    /// )
    RightParen,
    /// ,
    Comma,
    /// .
    Dot,

    /// End of input
    Eof,
    /// Invalid/unknown token
    Error(String),
}

/// A token with its span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The location in the source text.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is an EOF token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns the keyword if this is a keyword token.
    #[must_use]
    pub const fn as_keyword(&self) -> Option<Keyword> {
        match &self.kind {
            TokenKind::Keyword(kw) => Some(*kw),
            _ => None,
        }
    }

    /// Returns true if the token is an identifier equal to `word`, ignoring case.
    #[must_use]
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Identifier(name) if name.eq_ignore_ascii_case(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_from_str() {
        assert_eq!(Keyword::from_str("MEMBER"), Some(Keyword::Member));
        assert_eq!(Keyword::from_str("member"), Some(Keyword::Member));
        assert_eq!(Keyword::from_str("size"), None);
        assert_eq!(
            Keyword::from_str("current_timestamp"),
            Some(Keyword::CurrentTimestamp)
        );
    }

    #[test]
    fn test_keyword_round_trip() {
        for kw in [Keyword::Exists, Keyword::Nulls, Keyword::Partition] {
            assert_eq!(Keyword::from_str(kw.as_str()), Some(kw));
        }
    }

    #[test]
    fn test_is_word() {
        let token = Token::new(TokenKind::Identifier(String::from("Size")), Span::new(0, 4));
        assert!(token.is_word("SIZE"));
        assert!(!token.is_word("INDEX"));
        assert_eq!(token.as_keyword(), None);
    }
}
