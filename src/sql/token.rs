//! Token types for the statement lexer
use crate::types::FieldType;
use std::fmt;

/// Characters that split a word even without surrounding spaces
pub const STRUCTURAL_CHARS: [char; 4] = ['(', ')', ',', ':'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    // Statement keywords
    Create,
    Drop,
    List,
    Info,
    Select,
    Delete,
    Insert,
    CreateIndex,
    DropIndex,

    // Clause keywords
    Default,
    From,
    Where,
    OrderBy,
    Distinct,
    Into,
    Values,
    On,

    // Boolean connectives
    And,
    Or,
    Not,

    // Comparison operators
    Eq, // =
    Ne, // !=
    Lt, // <
    Gt, // >
    Le, // <=
    Ge, // >=

    // Delimiters
    LParen, // (
    RParen, // )
    Comma,  // ,
    Colon,  // :

    /// `int`, `date` or `string`
    TypeName(FieldType),

    /// Identifier or literal, kept verbatim
    RawText(String),
}

impl TokenType {
    /// Exact, case-sensitive vocabulary lookup
    pub fn from_word(word: &str) -> Option<Self> {
        let token_type = match word {
            "CREATE" => TokenType::Create,
            "DROP" => TokenType::Drop,
            "LIST" => TokenType::List,
            "INFO" => TokenType::Info,
            "SELECT" => TokenType::Select,
            "DELETE" => TokenType::Delete,
            "INSERT" => TokenType::Insert,
            "CREATEINDEX" => TokenType::CreateIndex,
            "DROPINDEX" => TokenType::DropIndex,
            "DEFAULT" => TokenType::Default,
            "FROM" => TokenType::From,
            "WHERE" => TokenType::Where,
            "ORDERBY" => TokenType::OrderBy,
            "DISTINCT" => TokenType::Distinct,
            "INTO" => TokenType::Into,
            "VALUES" => TokenType::Values,
            "ON" => TokenType::On,
            "AND" => TokenType::And,
            "OR" => TokenType::Or,
            "NOT" => TokenType::Not,
            "=" => TokenType::Eq,
            "!=" => TokenType::Ne,
            "<" => TokenType::Lt,
            ">" => TokenType::Gt,
            "<=" => TokenType::Le,
            ">=" => TokenType::Ge,
            "(" => TokenType::LParen,
            ")" => TokenType::RParen,
            "," => TokenType::Comma,
            ":" => TokenType::Colon,
            other => return FieldType::from_keyword(other).map(TokenType::TypeName),
        };
        Some(token_type)
    }

    pub fn raw_text(&self) -> Option<&str> {
        match self {
            TokenType::RawText(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: &str = match self {
            TokenType::Create => "CREATE",
            TokenType::Drop => "DROP",
            TokenType::List => "LIST",
            TokenType::Info => "INFO",
            TokenType::Select => "SELECT",
            TokenType::Delete => "DELETE",
            TokenType::Insert => "INSERT",
            TokenType::CreateIndex => "CREATEINDEX",
            TokenType::DropIndex => "DROPINDEX",
            TokenType::Default => "DEFAULT",
            TokenType::From => "FROM",
            TokenType::Where => "WHERE",
            TokenType::OrderBy => "ORDERBY",
            TokenType::Distinct => "DISTINCT",
            TokenType::Into => "INTO",
            TokenType::Values => "VALUES",
            TokenType::On => "ON",
            TokenType::And => "AND",
            TokenType::Or => "OR",
            TokenType::Not => "NOT",
            TokenType::Eq => "=",
            TokenType::Ne => "!=",
            TokenType::Lt => "<",
            TokenType::Gt => ">",
            TokenType::Le => "<=",
            TokenType::Ge => ">=",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::Comma => ",",
            TokenType::Colon => ":",
            TokenType::TypeName(field_type) => field_type.as_str(),
            TokenType::RawText(text) => text.as_str(),
        };
        f.write_str(text)
    }
}

/// A token plus the 1-based word of the statement it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub word: usize,
}

impl Token {
    pub fn new(token_type: TokenType, word: usize) -> Self {
        Self { token_type, word }
    }
}

/// Strip one pair of matching surrounding quotes (`"x"` or `'x'`)
pub fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}
