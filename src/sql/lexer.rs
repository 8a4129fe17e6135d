//! Statement lexer - converts statement text into tokens
//!
//! Words are separated by whitespace. A word that is not in the vocabulary is
//! split around its first structural character (`(`, `)`, `,`, `:`) and both
//! halves are classified again, so `T(Id:int,` becomes `T ( Id : int ,`.
//! Anything left over is `RawText`; the parsers reject what does not fit.

use super::token::{Token, TokenType, STRUCTURAL_CHARS};

pub struct Lexer {
    words: Vec<String>,
}

impl Lexer {
    /// Collapse runs of whitespace into single separators
    pub fn new(input: &str) -> Self {
        Self {
            words: input.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn tokenize(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        for (i, word) in self.words.iter().enumerate() {
            Self::classify(word, i + 1, &mut tokens);
        }
        tokens
    }

    fn classify(text: &str, word: usize, out: &mut Vec<Token>) {
        if text.is_empty() {
            return;
        }
        if let Some(token_type) = TokenType::from_word(text) {
            out.push(Token::new(token_type, word));
            return;
        }

        match text.char_indices().find(|(_, c)| STRUCTURAL_CHARS.contains(c)) {
            Some((at, c)) => {
                Self::classify(&text[..at], word, out);
                Self::classify(&text[at..at + c.len_utf8()], word, out);
                Self::classify(&text[at + c.len_utf8()..], word, out);
            }
            None => out.push(Token::new(TokenType::RawText(text.to_string()), word)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    fn types(input: &str) -> Vec<TokenType> {
        Lexer::new(input).tokenize().into_iter().map(|t| t.token_type).collect()
    }

    fn raw(s: &str) -> TokenType {
        TokenType::RawText(s.to_string())
    }

    #[test]
    fn test_lexer_create_statement() {
        let tokens = types("CREATE T(Id:int, Name:string DEFAULT \"anon\")");
        assert_eq!(
            tokens,
            vec![
                TokenType::Create,
                raw("T"),
                TokenType::LParen,
                raw("Id"),
                TokenType::Colon,
                TokenType::TypeName(FieldType::Int),
                TokenType::Comma,
                raw("Name"),
                TokenType::Colon,
                TokenType::TypeName(FieldType::String),
                TokenType::Default,
                raw("\"anon\""),
                TokenType::RParen,
            ]
        );
    }

    #[test]
    fn test_lexer_collapses_whitespace() {
        assert_eq!(types("  LIST \t\n "), vec![TokenType::List]);
        assert!(Lexer::new("   ").is_empty());
        assert!(Lexer::new("").tokenize().is_empty());
    }

    #[test]
    fn test_lexer_where_clause() {
        let tokens = types("SELECT * FROM T WHERE NOT (Id = 3) AND Born >= 10-07-2002");
        assert_eq!(
            tokens,
            vec![
                TokenType::Select,
                raw("*"),
                TokenType::From,
                raw("T"),
                TokenType::Where,
                TokenType::Not,
                TokenType::LParen,
                raw("Id"),
                TokenType::Eq,
                raw("3"),
                TokenType::RParen,
                TokenType::And,
                raw("Born"),
                TokenType::Ge,
                raw("10-07-2002"),
            ]
        );
    }

    #[test]
    fn test_lexer_insert_tuples() {
        let tokens = types("INSERT INTO T(Id) VALUES (1),(2)");
        assert_eq!(tokens.len(), 14);
        assert_eq!(tokens[7], TokenType::LParen);
        assert_eq!(tokens[8], raw("1"));
        assert_eq!(tokens[10], TokenType::Comma);
    }

    #[test]
    fn test_lexer_keeps_operators_glued_to_text() {
        // only structural characters split words
        assert_eq!(types("Id=3"), vec![raw("Id=3")]);
        assert_eq!(types("select"), vec![raw("select")]);
    }

    #[test]
    fn test_lexer_records_word_positions() {
        let tokens = Lexer::new("INFO T(x").tokenize();
        let words: Vec<usize> = tokens.iter().map(|t| t.word).collect();
        assert_eq!(words, vec![1, 2, 2, 2]);
    }
}
