//! Statement parsers
//!
//! One small state machine per statement kind. Each walks the token stream
//! once, keyed on the last accepted token, and fails with a `Syntax` error on
//! the first token that is out of place.

use super::ast::{InsertQuery, Projection, Query, SelectQuery};
use super::token::{unquote, Token, TokenType};
use crate::error::{Result, StorageError};
use crate::types::Field;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0 }
    }

    /// Parse a whole statement
    pub fn parse(&mut self) -> Result<Query> {
        let first = self
            .next()
            .ok_or_else(|| StorageError::syntax("Empty statement"))?
            .token_type;

        let query = match first {
            TokenType::Create => self.parse_create()?,
            TokenType::Drop => Query::DropTables(self.parse_name_list("DROP")?),
            TokenType::DropIndex => Query::DropIndexes(self.parse_name_list("DROPINDEX")?),
            TokenType::List => self.parse_list()?,
            TokenType::Info => self.parse_info()?,
            TokenType::Select => self.parse_select()?,
            TokenType::Delete => self.parse_delete()?,
            TokenType::Insert => self.parse_insert()?,
            TokenType::CreateIndex => self.parse_create_index()?,
            _ => return Err(StorageError::syntax("Enter a valid query method")),
        };
        Ok(query)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn unexpected(&self, token: &Token, statement: &str) -> StorageError {
        StorageError::syntax(format!(
            "Unexpected '{}' at word {} in {}",
            token.token_type, token.word, statement
        ))
    }

    fn incomplete(&self, statement: &str) -> StorageError {
        StorageError::syntax(format!("Incomplete {} statement", statement))
    }

    /// `CREATE name ( field : type [DEFAULT value] (, ...)* )`
    fn parse_create(&mut self) -> Result<Query> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Name,
            OpenBracket,
            FieldName,
            Colon,
            FieldType,
            AfterType,
            DefaultValue,
            AfterDefault,
            Closed,
        }

        let mut state = State::Name;
        let mut table = String::new();
        let mut fields: Vec<Field> = Vec::new();
        let mut pending_name = String::new();

        while let Some(token) = self.next() {
            state = match (state, &token.token_type) {
                (State::Name, TokenType::RawText(name)) => {
                    table = name.clone();
                    State::OpenBracket
                }
                (State::OpenBracket, TokenType::LParen) => State::FieldName,
                (State::FieldName, TokenType::RParen) if fields.is_empty() => {
                    return Err(StorageError::syntax(format!("Table {} has an empty field list", table)));
                }
                (State::FieldName, TokenType::RawText(name)) => {
                    pending_name = name.clone();
                    State::Colon
                }
                (State::Colon, TokenType::Colon) => State::FieldType,
                (State::FieldType, TokenType::TypeName(field_type)) => {
                    fields.push(Field::new(std::mem::take(&mut pending_name), *field_type));
                    State::AfterType
                }
                (State::AfterType, TokenType::Default) => State::DefaultValue,
                (State::DefaultValue, TokenType::RawText(value)) => {
                    if let Some(field) = fields.last_mut() {
                        field.default_value = Some(unquote(value).to_string());
                    }
                    State::AfterDefault
                }
                (State::AfterType | State::AfterDefault, TokenType::Comma) => State::FieldName,
                (State::AfterType | State::AfterDefault, TokenType::RParen) => State::Closed,
                _ => return Err(self.unexpected(&token, "CREATE")),
            };
        }

        if state != State::Closed {
            return Err(self.incomplete("CREATE"));
        }
        Ok(Query::CreateTable { table, fields })
    }

    /// `name (, name)*`
    fn parse_name_list(&mut self, statement: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut expect_name = true;

        while let Some(token) = self.next() {
            match (&token.token_type, expect_name) {
                (TokenType::RawText(name), true) => names.push(name.clone()),
                (TokenType::Comma, false) => {}
                _ => return Err(self.unexpected(&token, statement)),
            }
            expect_name = !expect_name;
        }

        // empty list or trailing comma
        if expect_name {
            return Err(self.incomplete(statement));
        }
        Ok(names)
    }

    fn parse_list(&mut self) -> Result<Query> {
        if let Some(token) = self.next() {
            return Err(self.unexpected(&token, "LIST"));
        }
        Ok(Query::ListTables)
    }

    fn parse_info(&mut self) -> Result<Query> {
        let table = match self.next() {
            Some(Token { token_type: TokenType::RawText(name), .. }) => name,
            Some(token) => return Err(self.unexpected(&token, "INFO")),
            None => return Err(self.incomplete("INFO")),
        };
        if let Some(token) = self.next() {
            return Err(self.unexpected(&token, "INFO"));
        }
        Ok(Query::TableInfo(table))
    }

    /// `[DISTINCT] field|* (, field)* FROM name [WHERE tokens] [ORDERBY field]`
    fn parse_select(&mut self) -> Result<Query> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Start,
            Column,
            AfterColumn,
            Table,
            AfterTable,
            Predicates,
            OrderField,
            Done,
        }

        let mut state = State::Start;
        let mut distinct = false;
        let mut columns: Vec<String> = Vec::new();
        let mut table = String::new();
        let mut predicates: Vec<Token> = Vec::new();
        let mut order_by = None;

        while let Some(token) = self.next() {
            state = match (state, &token.token_type) {
                (State::Start, TokenType::Distinct) => {
                    distinct = true;
                    State::Column
                }
                (State::Start | State::Column, TokenType::RawText(column)) => {
                    columns.push(column.clone());
                    State::AfterColumn
                }
                (State::AfterColumn, TokenType::Comma) => State::Column,
                (State::AfterColumn, TokenType::From) => State::Table,
                (State::Table, TokenType::RawText(name)) => {
                    table = name.clone();
                    State::AfterTable
                }
                (State::AfterTable, TokenType::Where) => State::Predicates,
                (State::AfterTable, TokenType::OrderBy) => State::OrderField,
                (State::Predicates, TokenType::OrderBy) if !predicates.is_empty() => State::OrderField,
                (State::Predicates, TokenType::OrderBy) => return Err(self.unexpected(&token, "SELECT")),
                (State::Predicates, _) => {
                    predicates.push(token.clone());
                    State::Predicates
                }
                (State::OrderField, TokenType::RawText(field)) => {
                    order_by = Some(field.clone());
                    State::Done
                }
                _ => return Err(self.unexpected(&token, "SELECT")),
            };
        }

        match state {
            State::AfterTable | State::Done => {}
            State::Predicates if !predicates.is_empty() => {}
            _ => return Err(self.incomplete("SELECT")),
        }

        let projection = if columns.iter().any(|c| c == "*") {
            if columns.len() != 1 {
                return Err(StorageError::syntax("'*' cannot be combined with other columns"));
            }
            Projection::All
        } else {
            Projection::Columns(columns)
        };

        check_brackets(&predicates)?;
        Ok(Query::Select(SelectQuery {
            distinct,
            projection,
            table,
            predicates,
            order_by,
        }))
    }

    /// `FROM name [WHERE tokens]`
    fn parse_delete(&mut self) -> Result<Query> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            From,
            Table,
            AfterTable,
            Predicates,
        }

        let mut state = State::From;
        let mut table = String::new();
        let mut predicates = Vec::new();

        while let Some(token) = self.next() {
            state = match (state, &token.token_type) {
                (State::From, TokenType::From) => State::Table,
                (State::Table, TokenType::RawText(name)) => {
                    table = name.clone();
                    State::AfterTable
                }
                (State::AfterTable, TokenType::Where) => State::Predicates,
                (State::Predicates, _) => {
                    predicates.push(token.clone());
                    State::Predicates
                }
                _ => return Err(self.unexpected(&token, "DELETE")),
            };
        }

        match state {
            State::AfterTable => {}
            State::Predicates if !predicates.is_empty() => {}
            _ => return Err(self.incomplete("DELETE")),
        }

        check_brackets(&predicates)?;
        Ok(Query::Delete { table, predicates })
    }

    /// `INTO name ( field (, field)* ) VALUES ( value (, value)* ) (, ( ... ))*`
    fn parse_insert(&mut self) -> Result<Query> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Into,
            Name,
            OpenFields,
            Field,
            AfterField,
            Values,
            OpenTuple,
            Value,
            AfterValue,
            AfterTuple,
        }

        let mut state = State::Into;
        let mut table = String::new();
        let mut fields: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut tuple: Vec<String> = Vec::new();

        while let Some(token) = self.next() {
            state = match (state, &token.token_type) {
                (State::Into, TokenType::Into) => State::Name,
                (State::Name, TokenType::RawText(name)) => {
                    table = name.clone();
                    State::OpenFields
                }
                (State::OpenFields, TokenType::LParen) => State::Field,
                (State::Field, TokenType::RawText(field)) => {
                    fields.push(field.clone());
                    State::AfterField
                }
                (State::AfterField, TokenType::Comma) => State::Field,
                (State::AfterField, TokenType::RParen) => State::Values,
                (State::Values, TokenType::Values) => State::OpenTuple,
                (State::OpenTuple, TokenType::LParen) => State::Value,
                (State::Value, TokenType::RawText(value)) => {
                    tuple.push(unquote(value).to_string());
                    State::AfterValue
                }
                (State::AfterValue, TokenType::Comma) => State::Value,
                (State::AfterValue, TokenType::RParen) => {
                    rows.push(std::mem::take(&mut tuple));
                    State::AfterTuple
                }
                (State::AfterTuple, TokenType::Comma) => State::OpenTuple,
                _ => return Err(self.unexpected(&token, "INSERT")),
            };
        }

        if state != State::AfterTuple {
            return Err(self.incomplete("INSERT"));
        }
        Ok(Query::Insert(InsertQuery { table, fields, rows }))
    }

    /// `indexName ON table ( field )`
    fn parse_create_index(&mut self) -> Result<Query> {
        let mut index = String::new();
        let mut table = String::new();
        let mut column = String::new();
        let mut step = 0;

        while let Some(token) = self.next() {
            match (step, &token.token_type) {
                (0, TokenType::RawText(name)) => index = name.clone(),
                (1, TokenType::On) => {}
                (2, TokenType::RawText(name)) => table = name.clone(),
                (3, TokenType::LParen) => {}
                (4, TokenType::RawText(name)) => column = name.clone(),
                (5, TokenType::RParen) => {}
                _ => return Err(self.unexpected(&token, "CREATEINDEX")),
            }
            step += 1;
        }

        if step != 6 {
            return Err(self.incomplete("CREATEINDEX"));
        }
        Ok(Query::CreateIndex { index, table, column })
    }
}

/// Brackets in a WHERE clause must nest and close
fn check_brackets(tokens: &[Token]) -> Result<()> {
    let mut depth = 0usize;
    for token in tokens {
        match token.token_type {
            TokenType::LParen => depth += 1,
            TokenType::RParen => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    StorageError::syntax(format!("Unmatched ')' at word {}", token.word))
                })?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(StorageError::syntax("Unclosed '(' in WHERE clause"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sql::ast::Method;
    use crate::sql::lexer::Lexer;
    use crate::types::FieldType;

    fn parse(input: &str) -> Result<Query> {
        Parser::new(Lexer::new(input).tokenize()).parse()
    }

    fn syntax_error(input: &str) {
        match parse(input) {
            Err(e) => assert_eq!(e.kind(), ErrorKind::Syntax, "{}: {}", input, e),
            Ok(q) => panic!("{} parsed as {:?}", input, q),
        }
    }

    #[test]
    fn test_parse_create() {
        let query = parse("CREATE T(Id:int, Name:string DEFAULT \"anon\", Born:date)").unwrap();
        let Query::CreateTable { table, fields } = query else {
            panic!("expected CREATE");
        };
        assert_eq!(table, "T");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].default_value.as_deref(), Some("anon"));
        assert_eq!(fields[2].field_type, FieldType::Date);
    }

    #[test]
    fn test_parse_create_rejects() {
        syntax_error("CREATE T()");
        syntax_error("CREATE T(Id:int) extra");
        syntax_error("CREATE T(Id:int");
        syntax_error("CREATE T(Id int)");
        syntax_error("CREATE T(Id:integer)");
        syntax_error("CREATE T(Id:int,)");
        syntax_error("CREATE T(Id:int DEFAULT)");
        syntax_error("CREATE (Id:int)");
    }

    #[test]
    fn test_parse_drop_lists() {
        assert_eq!(
            parse("DROP a, b").unwrap(),
            Query::DropTables(vec!["a".into(), "b".into()])
        );
        assert_eq!(parse("DROPINDEX ix").unwrap().method(), Method::DropIndex);
        syntax_error("DROP a,");
        syntax_error("DROP");
        syntax_error("DROP a b");
    }

    #[test]
    fn test_parse_list_and_info() {
        assert_eq!(parse("LIST").unwrap(), Query::ListTables);
        assert_eq!(parse("INFO T").unwrap(), Query::TableInfo("T".into()));
        syntax_error("LIST T");
        syntax_error("INFO");
        syntax_error("INFO a, b");
    }

    #[test]
    fn test_parse_select() {
        let Query::Select(select) =
            parse("SELECT DISTINCT Name, Id FROM T WHERE Id > 2 AND Id < 5 ORDERBY Name").unwrap()
        else {
            panic!("expected SELECT");
        };
        assert!(select.distinct);
        assert_eq!(select.projection, Projection::Columns(vec!["Name".into(), "Id".into()]));
        assert_eq!(select.table, "T");
        assert_eq!(select.predicates.len(), 7);
        assert_eq!(select.order_by.as_deref(), Some("Name"));

        let Query::Select(star) = parse("SELECT * FROM T").unwrap() else {
            panic!("expected SELECT");
        };
        assert_eq!(star.projection, Projection::All);
        assert!(star.predicates.is_empty());
    }

    #[test]
    fn test_parse_select_rejects() {
        syntax_error("SELECT FROM T");
        syntax_error("SELECT * FROM");
        syntax_error("SELECT *, Id FROM T");
        syntax_error("SELECT Id FROM T WHERE");
        syntax_error("SELECT Id FROM T WHERE (Id = 1");
        syntax_error("SELECT Id FROM T WHERE Id = 1)");
        syntax_error("SELECT Id FROM T ORDERBY");
        syntax_error("SELECT Id FROM T ORDERBY a b");
        syntax_error("SELECT Id, FROM T");
    }

    #[test]
    fn test_parse_delete() {
        let Query::Delete { table, predicates } = parse("DELETE FROM T WHERE Id = 2 OR Id = 3").unwrap() else {
            panic!("expected DELETE");
        };
        assert_eq!(table, "T");
        assert_eq!(predicates.len(), 7);

        assert!(matches!(parse("DELETE FROM T").unwrap(), Query::Delete { .. }));
        syntax_error("DELETE T");
        syntax_error("DELETE FROM T WHERE");
    }

    #[test]
    fn test_parse_insert() {
        let Query::Insert(insert) = parse("INSERT INTO T(Id, Name) VALUES (1, 'a'), (2, b)").unwrap() else {
            panic!("expected INSERT");
        };
        assert_eq!(insert.table, "T");
        assert_eq!(insert.fields, vec!["Id", "Name"]);
        assert_eq!(insert.rows, vec![vec!["1", "a"], vec!["2", "b"]]);
    }

    #[test]
    fn test_parse_insert_rejects() {
        syntax_error("INSERT T(Id) VALUES (1)");
        syntax_error("INSERT INTO T(Id) VALUES");
        syntax_error("INSERT INTO T(Id) VALUES (1),");
        syntax_error("INSERT INTO T(Id) VALUES ()");
        syntax_error("INSERT INTO T() VALUES (1)");
        syntax_error("INSERT INTO T(Id) (1)");
    }

    #[test]
    fn test_parse_create_index() {
        assert_eq!(
            parse("CREATEINDEX ix ON T(Id)").unwrap(),
            Query::CreateIndex {
                index: "ix".into(),
                table: "T".into(),
                column: "Id".into()
            }
        );
        syntax_error("CREATEINDEX ix T(Id)");
        syntax_error("CREATEINDEX ix ON T(Id");
        syntax_error("CREATEINDEX ix ON T(Id) x");
    }

    #[test]
    fn test_parse_requires_method() {
        syntax_error("");
        syntax_error("select * FROM T");
        syntax_error("WHERE Id = 1");
    }
}
