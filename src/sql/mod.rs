/// pagedb statement engine
///
/// Architecture:
/// - Lexer: splits statement text into classified tokens
/// - Parser: one state machine per statement kind, builds a `Query`
/// - Evaluator: compiles WHERE tokens and decides per row
/// - Executor: runs a `Query` against the storage handle

pub mod ast;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{InsertQuery, Method, Projection, Query, SelectQuery};
pub use evaluator::PredicateEvaluator;
pub use executor::{QueryExecutor, QueryResult};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenType};

use crate::error::Result;

/// Parse a statement into a `Query`
pub fn parse_statement(statement: &str) -> Result<Query> {
    let lexer = Lexer::new(statement);
    let mut parser = Parser::new(lexer.tokenize());
    parser.parse()
}

/// Parse and execute a statement
pub fn execute_sql(executor: &QueryExecutor, statement: &str) -> Result<QueryResult> {
    let query = parse_statement(statement)?;
    executor.execute(query)
}
