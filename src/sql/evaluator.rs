//! Predicate evaluator - decides per row whether a WHERE clause holds
//!
//! The raw WHERE tokens are compiled once per statement into a small tree:
//! bare words naming a column become column references, every other word is
//! a string constant (quotes stripped). Precedence, tightest first:
//! brackets, comparison, `NOT`, `AND`, `OR`.

use super::token::{unquote, Token, TokenType};
use crate::error::{Result, StorageError};
use crate::types::{FieldType, TableSchema};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    fn from_token(token_type: &TokenType) -> Option<Self> {
        match token_type {
            TokenType::Eq => Some(CompareOp::Eq),
            TokenType::Ne => Some(CompareOp::Ne),
            TokenType::Lt => Some(CompareOp::Lt),
            TokenType::Gt => Some(CompareOp::Gt),
            TokenType::Le => Some(CompareOp::Le),
            TokenType::Ge => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    /// Position of the column in the schema
    Column(usize, FieldType),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

/// A compiled WHERE clause bound to one table schema
#[derive(Debug, Clone)]
pub struct PredicateEvaluator {
    /// `None` for an absent WHERE clause: every row matches
    predicate: Option<Predicate>,
}

impl PredicateEvaluator {
    /// Compile `tokens` against `schema`; malformed clauses are `Syntax` errors
    pub fn new(schema: &TableSchema, tokens: &[Token]) -> Result<Self> {
        if tokens.is_empty() {
            return Ok(Self { predicate: None });
        }

        let mut compiler = Compiler {
            schema,
            tokens,
            position: 0,
        };
        let predicate = compiler.or_expr()?;
        if let Some(token) = tokens.get(compiler.position) {
            return Err(StorageError::syntax(format!(
                "Unexpected '{}' at word {} in WHERE clause",
                token.token_type, token.word
            )));
        }
        Ok(Self {
            predicate: Some(predicate),
        })
    }

    /// Whether the row (values in schema order) satisfies the clause
    pub fn matches(&self, row: &[Option<String>]) -> Result<bool> {
        match &self.predicate {
            Some(predicate) => evaluate(predicate, row),
            None => Ok(true),
        }
    }

    /// Keep flag for a row. With `exclude` set the decision is inverted, so
    /// DELETE keeps exactly the rows that do not match.
    pub fn keep(&self, row: &[Option<String>], exclude: bool) -> Result<bool> {
        Ok(self.matches(row)? != exclude)
    }

    /// `column = constant` with nothing else around it
    pub fn equality_lookup(schema: &TableSchema, tokens: &[Token]) -> Option<(String, String)> {
        let [left, op, right] = tokens else {
            return None;
        };
        if op.token_type != TokenType::Eq {
            return None;
        }
        let column = left.token_type.raw_text()?;
        let value = right.token_type.raw_text()?;
        schema.position(column)?;
        // a right-hand word naming a column is a column comparison, not a key
        if schema.position(value).is_some() {
            return None;
        }
        Some((column.to_string(), unquote(value).to_string()))
    }
}

struct Compiler<'a> {
    schema: &'a TableSchema,
    tokens: &'a [Token],
    position: usize,
}

impl Compiler<'_> {
    fn peek(&self) -> Option<&TokenType> {
        self.tokens.get(self.position).map(|t| &t.token_type)
    }

    fn error(&self, expected: &str) -> StorageError {
        match self.tokens.get(self.position) {
            Some(token) => StorageError::syntax(format!(
                "Expected {} at word {}, found '{}'",
                expected, token.word, token.token_type
            )),
            None => StorageError::syntax(format!("Expected {} at end of WHERE clause", expected)),
        }
    }

    fn or_expr(&mut self) -> Result<Predicate> {
        let mut terms = vec![self.and_expr()?];
        while self.peek() == Some(&TokenType::Or) {
            self.position += 1;
            terms.push(self.and_expr()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Predicate::Or(terms) })
    }

    fn and_expr(&mut self) -> Result<Predicate> {
        let mut terms = vec![self.not_expr()?];
        while self.peek() == Some(&TokenType::And) {
            self.position += 1;
            terms.push(self.not_expr()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Predicate::And(terms) })
    }

    fn not_expr(&mut self) -> Result<Predicate> {
        if self.peek() == Some(&TokenType::Not) {
            self.position += 1;
            return Ok(Predicate::Not(Box::new(self.not_expr()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Predicate> {
        if self.peek() == Some(&TokenType::LParen) {
            self.position += 1;
            let inner = self.or_expr()?;
            if self.peek() != Some(&TokenType::RParen) {
                return Err(self.error("')'"));
            }
            self.position += 1;
            return Ok(inner);
        }

        let left = self.operand()?;
        let op = self
            .peek()
            .and_then(CompareOp::from_token)
            .ok_or_else(|| self.error("a comparison operator"))?;
        self.position += 1;
        let right = self.operand()?;
        Ok(Predicate::Compare { left, op, right })
    }

    fn operand(&mut self) -> Result<Operand> {
        let text = self
            .peek()
            .and_then(TokenType::raw_text)
            .ok_or_else(|| self.error("a column or value"))?;
        let operand = match self.schema.position(text) {
            Some(position) => Operand::Column(position, self.schema.fields[position].field_type),
            None => Operand::Literal(unquote(text).to_string()),
        };
        self.position += 1;
        Ok(operand)
    }
}

fn evaluate(predicate: &Predicate, row: &[Option<String>]) -> Result<bool> {
    match predicate {
        Predicate::Compare { left, op, right } => compare(left, *op, right, row),
        Predicate::Not(inner) => Ok(!evaluate(inner, row)?),
        Predicate::And(terms) => {
            for term in terms {
                if !evaluate(term, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(terms) => {
            for term in terms {
                if evaluate(term, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Compare under the left column's type, else the right column's, else as text.
/// A missing cell equals nothing and orders against nothing.
fn compare(left: &Operand, op: CompareOp, right: &Operand, row: &[Option<String>]) -> Result<bool> {
    let field_type = match (left, right) {
        (Operand::Column(_, t), _) | (_, Operand::Column(_, t)) => *t,
        _ => FieldType::String,
    };

    let (Some(l), Some(r)) = (resolve(left, row)?, resolve(right, row)?) else {
        return Ok(op == CompareOp::Ne);
    };
    Ok(op.holds(field_type.compare(l, r)?))
}

fn resolve<'a>(operand: &'a Operand, row: &'a [Option<String>]) -> Result<Option<&'a str>> {
    match operand {
        Operand::Literal(text) => Ok(Some(text.as_str())),
        Operand::Column(position, _) => row
            .get(*position)
            .map(|cell| cell.as_deref())
            .ok_or_else(|| StorageError::Corruption(format!("Row is missing column {}", position))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sql::lexer::Lexer;
    use crate::types::Field;

    fn schema() -> TableSchema {
        TableSchema::new(
            "T",
            vec![
                Field::new("Id", FieldType::Int),
                Field::new("Name", FieldType::String),
                Field::new("Born", FieldType::Date),
            ],
        )
        .unwrap()
    }

    fn evaluator(clause: &str) -> Result<PredicateEvaluator> {
        PredicateEvaluator::new(&schema(), &Lexer::new(clause).tokenize())
    }

    fn row(id: i64, name: Option<&str>, born: &str) -> Vec<Option<String>> {
        vec![Some(id.to_string()), name.map(str::to_string), Some(born.to_string())]
    }

    fn kept_ids(clause: &str) -> Vec<i64> {
        let evaluator = evaluator(clause).unwrap();
        (1..=6)
            .filter(|&id| evaluator.matches(&row(id, Some("x"), "01-01-2000")).unwrap())
            .collect()
    }

    #[test]
    fn test_and_range() {
        assert_eq!(kept_ids("Id > 2 AND Id < 5"), vec![3, 4]);
    }

    #[test]
    fn test_not_bracket() {
        assert_eq!(kept_ids("NOT (Id = 3)"), vec![1, 2, 4, 5, 6]);
        assert_eq!(kept_ids("NOT NOT Id = 3"), vec![3]);
    }

    #[test]
    fn test_or_and_precedence() {
        assert_eq!(kept_ids("Id = 2 OR Id = 3"), vec![2, 3]);
        assert_eq!(kept_ids("Id = 1 OR Id > 2 AND Id < 4"), vec![1, 3]);
        assert_eq!(kept_ids("(Id = 1 OR Id > 2) AND Id < 4"), vec![1, 3]);
        assert_eq!(kept_ids("(Id = 1 OR Id = 6) AND NOT (Id = 1)"), vec![6]);
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        let evaluator = evaluator("Id < 10").unwrap();
        assert!(evaluator.matches(&row(9, None, "01-01-2000")).unwrap());
        assert!(!evaluator.matches(&row(10, None, "01-01-2000")).unwrap());
    }

    #[test]
    fn test_date_ordering() {
        let before = evaluator("Born < 29-03-2006").unwrap();
        assert!(before.matches(&row(1, None, "10-07-2002")).unwrap());
        assert!(!before.matches(&row(1, None, "30-03-2006")).unwrap());

        // constant on the left still compares as a date
        let after = evaluator("10-07-2002 < Born").unwrap();
        assert!(after.matches(&row(1, None, "29-03-2006")).unwrap());
    }

    #[test]
    fn test_quoted_literal_and_empty_cell() {
        let equal = evaluator("Name = \"anon\"").unwrap();
        assert!(equal.matches(&row(1, Some("anon"), "01-01-2000")).unwrap());
        assert!(!equal.matches(&row(1, None, "01-01-2000")).unwrap());

        let not_equal = evaluator("Name != anon").unwrap();
        assert!(not_equal.matches(&row(1, None, "01-01-2000")).unwrap());
    }

    #[test]
    fn test_exclude_inverts() {
        let evaluator = evaluator("Id = 2").unwrap();
        let r = row(2, None, "01-01-2000");
        assert!(evaluator.keep(&r, false).unwrap());
        assert!(!evaluator.keep(&r, true).unwrap());
    }

    #[test]
    fn test_malformed_clauses() {
        for clause in ["Id =", "Id 3", "= 3", "(Id = 3", "Id = 3 AND", "Id = 3 Name = x", "NOT"] {
            let err = evaluator(clause).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Syntax, "{}", clause);
        }
    }

    #[test]
    fn test_type_mismatch_is_semantic() {
        let evaluator = evaluator("Id > abc").unwrap();
        let err = evaluator.matches(&row(1, None, "01-01-2000")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn test_equality_lookup_shape() {
        let schema = schema();
        let tokens = Lexer::new("Id = 3").tokenize();
        assert_eq!(
            PredicateEvaluator::equality_lookup(&schema, &tokens),
            Some(("Id".to_string(), "3".to_string()))
        );
        for clause in ["Id > 3", "Missing = 3", "Id = 3 AND Id = 4", "3 = Id", "Name = Born", "Id = Id"] {
            let tokens = Lexer::new(clause).tokenize();
            assert_eq!(PredicateEvaluator::equality_lookup(&schema, &tokens), None, "{}", clause);
        }
    }
}
