//! SQL parsing with a configurable dialect

use schemarag_core::DialectConfig;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::{Parser, ParserError};

/// SQL parser with configurable dialect
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// Create a new SQL parser with the generic (ANSI) dialect
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Create a SQL parser for MySQL
    pub fn mysql() -> Self {
        Self {
            dialect: Box::new(MySqlDialect {}),
        }
    }

    /// Create a SQL parser for PostgreSQL
    pub fn postgres() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
        }
    }

    /// Create a parser from a dialect config
    pub fn from_dialect(dialect: DialectConfig) -> Self {
        match dialect {
            DialectConfig::MySql => Self::mysql(),
            DialectConfig::Postgres => Self::postgres(),
            DialectConfig::Ansi => Self::new(),
        }
    }

    /// Parse a normalized SQL string into an AST
    pub fn parse(&self, sql: &str) -> Result<ParsedSql, ParseError> {
        match Parser::parse_sql(&*self.dialect, sql) {
            Ok(statements) => Ok(ParsedSql {
                sql: sql.to_string(),
                statements,
            }),
            Err(error) => Err(ParseError {
                sql: sql.to_string(),
                error,
            }),
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Successfully parsed SQL with AST
#[derive(Debug, Clone)]
pub struct ParsedSql {
    /// Normalized SQL string
    pub sql: String,

    /// Parsed statements
    pub statements: Vec<Statement>,
}

impl ParsedSql {
    /// Get the first statement
    pub fn first_statement(&self) -> Option<&Statement> {
        self.statements.first()
    }

    /// Check if the first statement is a SELECT
    pub fn is_select(&self) -> bool {
        matches!(self.first_statement(), Some(Statement::Query(_)))
    }
}

/// SQL parsing error; recoverable during ingestion (the statement is skipped)
#[derive(Debug)]
pub struct ParseError {
    /// SQL that failed to parse
    pub sql: String,

    /// Parser error from sqlparser
    pub error: ParserError,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SQL parse error: {}", self.error)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_select() {
        let parser = SqlParser::new();
        let parsed = parser
            .parse("SELECT id, name FROM users WHERE active = true")
            .unwrap();
        assert_eq!(parsed.statements.len(), 1);
        assert!(parsed.is_select());
    }

    #[test]
    fn parse_join_with_placeholder() {
        let parser = SqlParser::mysql();
        let parsed = parser
            .parse("SELECT o.id FROM orders o LEFT JOIN customers c ON o.customer_id = c.id WHERE c.region = ?")
            .unwrap();
        assert!(parsed.is_select());
    }

    #[test]
    fn parse_invalid_sql() {
        let parser = SqlParser::new();
        assert!(parser.parse("SELECT FROM WHERE").is_err());
    }

    #[test]
    fn dialects_parse_backticks_per_dialect() {
        let sql = "SELECT `id` FROM `users`";
        assert!(SqlParser::mysql().parse(sql).is_ok());
        assert!(SqlParser::postgres().parse(sql).is_err());
    }
}
