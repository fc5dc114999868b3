//! GraphQL document parsing.
//!
//! Syntax errors are collected with `apollo-parser` so each one can be
//! reported with its own message and position; the error-free source is then
//! parsed into an `apollo-compiler` AST for planning and printing.

use crate::federation::response::Location;
use apollo_compiler::ast;

/// Maximum nesting depth accepted in client documents.
const RECURSION_LIMIT: usize = 200;

/// Maximum number of tokens accepted in client documents.
const TOKEN_LIMIT: usize = 15_000;

/// A syntax error with its position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub location: Location,
}

/// Parse `source` into an AST, or return every syntax error it contains.
///
/// `path` only labels the source for diagnostics.
pub fn parse(source: &str, path: &str) -> Result<ast::Document, Vec<SyntaxError>> {
    let tree = apollo_parser::Parser::new(source)
        .recursion_limit(RECURSION_LIMIT)
        .token_limit(TOKEN_LIMIT)
        .parse();

    let errors: Vec<SyntaxError> = tree
        .errors()
        .map(|e| SyntaxError {
            message: format!("Syntax Error: {}", e.message()),
            location: location_of(source, e.index()),
        })
        .collect();
    if !errors.is_empty() {
        return Err(errors);
    }

    ast::Document::parse(source, path).map_err(|_| {
        vec![SyntaxError {
            message: "Syntax Error: document could not be parsed".to_string(),
            location: Location { line: 1, column: 1 },
        }]
    })
}

/// Convert a byte offset into a 1-based line and column.
fn location_of(source: &str, index: usize) -> Location {
    let prefix = source.get(..index).unwrap_or(source);
    let line = prefix.matches('\n').count() + 1;
    let column = prefix
        .rsplit('\n')
        .next()
        .map_or(0, |last| last.chars().count())
        + 1;
    Location { line, column }
}
