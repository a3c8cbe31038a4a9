//! SQL normalization and join-relationship extraction
//!
//! This crate handles:
//! - Stripping dynamic-SQL templating tags and comments from raw mapper
//!   statements, yielding parseable SQL
//! - Parsing normalized SQL with a configurable dialect
//! - Resolving table aliases and extracting directed join edges with their
//!   equality predicates and join kinds

pub mod extractor;
pub mod normalizer;
pub mod parser;

pub use extractor::extract_join_edges;
pub use normalizer::{normalize, NormalizeError, NormalizedStatement};
pub use parser::{ParseError, ParsedSql, SqlParser};
