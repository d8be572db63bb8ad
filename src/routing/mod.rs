//! Path templates, typed path variables, and route matching.
//!
//! A pattern such as `/users/{int}/name` compiles into a [`PathTemplate`]
//! of constant and variable segments. Each variable names a parser in the
//! [`ParserRegistry`]. Compiled templates are stored in a [`RouteTable`],
//! and [`match_path`] picks at most one route for a request path.
//!
//! Precedence comes only from registration order, and only between identical
//! templates, where the newest registration wins. Two distinct templates
//! that both accept a path give [`MatchResult::Ambiguous`], which is logged
//! and served as "not found".

mod error;
mod matcher;
mod registry;
mod table;
mod template;

// Re-export public items
pub use error::RouteError;
pub use matcher::{match_path, match_path_where, percent_decode, split_path, MatchResult, PathVariables};
pub use registry::{ParserRegistry, PathParser, PathValue, StringParser, STRING_PARSER};
pub use table::{Route, RouteSnapshot, RouteTable, RouteTarget};
pub use template::{PathTemplate, Segment};
