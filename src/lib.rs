//! Wherewith – composable filter combinators over immutable query chains.
//!
//! A filter is usually decided piece by piece: include a clause only when a
//! search field is filled in, OR a few alternatives together, group them and
//! AND the group with something else. Wherewith lets callers grow a query's
//! filter exactly that way instead of assembling one big boolean expression
//! up front:
//! * [`construct::Query`] is an immutable chain of deferred operations
//!   (`filter`, `order_by`, `take`) over an [`construct::Entity`].
//! * [`construct::Predicate`] is a boolean fragment written against one row
//!   parameter, built from a closure over [`construct::Expr`].
//! * The combinators (`or_where`, `and`, `begin_group`, `end_group` and the
//!   conditional `_if` variants) inspect the outermost step of a chain and
//!   return a new chain that shares everything it did not touch.
//!
//! ## Modules
//! * [`construct`] – Entities, parameters, expressions, predicates and query chains.
//! * [`datatype`] – The [`datatype::Value`] scalar used for constants and bound variables.
//! * [`rewrite`] – Parameter substitution over expression trees.
//! * [`combinator`] – `or_where`, `and`, grouping and conditional inclusion.
//! * [`sql`] – Native SQL expressions, dialects and statement rendering.
//! * [`lowering`] – Lowering of the case-insensitive comparison and pattern primitives.
//! * [`translate`] – Translator provider and the query compiler.
//! * [`persist`] – SQLite sessions that compile and run queries.
//! * [`settings`] – Settings read through the `config` crate.
//!
//! ## Pattern primitives
//! `equals_lower_case`, `ilike`, `ilike_starts_with`, `ilike_ends_with` and
//! `ilike_contains` have no meaning outside translation. They are lowered to
//! `lower(a) = lower(b)` and to the dialect's case-insensitive `LIKE` with
//! backslash escaping, so a value such as `50%_off` matches only itself.
//!
//! ## Quick Start
//! ```
//! use wherewith::construct::{Entity, Predicate, Query};
//! use wherewith::sql::Dialect;
//! use wherewith::translate::QueryCompiler;
//!
//! struct User;
//! impl Entity for User {
//!     const TABLE: &'static str = "users";
//!     const COLUMNS: &'static [&'static str] = &["first_name"];
//!     fn from_row(_: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
//!         Ok(User)
//!     }
//! }
//!
//! let query = Query::<User>::from_entity()
//!     .or_where(Predicate::new(|u| u.column("first_name").equals_lower_case("alice")))?
//!     .or_where(Predicate::new(|u| u.column("first_name").equals_lower_case("bob")))?;
//! let compiler = QueryCompiler::new(Dialect::Postgres).use_pattern_translators()?;
//! let statement = compiler.compile(&query)?;
//! assert_eq!(
//!     statement.sql,
//!     "SELECT t.\"first_name\" FROM \"users\" AS t WHERE \
//!      (lower(t.\"first_name\") = lower('alice') OR lower(t.\"first_name\") = lower('bob'))"
//! );
//! # Ok::<(), wherewith::WherewithError>(())
//! ```

pub mod combinator;
pub mod construct;
pub mod datatype;
pub mod error;
pub mod lowering;
pub mod persist;
pub mod rewrite;
pub mod settings;
pub mod sql;
pub mod translate;

pub use combinator::Presence;
pub use construct::{Entity, Expr, Predicate, Query};
pub use error::{Result, WherewithError};
