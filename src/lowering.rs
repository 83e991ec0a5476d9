//! Lowering of the case-insensitive pattern primitives.
//!
//! * `equals_lower_case(a, b)` becomes `lower(a) = lower(b)`.
//! * `ilike(a, pattern)` becomes the dialect's case-insensitive match with
//!   backslash as the escape character.
//! * `ilike_starts_with`, `ilike_ends_with` and `ilike_contains` escape the
//!   value and wrap it in `%` wildcards before matching.
//!
//! Escaping is built as an expression (`replace` calls and concatenation)
//! rather than computed up front, so a literal and a bind parameter go
//! through exactly the same lowering.

use crate::construct::{Method, Primitive};
use crate::error::{Result, WherewithError};
use crate::sql::{SqlExpr, SqlExpressionFactory};

pub const LIKE_ESCAPE: &str = "\\";

/// Replacement order matters: the backslash must be doubled before the
/// wildcard passes introduce new backslashes.
const LIKE_ESCAPES: [(&str, &str); 3] = [("\\", "\\\\"), ("%", "\\%"), ("_", "\\_")];

/// Turns one recognized method call into a native expression. `Ok(None)`
/// means "not mine" and lets the next translator (or the fallback) try.
pub trait MethodCallTranslator: Send + Sync {
    fn translate(&self, method: &Method, arguments: &[SqlExpr]) -> Result<Option<SqlExpr>>;
}

fn supported_factory(factory: &SqlExpressionFactory) -> Result<SqlExpressionFactory> {
    match factory.dialect().case_insensitive_like() {
        Some(_) => Ok(*factory),
        None => Err(WherewithError::Config(format!(
            "Only PostgreSQL and SQLite expression factories are supported, got {:?}",
            factory.dialect()
        ))),
    }
}

fn binary_arguments(primitive: Primitive, arguments: &[SqlExpr]) -> Result<(&SqlExpr, &SqlExpr)> {
    match arguments {
        [source, value] => Ok((source, value)),
        _ => Err(WherewithError::Translation(format!(
            "{} expects {} arguments, got {}",
            primitive.name(),
            Primitive::ARITY,
            arguments.len()
        ))),
    }
}

// ------------- EqualsLowerCase -------------
pub struct EqualsLowerCaseTranslator {
    factory: SqlExpressionFactory,
}

impl EqualsLowerCaseTranslator {
    pub fn new(factory: &SqlExpressionFactory) -> Result<Self> {
        Ok(Self { factory: supported_factory(factory)? })
    }
}

impl MethodCallTranslator for EqualsLowerCaseTranslator {
    fn translate(&self, method: &Method, arguments: &[SqlExpr]) -> Result<Option<SqlExpr>> {
        if *method != Method::Primitive(Primitive::EqualsLowerCase) {
            return Ok(None);
        }
        let (source, value) = binary_arguments(Primitive::EqualsLowerCase, arguments)?;
        let lower_source = self.factory.function("lower", vec![source.clone()]);
        let lower_value = self.factory.function("lower", vec![value.clone()]);
        Ok(Some(self.factory.equal(lower_source, lower_value)))
    }
}

// ------------- ILike -------------
pub struct ILikeTranslator {
    factory: SqlExpressionFactory,
}

impl ILikeTranslator {
    pub fn new(factory: &SqlExpressionFactory) -> Result<Self> {
        Ok(Self { factory: supported_factory(factory)? })
    }

    fn escape_for_like(&self, value: SqlExpr) -> SqlExpr {
        LIKE_ESCAPES.iter().fold(value, |escaped, (from, to)| {
            self.factory.function(
                "replace",
                vec![escaped, self.factory.constant(*from), self.factory.constant(*to)],
            )
        })
    }

    fn pattern(&self, primitive: Primitive, value: SqlExpr) -> Result<SqlExpr> {
        let f = &self.factory;
        let escaped = self.escape_for_like(value);
        match primitive {
            Primitive::ILikeStartsWith => Ok(f.add(escaped, f.constant("%"))),
            Primitive::ILikeEndsWith => Ok(f.add(f.constant("%"), escaped)),
            Primitive::ILikeContains => {
                Ok(f.add(f.add(f.constant("%"), escaped), f.constant("%")))
            }
            other => Err(WherewithError::Unsupported(format!(
                "Only ilike_starts_with, ilike_ends_with and ilike_contains build patterns, not {}",
                other.name()
            ))),
        }
    }
}

impl MethodCallTranslator for ILikeTranslator {
    fn translate(&self, method: &Method, arguments: &[SqlExpr]) -> Result<Option<SqlExpr>> {
        let primitive = match method {
            Method::Primitive(
                p @ (Primitive::ILike
                | Primitive::ILikeStartsWith
                | Primitive::ILikeEndsWith
                | Primitive::ILikeContains),
            ) => *p,
            _ => return Ok(None),
        };
        let (source, value) = binary_arguments(primitive, arguments)?;
        let escape = Some(self.factory.constant(LIKE_ESCAPE));
        if primitive == Primitive::ILike {
            return Ok(Some(self.factory.ilike(source.clone(), value.clone(), escape)));
        }
        if !(value.is_constant() || value.is_parameter()) {
            return Err(WherewithError::Unsupported(format!(
                "{} only accepts a constant or a bound variable as its value",
                primitive.name()
            )));
        }
        let pattern = self.pattern(primitive, value.clone())?;
        Ok(Some(self.factory.ilike(source.clone(), pattern, escape)))
    }
}
