//! Compilation of query chains into SQL.
//!
//! A [`TranslatorProvider`] holds the method call translators that know how
//! to lower the case-insensitive primitives. The [`QueryCompiler`] walks a
//! chain from the outermost decoration down to its source, lowers every
//! filter step and ordering through the provider, and renders the collected
//! [`SelectExpression`] for its dialect.

use tracing::{debug, trace};

use crate::construct::{
    CompareOp, Connective, Entity, Expr, Lambda, Method, Parameter, Query, QueryNode,
};
use crate::error::{Result, WherewithError};
use crate::lowering::{EqualsLowerCaseTranslator, ILikeTranslator, MethodCallTranslator};
use crate::sql::{
    Dialect, OrderingExpression, SelectExpression, SqlExpr, SqlExpressionFactory, SqlOperator,
    Statement,
};

/// Every query is rendered against a single aliased table.
pub const TABLE_ALIAS: &str = "t";

// ------------- Translator provider -------------
/// An ordered list of method call translators; the first one that answers wins.
#[derive(Default)]
pub struct TranslatorProvider {
    translators: Vec<Box<dyn MethodCallTranslator>>,
}

impl TranslatorProvider {
    pub fn new() -> Self {
        Self { translators: Vec::new() }
    }
    /// A provider with the case-insensitive pattern translators registered.
    pub fn with_pattern_translators(factory: &SqlExpressionFactory) -> Result<Self> {
        let mut provider = Self::new();
        provider.add_pattern_translators(factory)?;
        Ok(provider)
    }
    pub fn add_pattern_translators(&mut self, factory: &SqlExpressionFactory) -> Result<()> {
        self.add_translators([
            Box::new(ILikeTranslator::new(factory)?) as Box<dyn MethodCallTranslator>,
            Box::new(EqualsLowerCaseTranslator::new(factory)?),
        ]);
        Ok(())
    }
    pub fn add_translators(&mut self, translators: impl IntoIterator<Item = Box<dyn MethodCallTranslator>>) {
        self.translators.extend(translators);
    }
    pub fn len(&self) -> usize {
        self.translators.len()
    }
    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }
    pub fn translate(&self, method: &Method, arguments: &[SqlExpr]) -> Result<Option<SqlExpr>> {
        for translator in &self.translators {
            if let Some(translated) = translator.translate(method, arguments)? {
                trace!(%method, "method call translated");
                return Ok(Some(translated));
            }
        }
        Ok(None)
    }
}

// ------------- Query compiler -------------
/// Lowers a query chain into a [`SelectExpression`] and renders it.
pub struct QueryCompiler {
    factory: SqlExpressionFactory,
    provider: TranslatorProvider,
}

impl QueryCompiler {
    pub fn new(dialect: Dialect) -> Self {
        Self { factory: SqlExpressionFactory::new(dialect), provider: TranslatorProvider::new() }
    }
    pub fn with_provider(factory: SqlExpressionFactory, provider: TranslatorProvider) -> Self {
        Self { factory, provider }
    }
    pub fn use_pattern_translators(mut self) -> Result<Self> {
        self.provider.add_pattern_translators(&self.factory)?;
        Ok(self)
    }
    pub fn dialect(&self) -> Dialect {
        self.factory.dialect()
    }
    pub fn factory(&self) -> &SqlExpressionFactory {
        &self.factory
    }
    pub fn provider(&self) -> &TranslatorProvider {
        &self.provider
    }

    pub fn compile<E: Entity>(&self, query: &Query<E>) -> Result<Statement> {
        let statement = self.select(query)?.render(self.dialect())?;
        debug!(sql = %statement.sql, parameters = statement.parameters.len(), "compiled query");
        Ok(statement)
    }

    pub fn select<E: Entity>(&self, query: &Query<E>) -> Result<SelectExpression> {
        let mut predicates = Vec::new();
        let mut ordering: Option<OrderingExpression> = None;
        let mut limit: Option<usize> = None;
        // set once a filter or ordering has been seen above the current node
        let mut decorated_above = false;
        let mut node = query.node().as_ref();
        let table = loop {
            match node {
                QueryNode::Source { table } => break *table,
                QueryNode::Filter { base, predicate } => {
                    if !predicate.is_always(true) {
                        predicates.push(self.translate_lambda(predicate)?);
                    }
                    decorated_above = true;
                    node = base;
                }
                QueryNode::Boundary { base } => node = base,
                QueryNode::OrderBy { base, key, descending } => {
                    // walking outside-in, so the first ordering seen is the last one applied
                    if ordering.is_none() {
                        ordering = Some(OrderingExpression {
                            expression: self.translate_lambda(key)?,
                            descending: *descending,
                        });
                    }
                    decorated_above = true;
                    node = base;
                }
                QueryNode::Take { base, count } => {
                    if decorated_above {
                        return Err(WherewithError::Unsupported(
                            "Filtering or ordering on top of take() is not supported".into(),
                        ));
                    }
                    limit = Some(limit.map_or(*count, |outer| outer.min(*count)));
                    node = base;
                }
            }
        };
        predicates.reverse();
        Ok(SelectExpression {
            table,
            alias: TABLE_ALIAS,
            columns: E::COLUMNS,
            predicates,
            orderings: ordering.into_iter().collect(),
            limit,
        })
    }

    pub fn translate_lambda(&self, lambda: &Lambda) -> Result<SqlExpr> {
        let parameter = lambda.parameter().ok_or_else(|| {
            WherewithError::Unsupported(format!(
                "Predicates must have exactly one parameter, found {}",
                lambda.parameters().len()
            ))
        })?;
        self.translate(lambda.body(), parameter)
    }

    fn translate(&self, expr: &Expr, parameter: &Parameter) -> Result<SqlExpr> {
        let f = &self.factory;
        match expr {
            Expr::Constant(value) => Ok(f.constant(value.clone())),
            Expr::Variable { name, value } => Ok(f.parameter(name, value.clone())),
            Expr::Parameter(p) => Err(WherewithError::Unsupported(format!(
                "Row parameter {} cannot be used as a value",
                p
            ))),
            Expr::Member { target, column } => match target.as_ref() {
                Expr::Parameter(p) if p == parameter => Ok(f.column(TABLE_ALIAS, column)),
                Expr::Parameter(p) => Err(WherewithError::Unsupported(format!(
                    "{} over {} is not the parameter of the enclosing predicate ({})",
                    p,
                    p.entity(),
                    parameter
                ))),
                _ => Err(WherewithError::Unsupported(format!(
                    "Column {} must be read directly from the row parameter",
                    column
                ))),
            },
            Expr::Compare { op, left, right } => Ok(f.binary(
                compare_operator(*op),
                self.translate(left, parameter)?,
                self.translate(right, parameter)?,
            )),
            Expr::AndAlso(..) => self.translate_run(expr, Connective::And, parameter),
            Expr::OrElse(..) => self.translate_run(expr, Connective::Or, parameter),
            Expr::Not(operand) => Ok(f.not(self.translate(operand, parameter)?)),
            Expr::IsNull(operand) => Ok(f.is_null(self.translate(operand, parameter)?)),
            Expr::Call { method, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.translate(argument, parameter))
                    .collect::<Result<Vec<_>>>()?;
                if let Some(translated) = self.provider.translate(method, &arguments)? {
                    return Ok(translated);
                }
                match method {
                    Method::Function(name) => Ok(f.function(name, arguments)),
                    Method::Primitive(primitive) => Err(WherewithError::Unsupported(format!(
                        "{} is only available through query translation; register the pattern translators",
                        primitive.name()
                    ))),
                }
            }
        }
    }

    // a run of a thousand or_where calls becomes one flat OR list
    fn translate_run(&self, expr: &Expr, connective: Connective, parameter: &Parameter) -> Result<SqlExpr> {
        let operands = expr
            .operands(connective)
            .into_iter()
            .map(|operand| self.translate(operand, parameter))
            .collect::<Result<Vec<_>>>()?;
        let op = match connective {
            Connective::And => SqlOperator::And,
            Connective::Or => SqlOperator::Or,
        };
        Ok(self.factory.junction(op, operands))
    }
}

fn compare_operator(op: CompareOp) -> SqlOperator {
    match op {
        CompareOp::Equal => SqlOperator::Equal,
        CompareOp::NotEqual => SqlOperator::NotEqual,
        CompareOp::LessThan => SqlOperator::LessThan,
        CompareOp::LessThanOrEqual => SqlOperator::LessThanOrEqual,
        CompareOp::GreaterThan => SqlOperator::GreaterThan,
        CompareOp::GreaterThanOrEqual => SqlOperator::GreaterThanOrEqual,
    }
}
