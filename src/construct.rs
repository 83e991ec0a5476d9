use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use uuid::Uuid;

// our own stuff that we need
use crate::datatype::Value;

// ------------- Entity -------------
/// A row type a query can be built over. The mapping itself (table and
/// columns) is owned by the caller; the session only hands rows back.
pub trait Entity: Sized {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

// ------------- Parameter -------------
pub type ParameterId = u64;

pub const GENESIS: ParameterId = 0;

static PARAMETER_GENERATOR: AtomicU64 = AtomicU64::new(GENESIS + 1);

/// Stands for "the current row" inside a predicate. Two parameters are the
/// same parameter only if they share an identity, regardless of name.
#[derive(Clone, Debug)]
pub struct Parameter {
    id: ParameterId,
    name: Arc<str>,
    entity: &'static str,
}

impl Parameter {
    pub fn new(name: &str, entity: &'static str) -> Self {
        Self {
            id: PARAMETER_GENERATOR.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
            entity,
        }
    }
    pub fn id(&self) -> ParameterId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn entity(&self) -> &'static str {
        self.entity
    }
}
impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Parameter {}
impl Hash for Parameter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

// ------------- Methods -------------
/// Comparisons that have no native translation and must be lowered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    EqualsLowerCase,
    ILike,
    ILikeStartsWith,
    ILikeEndsWith,
    ILikeContains,
}

impl Primitive {
    pub const ARITY: usize = 2;

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::EqualsLowerCase => "equals_lower_case",
            Primitive::ILike => "ilike",
            Primitive::ILikeStartsWith => "ilike_starts_with",
            Primitive::ILikeEndsWith => "ilike_ends_with",
            Primitive::ILikeContains => "ilike_contains",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Primitive(Primitive),
    /// A scalar function the database already knows, e.g. `lower` or `length`.
    Function(Arc<str>),
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Method::Primitive(p) => write!(f, "{}", p.name()),
            Method::Function(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// The two short-circuit connectives of a predicate body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn join(self, left: Arc<Expr>, right: Arc<Expr>) -> Expr {
        match self {
            Connective::And => Expr::AndAlso(left, right),
            Connective::Or => Expr::OrElse(left, right),
        }
    }
}

// ------------- Expression -------------
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Constant(Value),
    /// A value captured from the caller, bound as a statement parameter.
    Variable { name: Arc<str>, value: Value },
    Parameter(Parameter),
    Member { target: Arc<Expr>, column: Arc<str> },
    Compare { op: CompareOp, left: Arc<Expr>, right: Arc<Expr> },
    AndAlso(Arc<Expr>, Arc<Expr>),
    OrElse(Arc<Expr>, Arc<Expr>),
    Not(Arc<Expr>),
    IsNull(Arc<Expr>),
    Call { method: Method, arguments: Vec<Arc<Expr>> },
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }
    pub fn variable(name: &str, value: impl Into<Value>) -> Self {
        Expr::Variable { name: Arc::from(name), value: value.into() }
    }
    pub fn parameter(parameter: &Parameter) -> Self {
        Expr::Parameter(parameter.clone())
    }
    pub fn function(name: &str, arguments: Vec<Expr>) -> Self {
        Expr::Call {
            method: Method::Function(Arc::from(name)),
            arguments: arguments.into_iter().map(Arc::new).collect(),
        }
    }
    pub fn column(&self, column: &str) -> Self {
        Expr::Member { target: Arc::new(self.clone()), column: Arc::from(column) }
    }

    fn compare(self, op: CompareOp, other: impl Into<Expr>) -> Self {
        Expr::Compare { op, left: Arc::new(self), right: Arc::new(other.into()) }
    }
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::Equal, other)
    }
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::NotEqual, other)
    }
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::LessThan, other)
    }
    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::LessThanOrEqual, other)
    }
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::GreaterThan, other)
    }
    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.compare(CompareOp::GreaterThanOrEqual, other)
    }
    pub fn and(self, other: Expr) -> Self {
        Expr::AndAlso(Arc::new(self), Arc::new(other))
    }
    pub fn or(self, other: Expr) -> Self {
        Expr::OrElse(Arc::new(self), Arc::new(other))
    }
    pub fn is_null(self) -> Self {
        Expr::IsNull(Arc::new(self))
    }
    pub fn lower(self) -> Self {
        Expr::function("lower", vec![self])
    }
    pub fn upper(self) -> Self {
        Expr::function("upper", vec![self])
    }

    fn primitive(self, primitive: Primitive, value: impl Into<Expr>) -> Self {
        Expr::Call {
            method: Method::Primitive(primitive),
            arguments: vec![Arc::new(self), Arc::new(value.into())],
        }
    }
    pub fn equals_lower_case(self, value: impl Into<Expr>) -> Self {
        self.primitive(Primitive::EqualsLowerCase, value)
    }
    pub fn ilike(self, pattern: impl Into<Expr>) -> Self {
        self.primitive(Primitive::ILike, pattern)
    }
    pub fn ilike_starts_with(self, value: impl Into<Expr>) -> Self {
        self.primitive(Primitive::ILikeStartsWith, value)
    }
    pub fn ilike_ends_with(self, value: impl Into<Expr>) -> Self {
        self.primitive(Primitive::ILikeEndsWith, value)
    }
    pub fn ilike_contains(self, value: impl Into<Expr>) -> Self {
        self.primitive(Primitive::ILikeContains, value)
    }

    pub fn connective(&self) -> Option<(Connective, &Arc<Expr>, &Arc<Expr>)> {
        match self {
            Expr::AndAlso(left, right) => Some((Connective::And, left, right)),
            Expr::OrElse(left, right) => Some((Connective::Or, left, right)),
            _ => None,
        }
    }

    /// The operands of the run of `connective` rooted here, left to right.
    /// An expression that is not such a run is its own single operand.
    pub fn operands(&self, connective: Connective) -> Vec<&Expr> {
        let mut operands = Vec::new();
        let mut pending = vec![self];
        while let Some(expr) = pending.pop() {
            match expr.connective() {
                Some((c, left, right)) if c == connective => {
                    pending.push(&**right);
                    pending.push(&**left);
                }
                _ => operands.push(expr),
            }
        }
        operands
    }

    /// True for the constant `value`, which is how sentinels are recognized.
    pub fn is_constant_bool(&self, value: bool) -> bool {
        matches!(self, Expr::Constant(Value::Bool(b)) if *b == value)
    }
}

lazy_static! {
    // stands in for children detached while a tree is being dropped
    static ref DETACHED_EXPR: Arc<Expr> = Arc::new(Expr::Constant(Value::Null));
    static ref DETACHED_NODE: Arc<QueryNode> = Arc::new(QueryNode::Source { table: "" });
}

/// Moves the children only this node owns into `pending`.
fn detach_children(expr: &mut Expr, pending: &mut Vec<Arc<Expr>>) {
    let mut detach = |child: &mut Arc<Expr>| {
        if Arc::strong_count(child) == 1 {
            pending.push(std::mem::replace(child, Arc::clone(&*DETACHED_EXPR)));
        }
    };
    match expr {
        Expr::Constant(_) | Expr::Variable { .. } | Expr::Parameter(_) => {}
        Expr::Member { target, .. } => detach(target),
        Expr::Compare { left, right, .. } | Expr::AndAlso(left, right) | Expr::OrElse(left, right) => {
            detach(left);
            detach(right);
        }
        Expr::Not(operand) | Expr::IsNull(operand) => detach(operand),
        Expr::Call { arguments, .. } => arguments.iter_mut().for_each(&mut detach),
    }
}

// Long OR/AND runs are thousands of levels deep, so dropping them must not recurse.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_children(self, &mut pending);
        while let Some(child) = pending.pop() {
            if let Ok(mut owned) = Arc::try_unwrap(child) {
                detach_children(&mut owned, &mut pending);
            }
        }
    }
}

impl ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::Not(Arc::new(self))
    }
}

macro_rules! expr_from_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(v: $t) -> Self { Expr::Constant(Value::from(v)) }
            }
        )*
    };
}
expr_from_value!(bool, i32, i64, f64, &str, String, &String, Uuid, Value);

// ------------- Lambda -------------
/// A boolean fragment together with the parameter(s) it is written against.
#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    parameters: Vec<Parameter>,
    body: Arc<Expr>,
}

impl Lambda {
    pub fn new(parameters: Vec<Parameter>, body: Expr) -> Self {
        Self { parameters, body: Arc::new(body) }
    }
    pub fn from_shared(parameter: Parameter, body: Arc<Expr>) -> Self {
        Self { parameters: vec![parameter], body }
    }
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
    /// The parameter, provided there is exactly one.
    pub fn parameter(&self) -> Option<&Parameter> {
        match self.parameters.as_slice() {
            [parameter] => Some(parameter),
            _ => None,
        }
    }
    pub fn body(&self) -> &Arc<Expr> {
        &self.body
    }
    pub fn is_always(&self, value: bool) -> bool {
        self.body.is_constant_bool(value)
    }
}

// ------------- Predicate -------------
/// A [`Lambda`] known to be written against entity `E`.
pub struct Predicate<E> {
    lambda: Lambda,
    entity: PhantomData<fn(&E) -> bool>,
}

impl<E: Entity> Predicate<E> {
    pub fn new(build: impl FnOnce(&Expr) -> Expr) -> Self {
        Self::named("x", build)
    }
    pub fn named(name: &str, build: impl FnOnce(&Expr) -> Expr) -> Self {
        let parameter = Parameter::new(name, E::TABLE);
        let body = build(&Expr::parameter(&parameter));
        Self::from_lambda(Lambda::new(vec![parameter], body))
    }
    pub fn always(value: bool) -> Self {
        Self::new(|_| Expr::constant(value))
    }
}

impl<E> Predicate<E> {
    pub fn from_lambda(lambda: Lambda) -> Self {
        Self { lambda, entity: PhantomData }
    }
    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }
    pub fn into_lambda(self) -> Lambda {
        self.lambda
    }
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self::from_lambda(self.lambda.clone())
    }
}
impl<E> fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.lambda).finish()
    }
}

// ------------- Query chain -------------
#[derive(Clone, Debug, PartialEq)]
pub enum QueryNode {
    /// The origin of every chain.
    Source { table: &'static str },
    Filter { base: Arc<QueryNode>, predicate: Lambda },
    /// Closes the running OR-accumulation; filters nothing by itself.
    Boundary { base: Arc<QueryNode> },
    OrderBy { base: Arc<QueryNode>, key: Lambda, descending: bool },
    Take { base: Arc<QueryNode>, count: usize },
}

/// A borrowed view of a filter step.
#[derive(Clone, Copy, Debug)]
pub struct FilterStep<'q> {
    pub base: &'q Arc<QueryNode>,
    pub predicate: &'q Lambda,
}

impl FilterStep<'_> {
    pub fn parameter(&self) -> Option<&Parameter> {
        self.predicate.parameter()
    }
    pub fn is_group_marker(&self) -> bool {
        self.predicate.is_always(true)
    }
}

impl QueryNode {
    pub fn base(&self) -> Option<&Arc<QueryNode>> {
        match self {
            QueryNode::Source { .. } => None,
            QueryNode::Filter { base, .. }
            | QueryNode::Boundary { base }
            | QueryNode::OrderBy { base, .. }
            | QueryNode::Take { base, .. } => Some(base),
        }
    }
    pub fn as_filter(&self) -> Option<FilterStep<'_>> {
        match self {
            QueryNode::Filter { base, predicate } => Some(FilterStep { base, predicate }),
            _ => None,
        }
    }
    fn detach_base(&mut self) -> Option<Arc<QueryNode>> {
        match self {
            QueryNode::Source { .. } => None,
            QueryNode::Filter { base, .. }
            | QueryNode::Boundary { base }
            | QueryNode::OrderBy { base, .. }
            | QueryNode::Take { base, .. } => {
                (Arc::strong_count(base) == 1).then(|| std::mem::replace(base, Arc::clone(&*DETACHED_NODE)))
            }
        }
    }
}

impl Drop for QueryNode {
    fn drop(&mut self) {
        let mut next = self.detach_base();
        while let Some(node) = next {
            next = match Arc::try_unwrap(node) {
                Ok(mut owned) => owned.detach_base(),
                Err(_) => None,
            };
        }
    }
}

/// An immutable, composable query over `E`. Cloning is cheap and every
/// operation returns a new query that shares the unchanged part of the chain.
pub struct Query<E> {
    node: Arc<QueryNode>,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Query<E> {
    pub fn from_entity() -> Self {
        Self::from_node(Arc::new(QueryNode::Source { table: E::TABLE }))
    }
    pub fn filter(&self, predicate: Predicate<E>) -> Self {
        self.decorate(QueryNode::Filter {
            base: Arc::clone(&self.node),
            predicate: predicate.into_lambda(),
        })
    }
    pub fn order_by(&self, key: impl FnOnce(&Expr) -> Expr) -> Self {
        self.ordered(key, false)
    }
    pub fn order_by_descending(&self, key: impl FnOnce(&Expr) -> Expr) -> Self {
        self.ordered(key, true)
    }
    fn ordered(&self, key: impl FnOnce(&Expr) -> Expr, descending: bool) -> Self {
        let key = Predicate::<E>::new(key).into_lambda();
        self.decorate(QueryNode::OrderBy { base: Arc::clone(&self.node), key, descending })
    }
    pub fn take(&self, count: usize) -> Self {
        self.decorate(QueryNode::Take { base: Arc::clone(&self.node), count })
    }
}

impl<E> Query<E> {
    pub fn from_node(node: Arc<QueryNode>) -> Self {
        Self { node, entity: PhantomData }
    }
    pub fn node(&self) -> &Arc<QueryNode> {
        &self.node
    }
    pub(crate) fn decorate(&self, node: QueryNode) -> Self {
        Self::from_node(Arc::new(node))
    }
    /// The outermost filter step, if the outermost decoration is one.
    pub fn filter_step(&self) -> Option<FilterStep<'_>> {
        self.node.as_filter()
    }
    /// Rebuilds the outermost filter step around `predicate`, keeping its base.
    pub fn with_filter(&self, predicate: Lambda) -> Option<Self> {
        let step = self.filter_step()?;
        Some(self.decorate(QueryNode::Filter { base: Arc::clone(step.base), predicate }))
    }
    /// Pointer identity, i.e. the two queries are the very same chain.
    pub fn same_chain(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self::from_node(Arc::clone(&self.node))
    }
}
impl<E> PartialEq for Query<E> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}
impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Query").field(&self.node).finish()
    }
}
