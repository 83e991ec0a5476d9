//! Incremental filter composition on top of [`Query`].
//!
//! A query's filter is a chain of steps that the compiler ANDs together.
//! The combinators here let callers grow that filter one fragment at a time:
//!
//! * [`Query::or_where`] ORs a fragment into the outermost filter step, or
//!   starts a new step when there is nothing to extend.
//! * [`Query::and`] closes the running OR so the next `or_where` starts a new
//!   AND-ed step.
//! * [`Query::begin_group`] and [`Query::end_group`] collapse every step
//!   written between them into a single AND-ed step, which later `or_where`
//!   calls can then extend as a whole.
//! * The `_if` variants apply only when a condition holds and otherwise hand
//!   back the very same chain.
//!
//! Groups do not nest. An `end_group` that finds no marker is the only
//! modeled misuse besides predicates that do not have exactly one parameter.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::construct::{Entity, Expr, Lambda, Parameter, Predicate, Query, QueryNode};
use crate::error::{Result, WherewithError};
use crate::rewrite::replace_parameter;

fn usage_error(combinator: &'static str, message: impl Into<String>) -> WherewithError {
    let error = WherewithError::usage(combinator, message);
    warn!(%error, "rejecting combinator call");
    error
}

fn single_parameter<'l>(combinator: &'static str, lambda: &'l Lambda) -> Result<&'l Parameter> {
    lambda.parameter().ok_or_else(|| {
        usage_error(
            combinator,
            format!(
                "only predicates with a single parameter are supported, found {}",
                lambda.parameters().len()
            ),
        )
    })
}

// ------------- Presence -------------
/// A value that may be absent. Absent means `None`, an empty string or the
/// nil UUID; the present value is what the predicate builder receives.
pub trait Presence {
    type Present;
    fn present(self) -> Option<Self::Present>;
}

impl<'a> Presence for &'a str {
    type Present = &'a str;
    fn present(self) -> Option<&'a str> {
        (!self.is_empty()).then_some(self)
    }
}
impl<'a> Presence for &'a String {
    type Present = &'a str;
    fn present(self) -> Option<&'a str> {
        self.as_str().present()
    }
}
impl Presence for String {
    type Present = String;
    fn present(self) -> Option<String> {
        (!self.is_empty()).then_some(self)
    }
}
impl<'a> Presence for Option<&'a str> {
    type Present = &'a str;
    fn present(self) -> Option<&'a str> {
        self.and_then(Presence::present)
    }
}
impl Presence for Option<String> {
    type Present = String;
    fn present(self) -> Option<String> {
        self.and_then(Presence::present)
    }
}
impl<'a> Presence for &'a Option<String> {
    type Present = &'a str;
    fn present(self) -> Option<&'a str> {
        self.as_deref().present()
    }
}
impl Presence for Uuid {
    type Present = Uuid;
    fn present(self) -> Option<Uuid> {
        (!self.is_nil()).then_some(self)
    }
}
impl Presence for Option<Uuid> {
    type Present = Uuid;
    fn present(self) -> Option<Uuid> {
        self.and_then(Presence::present)
    }
}

/// Present and not made of whitespace only.
fn not_blank<S: AsRef<str>>(value: Option<S>) -> Option<S> {
    value.filter(|s| !s.as_ref().trim().is_empty())
}

// ------------- Combinators -------------
impl<E: Entity> Query<E> {
    /// ORs `predicate` into the outermost filter step. When the outermost
    /// decoration is anything else (the source, an ordering, a limit, an AND
    /// boundary or a group marker) this is a plain [`Query::filter`].
    pub fn or_where(&self, predicate: Predicate<E>) -> Result<Self> {
        let lambda = predicate.into_lambda();
        let incoming = single_parameter("or_where", &lambda)?;
        let step = match self.filter_step() {
            Some(step) if !step.is_group_marker() => step,
            _ => {
                trace!("or_where: nothing to extend, starting a new filter step");
                return Ok(self.filter(Predicate::from_lambda(lambda)));
            }
        };
        let parameter = single_parameter("or_where", step.predicate)?;
        let rebound = replace_parameter(lambda.body(), incoming, parameter);
        let combined = Expr::OrElse(Arc::clone(step.predicate.body()), rebound);
        trace!(%parameter, "or_where: extending the outermost filter step");
        Ok(self.decorate(QueryNode::Filter {
            base: Arc::clone(step.base),
            predicate: Lambda::from_shared(parameter.clone(), Arc::new(combined)),
        }))
    }

    /// Ends the running OR; the next `or_where` starts a new AND-ed step.
    pub fn and(&self) -> Self {
        trace!("and: closing the running OR");
        self.decorate(QueryNode::Boundary { base: Arc::clone(self.node()) })
    }

    pub fn and_if(&self, condition: bool) -> Self {
        if condition { self.and() } else { self.clone() }
    }

    /// Marks where a group starts. The marker is an always-true step.
    pub fn begin_group(&self) -> Self {
        trace!("begin_group: appending group marker");
        self.filter(Predicate::always(true))
    }

    pub fn begin_group_if(&self, condition: bool) -> Self {
        if condition { self.begin_group() } else { self.clone() }
    }

    /// Collapses the filter steps written since the last [`Query::begin_group`]
    /// into one step that ANDs them in their original order.
    pub fn end_group(&self) -> Result<Self> {
        let mut fragments: Vec<&Lambda> = Vec::new();
        let mut node = self.node();
        let base = loop {
            match node.as_ref() {
                QueryNode::Filter { base, predicate } if predicate.is_always(true) => break base,
                QueryNode::Filter { base, predicate } => {
                    fragments.push(predicate);
                    node = base;
                }
                QueryNode::Boundary { base } => node = base,
                QueryNode::Source { .. } | QueryNode::OrderBy { .. } | QueryNode::Take { .. } => {
                    return Err(usage_error(
                        "end_group",
                        "unmatched group terminator, call begin_group() first",
                    ));
                }
            }
        };
        // collected outermost first, so the first written fragment is last
        let Some((first, rest)) = fragments.split_last() else {
            debug!("end_group: empty group discarded");
            return Ok(Self::from_node(Arc::clone(base)));
        };
        let shared = Parameter::new("x", E::TABLE);
        let rebind = |fragment: &Lambda| -> Result<Arc<Expr>> {
            let parameter = single_parameter("end_group", fragment)?;
            Ok(replace_parameter(fragment.body(), parameter, &shared))
        };
        let mut body = rebind(*first)?;
        for fragment in rest.iter().rev() {
            body = Arc::new(Expr::AndAlso(body, rebind(*fragment)?));
        }
        debug!(fragments = fragments.len(), "end_group: group collapsed into one filter step");
        Ok(self.decorate(QueryNode::Filter {
            base: Arc::clone(base),
            predicate: Lambda::from_shared(shared, body),
        }))
    }

    pub fn end_group_if(&self, condition: bool) -> Result<Self> {
        if condition { self.end_group() } else { Ok(self.clone()) }
    }

    // ------------- Conditional inclusion -------------
    pub fn where_if(&self, condition: bool, predicate: Predicate<E>) -> Self {
        if condition {
            self.filter(predicate)
        } else {
            trace!("where_if: condition false, chain unchanged");
            self.clone()
        }
    }

    pub fn or_where_if(&self, condition: bool, predicate: Predicate<E>) -> Result<Self> {
        if condition {
            self.or_where(predicate)
        } else {
            trace!("or_where_if: condition false, chain unchanged");
            Ok(self.clone())
        }
    }

    /// Filters with the predicate built from `value` when it is present.
    pub fn where_if_present<V: Presence>(
        &self,
        value: V,
        build: impl FnOnce(V::Present) -> Predicate<E>,
    ) -> Self {
        match value.present() {
            Some(present) => self.filter(build(present)),
            None => self.clone(),
        }
    }

    pub fn or_where_if_present<V: Presence>(
        &self,
        value: V,
        build: impl FnOnce(V::Present) -> Predicate<E>,
    ) -> Result<Self> {
        match value.present() {
            Some(present) => self.or_where(build(present)),
            None => Ok(self.clone()),
        }
    }

    /// Like [`Query::where_if_present`], but a whitespace-only string also
    /// counts as absent.
    pub fn where_if_not_blank<S: AsRef<str>>(
        &self,
        value: Option<S>,
        build: impl FnOnce(S) -> Predicate<E>,
    ) -> Self {
        match not_blank(value) {
            Some(present) => self.filter(build(present)),
            None => self.clone(),
        }
    }

    pub fn or_where_if_not_blank<S: AsRef<str>>(
        &self,
        value: Option<S>,
        build: impl FnOnce(S) -> Predicate<E>,
    ) -> Result<Self> {
        match not_blank(value) {
            Some(present) => self.or_where(build(present)),
            None => Ok(self.clone()),
        }
    }
}
