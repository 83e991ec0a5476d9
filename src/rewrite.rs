//! Structural rewriting of predicate trees.
//!
//! The only rewrite rule needed by the combinators is parameter substitution:
//! two fragments written against their own row parameter are moved onto one
//! shared parameter before they are joined with `AND` or `OR`. The walk keeps
//! every subtree that did not change, so a rewritten fragment shares all of
//! its untouched nodes with the original.

use std::sync::Arc;

use crate::construct::{Expr, Parameter};

/// One rewrite rule applied over a full recursive walk of the tree.
pub trait Rewriter {
    /// Replacement for a parameter node, or `None` to keep it.
    fn rewrite_parameter(&self, parameter: &Parameter) -> Option<Expr>;

    fn visit(&self, expr: &Arc<Expr>) -> Arc<Expr> {
        match expr.as_ref() {
            Expr::Parameter(parameter) => match self.rewrite_parameter(parameter) {
                Some(replacement) => Arc::new(replacement),
                None => Arc::clone(expr),
            },
            Expr::Constant(_) | Expr::Variable { .. } => Arc::clone(expr),
            Expr::Member { target, column } => {
                let visited = self.visit(target);
                if Arc::ptr_eq(&visited, target) {
                    Arc::clone(expr)
                } else {
                    Arc::new(Expr::Member { target: visited, column: Arc::clone(column) })
                }
            }
            Expr::Compare { op, left, right } => {
                match self.visit_pair(left, right) {
                    Some((left, right)) => Arc::new(Expr::Compare { op: *op, left, right }),
                    None => Arc::clone(expr),
                }
            }
            Expr::AndAlso(..) | Expr::OrElse(..) => self.visit_connectives(expr),
            Expr::Not(operand) => {
                let visited = self.visit(operand);
                if Arc::ptr_eq(&visited, operand) {
                    Arc::clone(expr)
                } else {
                    Arc::new(Expr::Not(visited))
                }
            }
            Expr::IsNull(operand) => {
                let visited = self.visit(operand);
                if Arc::ptr_eq(&visited, operand) {
                    Arc::clone(expr)
                } else {
                    Arc::new(Expr::IsNull(visited))
                }
            }
            Expr::Call { method, arguments } => {
                let visited: Vec<Arc<Expr>> = arguments.iter().map(|a| self.visit(a)).collect();
                if visited.iter().zip(arguments).all(|(v, a)| Arc::ptr_eq(v, a)) {
                    Arc::clone(expr)
                } else {
                    Arc::new(Expr::Call { method: method.clone(), arguments: visited })
                }
            }
        }
    }

    /// Walks the left spine of AND/OR nodes with a loop. Every `or_where` and
    /// every collapsed group fragment adds one level on the left.
    fn visit_connectives(&self, expr: &Arc<Expr>) -> Arc<Expr> {
        let mut spine = Vec::new();
        let mut leftmost = expr;
        while let Some((_, left, _)) = leftmost.connective() {
            spine.push(leftmost);
            leftmost = left;
        }
        let mut visited = self.visit(leftmost);
        for node in spine.into_iter().rev() {
            let Some((connective, left, right)) = node.connective() else {
                continue;
            };
            let visited_right = self.visit(right);
            visited = if Arc::ptr_eq(&visited, left) && Arc::ptr_eq(&visited_right, right) {
                Arc::clone(node)
            } else {
                Arc::new(connective.join(visited, visited_right))
            };
        }
        visited
    }

    /// Both sides visited; `None` when neither changed.
    fn visit_pair(&self, left: &Arc<Expr>, right: &Arc<Expr>) -> Option<(Arc<Expr>, Arc<Expr>)> {
        let visited_left = self.visit(left);
        let visited_right = self.visit(right);
        if Arc::ptr_eq(&visited_left, left) && Arc::ptr_eq(&visited_right, right) {
            None
        } else {
            Some((visited_left, visited_right))
        }
    }
}

/// Substitutes every occurrence of `from` with `to`.
pub struct ParameterReplacer<'p> {
    from: &'p Parameter,
    to: &'p Parameter,
}

impl<'p> ParameterReplacer<'p> {
    pub fn new(from: &'p Parameter, to: &'p Parameter) -> Self {
        Self { from, to }
    }
}

impl Rewriter for ParameterReplacer<'_> {
    fn rewrite_parameter(&self, parameter: &Parameter) -> Option<Expr> {
        (parameter == self.from).then(|| Expr::parameter(self.to))
    }
}

/// Rebinds `body` from parameter `from` onto `to`. Returns `body` itself when
/// the two parameters are already the same.
pub fn replace_parameter(body: &Arc<Expr>, from: &Parameter, to: &Parameter) -> Arc<Expr> {
    if from == to {
        return Arc::clone(body);
    }
    ParameterReplacer::new(from, to).visit(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{Connective, Method, Primitive};

    fn mentions(expr: &Expr, parameter: &Parameter) -> bool {
        match expr {
            Expr::Parameter(p) => p == parameter,
            Expr::Constant(_) | Expr::Variable { .. } => false,
            Expr::Member { target, .. } => mentions(target, parameter),
            Expr::Compare { left, right, .. } | Expr::AndAlso(left, right) | Expr::OrElse(left, right) => {
                mentions(left, parameter) || mentions(right, parameter)
            }
            Expr::Not(operand) | Expr::IsNull(operand) => mentions(operand, parameter),
            Expr::Call { arguments, .. } => arguments.iter().any(|a| mentions(a, parameter)),
        }
    }

    #[test]
    fn substitution_reaches_primitive_arguments() {
        let p1 = Parameter::new("u", "users");
        let p2 = Parameter::new("x", "users");
        let row = Expr::parameter(&p1);
        let body = Arc::new(
            row.column("first_name")
                .ilike_contains("th")
                .or(!row.column("last_name").is_null()),
        );
        let rebound = replace_parameter(&body, &p1, &p2);
        assert!(!mentions(&rebound, &p1));
        assert!(mentions(&rebound, &p2));
        match rebound.as_ref() {
            Expr::OrElse(left, _) => match left.as_ref() {
                Expr::Call { method, arguments } => {
                    assert_eq!(*method, Method::Primitive(Primitive::ILikeContains));
                    assert_eq!(arguments.len(), 2);
                }
                other => panic!("expected a primitive call, got {other:?}"),
            },
            other => panic!("expected an OR, got {other:?}"),
        }
    }

    #[test]
    fn same_parameter_is_identity() {
        let p = Parameter::new("u", "users");
        let body = Arc::new(Expr::parameter(&p).column("first_name").eq("Alice"));
        let rebound = replace_parameter(&body, &p, &p);
        assert!(Arc::ptr_eq(&body, &rebound));
    }

    #[test]
    fn untouched_subtrees_are_shared() {
        let p1 = Parameter::new("u", "users");
        let p2 = Parameter::new("x", "users");
        let constant_side = Arc::new(Expr::constant(1).eq(1));
        let body = Arc::new(Expr::AndAlso(
            Arc::clone(&constant_side),
            Arc::new(Expr::parameter(&p1).column("id").eq(7)),
        ));
        let rebound = replace_parameter(&body, &p1, &p2);
        match rebound.as_ref() {
            Expr::AndAlso(left, _) => assert!(Arc::ptr_eq(left, &constant_side)),
            other => panic!("expected an AND, got {other:?}"),
        }
    }

    #[test]
    fn deep_or_runs_are_rebound_in_place() {
        let p1 = Parameter::new("u", "users");
        let p2 = Parameter::new("x", "users");
        let stranger = Parameter::new("v", "users");
        let constant_side = Arc::new(Expr::constant(1).eq(2));
        let mut body = Arc::new(Expr::parameter(&p1).column("id").eq(0));
        for _ in 1..10_000 {
            body = Arc::new(Expr::OrElse(body, Arc::clone(&constant_side)));
        }
        assert!(Arc::ptr_eq(&ParameterReplacer::new(&stranger, &p2).visit(&body), &body));

        let rebound = replace_parameter(&body, &p1, &p2);
        let operands = rebound.operands(Connective::Or);
        assert_eq!(operands.len(), 10_000);
        assert!(mentions(operands[0], &p2));
        assert!(operands[1..].iter().all(|o| std::ptr::eq(*o, constant_side.as_ref())));
    }
}
