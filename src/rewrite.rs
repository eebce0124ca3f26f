//! Logical rewrites of predicates and properties.
//!
//! Predicates are taken and returned as shared [`Arc`] nodes, so subtrees a
//! rewrite does not touch are reused rather than copied.

use std::sync::Arc;

use crate::event::{Event, EventRole};
use crate::expr::{Expression, FunctionCall, LogicalOp, Quantifier, QuantifierKind, RelationalOp};
use crate::property::{Pattern, Scope};

/// Operands of nested `and` operators, left to right
pub fn conjuncts(expr: &Arc<Expression>) -> Vec<Arc<Expression>> {
    flatten(expr, LogicalOp::And)
}

/// Operands of nested `or` operators, left to right
pub fn disjuncts(expr: &Arc<Expression>) -> Vec<Arc<Expression>> {
    flatten(expr, LogicalOp::Or)
}

fn flatten(expr: &Arc<Expression>, op: LogicalOp) -> Vec<Arc<Expression>> {
    let mut parts = Vec::new();
    let mut pending = vec![Arc::clone(expr)];
    while let Some(phi) = pending.pop() {
        match &*phi {
            Expression::Logical(o, a, b) if *o == op => {
                pending.push(Arc::clone(b));
                pending.push(Arc::clone(a));
            }
            _ => parts.push(phi),
        }
    }
    parts
}

/// Conditions that must all hold for `expr` to hold, after pushing negations
/// inward and splitting universal quantifiers over conjunctions.
///
/// `True` conditions are dropped. Returns `None` when a condition is the
/// literal `False`, as the whole expression is then unsatisfiable.
pub fn split_and(expr: &Arc<Expression>) -> Option<Vec<Arc<Expression>>> {
    let mut conditions = Vec::new();
    let mut pending = vec![Arc::clone(expr)];
    while let Some(phi) = pending.pop() {
        match &*phi {
            Expression::Bool(true) => continue,
            Expression::Bool(false) => return None,
            _ => {}
        }
        let phi = presplit(&phi);
        match &*phi {
            Expression::Logical(LogicalOp::And, a, b) => {
                pending.push(Arc::clone(b));
                pending.push(Arc::clone(a));
            }
            _ => conditions.push(phi),
        }
    }
    Some(conditions)
}

/// Turns `phi` into a conjunction when an equivalent one exists
fn presplit(phi: &Arc<Expression>) -> Arc<Expression> {
    match &**phi {
        Expression::Not(inner) => presplit_negation(phi, inner),
        Expression::Quantifier(q) => presplit_quantifier(phi, q),
        _ => Arc::clone(phi),
    }
}

fn presplit_negation(neg: &Arc<Expression>, inner: &Arc<Expression>) -> Arc<Expression> {
    match &**inner {
        // not not p == p
        Expression::Not(p) => presplit(p),
        // not (a or b) == not a and not b
        Expression::Logical(LogicalOp::Or, a, b) => and(not(a), not(b)),
        // not (a implies b) == a and not b
        Expression::Logical(LogicalOp::Implies, a, b) => and(Arc::clone(a), not(b)),
        // not exists x: p == forall x: not p
        Expression::Quantifier(q) if q.kind == QuantifierKind::Exists => {
            let universal = negated_existential(q);
            presplit_quantifier(&Arc::new(Expression::Quantifier(universal.clone())), &universal)
        }
        _ => Arc::clone(neg),
    }
}

fn presplit_quantifier(quant: &Arc<Expression>, q: &Quantifier) -> Arc<Expression> {
    if q.kind == QuantifierKind::Forall {
        // forall x: p and q == (forall x: p) and (forall x: q)
        let body = presplit(&q.body);
        if let Expression::Logical(LogicalOp::And, a, b) = &*body {
            return and(universal_part(q, a), universal_part(q, b));
        }
    }
    Arc::clone(quant)
}

/// Separates `expr` into a part that does not mention `@alias` and a part
/// that does, such that their conjunction is equivalent to `expr`. `True`
/// stands for an empty part.
///
/// Conjunctions are split operand by operand. Negations are pushed inward
/// first, and a universal quantifier over a conjunction is split when only
/// one side mentions the alias. Anything else mentioning the alias moves
/// whole into the second part.
pub fn refactor_reference(expr: &Arc<Expression>, alias: &str) -> (Arc<Expression>, Arc<Expression>) {
    if !mentions(expr, alias) {
        return (Arc::clone(expr), truth());
    }
    match &**expr {
        Expression::Logical(LogicalOp::And, ..) => split_conjunction(expr, alias),
        Expression::Quantifier(q) => split_quantifier(expr, q, alias),
        Expression::Not(inner) => split_negation(expr, inner, alias),
        _ => (truth(), Arc::clone(expr)),
    }
}

fn split_conjunction(expr: &Arc<Expression>, alias: &str) -> (Arc<Expression>, Arc<Expression>) {
    let (with, without): (Vec<_>, Vec<_>) = conjuncts(expr)
        .into_iter()
        .partition(|c| mentions(c, alias));
    if without.is_empty() {
        return (truth(), Arc::clone(expr));
    }
    (conjunction(without), conjunction(with))
}

fn split_quantifier(
    quant: &Arc<Expression>,
    q: &Quantifier,
    alias: &str,
) -> (Arc<Expression>, Arc<Expression>) {
    if q.kind == QuantifierKind::Forall && !mentions(&q.domain, alias) {
        let body = match &*q.body {
            Expression::Not(inner) => match &**inner {
                Expression::Logical(LogicalOp::Or, a, b) => and(not(a), not(b)),
                _ => Arc::clone(&q.body),
            },
            _ => Arc::clone(&q.body),
        };
        if let Expression::Logical(LogicalOp::And, a, b) = &*body {
            match (mentions(a, alias), mentions(b, alias)) {
                (true, false) => return (universal_part(q, b), universal_part(q, a)),
                (false, true) => return (universal_part(q, a), universal_part(q, b)),
                _ => {}
            }
        }
    }
    (truth(), Arc::clone(quant))
}

fn split_negation(
    neg: &Arc<Expression>,
    inner: &Arc<Expression>,
    alias: &str,
) -> (Arc<Expression>, Arc<Expression>) {
    match &**inner {
        Expression::Not(p) => refactor_reference(p, alias),
        Expression::Logical(LogicalOp::Implies, a, b) => {
            split_conjunction(&and(Arc::clone(a), not(b)), alias)
        }
        Expression::Logical(LogicalOp::Or, a, b) => split_conjunction(&and(not(a), not(b)), alias),
        Expression::Quantifier(q) if q.kind == QuantifierKind::Exists => {
            let universal = negated_existential(q);
            split_quantifier(&Arc::new(Expression::Quantifier(universal.clone())), &universal, alias)
        }
        _ => (truth(), Arc::clone(neg)),
    }
}

fn mentions(expr: &Expression, alias: &str) -> bool {
    expr.external_references().contains(alias)
}

/// `forall x in D: part`, or `len(D) = 0 or part` when `part` ignores `x`
fn universal_part(q: &Quantifier, part: &Arc<Expression>) -> Arc<Expression> {
    if part.external_references().contains(&q.bound_var) {
        Arc::new(Expression::Quantifier(Quantifier {
            kind: QuantifierKind::Forall,
            bound_var: q.bound_var.clone(),
            domain: Arc::clone(&q.domain),
            body: Arc::clone(part),
        }))
    } else {
        let empty = Expression::Relational(
            RelationalOp::Eq,
            Arc::new(Expression::FunctionCall(FunctionCall {
                name: "len".into(),
                arg: Arc::clone(&q.domain),
            })),
            Arc::new(Expression::number(0.0)),
        );
        Arc::new(Expression::Logical(LogicalOp::Or, Arc::new(empty), Arc::clone(part)))
    }
}

fn negated_existential(q: &Quantifier) -> Quantifier {
    Quantifier {
        kind: QuantifierKind::Forall,
        bound_var: q.bound_var.clone(),
        domain: Arc::clone(&q.domain),
        body: not(&q.body),
    }
}

fn conjunction(parts: Vec<Arc<Expression>>) -> Arc<Expression> {
    parts.into_iter().reduce(and).unwrap_or_else(truth)
}

fn and(a: Arc<Expression>, b: Arc<Expression>) -> Arc<Expression> {
    Arc::new(Expression::Logical(LogicalOp::And, a, b))
}

fn not(a: &Arc<Expression>) -> Arc<Expression> {
    Arc::new(Expression::Not(Arc::clone(a)))
}

fn truth() -> Arc<Expression> {
    Arc::new(Expression::Bool(true))
}

/// One scope per member of the activator disjunction
pub(crate) fn scope_variants(scope: &Scope) -> Vec<Scope> {
    match scope.activator() {
        Some(activator) if activator.members().len() > 1 => split_role(activator, |member| {
            scope.map_events(|role, event| pick(role, EventRole::Activator, event, member))
        }),
        _ => vec![scope.clone()],
    }
}

/// Safety patterns split their behaviour, response patterns their trigger.
/// Existence patterns never split.
pub(crate) fn pattern_variants(pattern: &Pattern) -> Vec<Pattern> {
    let (role, event) = if pattern.is_safety() {
        (EventRole::Behaviour, Some(pattern.event()))
    } else if pattern.is_response() {
        (EventRole::Trigger, pattern.trigger())
    } else {
        return vec![pattern.clone()];
    };
    match event {
        Some(event) if event.members().len() > 1 => {
            split_role(event, |member| pattern.map_events(|r, e| pick(r, role, e, member)))
        }
        _ => vec![pattern.clone()],
    }
}

fn split_role<T>(event: &Event, mut with_member: impl FnMut(&Event) -> T) -> Vec<T> {
    event
        .members()
        .iter()
        .map(|member| with_member(&Event::Simple(member.clone())))
        .collect()
}

fn pick(role: EventRole, split: EventRole, event: &Event, member: &Event) -> Event {
    if role == split {
        member.clone()
    } else {
        event.clone()
    }
}
