use super::Expression;
use recursion::{Collapsible, MappableFrame, PartiallyApplied};

/// short-lived single layer of a predicate expression, used for expressing
/// recursive algorithms over a borrowed Expression without growing the stack
pub enum ExprFrame<X, L> {
    // literals and reference roots, the borrowed node itself
    Leaf(L),
    // one child: negation, unary minus, function argument, field base
    Unary(X),
    // two children: binary operators, ranges, array access
    Binary(X, X),
    // enum literal members
    Many(Vec<X>),
    // quantifier node, domain, body
    Binder(L, X, X),
}

impl<L> MappableFrame for ExprFrame<PartiallyApplied, L> {
    type Frame<X> = ExprFrame<X, L>;

    fn map_frame<A, B>(input: Self::Frame<A>, mut f: impl FnMut(A) -> B) -> Self::Frame<B> {
        use ExprFrame::*;
        match input {
            Leaf(l) => Leaf(l),
            Unary(a) => Unary(f(a)),
            Binary(a, b) => Binary(f(a), f(b)),
            Many(xs) => Many(xs.into_iter().map(f).collect()),
            Binder(l, a, b) => Binder(l, f(a), f(b)),
        }
    }
}

impl<'a> Collapsible for &'a Expression {
    type FrameToken = ExprFrame<PartiallyApplied, &'a Expression>;

    fn into_frame(self) -> ExprFrame<Self, &'a Expression> {
        match self {
            Expression::Bool(_)
            | Expression::Number(_)
            | Expression::String(_)
            | Expression::NumberConstant(_)
            | Expression::Variable(_)
            | Expression::OwnField(_) => ExprFrame::Leaf(self),
            Expression::FieldAccess(a) => ExprFrame::Unary(&*a.base),
            Expression::ArrayAccess(a) => ExprFrame::Binary(&*a.base, &*a.index),
            Expression::FunctionCall(c) => ExprFrame::Unary(&*c.arg),
            Expression::EnumLiteral(members) => {
                ExprFrame::Many(members.iter().map(|m| &**m).collect())
            }
            Expression::RangeLiteral(r) => ExprFrame::Binary(&*r.lower, &*r.upper),
            Expression::Negative(a) | Expression::Not(a) => ExprFrame::Unary(&**a),
            Expression::Arithmetic(_, a, b)
            | Expression::Relational(_, a, b)
            | Expression::Logical(_, a, b) => ExprFrame::Binary(&**a, &**b),
            Expression::Quantifier(q) => ExprFrame::Binder(self, &*q.domain, &*q.body),
        }
    }
}
