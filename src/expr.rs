pub mod frame;

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use recursion::CollapsibleExt;

use crate::event::EventTarget;
use crate::expr::frame::ExprFrame;
use crate::types::DataType;

/// Identifiers, channel names and string contents are shared, immutable strings
pub type Name = Arc<str>;

/// Numeric literal. Equality and hashing are bitwise over a canonical form:
/// every NaN is equal to every other NaN and `-0.0` equals `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct Number(f64);

impl Number {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    fn canonical_bits(self) -> u64 {
        if self.0.is_nan() {
            f64::NAN.to_bits()
        } else if self.0 == 0.0 {
            0
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bits() == other.canonical_bits()
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bits().hash(state)
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_nan() {
            write!(f, "NAN")
        } else if self.0 == f64::INFINITY {
            write!(f, "INF")
        } else if self.0 == f64::NEG_INFINITY {
            write!(f, "(-INF)")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Named numeric constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberConstant {
    Pi,
    Inf,
    Nan,
}

impl NumberConstant {
    pub fn name(&self) -> &'static str {
        match self {
            NumberConstant::Pi => "PI",
            NumberConstant::Inf => "INF",
            NumberConstant::Nan => "NAN",
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            NumberConstant::Pi => std::f64::consts::PI,
            NumberConstant::Inf => f64::INFINITY,
            NumberConstant::Nan => f64::NAN,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PI" => Some(NumberConstant::Pi),
            "INF" => Some(NumberConstant::Inf),
            "NAN" => Some(NumberConstant::Nan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Pow, // **
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationalOp {
    Eq,  // =
    Neq, // !=
    Lt,  // <
    Lte, // <=
    Gt,  // >
    Gte, // >=
    In,  // in
}

impl RelationalOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            RelationalOp::Eq => "=",
            RelationalOp::Neq => "!=",
            RelationalOp::Lt => "<",
            RelationalOp::Lte => "<=",
            RelationalOp::Gt => ">",
            RelationalOp::Gte => ">=",
            RelationalOp::In => "in",
        }
    }

    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            RelationalOp::Lt | RelationalOp::Lte | RelationalOp::Gt | RelationalOp::Gte
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Implies,
    Iff,
}

impl LogicalOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
            LogicalOp::Implies => "implies",
            LogicalOp::Iff => "iff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantifierKind {
    Forall,
    Exists,
}

impl QuantifierKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            QuantifierKind::Forall => "forall",
            QuantifierKind::Exists => "exists",
        }
    }
}

/// What a `Variable` or `OwnField` reference denotes after resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Target {
    #[default]
    Unresolved,
    Event(EventTarget),
    /// variable bound by an enclosing quantifier
    Bound,
}

/// Root of a reference chain: `@alias` or a bare field of the current event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub name: Name,
    pub target: Target,
    pub data_type: DataType,
}

impl Reference {
    pub fn unresolved(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            target: Target::Unresolved,
            data_type: DataType::Reference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldAccess {
    pub base: Arc<Expression>,
    pub field: Name,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayAccess {
    pub base: Arc<Expression>,
    pub index: Arc<Expression>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCall {
    pub name: Name,
    pub arg: Arc<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeLiteral {
    pub lower: Arc<Expression>,
    pub lower_inclusive: bool,
    pub upper: Arc<Expression>,
    pub upper_inclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quantifier {
    pub kind: QuantifierKind,
    pub bound_var: Name,
    pub domain: Arc<Expression>,
    pub body: Arc<Expression>,
}

/// Predicate expression. Children are shared, so cloning a tree is cheap and
/// rewrites keep every untouched subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    // literals
    Bool(bool),
    Number(Number),
    String(Name),
    NumberConstant(NumberConstant),
    // references
    Variable(Reference),
    OwnField(Reference),
    FieldAccess(FieldAccess),
    ArrayAccess(ArrayAccess),
    // compound values
    FunctionCall(FunctionCall),
    EnumLiteral(Vec<Arc<Expression>>),
    RangeLiteral(RangeLiteral),
    // operators
    Negative(Arc<Expression>),
    Not(Arc<Expression>),
    Arithmetic(ArithmeticOp, Arc<Expression>, Arc<Expression>),
    Relational(RelationalOp, Arc<Expression>, Arc<Expression>),
    Logical(LogicalOp, Arc<Expression>, Arc<Expression>),
    Quantifier(Quantifier),
}

impl Expression {
    pub fn bool(value: bool) -> Self {
        Self::Bool(value)
    }
    /// Numeric literal. Non-finite values become the named constants they
    /// print as.
    pub fn number(value: f64) -> Self {
        if value.is_nan() {
            Self::NumberConstant(NumberConstant::Nan)
        } else if value == f64::INFINITY {
            Self::NumberConstant(NumberConstant::Inf)
        } else if value == f64::NEG_INFINITY {
            Self::negative(Self::NumberConstant(NumberConstant::Inf))
        } else {
            Self::Number(Number::new(value))
        }
    }
    pub fn string(value: impl Into<Name>) -> Self {
        Self::String(value.into())
    }
    pub fn constant(constant: NumberConstant) -> Self {
        Self::NumberConstant(constant)
    }
    /// `@name`
    pub fn var(name: impl Into<Name>) -> Self {
        Self::Variable(Reference::unresolved(name))
    }
    /// bare `name`, a field of the current event's message
    pub fn field(name: impl Into<Name>) -> Self {
        Self::OwnField(Reference::unresolved(name))
    }
    pub fn field_access(base: Self, field: impl Into<Name>) -> Self {
        Self::FieldAccess(FieldAccess {
            base: Arc::new(base),
            field: field.into(),
            data_type: DataType::Reference,
        })
    }
    pub fn index(base: Self, index: Self) -> Self {
        Self::ArrayAccess(ArrayAccess {
            base: Arc::new(base),
            index: Arc::new(index),
            data_type: DataType::Reference,
        })
    }
    pub fn call(name: impl Into<Name>, arg: Self) -> Self {
        Self::FunctionCall(FunctionCall {
            name: name.into(),
            arg: Arc::new(arg),
        })
    }
    pub fn enumeration(members: impl IntoIterator<Item = Self>) -> Self {
        Self::EnumLiteral(members.into_iter().map(Arc::new).collect())
    }
    pub fn range(lower: Self, lower_inclusive: bool, upper: Self, upper_inclusive: bool) -> Self {
        Self::RangeLiteral(RangeLiteral {
            lower: Arc::new(lower),
            lower_inclusive,
            upper: Arc::new(upper),
            upper_inclusive,
        })
    }
    pub fn negative(inner: Self) -> Self {
        Self::Negative(Arc::new(inner))
    }
    pub fn not(inner: Self) -> Self {
        Self::Not(Arc::new(inner))
    }
    pub fn arithmetic(op: ArithmeticOp, a: Self, b: Self) -> Self {
        Self::Arithmetic(op, Arc::new(a), Arc::new(b))
    }
    pub fn relational(op: RelationalOp, a: Self, b: Self) -> Self {
        Self::Relational(op, Arc::new(a), Arc::new(b))
    }
    pub fn logical(op: LogicalOp, a: Self, b: Self) -> Self {
        Self::Logical(op, Arc::new(a), Arc::new(b))
    }
    pub fn and(a: Self, b: Self) -> Self {
        Self::logical(LogicalOp::And, a, b)
    }
    pub fn or(a: Self, b: Self) -> Self {
        Self::logical(LogicalOp::Or, a, b)
    }
    pub fn implies(a: Self, b: Self) -> Self {
        Self::logical(LogicalOp::Implies, a, b)
    }
    pub fn iff(a: Self, b: Self) -> Self {
        Self::logical(LogicalOp::Iff, a, b)
    }
    pub fn quantifier(kind: QuantifierKind, var: impl Into<Name>, domain: Self, body: Self) -> Self {
        Self::Quantifier(Quantifier {
            kind,
            bound_var: var.into(),
            domain: Arc::new(domain),
            body: Arc::new(body),
        })
    }
    pub fn forall(var: impl Into<Name>, domain: Self, body: Self) -> Self {
        Self::quantifier(QuantifierKind::Forall, var, domain, body)
    }
    pub fn exists(var: impl Into<Name>, domain: Self, body: Self) -> Self {
        Self::quantifier(QuantifierKind::Exists, var, domain, body)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expression::Bool(_)
                | Expression::Number(_)
                | Expression::String(_)
                | Expression::NumberConstant(_)
                | Expression::EnumLiteral(_)
                | Expression::RangeLiteral(_)
        )
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Expression::Variable(_)
                | Expression::OwnField(_)
                | Expression::FieldAccess(_)
                | Expression::ArrayAccess(_)
        )
    }

    /// Annotated type of a reference node, `None` for every other variant
    pub fn reference_type(&self) -> Option<&DataType> {
        match self {
            Expression::Variable(r) | Expression::OwnField(r) => Some(&r.data_type),
            Expression::FieldAccess(a) => Some(&a.data_type),
            Expression::ArrayAccess(a) => Some(&a.data_type),
            _ => None,
        }
    }

    /// Numeric value of a literal, looking through unary minus
    pub fn static_number(&self) -> Option<f64> {
        match self {
            Expression::Number(n) => Some(n.value()),
            Expression::NumberConstant(c) => Some(c.value()),
            Expression::Negative(inner) => inner.static_number().map(|n| -n),
            _ => None,
        }
    }

    /// Maximum nesting depth, computed without recursing on the call stack
    pub fn depth(&self) -> usize {
        self.collapse_frames(|frame: ExprFrame<usize, &Expression>| match frame {
            ExprFrame::Leaf(_) => 1,
            ExprFrame::Unary(a) => a + 1,
            ExprFrame::Binary(a, b) => a.max(b) + 1,
            ExprFrame::Many(xs) => xs.into_iter().max().unwrap_or(0) + 1,
            ExprFrame::Binder(_, a, b) => a.max(b) + 1,
        })
    }

    /// Alias names referenced with `@`, excluding quantifier-bound variables
    pub fn external_references(&self) -> BTreeSet<Name> {
        self.collapse_frames(|frame: ExprFrame<BTreeSet<Name>, &Expression>| match frame {
            ExprFrame::Leaf(Expression::Variable(r)) => BTreeSet::from([r.name.clone()]),
            ExprFrame::Leaf(_) => BTreeSet::new(),
            ExprFrame::Unary(a) => a,
            ExprFrame::Binary(mut a, mut b) => {
                a.append(&mut b);
                a
            }
            ExprFrame::Many(xs) => xs.into_iter().flatten().collect(),
            ExprFrame::Binder(q, mut domain, mut body) => {
                if let Expression::Quantifier(q) = q {
                    body.remove(&q.bound_var);
                }
                domain.append(&mut body);
                domain
            }
        })
    }

    /// Whether any bare field of the current event's message is mentioned
    pub fn contains_self_reference(&self) -> bool {
        self.collapse_frames(|frame: ExprFrame<bool, &Expression>| match frame {
            ExprFrame::Leaf(e) => matches!(e, Expression::OwnField(_)),
            ExprFrame::Unary(a) => a,
            ExprFrame::Binary(a, b) => a || b,
            ExprFrame::Many(xs) => xs.into_iter().any(|x| x),
            ExprFrame::Binder(_, a, b) => a || b,
        })
    }

    /// Shallow copy with every direct child passed through `f`. Children
    /// returned unchanged by `f` stay shared with `self`.
    pub fn map_children(&self, mut f: impl FnMut(&Arc<Expression>) -> Arc<Expression>) -> Expression {
        match self {
            Expression::Bool(_)
            | Expression::Number(_)
            | Expression::String(_)
            | Expression::NumberConstant(_)
            | Expression::Variable(_)
            | Expression::OwnField(_) => self.clone(),
            Expression::FieldAccess(a) => Expression::FieldAccess(FieldAccess {
                base: f(&a.base),
                ..a.clone()
            }),
            Expression::ArrayAccess(a) => Expression::ArrayAccess(ArrayAccess {
                base: f(&a.base),
                index: f(&a.index),
                data_type: a.data_type.clone(),
            }),
            Expression::FunctionCall(c) => Expression::FunctionCall(FunctionCall {
                name: c.name.clone(),
                arg: f(&c.arg),
            }),
            Expression::EnumLiteral(members) => {
                Expression::EnumLiteral(members.iter().map(f).collect())
            }
            Expression::RangeLiteral(r) => Expression::RangeLiteral(RangeLiteral {
                lower: f(&r.lower),
                upper: f(&r.upper),
                ..r.clone()
            }),
            Expression::Negative(a) => Expression::Negative(f(a)),
            Expression::Not(a) => Expression::Not(f(a)),
            Expression::Arithmetic(op, a, b) => Expression::Arithmetic(*op, f(a), f(b)),
            Expression::Relational(op, a, b) => Expression::Relational(*op, f(a), f(b)),
            Expression::Logical(op, a, b) => Expression::Logical(*op, f(a), f(b)),
            Expression::Quantifier(q) => Expression::Quantifier(Quantifier {
                kind: q.kind,
                bound_var: q.bound_var.clone(),
                domain: f(&q.domain),
                body: f(&q.body),
            }),
        }
    }

    /// Top-down rewrite. `f` returns a replacement for a node, or `None` to
    /// descend into its children. Returns `None` when nothing changed.
    pub fn rewrite<F>(&self, f: &mut F) -> Option<Expression>
    where
        F: FnMut(&Expression) -> Option<Expression>,
    {
        if let Some(replacement) = f(self) {
            return Some(replacement);
        }
        let mut changed = false;
        let rebuilt = self.map_children(|child| match child.rewrite(&mut *f) {
            Some(new) => {
                changed = true;
                Arc::new(new)
            }
            None => Arc::clone(child),
        });
        changed.then_some(rebuilt)
    }

    /// Replace every `@alias` with `replacement`. Quantifiers binding a
    /// variable of the same name hide it in their body.
    pub fn replace_var_reference(&self, alias: &str, replacement: &Expression) -> Expression {
        self.rewrite(&mut |e: &Expression| match e {
            Expression::Variable(r) if &*r.name == alias => Some(replacement.clone()),
            Expression::Quantifier(q) if &*q.bound_var == alias => {
                Some(Expression::Quantifier(Quantifier {
                    domain: Arc::new(q.domain.replace_var_reference(alias, replacement)),
                    ..q.clone()
                }))
            }
            _ => None,
        })
        .unwrap_or_else(|| self.clone())
    }

    /// Rewrite bare fields of the current event as fields of `@alias`, so the
    /// predicate can be moved to another event.
    pub fn replace_self_reference(&self, alias: &str) -> Expression {
        self.rewrite(&mut |e: &Expression| match e {
            Expression::OwnField(r) => Some(Expression::field_access(
                Expression::var(alias),
                r.name.clone(),
            )),
            _ => None,
        })
        .unwrap_or_else(|| self.clone())
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Bool(true) => write!(f, "True"),
            Expression::Bool(false) => write!(f, "False"),
            Expression::Number(n) => write!(f, "{}", n),
            Expression::String(s) => write_string_literal(f, s),
            Expression::NumberConstant(c) => write!(f, "{}", c.name()),
            Expression::Variable(r) => write!(f, "@{}", r.name),
            Expression::OwnField(r) => write!(f, "{}", r.name),
            Expression::FieldAccess(a) => write!(f, "{}.{}", a.base, a.field),
            Expression::ArrayAccess(a) => write!(f, "{}[{}]", a.base, a.index),
            Expression::FunctionCall(c) => write!(f, "{}({})", c.name, c.arg),
            Expression::EnumLiteral(members) => {
                write!(f, "{{")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, "}}")
            }
            Expression::RangeLiteral(r) => write!(
                f,
                "{}[{} to {}]{}",
                if r.lower_inclusive { "" } else { "!" },
                r.lower,
                r.upper,
                if r.upper_inclusive { "" } else { "!" },
            ),
            // a space keeps `-` from folding into a numeric literal
            Expression::Negative(a) if matches!(**a, Expression::Number(_)) => write!(f, "(- {})", a),
            Expression::Negative(a) => write!(f, "(-{})", a),
            Expression::Not(a) => write!(f, "(not {})", a),
            Expression::Arithmetic(op, a, b) => write!(f, "({} {} {})", a, op.symbol(), b),
            Expression::Relational(op, a, b) => write!(f, "({} {} {})", a, op.symbol(), b),
            Expression::Logical(op, a, b) => write!(f, "({} {} {})", a, op.symbol(), b),
            Expression::Quantifier(q) => write!(
                f,
                "({} {} in {}: {})",
                q.kind.keyword(),
                q.bound_var,
                q.domain,
                q.body
            ),
        }
    }
}
