//! Assigns a semantic type to every predicate node and reports every
//! mismatch found, instead of stopping at the first one.

use std::collections::HashMap;

use crate::error::HplError;
use crate::expr::{Expression, Name, RelationalOp};
use crate::functions::{self, FunctionSignature};
use crate::types::{DataType, TypeClass};

/// Type checker for predicate expressions
#[derive(Debug, Clone)]
pub struct TypeChecker {
    max_depth: usize,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self { max_depth: 256 }
    }
}

impl TypeChecker {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Type of `expr`, or every problem found in it
    pub fn infer(&self, expr: &Expression) -> Result<DataType, Vec<HplError>> {
        self.check_depth(expr)?;
        let mut cx = Context::default();
        let data_type = cx.infer(expr);
        cx.finish(data_type)
    }

    /// A predicate must be a well-typed boolean expression
    pub fn check_predicate(&self, predicate: &Expression) -> Result<(), Vec<HplError>> {
        self.check_depth(predicate)?;
        let mut cx = Context::default();
        cx.require(predicate, TypeClass::Bool);
        cx.finish(())
    }

    /// Element type of a quantifier domain, ignoring any problem in it
    pub(crate) fn element_type_of(&self, domain: &Expression) -> DataType {
        if self.check_depth(domain).is_err() {
            return DataType::Unknown;
        }
        let mut cx = Context::default();
        cx.infer(domain).element_type().unwrap_or(DataType::Unknown)
    }

    pub(crate) fn check_depth(&self, expr: &Expression) -> Result<(), Vec<HplError>> {
        let depth = expr.depth();
        if depth > self.max_depth {
            Err(vec![HplError::ExpressionTooDeep {
                depth,
                limit: self.max_depth,
            }])
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct Context {
    errors: Vec<HplError>,
    // innermost quantifier last
    bound: Vec<(Name, DataType)>,
    // type each reference path was first required to have
    uses: HashMap<String, DataType>,
}

impl Context {
    fn finish<T>(self, value: T) -> Result<T, Vec<HplError>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }

    fn mismatch(&mut self, expected: impl ToString, found: DataType, expr: &Expression) {
        self.errors.push(HplError::TypeMismatch {
            expected: expected.to_string(),
            found,
            expr: expr.to_string(),
        });
    }

    fn bound_type(&self, name: &str) -> Option<&DataType> {
        self.bound
            .iter()
            .rev()
            .find(|(n, _)| &**n == name)
            .map(|(_, t)| t)
    }

    /// Infer `expr` and report a mismatch unless it belongs to `class`
    fn require(&mut self, expr: &Expression, class: TypeClass) -> DataType {
        let found = self.infer(expr);
        if class.admits(&found) {
            if let Some(required) = class.representative() {
                self.record_use(expr, required);
            }
        } else {
            self.mismatch(class, found.clone(), expr);
        }
        found
    }

    /// References of unknown type pick up the type their context requires;
    /// two incompatible requirements on the same path are a mismatch.
    fn record_use(&mut self, expr: &Expression, required: DataType) {
        if !expr.is_reference() || required.is_permissive() || self.is_rooted_at_bound(expr) {
            return;
        }
        let key = expr.to_string();
        match self.uses.get(&key) {
            Some(previous) if !previous.is_compatible(&required) => {
                let previous = previous.clone();
                self.errors.push(HplError::TypeMismatch {
                    expected: previous.to_string(),
                    found: required,
                    expr: format!("{} (used as both)", key),
                });
            }
            Some(_) => {}
            None => {
                self.uses.insert(key, required);
            }
        }
    }

    fn is_rooted_at_bound(&self, expr: &Expression) -> bool {
        match expr {
            Expression::Variable(r) => self.bound_type(&r.name).is_some(),
            Expression::FieldAccess(a) => self.is_rooted_at_bound(&a.base),
            Expression::ArrayAccess(a) => self.is_rooted_at_bound(&a.base),
            _ => false,
        }
    }

    /// Base of a field or array access must be a reference of the right kind
    fn require_access_base(&mut self, base: &Expression, class: TypeClass, whole: &Expression) -> DataType {
        let found = self.infer(base);
        let reference_like = base.is_reference() || matches!(base, Expression::FunctionCall(_));
        if !reference_like {
            self.mismatch("reference", found.clone(), whole);
        } else if !class.admits(&found) {
            self.mismatch(class, found.clone(), base);
        }
        found
    }

    fn call(&mut self, signature: &FunctionSignature, arg: &Expression) -> DataType {
        let found = self.infer(arg);
        if signature.param.admits(&found) {
            if let Some(required) = signature.param.representative() {
                self.record_use(arg, required);
            }
        } else {
            self.errors.push(HplError::ArityOrTypeMismatch {
                function: signature.name.to_string(),
                expected: signature.param,
                found,
                expr: arg.to_string(),
            });
        }
        signature.result.clone()
    }

    fn infer(&mut self, expr: &Expression) -> DataType {
        match expr {
            Expression::Bool(_) => DataType::Bool,
            Expression::Number(_) | Expression::NumberConstant(_) => DataType::Number,
            Expression::String(_) => DataType::String,
            Expression::Variable(r) => match self.bound_type(&r.name) {
                Some(t) => t.clone(),
                None => r.data_type.clone(),
            },
            Expression::OwnField(r) => r.data_type.clone(),
            Expression::FieldAccess(a) => {
                self.require_access_base(&a.base, TypeClass::Message, expr);
                a.data_type.clone()
            }
            Expression::ArrayAccess(a) => {
                let base = self.require_access_base(&a.base, TypeClass::Collection, expr);
                self.require(&a.index, TypeClass::Number);
                if let Some(i) = a.index.static_number() {
                    if !(i.is_finite() && i >= 0.0 && i.fract() == 0.0) {
                        self.errors.push(HplError::InvalidIndex {
                            index: a.index.to_string(),
                            expr: expr.to_string(),
                        });
                    }
                }
                match (&a.data_type, base) {
                    (t, DataType::Collection(element)) if t.is_permissive() => *element,
                    (t, _) => t.clone(),
                }
            }
            Expression::FunctionCall(c) => match functions::lookup(&c.name) {
                Some(signature) => self.call(signature, &c.arg),
                None => {
                    self.errors.push(HplError::UnknownFunction {
                        name: c.name.to_string(),
                        suggestions: functions::suggest_functions(&c.name),
                    });
                    self.infer(&c.arg);
                    DataType::Unknown
                }
            },
            Expression::EnumLiteral(members) => {
                let mut common: Option<DataType> = None;
                for member in members {
                    let t = self.infer(member);
                    if !TypeClass::Primitive.admits(&t) {
                        self.mismatch(TypeClass::Primitive, t, member);
                        continue;
                    }
                    if t.is_permissive() {
                        continue;
                    }
                    match &common {
                        Some(c) if !c.is_compatible(&t) => {
                            let c = c.clone();
                            self.mismatch(c, t, member);
                        }
                        Some(_) => {}
                        None => common = Some(t),
                    }
                }
                DataType::collection(common.unwrap_or(DataType::Unknown))
            }
            Expression::RangeLiteral(r) => {
                let mut numeric = true;
                for bound in [&r.lower, &r.upper] {
                    let t = self.infer(bound);
                    if TypeClass::Number.admits(&t) {
                        self.record_use(bound, DataType::Number);
                    } else {
                        numeric = false;
                        self.errors.push(HplError::InvalidRangeBounds {
                            expr: expr.to_string(),
                            reason: format!("bound {} is a {}, not a number", bound, t),
                        });
                    }
                }
                if numeric {
                    if let (Some(lower), Some(upper)) =
                        (r.lower.static_number(), r.upper.static_number())
                    {
                        if lower > upper {
                            self.errors.push(HplError::InvalidRangeBounds {
                                expr: expr.to_string(),
                                reason: format!(
                                    "lower bound {} is greater than upper bound {}",
                                    lower, upper
                                ),
                            });
                        }
                    }
                }
                DataType::collection(DataType::Number)
            }
            Expression::Negative(a) => {
                self.require(a, TypeClass::Number);
                DataType::Number
            }
            Expression::Not(a) => {
                self.require(a, TypeClass::Bool);
                DataType::Bool
            }
            Expression::Arithmetic(_, a, b) => {
                self.require(a, TypeClass::Number);
                self.require(b, TypeClass::Number);
                DataType::Number
            }
            Expression::Relational(op, a, b) => {
                self.relational(*op, a, b, expr);
                DataType::Bool
            }
            Expression::Logical(_, a, b) => {
                self.require(a, TypeClass::Bool);
                self.require(b, TypeClass::Bool);
                DataType::Bool
            }
            Expression::Quantifier(q) => {
                if self.bound_type(&q.bound_var).is_some() {
                    self.errors.push(HplError::DuplicateBoundVariable {
                        name: q.bound_var.to_string(),
                        expr: expr.to_string(),
                    });
                }
                let domain = self.infer(&q.domain);
                let element = match domain.element_type() {
                    Some(element) => {
                        self.record_use(&q.domain, DataType::collection(DataType::Unknown));
                        element
                    }
                    None => {
                        self.mismatch(TypeClass::Collection, domain, &q.domain);
                        DataType::Unknown
                    }
                };
                self.bound.push((q.bound_var.clone(), element));
                self.require(&q.body, TypeClass::Bool);
                self.bound.pop();
                if !q.body.external_references().contains(&q.bound_var) {
                    self.errors.push(HplError::UnusedBoundVariable {
                        name: q.bound_var.to_string(),
                        expr: expr.to_string(),
                    });
                }
                DataType::Bool
            }
        }
    }

    fn relational(&mut self, op: RelationalOp, a: &Expression, b: &Expression, whole: &Expression) {
        match op {
            op if op.is_ordering() => {
                self.require(a, TypeClass::Number);
                self.require(b, TypeClass::Number);
            }
            RelationalOp::In => {
                let left = self.infer(a);
                let right = self.infer(b);
                match right.element_type() {
                    None => self.mismatch(TypeClass::Collection, right, b),
                    Some(element) if !element.is_compatible(&left) => {
                        self.mismatch(element, left, a)
                    }
                    Some(element) => {
                        self.record_use(b, DataType::collection(DataType::Unknown));
                        if !element.is_permissive() {
                            self.record_use(a, element);
                        }
                    }
                }
            }
            _ => {
                let left = self.infer(a);
                let right = self.infer(b);
                if !left.is_compatible(&right) {
                    self.mismatch(left, right, whole);
                } else {
                    if !right.is_permissive() {
                        self.record_use(a, right.clone());
                    }
                    if !left.is_permissive() {
                        self.record_use(b, left);
                    }
                }
            }
        }
    }
}
