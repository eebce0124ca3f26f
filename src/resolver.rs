//! Ties `@alias` references to the events that introduced them and bare
//! fields to the event their predicate is attached to.

use std::sync::Arc;

use crate::error::{self, HplError};
use crate::event::{Event, EventRole, EventTarget, SimpleEvent};
use crate::expr::{ArrayAccess, Expression, FieldAccess, Name, Quantifier, Reference, Target};
use crate::typechecker::TypeChecker;
use crate::types::{DataType, FieldType, MessageType, MessageTypes};

/// Aliases visible to a predicate, in the order they were introduced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(Name, EventTarget)>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `DuplicateAlias` if `alias` is already taken
    pub fn insert(&mut self, alias: Name, target: EventTarget) -> Result<(), HplError> {
        if self.get(&alias).is_some() {
            return Err(HplError::DuplicateAlias {
                alias: alias.to_string(),
            });
        }
        self.entries.push((alias, target));
        Ok(())
    }

    /// Copy of this table plus every alias introduced by `event`. Repeated
    /// aliases keep their first definition.
    pub fn extended_with(&self, role: EventRole, event: &Event) -> Self {
        let mut table = self.clone();
        for member in event.members() {
            if let Some(alias) = member.alias() {
                let _ = table.insert(alias.clone(), member.target(role));
            }
        }
        table
    }

    pub fn get(&self, alias: &str) -> Option<&EventTarget> {
        self.entries
            .iter()
            .find(|(name, _)| &**name == alias)
            .map(|(_, target)| target)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| &**name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves the predicates of one event against the aliases visible to it
pub struct ReferenceResolver<'a> {
    visible: &'a AliasTable,
    checker: &'a TypeChecker,
    message_types: Option<&'a MessageTypes>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(visible: &'a AliasTable, checker: &'a TypeChecker) -> Self {
        Self {
            visible,
            checker,
            message_types: None,
        }
    }

    pub fn with_message_types(mut self, message_types: Option<&'a MessageTypes>) -> Self {
        self.message_types = message_types;
        self
    }

    /// Resolved copy of `predicate`, which is attached to `event`
    pub fn resolve(
        &self,
        event: &SimpleEvent,
        role: EventRole,
        predicate: &Expression,
    ) -> Result<Expression, Vec<HplError>> {
        let mut walk = Walk {
            resolver: self,
            current: event.target(role),
            own_type: self.message_type_of(event.channel()),
            bound: Vec::new(),
            errors: Vec::new(),
        };
        let (resolved, _) = walk.visit(predicate);
        if walk.errors.is_empty() {
            Ok(resolved)
        } else {
            Err(walk.errors)
        }
    }

    fn message_type_of(&self, channel: &str) -> Option<Arc<MessageType>> {
        self.message_types.and_then(|t| t.get(channel)).cloned()
    }
}

struct Walk<'r, 'a> {
    resolver: &'r ReferenceResolver<'a>,
    current: EventTarget,
    own_type: Option<Arc<MessageType>>,
    bound: Vec<(Name, DataType)>,
    errors: Vec<HplError>,
}

impl Walk<'_, '_> {
    fn field_of(
        &mut self,
        message: &MessageType,
        field: &Name,
        whole: &Expression,
    ) -> (DataType, Option<FieldType>) {
        match message.lookup(field) {
            Some(field_type) => (field_type.data_type(), Some(field_type.clone())),
            None => {
                self.errors.push(HplError::UnknownField {
                    message_type: message.name.to_string(),
                    field: field.to_string(),
                    expr: whole.to_string(),
                    suggestions: error::suggest(field, message.field_names()),
                });
                (DataType::Unknown, None)
            }
        }
    }

    /// Resolved node plus its static field type, when known
    fn visit(&mut self, expr: &Expression) -> (Expression, Option<FieldType>) {
        match expr {
            Expression::Variable(r) => {
                if let Some((_, element)) = self.bound.iter().rev().find(|(n, _)| *n == r.name) {
                    let resolved = Reference {
                        name: r.name.clone(),
                        target: Target::Bound,
                        data_type: element.clone(),
                    };
                    return (Expression::Variable(resolved), None);
                }
                if self.current.alias.as_ref() == Some(&r.name) {
                    self.errors.push(HplError::CircularReference {
                        alias: r.name.to_string(),
                        channel: self.current.channel.to_string(),
                    });
                    return (expr.clone(), None);
                }
                match self.resolver.visible.get(&r.name) {
                    Some(target) => {
                        let static_type = self
                            .resolver
                            .message_type_of(&target.channel)
                            .map(FieldType::Message);
                        let resolved = Reference {
                            name: r.name.clone(),
                            target: Target::Event(target.clone()),
                            data_type: DataType::Message,
                        };
                        (Expression::Variable(resolved), static_type)
                    }
                    None => {
                        self.errors.push(HplError::UnknownReference {
                            name: r.name.to_string(),
                            help: error::suggest(&r.name, self.resolver.visible.names()),
                        });
                        (expr.clone(), None)
                    }
                }
            }
            Expression::OwnField(r) => {
                let (data_type, static_type) = match self.own_type.clone() {
                    Some(message) => self.field_of(&message, &r.name, expr),
                    None => (DataType::Unknown, None),
                };
                let resolved = Reference {
                    name: r.name.clone(),
                    target: Target::Event(self.current.clone()),
                    data_type,
                };
                (Expression::OwnField(resolved), static_type)
            }
            Expression::FieldAccess(a) => {
                let (base, base_type) = self.visit(&a.base);
                let (data_type, static_type) = match base_type {
                    Some(FieldType::Message(message)) => self.field_of(&message, &a.field, expr),
                    _ => (DataType::Unknown, None),
                };
                let resolved = FieldAccess {
                    base: Arc::new(base),
                    field: a.field.clone(),
                    data_type,
                };
                (Expression::FieldAccess(resolved), static_type)
            }
            Expression::ArrayAccess(a) => {
                let (base, base_type) = self.visit(&a.base);
                let (index, _) = self.visit(&a.index);
                let (data_type, static_type) = match base_type {
                    Some(FieldType::Array { element, length }) => {
                        // indices that are not whole numbers are the type checker's to report
                        let whole = index
                            .static_number()
                            .filter(|i| i.is_finite() && *i >= 0.0 && i.fract() == 0.0);
                        if let (Some(length), Some(i)) = (length, whole) {
                            if i >= length as f64 {
                                self.errors.push(HplError::IndexOutOfRange {
                                    index: i as usize,
                                    length,
                                    expr: expr.to_string(),
                                });
                            }
                        }
                        (element.data_type(), Some(*element))
                    }
                    _ => (DataType::Unknown, None),
                };
                let resolved = ArrayAccess {
                    base: Arc::new(base),
                    index: Arc::new(index),
                    data_type,
                };
                (Expression::ArrayAccess(resolved), static_type)
            }
            Expression::Quantifier(q) => {
                let (domain, _) = self.visit(&q.domain);
                let element = self.resolver.checker.element_type_of(&domain);
                self.bound.push((q.bound_var.clone(), element));
                let (body, _) = self.visit(&q.body);
                self.bound.pop();
                let resolved = Quantifier {
                    kind: q.kind,
                    bound_var: q.bound_var.clone(),
                    domain: Arc::new(domain),
                    body: Arc::new(body),
                };
                (Expression::Quantifier(resolved), None)
            }
            other => (other.map_children(|c| Arc::new(self.visit(c).0)), None),
        }
    }
}
