//! Scopes, patterns and whole properties.
//!
//! A [`Property`] only exists in validated form. It is assembled as a
//! [`PropertyDraft`] and turned into a `Property` by a
//! [`Validator`](crate::validate::Validator), which either accepts every part
//! of it or reports every problem found.

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::error::{Diagnostics, HplError};
use crate::event::{Event, EventRole};
use crate::expr::{Name, Number};
use crate::validate::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
        }
    }
}

/// Deadline attached to a pattern. `5 s` and `5000 ms` are distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBound {
    amount: Number,
    unit: TimeUnit,
}

impl TimeBound {
    pub fn new(amount: f64, unit: TimeUnit) -> Result<Self, HplError> {
        if amount.is_nan() || amount <= 0.0 || amount.is_infinite() {
            return Err(HplError::InvalidTimeBound {
                amount: format!("{} {}", amount, unit.symbol()),
            });
        }
        Ok(Self {
            amount: Number::new(amount),
            unit,
        })
    }

    pub fn seconds(amount: f64) -> Result<Self, HplError> {
        Self::new(amount, TimeUnit::Seconds)
    }

    pub fn milliseconds(amount: f64) -> Result<Self, HplError> {
        Self::new(amount, TimeUnit::Milliseconds)
    }

    pub fn amount(&self) -> f64 {
        self.amount.value()
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn as_seconds(&self) -> f64 {
        match self.unit {
            TimeUnit::Seconds => self.amount(),
            TimeUnit::Milliseconds => self.amount() / 1000.0,
        }
    }
}

impl Display for TimeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "within {} {}", self.amount, self.unit.symbol())
    }
}

/// Temporal window over which a pattern must hold
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    AfterUntil {
        activator: Event,
        terminator: Option<Event>,
    },
    Until {
        terminator: Event,
    },
}

impl Scope {
    pub fn after(activator: Event) -> Self {
        Scope::AfterUntil {
            activator,
            terminator: None,
        }
    }

    pub fn after_until(activator: Event, terminator: Event) -> Self {
        Scope::AfterUntil {
            activator,
            terminator: Some(terminator),
        }
    }

    pub fn until(terminator: Event) -> Self {
        Scope::Until { terminator }
    }

    pub fn activator(&self) -> Option<&Event> {
        match self {
            Scope::AfterUntil { activator, .. } => Some(activator),
            _ => None,
        }
    }

    pub fn terminator(&self) -> Option<&Event> {
        match self {
            Scope::AfterUntil { terminator, .. } => terminator.as_ref(),
            Scope::Until { terminator } => Some(terminator),
            Scope::Global => None,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    pub(crate) fn map_events(&self, mut f: impl FnMut(EventRole, &Event) -> Event) -> Scope {
        match self {
            Scope::Global => Scope::Global,
            Scope::AfterUntil {
                activator,
                terminator,
            } => Scope::AfterUntil {
                activator: f(EventRole::Activator, activator),
                terminator: terminator.as_ref().map(|t| f(EventRole::Terminator, t)),
            },
            Scope::Until { terminator } => Scope::Until {
                terminator: f(EventRole::Terminator, terminator),
            },
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "globally"),
            Scope::AfterUntil {
                activator,
                terminator: None,
            } => write!(f, "after {}", activator),
            Scope::AfterUntil {
                activator,
                terminator: Some(terminator),
            } => write!(f, "after {} until {}", activator, terminator),
            Scope::Until { terminator } => write!(f, "until {}", terminator),
        }
    }
}

/// Behavioural shape required within a scope. In the binary patterns the
/// trigger is the left-hand event of `causes`, `forbids` or `requires`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    Existence {
        event: Event,
        bound: Option<TimeBound>,
    },
    Absence {
        event: Event,
        bound: Option<TimeBound>,
    },
    Response {
        trigger: Event,
        event: Event,
        bound: Option<TimeBound>,
    },
    Prevention {
        trigger: Event,
        event: Event,
        bound: Option<TimeBound>,
    },
    /// `trigger` may only occur if preceded by `event`
    Requirement {
        trigger: Event,
        event: Event,
        bound: Option<TimeBound>,
    },
}

impl Pattern {
    pub fn existence(event: Event, bound: Option<TimeBound>) -> Self {
        Pattern::Existence { event, bound }
    }
    pub fn absence(event: Event, bound: Option<TimeBound>) -> Self {
        Pattern::Absence { event, bound }
    }
    pub fn response(trigger: Event, event: Event, bound: Option<TimeBound>) -> Self {
        Pattern::Response {
            trigger,
            event,
            bound,
        }
    }
    pub fn prevention(trigger: Event, event: Event, bound: Option<TimeBound>) -> Self {
        Pattern::Prevention {
            trigger,
            event,
            bound,
        }
    }
    pub fn requirement(trigger: Event, event: Event, bound: Option<TimeBound>) -> Self {
        Pattern::Requirement {
            trigger,
            event,
            bound,
        }
    }

    /// The event the pattern constrains
    pub fn event(&self) -> &Event {
        match self {
            Pattern::Existence { event, .. }
            | Pattern::Absence { event, .. }
            | Pattern::Response { event, .. }
            | Pattern::Prevention { event, .. }
            | Pattern::Requirement { event, .. } => event,
        }
    }

    pub fn trigger(&self) -> Option<&Event> {
        match self {
            Pattern::Existence { .. } | Pattern::Absence { .. } => None,
            Pattern::Response { trigger, .. }
            | Pattern::Prevention { trigger, .. }
            | Pattern::Requirement { trigger, .. } => Some(trigger),
        }
    }

    pub fn bound(&self) -> Option<&TimeBound> {
        match self {
            Pattern::Existence { bound, .. }
            | Pattern::Absence { bound, .. }
            | Pattern::Response { bound, .. }
            | Pattern::Prevention { bound, .. }
            | Pattern::Requirement { bound, .. } => bound.as_ref(),
        }
    }

    /// Same pattern with a different time bound
    pub fn with_bound(&self, new_bound: Option<TimeBound>) -> Self {
        let mut pattern = self.clone();
        match &mut pattern {
            Pattern::Existence { bound, .. }
            | Pattern::Absence { bound, .. }
            | Pattern::Response { bound, .. }
            | Pattern::Prevention { bound, .. }
            | Pattern::Requirement { bound, .. } => *bound = new_bound,
        }
        pattern
    }

    pub fn is_existence(&self) -> bool {
        matches!(self, Pattern::Existence { .. })
    }

    pub fn is_absence(&self) -> bool {
        matches!(self, Pattern::Absence { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Pattern::Response { .. })
    }

    pub fn is_prevention(&self) -> bool {
        matches!(self, Pattern::Prevention { .. })
    }

    pub fn is_requirement(&self) -> bool {
        matches!(self, Pattern::Requirement { .. })
    }

    /// Violations are witnessed by a finite trace
    pub fn is_safety(&self) -> bool {
        matches!(
            self,
            Pattern::Absence { .. } | Pattern::Prevention { .. } | Pattern::Requirement { .. }
        )
    }

    pub fn is_liveness(&self) -> bool {
        matches!(self, Pattern::Existence { .. } | Pattern::Response { .. })
    }

    pub(crate) fn map_events(&self, mut f: impl FnMut(EventRole, &Event) -> Event) -> Pattern {
        let mut pattern = self.clone();
        match &mut pattern {
            Pattern::Existence { event, .. } | Pattern::Absence { event, .. } => {
                *event = f(EventRole::Behaviour, event);
            }
            Pattern::Response { trigger, event, .. }
            | Pattern::Prevention { trigger, event, .. }
            | Pattern::Requirement { trigger, event, .. } => {
                *trigger = f(EventRole::Trigger, trigger);
                *event = f(EventRole::Behaviour, event);
            }
        }
        pattern
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Existence { event, .. } => write!(f, "some {}", event)?,
            Pattern::Absence { event, .. } => write!(f, "no {}", event)?,
            Pattern::Response { trigger, event, .. } => write!(f, "{} causes {}", trigger, event)?,
            Pattern::Prevention { trigger, event, .. } => {
                write!(f, "{} forbids {}", trigger, event)?
            }
            Pattern::Requirement { trigger, event, .. } => {
                write!(f, "{} requires {}", trigger, event)?
            }
        }
        if let Some(bound) = self.bound() {
            write!(f, " {}", bound)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Metadata {
    pub id: Option<Name>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.title.is_none() && self.description.is_none()
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n").replace('\t', "\\t"))
}

impl Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.id {
            writeln!(f, "# id: {}", id)?;
        }
        if let Some(title) = &self.title {
            write!(f, "# title: ")?;
            write_quoted(f, title)?;
            writeln!(f)?;
        }
        if let Some(description) = &self.description {
            write!(f, "# description: ")?;
            write_quoted(f, description)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The parts of a property before validation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyDraft {
    pub metadata: Option<Metadata>,
    pub scope: Scope,
    pub pattern: Pattern,
}

impl PropertyDraft {
    pub fn new(scope: Scope, pattern: Pattern) -> Self {
        Self {
            metadata: None,
            scope,
            pattern,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Events in temporal order
    pub fn events(&self) -> Vec<(EventRole, &Event)> {
        let mut events = Vec::with_capacity(4);
        if let Some(activator) = self.scope.activator() {
            events.push((EventRole::Activator, activator));
        }
        if let Some(trigger) = self.pattern.trigger() {
            events.push((EventRole::Trigger, trigger));
        }
        events.push((EventRole::Behaviour, self.pattern.event()));
        if let Some(terminator) = self.scope.terminator() {
            events.push((EventRole::Terminator, terminator));
        }
        events
    }

    pub fn id(&self) -> Option<&Name> {
        self.metadata.as_ref().and_then(|m| m.id.as_ref())
    }
}

impl Display for PropertyDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(metadata) = &self.metadata {
            write!(f, "{}", metadata)?;
        }
        write!(f, "{}: {}", self.scope, self.pattern)
    }
}

/// Fields to replace when deriving a new property from an existing one
#[derive(Debug, Clone, Default)]
pub struct PropertyPatch {
    pub metadata: Option<Option<Metadata>>,
    pub scope: Option<Scope>,
    pub pattern: Option<Pattern>,
}

impl PropertyPatch {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.scope.is_none() && self.pattern.is_none()
    }
}

/// A validated property: scope, pattern and optional metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    metadata: Option<Arc<Metadata>>,
    scope: Arc<Scope>,
    pattern: Arc<Pattern>,
}

impl Property {
    /// Validate with the default [`Validator`]
    pub fn new(draft: PropertyDraft) -> Result<Self, Diagnostics> {
        Validator::default().validate(draft)
    }

    pub(crate) fn assemble(metadata: Option<Metadata>, scope: Scope, pattern: Pattern) -> Self {
        Self {
            metadata: metadata.map(Arc::new),
            scope: Arc::new(scope),
            pattern: Arc::new(pattern),
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_deref()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn id(&self) -> Option<&Name> {
        self.metadata().and_then(|m| m.id.as_ref())
    }

    pub fn is_safety(&self) -> bool {
        self.pattern.is_safety()
    }

    pub fn is_liveness(&self) -> bool {
        self.pattern.is_liveness()
    }

    /// Events in temporal order
    pub fn events(&self) -> Vec<(EventRole, &Event)> {
        let mut events = Vec::with_capacity(4);
        if let Some(activator) = self.scope.activator() {
            events.push((EventRole::Activator, activator));
        }
        if let Some(trigger) = self.pattern.trigger() {
            events.push((EventRole::Trigger, trigger));
        }
        events.push((EventRole::Behaviour, self.pattern.event()));
        if let Some(terminator) = self.scope.terminator() {
            events.push((EventRole::Terminator, terminator));
        }
        events
    }

    /// Every alias introduced by the property
    pub fn aliases(&self) -> Vec<&Name> {
        self.events()
            .into_iter()
            .flat_map(|(_, event)| event.aliases())
            .collect()
    }

    /// Unvalidated copy of the parts of this property
    pub fn to_draft(&self) -> PropertyDraft {
        PropertyDraft {
            metadata: self.metadata().cloned(),
            scope: (*self.scope).clone(),
            pattern: (*self.pattern).clone(),
        }
    }

    /// New property with the patched fields replaced, validated with the
    /// default [`Validator`]. An empty patch returns an equal property
    /// sharing every part with `self`.
    pub fn but(&self, patch: PropertyPatch) -> Result<Self, Diagnostics> {
        Validator::default().patch(self, patch)
    }

    /// Split into simpler equivalent properties with the default
    /// [`Validator`]. See [`Validator::canonical_form`].
    pub fn canonical_form(&self) -> Result<Vec<Self>, Diagnostics> {
        Validator::default().canonical_form(self)
    }

    /// Replace only the metadata, which never affects validity
    pub fn with_metadata(&self, metadata: Option<Metadata>) -> Self {
        Self {
            metadata: metadata.map(Arc::new),
            ..self.clone()
        }
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(metadata) = &self.metadata {
            write!(f, "{}", metadata)?;
        }
        write!(f, "{}: {}", self.scope, self.pattern)
    }
}

/// Ordered list of validated properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Specification {
    properties: Vec<Property>,
}

impl Specification {
    pub(crate) fn from_properties(properties: Vec<Property>) -> Self {
        Self { properties }
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.id().map(|i| &**i) == Some(id))
    }
}

impl Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, property) in self.properties.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", property)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_bounds() {
        assert!(matches!(
            TimeBound::seconds(0.0),
            Err(HplError::InvalidTimeBound { .. })
        ));
        assert!(TimeBound::seconds(-1.0).is_err());
        assert!(TimeBound::seconds(f64::NAN).is_err());

        let five = TimeBound::seconds(5.0).unwrap();
        let short = TimeBound::milliseconds(200.0).unwrap();
        assert_ne!(five, short);
        assert_ne!(five, TimeBound::milliseconds(5000.0).unwrap());
        assert_eq!(short.as_seconds(), 0.2);
        assert_eq!(five.to_string(), "within 5 s");
    }

    #[test]
    fn test_scope_accessors() {
        let a = Event::on("/a").unwrap();
        let b = Event::on("/b").unwrap();
        let scope = Scope::after_until(a.clone(), b.clone());
        assert_eq!(scope.activator(), Some(&a));
        assert_eq!(scope.terminator(), Some(&b));
        assert_eq!(scope.to_string(), "after /a until /b");
        assert_eq!(Scope::until(b.clone()).activator(), None);
        assert_eq!(Scope::Global.terminator(), None);
    }

    #[test]
    fn test_pattern_classification() {
        let a = Event::on("/a").unwrap();
        let b = Event::on("/b").unwrap();
        let bound = TimeBound::milliseconds(100.0).ok();
        let requirement = Pattern::requirement(a.clone(), b.clone(), bound);
        assert!(requirement.is_safety());
        assert_eq!(requirement.to_string(), "/a requires /b within 100 ms");
        assert!(Pattern::response(a.clone(), b.clone(), None).is_liveness());
        assert!(Pattern::existence(a.clone(), None).is_liveness());
        assert!(Pattern::absence(a, None).is_safety());
        assert_eq!(requirement.with_bound(None).bound(), None);
    }

    #[test]
    fn test_metadata_display() {
        let m = Metadata {
            id: Some("p1".into()),
            title: Some("say \"hi\"".to_string()),
            description: None,
        };
        assert_eq!(m.to_string(), "# id: p1\n# title: \"say \\\"hi\\\"\"\n");
    }
}
