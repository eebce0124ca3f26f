//! Observable message events: a single channel, optionally named by an alias
//! and filtered by a predicate, or a disjunction of such events.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::{Diagnostics, HplError};
use crate::expr::{Expression, Name};
use crate::parser::is_keyword;

/// Position of an event within a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventRole {
    Activator,
    Trigger,
    Behaviour,
    Terminator,
}

impl Display for EventRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRole::Activator => write!(f, "activator"),
            EventRole::Trigger => write!(f, "trigger"),
            EventRole::Behaviour => write!(f, "behaviour"),
            EventRole::Terminator => write!(f, "terminator"),
        }
    }
}

/// The event a resolved reference points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventTarget {
    pub role: EventRole,
    pub channel: Name,
    pub alias: Option<Name>,
}

fn compiled(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex, HplError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| HplError::internal(format!("invalid built-in pattern: {}", e)))
}

pub fn is_valid_channel_name(name: &str) -> Result<bool, HplError> {
    static CHANNEL: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = compiled(
        &CHANNEL,
        r"^[/~]?[a-zA-Z][0-9a-zA-Z_]*(/[a-zA-Z][0-9a-zA-Z_]*)*$",
    )?;
    Ok(re.is_match(name) && !is_keyword(name))
}

pub fn is_valid_identifier(name: &str) -> Result<bool, HplError> {
    static IDENTIFIER: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = compiled(&IDENTIFIER, r"^[a-zA-Z_][a-zA-Z0-9_]*$")?;
    Ok(re.is_match(name) && !is_keyword(name))
}

/// A message on one channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleEvent {
    channel: Name,
    alias: Option<Name>,
    predicate: Option<Arc<Expression>>,
}

impl SimpleEvent {
    pub fn new(channel: impl Into<Name>) -> Result<Self, HplError> {
        let channel = channel.into();
        if !is_valid_channel_name(&channel)? {
            return Err(HplError::InvalidChannelName {
                name: channel.to_string(),
            });
        }
        Ok(Self {
            channel,
            alias: None,
            predicate: None,
        })
    }

    pub fn channel(&self) -> &Name {
        &self.channel
    }

    pub fn alias(&self) -> Option<&Name> {
        self.alias.as_ref()
    }

    pub fn predicate(&self) -> Option<&Arc<Expression>> {
        self.predicate.as_ref()
    }

    pub fn with_channel(&self, channel: impl Into<Name>) -> Result<Self, HplError> {
        let renamed = Self::new(channel)?;
        Ok(Self {
            channel: renamed.channel,
            ..self.clone()
        })
    }

    pub fn with_alias(&self, alias: impl Into<Name>) -> Result<Self, HplError> {
        let alias = alias.into();
        if !is_valid_identifier(&alias)? {
            return Err(HplError::InvalidIdentifier {
                name: alias.to_string(),
            });
        }
        Ok(Self {
            alias: Some(alias),
            ..self.clone()
        })
    }

    pub fn without_alias(&self) -> Self {
        Self {
            alias: None,
            ..self.clone()
        }
    }

    pub fn with_predicate(&self, predicate: impl Into<Arc<Expression>>) -> Self {
        Self {
            predicate: Some(predicate.into()),
            ..self.clone()
        }
    }

    pub fn without_predicate(&self) -> Self {
        Self {
            predicate: None,
            ..self.clone()
        }
    }

    pub fn target(&self, role: EventRole) -> EventTarget {
        EventTarget {
            role,
            channel: self.channel.clone(),
            alias: self.alias.clone(),
        }
    }
}

impl Display for SimpleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.channel)?;
        if let Some(alias) = &self.alias {
            write!(f, " as {}", alias)?;
        }
        if let Some(predicate) = &self.predicate {
            write!(f, " {{{}}}", predicate)?;
        }
        Ok(())
    }
}

/// Any one of several events on pairwise-distinct channels. Equality and
/// hashing ignore member order.
#[derive(Debug, Clone)]
pub struct Disjunction {
    members: Vec<SimpleEvent>,
}

impl Disjunction {
    pub fn members(&self) -> &[SimpleEvent] {
        &self.members
    }
}

impl PartialEq for Disjunction {
    fn eq(&self, other: &Self) -> bool {
        self.members.len() == other.members.len()
            && self.members.iter().all(|m| other.members.contains(m))
    }
}

impl Eq for Disjunction {}

impl Hash for Disjunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut sorted: Vec<&SimpleEvent> = self.members.iter().collect();
        sorted.sort_by(|a, b| a.channel.cmp(&b.channel));
        sorted.hash(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    Simple(SimpleEvent),
    Disjunction(Disjunction),
}

impl From<SimpleEvent> for Event {
    fn from(event: SimpleEvent) -> Self {
        Event::Simple(event)
    }
}

impl Event {
    /// Shorthand for a plain event on `channel`
    pub fn on(channel: impl Into<Name>) -> Result<Self, HplError> {
        SimpleEvent::new(channel).map(Event::Simple)
    }

    /// Builds a disjunction, flattening nested disjunctions. Reports every
    /// repeated channel name.
    pub fn disjunction(events: impl IntoIterator<Item = Event>) -> Result<Self, Diagnostics> {
        let (event, errors) = Self::disjunction_with_problems(events);
        match (event, Diagnostics::from_vec(errors)) {
            (Some(event), None) => Ok(event),
            (_, Some(diagnostics)) => Err(diagnostics),
            (None, None) => Err(HplError::DegenerateDisjunction { members: 0 }.into()),
        }
    }

    /// Like [`Event::disjunction`], but keeps the event alongside its
    /// problems so later checks can still run. A single member stands for
    /// itself and no members give no event.
    pub(crate) fn disjunction_with_problems(
        events: impl IntoIterator<Item = Event>,
    ) -> (Option<Self>, Vec<HplError>) {
        let mut members: Vec<SimpleEvent> = events
            .into_iter()
            .flat_map(|e| match e {
                Event::Simple(s) => vec![s],
                Event::Disjunction(d) => d.members,
            })
            .collect();

        let mut errors = Vec::new();
        if members.len() < 2 {
            errors.push(HplError::DegenerateDisjunction {
                members: members.len(),
            });
        }

        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for m in &members {
            *seen.entry(&*m.channel).or_default() += 1;
        }
        errors.extend(
            seen.into_iter()
                .filter(|(_, n)| *n > 1)
                .map(|(channel, _)| HplError::DuplicateChannelName {
                    channel: channel.to_string(),
                }),
        );

        let event = match members.len() {
            0 => None,
            1 => members.pop().map(Event::Simple),
            _ => Some(Event::Disjunction(Disjunction { members })),
        };
        (event, errors)
    }

    pub fn members(&self) -> &[SimpleEvent] {
        match self {
            Event::Simple(s) => std::slice::from_ref(s),
            Event::Disjunction(d) => &d.members,
        }
    }

    pub fn channels(&self) -> BTreeSet<&str> {
        self.members().iter().map(|m| &*m.channel).collect()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &Name> {
        self.members().iter().filter_map(|m| m.alias.as_ref())
    }

    pub fn has_predicate(&self) -> bool {
        self.members().iter().any(|m| m.predicate.is_some())
    }

    /// Same event with every member passed through `f`
    pub fn map_members(&self, mut f: impl FnMut(&SimpleEvent) -> SimpleEvent) -> Event {
        match self {
            Event::Simple(s) => Event::Simple(f(s)),
            Event::Disjunction(d) => Event::Disjunction(Disjunction {
                members: d.members.iter().map(f).collect(),
            }),
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Simple(s) => write!(f, "{}", s),
            Event::Disjunction(d) => {
                write!(f, "(")?;
                for (i, m) in d.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " or ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, ")")
            }
        }
    }
}
