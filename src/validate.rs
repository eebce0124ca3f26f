//! Turns property drafts into validated [`Property`] values.
//!
//! Validation runs, in order: structural checks, alias uniqueness, per
//! predicate type checking, reference resolution in temporal order and the
//! optional self-reference rule. Every stage runs even when an earlier one
//! failed, so a single pass reports every problem in the draft.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use slog::{debug, o, Logger};

use crate::config::ValidatorConfig;
use crate::error::{collect_all, Diagnostics, HplError};
use crate::event::{Event, EventRole, SimpleEvent};
use crate::expr::Expression;
use crate::logging;
use crate::parser::raw::Recovered;
use crate::parser::HplParser;
use crate::property::{Pattern, Property, PropertyDraft, PropertyPatch, Scope, Specification};
use crate::resolver::{AliasTable, ReferenceResolver};
use crate::rewrite;
use crate::typechecker::TypeChecker;

/// Predicates keyed by the event slot they belong to
type Slots = HashMap<(EventRole, usize), Arc<Expression>>;

#[derive(Clone)]
pub struct Validator {
    config: ValidatorConfig,
    checker: TypeChecker,
    logger: Logger,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default(), logging::discard())
    }
}

impl Validator {
    pub fn new(config: ValidatorConfig, logger: Logger) -> Self {
        Self {
            checker: TypeChecker::new(config.max_depth),
            config,
            logger,
        }
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self::new(config, logging::discard())
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Parse and validate one property. Problems the parser could step over
    /// are reported together with everything validation finds.
    pub fn parse_property(&self, input: &str) -> Result<Property, Diagnostics> {
        let Recovered { value: draft, problems } = HplParser::recover_property(input)?;
        self.log_parse_problems(&problems);
        merged(problems, self.validate(draft))
    }

    pub fn parse_specification(&self, input: &str) -> Result<Specification, Diagnostics> {
        let Recovered { value: drafts, problems } = HplParser::recover_specification(input)?;
        self.log_parse_problems(&problems);
        merged(problems, self.validate_specification(drafts))
    }

    pub fn parse_predicate(&self, input: &str) -> Result<Expression, Diagnostics> {
        let Recovered { value: predicate, problems } = HplParser::recover_predicate(input)?;
        self.log_parse_problems(&problems);
        merged(problems, self.check_predicate(&predicate)).map(|()| predicate)
    }

    /// Type check a standalone predicate
    pub fn check_predicate(&self, predicate: &Expression) -> Result<(), Diagnostics> {
        self.checker.check_predicate(predicate).map_err(diagnostics)
    }

    fn log_parse_problems(&self, problems: &[HplError]) {
        if !problems.is_empty() {
            debug!(self.logger, "parsed with problems"; "stage" => "parse", "diagnostics" => problems.len());
        }
    }

    pub fn validate(&self, draft: PropertyDraft) -> Result<Property, Diagnostics> {
        let name = draft
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<anonymous>".to_string());
        let logger = self.logger.new(o!("property" => name));
        let mut errors = Vec::new();

        self.check_structure(&draft, &mut errors);
        debug!(logger, "checked structure"; "stage" => "structure", "diagnostics" => errors.len());

        self.check_aliases(&draft, &mut errors);
        debug!(logger, "checked aliases"; "stage" => "aliases", "diagnostics" => errors.len());

        let checkable = self.check_types(&draft, &logger, &mut errors);
        debug!(logger, "checked predicate types"; "stage" => "types", "diagnostics" => errors.len());

        let resolved = self.resolve(&draft, &checkable, &logger, &mut errors);
        debug!(logger, "resolved references"; "stage" => "resolve", "diagnostics" => errors.len());

        if self.config.require_self_reference {
            self.check_self_references(&draft, &mut errors);
            debug!(logger, "checked self references"; "stage" => "self_reference", "diagnostics" => errors.len());
        }

        if let Some(diagnostics) = Diagnostics::from_vec(errors) {
            debug!(logger, "rejected"; "diagnostics" => diagnostics.len());
            return Err(diagnostics);
        }

        let PropertyDraft {
            metadata,
            scope,
            pattern,
        } = draft;
        let scope = scope.map_events(|role, event| with_resolved(role, event, &resolved));
        let pattern = pattern.map_events(|role, event| with_resolved(role, event, &resolved));
        debug!(logger, "accepted"; "scope" => %scope, "pattern" => %pattern);
        Ok(Property::assemble(metadata, scope, pattern))
    }

    /// Validate the parts of an existing property again
    pub fn revalidate(&self, property: &Property) -> Result<Property, Diagnostics> {
        self.validate(property.to_draft())
    }

    /// Replace parts of `property`. Parts not named by the patch are shared
    /// with the original when nothing else changed.
    pub fn patch(&self, property: &Property, patch: PropertyPatch) -> Result<Property, Diagnostics> {
        match patch {
            PropertyPatch {
                metadata: None,
                scope: None,
                pattern: None,
            } => Ok(property.clone()),
            PropertyPatch {
                metadata: Some(metadata),
                scope: None,
                pattern: None,
            } => Ok(property.with_metadata(metadata)),
            PropertyPatch {
                metadata,
                scope,
                pattern,
            } => {
                let mut draft = property.to_draft();
                if let Some(metadata) = metadata {
                    draft.metadata = metadata;
                }
                if let Some(scope) = scope {
                    draft.scope = scope;
                }
                if let Some(pattern) = pattern {
                    draft.pattern = pattern;
                }
                self.validate(draft)
            }
        }
    }

    /// Equivalent properties in which every disjunction that can be split
    /// is replaced by one of its members: the activator of an `after` scope,
    /// the behaviour of a safety pattern and the trigger of a response.
    /// A property with nothing to split is returned as the only element.
    pub fn canonical_form(&self, property: &Property) -> Result<Vec<Property>, Diagnostics> {
        let scopes = rewrite::scope_variants(property.scope());
        let patterns = rewrite::pattern_variants(property.pattern());
        if scopes.len() == 1 && patterns.len() == 1 {
            return Ok(vec![property.clone()]);
        }
        debug!(self.logger, "splitting property"; "scopes" => scopes.len(), "patterns" => patterns.len());
        let patches = scopes.iter().flat_map(|scope| {
            patterns.iter().map(move |pattern| PropertyPatch {
                metadata: None,
                scope: Some(scope.clone()),
                pattern: Some(pattern.clone()),
            })
        });
        collect_all(patches.map(|patch| self.patch(property, patch).map_err(Diagnostics::into_vec)))
            .map_err(diagnostics)
    }

    /// Validate every draft, collecting the diagnostics of all of them
    pub fn validate_specification(
        &self,
        drafts: impl IntoIterator<Item = PropertyDraft>,
    ) -> Result<Specification, Diagnostics> {
        let validated = collect_all(
            drafts
                .into_iter()
                .map(|draft| self.validate(draft).map_err(Diagnostics::into_vec)),
        );
        match validated {
            Ok(properties) => {
                debug!(self.logger, "validated specification"; "properties" => properties.len());
                Ok(Specification::from_properties(properties))
            }
            Err(errors) => {
                debug!(self.logger, "rejected specification"; "diagnostics" => errors.len());
                Err(diagnostics(errors))
            }
        }
    }

    fn check_structure(&self, draft: &PropertyDraft, errors: &mut Vec<HplError>) {
        if let (Some(activator), Some(terminator)) = (draft.scope.activator(), draft.scope.terminator()) {
            if activator.channels() == terminator.channels() {
                errors.push(HplError::InvalidScopeTerminator {
                    channel: terminator.channels().into_iter().join(", "),
                });
            }
        }

        if let Some(types) = &self.config.message_types {
            let undeclared = draft
                .events()
                .into_iter()
                .flat_map(|(_, event)| event.channels())
                .filter(|channel| types.get(channel).is_none())
                .unique()
                .map(|channel| HplError::UnknownChannelType {
                    channel: channel.to_string(),
                });
            errors.extend(undeclared);
        }
    }

    fn check_aliases(&self, draft: &PropertyDraft, errors: &mut Vec<HplError>) {
        let mut table = AliasTable::new();
        for (role, event) in draft.events() {
            for member in event.members() {
                if let Some(alias) = member.alias() {
                    if let Err(e) = table.insert(alias.clone(), member.target(role)) {
                        errors.push(e);
                    }
                }
            }
        }
    }

    /// Type checks every predicate and returns the slots shallow enough to
    /// be resolved
    fn check_types(
        &self,
        draft: &PropertyDraft,
        logger: &Logger,
        errors: &mut Vec<HplError>,
    ) -> Vec<(EventRole, usize)> {
        let mut checkable = Vec::new();
        for (role, event) in draft.events() {
            for (i, member) in event.members().iter().enumerate() {
                let Some(predicate) = member.predicate() else {
                    continue;
                };
                if let Err(mut e) = self.checker.check_depth(predicate) {
                    debug!(logger, "predicate too deep"; "event" => %member.channel());
                    errors.append(&mut e);
                    continue;
                }
                if let Err(mut e) = self.checker.check_predicate(predicate) {
                    debug!(logger, "predicate rejected";
                        "event" => %member.channel(), "diagnostics" => e.len());
                    errors.append(&mut e);
                }
                checkable.push((role, i));
            }
        }
        checkable
    }

    fn resolve(
        &self,
        draft: &PropertyDraft,
        checkable: &[(EventRole, usize)],
        logger: &Logger,
        errors: &mut Vec<HplError>,
    ) -> Slots {
        let visibility = Visibility::of(&draft.scope, &draft.pattern);
        let message_types = self.config.message_types.as_deref();
        let mut resolved = Slots::new();

        for (role, event) in draft.events() {
            let visible = visibility.table(role);
            let resolver = ReferenceResolver::new(visible, &self.checker).with_message_types(message_types);
            for (i, member) in event.members().iter().enumerate() {
                let Some(predicate) = member.predicate() else {
                    continue;
                };
                if !checkable.contains(&(role, i)) {
                    continue;
                }
                match resolver.resolve(member, role, predicate) {
                    Ok(expr) => {
                        // refined reference types can expose new mismatches
                        if let Err(found) = self.checker.check_predicate(&expr) {
                            for e in found {
                                if !errors.contains(&e) {
                                    errors.push(e);
                                }
                            }
                        }
                        let shared = if expr == **predicate {
                            predicate.clone()
                        } else {
                            Arc::new(expr)
                        };
                        resolved.insert((role, i), shared);
                    }
                    Err(mut e) => {
                        debug!(logger, "unresolved references";
                            "event" => %member.channel(), "role" => %role, "diagnostics" => e.len());
                        errors.append(&mut e);
                    }
                }
            }
        }
        resolved
    }

    fn check_self_references(&self, draft: &PropertyDraft, errors: &mut Vec<HplError>) {
        for (_, event) in draft.events() {
            for member in event.members() {
                if let Some(predicate) = member.predicate() {
                    if !predicate.contains_self_reference() {
                        errors.push(HplError::MissingSelfReference {
                            channel: member.channel().to_string(),
                            predicate: predicate.to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Aliases each event slot may reference. The activator sees nothing, the
/// pattern events and the terminator see the activator, and the behaviour of
/// a binary pattern also sees the trigger.
struct Visibility {
    empty: AliasTable,
    scope: AliasTable,
    behaviour: AliasTable,
}

impl Visibility {
    fn of(scope: &Scope, pattern: &Pattern) -> Self {
        let empty = AliasTable::new();
        let after_activator = match scope.activator() {
            Some(activator) => empty.extended_with(EventRole::Activator, activator),
            None => AliasTable::new(),
        };
        let behaviour = match pattern.trigger() {
            Some(trigger) => after_activator.extended_with(EventRole::Trigger, trigger),
            None => after_activator.clone(),
        };
        Self {
            empty,
            scope: after_activator,
            behaviour,
        }
    }

    fn table(&self, role: EventRole) -> &AliasTable {
        match role {
            EventRole::Activator => &self.empty,
            EventRole::Trigger | EventRole::Terminator => &self.scope,
            EventRole::Behaviour => &self.behaviour,
        }
    }
}

fn diagnostics(errors: Vec<HplError>) -> Diagnostics {
    Diagnostics::from_vec(errors).unwrap_or_else(|| HplError::internal("rejected without diagnostics").into())
}

/// Parse problems come first, then whatever the later checks found
fn merged<T>(mut problems: Vec<HplError>, checked: Result<T, Diagnostics>) -> Result<T, Diagnostics> {
    match checked {
        Ok(value) if problems.is_empty() => Ok(value),
        Ok(_) => Err(diagnostics(problems)),
        Err(found) => {
            problems.extend(found);
            Err(diagnostics(problems))
        }
    }
}

fn with_resolved(role: EventRole, event: &Event, resolved: &Slots) -> Event {
    let mut index = 0;
    event.map_members(|member: &SimpleEvent| {
        let slot = (role, index);
        index += 1;
        match resolved.get(&slot) {
            Some(predicate) => member.with_predicate(predicate.clone()),
            None => member.clone(),
        }
    })
}
