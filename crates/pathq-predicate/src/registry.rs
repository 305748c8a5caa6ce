//! Named predicate registry.
//!
//! The registry is assembled once through [`RegistryBuilder`] and then shared
//! read-only (typically behind an `Arc`). Lookups of unknown names are
//! configuration errors, never a silent "no match".

use std::collections::HashMap;
use std::sync::Arc;

use pathq_models::{Polygon, Track};
use tracing::debug;

use crate::definition::{PredicateBody, PredicateDef, RegionDef};
use crate::error::{PredicateError, PredicateResult};
use crate::predicate::Predicate;

#[derive(Debug, Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Arc<Predicate>>,
}

impl PredicateRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a predicate by name.
    pub fn get(&self, name: &str) -> PredicateResult<Arc<Predicate>> {
        self.lookup(name).ok_or_else(|| PredicateError::unknown(name))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Predicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Evaluate the named predicate against one object's tracks.
    pub fn evaluate(&self, name: &str, tracks: &[Track]) -> PredicateResult<bool> {
        Ok(self.get(name)?.matches(tracks))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Reopen a built registry to add more definitions.
    pub fn into_builder(self) -> RegistryBuilder {
        RegistryBuilder {
            predicates: self.predicates,
        }
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    predicates: HashMap<String, Arc<Predicate>>,
}

impl RegistryBuilder {
    /// Register a primitive (or pre-assembled) predicate.
    pub fn primitive(
        &mut self,
        name: impl Into<String>,
        predicate: Predicate,
    ) -> PredicateResult<&mut Self> {
        let name = name.into();
        if self.predicates.contains_key(&name) {
            return Err(PredicateError::DuplicateName(name));
        }
        debug!(predicate = %name, "Registered predicate");
        self.predicates.insert(name, Arc::new(predicate));
        Ok(self)
    }

    /// Register `name` as the Or of already registered members.
    pub fn any_of(&mut self, name: impl Into<String>, members: &[&str]) -> PredicateResult<&mut Self> {
        let name = name.into();
        let resolved = members
            .iter()
            .map(|member| {
                self.predicates
                    .get(*member)
                    .cloned()
                    .ok_or_else(|| PredicateError::UnknownMember {
                        composite: name.clone(),
                        member: member.to_string(),
                    })
            })
            .collect::<PredicateResult<Vec<_>>>()?;
        self.primitive(name, Predicate::Or(resolved))
    }

    /// Register a predicate read from configuration.
    pub fn define(&mut self, def: &PredicateDef) -> PredicateResult<&mut Self> {
        match &def.body {
            PredicateBody::StartEnd { start, end } => self.primitive(
                def.name.clone(),
                Predicate::StartEnd {
                    start: start.to_polygon(),
                    end: end.to_polygon(),
                },
            ),
            PredicateBody::PointSet { regions: defs } => {
                self.primitive(def.name.clone(), Predicate::PointSet(regions(defs)))
            }
            PredicateBody::Waypoint { regions: defs } => {
                self.primitive(def.name.clone(), Predicate::Waypoint(regions(defs)))
            }
            PredicateBody::AnyOf { members } => {
                let members: Vec<&str> = members.iter().map(String::as_str).collect();
                self.any_of(def.name.clone(), &members)
            }
        }
    }

    pub fn build(&mut self) -> PredicateRegistry {
        PredicateRegistry {
            predicates: std::mem::take(&mut self.predicates),
        }
    }
}

fn regions(defs: &[RegionDef]) -> Vec<Polygon> {
    defs.iter().map(RegionDef::to_polygon).collect()
}
