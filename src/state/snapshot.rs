// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Immutable state snapshots.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::model::PointId;
use crate::value::PointValue;

/// Current value of one logical attribute and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeState {
    /// Logical value.
    pub value: PointValue,
    /// Raw point the value was decoded from.
    pub source: PointId,
    /// Device timestamp in milliseconds, when reported.
    pub timestamp_ms: Option<i64>,
    /// Raw type tag, when reported.
    pub type_tag: Option<String>,
}

impl AttributeState {
    /// Creates an entry without timestamp or type tag.
    #[must_use]
    pub fn new(value: PointValue, source: PointId) -> Self {
        Self {
            value,
            source,
            timestamp_ms: None,
            type_tag: None,
        }
    }

    /// Returns the device timestamp as a date, if reported.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.timestamp_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// How a batch of updates is combined with the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// The batch is the complete state; attributes missing from it are dropped.
    Replace,
    /// The batch is partial; attributes missing from it keep their value.
    Merge,
}

/// Logical attribute name to current state.
///
/// Snapshots are never mutated in place. Each update produces a new
/// snapshot that is published by reference, so readers always see a
/// complete state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    attributes: HashMap<String, AttributeState>,
}

impl StateSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state of an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeState> {
        self.attributes.get(name)
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&PointValue> {
        self.attributes.get(name).map(|state| &state.value)
    }

    /// Returns true if the attribute has a value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Returns the number of attributes with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if no attribute has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterates over attribute names and states, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeState)> {
        self.attributes.iter().map(|(name, state)| (name.as_str(), state))
    }

    /// Returns the newest device timestamp in the snapshot.
    #[must_use]
    pub fn newest_timestamp_ms(&self) -> Option<i64> {
        self.attributes.values().filter_map(|s| s.timestamp_ms).max()
    }

    /// Produces the next snapshot and the names whose value changed.
    #[must_use]
    pub fn apply(
        &self,
        updates: HashMap<String, AttributeState>,
        strategy: MergeStrategy,
    ) -> (Self, Vec<String>) {
        let mut changed: Vec<String> = updates
            .iter()
            .filter(|(name, state)| {
                self.value(name)
                    .is_none_or(|previous| !previous.same_as(&state.value))
            })
            .map(|(name, _)| name.clone())
            .collect();
        changed.sort();

        let attributes = match strategy {
            MergeStrategy::Replace => updates,
            MergeStrategy::Merge => {
                let mut attributes = self.attributes.clone();
                attributes.extend(updates);
                attributes
            }
        };

        (Self { attributes }, changed)
    }

    /// Produces the next snapshot without `name`.
    #[must_use]
    pub fn without(&self, name: &str) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.remove(name);
        Self { attributes }
    }
}

impl FromIterator<(String, AttributeState)> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, AttributeState)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}
