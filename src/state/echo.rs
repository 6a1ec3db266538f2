// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Echo suppression.
//!
//! After accepting a write, some devices keep reporting the previous value
//! for a few seconds. The cache remembers each value sent and, while the
//! entry is fresh, replaces contradicting reports with it.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::AttributeState;
use crate::value::PointValue;

#[derive(Debug, Clone)]
struct PendingEcho {
    value: PointValue,
    sent_at: Instant,
}

/// Values recently sent to the device, keyed by logical attribute.
#[derive(Debug)]
pub struct EchoCache {
    timeout: Duration,
    pending: HashMap<String, PendingEcho>,
}

impl EchoCache {
    /// Creates a cache whose entries expire after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: HashMap::new(),
        }
    }

    /// Remembers a value sent at `now`, replacing any earlier entry.
    pub fn record(&mut self, attribute: &str, value: PointValue, now: Instant) {
        self.pending.insert(
            attribute.to_string(),
            PendingEcho {
                value,
                sent_at: now,
            },
        );
    }

    /// Removes the entry for an attribute.
    pub fn forget(&mut self, attribute: &str) {
        self.pending.remove(attribute);
    }

    /// Returns the pending value of an attribute.
    #[must_use]
    pub fn pending(&self, attribute: &str) -> Option<&PointValue> {
        self.pending.get(attribute).map(|entry| &entry.value)
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Applies pending values to an incoming batch.
    ///
    /// Expired entries are pruned first. A report matching its pending value
    /// settles the entry; a contradicting one is overwritten. Returns the
    /// names whose reported value was overwritten.
    pub fn reconcile(
        &mut self,
        updates: &mut HashMap<String, AttributeState>,
        now: Instant,
    ) -> Vec<String> {
        let timeout = self.timeout;
        self.pending
            .retain(|_, entry| now.saturating_duration_since(entry.sent_at) <= timeout);

        let mut overridden = Vec::new();
        for (name, state) in updates.iter_mut() {
            let Some(entry) = self.pending.get(name) else {
                continue;
            };
            if state.value.same_as(&entry.value) {
                tracing::debug!(attribute = %name, "Device confirmed pending value");
                self.pending.remove(name);
            } else {
                tracing::debug!(
                    attribute = %name,
                    reported = %state.value,
                    pending = %entry.value,
                    "Suppressing stale device echo"
                );
                state.value = entry.value.clone();
                overridden.push(name.clone());
            }
        }
        overridden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointId;

    fn report(name: &str, value: impl Into<PointValue>) -> HashMap<String, AttributeState> {
        let mut updates = HashMap::new();
        updates.insert(
            name.to_string(),
            AttributeState::new(value.into(), PointId::Code(name.to_string())),
        );
        updates
    }

    #[test]
    fn contradicting_report_is_overridden() {
        let start = Instant::now();
        let mut cache = EchoCache::new(Duration::from_secs(8));
        cache.record("setpoint", PointValue::Float(22.0), start);

        let mut updates = report("setpoint", 20);
        let overridden = cache.reconcile(&mut updates, start + Duration::from_secs(1));

        assert_eq!(overridden, vec!["setpoint".to_string()]);
        assert_eq!(updates["setpoint"].value, PointValue::Float(22.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn matching_report_settles_entry() {
        let start = Instant::now();
        let mut cache = EchoCache::new(Duration::from_secs(8));
        cache.record("setpoint", PointValue::Float(22.0), start);

        let mut updates = report("setpoint", 22);
        assert!(cache.reconcile(&mut updates, start).is_empty());
        assert!(cache.is_empty());

        let mut updates = report("setpoint", 20);
        cache.reconcile(&mut updates, start);
        assert_eq!(updates["setpoint"].value, PointValue::Integer(20));
    }

    #[test]
    fn expired_entry_is_pruned() {
        let start = Instant::now();
        let mut cache = EchoCache::new(Duration::from_secs(8));
        cache.record("mode", PointValue::from("heat"), start);

        let mut updates = report("other", 1);
        cache.reconcile(&mut updates, start + Duration::from_secs(9));
        assert!(cache.is_empty());
    }

    #[test]
    fn report_after_expiry_is_kept() {
        let start = Instant::now();
        let mut cache = EchoCache::new(Duration::from_secs(8));
        cache.record("mode", PointValue::from("heat"), start);

        let mut updates = report("mode", "cool");
        let overridden = cache.reconcile(&mut updates, start + Duration::from_secs(9));
        assert!(overridden.is_empty());
        assert_eq!(updates["mode"].value, PointValue::from("cool"));
    }

    #[test]
    fn unrelated_attributes_are_untouched() {
        let start = Instant::now();
        let mut cache = EchoCache::new(Duration::from_secs(8));
        cache.record("mode", PointValue::from("heat"), start);

        let mut updates = report("power", true);
        cache.reconcile(&mut updates, start);
        assert_eq!(updates["power"].value, PointValue::Bool(true));
        assert_eq!(cache.pending("mode"), Some(&PointValue::from("heat")));
    }

    #[test]
    fn newer_record_replaces_older() {
        let start = Instant::now();
        let mut cache = EchoCache::new(Duration::from_secs(8));
        cache.record("setpoint", PointValue::Integer(40), start);
        cache.record("setpoint", PointValue::Integer(45), start);
        assert_eq!(cache.pending("setpoint"), Some(&PointValue::Integer(45)));
        cache.forget("setpoint");
        assert!(cache.is_empty());
    }
}
