// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for coordinator notifications.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry storing and dispatching callbacks

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::state::StateSnapshot;
use crate::value::PointValue;

/// Unique identifier for a subscription.
///
/// Returned when registering a callback and used to unsubscribe later. IDs
/// are unique within a coordinator's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Callback receiving each published snapshot.
type SnapshotCallback = Arc<dyn Fn(&StateSnapshot) + Send + Sync>;

/// Callback receiving each changed attribute.
type AttributeCallback = Arc<dyn Fn(&str, &PointValue) + Send + Sync>;

/// Callback receiving online/offline transitions.
type OnlineCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Registry of notification callbacks.
///
/// Thread-safe through `parking_lot::RwLock`. Dispatch works on a copy of
/// the registered callbacks, so a callback may unsubscribe itself.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    snapshot_callbacks: RwLock<HashMap<SubscriptionId, SnapshotCallback>>,
    attribute_callbacks: RwLock<HashMap<SubscriptionId, AttributeCallback>>,
    online_callbacks: RwLock<HashMap<SubscriptionId, OnlineCallback>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            snapshot_callbacks: RwLock::new(HashMap::new()),
            attribute_callbacks: RwLock::new(HashMap::new()),
            online_callbacks: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for every published snapshot.
    pub fn on_snapshot_updated<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.snapshot_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for attribute value changes.
    ///
    /// The callback receives the logical name and the new value.
    pub fn on_attribute_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &PointValue) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.attribute_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for online/offline transitions.
    pub fn on_online_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.online_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        if self.snapshot_callbacks.write().remove(&id).is_some() {
            return true;
        }
        if self.attribute_callbacks.write().remove(&id).is_some() {
            return true;
        }
        self.online_callbacks.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.snapshot_callbacks.write().clear();
        self.attribute_callbacks.write().clear();
        self.online_callbacks.write().clear();
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot_callbacks.read().len()
            + self.attribute_callbacks.read().len()
            + self.online_callbacks.read().len()
    }

    /// Returns true if no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Dispatch methods
    // =========================================================================

    /// Notifies about a new snapshot and its changed attributes.
    pub fn dispatch_snapshot(&self, snapshot: &StateSnapshot, changed: &[String]) {
        let attribute_callbacks: Vec<AttributeCallback> =
            self.attribute_callbacks.read().values().cloned().collect();
        if !attribute_callbacks.is_empty() {
            for name in changed {
                if let Some(value) = snapshot.value(name) {
                    for callback in &attribute_callbacks {
                        callback(name, value);
                    }
                }
            }
        }

        let snapshot_callbacks: Vec<SnapshotCallback> =
            self.snapshot_callbacks.read().values().cloned().collect();
        for callback in snapshot_callbacks {
            callback(snapshot);
        }
    }

    /// Notifies about an online/offline transition.
    pub fn dispatch_online(&self, online: bool) {
        let callbacks: Vec<OnlineCallback> =
            self.online_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(online);
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("snapshot_callbacks", &self.snapshot_callbacks.read().len())
            .field("attribute_callbacks", &self.attribute_callbacks.read().len())
            .field("online_callbacks", &self.online_callbacks.read().len())
            .finish()
    }
}
