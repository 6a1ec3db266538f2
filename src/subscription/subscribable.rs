// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that publish state notifications.

use crate::state::StateSnapshot;
use crate::subscription::SubscriptionId;
use crate::value::PointValue;

/// Trait for types that support notification subscriptions.
///
/// Callbacks run synchronously on the task that published the change, so
/// they should return quickly.
///
/// # Examples
///
/// ```no_run
/// use tuyapump_lib::Coordinator;
/// use tuyapump_lib::config::CloudConfig;
/// use tuyapump_lib::subscription::Subscribable;
///
/// # async fn example() -> tuyapump_lib::Result<()> {
/// let coordinator = Coordinator::cloud(CloudConfig::new("id", "secret", "device"))
///     .build()
///     .await?;
///
/// let sub_id = coordinator.on_attribute_changed(|name, value| {
///     println!("{name} is now {value}");
/// });
///
/// coordinator.on_online_changed(|online| {
///     println!("device is {}", if online { "online" } else { "offline" });
/// });
///
/// coordinator.unsubscribe(sub_id);
/// # Ok(())
/// # }
/// ```
pub trait Subscribable {
    /// Subscribes to published snapshots.
    ///
    /// Called after every successful update, whether or not a value changed.
    fn on_snapshot_updated<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateSnapshot) + Send + Sync + 'static;

    /// Subscribes to attribute value changes.
    ///
    /// Called once per attribute whose value differs from the previous
    /// snapshot.
    fn on_attribute_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &PointValue) + Send + Sync + 'static;

    /// Subscribes to online/offline transitions.
    ///
    /// Called only when the inferred status flips, never for repeats.
    fn on_online_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static;

    /// Unsubscribes a callback by its subscription ID.
    ///
    /// Returns `true` if the subscription was found and removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
