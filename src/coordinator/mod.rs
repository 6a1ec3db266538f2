// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device synchronization and command coordination.
//!
//! A [`Coordinator`] owns the state snapshot of one heat pump. It reads the
//! device through its transport, translates raw points into logical
//! attributes, smooths over stale echoes of recent writes, and notifies
//! subscribers of changes.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized -> Resolving -> Ready -> (Refreshing | Listening) -> Ready
//!                                              \-> Failed -> Ready
//! ```
//!
//! A failed cycle is not sticky; the next successful one returns to
//! `Ready`.

mod builder;
mod online;
mod tasks;

pub use builder::CoordinatorBuilder;
pub use online::cloud_online;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{CloudConfig, LocalConfig, SyncSettings};
use crate::error::{Error, Result};
use crate::model::{AttributeMap, DeviceInfo, PointId, ResolvedModel};
use crate::state::{AttributeState, EchoCache, MergeStrategy, StateSnapshot};
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};
use crate::transport::{CommandDebouncer, LocalDevice, RawPoint, Transport};
use crate::value::{self, PointValue};

use online::OnlineTracker;

/// Lifecycle state of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Not yet started.
    Uninitialized,
    /// Resolving the device model.
    Resolving,
    /// Idle and usable.
    Ready,
    /// A full read is in progress.
    Refreshing,
    /// Waiting for a local push.
    Listening,
    /// The last cycle failed.
    Failed,
}

/// Keeps one device's state in sync and relays commands to it.
///
/// Cloning is cheap and yields a handle to the same coordinator. Background
/// loops stop when [`Coordinator::shutdown`] is called or the last handle is
/// dropped.
///
/// # Examples
///
/// ```no_run
/// use tuyapump_lib::Coordinator;
/// use tuyapump_lib::config::{CloudConfig, Region};
///
/// # async fn example() -> tuyapump_lib::Result<()> {
/// let config = CloudConfig::new("access-id", "access-secret", "device-id")
///     .with_region(Region::Eu);
/// let coordinator = Coordinator::cloud(config).build().await?;
///
/// if let Some(temp) = coordinator.value("tank_temp") {
///     println!("tank: {temp} °C");
/// }
/// coordinator.send_command("heat_temp_set", 45.0).await?;
/// coordinator.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Store {
    snapshot: Arc<StateSnapshot>,
    echo: EchoCache,
}

pub(crate) struct Inner {
    resolved: ResolvedModel,
    transport: Transport,
    settings: SyncSettings,
    store: Mutex<Store>,
    snapshot_tx: watch::Sender<Arc<StateSnapshot>>,
    state_tx: watch::Sender<CoordinatorState>,
    online: OnlineTracker,
    last_update_success: AtomicBool,
    callbacks: CallbackRegistry,
    debouncer: CommandDebouncer,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Starts building a coordinator that polls the cloud API.
    #[must_use]
    pub fn cloud(config: CloudConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::cloud(config)
    }

    /// Starts building a coordinator on the local socket.
    ///
    /// `device` is the handle of the library speaking the device protocol.
    #[must_use]
    pub fn local(config: LocalConfig, device: Arc<dyn LocalDevice>) -> CoordinatorBuilder {
        CoordinatorBuilder::local(config, device)
    }

    /// Returns the device id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.inner.resolved.info.device_id
    }

    /// Returns the device metadata.
    #[must_use]
    pub fn device_info(&self) -> &DeviceInfo {
        &self.inner.resolved.info
    }

    /// Returns the resolved model id.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.inner.resolved.model_id
    }

    /// Returns the attribute map in use.
    #[must_use]
    pub fn attribute_map(&self) -> &Arc<AttributeMap> {
        &self.inner.resolved.map
    }

    /// Returns the timing settings.
    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    /// Returns the transport name, `cloud` or `local`.
    #[must_use]
    pub fn transport_kind(&self) -> &'static str {
        self.inner.transport.kind()
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        Arc::clone(&self.inner.store.lock().snapshot)
    }

    /// Returns the current value of an attribute.
    #[must_use]
    pub fn value(&self, attribute: &str) -> Option<PointValue> {
        self.inner.store.lock().snapshot.value(attribute).cloned()
    }

    /// Returns a receiver that observes every published snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<StateSnapshot>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        *self.inner.state_tx.borrow()
    }

    /// Returns a receiver that observes lifecycle state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state_tx.subscribe()
    }

    /// Returns the inferred online status.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.is_online()
    }

    /// Returns true if the last read succeeded.
    #[must_use]
    pub fn last_update_success(&self) -> bool {
        self.inner.last_update_success.load(Ordering::Acquire)
    }

    /// Returns true if the last read succeeded and the attribute has a value.
    #[must_use]
    pub fn is_available(&self, attribute: &str) -> bool {
        self.last_update_success() && self.inner.store.lock().snapshot.contains(attribute)
    }

    /// Returns true if a debounced write for the attribute has not been sent yet.
    #[must_use]
    pub fn is_command_pending(&self, attribute: &str) -> bool {
        self.inner.debouncer.is_pending(attribute)
    }

    /// Reads the complete device state and publishes it.
    ///
    /// Safe to call while a scheduled cycle is running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UpdateFailed`] if the read fails, or an
    /// authorization error if re-authentication did not help. The
    /// coordinator stays usable either way.
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await
    }

    /// Writes a logical value to the device.
    ///
    /// The value is visible in the snapshot immediately. In cloud mode the
    /// call returns once the API accepted the write and the previous value
    /// is restored if it did not. In local mode the write is debounced and
    /// the call returns at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttribute`] or [`Error::ReadOnlyAttribute`]
    /// for attributes that cannot be written, and
    /// [`Error::CommandRejected`] or a transport error if the cloud API
    /// refuses or cannot be reached.
    pub async fn send_command(&self, attribute: &str, value: impl Into<PointValue>) -> Result<()> {
        Arc::clone(&self.inner).send_command(attribute, value.into()).await
    }

    /// Stops the background loops and drops pending debounced writes.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.debouncer.cancel_all();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "Background task ended abnormally");
            }
        }
        tracing::debug!(device_id = %self.device_id(), "Coordinator shut down");
    }
}

impl Subscribable for Coordinator {
    fn on_snapshot_updated<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateSnapshot) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_snapshot_updated(callback)
    }

    fn on_attribute_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &PointValue) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_attribute_changed(callback)
    }

    fn on_online_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_online_changed(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(id)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("device_id", &self.device_id())
            .field("model_id", &self.model_id())
            .field("transport", &self.transport_kind())
            .field("state", &self.state())
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Inner
// ============================================================================

impl Inner {
    fn new(
        resolved: ResolvedModel,
        transport: Transport,
        settings: SyncSettings,
        state_tx: watch::Sender<CoordinatorState>,
    ) -> Self {
        let snapshot = Arc::new(StateSnapshot::new());
        let (snapshot_tx, _) = watch::channel(Arc::clone(&snapshot));
        Self {
            resolved,
            transport,
            store: Mutex::new(Store {
                snapshot,
                echo: EchoCache::new(settings.echo_timeout()),
            }),
            snapshot_tx,
            state_tx,
            online: OnlineTracker::default(),
            last_update_success: AtomicBool::new(false),
            callbacks: CallbackRegistry::new(),
            debouncer: CommandDebouncer::new(settings.debounce_delay()),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            settings,
        }
    }

    fn device_id(&self) -> &str {
        &self.resolved.info.device_id
    }

    fn set_state(&self, state: CoordinatorState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::trace!(device_id = %self.device_id(), ?previous, ?state, "Coordinator state changed");
        }
    }

    /// Moves from `Ready` to `Listening`; any other state is left alone.
    fn enter_listening(&self) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state == CoordinatorState::Ready {
                *state = CoordinatorState::Listening;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn set_online(&self, online: bool) {
        if self.online.observe(online) {
            if online {
                tracing::info!(device_id = %self.device_id(), "Device is online");
            } else {
                tracing::info!(device_id = %self.device_id(), "Device is offline");
            }
            self.callbacks.dispatch_online(online);
        }
    }

    fn online_tolerance(&self) -> std::time::Duration {
        self.settings.poll_interval() + self.settings.online_slack()
    }

    pub(crate) async fn refresh(&self) -> Result<()> {
        self.set_state(CoordinatorState::Refreshing);

        match self.transport.fetch_all().await {
            Ok(points) => {
                let fresh = cloud_online(
                    &points,
                    chrono::Utc::now().timestamp_millis(),
                    self.online_tolerance(),
                );
                let updates = self.decode(points);
                let online = match &self.transport {
                    Transport::Cloud(_) => fresh,
                    Transport::Local(_) => !updates.is_empty(),
                };

                if updates.is_empty() {
                    tracing::debug!(device_id = %self.device_id(), "Read returned no known points");
                } else {
                    self.publish(updates, MergeStrategy::Replace);
                }
                self.last_update_success.store(true, Ordering::Release);
                self.set_online(online);
                self.set_state(CoordinatorState::Ready);
                Ok(())
            }
            Err(e) => {
                let e = e.into_update_failure();
                tracing::warn!(device_id = %self.device_id(), error = %e, "Refresh failed");
                self.last_update_success.store(false, Ordering::Release);
                self.set_online(false);
                self.set_state(CoordinatorState::Failed);
                Err(e)
            }
        }
    }

    /// Applies a pushed partial update.
    pub(crate) fn apply_push(&self, points: Vec<RawPoint>) {
        let updates = self.decode(points);
        self.last_update_success.store(true, Ordering::Release);
        self.set_online(true);
        if !updates.is_empty() {
            self.publish(updates, MergeStrategy::Merge);
        }
    }

    /// Translates raw points into logical attribute states.
    fn decode(&self, points: Vec<RawPoint>) -> HashMap<String, AttributeState> {
        let map = &self.resolved.map;
        let mut updates = HashMap::with_capacity(points.len());
        for point in points {
            let Some(entry) = map.by_point(&point.id) else {
                tracing::debug!(point = %point.id, "Skipping point missing from attribute map");
                continue;
            };
            updates.insert(
                entry.name.clone(),
                AttributeState {
                    value: value::to_logical(entry, &point.value),
                    source: point.id,
                    timestamp_ms: point.timestamp_ms,
                    type_tag: point.type_tag,
                },
            );
        }
        updates
    }

    /// Reconciles with pending echoes, swaps the snapshot and notifies.
    fn publish(&self, mut updates: HashMap<String, AttributeState>, strategy: MergeStrategy) {
        let (snapshot, changed) = {
            let mut store = self.store.lock();
            store
                .echo
                .reconcile(&mut updates, tokio::time::Instant::now());
            let (next, changed) = store.snapshot.apply(updates, strategy);
            let next = Arc::new(next);
            store.snapshot = Arc::clone(&next);
            self.snapshot_tx.send_replace(Arc::clone(&next));
            (next, changed)
        };

        tracing::debug!(
            device_id = %self.device_id(),
            attributes = snapshot.len(),
            changed = changed.len(),
            "Published snapshot"
        );
        self.callbacks.dispatch_snapshot(&snapshot, &changed);
    }

    /// Records a sent value and shows it in the snapshot right away.
    ///
    /// Returns the state it replaced.
    fn apply_optimistic(
        &self,
        attribute: &str,
        value: PointValue,
        source: PointId,
    ) -> Option<AttributeState> {
        let (snapshot, changed, previous) = {
            let mut store = self.store.lock();
            store
                .echo
                .record(attribute, value.clone(), tokio::time::Instant::now());

            let previous = store.snapshot.get(attribute).cloned();
            let state = match &previous {
                Some(prev) => AttributeState {
                    value,
                    ..prev.clone()
                },
                None => AttributeState::new(value, source),
            };
            let mut updates = HashMap::with_capacity(1);
            updates.insert(attribute.to_string(), state);
            let (next, changed) = store.snapshot.apply(updates, MergeStrategy::Merge);
            let next = Arc::new(next);
            store.snapshot = Arc::clone(&next);
            self.snapshot_tx.send_replace(Arc::clone(&next));
            (next, changed, previous)
        };

        self.callbacks.dispatch_snapshot(&snapshot, &changed);
        previous
    }

    /// Undoes [`Inner::apply_optimistic`] after a refused write.
    fn rollback(&self, attribute: &str, previous: Option<AttributeState>) {
        let (snapshot, changed) = {
            let mut store = self.store.lock();
            store.echo.forget(attribute);

            let (next, changed) = match previous {
                Some(state) => {
                    let mut updates = HashMap::with_capacity(1);
                    updates.insert(attribute.to_string(), state);
                    store.snapshot.apply(updates, MergeStrategy::Merge)
                }
                None => (store.snapshot.without(attribute), Vec::new()),
            };
            let next = Arc::new(next);
            store.snapshot = Arc::clone(&next);
            self.snapshot_tx.send_replace(Arc::clone(&next));
            (next, changed)
        };

        self.callbacks.dispatch_snapshot(&snapshot, &changed);
    }

    async fn send_command(self: Arc<Self>, attribute: &str, value: PointValue) -> Result<()> {
        let map = Arc::clone(&self.resolved.map);
        let entry = map
            .get(attribute)
            .ok_or_else(|| Error::UnknownAttribute(attribute.to_string()))?;
        if !entry.is_writable() {
            return Err(Error::ReadOnlyAttribute(attribute.to_string()));
        }

        let logical = value::coerce(entry, &value);
        let raw = value::to_raw(entry, &logical, map.quirks());

        match &self.transport {
            Transport::Cloud(cloud) => {
                let previous =
                    self.apply_optimistic(attribute, logical, PointId::Code(entry.code.clone()));

                match cloud.write(entry, &raw, map.quirks()).await {
                    Ok(()) => {
                        tracing::info!(
                            device_id = %self.device_id(),
                            attribute = %attribute,
                            value = %raw,
                            "Cloud command sent"
                        );
                        tasks::schedule_refresh(&self);
                        Ok(())
                    }
                    Err(e) => {
                        tracing::debug!(attribute = %attribute, error = %e, "Cloud command failed");
                        self.rollback(attribute, previous);
                        Err(e)
                    }
                }
            }
            Transport::Local(local) => {
                let dp = entry
                    .dp_id
                    .ok_or_else(|| Error::UnknownAttribute(attribute.to_string()))?;
                self.apply_optimistic(attribute, logical, PointId::Dp(dp));

                let local = local.clone();
                self.debouncer
                    .schedule(attribute, async move { local.write(dp, &raw).await });
                tracing::debug!(attribute = %attribute, dp, "Local command scheduled");
                Ok(())
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.debouncer.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeEntry, Category, ModelCatalog, resolve_local};
    use crate::transport::LocalTransport;
    use crate::error::LocalDeviceError;

    struct Silent;

    impl LocalDevice for Silent {
        fn status(&self) -> std::result::Result<serde_json::Value, LocalDeviceError> {
            Ok(serde_json::json!({"dps": {"4": 20}}))
        }
        fn receive(&self) -> std::result::Result<Option<serde_json::Value>, LocalDeviceError> {
            Ok(None)
        }
        fn heartbeat(&self) -> std::result::Result<(), LocalDeviceError> {
            Ok(())
        }
        fn set_value(
            &self,
            _dp: u32,
            _value: serde_json::Value,
        ) -> std::result::Result<(), LocalDeviceError> {
            Ok(())
        }
    }

    fn inner() -> Inner {
        let catalog = ModelCatalog::new();
        catalog.register(AttributeMap::new(
            "A",
            vec![
                AttributeEntry::new("setpoint", "temp_set", Category::WritableNumeric).with_dp(4),
                AttributeEntry::new("inlet", "in_temp", Category::Telemetry).with_dp(106),
            ],
        ));
        let config = LocalConfig::new("dev", "10.0.0.2", "key").with_model_id("A");
        let resolved = resolve_local(&config, &catalog);
        let (state_tx, _) = watch::channel(CoordinatorState::Ready);
        Inner::new(
            resolved,
            Transport::Local(LocalTransport::new(Arc::new(Silent))),
            SyncSettings::default(),
            state_tx,
        )
    }

    fn dp(id: u32, value: i64) -> RawPoint {
        RawPoint {
            id: PointId::Dp(id),
            value: PointValue::Integer(value),
            timestamp_ms: None,
            type_tag: None,
        }
    }

    #[test]
    fn decode_skips_unknown_points() {
        let inner = inner();
        let updates = inner.decode(vec![dp(4, 22), dp(99, 1)]);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates["setpoint"].source, PointId::Dp(4));
    }

    #[test]
    fn listening_only_follows_ready() {
        let inner = inner();
        assert!(inner.enter_listening());
        assert_eq!(*inner.state_tx.borrow(), CoordinatorState::Listening);

        inner.set_state(CoordinatorState::Failed);
        assert!(!inner.enter_listening());
        assert_eq!(*inner.state_tx.borrow(), CoordinatorState::Failed);
    }

    #[tokio::test]
    async fn push_merges_partially() {
        let inner = inner();
        inner.apply_push(vec![dp(4, 22), dp(106, 31)]);
        inner.apply_push(vec![dp(106, 33)]);

        let snapshot = Arc::clone(&inner.store.lock().snapshot);
        assert_eq!(snapshot.value("setpoint"), Some(&PointValue::Integer(22)));
        assert_eq!(snapshot.value("inlet"), Some(&PointValue::Integer(33)));
        assert!(inner.online.is_online());
    }

    #[tokio::test]
    async fn rollback_restores_previous_value() {
        let inner = inner();
        inner.apply_push(vec![dp(4, 22)]);

        let previous = inner.apply_optimistic("setpoint", PointValue::Float(25.0), PointId::Dp(4));
        assert_eq!(
            inner.store.lock().snapshot.value("setpoint"),
            Some(&PointValue::Float(25.0))
        );

        inner.rollback("setpoint", previous);
        let store = inner.store.lock();
        assert_eq!(store.snapshot.value("setpoint"), Some(&PointValue::Integer(22)));
        assert!(store.echo.is_empty());
    }

    #[tokio::test]
    async fn rollback_of_new_attribute_removes_it() {
        let inner = inner();
        let previous = inner.apply_optimistic("setpoint", PointValue::Float(25.0), PointId::Dp(4));
        assert!(previous.is_none());
        inner.rollback("setpoint", previous);
        assert!(!inner.store.lock().snapshot.contains("setpoint"));
    }

    #[tokio::test]
    async fn refresh_replaces_and_reports_online() {
        let inner = inner();
        inner.refresh().await.unwrap();
        assert_eq!(
            inner.store.lock().snapshot.value("setpoint"),
            Some(&PointValue::Integer(20))
        );
        assert!(inner.online.is_online());
        assert_eq!(*inner.state_tx.borrow(), CoordinatorState::Ready);
    }
}
