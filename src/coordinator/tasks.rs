// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background loops.
//!
//! Loops hold a weak reference to the coordinator and only upgrade it for
//! the duration of one cycle, so dropping the last handle stops them.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{CoordinatorState, Inner};
use crate::transport::{LocalTransport, Transport};

/// Spawns the loops for the coordinator's transport.
pub(super) fn start(inner: &Arc<Inner>) {
    let weak = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();
    let settings = inner.settings.clone();

    let handles = match &inner.transport {
        Transport::Cloud(_) => {
            vec![tokio::spawn(poll_loop(weak, cancel, settings.poll_interval()))]
        }
        Transport::Local(local) => vec![
            tokio::spawn(listen_loop(
                weak.clone(),
                cancel.clone(),
                local.clone(),
                settings.listen_idle(),
                settings.loop_backoff(),
            )),
            tokio::spawn(heartbeat_loop(
                weak,
                cancel,
                local.clone(),
                settings.heartbeat_interval(),
                settings.loop_backoff(),
            )),
        ],
    };

    tracing::debug!(
        device_id = %inner.device_id(),
        transport = inner.transport.kind(),
        loops = handles.len(),
        "Background loops started"
    );
    inner.tasks.lock().extend(handles);
}

/// Schedules one full refresh after a successful cloud command.
pub(super) fn schedule_refresh(inner: &Arc<Inner>) {
    let Some(delay) = inner.settings.refresh_after_command() else {
        return;
    };
    let weak = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();

    let handle = tokio::spawn(async move {
        if !sleep_unless_cancelled(&cancel, delay).await {
            return;
        }
        if let Some(inner) = weak.upgrade() {
            if let Err(e) = inner.refresh().await {
                tracing::debug!(error = %e, "Refresh after command failed");
            }
        }
    });

    let mut tasks = inner.tasks.lock();
    tasks.retain(|task| !task.is_finished());
    tasks.push(handle);
}

// ============================================================================
// Loops
// ============================================================================

async fn poll_loop(weak: Weak<Inner>, cancel: CancellationToken, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = weak.upgrade() else { break };
        if let Err(e) = inner.refresh().await {
            tracing::debug!(error = %e, "Scheduled refresh failed");
        }
    }
    tracing::debug!("Poll loop stopped");
}

async fn listen_loop(
    weak: Weak<Inner>,
    cancel: CancellationToken,
    local: LocalTransport,
    idle: Duration,
    backoff: Duration,
) {
    loop {
        match weak.upgrade() {
            Some(inner) => inner.enter_listening(),
            None => break,
        };

        let started = Instant::now();
        let received = tokio::select! {
            () = cancel.cancelled() => break,
            received = local.receive() => received,
        };
        let Some(inner) = weak.upgrade() else { break };

        match received {
            Ok(points) if points.is_empty() => {
                drop(inner);
                // Some device libraries return at once when nothing is queued
                let remaining = idle.saturating_sub(started.elapsed());
                if !remaining.is_zero() && !sleep_unless_cancelled(&cancel, remaining).await {
                    break;
                }
            }
            Ok(points) => {
                tracing::trace!(points = points.len(), "Local push received");
                inner.apply_push(points);
                inner.set_state(CoordinatorState::Ready);
            }
            Err(e) => {
                tracing::warn!(device_id = %inner.device_id(), error = %e, "Local receive failed");
                inner.set_online(false);
                inner.set_state(CoordinatorState::Failed);
                drop(inner);

                if !sleep_unless_cancelled(&cancel, backoff).await {
                    break;
                }
                let Some(inner) = weak.upgrade() else { break };
                if let Err(e) = inner.refresh().await {
                    tracing::debug!(error = %e, "Recovery refresh failed");
                }
            }
        }
    }
    tracing::debug!("Listen loop stopped");
}

async fn heartbeat_loop(
    weak: Weak<Inner>,
    cancel: CancellationToken,
    local: LocalTransport,
    period: Duration,
    backoff: Duration,
) {
    let mut recovering = false;

    loop {
        if !sleep_unless_cancelled(&cancel, period).await {
            break;
        }
        if weak.strong_count() == 0 {
            break;
        }

        match local.heartbeat().await {
            Ok(()) if recovering => {
                let Some(inner) = weak.upgrade() else { break };
                tracing::debug!(device_id = %inner.device_id(), "Heartbeat answered again, reading state");
                match inner.refresh().await {
                    Ok(()) => recovering = false,
                    Err(e) => tracing::debug!(error = %e, "Recovery refresh failed"),
                }
            }
            Ok(()) => {}
            Err(e) => {
                let Some(inner) = weak.upgrade() else { break };
                tracing::warn!(device_id = %inner.device_id(), error = %e, "Heartbeat failed");
                inner.set_online(false);
                drop(inner);
                recovering = true;

                if !sleep_unless_cancelled(&cancel, backoff).await {
                    break;
                }
            }
        }
    }
    tracing::debug!("Heartbeat loop stopped");
}

/// Sleeps for `duration`. Returns false if cancelled first.
async fn sleep_unless_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
