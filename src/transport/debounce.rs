// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command debouncing for the local channel.
//!
//! Rapid writes to one attribute (a slider being dragged) are coalesced:
//! each new write cancels the previous one still waiting, so only the last
//! value reaches the device. A dispatch that has already started is left to
//! finish.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::TransportError;

#[derive(Debug)]
struct PendingDispatch {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct DebounceState {
    next_generation: u64,
    pending: HashMap<String, PendingDispatch>,
}

/// Delays writes and keeps at most one waiting per attribute.
#[derive(Debug, Clone)]
pub struct CommandDebouncer {
    delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl CommandDebouncer {
    /// Creates a debouncer with the given delay.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Returns the delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `dispatch` to run after the delay, replacing any dispatch
    /// still waiting for `attribute`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn schedule<F>(&self, attribute: &str, dispatch: F)
    where
        F: Future<Output = Result<(), TransportError>> + Send + 'static,
    {
        let mut state = self.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        let shared = Arc::clone(&self.state);
        let name = attribute.to_string();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = shared.lock();
                match state.pending.get(&name) {
                    Some(p) if p.generation == generation => {
                        state.pending.remove(&name);
                    }
                    _ => return,
                }
            }
            match dispatch.await {
                Ok(()) => tracing::debug!(attribute = %name, "Debounced command dispatched"),
                Err(e) => {
                    tracing::warn!(attribute = %name, error = %e, "Debounced command failed");
                }
            }
        });

        if let Some(previous) = state.pending.insert(
            attribute.to_string(),
            PendingDispatch { generation, handle },
        ) {
            tracing::debug!(attribute = %attribute, "Superseding pending command");
            previous.handle.abort();
        }
    }

    /// Returns true if a dispatch is waiting for `attribute`.
    #[must_use]
    pub fn is_pending(&self, attribute: &str) -> bool {
        self.state.lock().pending.contains_key(attribute)
    }

    /// Returns the number of waiting dispatches.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Drops every waiting dispatch.
    pub fn cancel_all(&self) {
        let mut state = self.state.lock();
        for (_, pending) in state.pending.drain() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Dispatch = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send>>;

    fn recorder() -> (Arc<Mutex<Vec<i64>>>, impl Fn(i64) -> Dispatch) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let make = move |value: i64| -> Dispatch {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().push(value);
                Ok(())
            })
        };
        (sent, make)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_writes_coalesce_to_last_value() {
        let debouncer = CommandDebouncer::new(Duration::from_secs(1));
        let (sent, make) = recorder();

        for value in [40, 41, 42, 43, 44] {
            debouncer.schedule("setpoint", make(value));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.is_pending("setpoint"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*sent.lock(), vec![44]);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn attributes_are_independent() {
        let debouncer = CommandDebouncer::new(Duration::from_secs(1));
        let (sent, make) = recorder();

        debouncer.schedule("setpoint", make(1));
        debouncer.schedule("mode", make(2));
        assert_eq!(debouncer.pending_count(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let mut values = sent.lock().clone();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_sent_before_the_delay() {
        let debouncer = CommandDebouncer::new(Duration::from_secs(1));
        let (sent, make) = recorder();

        debouncer.schedule("setpoint", make(7));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(sent.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(*sent.lock(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dispatch_clears_entry() {
        let debouncer = CommandDebouncer::new(Duration::from_secs(1));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        debouncer.schedule("mode", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Api("refused".to_string()))
        });
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending("mode"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_drops_waiting_dispatches() {
        let debouncer = CommandDebouncer::new(Duration::from_secs(1));
        let (sent, make) = recorder();

        debouncer.schedule("setpoint", make(1));
        debouncer.cancel_all();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(sent.lock().is_empty());
    }
}
