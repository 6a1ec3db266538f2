// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local channel.
//!
//! The socket protocol itself (session keys, framing, encryption) belongs
//! to a device library behind the [`LocalDevice`] trait. Its calls block, so
//! every one of them runs on the blocking thread pool.

use std::sync::Arc;

use super::RawPoint;
use crate::error::{LocalDeviceError, TransportError};
use crate::model::PointId;
use crate::value::PointValue;

/// Blocking interface of a local device library.
///
/// Payloads use the device's native shape, an object with a `dps` map from
/// data point number (as a string) to value and an optional `t` timestamp in
/// seconds:
///
/// ```json
/// {"dps": {"1": true, "4": 220}, "t": 1700000000}
/// ```
pub trait LocalDevice: Send + Sync + 'static {
    /// Reads the full device state.
    ///
    /// # Errors
    ///
    /// Returns [`LocalDeviceError`] if the device cannot be read.
    fn status(&self) -> Result<serde_json::Value, LocalDeviceError>;

    /// Waits for the next pushed update.
    ///
    /// Returns `Ok(None)` when the read times out without a push.
    ///
    /// # Errors
    ///
    /// Returns [`LocalDeviceError`] if the connection fails.
    fn receive(&self) -> Result<Option<serde_json::Value>, LocalDeviceError>;

    /// Sends a keep-alive.
    ///
    /// # Errors
    ///
    /// Returns [`LocalDeviceError`] if the connection fails.
    fn heartbeat(&self) -> Result<(), LocalDeviceError>;

    /// Writes one data point.
    ///
    /// # Errors
    ///
    /// Returns [`LocalDeviceError::Refused`] if the device rejects the value.
    fn set_value(&self, dp: u32, value: serde_json::Value) -> Result<(), LocalDeviceError>;
}

/// Reads and writes device points over the local socket.
#[derive(Clone)]
pub struct LocalTransport {
    device: Arc<dyn LocalDevice>,
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport").finish_non_exhaustive()
    }
}

impl LocalTransport {
    /// Creates a transport over a device library handle.
    #[must_use]
    pub fn new(device: Arc<dyn LocalDevice>) -> Self {
        Self { device }
    }

    /// Reads the full device state.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the read fails or the payload reports one.
    pub async fn fetch_all(&self) -> Result<Vec<RawPoint>, TransportError> {
        let payload = self.blocking(|device| device.status()).await?;
        decode_dps(&payload)
    }

    /// Waits for the next push and decodes it.
    ///
    /// An empty result means the wait timed out.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection fails.
    pub async fn receive(&self) -> Result<Vec<RawPoint>, TransportError> {
        match self.blocking(|device| device.receive()).await? {
            Some(payload) => decode_dps(&payload),
            None => Ok(Vec::new()),
        }
    }

    /// Sends a keep-alive.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection fails.
    pub async fn heartbeat(&self) -> Result<(), TransportError> {
        self.blocking(|device| device.heartbeat()).await
    }

    /// Writes one raw value to a data point.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the write fails.
    pub async fn write(&self, dp: u32, raw: &PointValue) -> Result<(), TransportError> {
        let value = raw.to_json();
        tracing::debug!(dp, value = %value, "Sending local command");
        self.blocking(move |device| device.set_value(dp, value)).await
    }

    async fn blocking<T, F>(&self, call: F) -> Result<T, TransportError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn LocalDevice) -> Result<T, LocalDeviceError> + Send + 'static,
    {
        let device = Arc::clone(&self.device);
        tokio::task::spawn_blocking(move || call(device.as_ref()))
            .await
            .map_err(|e| TransportError::Worker(e.to_string()))?
            .map_err(TransportError::from)
    }
}

/// Decodes a `dps` payload into raw points.
///
/// Keys that are not data point numbers are skipped. A payload carrying an
/// `Error` field is reported as a failure.
///
/// # Errors
///
/// Returns [`TransportError::Local`] for error payloads.
pub fn decode_dps(payload: &serde_json::Value) -> Result<Vec<RawPoint>, TransportError> {
    if let Some(error) = payload.get("Error") {
        let message = error
            .as_str()
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(LocalDeviceError::Io(message).into());
    }

    let timestamp_ms = payload
        .get("t")
        .and_then(serde_json::Value::as_i64)
        .map(|secs| secs.saturating_mul(1000));

    let Some(dps) = payload.get("dps").and_then(serde_json::Value::as_object) else {
        return Ok(Vec::new());
    };

    let mut points = Vec::with_capacity(dps.len());
    for (key, value) in dps {
        let Ok(dp) = key.parse::<u32>() else {
            tracing::debug!(key = %key, "Skipping non-numeric data point key");
            continue;
        };
        points.push(RawPoint {
            id: PointId::Dp(dp),
            value: PointValue::from_json(value),
            timestamp_ms,
            type_tag: None,
        });
    }
    Ok(points)
}
