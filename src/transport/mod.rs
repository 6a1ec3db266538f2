// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport drivers.
//!
//! A coordinator talks to its device through exactly one [`Transport`],
//! chosen at construction:
//!
//! - [`CloudTransport`] - Periodic reads of the cloud shadow properties
//! - [`LocalTransport`] - Pushes, keep-alives and full reads on the local socket
//!
//! [`CommandDebouncer`] coalesces rapid local writes.

mod cloud;
mod debounce;
mod local;

pub use cloud::CloudTransport;
pub use debounce::CommandDebouncer;
pub use local::{LocalDevice, LocalTransport, decode_dps};

use crate::error::Error;
use crate::model::PointId;
use crate::value::PointValue;

/// One raw data point as reported by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    /// Point identifier.
    pub id: PointId,
    /// Raw value.
    pub value: PointValue,
    /// Device timestamp in milliseconds, if reported.
    pub timestamp_ms: Option<i64>,
    /// Raw type tag, if reported.
    pub type_tag: Option<String>,
}

/// The transport a coordinator is bound to.
#[derive(Debug, Clone)]
pub enum Transport {
    /// Cloud REST polling.
    Cloud(CloudTransport),
    /// Local socket.
    Local(LocalTransport),
}

impl Transport {
    /// Returns a short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cloud(_) => "cloud",
            Self::Local(_) => "local",
        }
    }

    /// Reads the complete device state.
    ///
    /// # Errors
    ///
    /// Returns a transport or authorization error if the read fails.
    pub async fn fetch_all(&self) -> Result<Vec<RawPoint>, Error> {
        match self {
            Self::Cloud(cloud) => cloud.fetch_all().await,
            Self::Local(local) => Ok(local.fetch_all().await?),
        }
    }
}
