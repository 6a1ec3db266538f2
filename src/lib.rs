// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `TuyaPump` Lib - Keep Tuya-based heat pumps in sync.
//!
//! This library provides an async coordinator that mirrors the state of a
//! heat pump reachable either through the Tuya cloud API or over the local
//! network, and relays commands back to it.
//!
//! # Features
//!
//! - **Cloud polling**: Signed requests, token caching with transparent
//!   re-authentication, online inference from property timestamps
//! - **Local channel**: Push updates, heartbeats and debounced writes over
//!   a pluggable [`transport::LocalDevice`]
//! - **Attribute maps**: Per-model tables translating raw data points into
//!   named, typed attributes, with a safe default
//! - **Echo suppression**: Values just written are not overwritten by stale
//!   device reports
//!
//! # Quick Start
//!
//! ## Cloud
//!
//! ```no_run
//! use tuyapump_lib::{Coordinator, Subscribable};
//! use tuyapump_lib::config::{CloudConfig, Region};
//!
//! #[tokio::main]
//! async fn main() -> tuyapump_lib::Result<()> {
//!     let config = CloudConfig::new("access-id", "access-secret", "bf1234567890abcdef")
//!         .with_region(Region::Eu);
//!     let coordinator = Coordinator::cloud(config).build().await?;
//!
//!     coordinator.on_attribute_changed(|name, value| {
//!         println!("{name} = {value}");
//!     });
//!
//!     coordinator.send_command("heat_temp_set", 45.0).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Local
//!
//! The local wire protocol is provided by a device library implementing
//! [`transport::LocalDevice`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tuyapump_lib::Coordinator;
//! use tuyapump_lib::config::LocalConfig;
//! use tuyapump_lib::transport::LocalDevice;
//!
//! # async fn example(device: Arc<dyn LocalDevice>) -> tuyapump_lib::Result<()> {
//! let config = LocalConfig::new("bf1234567890abcdef", "192.168.1.40", "local-key")
//!     .with_model_id("000004wtcv");
//! let coordinator = Coordinator::local(config, device).build().await?;
//!
//! let mut snapshots = coordinator.watch();
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow_and_update().clone();
//!     println!("{} attributes", snapshot.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cloud;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod state;
pub mod subscription;
pub mod transport;
pub mod value;

pub use config::{CloudConfig, ConnectionConfig, LocalConfig, Region, SyncSettings};
pub use coordinator::{Coordinator, CoordinatorBuilder, CoordinatorState};
pub use error::{
    AuthError, Error, LocalDeviceError, ModelResolutionError, Result, TransformError,
    TransportError,
};
pub use model::{AttributeEntry, AttributeMap, Category, DeviceInfo, ModelCatalog, PointId};
pub use state::{AttributeState, StateSnapshot};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use value::{PointValue, Transform};
