// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud open API access.
//!
//! - [`Signer`] - `HMAC-SHA256` request signatures
//! - [`Session`] - Lazily acquired, reactively cleared access token
//! - [`CloudClient`] - Signed requests with a single transparent re-authentication

mod client;
mod session;
mod signer;

pub use client::{CloudClient, TOKEN_PATH};
pub use session::Session;
pub use signer::{SIGN_METHOD, Signer};

/// Device metadata endpoint.
pub const DEVICE_INFO_PATH: &str = "/v1.0/devices/{device_id}";
/// Device model description endpoint.
pub const DEVICE_MODEL_PATH: &str = "/v2.0/cloud/thing/{device_id}/model";
/// Shadow properties endpoint used for full reads.
pub const PROPERTIES_PATH: &str = "/v2.0/cloud/thing/{device_id}/shadow/properties";
/// Property write endpoint of the v2 API.
pub const PROPERTIES_ISSUE_PATH: &str = "/v2.0/cloud/thing/{device_id}/shadow/properties/issue";
/// Command endpoint of the v1 API.
pub const COMMANDS_PATH: &str = "/v1.0/devices/{device_id}/commands";
