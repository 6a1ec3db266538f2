// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.
//!
//! - [`StateSnapshot`] - Immutable map of logical attribute values
//! - [`MergeStrategy`] - Whether an update replaces or extends the snapshot
//! - [`EchoCache`] - Short-lived memory of values sent to the device

mod echo;
mod snapshot;

pub use echo::EchoCache;
pub use snapshot::{AttributeState, MergeStrategy, StateSnapshot};
