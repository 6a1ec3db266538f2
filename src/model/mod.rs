// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device models and their attribute maps.
//!
//! An [`AttributeMap`] translates the raw point space of one heat-pump model
//! into stable logical attribute names. Maps are loaded from a
//! [`ModelCatalog`], which ships tables for the known models and falls back to
//! a default table for anything else.

mod attribute_map;
mod catalog;
mod resolver;

pub use attribute_map::{
    AttributeEntry, AttributeMap, BooleanEncoding, Category, CommandApi, ModelQuirks, PointId,
    Presentation, SelectOption,
};
pub use catalog::{DEFAULT_MODEL_ID, ModelCatalog};
pub use resolver::{
    DEFAULT_LOCAL_NAME, DEFAULT_MANUFACTURER, DEFAULT_NAME, DEFAULT_PRODUCT, DeviceInfo,
    ResolvedModel, resolve_cloud, resolve_local,
};
