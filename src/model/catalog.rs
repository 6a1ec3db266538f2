// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cache of attribute maps keyed by model identifier.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::AttributeMap;
use crate::error::ModelResolutionError;

/// Identifier under which the default map is published.
pub const DEFAULT_MODEL_ID: &str = "default";

/// Built-in table served as the default map.
const DEFAULT_TABLE_ID: &str = "000004wtcv";

/// Tables compiled into the library.
const BUILTIN_TABLES: &[(&str, &str)] = &[
    ("000003jtyb", include_str!("builtin/000003jtyb.json")),
    ("000003ynwv", include_str!("builtin/000003ynwv.json")),
    ("000004u5nz", include_str!("builtin/000004u5nz.json")),
    ("000004wtcv", include_str!("builtin/000004wtcv.json")),
    ("e1kcc5hw", include_str!("builtin/e1kcc5hw.json")),
    ("e1mnja6s", include_str!("builtin/e1mnja6s.json")),
    ("elrnos", include_str!("builtin/elrnos.json")),
    ("eu20ns", include_str!("builtin/eu20ns.json")),
];

/// Attribute maps loaded so far, plus any registered by the caller.
///
/// Maps never change once loaded, so entries never expire. Share one
/// catalog between coordinators with an `Arc` to load each table once.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tuyapump_lib::model::ModelCatalog;
///
/// let catalog = Arc::new(ModelCatalog::new());
/// let map = catalog.load("000003jtyb").unwrap();
/// assert!(map.get("temp_set").is_some());
///
/// // Unknown models fall back to the default table.
/// let (id, fallback) = catalog.load_or_default("no-such-model");
/// assert_eq!(id, "default");
/// assert!(!fallback.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct ModelCatalog {
    maps: RwLock<HashMap<String, Arc<AttributeMap>>>,
}

impl ModelCatalog {
    /// Creates a catalog backed by the built-in tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifiers of the built-in tables.
    pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
        BUILTIN_TABLES.iter().map(|(id, _)| *id)
    }

    /// Adds or replaces a map under its own model id.
    pub fn register(&self, map: AttributeMap) {
        let id = map.model_id().to_string();
        tracing::debug!(model_id = %id, "Registering attribute map");
        self.maps.write().insert(id, Arc::new(map));
    }

    /// Returns the map for `model_id`, loading a built-in table on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ModelResolutionError::UnknownModel`] if no table exists for
    /// the id, or [`ModelResolutionError::InvalidTable`] if it fails to decode.
    pub fn load(&self, model_id: &str) -> Result<Arc<AttributeMap>, ModelResolutionError> {
        if let Some(map) = self.maps.read().get(model_id) {
            return Ok(Arc::clone(map));
        }

        let table_id = if model_id == DEFAULT_MODEL_ID {
            DEFAULT_TABLE_ID
        } else {
            model_id
        };
        let json = BUILTIN_TABLES
            .iter()
            .find(|(id, _)| *id == table_id)
            .map(|(_, json)| *json)
            .ok_or_else(|| ModelResolutionError::UnknownModel(model_id.to_string()))?;

        let map = AttributeMap::from_json(json).map_err(|source| {
            ModelResolutionError::InvalidTable {
                model_id: table_id.to_string(),
                source,
            }
        })?;
        tracing::debug!(model_id = %model_id, attributes = map.len(), "Loaded attribute map");

        let map = Arc::new(map);
        let mut maps = self.maps.write();
        let entry = maps
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::clone(&map));
        Ok(Arc::clone(entry))
    }

    /// Returns the default map.
    ///
    /// Never fails; a broken default table degrades to an empty map.
    #[must_use]
    pub fn default_map(&self) -> Arc<AttributeMap> {
        match self.load(DEFAULT_MODEL_ID) {
            Ok(map) => map,
            Err(e) => {
                tracing::error!(error = %e, "Default attribute map unavailable");
                Arc::new(AttributeMap::new(DEFAULT_MODEL_ID, Vec::new()))
            }
        }
    }

    /// Returns the map for `model_id`, or the default map and id if there is
    /// none.
    #[must_use]
    pub fn load_or_default(&self, model_id: &str) -> (String, Arc<AttributeMap>) {
        match self.load(model_id) {
            Ok(map) => (model_id.to_string(), map),
            Err(e) => {
                tracing::warn!(model_id = %model_id, error = %e, "Falling back to default attribute map");
                (DEFAULT_MODEL_ID.to_string(), self.default_map())
            }
        }
    }

    /// Returns the number of cached maps.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.maps.read().len()
    }
}
