// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model resolution.
//!
//! Picks the attribute map for a device once per session. Resolution never
//! fails: every error path ends at the default map.

use std::sync::Arc;

use serde::Deserialize;

use super::{AttributeMap, DEFAULT_MODEL_ID, ModelCatalog};
use crate::cloud::{CloudClient, DEVICE_INFO_PATH, DEVICE_MODEL_PATH};
use crate::config::LocalConfig;
use crate::error::ModelResolutionError;

/// Device name used when the cloud does not provide one.
pub const DEFAULT_NAME: &str = "Tuya Heat Pump";
/// Device name used for local connections.
pub const DEFAULT_LOCAL_NAME: &str = "Tuya Heat Pump (Local)";
/// Manufacturer used when the cloud does not provide one.
pub const DEFAULT_MANUFACTURER: &str = "Tuya";
/// Product name used when the cloud does not provide one.
pub const DEFAULT_PRODUCT: &str = "Heat Pump";

/// Descriptive device metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device id.
    pub device_id: String,
    /// User-assigned name.
    pub name: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Product model name.
    pub model: String,
    /// Firmware version, if known.
    pub software_version: Option<String>,
}

impl DeviceInfo {
    /// Creates metadata filled with defaults.
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name: DEFAULT_NAME.to_string(),
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            model: DEFAULT_PRODUCT.to_string(),
            software_version: None,
        }
    }
}

/// Outcome of model resolution.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    /// Resolved model id, [`DEFAULT_MODEL_ID`] after a fallback.
    pub model_id: String,
    /// Attribute map for the model.
    pub map: Arc<AttributeMap>,
    /// Device metadata.
    pub info: DeviceInfo,
}

impl ResolvedModel {
    /// Returns true if resolution fell back to the default map.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.model_id == DEFAULT_MODEL_ID
    }
}

#[derive(Debug, Default, Deserialize)]
struct DeviceMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    manufacturer_name: Option<String>,
    #[serde(default)]
    software_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelDescription {
    #[serde(rename = "modelId")]
    model_id: Option<String>,
}

/// Resolves the model of a cloud-connected device.
///
/// Tries the model description endpoint first, then the `model` field of the
/// device metadata, then the default map.
pub async fn resolve_cloud(client: &CloudClient, catalog: &ModelCatalog) -> ResolvedModel {
    let device_id = client.device_id().to_string();

    let metadata = match client.get(&client.device_path(DEVICE_INFO_PATH)).await {
        Ok(result) => serde_json::from_value::<DeviceMetadata>(result).unwrap_or_else(|e| {
            tracing::warn!(device_id = %device_id, error = %e, "Unreadable device metadata");
            DeviceMetadata::default()
        }),
        Err(e) => {
            tracing::warn!(device_id = %device_id, error = %e, "Could not fetch device metadata");
            DeviceMetadata::default()
        }
    };

    let described = match fetch_model_id(client).await {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(device_id = %device_id, error = %e, "Model description unavailable");
            None
        }
    };

    let candidate = described.or_else(|| metadata.model.clone());
    let (model_id, map) = match candidate.as_deref() {
        Some(id) => catalog.load_or_default(id),
        None => (DEFAULT_MODEL_ID.to_string(), catalog.default_map()),
    };

    let mut info = DeviceInfo::new(device_id);
    if let Some(name) = metadata.name {
        info.name = name;
    }
    if let Some(manufacturer) = metadata.manufacturer_name {
        info.manufacturer = manufacturer;
    }
    if let Some(product) = metadata.product_name.or(metadata.model) {
        info.model = product;
    }
    info.software_version = metadata.software_version;

    tracing::info!(device_id = %info.device_id, model_id = %model_id, "Resolved device model");
    ResolvedModel {
        model_id,
        map,
        info,
    }
}

/// Resolves the model of a locally connected device.
///
/// Uses the configured model id if any, otherwise the default map.
#[must_use]
pub fn resolve_local(config: &LocalConfig, catalog: &ModelCatalog) -> ResolvedModel {
    let (model_id, map) = match config.model_id() {
        Some(id) => catalog.load_or_default(id),
        None => (DEFAULT_MODEL_ID.to_string(), catalog.default_map()),
    };

    let mut info = DeviceInfo::new(config.device_id());
    info.name = DEFAULT_LOCAL_NAME.to_string();
    info.model.clone_from(&model_id);

    tracing::info!(device_id = %info.device_id, model_id = %model_id, "Resolved device model");
    ResolvedModel {
        model_id,
        map,
        info,
    }
}

async fn fetch_model_id(client: &CloudClient) -> Result<String, ModelResolutionError> {
    let result = client
        .get(&client.device_path(DEVICE_MODEL_PATH))
        .await
        .map_err(|e| ModelResolutionError::Lookup(Box::new(e)))?;
    extract_model_id(&result)
}

/// Reads `modelId` from a model description.
///
/// The `model` field is itself a JSON document encoded as a string.
fn extract_model_id(result: &serde_json::Value) -> Result<String, ModelResolutionError> {
    let model = result
        .get("model")
        .ok_or(ModelResolutionError::MissingModelId)?;

    let description: ModelDescription = match model {
        serde_json::Value::String(text) => {
            serde_json::from_str(text).map_err(ModelResolutionError::MalformedDescription)?
        }
        other => serde_json::from_value(other.clone())
            .map_err(ModelResolutionError::MalformedDescription)?,
    };

    description
        .model_id
        .filter(|id| !id.is_empty())
        .ok_or(ModelResolutionError::MissingModelId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_id_from_encoded_string() {
        let result = json!({"model": "{\"modelId\":\"000004wtcv\",\"services\":[]}"});
        assert_eq!(extract_model_id(&result).unwrap(), "000004wtcv");
    }

    #[test]
    fn model_id_from_plain_object() {
        let result = json!({"model": {"modelId": "elrnos"}});
        assert_eq!(extract_model_id(&result).unwrap(), "elrnos");
    }

    #[test]
    fn model_id_missing() {
        assert!(matches!(
            extract_model_id(&json!({})),
            Err(ModelResolutionError::MissingModelId)
        ));
        assert!(matches!(
            extract_model_id(&json!({"model": "{\"services\":[]}"})),
            Err(ModelResolutionError::MissingModelId)
        ));
    }

    #[test]
    fn malformed_description() {
        assert!(matches!(
            extract_model_id(&json!({"model": "not json"})),
            Err(ModelResolutionError::MalformedDescription(_))
        ));
        assert!(matches!(
            extract_model_id(&json!({"model": {"modelId": 42}})),
            Err(ModelResolutionError::MalformedDescription(_))
        ));
    }

    #[test]
    fn local_with_pinned_model() {
        let catalog = ModelCatalog::new();
        let config = LocalConfig::new("dev", "10.0.0.2", "key").with_model_id("000003jtyb");
        let resolved = resolve_local(&config, &catalog);
        assert_eq!(resolved.model_id, "000003jtyb");
        assert!(!resolved.is_fallback());
        assert_eq!(resolved.info.name, DEFAULT_LOCAL_NAME);
    }

    #[test]
    fn local_without_model_uses_default() {
        let catalog = ModelCatalog::new();
        let config = LocalConfig::new("dev", "10.0.0.2", "key");
        let resolved = resolve_local(&config, &catalog);
        assert!(resolved.is_fallback());
        assert_eq!(resolved.map.model_id(), "000004wtcv");
    }

    #[test]
    fn local_with_unknown_model_falls_back() {
        let catalog = ModelCatalog::new();
        let config = LocalConfig::new("dev", "10.0.0.2", "key").with_model_id("mystery");
        assert!(resolve_local(&config, &catalog).is_fallback());
    }

    #[test]
    fn device_info_defaults() {
        let info = DeviceInfo::new("dev");
        assert_eq!(info.name, DEFAULT_NAME);
        assert_eq!(info.manufacturer, DEFAULT_MANUFACTURER);
        assert_eq!(info.model, DEFAULT_PRODUCT);
    }
}
