// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-model translation between raw points and logical attributes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Transform;

/// What an attribute represents and whether it can be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Read-only measurement.
    #[serde(rename = "telemetry")]
    Telemetry,
    /// Read-only on/off indicator.
    #[serde(rename = "flag")]
    BooleanFlag,
    /// Writable on/off setting.
    #[serde(rename = "switch")]
    WritableBoolean,
    /// Writable numeric setting.
    #[serde(rename = "number")]
    WritableNumeric,
    /// Writable choice among fixed options.
    #[serde(rename = "select")]
    WritableEnum,
}

impl Category {
    /// Returns true if commands may target this category.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::WritableBoolean | Self::WritableNumeric | Self::WritableEnum
        )
    }

    /// Returns true if values of this category are booleans.
    #[must_use]
    pub fn is_boolean(self) -> bool {
        matches!(self, Self::BooleanFlag | Self::WritableBoolean)
    }
}

/// One choice of a [`Category::WritableEnum`] attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Raw value sent to the device.
    pub value: String,
    /// Human readable label.
    pub label: String,
}

/// Display metadata consumed by the host's entity layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    /// Human readable name.
    pub label: String,
    /// Display unit, e.g. `°C`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Icon identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Host device class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    /// Host state class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    /// Lower bound of a numeric setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound of a numeric setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Step of a numeric setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Ordered options of an enumeration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

/// How a model expects booleans in writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanEncoding {
    /// JSON `true` / `false`.
    #[default]
    Native,
    /// `1` / `0`.
    Integer,
    /// `"true"` / `"false"`.
    Text,
}

/// Which cloud endpoint a model accepts writes on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandApi {
    /// `POST /v1.0/devices/{id}/commands` with a list of codes.
    #[default]
    V1Commands,
    /// `POST /v2.0/cloud/thing/{id}/shadow/properties/issue` with a JSON blob.
    V2Properties,
}

/// Device-specific encoding workarounds, carried as data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelQuirks {
    /// Boolean encoding for writes.
    #[serde(default)]
    pub boolean_encoding: BooleanEncoding,
    /// Write endpoint.
    #[serde(default)]
    pub command_api: CommandApi,
}

/// Identifier of a raw point as reported by a transport.
///
/// The cloud API names points by code, the local socket by dp number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointId {
    /// Numeric data point.
    Dp(u32),
    /// Named cloud code.
    Code(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dp(dp) => write!(f, "{dp}"),
            Self::Code(code) => f.write_str(code),
        }
    }
}

/// One logical attribute of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEntry {
    /// Stable logical name.
    pub name: String,
    /// Cloud property code.
    pub code: String,
    /// Local data point number, if the attribute is exposed locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp_id: Option<u32>,
    /// Attribute category.
    pub category: Category,
    /// Raw to logical conversion.
    #[serde(default, skip_serializing_if = "Transform::is_identity")]
    pub forward: Transform,
    /// Logical to raw conversion; derived from `forward` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<Transform>,
    /// Display metadata.
    #[serde(default)]
    pub presentation: Presentation,
}

impl AttributeEntry {
    /// Creates an entry with identity transforms and no local dp.
    #[must_use]
    pub fn new(name: impl Into<String>, code: impl Into<String>, category: Category) -> Self {
        let name = name.into();
        Self {
            presentation: Presentation {
                label: name.clone(),
                ..Presentation::default()
            },
            name,
            code: code.into(),
            dp_id: None,
            category,
            forward: Transform::Identity,
            inverse: None,
        }
    }

    /// Sets the local data point number.
    #[must_use]
    pub fn with_dp(mut self, dp_id: u32) -> Self {
        self.dp_id = Some(dp_id);
        self
    }

    /// Sets the raw to logical transform.
    #[must_use]
    pub fn with_forward(mut self, forward: Transform) -> Self {
        self.forward = forward;
        self
    }

    /// Sets an explicit logical to raw transform.
    #[must_use]
    pub fn with_inverse(mut self, inverse: Transform) -> Self {
        self.inverse = Some(inverse);
        self
    }

    /// Returns true if this attribute accepts commands.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.category.is_writable()
    }
}

#[derive(Deserialize)]
struct AttributeMapFile {
    model_id: String,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    quirks: ModelQuirks,
    attributes: Vec<AttributeEntry>,
}

/// The attribute table of one device model, indexed three ways.
///
/// # Examples
///
/// ```
/// use tuyapump_lib::model::{AttributeEntry, AttributeMap, Category, PointId};
///
/// let map = AttributeMap::new(
///     "A",
///     vec![AttributeEntry::new("setpoint", "temp_set", Category::WritableNumeric).with_dp(4)],
/// );
/// assert_eq!(map.by_point(&PointId::Dp(4)).unwrap().name, "setpoint");
/// assert_eq!(map.by_point(&PointId::Code("temp_set".into())).unwrap().name, "setpoint");
/// ```
#[derive(Debug, Clone)]
pub struct AttributeMap {
    model_id: String,
    model_name: Option<String>,
    quirks: ModelQuirks,
    entries: Vec<AttributeEntry>,
    by_name: HashMap<String, usize>,
    by_code: HashMap<String, usize>,
    by_dp: HashMap<u32, usize>,
}

impl AttributeMap {
    /// Builds a map from entries. Later duplicates of a name, code or dp
    /// shadow earlier ones in the lookup indexes.
    #[must_use]
    pub fn new(model_id: impl Into<String>, entries: Vec<AttributeEntry>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_code = HashMap::with_capacity(entries.len());
        let mut by_dp = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            by_name.insert(entry.name.clone(), idx);
            by_code.insert(entry.code.clone(), idx);
            if let Some(dp) = entry.dp_id {
                by_dp.insert(dp, idx);
            }
        }
        Self {
            model_id: model_id.into(),
            model_name: None,
            quirks: ModelQuirks::default(),
            entries,
            by_name,
            by_code,
            by_dp,
        }
    }

    /// Parses a map from its JSON table.
    ///
    /// # Errors
    ///
    /// Returns the decoding error if the table is not valid.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: AttributeMapFile = serde_json::from_str(json)?;
        let mut map = Self::new(file.model_id, file.attributes);
        map.model_name = file.model_name;
        map.quirks = file.quirks;
        Ok(map)
    }

    /// Sets a human readable model name.
    #[must_use]
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Sets the model's quirk flags.
    #[must_use]
    pub fn with_quirks(mut self, quirks: ModelQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    /// Returns the model identifier.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns the model name, if the table carries one.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    /// Returns the quirk flags.
    #[must_use]
    pub fn quirks(&self) -> ModelQuirks {
        self.quirks
    }

    /// Looks up an attribute by logical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeEntry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    /// Looks up an attribute by cloud code.
    #[must_use]
    pub fn by_code(&self, code: &str) -> Option<&AttributeEntry> {
        self.by_code.get(code).map(|&idx| &self.entries[idx])
    }

    /// Looks up an attribute by local dp number.
    #[must_use]
    pub fn by_dp(&self, dp: u32) -> Option<&AttributeEntry> {
        self.by_dp.get(&dp).map(|&idx| &self.entries[idx])
    }

    /// Looks up an attribute by either kind of raw id.
    #[must_use]
    pub fn by_point(&self, id: &PointId) -> Option<&AttributeEntry> {
        match id {
            PointId::Dp(dp) => self.by_dp(*dp),
            PointId::Code(code) => self.by_code(code),
        }
    }

    /// Iterates over all entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeEntry> {
        self.entries.iter()
    }

    /// Iterates over the writable entries.
    pub fn writable(&self) -> impl Iterator<Item = &AttributeEntry> {
        self.entries.iter().filter(|e| e.is_writable())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "model_id": "test",
        "model_name": "Test Pump",
        "quirks": {"boolean_encoding": "integer"},
        "attributes": [
            {"name": "power", "code": "switch", "dp_id": 1, "category": "switch",
             "presentation": {"label": "Power"}},
            {"name": "inlet", "code": "in_temp", "dp_id": 106, "category": "telemetry",
             "forward": {"kind": "divide", "divisor": 10.0},
             "presentation": {"label": "Inlet", "unit": "°C"}},
            {"name": "energy", "code": "total_energy", "category": "telemetry"}
        ]
    }"#;

    #[test]
    fn parses_json_table() {
        let map = AttributeMap::from_json(TABLE).unwrap();
        assert_eq!(map.model_id(), "test");
        assert_eq!(map.model_name(), Some("Test Pump"));
        assert_eq!(map.len(), 3);
        assert_eq!(map.quirks().boolean_encoding, BooleanEncoding::Integer);
        assert_eq!(map.quirks().command_api, CommandApi::V1Commands);

        let inlet = map.get("inlet").unwrap();
        assert_eq!(inlet.forward, Transform::Divide { divisor: 10.0 });
        assert_eq!(inlet.presentation.unit.as_deref(), Some("°C"));
    }

    #[test]
    fn lookups_by_every_key() {
        let map = AttributeMap::from_json(TABLE).unwrap();
        assert_eq!(map.by_code("switch").unwrap().name, "power");
        assert_eq!(map.by_dp(106).unwrap().name, "inlet");
        assert!(map.by_dp(999).is_none());
        assert_eq!(map.by_point(&PointId::Code("total_energy".into())).unwrap().name, "energy");
    }

    #[test]
    fn entries_without_dp_are_cloud_only() {
        let map = AttributeMap::from_json(TABLE).unwrap();
        assert!(map.get("energy").unwrap().dp_id.is_none());
        assert_eq!(map.writable().count(), 1);
    }

    #[test]
    fn category_predicates() {
        assert!(Category::WritableEnum.is_writable());
        assert!(!Category::BooleanFlag.is_writable());
        assert!(Category::BooleanFlag.is_boolean());
        assert!(!Category::WritableNumeric.is_boolean());
    }

    #[test]
    fn rejects_unknown_category() {
        let bad = r#"{"model_id": "x", "attributes": [{"name": "a", "code": "a", "category": "dial"}]}"#;
        assert!(AttributeMap::from_json(bad).is_err());
    }

    #[test]
    fn point_id_display() {
        assert_eq!(PointId::Dp(4).to_string(), "4");
        assert_eq!(PointId::Code("mode".into()).to_string(), "mode");
    }
}
