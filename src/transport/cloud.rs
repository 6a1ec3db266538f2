// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud poller.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use super::RawPoint;
use crate::cloud::{COMMANDS_PATH, CloudClient, PROPERTIES_ISSUE_PATH, PROPERTIES_PATH};
use crate::error::{Error, TransportError};
use crate::model::{AttributeEntry, CommandApi, ModelQuirks, PointId};
use crate::value::PointValue;

#[derive(Debug, Deserialize)]
struct ShadowProperties {
    #[serde(default)]
    properties: Vec<ShadowProperty>,
}

#[derive(Debug, Deserialize)]
struct ShadowProperty {
    code: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default, rename = "type")]
    type_tag: Option<String>,
}

/// Reads and writes device points through the cloud API.
#[derive(Debug, Clone)]
pub struct CloudTransport {
    client: Arc<CloudClient>,
}

impl CloudTransport {
    /// Creates a transport over a signed client.
    #[must_use]
    pub fn new(client: Arc<CloudClient>) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &Arc<CloudClient> {
        &self.client
    }

    /// Reads every shadow property of the device.
    ///
    /// # Errors
    ///
    /// Returns a transport or authorization error if the read fails, and
    /// [`TransportError::Json`] if the result does not list properties.
    pub async fn fetch_all(&self) -> Result<Vec<RawPoint>, Error> {
        let result = self
            .client
            .get(&self.client.device_path(PROPERTIES_PATH))
            .await?;
        let shadow: ShadowProperties =
            serde_json::from_value(result).map_err(TransportError::Json)?;

        Ok(shadow
            .properties
            .into_iter()
            .map(|p| RawPoint {
                id: PointId::Code(p.code),
                value: PointValue::from_json(&p.value),
                timestamp_ms: p.time,
                type_tag: p.type_tag,
            })
            .collect())
    }

    /// Writes one raw value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandRejected`] if the API refuses the write.
    pub async fn write(
        &self,
        entry: &AttributeEntry,
        raw: &PointValue,
        quirks: ModelQuirks,
    ) -> Result<(), Error> {
        let (path, body) = match quirks.command_api {
            CommandApi::V1Commands => (
                self.client.device_path(COMMANDS_PATH),
                json!({"commands": [{"code": entry.code, "value": raw.to_json()}]}),
            ),
            CommandApi::V2Properties => {
                let mut properties = serde_json::Map::new();
                properties.insert(entry.code.clone(), raw.to_json());
                let properties = serde_json::Value::Object(properties).to_string();
                (
                    self.client.device_path(PROPERTIES_ISSUE_PATH),
                    json!({"properties": properties}),
                )
            }
        };

        tracing::debug!(attribute = %entry.name, code = %entry.code, value = %raw, "Sending cloud command");

        match self.client.post(&path, &body).await {
            Ok(serde_json::Value::Bool(false)) => Err(Error::CommandRejected {
                attribute: entry.name.clone(),
                message: "device did not accept the command".to_string(),
            }),
            Ok(_) => Ok(()),
            Err(Error::Transport(TransportError::Api(message))) => Err(Error::CommandRejected {
                attribute: entry.name.clone(),
                message,
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_properties_decode() {
        let result = serde_json::json!({
            "properties": [
                {"code": "temp_current", "value": 215, "time": 1_700_000_000_000_i64, "type": "value", "dp_id": 3},
                {"code": "mode", "value": "heat"}
            ]
        });
        let shadow: ShadowProperties = serde_json::from_value(result).unwrap();
        assert_eq!(shadow.properties.len(), 2);
        assert_eq!(shadow.properties[0].time, Some(1_700_000_000_000));
        assert_eq!(shadow.properties[0].type_tag.as_deref(), Some("value"));
        assert!(shadow.properties[1].time.is_none());
    }

    #[test]
    fn empty_result_has_no_properties() {
        let shadow: ShadowProperties = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(shadow.properties.is_empty());
    }
}
