// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point values and the conversion pipeline between raw and logical values.
//!
//! Raw data points reported by a heat pump are loosely typed: booleans may
//! arrive as `true`, `1` or `"on"`, temperatures as integers scaled by ten.
//! This module provides:
//!
//! - [`PointValue`] - A dynamically typed scalar (bool, integer, float, text)
//! - [`Transform`] - A small declarative DSL describing raw/logical conversions
//! - [`to_logical`] / [`to_raw`] - The two directions of the value pipeline

mod pipeline;
mod transform;

pub use pipeline::{coerce, to_logical, to_raw};
pub use transform::Transform;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Text values accepted as "true" by [`PointValue::is_truthy`].
const TRUTHY_WORDS: [&str; 6] = ["true", "1", "on", "yes", "enable", "open"];

/// A scalar data point value.
///
/// # Examples
///
/// ```
/// use tuyapump_lib::PointValue;
///
/// let raw = PointValue::from_json(&serde_json::json!(215));
/// assert_eq!(raw, PointValue::Integer(215));
/// assert!(raw.is_truthy());
/// assert!(PointValue::Integer(40).same_as(&PointValue::Float(40.0)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    /// Boolean value.
    Bool(bool),
    /// Integral value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value, also used for enumerations.
    Text(String),
}

impl PointValue {
    /// Converts a JSON value into a point value.
    ///
    /// Arrays, objects and `null` are kept as their JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Converts this value into JSON for the wire.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Returns the numeric value, if any.
    ///
    /// Text is parsed leniently so that `"21.5"` counts as numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the text value, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets the value as a truth value.
    ///
    /// Non-zero numbers are true. Text is true for `true`, `1`, `on`, `yes`,
    /// `enable` and `open`, ignoring case.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Text(s) => {
                let lower = s.trim().to_ascii_lowercase();
                TRUTHY_WORDS.contains(&lower.as_str())
            }
        }
    }

    /// Returns true if the value is a number.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Compares two values the way a device would.
    ///
    /// Numbers compare by magnitude regardless of representation, so the
    /// integer `40` equals the float `40.0`.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => {
                match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
                    _ => false,
                }
            }
            (a, b) => a == b,
        }
    }

    /// Returns the type tag used on the cloud wire for this kind of value.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) | Self::Float(_) => "value",
            Self::Text(_) => "enum",
        }
    }

    /// Short name of the variant, used in error messages.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for PointValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PointValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for PointValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for PointValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PointValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PointValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_scalars() {
        assert_eq!(PointValue::from_json(&json!(true)), PointValue::Bool(true));
        assert_eq!(PointValue::from_json(&json!(42)), PointValue::Integer(42));
        assert_eq!(PointValue::from_json(&json!(4.5)), PointValue::Float(4.5));
        assert_eq!(
            PointValue::from_json(&json!("heat")),
            PointValue::Text("heat".to_string())
        );
    }

    #[test]
    fn from_json_keeps_composites_as_text() {
        let value = PointValue::from_json(&json!({"a": 1}));
        assert_eq!(value, PointValue::Text(r#"{"a":1}"#.to_string()));
        assert_eq!(
            PointValue::from_json(&serde_json::Value::Null),
            PointValue::Text("null".to_string())
        );
    }

    #[test]
    fn to_json_round_trips_scalars() {
        assert_eq!(PointValue::Integer(7).to_json(), json!(7));
        assert_eq!(PointValue::Bool(false).to_json(), json!(false));
        assert_eq!(PointValue::from("cool").to_json(), json!("cool"));
    }

    #[test]
    fn truthiness() {
        assert!(PointValue::Integer(1).is_truthy());
        assert!(!PointValue::Integer(0).is_truthy());
        assert!(PointValue::Float(0.5).is_truthy());
        assert!(PointValue::from("ON").is_truthy());
        assert!(PointValue::from("Enable").is_truthy());
        assert!(!PointValue::from("off").is_truthy());
        assert!(!PointValue::from("").is_truthy());
    }

    #[test]
    fn lenient_numeric_text() {
        assert_eq!(PointValue::from(" 21.5 ").as_f64(), Some(21.5));
        assert_eq!(PointValue::from("warm").as_f64(), None);
        assert_eq!(PointValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn same_as_ignores_numeric_representation() {
        assert!(PointValue::Integer(40).same_as(&PointValue::Float(40.0)));
        assert!(!PointValue::Integer(40).same_as(&PointValue::Float(40.5)));
        assert!(!PointValue::Integer(1).same_as(&PointValue::Bool(true)));
        assert!(PointValue::from("auto").same_as(&PointValue::from("auto")));
    }

    #[test]
    fn serde_untagged() {
        let value: PointValue = serde_json::from_str("21.5").unwrap();
        assert_eq!(value, PointValue::Float(21.5));
        assert_eq!(serde_json::to_string(&PointValue::Integer(3)).unwrap(), "3");
    }

    #[test]
    fn display() {
        assert_eq!(PointValue::Float(21.5).to_string(), "21.5");
        assert_eq!(PointValue::from("eco").to_string(), "eco");
    }
}
