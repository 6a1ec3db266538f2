// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw to logical conversion and back.
//!
//! Neither direction fails: a transform error is logged and the value
//! passes through untouched.

use super::{PointValue, Transform};
use crate::error::TransformError;
use crate::model::{AttributeEntry, BooleanEncoding, Category, ModelQuirks};

/// Converts a raw point value into the attribute's logical value.
///
/// Boolean attributes without an explicit transform are canonicalized with
/// [`PointValue::is_truthy`].
#[must_use]
pub fn to_logical(entry: &AttributeEntry, raw: &PointValue) -> PointValue {
    match forward(entry, raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                attribute = %entry.name,
                raw = %raw,
                error = %e,
                "Transform failed, keeping raw value"
            );
            raw.clone()
        }
    }
}

/// Converts a logical value into what is sent to the device.
///
/// Applies the explicit inverse transform if the entry has one, otherwise
/// the algebraic inverse of the forward transform for numeric attributes.
/// Booleans are then encoded according to the model's quirks.
#[must_use]
pub fn to_raw(entry: &AttributeEntry, logical: &PointValue, quirks: ModelQuirks) -> PointValue {
    let transformed = match inverse(entry) {
        Ok(Transform::Identity) => logical.clone(),
        Ok(t) => match t.apply(logical) {
            Ok(value) => integral(value),
            Err(e) => {
                tracing::warn!(
                    attribute = %entry.name,
                    value = %logical,
                    error = %e,
                    "Inverse transform failed, sending value as-is"
                );
                logical.clone()
            }
        },
        Err(e) => {
            tracing::debug!(attribute = %entry.name, error = %e, "No inverse transform");
            logical.clone()
        }
    };

    if entry.category.is_boolean() {
        encode_bool(&transformed, quirks.boolean_encoding)
    } else {
        transformed
    }
}

/// Normalizes a caller-supplied logical value to the attribute's category.
///
/// Used for optimistic state, so that `"on"` written to a switch is held as
/// `true` and compares equal to the device's confirmation.
#[must_use]
pub fn coerce(entry: &AttributeEntry, value: &PointValue) -> PointValue {
    match entry.category {
        Category::BooleanFlag | Category::WritableBoolean => PointValue::Bool(value.is_truthy()),
        Category::WritableNumeric if !value.is_numeric() => {
            value.as_f64().map_or_else(|| value.clone(), PointValue::Float)
        }
        Category::WritableEnum if value.as_str().is_none() => PointValue::Text(value.to_string()),
        _ => value.clone(),
    }
}

fn forward(entry: &AttributeEntry, raw: &PointValue) -> Result<PointValue, TransformError> {
    let category = entry.category;
    if category.is_boolean() && entry.forward.is_identity() {
        return Ok(PointValue::Bool(raw.is_truthy()));
    }

    let value = entry.forward.apply(raw)?;
    match category {
        Category::BooleanFlag | Category::WritableBoolean => {
            Ok(PointValue::Bool(value.is_truthy()))
        }
        Category::WritableNumeric if !value.is_numeric() => match value.as_f64() {
            Some(v) => Ok(PointValue::Float(v)),
            None => Err(TransformError::WrongKind {
                expected: "numeric",
                actual: value.kind_name(),
            }),
        },
        Category::WritableEnum if value.as_str().is_none() => Ok(PointValue::Text(value.to_string())),
        _ => Ok(value),
    }
}

fn inverse(entry: &AttributeEntry) -> Result<Transform, TransformError> {
    if let Some(t) = &entry.inverse {
        return Ok(t.clone());
    }
    match entry.category {
        Category::WritableNumeric => entry.forward.inverse(),
        _ => Ok(Transform::Identity),
    }
}

/// Arithmetic yields floats; devices expect integers for scaled values.
#[allow(clippy::cast_possible_truncation)]
fn integral(value: PointValue) -> PointValue {
    match value {
        PointValue::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
            PointValue::Integer(f as i64)
        }
        PointValue::Float(f) => PointValue::Float((f * 1.0e6).round() / 1.0e6),
        other => other,
    }
}

fn encode_bool(value: &PointValue, encoding: BooleanEncoding) -> PointValue {
    let on = value.is_truthy();
    match encoding {
        BooleanEncoding::Native => PointValue::Bool(on),
        BooleanEncoding::Integer => PointValue::Integer(i64::from(on)),
        BooleanEncoding::Text => PointValue::Text(on.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(category: Category) -> AttributeEntry {
        AttributeEntry::new("attr", "attr", category)
    }

    #[test]
    fn canonical_truthy_set_for_boolean_categories() {
        let flag = entry(Category::BooleanFlag);
        for raw in [
            PointValue::Bool(true),
            PointValue::Integer(1),
            PointValue::Integer(-3),
            PointValue::Float(0.1),
            PointValue::from("true"),
            PointValue::from("1"),
            PointValue::from("On"),
            PointValue::from("YES"),
            PointValue::from("enable"),
            PointValue::from("open"),
        ] {
            assert_eq!(to_logical(&flag, &raw), PointValue::Bool(true), "{raw:?}");
        }
        for raw in [
            PointValue::Bool(false),
            PointValue::Integer(0),
            PointValue::Float(0.0),
            PointValue::from("false"),
            PointValue::from("closed"),
            PointValue::from("2"),
        ] {
            assert_eq!(to_logical(&flag, &raw), PointValue::Bool(false), "{raw:?}");
        }
    }

    #[test]
    fn scaled_telemetry() {
        let temp = entry(Category::Telemetry).with_forward(Transform::Divide { divisor: 10.0 });
        assert_eq!(
            to_logical(&temp, &PointValue::Integer(452)),
            PointValue::Float(45.2)
        );
    }

    #[test]
    fn transform_failure_returns_raw() {
        let temp = entry(Category::Telemetry).with_forward(Transform::Divide { divisor: 10.0 });
        let raw = PointValue::from("E1");
        assert_eq!(to_logical(&temp, &raw), raw);
    }

    #[test]
    fn numeric_category_parses_text() {
        let setpoint = entry(Category::WritableNumeric);
        assert_eq!(
            to_logical(&setpoint, &PointValue::from("22.5")),
            PointValue::Float(22.5)
        );
        let raw = PointValue::from("n/a");
        assert_eq!(to_logical(&setpoint, &raw), raw);
    }

    #[test]
    fn enum_category_yields_text() {
        let mode = entry(Category::WritableEnum);
        assert_eq!(
            to_logical(&mode, &PointValue::Integer(2)),
            PointValue::from("2")
        );
    }

    #[test]
    fn derived_inverse_for_scaled_setpoint() {
        let setpoint =
            entry(Category::WritableNumeric).with_forward(Transform::Divide { divisor: 10.0 });
        assert_eq!(
            to_raw(&setpoint, &PointValue::Float(45.5), ModelQuirks::default()),
            PointValue::Integer(455)
        );
    }

    #[test]
    fn explicit_inverse_wins() {
        let setpoint = entry(Category::WritableNumeric)
            .with_forward(Transform::Divide { divisor: 10.0 })
            .with_inverse(Transform::Multiply { factor: 100.0 });
        assert_eq!(
            to_raw(&setpoint, &PointValue::Integer(2), ModelQuirks::default()),
            PointValue::Integer(200)
        );
    }

    #[test]
    fn identity_keeps_the_written_value() {
        let setpoint = entry(Category::WritableNumeric);
        assert_eq!(
            to_raw(&setpoint, &PointValue::Float(22.0), ModelQuirks::default()),
            PointValue::Float(22.0)
        );
    }

    #[test]
    fn failed_inverse_sends_original() {
        let setpoint =
            entry(Category::WritableNumeric).with_forward(Transform::Divide { divisor: 10.0 });
        let value = PointValue::from("max");
        assert_eq!(to_raw(&setpoint, &value, ModelQuirks::default()), value);
    }

    #[test]
    fn coerce_by_category() {
        assert_eq!(
            coerce(&entry(Category::WritableBoolean), &PointValue::from("on")),
            PointValue::Bool(true)
        );
        assert_eq!(
            coerce(&entry(Category::WritableNumeric), &PointValue::from("22")),
            PointValue::Float(22.0)
        );
        assert_eq!(
            coerce(&entry(Category::WritableEnum), &PointValue::Integer(3)),
            PointValue::from("3")
        );
    }

    #[test]
    fn boolean_encoding_quirks() {
        let power = entry(Category::WritableBoolean).with_forward(Transform::Truthy);
        let on = PointValue::Bool(true);

        assert_eq!(to_raw(&power, &on, ModelQuirks::default()), on);

        let quirks = ModelQuirks {
            boolean_encoding: BooleanEncoding::Integer,
            ..ModelQuirks::default()
        };
        assert_eq!(to_raw(&power, &on, quirks), PointValue::Integer(1));

        let quirks = ModelQuirks {
            boolean_encoding: BooleanEncoding::Text,
            ..ModelQuirks::default()
        };
        assert_eq!(
            to_raw(&power, &PointValue::Bool(false), quirks),
            PointValue::from("false")
        );
    }
}
