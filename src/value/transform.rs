// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative value transforms.
//!
//! Transforms are plain data so attribute maps can be shipped as JSON. A
//! transform is evaluated with [`Transform::apply`]; arithmetic transforms
//! can be reversed with [`Transform::inverse`] to encode writes.

use serde::{Deserialize, Serialize};

use super::PointValue;
use crate::error::TransformError;

/// A conversion step between raw and logical values.
///
/// # Examples
///
/// ```
/// use tuyapump_lib::{PointValue, Transform};
///
/// let tenths = Transform::Divide { divisor: 10.0 };
/// let logical = tenths.apply(&PointValue::Integer(215)).unwrap();
/// assert_eq!(logical, PointValue::Float(21.5));
///
/// let raw = tenths.inverse().unwrap().apply(&logical).unwrap();
/// assert_eq!(raw, PointValue::Float(215.0));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Pass the value through unchanged.
    #[default]
    Identity,
    /// Multiply by a constant.
    Multiply {
        /// Multiplier.
        factor: f64,
    },
    /// Divide by a constant.
    Divide {
        /// Divisor, must be non-zero.
        divisor: f64,
    },
    /// Add a constant.
    Offset {
        /// Addend, may be negative.
        amount: f64,
    },
    /// Boolean truthiness, see [`PointValue::is_truthy`].
    Truthy,
    /// True when the numeric value differs from zero.
    NonZero,
    /// True when the value equals one of the listed values.
    OneOf {
        /// Values mapping to `true`.
        values: Vec<PointValue>,
    },
    /// Apply several steps in order.
    Chain {
        /// Steps, applied first to last.
        steps: Vec<Transform>,
    },
}

impl Transform {
    /// Evaluates the transform.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] when arithmetic is requested on a
    /// non-numeric value or a division by zero is attempted.
    pub fn apply(&self, value: &PointValue) -> Result<PointValue, TransformError> {
        match self {
            Self::Identity => Ok(value.clone()),
            Self::Multiply { factor } => numeric(value).map(|v| PointValue::Float(v * factor)),
            Self::Divide { divisor } => {
                if *divisor == 0.0 {
                    return Err(TransformError::DivisionByZero);
                }
                numeric(value).map(|v| PointValue::Float(v / divisor))
            }
            Self::Offset { amount } => numeric(value).map(|v| PointValue::Float(v + amount)),
            Self::Truthy => Ok(PointValue::Bool(value.is_truthy())),
            Self::NonZero => numeric(value).map(|v| PointValue::Bool(v != 0.0)),
            Self::OneOf { values } => Ok(PointValue::Bool(
                values.iter().any(|candidate| candidate.same_as(value)),
            )),
            Self::Chain { steps } => steps
                .iter()
                .try_fold(value.clone(), |acc, step| step.apply(&acc)),
        }
    }

    /// Returns the algebraic inverse of this transform.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::NotInvertible`] for the boolean transforms,
    /// which lose information.
    pub fn inverse(&self) -> Result<Self, TransformError> {
        match self {
            Self::Identity => Ok(Self::Identity),
            Self::Multiply { factor } => Ok(Self::Divide { divisor: *factor }),
            Self::Divide { divisor } => Ok(Self::Multiply { factor: *divisor }),
            Self::Offset { amount } => Ok(Self::Offset { amount: -amount }),
            Self::Truthy | Self::NonZero | Self::OneOf { .. } => {
                Err(TransformError::NotInvertible(self.name()))
            }
            Self::Chain { steps } => steps
                .iter()
                .rev()
                .map(Self::inverse)
                .collect::<Result<Vec<_>, _>>()
                .map(|steps| Self::Chain { steps }),
        }
    }

    /// Returns true if this transform produces booleans.
    #[must_use]
    pub fn is_boolean(&self) -> bool {
        match self {
            Self::Truthy | Self::NonZero | Self::OneOf { .. } => true,
            Self::Chain { steps } => steps.last().is_some_and(Self::is_boolean),
            _ => false,
        }
    }

    /// Returns true if this transform is a no-op.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        match self {
            Self::Identity => true,
            Self::Chain { steps } => steps.iter().all(Self::is_identity),
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Multiply { .. } => "multiply",
            Self::Divide { .. } => "divide",
            Self::Offset { .. } => "offset",
            Self::Truthy => "truthy",
            Self::NonZero => "non_zero",
            Self::OneOf { .. } => "one_of",
            Self::Chain { .. } => "chain",
        }
    }
}

fn numeric(value: &PointValue) -> Result<f64, TransformError> {
    value
        .as_f64()
        .ok_or_else(|| TransformError::NotNumeric(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn divide_and_multiply() {
        let t = Transform::Divide { divisor: 10.0 };
        assert_eq!(
            t.apply(&PointValue::Integer(450)).unwrap(),
            PointValue::Float(45.0)
        );
        let t = Transform::Multiply { factor: 10.0 };
        assert_eq!(
            t.apply(&PointValue::Float(21.5)).unwrap(),
            PointValue::Float(215.0)
        );
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        let t = Transform::Divide { divisor: 0.0 };
        assert_eq!(
            t.apply(&PointValue::Integer(1)),
            Err(TransformError::DivisionByZero)
        );
    }

    #[test]
    fn arithmetic_on_text_is_an_error() {
        let t = Transform::Offset { amount: 1.0 };
        assert!(matches!(
            t.apply(&PointValue::from("hot")),
            Err(TransformError::NotNumeric(_))
        ));
    }

    #[test]
    fn boolean_transforms() {
        assert_eq!(
            Transform::NonZero.apply(&PointValue::Integer(3)).unwrap(),
            PointValue::Bool(true)
        );
        assert_eq!(
            Transform::Truthy.apply(&PointValue::from("off")).unwrap(),
            PointValue::Bool(false)
        );
        let one_of = Transform::OneOf {
            values: vec![PointValue::from("heating"), PointValue::from("boost")],
        };
        assert_eq!(
            one_of.apply(&PointValue::from("boost")).unwrap(),
            PointValue::Bool(true)
        );
    }

    #[test]
    fn chain_applies_in_order() {
        let t = Transform::Chain {
            steps: vec![
                Transform::Offset { amount: -400.0 },
                Transform::Divide { divisor: 10.0 },
            ],
        };
        assert_eq!(
            t.apply(&PointValue::Integer(615)).unwrap(),
            PointValue::Float(21.5)
        );

        let raw = t.inverse().unwrap().apply(&PointValue::Float(21.5)).unwrap();
        assert_eq!(raw, PointValue::Float(615.0));
    }

    #[test]
    fn boolean_transforms_are_not_invertible() {
        assert_eq!(
            Transform::Truthy.inverse(),
            Err(TransformError::NotInvertible("truthy"))
        );
        let chain = Transform::Chain {
            steps: vec![Transform::Divide { divisor: 2.0 }, Transform::NonZero],
        };
        assert!(chain.inverse().is_err());
        assert!(chain.is_boolean());
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let t: Transform = serde_json::from_value(json!({"kind": "divide", "divisor": 10.0})).unwrap();
        assert_eq!(t, Transform::Divide { divisor: 10.0 });
        let t: Transform = serde_json::from_value(json!({"kind": "non_zero"})).unwrap();
        assert_eq!(t, Transform::NonZero);
        assert!(Transform::default().is_identity());
    }
}
