// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `TuyaPump` library.
//!
//! Errors fall into two groups. Those that abort the current operation are
//! returned to the caller: [`AuthError`], [`TransportError`], command
//! rejections and failed refresh cycles. Those with a documented fallback,
//! [`ModelResolutionError`] and [`TransformError`], are absorbed internally
//! and only surface in logs.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials were refused, or authorization failed again after the
    /// single transparent re-authentication.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A network, protocol or decoding failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A refresh cycle did not complete. The next cycle proceeds normally.
    #[error("update failed: {0}")]
    UpdateFailed(#[source] TransportError),

    /// The device or the cloud API explicitly refused a write.
    #[error("command for {attribute} rejected: {message}")]
    CommandRejected {
        /// Logical attribute the write targeted.
        attribute: String,
        /// Reason reported by the device or API.
        message: String,
    },

    /// The attribute is not part of the device's attribute map.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// The attribute exists but cannot be written.
    #[error("attribute {0} is read-only")]
    ReadOnlyAttribute(String),

    /// The coordinator configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Returns `true` if this error stems from refused credentials.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Folds a failed read into the error shape reported by refresh cycles.
    ///
    /// Authorization failures keep their identity; transport failures become
    /// [`Error::UpdateFailed`].
    pub(crate) fn into_update_failure(self) -> Self {
        match self {
            Self::Transport(err) => Self::UpdateFailed(err),
            other => other,
        }
    }
}

/// Errors raised while obtaining or using a cloud access token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The token endpoint answered with a non-success HTTP status.
    #[error("token request failed with HTTP {0}")]
    TokenStatus(u16),

    /// The token endpoint answered with `success: false`.
    #[error("token request rejected: {0}")]
    TokenRejected(String),

    /// A signed call was refused twice in a row.
    #[error("request unauthorized after re-authentication: {0}")]
    Unauthorized(String),
}

/// Errors related to talking to the device, locally or through the cloud.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("HTTP {status} - {reason}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
    },

    /// The cloud API answered with `success: false`.
    #[error("API error: {0}")]
    Api(String),

    /// The response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response decoded but did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The local device library reported a failure.
    #[error("local device error: {0}")]
    Local(#[from] LocalDeviceError),

    /// A blocking worker could not be joined.
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Failure reported by a [`LocalDevice`](crate::transport::LocalDevice)
/// implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocalDeviceError {
    /// Socket, framing or decryption failure.
    #[error("I/O failure: {0}")]
    Io(String),

    /// The device answered but refused the request.
    #[error("device refused request: {0}")]
    Refused(String),
}

/// Reasons a model's attribute map could not be loaded.
///
/// The resolver never returns these to callers; it falls back to the
/// default map and logs the cause.
#[derive(Debug, Error)]
pub enum ModelResolutionError {
    /// No table is registered under this model identifier.
    #[error("no attribute map for model {0}")]
    UnknownModel(String),

    /// A built-in table failed to decode.
    #[error("invalid attribute map for model {model_id}: {source}")]
    InvalidTable {
        /// The model whose table is broken.
        model_id: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The model description endpoint could not be queried.
    #[error("model lookup failed: {0}")]
    Lookup(#[source] Box<Error>),

    /// The model description payload could not be decoded.
    #[error("malformed model description: {0}")]
    MalformedDescription(#[source] serde_json::Error),

    /// The model description did not name a model.
    #[error("model description has no model identifier")]
    MissingModelId,
}

/// Reasons a value transform could not be evaluated.
///
/// The value pipeline absorbs these and passes the untransformed value on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// Arithmetic was requested on a non-numeric value.
    #[error("expected a numeric value, got {0}")]
    NotNumeric(String),

    /// The transform divides by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The transform has no algebraic inverse.
    #[error("transform {0} has no inverse")]
    NotInvertible(&'static str),

    /// The transform produced a value of the wrong kind for its category.
    #[error("expected a {expected} result, got {actual}")]
    WrongKind {
        /// Kind required by the attribute category.
        expected: &'static str,
        /// Kind actually produced.
        actual: &'static str,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
