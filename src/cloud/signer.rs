// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request signatures for the cloud open API.
//!
//! Every request carries an `HMAC-SHA256` signature over the client id, the
//! access token (once obtained), the millisecond timestamp and a canonical
//! description of the request:
//!
//! ```text
//! METHOD \n hex(sha256(body)) \n \n path
//! ```

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Value of the `sign_method` header.
pub const SIGN_METHOD: &str = "HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// Computes request signatures from the shared secret.
///
/// Signing is a pure function of its inputs.
///
/// # Examples
///
/// ```
/// use tuyapump_lib::cloud::Signer;
///
/// let signer = Signer::new("client-id", "secret").unwrap();
/// let a = signer.sign("GET", "/v1.0/token?grant_type=1", 1_700_000_000_000, None, "");
/// let b = signer.sign("GET", "/v1.0/token?grant_type=1", 1_700_000_000_000, None, "");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
#[derive(Clone)]
pub struct Signer {
    access_id: String,
    mac: HmacSha256,
}

impl Signer {
    /// Creates a signer for the given credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if either credential is empty.
    pub fn new(access_id: impl Into<String>, access_secret: &str) -> Result<Self, Error> {
        let access_id = access_id.into();
        if access_id.is_empty() || access_secret.is_empty() {
            return Err(Error::InvalidConfiguration(
                "cloud access id and secret must not be empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(access_secret.as_bytes())
            .map_err(|e| Error::InvalidConfiguration(format!("invalid access secret: {e}")))?;
        Ok(Self { access_id, mac })
    }

    /// Returns the client id sent in the `client_id` header.
    #[must_use]
    pub fn access_id(&self) -> &str {
        &self.access_id
    }

    /// Signs a request and returns the upper-case hex digest.
    ///
    /// `path` must include the query string exactly as sent.
    #[must_use]
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        timestamp_ms: i64,
        token: Option<&str>,
        body: &str,
    ) -> String {
        let body_hash = hex::encode(Sha256::digest(body.as_bytes()));
        let string_to_sign = format!("{method}\n{body_hash}\n\n{path}");

        let mut mac = self.mac.clone();
        mac.update(self.access_id.as_bytes());
        if let Some(token) = token {
            mac.update(token.as_bytes());
        }
        mac.update(timestamp_ms.to_string().as_bytes());
        mac.update(string_to_sign.as_bytes());

        hex::encode_upper(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_id", &self.access_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(secret: &str, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode_upper(mac.finalize().into_bytes())
    }

    #[test]
    fn token_request_signature() {
        let signer = Signer::new("abc", "s3cr3t").unwrap();
        let empty_hash = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let expected = reference(
            "s3cr3t",
            &format!("abc1700000000000GET\n{empty_hash}\n\n/v1.0/token?grant_type=1"),
        );
        assert_eq!(
            signer.sign("GET", "/v1.0/token?grant_type=1", 1_700_000_000_000, None, ""),
            expected
        );
    }

    #[test]
    fn token_is_part_of_the_message() {
        let signer = Signer::new("abc", "s3cr3t").unwrap();
        let without = signer.sign("GET", "/p", 1, None, "");
        let with = signer.sign("GET", "/p", 1, Some("tok"), "");
        assert_ne!(without, with);

        let empty_hash = hex::encode(Sha256::digest(b""));
        let expected = reference("s3cr3t", &format!("abctok1GET\n{empty_hash}\n\n/p"));
        assert_eq!(with, expected);
    }

    #[test]
    fn body_changes_signature() {
        let signer = Signer::new("abc", "s3cr3t").unwrap();
        let a = signer.sign("POST", "/p", 1, Some("tok"), r#"{"a":1}"#);
        let b = signer.sign("POST", "/p", 1, Some("tok"), r#"{"a":2}"#);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(Signer::new("", "secret").is_err());
        assert!(Signer::new("id", "").is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let signer = Signer::new("abc", "s3cr3t").unwrap();
        assert!(!format!("{signer:?}").contains("s3cr3t"));
    }
}
