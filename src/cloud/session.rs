// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Access token lifecycle.
//!
//! The token has no explicit expiry. It is acquired lazily, kept until a
//! signed call reports an authorization failure, then cleared and acquired
//! again on next use.

use std::future::Future;

use tokio::sync::Mutex;

use crate::error::Error;

/// Holds the cached bearer token.
#[derive(Debug, Default)]
pub struct Session {
    token: Mutex<Option<String>>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, acquiring one with `acquire` if there is none.
    ///
    /// Concurrent callers wait for a single acquisition instead of each
    /// issuing their own.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `acquire`; the session stays empty.
    pub async fn ensure_token<F, Fut>(&self, acquire: F) -> Result<String, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, Error>>,
    {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let token = acquire().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Clears the token if it is still the one that failed.
    ///
    /// A token refreshed by another caller in the meantime is kept.
    pub async fn invalidate_if(&self, failed: &str) {
        let mut guard = self.token.lock().await;
        if guard.as_deref() == Some(failed) {
            tracing::debug!("Clearing rejected access token");
            *guard = None;
        }
    }

    /// Clears the token unconditionally.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    /// Returns the cached token without acquiring one.
    pub async fn current(&self) -> Option<String> {
        self.token.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn ensure_token_is_idempotent() {
        let session = Session::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let token = session
                .ensure_token(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("tok-1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(token, "tok-1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_acquisition_leaves_session_empty() {
        let session = Session::new();
        let result = session
            .ensure_token(|| async { Err(AuthError::TokenStatus(500).into()) })
            .await;
        assert!(result.unwrap_err().is_auth());
        assert!(session.current().await.is_none());
    }

    #[tokio::test]
    async fn invalidate_if_only_clears_matching_token() {
        let session = Session::new();
        session
            .ensure_token(|| async { Ok("fresh".to_string()) })
            .await
            .unwrap();

        session.invalidate_if("stale").await;
        assert_eq!(session.current().await.as_deref(), Some("fresh"));

        session.invalidate_if("fresh").await;
        assert!(session.current().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_acquisition() {
        let session = Arc::new(Session::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let session = Arc::clone(&session);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                session
                    .ensure_token(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok("shared".to_string())
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
