// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coordinator builder.

use std::sync::Arc;

use tokio::sync::watch;

use super::{Coordinator, CoordinatorState, Inner, tasks};
use crate::cloud::CloudClient;
use crate::config::{CloudConfig, ConnectionConfig, LocalConfig, SyncSettings};
use crate::error::{Error, Result};
use crate::model::{ModelCatalog, resolve_cloud, resolve_local};
use crate::transport::{CloudTransport, LocalDevice, LocalTransport, Transport};

/// Builder for [`Coordinator`].
///
/// Created with [`Coordinator::cloud`] or [`Coordinator::local`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tuyapump_lib::Coordinator;
/// use tuyapump_lib::config::{CloudConfig, SyncSettings};
///
/// # async fn example() -> tuyapump_lib::Result<()> {
/// let coordinator = Coordinator::cloud(CloudConfig::new("id", "secret", "device"))
///     .with_settings(SyncSettings::default().with_poll_interval(Duration::from_secs(120)))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CoordinatorBuilder {
    connection: ConnectionConfig,
    local_device: Option<Arc<dyn LocalDevice>>,
    catalog: Option<Arc<ModelCatalog>>,
    settings: SyncSettings,
    background_tasks: bool,
}

impl CoordinatorBuilder {
    pub(crate) fn cloud(config: CloudConfig) -> Self {
        Self::new(ConnectionConfig::Cloud(config), None)
    }

    pub(crate) fn local(config: LocalConfig, device: Arc<dyn LocalDevice>) -> Self {
        Self::new(ConnectionConfig::Local(config), Some(device))
    }

    fn new(connection: ConnectionConfig, local_device: Option<Arc<dyn LocalDevice>>) -> Self {
        Self {
            connection,
            local_device,
            catalog: None,
            settings: SyncSettings::default(),
            background_tasks: true,
        }
    }

    /// Shares a model catalog between coordinators.
    ///
    /// Each coordinator gets its own catalog with the built-in tables
    /// otherwise.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<ModelCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Sets the timing settings.
    #[must_use]
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Enables or disables the background loops (default: enabled).
    ///
    /// Without them the snapshot only changes on [`Coordinator::refresh`]
    /// and commands.
    #[must_use]
    pub fn with_background_tasks(mut self, enabled: bool) -> Self {
        self.background_tasks = enabled;
        self
    }

    /// Returns the connection configuration.
    #[must_use]
    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Resolves the model, performs the first read and starts the loops.
    ///
    /// A failed first read is logged and leaves the coordinator in the
    /// `Failed` state; the next cycle retries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for unusable settings and
    /// [`Error::Auth`] if the cloud credentials are refused.
    pub async fn build(self) -> Result<Coordinator> {
        let (state_tx, _) = watch::channel(CoordinatorState::Uninitialized);
        state_tx.send_replace(CoordinatorState::Resolving);

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(ModelCatalog::new()));

        let (resolved, transport) = match &self.connection {
            ConnectionConfig::Cloud(config) => {
                let client = Arc::new(CloudClient::new(config)?);
                match client.ensure_token().await {
                    Ok(_) => {}
                    Err(e) if e.is_auth() => return Err(e),
                    Err(e) => {
                        tracing::warn!(device_id = %config.device_id(), error = %e, "Token request failed");
                    }
                }
                let resolved = resolve_cloud(&client, &catalog).await;
                (resolved, Transport::Cloud(CloudTransport::new(client)))
            }
            ConnectionConfig::Local(config) => {
                let device = self.local_device.ok_or_else(|| {
                    Error::InvalidConfiguration("local connection without a device".to_string())
                })?;
                let resolved = resolve_local(config, &catalog);
                (resolved, Transport::Local(LocalTransport::new(device)))
            }
        };

        tracing::info!(
            device_id = %resolved.info.device_id,
            model_id = %resolved.model_id,
            transport = transport.kind(),
            attributes = resolved.map.len(),
            "Coordinator resolved device model"
        );

        let inner = Arc::new(Inner::new(resolved, transport, self.settings, state_tx));
        match inner.refresh().await {
            Ok(()) => {}
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                tracing::warn!(device_id = %inner.device_id(), error = %e, "First refresh failed");
            }
        }

        if self.background_tasks {
            tasks::start(&inner);
        }

        Ok(Coordinator { inner })
    }
}

impl std::fmt::Debug for CoordinatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorBuilder")
            .field("connection", &self.connection)
            .field("settings", &self.settings)
            .field("background_tasks", &self.background_tasks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = Coordinator::cloud(CloudConfig::new("id", "secret", "dev"));
        assert!(builder.background_tasks);
        assert!(builder.catalog.is_none());
        assert!(builder.connection().is_cloud());
        assert_eq!(builder.settings, SyncSettings::default());
    }

    #[test]
    fn builder_options() {
        let catalog = Arc::new(ModelCatalog::new());
        let builder = Coordinator::cloud(CloudConfig::new("id", "secret", "dev"))
            .with_catalog(Arc::clone(&catalog))
            .with_background_tasks(false)
            .with_settings(SyncSettings::default().with_refresh_after_command(None));
        assert!(!builder.background_tasks);
        assert!(builder.catalog.is_some());
        assert!(builder.settings.refresh_after_command().is_none());
    }

    #[tokio::test]
    async fn cloud_build_rejects_empty_device_id() {
        let err = Coordinator::cloud(CloudConfig::new("id", "secret", ""))
            .with_background_tasks(false)
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }
}
