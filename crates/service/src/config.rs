//! Network configuration service.
//!
//! Mirrors the device service's shape.  IP uniqueness only applies to
//! static (non-DHCP) configurations; a configuration linked to an active
//! device can only disappear through that device's cascade delete.

use std::sync::Arc;

use tracing::{info, instrument};

use db::store::Store;

use crate::models::NetworkConfig;
use crate::tx::rollback_or_warn;
use crate::{validate, ServiceError};

/// Business operations on network configurations.
pub struct ConfigService {
    store: Arc<dyn Store>,
}

impl ConfigService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert a new configuration.  For static configurations the IP must
    /// not be in use by any active static configuration.
    #[instrument(skip_all, fields(ip = %config.ip, dhcp = config.dhcp_enabled))]
    pub async fn insert(&self, config: NetworkConfig) -> Result<NetworkConfig, ServiceError> {
        let mut config = validate::config(config)?;
        // The association is only ever established by the composite
        // provisioning path.
        config.device_id = None;

        let mut tx = self.store.begin().await?;
        let created = async {
            if !config.dhcp_enabled && tx.config_by_ip(&config.ip).await?.is_some() {
                return Err(ServiceError::Duplicate(format!(
                    "a configuration with IP {} already exists",
                    config.ip
                )));
            }
            tx.create_config(&config.to_new_row()).await.map_err(Into::into)
        }
        .await;

        match created {
            Ok(row) => {
                tx.commit().await?;
                info!(id = row.id, "configuration created");
                Ok(NetworkConfig::from(row))
            }
            Err(err) => {
                rollback_or_warn(tx).await;
                Err(err)
            }
        }
    }

    /// Update an existing configuration, re-checking IP uniqueness against
    /// every other active static configuration.  The device association is
    /// not touched by updates.
    #[instrument(skip_all, fields(id = ?config.id))]
    pub async fn update(&self, config: NetworkConfig) -> Result<NetworkConfig, ServiceError> {
        let config = validate::config(config)?;
        let id = validate::id(config.id)?;

        let mut tx = self.store.begin().await?;
        let updated = async {
            if tx.config_by_id(id).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "no configuration with id {id}"
                )));
            }
            if !config.dhcp_enabled {
                if let Some(holder) = tx.config_by_ip(&config.ip).await? {
                    if holder.id != id {
                        return Err(ServiceError::Duplicate(format!(
                            "another configuration already holds IP {}",
                            config.ip
                        )));
                    }
                }
            }
            let affected = tx.update_config(id, &config.to_changes()).await?;
            if affected == 0 {
                return Err(ServiceError::NotFound(format!(
                    "no configuration with id {id}"
                )));
            }
            // Read back the stored state; the caller's view of the device
            // association may be stale.
            tx.config_by_id(id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("no configuration with id {id}"))
            })
        }
        .await;

        match updated {
            Ok(row) => {
                tx.commit().await?;
                info!(id, "configuration updated");
                Ok(NetworkConfig::from(row))
            }
            Err(err) => {
                rollback_or_warn(tx).await;
                Err(err)
            }
        }
    }

    /// Soft-delete a configuration.  Refused while an active device still
    /// references it — such configurations only go away via the owning
    /// device's cascade.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let mut tx = self.store.begin().await?;
        let deleted = async {
            if tx.config_by_id(id).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "no configuration with id {id}"
                )));
            }
            if tx.config_linked_to_active_device(id).await? {
                return Err(ServiceError::Validation(
                    "the configuration is associated with an active device and cannot be deleted"
                        .to_owned(),
                ));
            }
            tx.soft_delete_config(id).await?;
            Ok(())
        }
        .await;

        match deleted {
            Ok(()) => {
                tx.commit().await?;
                info!(id, "configuration soft-deleted");
                Ok(())
            }
            Err(err) => {
                rollback_or_warn(tx).await;
                Err(err)
            }
        }
    }

    /// Fetch an active configuration by id.
    pub async fn get_by_id(&self, id: i64) -> Result<NetworkConfig, ServiceError> {
        self.store
            .config_by_id(id)
            .await?
            .map(NetworkConfig::from)
            .ok_or_else(|| ServiceError::NotFound(format!("no configuration with id {id}")))
    }

    /// All active configurations.
    pub async fn get_all(&self) -> Result<Vec<NetworkConfig>, ServiceError> {
        let rows = self.store.configs_active().await?;
        Ok(rows.into_iter().map(NetworkConfig::from).collect())
    }

    /// Look up a configuration by its IP address.
    pub async fn find_by_ip(&self, ip: &str) -> Result<NetworkConfig, ServiceError> {
        self.store
            .config_by_ip(ip)
            .await?
            .map(NetworkConfig::from)
            .ok_or_else(|| ServiceError::NotFound(format!("no configuration with IP {ip}")))
    }

    /// Active configurations filtered by DHCP state; empty when nothing
    /// matches.
    pub async fn find_by_dhcp(&self, enabled: bool) -> Result<Vec<NetworkConfig>, ServiceError> {
        let rows = self.store.configs_by_dhcp(enabled).await?;
        Ok(rows.into_iter().map(NetworkConfig::from).collect())
    }
}
