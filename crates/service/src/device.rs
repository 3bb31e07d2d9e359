//! Device service.
//!
//! Orchestrates validation, uniqueness checks, repository calls, and
//! transaction boundaries for devices.  Every mutating method follows the
//! same shape: validate first (a validation failure never opens a
//! transaction), then begin → guarded work → commit, with a best-effort
//! rollback on any failure inside the transaction.

use std::sync::Arc;

use tracing::{info, instrument};

use db::models::DeviceRow;
use db::store::Store;

use crate::models::{Device, NetworkConfig};
use crate::tx::rollback_or_warn;
use crate::{validate, ServiceError};

/// Business operations on devices.  Holds the injected store handle; one
/// instance serves any number of sequential operations.
pub struct DeviceService {
    store: Arc<dyn Store>,
}

impl DeviceService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert a new device.  The serial must not be in use by any active
    /// device; the returned device carries its store-assigned id.
    #[instrument(skip_all, fields(serial = %device.serial))]
    pub async fn insert(&self, device: Device) -> Result<Device, ServiceError> {
        let device = validate::device(device)?;

        let mut tx = self.store.begin().await?;
        let created = async {
            if tx.device_by_serial(&device.serial).await?.is_some() {
                return Err(ServiceError::Duplicate(format!(
                    "a device with serial {} already exists",
                    device.serial
                )));
            }
            tx.create_device(&device.to_new_row()).await.map_err(Into::into)
        }
        .await;

        match created {
            Ok(row) => {
                tx.commit().await?;
                info!(id = row.id, "device created");
                Ok(Device::from(row))
            }
            Err(err) => {
                rollback_or_warn(tx).await;
                Err(err)
            }
        }
    }

    /// Insert a device together with its network configuration in one
    /// transaction: either both records exist afterwards or neither does.
    ///
    /// The device is created first to obtain its id, which is stamped as
    /// the configuration's foreign key before the second insert.
    #[instrument(skip_all, fields(serial = %device.serial, ip = %config.ip))]
    pub async fn insert_with_config(
        &self,
        device: Device,
        config: NetworkConfig,
    ) -> Result<Device, ServiceError> {
        let device = validate::device(device)?;
        let config = validate::config(config)?;

        let mut tx = self.store.begin().await?;
        let created = async {
            if tx.device_by_serial(&device.serial).await?.is_some() {
                return Err(ServiceError::Duplicate(format!(
                    "a device with serial {} already exists",
                    device.serial
                )));
            }
            if !config.dhcp_enabled && tx.config_by_ip(&config.ip).await?.is_some() {
                return Err(ServiceError::Duplicate(format!(
                    "a configuration with IP {} already exists",
                    config.ip
                )));
            }

            let device_row = tx.create_device(&device.to_new_row()).await?;

            let mut new_config = config.to_new_row();
            new_config.device_id = Some(device_row.id);
            let config_row = tx.create_config(&new_config).await?;

            Ok((device_row, config_row))
        }
        .await;

        match created {
            Ok((device_row, config_row)) => {
                tx.commit().await?;
                info!(
                    device_id = device_row.id,
                    config_id = config_row.id,
                    "device provisioned with configuration"
                );
                let mut device = Device::from(device_row);
                device.config = Some(NetworkConfig::from(config_row));
                Ok(device)
            }
            Err(err) => {
                rollback_or_warn(tx).await;
                Err(err)
            }
        }
    }

    /// Update an existing device.  The serial may change, but not onto one
    /// held by a different active device.
    #[instrument(skip_all, fields(id = ?device.id))]
    pub async fn update(&self, device: Device) -> Result<Device, ServiceError> {
        let device = validate::device(device)?;
        let id = validate::id(device.id)?;

        let mut tx = self.store.begin().await?;
        let updated = async {
            if tx.device_by_id(id).await?.is_none() {
                return Err(ServiceError::NotFound(format!("no device with id {id}")));
            }
            if let Some(holder) = tx.device_by_serial(&device.serial).await? {
                if holder.id != id {
                    return Err(ServiceError::Duplicate(format!(
                        "another device already holds serial {}",
                        device.serial
                    )));
                }
            }
            let affected = tx.update_device(id, &device.to_changes()).await?;
            if affected == 0 {
                return Err(ServiceError::NotFound(format!("no device with id {id}")));
            }
            Ok(())
        }
        .await;

        match updated {
            Ok(()) => {
                tx.commit().await?;
                info!(id, "device updated");
                Ok(device)
            }
            Err(err) => {
                rollback_or_warn(tx).await;
                Err(err)
            }
        }
    }

    /// Soft-delete a device and, in the same transaction, its linked
    /// configuration if one exists.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let mut tx = self.store.begin().await?;
        let deleted = async {
            if tx.device_by_id(id).await?.is_none() {
                return Err(ServiceError::NotFound(format!("no device with id {id}")));
            }
            let config = tx.config_for_device(id).await?;
            tx.soft_delete_device(id).await?;
            if let Some(config) = config {
                tx.soft_delete_config(config.id).await?;
            }
            Ok(())
        }
        .await;

        match deleted {
            Ok(()) => {
                tx.commit().await?;
                info!(id, "device soft-deleted");
                Ok(())
            }
            Err(err) => {
                rollback_or_warn(tx).await;
                Err(err)
            }
        }
    }

    /// Fetch an active device by id, with its configuration populated.
    pub async fn get_by_id(&self, id: i64) -> Result<Device, ServiceError> {
        let row = self
            .store
            .device_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no device with id {id}")))?;
        self.attach_config(row).await
    }

    /// All active devices, configurations populated.
    pub async fn get_all(&self) -> Result<Vec<Device>, ServiceError> {
        let rows = self.store.devices_active().await?;
        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            devices.push(self.attach_config(row).await?);
        }
        Ok(devices)
    }

    /// Look up a device by serial (normalized before the lookup).
    pub async fn find_by_serial(&self, serial: &str) -> Result<Device, ServiceError> {
        let serial = validate::normalize(serial);
        let row = self
            .store
            .device_by_serial(&serial)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no device with serial {serial}")))?;
        self.attach_config(row).await
    }

    /// Active devices whose location contains the given substring; empty
    /// when nothing matches.
    pub async fn find_by_location(&self, needle: &str) -> Result<Vec<Device>, ServiceError> {
        let rows = self.store.devices_by_location(needle).await?;
        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            devices.push(self.attach_config(row).await?);
        }
        Ok(devices)
    }

    /// Resolve the device's configuration through the inverse foreign key.
    async fn attach_config(&self, row: DeviceRow) -> Result<Device, ServiceError> {
        let config = self.store.config_for_device(row.id).await?;
        let mut device = Device::from(row);
        device.config = config.map(NetworkConfig::from);
        Ok(device)
    }
}
