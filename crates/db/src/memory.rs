//! `MemoryStore` — an in-process `Store` used as a test double.
//!
//! A transaction is a snapshot of the tables: mutations run against the
//! snapshot and `commit` swaps it in, so either the whole transaction
//! becomes visible or none of it.  Dropping the handle discards the
//! snapshot, matching the rollback-on-drop contract of the Postgres
//! backend.
//!
//! The unique and check constraints of the real schema are enforced at
//! mutation time under the same constraint names, so error classification
//! behaves identically.  Assumes one writer at a time, which is the
//! service layer's scheduling model.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{
    DeviceChanges, DeviceRow, NetworkConfigChanges, NetworkConfigRow, NewDeviceRow,
    NewNetworkConfigRow,
};
use crate::store::{Store, StoreTx};
use crate::StoreError;

const SERIAL_IDX: &str = "devices_serial_active_idx";
const IP_IDX: &str = "network_configs_ip_active_idx";
const STATIC_IP_CHECK: &str = "network_configs_static_ip_check";
const DHCP_PLACEHOLDER: &str = "0.0.0.0";

#[derive(Debug, Default, Clone)]
struct Tables {
    devices: Vec<DeviceRow>,
    configs: Vec<NetworkConfigRow>,
    next_device_id: i64,
    next_config_id: i64,
}

impl Tables {
    fn device_by_id(&self, id: i64) -> Option<DeviceRow> {
        self.devices.iter().find(|d| d.id == id && !d.deleted).cloned()
    }

    fn device_by_serial(&self, serial: &str) -> Option<DeviceRow> {
        self.devices
            .iter()
            .find(|d| d.serial == serial && !d.deleted)
            .cloned()
    }

    fn config_by_id(&self, id: i64) -> Option<NetworkConfigRow> {
        self.configs.iter().find(|c| c.id == id && !c.deleted).cloned()
    }

    fn config_by_ip(&self, ip: &str) -> Option<NetworkConfigRow> {
        self.configs
            .iter()
            .find(|c| c.ip == ip && !c.deleted)
            .cloned()
    }

    fn config_for_device(&self, device_id: i64) -> Option<NetworkConfigRow> {
        self.configs
            .iter()
            .find(|c| c.device_id == Some(device_id) && !c.deleted)
            .cloned()
    }

    fn serial_taken(&self, serial: &str, except: Option<i64>) -> bool {
        self.devices
            .iter()
            .any(|d| !d.deleted && d.serial == serial && Some(d.id) != except)
    }

    fn ip_taken(&self, ip: &str, except: Option<i64>) -> bool {
        self.configs
            .iter()
            .any(|c| !c.deleted && !c.dhcp_enabled && c.ip == ip && Some(c.id) != except)
    }
}

fn unique(constraint: &str) -> StoreError {
    StoreError::Unique {
        constraint: Some(constraint.to_owned()),
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store sharing its tables across clones.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let staged = self.inner.lock().unwrap().clone();
        Ok(Box::new(MemoryStoreTx {
            shared: Arc::clone(&self.inner),
            staged,
        }))
    }

    async fn device_by_id(&self, id: i64) -> Result<Option<DeviceRow>, StoreError> {
        Ok(self.inner.lock().unwrap().device_by_id(id))
    }

    async fn device_by_serial(&self, serial: &str) -> Result<Option<DeviceRow>, StoreError> {
        Ok(self.inner.lock().unwrap().device_by_serial(serial))
    }

    async fn devices_active(&self) -> Result<Vec<DeviceRow>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.devices.iter().filter(|d| !d.deleted).cloned().collect())
    }

    async fn devices_by_location(&self, needle: &str) -> Result<Vec<DeviceRow>, StoreError> {
        let needle = needle.to_lowercase();
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .devices
            .iter()
            .filter(|d| !d.deleted && d.location.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn config_by_id(&self, id: i64) -> Result<Option<NetworkConfigRow>, StoreError> {
        Ok(self.inner.lock().unwrap().config_by_id(id))
    }

    async fn config_by_ip(&self, ip: &str) -> Result<Option<NetworkConfigRow>, StoreError> {
        Ok(self.inner.lock().unwrap().config_by_ip(ip))
    }

    async fn configs_active(&self) -> Result<Vec<NetworkConfigRow>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.configs.iter().filter(|c| !c.deleted).cloned().collect())
    }

    async fn configs_by_dhcp(&self, enabled: bool) -> Result<Vec<NetworkConfigRow>, StoreError> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .configs
            .iter()
            .filter(|c| !c.deleted && c.dhcp_enabled == enabled)
            .cloned()
            .collect())
    }

    async fn config_for_device(
        &self,
        device_id: i64,
    ) -> Result<Option<NetworkConfigRow>, StoreError> {
        Ok(self.inner.lock().unwrap().config_for_device(device_id))
    }
}

// ---------------------------------------------------------------------------
// MemoryStoreTx
// ---------------------------------------------------------------------------

struct MemoryStoreTx {
    shared: Arc<Mutex<Tables>>,
    staged: Tables,
}

#[async_trait]
impl StoreTx for MemoryStoreTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.shared.lock().unwrap() = self.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Dropping the staged tables is the rollback.
        Ok(())
    }

    async fn device_by_id(&mut self, id: i64) -> Result<Option<DeviceRow>, StoreError> {
        Ok(self.staged.device_by_id(id))
    }

    async fn device_by_serial(
        &mut self,
        serial: &str,
    ) -> Result<Option<DeviceRow>, StoreError> {
        Ok(self.staged.device_by_serial(serial))
    }

    async fn config_by_id(&mut self, id: i64) -> Result<Option<NetworkConfigRow>, StoreError> {
        Ok(self.staged.config_by_id(id))
    }

    async fn config_by_ip(&mut self, ip: &str) -> Result<Option<NetworkConfigRow>, StoreError> {
        Ok(self.staged.config_by_ip(ip))
    }

    async fn config_for_device(
        &mut self,
        device_id: i64,
    ) -> Result<Option<NetworkConfigRow>, StoreError> {
        Ok(self.staged.config_for_device(device_id))
    }

    async fn config_linked_to_active_device(&mut self, id: i64) -> Result<bool, StoreError> {
        let config = match self.staged.configs.iter().find(|c| c.id == id) {
            Some(config) => config,
            None => return Ok(false),
        };
        let linked = match config.device_id {
            Some(device_id) => self
                .staged
                .devices
                .iter()
                .any(|d| d.id == device_id && !d.deleted),
            None => false,
        };
        Ok(linked)
    }

    async fn create_device(&mut self, row: &NewDeviceRow) -> Result<DeviceRow, StoreError> {
        if self.staged.serial_taken(&row.serial, None) {
            return Err(unique(SERIAL_IDX));
        }
        self.staged.next_device_id += 1;
        let stored = DeviceRow {
            id: self.staged.next_device_id,
            deleted: false,
            serial: row.serial.clone(),
            model: row.model.clone(),
            location: row.location.clone(),
            firmware_version: row.firmware_version.clone(),
            created_at: Utc::now(),
        };
        self.staged.devices.push(stored.clone());
        Ok(stored)
    }

    async fn create_config(
        &mut self,
        row: &NewNetworkConfigRow,
    ) -> Result<NetworkConfigRow, StoreError> {
        if !row.dhcp_enabled && row.ip == DHCP_PLACEHOLDER {
            return Err(StoreError::Check {
                constraint: Some(STATIC_IP_CHECK.to_owned()),
            });
        }
        if !row.dhcp_enabled && self.staged.ip_taken(&row.ip, None) {
            return Err(unique(IP_IDX));
        }
        if let Some(device_id) = row.device_id {
            if !self.staged.devices.iter().any(|d| d.id == device_id) {
                return Err(StoreError::ForeignKey {
                    constraint: Some("network_configs_device_id_fkey".to_owned()),
                });
            }
        }
        self.staged.next_config_id += 1;
        let stored = NetworkConfigRow {
            id: self.staged.next_config_id,
            deleted: false,
            ip: row.ip.clone(),
            subnet_mask: row.subnet_mask.clone(),
            gateway: row.gateway.clone(),
            primary_dns: row.primary_dns.clone(),
            dhcp_enabled: row.dhcp_enabled,
            device_id: row.device_id,
            created_at: Utc::now(),
        };
        self.staged.configs.push(stored.clone());
        Ok(stored)
    }

    async fn update_device(
        &mut self,
        id: i64,
        changes: &DeviceChanges,
    ) -> Result<u64, StoreError> {
        if self.staged.serial_taken(&changes.serial, Some(id)) {
            return Err(unique(SERIAL_IDX));
        }
        match self
            .staged
            .devices
            .iter_mut()
            .find(|d| d.id == id && !d.deleted)
        {
            Some(stored) => {
                stored.serial = changes.serial.clone();
                stored.model = changes.model.clone();
                stored.location = changes.location.clone();
                stored.firmware_version = changes.firmware_version.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_config(
        &mut self,
        id: i64,
        changes: &NetworkConfigChanges,
    ) -> Result<u64, StoreError> {
        if !changes.dhcp_enabled && changes.ip == DHCP_PLACEHOLDER {
            return Err(StoreError::Check {
                constraint: Some(STATIC_IP_CHECK.to_owned()),
            });
        }
        if !changes.dhcp_enabled && self.staged.ip_taken(&changes.ip, Some(id)) {
            return Err(unique(IP_IDX));
        }
        match self
            .staged
            .configs
            .iter_mut()
            .find(|c| c.id == id && !c.deleted)
        {
            Some(stored) => {
                stored.ip = changes.ip.clone();
                stored.subnet_mask = changes.subnet_mask.clone();
                stored.gateway = changes.gateway.clone();
                stored.primary_dns = changes.primary_dns.clone();
                stored.dhcp_enabled = changes.dhcp_enabled;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn soft_delete_device(&mut self, id: i64) -> Result<u64, StoreError> {
        match self
            .staged
            .devices
            .iter_mut()
            .find(|d| d.id == id && !d.deleted)
        {
            Some(stored) => {
                stored.deleted = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn soft_delete_config(&mut self, id: i64) -> Result<u64, StoreError> {
        match self
            .staged
            .configs
            .iter_mut()
            .find(|c| c.id == id && !c.deleted)
        {
            Some(stored) => {
                stored.deleted = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_device(serial: &str) -> NewDeviceRow {
        NewDeviceRow {
            serial: serial.to_owned(),
            model: "SENSOR-X".to_owned(),
            location: "Lab 1".to_owned(),
            firmware_version: None,
        }
    }

    #[tokio::test]
    async fn commit_makes_staged_rows_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let row = tx.create_device(&new_device("ABC-1234")).await.unwrap();
        assert_eq!(row.id, 1);

        // Not visible before commit.
        assert!(store.device_by_id(row.id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        assert!(store.device_by_id(row.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dropping_a_transaction_discards_its_writes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.create_device(&new_device("ABC-1234")).await.unwrap();
        }
        assert!(store.devices_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_serial_reports_the_unique_index() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_device(&new_device("ABC-1234")).await.unwrap();
        let err = tx.create_device(&new_device("ABC-1234")).await.unwrap_err();
        match err {
            StoreError::Unique { constraint } => {
                assert_eq!(constraint.as_deref(), Some(SERIAL_IDX));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn soft_deleted_serial_can_be_reused() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let row = tx.create_device(&new_device("ABC-1234")).await.unwrap();
        tx.soft_delete_device(row.id).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let second = tx.create_device(&new_device("ABC-1234")).await.unwrap();
        assert_ne!(second.id, row.id);
    }
}
