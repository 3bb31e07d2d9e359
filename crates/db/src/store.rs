//! The `Store` / `StoreTx` traits — the contract the service layer
//! consumes.
//!
//! Defined here (in the db crate) so both backends and the service crate
//! can import them without a circular dependency.  Every lookup is scoped
//! to *active* rows: a soft-deleted record is indistinguishable from a
//! missing one at this boundary.

use async_trait::async_trait;

use crate::models::{
    DeviceChanges, DeviceRow, NetworkConfigChanges, NetworkConfigRow, NewDeviceRow,
    NewNetworkConfigRow,
};
use crate::StoreError;

/// A handle to the backing store.
///
/// Read-only operations run directly against the store without an
/// explicit transaction.  Mutations go through [`Store::begin`] and the
/// returned [`StoreTx`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction.  Dropping the handle without committing rolls
    /// the transaction back, so every exit path releases the resource.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn device_by_id(&self, id: i64) -> Result<Option<DeviceRow>, StoreError>;
    async fn device_by_serial(&self, serial: &str) -> Result<Option<DeviceRow>, StoreError>;
    async fn devices_active(&self) -> Result<Vec<DeviceRow>, StoreError>;
    /// Substring match on location.
    async fn devices_by_location(&self, needle: &str) -> Result<Vec<DeviceRow>, StoreError>;

    async fn config_by_id(&self, id: i64) -> Result<Option<NetworkConfigRow>, StoreError>;
    async fn config_by_ip(&self, ip: &str) -> Result<Option<NetworkConfigRow>, StoreError>;
    async fn configs_active(&self) -> Result<Vec<NetworkConfigRow>, StoreError>;
    async fn configs_by_dhcp(&self, enabled: bool) -> Result<Vec<NetworkConfigRow>, StoreError>;
    /// The configuration owned by the given device, resolved through the
    /// inverse foreign key.
    async fn config_for_device(
        &self,
        device_id: i64,
    ) -> Result<Option<NetworkConfigRow>, StoreError>;
}

/// One open transaction.  All statements issued through a `StoreTx`
/// become visible together on [`StoreTx::commit`] or not at all.
#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;

    // -- transactional reads --------------------------------------------

    async fn device_by_id(&mut self, id: i64) -> Result<Option<DeviceRow>, StoreError>;
    async fn device_by_serial(&mut self, serial: &str)
        -> Result<Option<DeviceRow>, StoreError>;
    async fn config_by_id(&mut self, id: i64) -> Result<Option<NetworkConfigRow>, StoreError>;
    async fn config_by_ip(&mut self, ip: &str) -> Result<Option<NetworkConfigRow>, StoreError>;
    async fn config_for_device(
        &mut self,
        device_id: i64,
    ) -> Result<Option<NetworkConfigRow>, StoreError>;
    /// Whether the configuration is currently referenced by a non-deleted
    /// device (the referential guard for direct config deletion).
    async fn config_linked_to_active_device(&mut self, id: i64) -> Result<bool, StoreError>;

    // -- mutations ------------------------------------------------------

    /// Insert a device and return the stored row with its assigned id.
    async fn create_device(&mut self, row: &NewDeviceRow) -> Result<DeviceRow, StoreError>;
    /// Insert a configuration and return the stored row with its assigned id.
    async fn create_config(
        &mut self,
        row: &NewNetworkConfigRow,
    ) -> Result<NetworkConfigRow, StoreError>;
    /// Update the mutable columns of a device; returns the affected count.
    async fn update_device(&mut self, id: i64, changes: &DeviceChanges)
        -> Result<u64, StoreError>;
    /// Update the mutable columns of a configuration; returns the affected
    /// count.
    async fn update_config(
        &mut self,
        id: i64,
        changes: &NetworkConfigChanges,
    ) -> Result<u64, StoreError>;
    async fn soft_delete_device(&mut self, id: i64) -> Result<u64, StoreError>;
    async fn soft_delete_config(&mut self, id: i64) -> Result<u64, StoreError>;
}
