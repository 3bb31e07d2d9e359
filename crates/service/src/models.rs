//! Domain entities.
//!
//! These are what callers construct and what the services hand back.
//! Persistence rows live in the `db` crate; the conversions between the
//! two are kept here so row layout never leaks past the service layer.
//!
//! `Device` → `NetworkConfig` is a unidirectional one-to-one: the device
//! owns an optional configuration, the configuration never points back —
//! it only carries the owning device's id as a foreign key for lookup.

use serde::{Deserialize, Serialize};

use db::models::{
    DeviceChanges, DeviceRow, NetworkConfigChanges, NetworkConfigRow, NewDeviceRow,
    NewNetworkConfigRow,
};

/// The address all four network fields take when DHCP is enabled, and
/// which is invalid as a static ip.
pub const DHCP_PLACEHOLDER: &str = "0.0.0.0";

/// An IoT device.  `id` is `None` until the store assigns one on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<i64>,
    pub serial: String,
    pub model: String,
    pub location: String,
    pub firmware_version: Option<String>,
    pub deleted: bool,
    /// Populated on reads via the inverse foreign key lookup.
    pub config: Option<NetworkConfig>,
}

impl Device {
    pub fn new(
        serial: impl Into<String>,
        model: impl Into<String>,
        location: impl Into<String>,
        firmware_version: Option<String>,
    ) -> Self {
        Self {
            id: None,
            serial: serial.into(),
            model: model.into(),
            location: location.into(),
            firmware_version,
            deleted: false,
            config: None,
        }
    }

    pub(crate) fn to_new_row(&self) -> NewDeviceRow {
        NewDeviceRow {
            serial: self.serial.clone(),
            model: self.model.clone(),
            location: self.location.clone(),
            firmware_version: self.firmware_version.clone(),
        }
    }

    pub(crate) fn to_changes(&self) -> DeviceChanges {
        DeviceChanges {
            serial: self.serial.clone(),
            model: self.model.clone(),
            location: self.location.clone(),
            firmware_version: self.firmware_version.clone(),
        }
    }
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: Some(row.id),
            serial: row.serial,
            model: row.model,
            location: row.location,
            firmware_version: row.firmware_version,
            deleted: row.deleted,
            config: None,
        }
    }
}

/// A device's network configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub id: Option<i64>,
    pub ip: String,
    pub subnet_mask: String,
    pub gateway: String,
    pub primary_dns: String,
    pub dhcp_enabled: bool,
    pub deleted: bool,
    /// Foreign key to the owning device; set only through the composite
    /// provisioning path.
    pub device_id: Option<i64>,
}

impl NetworkConfig {
    /// A static-addressing configuration.
    pub fn new_static(
        ip: impl Into<String>,
        subnet_mask: impl Into<String>,
        gateway: impl Into<String>,
        primary_dns: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            ip: ip.into(),
            subnet_mask: subnet_mask.into(),
            gateway: gateway.into(),
            primary_dns: primary_dns.into(),
            dhcp_enabled: false,
            deleted: false,
            device_id: None,
        }
    }

    /// A DHCP configuration; all address fields hold the placeholder.
    pub fn new_dhcp() -> Self {
        Self {
            id: None,
            ip: DHCP_PLACEHOLDER.to_owned(),
            subnet_mask: DHCP_PLACEHOLDER.to_owned(),
            gateway: DHCP_PLACEHOLDER.to_owned(),
            primary_dns: DHCP_PLACEHOLDER.to_owned(),
            dhcp_enabled: true,
            deleted: false,
            device_id: None,
        }
    }

    pub(crate) fn to_new_row(&self) -> NewNetworkConfigRow {
        NewNetworkConfigRow {
            ip: self.ip.clone(),
            subnet_mask: self.subnet_mask.clone(),
            gateway: self.gateway.clone(),
            primary_dns: self.primary_dns.clone(),
            dhcp_enabled: self.dhcp_enabled,
            device_id: self.device_id,
        }
    }

    pub(crate) fn to_changes(&self) -> NetworkConfigChanges {
        NetworkConfigChanges {
            ip: self.ip.clone(),
            subnet_mask: self.subnet_mask.clone(),
            gateway: self.gateway.clone(),
            primary_dns: self.primary_dns.clone(),
            dhcp_enabled: self.dhcp_enabled,
        }
    }
}

impl From<NetworkConfigRow> for NetworkConfig {
    fn from(row: NetworkConfigRow) -> Self {
        Self {
            id: Some(row.id),
            ip: row.ip,
            subnet_mask: row.subnet_mask,
            gateway: row.gateway,
            primary_dns: row.primary_dns,
            dhcp_enabled: row.dhcp_enabled,
            deleted: row.deleted,
            device_id: row.device_id,
        }
    }
}
