//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `service` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// devices
// ---------------------------------------------------------------------------

/// A persisted device row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DeviceRow {
    pub id: i64,
    pub deleted: bool,
    pub serial: String,
    pub model: String,
    pub location: String,
    pub firmware_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Column values for a device about to be inserted.  The id and
/// `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDeviceRow {
    pub serial: String,
    pub model: String,
    pub location: String,
    pub firmware_version: Option<String>,
}

/// The mutable columns of a device, for updates.  `deleted` is only ever
/// set through the soft-delete statements.
#[derive(Debug, Clone)]
pub struct DeviceChanges {
    pub serial: String,
    pub model: String,
    pub location: String,
    pub firmware_version: Option<String>,
}

// ---------------------------------------------------------------------------
// network_configs
// ---------------------------------------------------------------------------

/// A persisted network configuration row.
///
/// `device_id` is the inverse foreign key of the one-to-one association;
/// it is only ever set through the composite provisioning path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NetworkConfigRow {
    pub id: i64,
    pub deleted: bool,
    pub ip: String,
    pub subnet_mask: String,
    pub gateway: String,
    pub primary_dns: String,
    pub dhcp_enabled: bool,
    pub device_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Column values for a network configuration about to be inserted.
#[derive(Debug, Clone)]
pub struct NewNetworkConfigRow {
    pub ip: String,
    pub subnet_mask: String,
    pub gateway: String,
    pub primary_dns: String,
    pub dhcp_enabled: bool,
    pub device_id: Option<i64>,
}

/// The mutable columns of a network configuration, for updates.
/// `device_id` is deliberately absent: the association is set only through
/// the composite provisioning path, and `deleted` only through soft-delete.
#[derive(Debug, Clone)]
pub struct NetworkConfigChanges {
    pub ip: String,
    pub subnet_mask: String,
    pub gateway: String,
    pub primary_dns: String,
    pub dhcp_enabled: bool,
}
