//! Integration-style tests for both services.
//!
//! These run against the in-memory store so no real Postgres connection
//! is required; the Postgres-backed store shares the exact same `Store`
//! contract and constraint names.

use std::sync::Arc;

use db::MemoryStore;

use crate::models::{Device, NetworkConfig, DHCP_PLACEHOLDER};
use crate::{ConfigService, DeviceService, ServiceError};

/// Both services wired to one shared in-memory store.
fn services() -> (DeviceService, ConfigService) {
    let store = Arc::new(MemoryStore::new());
    (
        DeviceService::new(store.clone()),
        ConfigService::new(store),
    )
}

fn lab_device(serial: &str) -> Device {
    Device::new(serial, "sensor-x", "Lab 1", None)
}

fn static_config(ip: &str) -> NetworkConfig {
    NetworkConfig::new_static(ip, "255.255.255.0", "192.168.1.1", "8.8.8.8")
}

fn assert_duplicate(err: ServiceError) {
    assert!(
        matches!(err, ServiceError::Duplicate(_)),
        "expected Duplicate, got {err:?}"
    );
}

fn assert_not_found(err: ServiceError) {
    assert!(
        matches!(err, ServiceError::NotFound(_)),
        "expected NotFound, got {err:?}"
    );
}

fn assert_validation(err: ServiceError) {
    assert!(
        matches!(err, ServiceError::Validation(_)),
        "expected Validation, got {err:?}"
    );
}

// ============================================================
// Device CRUD
// ============================================================

#[tokio::test]
async fn inserted_device_round_trips_through_get_by_id() {
    let (devices, _) = services();

    let created = devices.insert(lab_device("abc-1234")).await.unwrap();
    let id = created.id.expect("insert must assign an id");

    let fetched = devices.get_by_id(id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.serial, "ABC-1234"); // normalized
    assert_eq!(fetched.model, "SENSOR-X");
    assert!(!fetched.deleted);
    assert!(fetched.config.is_none());
}

#[tokio::test]
async fn second_device_with_same_normalized_serial_is_rejected() {
    let (devices, _) = services();

    devices.insert(lab_device("ABC-1234")).await.unwrap();
    let err = devices.insert(lab_device("  abc-1234 ")).await.unwrap_err();
    assert_duplicate(err);

    // Nothing was persisted by the failed attempt.
    assert_eq!(devices.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_device_never_reaches_the_store() {
    let (devices, _) = services();

    let err = devices.insert(lab_device("not-a-serial")).await.unwrap_err();
    assert_validation(err);

    let err = devices
        .insert(Device::new("ABC-1234", "sensor-x", "Lab 1", Some("1.2.3".into())))
        .await
        .unwrap_err();
    assert_validation(err);

    assert!(devices.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_changes_fields_but_refuses_a_taken_serial() {
    let (devices, _) = services();

    let first = devices.insert(lab_device("ABC-1234")).await.unwrap();
    devices.insert(lab_device("XYZ-0001")).await.unwrap();

    let mut changed = first.clone();
    changed.location = "Lab 2".to_owned();
    changed.firmware_version = Some("v1.2.3".to_owned());
    devices.update(changed).await.unwrap();

    let fetched = devices.get_by_id(first.id.unwrap()).await.unwrap();
    assert_eq!(fetched.location, "Lab 2");
    assert_eq!(fetched.firmware_version.as_deref(), Some("v1.2.3"));

    // Steal the other device's serial: rejected.
    let mut stolen = fetched;
    stolen.serial = "XYZ-0001".to_owned();
    assert_duplicate(devices.update(stolen).await.unwrap_err());

    // Keeping one's own serial is fine.
    let same = devices.get_by_id(first.id.unwrap()).await.unwrap();
    devices.update(same).await.unwrap();
}

#[tokio::test]
async fn update_of_a_missing_or_deleted_device_is_not_found() {
    let (devices, _) = services();

    let mut ghost = lab_device("ABC-1234");
    ghost.id = Some(42);
    assert_not_found(devices.update(ghost).await.unwrap_err());

    let created = devices.insert(lab_device("ABC-1234")).await.unwrap();
    devices.delete(created.id.unwrap()).await.unwrap();
    assert_not_found(devices.update(created).await.unwrap_err());
}

#[tokio::test]
async fn deleted_device_disappears_from_all_read_paths() {
    let (devices, _) = services();

    let created = devices.insert(lab_device("ABC-1234")).await.unwrap();
    let id = created.id.unwrap();
    devices.delete(id).await.unwrap();

    assert!(devices.get_all().await.unwrap().is_empty());
    assert_not_found(devices.get_by_id(id).await.unwrap_err());
    assert_not_found(devices.find_by_serial("ABC-1234").await.unwrap_err());
    // Deleting twice is the same as deleting a missing device.
    assert_not_found(devices.delete(id).await.unwrap_err());
}

#[tokio::test]
async fn find_by_location_matches_substrings_case_insensitively() {
    let (devices, _) = services();

    devices
        .insert(Device::new("ABC-0001", "cam", "Building A / Floor 2", None))
        .await
        .unwrap();
    devices
        .insert(Device::new("ABC-0002", "cam", "Building B", None))
        .await
        .unwrap();

    let hits = devices.find_by_location("floor").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].serial, "ABC-0001");

    assert!(devices.find_by_location("basement").await.unwrap().is_empty());
}

// ============================================================
// Configuration CRUD
// ============================================================

#[tokio::test]
async fn static_config_with_placeholder_ip_is_rejected() {
    let (_, configs) = services();

    let err = configs
        .insert(static_config(DHCP_PLACEHOLDER))
        .await
        .unwrap_err();
    assert_validation(err);
    assert!(configs.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn ip_uniqueness_applies_only_to_static_configs() {
    let (_, configs) = services();

    configs.insert(static_config("192.168.1.10")).await.unwrap();
    assert_duplicate(
        configs
            .insert(static_config("192.168.1.10"))
            .await
            .unwrap_err(),
    );

    // Any number of DHCP configs may coexist on the placeholder address.
    configs.insert(NetworkConfig::new_dhcp()).await.unwrap();
    configs.insert(NetworkConfig::new_dhcp()).await.unwrap();

    assert_eq!(configs.find_by_dhcp(true).await.unwrap().len(), 2);
    assert_eq!(configs.find_by_dhcp(false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn config_update_rechecks_uniqueness_excluding_itself() {
    let (_, configs) = services();

    let first = configs.insert(static_config("10.0.0.1")).await.unwrap();
    configs.insert(static_config("10.0.0.2")).await.unwrap();

    // Re-saving itself under its own ip is fine.
    configs.update(first.clone()).await.unwrap();

    // Moving onto the other config's ip is not.
    let mut moved = first.clone();
    moved.ip = "10.0.0.2".to_owned();
    assert_duplicate(configs.update(moved).await.unwrap_err());

    // Moving to a free ip works.
    let mut moved = first;
    moved.ip = "10.0.0.3".to_owned();
    let updated = configs.update(moved).await.unwrap();
    assert_eq!(updated.ip, "10.0.0.3");
    assert_not_found(configs.find_by_ip("10.0.0.1").await.unwrap_err());
}

#[tokio::test]
async fn standalone_config_can_be_deleted() {
    let (_, configs) = services();

    let created = configs.insert(static_config("10.0.0.1")).await.unwrap();
    configs.delete(created.id.unwrap()).await.unwrap();

    assert!(configs.get_all().await.unwrap().is_empty());
    assert_not_found(configs.get_by_id(created.id.unwrap()).await.unwrap_err());
}

// ============================================================
// Composite provisioning and the one-to-one association
// ============================================================

#[tokio::test]
async fn provisioning_links_config_and_device_atomically() {
    let (devices, configs) = services();

    let device = devices
        .insert_with_config(lab_device("ABC-1234"), static_config("192.168.1.10"))
        .await
        .unwrap();

    let device_id = device.id.unwrap();
    let config = device.config.expect("config must be attached");
    assert_eq!(config.device_id, Some(device_id));

    // Visible through both services, association intact.
    let fetched = devices.get_by_id(device_id).await.unwrap();
    assert_eq!(fetched.config.as_ref().unwrap().id, config.id);
    let fetched_config = configs.get_by_id(config.id.unwrap()).await.unwrap();
    assert_eq!(fetched_config.device_id, Some(device_id));
}

#[tokio::test]
async fn failed_provisioning_leaves_no_device_behind() {
    let (devices, configs) = services();

    configs.insert(static_config("192.168.1.10")).await.unwrap();

    let err = devices
        .insert_with_config(lab_device("NEW-0001"), static_config("192.168.1.10"))
        .await
        .unwrap_err();
    assert_duplicate(err);

    // The transaction never committed, so the registry is unchanged.
    assert_not_found(devices.find_by_serial("NEW-0001").await.unwrap_err());
    assert!(devices.get_all().await.unwrap().is_empty());
    assert_eq!(configs.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_device_cascades_to_its_config() {
    let (devices, configs) = services();

    let device = devices
        .insert_with_config(lab_device("ABC-1234"), static_config("192.168.1.10"))
        .await
        .unwrap();
    let config_id = device.config.unwrap().id.unwrap();

    devices.delete(device.id.unwrap()).await.unwrap();

    assert!(devices.get_all().await.unwrap().is_empty());
    assert_not_found(configs.get_by_id(config_id).await.unwrap_err());
    // The cascaded delete frees the ip for reuse.
    configs.insert(static_config("192.168.1.10")).await.unwrap();
}

#[tokio::test]
async fn config_linked_to_an_active_device_cannot_be_deleted_directly() {
    let (devices, configs) = services();

    let device = devices
        .insert_with_config(lab_device("ABC-1234"), static_config("192.168.1.10"))
        .await
        .unwrap();
    let config_id = device.config.unwrap().id.unwrap();

    assert_validation(configs.delete(config_id).await.unwrap_err());

    // The guard left the configuration untouched.
    let still_there = configs.get_by_id(config_id).await.unwrap();
    assert!(!still_there.deleted);

    // Once the owning device is gone the association no longer guards
    // anything; the cascade already removed the configuration.
    devices.delete(device.id.unwrap()).await.unwrap();
    assert_not_found(configs.delete(config_id).await.unwrap_err());
}

// ============================================================
// End-to-end scenario
// ============================================================

#[tokio::test]
async fn registry_scenario_end_to_end() {
    let (devices, configs) = services();

    let device = devices
        .insert(Device::new("ABC-1234", "sensor-x", "Lab 1", None))
        .await
        .unwrap();
    assert_eq!(device.id, Some(1));

    assert_duplicate(
        devices
            .insert(Device::new("ABC-1234", "sensor-y", "Lab 2", None))
            .await
            .unwrap_err(),
    );

    let config = configs.insert(static_config("192.168.1.10")).await.unwrap();
    assert_eq!(config.id, Some(1));

    assert_duplicate(
        configs
            .insert(static_config("192.168.1.10"))
            .await
            .unwrap_err(),
    );

    configs.delete(config.id.unwrap()).await.unwrap();
    devices.delete(device.id.unwrap()).await.unwrap();

    assert!(devices.get_all().await.unwrap().is_empty());
    assert!(configs.get_all().await.unwrap().is_empty());
}
