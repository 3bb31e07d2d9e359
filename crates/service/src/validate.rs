//! Pure validation helpers.
//!
//! No I/O: every function checks one rule and fails with
//! [`ServiceError::Validation`] on the first violation.  Entity-level
//! validation normalizes serial and model (trim + uppercase, idempotent)
//! before checking formats, so what gets stored is what was validated.

use std::net::Ipv4Addr;

use crate::models::{Device, NetworkConfig, DHCP_PLACEHOLDER};
use crate::ServiceError;

const SERIAL_MAX: usize = 50;
const MODEL_MAX: usize = 50;
const LOCATION_MAX: usize = 120;

fn invalid(message: impl Into<String>) -> ServiceError {
    ServiceError::Validation(message.into())
}

/// Trim and uppercase.
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

pub fn non_empty(value: &str, field: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("field '{field}' must not be empty")));
    }
    Ok(())
}

pub fn length(value: &str, field: &str, min: usize, max: usize) -> Result<(), ServiceError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(invalid(format!(
            "field '{field}' must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

/// Dotted-quad IPv4 with every octet in [0, 255].  Leading zeros are
/// rejected, as the std parser refuses them.
pub fn ipv4(value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(invalid("IP address must not be empty"));
    }
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| invalid(format!("invalid IPv4 address: {value}")))
}

/// Device serial: exactly 3 uppercase letters, a hyphen, 4 uppercase
/// alphanumerics (e.g. `SER-A001`).
pub fn serial(value: &str) -> Result<(), ServiceError> {
    non_empty(value, "serial")?;
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 8
        && bytes[..3].iter().all(u8::is_ascii_uppercase)
        && bytes[3] == b'-'
        && bytes[4..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    if !well_formed {
        return Err(invalid(format!(
            "invalid serial format: {value}, expected XXX-XXXX (e.g. SER-A001)"
        )));
    }
    Ok(())
}

/// Firmware version: `v` followed by three dot-separated non-negative
/// integers (e.g. `v1.2.3`).  Only called for non-empty values.
pub fn firmware(value: &str) -> Result<(), ServiceError> {
    let well_formed = value.strip_prefix('v').is_some_and(|rest| {
        let parts: Vec<&str> = rest.split('.').collect();
        parts.len() == 3
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
    });
    if !well_formed {
        return Err(invalid(format!(
            "invalid firmware version format: {value}, expected vX.Y.Z (e.g. v1.2.3)"
        )));
    }
    Ok(())
}

/// DHCP coherence: a static configuration must carry a real address, not
/// the placeholder.
pub fn dhcp_coherence(dhcp_enabled: bool, ip: &str) -> Result<(), ServiceError> {
    if !dhcp_enabled && (ip.trim().is_empty() || ip == DHCP_PLACEHOLDER) {
        return Err(invalid(
            "a valid IP address is required when DHCP is disabled",
        ));
    }
    Ok(())
}

/// A persisted entity's id: present and positive.
pub fn id(value: Option<i64>) -> Result<i64, ServiceError> {
    match value {
        Some(id) if id > 0 => Ok(id),
        other => Err(invalid(format!("invalid id: {other:?}"))),
    }
}

/// Validate a device, consuming and returning it with serial and model
/// normalized.
pub fn device(mut device: Device) -> Result<Device, ServiceError> {
    non_empty(&device.serial, "serial")?;
    non_empty(&device.model, "model")?;
    non_empty(&device.location, "location")?;

    device.serial = normalize(&device.serial);
    device.model = normalize(&device.model);

    serial(&device.serial)?;
    if let Some(firmware_version) = &device.firmware_version {
        if !firmware_version.is_empty() {
            firmware(firmware_version)?;
        }
    }

    length(&device.serial, "serial", 1, SERIAL_MAX)?;
    length(&device.model, "model", 1, MODEL_MAX)?;
    length(&device.location, "location", 1, LOCATION_MAX)?;

    Ok(device)
}

/// Validate a network configuration, consuming and returning it.  When
/// DHCP is enabled, all four address fields are canonicalized to the
/// placeholder; when disabled, `ip` must be a real IPv4 address and the
/// remaining fields must be valid whenever they hold a non-placeholder
/// value.
pub fn config(mut config: NetworkConfig) -> Result<NetworkConfig, ServiceError> {
    dhcp_coherence(config.dhcp_enabled, &config.ip)?;

    if config.dhcp_enabled {
        config.ip = DHCP_PLACEHOLDER.to_owned();
        config.subnet_mask = DHCP_PLACEHOLDER.to_owned();
        config.gateway = DHCP_PLACEHOLDER.to_owned();
        config.primary_dns = DHCP_PLACEHOLDER.to_owned();
        return Ok(config);
    }

    ipv4(&config.ip)?;
    for field in [&config.subnet_mask, &config.gateway, &config.primary_dns] {
        if !field.is_empty() && field != DHCP_PLACEHOLDER {
            ipv4(field)?;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_accepts_dotted_quads_in_range() {
        for ok in ["0.0.0.0", "192.168.1.10", "255.255.255.255", "10.0.0.1"] {
            assert!(ipv4(ok).is_ok(), "{ok} should be valid");
        }
    }

    #[test]
    fn ipv4_rejects_out_of_range_octets_and_leading_zeros() {
        for bad in [
            "256.1.1.1",
            "192.168.01.1",
            "1.2.3",
            "1.2.3.4.5",
            "a.b.c.d",
            "",
            "192.168.1.",
        ] {
            assert!(ipv4(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn serial_pattern_is_three_letters_hyphen_four_alnums() {
        assert!(serial("SER-A001").is_ok());
        assert!(serial("ABC-1234").is_ok());
        for bad in [
            "ser-a001", // lowercase
            "SE-A001",  // too few letters
            "SERA001",  // missing hyphen
            "SER-A01",  // too short tail
            "SER-A0011",
            "S3R-A001", // digit in the letter block
            "",
        ] {
            assert!(serial(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn firmware_pattern_is_v_and_three_numbers() {
        assert!(firmware("v1.2.3").is_ok());
        assert!(firmware("v10.0.255").is_ok());
        for bad in ["1.2.3", "v1.2", "v1.2.3.4", "va.b.c", "v1..3", "v"] {
            assert!(firmware(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn length_bounds_are_inclusive() {
        assert!(length("ab", "field", 1, 2).is_ok());
        assert!(length("abc", "field", 1, 2).is_err());
        assert!(length("", "field", 1, 2).is_err());
    }

    #[test]
    fn dhcp_coherence_rejects_placeholder_in_static_mode() {
        assert!(dhcp_coherence(false, "0.0.0.0").is_err());
        assert!(dhcp_coherence(false, "").is_err());
        assert!(dhcp_coherence(false, "10.0.0.1").is_ok());
        // With DHCP on, the placeholder is expected.
        assert!(dhcp_coherence(true, "0.0.0.0").is_ok());
        assert!(dhcp_coherence(true, "").is_ok());
    }

    #[test]
    fn id_requires_a_positive_value() {
        assert_eq!(id(Some(7)).unwrap(), 7);
        assert!(id(Some(0)).is_err());
        assert!(id(Some(-3)).is_err());
        assert!(id(None).is_err());
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("  abc-1234 ");
        assert_eq!(once, "ABC-1234");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn device_validation_normalizes_serial_and_model() {
        let device = Device::new(" abc-1234 ", "sensor-x", "Lab 1", None);
        let device = super::device(device).unwrap();
        assert_eq!(device.serial, "ABC-1234");
        assert_eq!(device.model, "SENSOR-X");
        // Location is free text, left untouched.
        assert_eq!(device.location, "Lab 1");
    }

    #[test]
    fn device_validation_fails_fast_on_missing_fields() {
        let err = super::device(Device::new("", "m", "loc", None)).unwrap_err();
        match err {
            ServiceError::Validation(msg) => assert!(msg.contains("serial")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn dhcp_config_is_canonicalized_to_placeholders() {
        let mut config = NetworkConfig::new_static("192.168.1.10", "", "", "");
        config.dhcp_enabled = true;
        let config = super::config(config).unwrap();
        assert_eq!(config.ip, DHCP_PLACEHOLDER);
        assert_eq!(config.subnet_mask, DHCP_PLACEHOLDER);
        assert_eq!(config.gateway, DHCP_PLACEHOLDER);
        assert_eq!(config.primary_dns, DHCP_PLACEHOLDER);
    }

    #[test]
    fn static_config_allows_placeholder_secondary_fields() {
        let config =
            NetworkConfig::new_static("192.168.1.10", "0.0.0.0", "", "8.8.8.8");
        assert!(super::config(config).is_ok());
    }

    #[test]
    fn static_config_rejects_malformed_secondary_fields() {
        let config =
            NetworkConfig::new_static("192.168.1.10", "255.255.255.0", "not-an-ip", "8.8.8.8");
        assert!(super::config(config).is_err());
    }
}
