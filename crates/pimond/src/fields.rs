//! Derived fields over parsed qmicli results.
//!
//! Pure functions: a missing key anywhere on a path gives `None`. That is an
//! expected outcome (tool revisions reword things) and is not logged.

use pimon_common::{leading_number, Mapping, Value};
use tracing::debug;

/// Top-level key qmicli prints above the serving-system fields.
pub const SERVING_SYSTEM_WRAPPER: &str = "Successfully got serving system";

/// Radio technology label: the first key of the signal-info result.
pub fn connection_type(signal_info: &Mapping) -> Option<String> {
    signal_info.first().map(|(key, _)| key.to_string())
}

/// Measurements nested under the radio technology label.
pub fn connection_data(signal_info: &Mapping) -> Option<&Mapping> {
    signal_info.first().and_then(|(_, value)| value.as_map())
}

/// Field block of the serving-system result.
///
/// Reads under [`SERVING_SYSTEM_WRAPPER`] when present and falls back to the
/// top level, so a reworded or stripped banner does not blank every field.
pub fn serving_fields(serving_system: &Mapping) -> &Mapping {
    match serving_system.get(SERVING_SYSTEM_WRAPPER).and_then(Value::as_map) {
        Some(fields) => fields,
        None => {
            debug!("Serving system wrapper key missing, reading top level");
            serving_system
        }
    }
}

pub fn roaming(serving_system: &Mapping) -> Option<String> {
    serving_str(serving_system, "Roaming status")
}

pub fn location_area_code(serving_system: &Mapping) -> Option<String> {
    serving_str(serving_system, "3GPP location area code")
}

pub fn cell_id(serving_system: &Mapping) -> Option<String> {
    serving_str(serving_system, "3GPP cell ID")
}

pub fn rssi(signal_info: &Mapping) -> Option<String> {
    measurement(signal_info, "RSSI")
}

pub fn snr(signal_info: &Mapping) -> Option<String> {
    measurement(signal_info, "SNR")
}

pub fn rsrq(signal_info: &Mapping) -> Option<String> {
    measurement(signal_info, "RSRQ")
}

pub fn rsrp(signal_info: &Mapping) -> Option<String> {
    measurement(signal_info, "RSRP")
}

fn serving_str(serving_system: &Mapping, key: &str) -> Option<String> {
    serving_fields(serving_system)
        .get_str(&[key])
        .map(str::to_string)
}

/// Numeric part of a `"<number> <unit>"` measurement.
fn measurement(signal_info: &Mapping, key: &str) -> Option<String> {
    let composite = connection_data(signal_info)?.get_str(&[key])?;
    leading_number(composite).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal_info() -> Mapping {
        Mapping::new().with(
            "LTE",
            Mapping::new()
                .with("RSSI", "-71 dBm")
                .with("RSRQ", "-9 dB")
                .with("RSRP", "-98 dBm")
                .with("SNR", "8.4 dB"),
        )
    }

    fn serving_system() -> Mapping {
        Mapping::new().with(
            SERVING_SYSTEM_WRAPPER,
            Mapping::new()
                .with("Roaming status", "off")
                .with("3GPP location area code", "65534")
                .with("3GPP cell ID", "26436874"),
        )
    }

    #[test]
    fn test_signal_fields() {
        let info = signal_info();
        assert_eq!(connection_type(&info).as_deref(), Some("LTE"));
        assert_eq!(rssi(&info).as_deref(), Some("-71"));
        assert_eq!(snr(&info).as_deref(), Some("8.4"));
        assert_eq!(rsrq(&info).as_deref(), Some("-9"));
        assert_eq!(rsrp(&info).as_deref(), Some("-98"));
    }

    #[test]
    fn test_missing_rssi_is_absent() {
        let info = Mapping::new().with("LTE", Mapping::new().with("SNR", "8.4 dB"));
        assert_eq!(rssi(&info), None);
        assert_eq!(snr(&info).as_deref(), Some("8.4"));
    }

    #[test]
    fn test_malformed_composite_is_absent() {
        let info = Mapping::new().with(
            "LTE",
            Mapping::new().with("RSSI", "unknown dBm").with("SNR", ""),
        );
        assert_eq!(rssi(&info), None);
        assert_eq!(snr(&info), None);
    }

    #[test]
    fn test_connection_without_block() {
        let info = Mapping::new().with("LTE", "");
        assert_eq!(connection_type(&info).as_deref(), Some("LTE"));
        assert!(connection_data(&info).is_none());
        assert_eq!(rssi(&info), None);
    }

    #[test]
    fn test_empty_signal_info() {
        let info = Mapping::new();
        assert_eq!(connection_type(&info), None);
        assert_eq!(rssi(&info), None);
    }

    #[test]
    fn test_serving_fields() {
        let serving = serving_system();
        assert_eq!(roaming(&serving).as_deref(), Some("off"));
        assert_eq!(location_area_code(&serving).as_deref(), Some("65534"));
        assert_eq!(cell_id(&serving).as_deref(), Some("26436874"));
    }

    #[test]
    fn test_serving_fields_without_wrapper() {
        let serving = Mapping::new()
            .with("Roaming status", "on")
            .with("3GPP cell ID", "42");
        assert_eq!(roaming(&serving).as_deref(), Some("on"));
        assert_eq!(cell_id(&serving).as_deref(), Some("42"));
        assert_eq!(location_area_code(&serving), None);
    }

    #[test]
    fn test_roaming_not_a_string_is_absent() {
        let serving = Mapping::new().with(
            SERVING_SYSTEM_WRAPPER,
            Mapping::new().with("Roaming status", Mapping::new().with("x", "y")),
        );
        assert_eq!(roaming(&serving), None);
    }
}
