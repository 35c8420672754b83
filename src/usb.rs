//! Removable-device history extractor: the USBSTOR registry tree.
//!
//! Each device instance under `HKLM\SYSTEM\CurrentControlSet\Enum\USBSTOR`
//! carries Windows device property keys holding FILETIME payloads. First
//! install and last arrival are distinct facts and become two events when
//! both exist. Reading this tree requires elevation; a denied open is
//! surfaced as an unreadable store, not an empty one.

use crate::datetime::filetime_to_utc;
use crate::error::ExtractorError;
use crate::extractor::Extractor;
use crate::registry::{self, parse_utf16_string, RegistryReadError, RegistryRoot};
use crate::types::{ActivityEvent, ArtifactSource, Precision};
use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use log::debug;

const USBSTOR_KEY: &str = r"SYSTEM\CurrentControlSet\Enum\USBSTOR";

/// Device property GUID holding install/arrival timestamps
const DEVICE_PROPERTY_GUID: &str = "{83da6326-97a6-4088-9453-a1923f573b29}";

/// Property ids: (key, event subtype)
const PROPERTY_TIMESTAMPS: [(&str, &str); 2] =
    [("0065", "First Install"), ("0066", "Last Arrival")];

/// Decode a REG_FILETIME device property payload (first 8 bytes)
pub fn decode_property_filetime(data: &[u8]) -> Option<DateTime<Utc>> {
    if data.len() < 8 {
        return None;
    }
    let filetime = LittleEndian::read_u64(&data[..8]);
    filetime_to_utc(filetime).ok().map(|n| n.timestamp)
}

/// Pick the device display name: FriendlyName, then DeviceDesc
pub fn device_display_name(values: &[registry::RegistryValue]) -> String {
    for candidate in ["FriendlyName", "DeviceDesc"] {
        if let Some(value) = values.iter().find(|v| v.name == candidate) {
            if let Some(name) = parse_utf16_string(&value.data) {
                return name;
            }
        }
    }
    "Unknown Device".to_string()
}

/// USBSTOR connection-history extractor
pub struct UsbHistoryExtractor;

impl UsbHistoryExtractor {
    fn instance_events(
        &self,
        device_id: &str,
        instance_id: &str,
    ) -> Vec<ActivityEvent> {
        let instance_path = format!("{}\\{}\\{}", USBSTOR_KEY, device_id, instance_id);
        let Ok(instance_key) = registry::read_key(RegistryRoot::LocalMachine, &instance_path)
        else {
            debug!("USBSTOR: skipping unreadable instance {}", instance_path);
            return Vec::new();
        };
        let friendly_name = device_display_name(&instance_key.values);

        let mut events = Vec::new();
        for (property_id, subtype) in PROPERTY_TIMESTAMPS {
            let property_path = format!(
                "{}\\Properties\\{}\\{}",
                instance_path, DEVICE_PROPERTY_GUID, property_id
            );
            let Ok(property_key) = registry::read_key(RegistryRoot::LocalMachine, &property_path)
            else {
                continue;
            };
            // The timestamp lives in the key's default (unnamed) value
            let Some(timestamp) = property_key
                .values
                .iter()
                .find(|v| v.name.is_empty())
                .and_then(|v| decode_property_filetime(&v.data))
            else {
                continue;
            };
            events.push(ActivityEvent {
                source: self.source(),
                subtype: subtype.to_string(),
                timestamp,
                precision: Precision::Millisecond,
                subject: friendly_name.clone(),
                raw: vec![
                    ("device".to_string(), device_id.to_string()),
                    ("instance".to_string(), instance_id.to_string()),
                ],
                origin: format!("HKLM\\{}", instance_path),
            });
        }
        events
    }
}

impl Extractor for UsbHistoryExtractor {
    fn source(&self) -> ArtifactSource {
        ArtifactSource::UsbHistory
    }

    fn name(&self) -> &'static str {
        "USB Devices"
    }

    fn extract(&self) -> Result<Vec<ActivityEvent>, ExtractorError> {
        let root = match registry::read_key(RegistryRoot::LocalMachine, USBSTOR_KEY) {
            Ok(key) => key,
            // No USB storage device was ever connected
            Err(RegistryReadError::Absent) => return Ok(Vec::new()),
            Err(RegistryReadError::Unreadable(detail)) => {
                return Err(ExtractorError::unreadable(self.source(), self.name(), detail))
            }
        };

        let mut events = Vec::new();
        for device_id in &root.subkeys {
            let device_path = format!("{}\\{}", USBSTOR_KEY, device_id);
            let Ok(device_key) = registry::read_key(RegistryRoot::LocalMachine, &device_path)
            else {
                debug!("USBSTOR: skipping unreadable device {}", device_id);
                continue;
            };
            for instance_id in &device_key.subkeys {
                events.extend(self.instance_events(device_id, instance_id));
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryValue;
    use chrono::Datelike;

    #[test]
    fn test_decode_property_filetime() {
        let mut data = vec![0u8; 8];
        // 2000-01-01 00:00:00 UTC
        LittleEndian::write_u64(&mut data, 125_911_584_000_000_000);
        let ts = decode_property_filetime(&data).unwrap();
        assert_eq!(ts.year(), 2000);

        assert!(decode_property_filetime(&[0u8; 4]).is_none());
        assert!(decode_property_filetime(&[0u8; 8]).is_none()); // zero FILETIME
    }

    fn sz(name: &str, text: &str) -> RegistryValue {
        let mut data: Vec<u8> = text.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        data.extend_from_slice(&[0, 0]);
        RegistryValue {
            name: name.to_string(),
            value_type: 1, // REG_SZ
            data,
        }
    }

    #[test]
    fn test_device_display_name_preference() {
        let values = vec![sz("DeviceDesc", "Disk Drive"), sz("FriendlyName", "Kingston DataTraveler")];
        assert_eq!(device_display_name(&values), "Kingston DataTraveler");

        let values = vec![sz("DeviceDesc", "Disk Drive")];
        assert_eq!(device_display_name(&values), "Disk Drive");

        assert_eq!(device_display_name(&[]), "Unknown Device");
    }
}
