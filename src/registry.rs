//! Live Windows registry access.
//!
//! Read-only access to the running system's registry, used by the
//! registry-backed extractors (UserAssist, RecentDocs, USBSTOR, RunMRU,
//! TypedPaths). Keys are opened in shared read mode and closed before the
//! call returns. A key that does not exist is reported as `Absent` so
//! extractors can distinguish "artifact not present" from "present but
//! unreadable". Only available on Windows; other platforms see every key as
//! absent.

use chrono::{DateTime, Utc};

#[cfg(windows)]
use crate::datetime::filetime_to_utc;
#[cfg(windows)]
use std::ffi::OsString;
#[cfg(windows)]
use std::os::windows::ffi::{OsStrExt, OsStringExt};
#[cfg(windows)]
use std::ptr;
#[cfg(windows)]
use winapi::shared::minwindef::FILETIME;
#[cfg(windows)]
use winapi::shared::winerror::{ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND};
#[cfg(windows)]
use winapi::um::winreg::{
    RegCloseKey, RegEnumKeyExW, RegEnumValueW, RegOpenKeyExW, RegQueryInfoKeyW,
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE,
};
#[cfg(windows)]
use winapi::um::winnt::KEY_READ;

/// Root hive to open a key under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryRoot {
    CurrentUser,
    LocalMachine,
}

impl RegistryRoot {
    /// Prefix used when building origin strings for forensic traceability
    pub fn prefix(&self) -> &'static str {
        match self {
            RegistryRoot::CurrentUser => "HKCU",
            RegistryRoot::LocalMachine => "HKLM",
        }
    }
}

/// A raw registry value: name, type code and unparsed data bytes
#[derive(Debug, Clone)]
pub struct RegistryValue {
    pub name: String,
    pub value_type: u32,
    pub data: Vec<u8>,
}

/// Snapshot of one registry key: its values, subkey names and last-write time
#[derive(Debug, Clone)]
pub struct RegistryKey {
    pub path: String,
    pub values: Vec<RegistryValue>,
    pub subkeys: Vec<String>,
    pub last_write: Option<DateTime<Utc>>,
}

/// Why a key could not be read
#[derive(Debug, Clone)]
pub enum RegistryReadError {
    /// Key does not exist; routine, not an error for the run
    Absent,
    /// Key exists but cannot be opened or enumerated
    Unreadable(String),
}

/// Decode a UTF-16LE registry string value, stopping at the first NUL
pub fn parse_utf16_string(data: &[u8]) -> Option<String> {
    if data.len() < 2 {
        return None;
    }
    let utf16: Vec<u16> = data
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .take_while(|&c| c != 0)
        .collect();
    if utf16.is_empty() {
        None
    } else {
        Some(String::from_utf16_lossy(&utf16))
    }
}

/// Read a key and all of its values and subkey names.
#[cfg(windows)]
pub fn read_key(root: RegistryRoot, key_path: &str) -> Result<RegistryKey, RegistryReadError> {
    unsafe {
        let hive = match root {
            RegistryRoot::CurrentUser => HKEY_CURRENT_USER,
            RegistryRoot::LocalMachine => HKEY_LOCAL_MACHINE,
        };

        let mut hkey: winapi::shared::minwindef::HKEY = ptr::null_mut();
        let key_path_wide = to_wide_string(key_path);

        let result = RegOpenKeyExW(hive, key_path_wide.as_ptr(), 0, KEY_READ, &mut hkey);
        if result != 0 {
            return match result as u32 {
                ERROR_FILE_NOT_FOUND => Err(RegistryReadError::Absent),
                ERROR_ACCESS_DENIED => Err(RegistryReadError::Unreadable(format!(
                    "access denied opening {}\\{}",
                    root.prefix(),
                    key_path
                ))),
                code => Err(RegistryReadError::Unreadable(format!(
                    "error {} opening {}\\{}",
                    code,
                    root.prefix(),
                    key_path
                ))),
            };
        }

        // Key last-write time; this is container-level precision for the
        // values inside it.
        let mut last_write_ft = FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        };
        let info_result = RegQueryInfoKeyW(
            hkey,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            &mut last_write_ft,
        );
        let last_write = if info_result == 0 {
            let filetime = ((last_write_ft.dwHighDateTime as u64) << 32)
                | last_write_ft.dwLowDateTime as u64;
            filetime_to_utc(filetime).ok().map(|n| n.timestamp)
        } else {
            None
        };

        // Enumerate values: first call sizes the buffer, second reads the data
        let mut values = Vec::new();
        let mut index = 0u32;
        loop {
            let mut value_name = [0u16; 256];
            let mut value_name_size = 256u32;
            let mut value_type = 0u32;
            let mut data_size = 0u32;

            let result = RegEnumValueW(
                hkey,
                index,
                value_name.as_mut_ptr(),
                &mut value_name_size,
                ptr::null_mut(),
                &mut value_type,
                ptr::null_mut(),
                &mut data_size,
            );
            if result != 0 {
                break;
            }

            let mut data = vec![0u8; data_size as usize];
            let mut actual_name_size = 256u32;
            let result = RegEnumValueW(
                hkey,
                index,
                value_name.as_mut_ptr(),
                &mut actual_name_size,
                ptr::null_mut(),
                &mut value_type,
                data.as_mut_ptr(),
                &mut data_size,
            );
            if result == 0 {
                data.truncate(data_size as usize);
                values.push(RegistryValue {
                    name: from_wide_string(&value_name[..actual_name_size as usize]),
                    value_type,
                    data,
                });
            }
            index += 1;
        }

        let mut subkeys = Vec::new();
        let mut subkey_index = 0u32;
        loop {
            let mut subkey_name = [0u16; 256];
            let mut subkey_name_size = 256u32;
            let result = RegEnumKeyExW(
                hkey,
                subkey_index,
                subkey_name.as_mut_ptr(),
                &mut subkey_name_size,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            );
            if result != 0 {
                break;
            }
            subkeys.push(from_wide_string(&subkey_name[..subkey_name_size as usize]));
            subkey_index += 1;
        }

        RegCloseKey(hkey);

        Ok(RegistryKey {
            path: format!("{}\\{}", root.prefix(), key_path),
            values,
            subkeys,
            last_write,
        })
    }
}

#[cfg(not(windows))]
pub fn read_key(_root: RegistryRoot, _key_path: &str) -> Result<RegistryKey, RegistryReadError> {
    Err(RegistryReadError::Absent)
}

/// Whether the process runs with Administrator rights. Prefetch and USBSTOR
/// need elevation; without it those extractors report their stores as
/// unreadable.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    unsafe { winapi::um::shlobj::IsUserAnAdmin() != 0 }
}

#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    false
}

#[cfg(windows)]
fn to_wide_string(s: &str) -> Vec<u16> {
    OsString::from(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(windows)]
fn from_wide_string(wide: &[u16]) -> String {
    OsString::from_wide(wide).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_string_parsing() {
        let data = [b'H', 0, b'e', 0, b'l', 0, b'l', 0, b'o', 0, 0, 0];
        assert_eq!(parse_utf16_string(&data), Some("Hello".to_string()));
        // Odd trailing byte is ignored by chunking
        let data = [b'H', 0, b'i', 0, 0];
        assert_eq!(parse_utf16_string(&data), Some("Hi".to_string()));
        assert_eq!(parse_utf16_string(&[0, 0]), None);
        assert_eq!(parse_utf16_string(&[]), None);
    }

    #[test]
    fn test_root_prefixes() {
        assert_eq!(RegistryRoot::CurrentUser.prefix(), "HKCU");
        assert_eq!(RegistryRoot::LocalMachine.prefix(), "HKLM");
    }
}
