// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `devices.ini` parsing (§6). Keyed by device name, one section per
//! device, holding at minimum the device's serial number.

use crate::define_id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

define_id! {
    /// Identifies a registered device. Distinct from the device's hardware
    /// serial number, which is operator-assigned in `devices.ini`.
    pub struct DeviceId("dev-");
}

/// A device's identity as read from `devices.ini` (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub serial: String,
    pub hardware: Option<String>,
    pub os_version: Option<String>,
    pub abi: Option<String>,
    pub sdk_bucket: Option<String>,
    pub host_ip: Option<String>,
    pub test_root: Option<String>,
}

impl Device {
    fn from_section(name: &str, fields: &HashMap<String, String>) -> Result<Self, DevicesIniError> {
        let serial = fields
            .get("serial")
            .cloned()
            .ok_or_else(|| DevicesIniError::MissingSerial(name.to_string()))?;
        Ok(Device {
            id: DeviceId::new(),
            name: name.to_string(),
            serial,
            hardware: fields.get("hardware").cloned(),
            os_version: fields.get("osver").cloned(),
            abi: fields.get("abi").cloned(),
            sdk_bucket: fields.get("sdk").cloned(),
            host_ip: fields.get("ip").cloned(),
            test_root: fields.get("test_root").cloned(),
        })
    }
}

#[derive(Debug, Error)]
pub enum DevicesIniError {
    #[error("device section [{0}] has no serial= key")]
    MissingSerial(String),
    #[error("no [{0}] section in devices.ini")]
    UnknownDevice(String),
}

/// The full parsed contents of `devices.ini`, keyed by device name.
#[derive(Debug, Clone, Default)]
pub struct DevicesFile {
    devices: HashMap<String, Device>,
}

impl DevicesFile {
    /// Parse an ini-style document: `[name]` sections, `key = value` lines,
    /// `#`/`;` comments, blank lines ignored.
    pub fn parse(contents: &str) -> Result<Self, DevicesIniError> {
        let mut sections: Vec<(String, HashMap<String, String>)> = Vec::new();
        let mut current: Option<(String, HashMap<String, String>)> = None;

        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                if let Some(done) = current.take() {
                    sections.push(done);
                }
                current = Some((section.trim().to_string(), HashMap::new()));
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if let Some((_, fields)) = current.as_mut() {
                    fields.insert(key.trim().to_string(), value.trim().to_string());
                }
            }
        }
        if let Some(done) = current.take() {
            sections.push(done);
        }

        let mut devices = HashMap::new();
        for (name, fields) in sections {
            let device = Device::from_section(&name, &fields)?;
            devices.insert(name, device);
        }
        Ok(Self { devices })
    }

    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    /// Re-read and return just the named device's section, for
    /// `autophone-add-device` (§6, which re-reads only the one device).
    pub fn reload_one(contents: &str, name: &str) -> Result<Device, DevicesIniError> {
        let parsed = Self::parse(contents)?;
        parsed
            .devices
            .get(name)
            .cloned()
            .ok_or_else(|| DevicesIniError::UnknownDevice(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Device)> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
