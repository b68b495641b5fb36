// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layered configuration: compiled-in defaults, then an autophone config
//! file (ini-style), then environment variable overrides (§6).

use crate::error::ConfigFault;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub use crate::error::ConfigFault as ConfigError;

/// Treeherder (results service) credentials, provided together or not at
/// all (§6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeherderConfig {
    pub url: Option<String>,
    pub client_id: Option<String>,
    pub secret: Option<String>,
    pub tier: Option<String>,
    pub retry_wait_secs: u64,
}

/// S3 object-store credentials, provided together or not at all (§6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key: Option<String>,
}

/// Full daemon configuration (§6 "Environment and configuration").
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub console_port: u16,
    pub logfile: PathBuf,
    pub loglevel: String,
    pub test_path: PathBuf,
    pub devicescfg: PathBuf,
    pub emailcfg: Option<PathBuf>,
    pub enable_pulse: bool,
    pub pulse_user: Option<String>,
    pub pulse_password: Option<String>,
    pub pulse_durable_queue: bool,
    pub cache_dir: PathBuf,
    pub override_build_dir: Option<PathBuf>,
    pub build_cache_port: u16,
    pub allow_duplicate_jobs: bool,
    pub repos: Vec<String>,
    pub buildtypes: Vec<String>,
    pub lifo: bool,
    pub treeherder: TreeherderConfig,
    pub s3: S3Config,
    pub reboot_on_error: bool,
    pub maximum_heartbeat_secs: u64,
    pub device_test_root: String,
    pub phone_retry_limit: u32,
    pub phone_retry_wait_secs: u64,
    pub battery_min: u8,
    pub battery_max: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            console_port: 28001,
            logfile: PathBuf::from("/var/log/autophone/autophone.log"),
            loglevel: "INFO".to_string(),
            test_path: PathBuf::from("tests.ini"),
            devicescfg: PathBuf::from("devices.ini"),
            emailcfg: None,
            enable_pulse: false,
            pulse_user: None,
            pulse_password: None,
            pulse_durable_queue: false,
            cache_dir: PathBuf::from("/var/cache/autophone"),
            override_build_dir: None,
            build_cache_port: 0,
            allow_duplicate_jobs: false,
            repos: vec!["mozilla-central".to_string()],
            buildtypes: vec!["opt".to_string()],
            lifo: false,
            treeherder: TreeherderConfig::default(),
            s3: S3Config::default(),
            reboot_on_error: false,
            maximum_heartbeat_secs: 300,
            device_test_root: "/data/local/tests".to_string(),
            phone_retry_limit: 3,
            phone_retry_wait_secs: 15,
            battery_min: 90,
            battery_max: 95,
        }
    }
}

impl Config {
    /// Load defaults, then apply an ini-style config file, then environment
    /// variable overrides. Environment variables are `AUTOPHONE_<KEY>` in
    /// upper snake case of the §6 option name.
    pub fn load(file_contents: Option<&str>, env: &HashMap<String, String>) -> Result<Self, ConfigFault> {
        let mut config = Config::default();
        if let Some(contents) = file_contents {
            apply_ini(&mut config, contents)?;
        }
        apply_env(&mut config, env);
        config.validate()?;
        Ok(config)
    }

    pub fn maximum_heartbeat(&self) -> Duration {
        Duration::from_secs(self.maximum_heartbeat_secs)
    }

    pub fn phone_retry_wait(&self) -> Duration {
        Duration::from_secs(self.phone_retry_wait_secs)
    }

    /// The three treeherder fields and the three S3 fields must be provided
    /// together or not at all (§6, §7 ConfigFault).
    pub fn validate(&self) -> Result<(), ConfigFault> {
        let th = &self.treeherder;
        let th_fields = [th.url.is_some(), th.client_id.is_some(), th.secret.is_some()];
        if th_fields.iter().any(|f| *f) && !th_fields.iter().all(|f| *f) {
            return Err(ConfigFault::PartialCredentials {
                field: "treeherder-url",
                siblings: &["treeherder-client-id", "treeherder-secret"],
            });
        }

        let s3 = &self.s3;
        let s3_fields = [s3.bucket.is_some(), s3.access_key_id.is_some(), s3.access_key.is_some()];
        if s3_fields.iter().any(|f| *f) && !s3_fields.iter().all(|f| *f) {
            return Err(ConfigFault::PartialCredentials {
                field: "s3-upload-bucket",
                siblings: &["aws-access-key-id", "aws-access-key"],
            });
        }

        if self.battery_min > self.battery_max {
            return Err(ConfigFault::InvalidValue {
                field: "battery-min".to_string(),
                reason: format!("{} exceeds battery-max {}", self.battery_min, self.battery_max),
            });
        }

        Ok(())
    }
}

fn apply_ini(config: &mut Config, contents: &str) -> Result<(), ConfigFault> {
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        set_field(config, key.trim(), value.trim())?;
    }
    Ok(())
}

fn apply_env(config: &mut Config, env: &HashMap<String, String>) {
    for (key, value) in env {
        let Some(option) = key.strip_prefix("AUTOPHONE_") else { continue };
        let option = option.to_lowercase().replace('_', "-");
        let _ = set_field(config, &option, value);
    }
}

fn set_field(config: &mut Config, key: &str, value: &str) -> Result<(), ConfigFault> {
    match key {
        "port" => config.console_port = parse_value(key, value)?,
        "logfile" => config.logfile = PathBuf::from(value),
        "loglevel" => config.loglevel = value.to_string(),
        "test-path" => config.test_path = PathBuf::from(value),
        "devicescfg" => config.devicescfg = PathBuf::from(value),
        "emailcfg" => config.emailcfg = Some(PathBuf::from(value)),
        "enable-pulse" => config.enable_pulse = parse_bool(value),
        "pulse-user" => config.pulse_user = Some(value.to_string()),
        "pulse-password" => config.pulse_password = Some(value.to_string()),
        "pulse-durable-queue" => config.pulse_durable_queue = parse_bool(value),
        "cache-dir" => config.cache_dir = PathBuf::from(value),
        "override-build-dir" => config.override_build_dir = Some(PathBuf::from(value)),
        "build-cache-port" => config.build_cache_port = parse_value(key, value)?,
        "allow-duplicate-jobs" => config.allow_duplicate_jobs = parse_bool(value),
        "repos" => config.repos = value.split(',').map(|s| s.trim().to_string()).collect(),
        "buildtypes" => config.buildtypes = value.split(',').map(|s| s.trim().to_string()).collect(),
        "lifo" => config.lifo = parse_bool(value),
        "treeherder-url" => config.treeherder.url = Some(value.to_string()),
        "treeherder-client-id" => config.treeherder.client_id = Some(value.to_string()),
        "treeherder-secret" => config.treeherder.secret = Some(value.to_string()),
        "treeherder-tier" => config.treeherder.tier = Some(value.to_string()),
        "treeherder-retry-wait" => config.treeherder.retry_wait_secs = parse_value(key, value)?,
        "s3-upload-bucket" => config.s3.bucket = Some(value.to_string()),
        "aws-access-key-id" => config.s3.access_key_id = Some(value.to_string()),
        "aws-access-key" => config.s3.access_key = Some(value.to_string()),
        "reboot-on-error" => config.reboot_on_error = parse_bool(value),
        "maximum-heartbeat" => config.maximum_heartbeat_secs = parse_value(key, value)?,
        "device-test-root" => config.device_test_root = value.to_string(),
        "phone-retry-limit" => config.phone_retry_limit = parse_value(key, value)?,
        "phone-retry-wait" => config.phone_retry_wait_secs = parse_value(key, value)?,
        "battery-min" => config.battery_min = parse_value(key, value)?,
        "battery-max" => config.battery_max = parse_value(key, value)?,
        _ => {}
    }
    Ok(())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigFault> {
    value
        .parse()
        .map_err(|_| ConfigFault::InvalidValue { field: field.to_string(), reason: format!("{value:?} is not valid") })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn partial_treeherder_credentials_fail_validation() {
        let mut config = Config::default();
        config.treeherder.url = Some("https://treeherder.example".to_string());
        assert!(matches!(config.validate(), Err(ConfigFault::PartialCredentials { .. })));
    }

    #[test]
    fn ini_file_overrides_defaults() {
        let config = Config::load(Some("port = 9000\nlifo = true\n"), &HashMap::new()).unwrap();
        assert_eq!(config.console_port, 9000);
        assert!(config.lifo);
    }

    #[test]
    fn env_overrides_file() {
        let mut env = HashMap::new();
        env.insert("AUTOPHONE_PORT".to_string(), "9100".to_string());
        let config = Config::load(Some("port = 9000\n"), &env).unwrap();
        assert_eq!(config.console_port, 9100);
    }

    #[test]
    fn complete_s3_credentials_validate() {
        let mut config = Config::default();
        config.s3.bucket = Some("b".to_string());
        config.s3.access_key_id = Some("k".to_string());
        config.s3.access_key = Some("s".to_string());
        assert!(config.validate().is_ok());
    }
}
