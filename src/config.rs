//! Adapter configuration
//!
//! Defaults describe the single sample bulb; every field can be overridden
//! through `SKILLBRIDGE_*` environment variables.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::MqttConfig;

/// Device cloud identity of one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceBinding {
    /// Key of the device's records in the state store
    pub serial_number: String,
    /// Thing whose shadow receives commands
    pub thing_name: String,
}

/// The endpoint advertised on discovery
#[derive(Debug, Clone)]
pub struct DiscoveryProfile {
    pub endpoint_id: String,
    pub friendly_name: String,
}

impl Default for DiscoveryProfile {
    fn default() -> Self {
        Self {
            endpoint_id: "sample-bulb-01".into(),
            friendly_name: "Test Light".into(),
        }
    }
}

/// Configuration for the directive executor and its collaborators
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Endpoint id -> device binding
    pub devices: HashMap<String, DeviceBinding>,
    pub discovery: DiscoveryProfile,
    /// Scope token used when a directive carries none
    pub default_token: String,
    /// Upper bound on any single collaborator call
    pub collaborator_timeout: Duration,
    /// Uncertainty reported with store-derived properties
    pub report_uncertainty_ms: u64,
    pub mqtt: MqttConfig,
    /// JSON record file; an empty in-memory store is used when unset
    pub state_file: Option<PathBuf>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            devices: HashMap::from([(
                "sample-bulb-01".to_string(),
                DeviceBinding {
                    serial_number: "SN-D7F3C8947867".into(),
                    thing_name: "my-esp32".into(),
                },
            )]),
            discovery: DiscoveryProfile::default(),
            default_token: "access-token-from-Amazon".into(),
            collaborator_timeout: Duration::from_secs(5),
            report_uncertainty_ms: 500,
            mqtt: MqttConfig::default(),
            state_file: None,
        }
    }
}

impl AdapterConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("SKILLBRIDGE_MQTT_HOST") {
            config.mqtt.host = host;
        }
        if let Some(port) = lookup("SKILLBRIDGE_MQTT_PORT") {
            config.mqtt.port = port
                .parse()
                .with_context(|| format!("SKILLBRIDGE_MQTT_PORT={}", port))?;
        }
        if let Some(client_id) = lookup("SKILLBRIDGE_MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(path) = lookup("SKILLBRIDGE_STATE_FILE") {
            config.state_file = Some(PathBuf::from(path));
        }
        if let Some(ms) = lookup("SKILLBRIDGE_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("SKILLBRIDGE_TIMEOUT_MS={}", ms))?;
            config.collaborator_timeout = Duration::from_millis(ms);
        }
        if let Some(token) = lookup("SKILLBRIDGE_BEARER_TOKEN") {
            config.default_token = token;
        }
        if let Some(devices) = lookup("SKILLBRIDGE_DEVICES") {
            config.devices = parse_devices(&devices)?;
        }

        Ok(config)
    }

    pub fn binding(&self, endpoint_id: &str) -> Option<&DeviceBinding> {
        self.devices.get(endpoint_id)
    }

    /// Endpoint id -> thing name, for the command channel
    pub fn thing_names(&self) -> HashMap<String, String> {
        self.devices
            .iter()
            .map(|(endpoint, binding)| (endpoint.clone(), binding.thing_name.clone()))
            .collect()
    }
}

/// Parse `endpoint=serial@thing[,endpoint=serial@thing...]`
fn parse_devices(bindings: &str) -> Result<HashMap<String, DeviceBinding>> {
    let mut devices = HashMap::new();

    for entry in bindings.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (endpoint, rest) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Device binding '{}' is missing '='", entry))?;
        let (serial, thing) = rest
            .split_once('@')
            .ok_or_else(|| anyhow!("Device binding '{}' is missing '@'", entry))?;

        if endpoint.is_empty() || serial.is_empty() || thing.is_empty() {
            bail!("Device binding '{}' has an empty field", entry);
        }

        devices.insert(
            endpoint.to_string(),
            DeviceBinding {
                serial_number: serial.to_string(),
                thing_name: thing.to_string(),
            },
        );
    }

    if devices.is_empty() {
        bail!("SKILLBRIDGE_DEVICES has no bindings");
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_binding() {
        let config = AdapterConfig::default();
        let binding = config.binding("sample-bulb-01").expect("default binding");
        assert_eq!(binding.serial_number, "SN-D7F3C8947867");
        assert_eq!(binding.thing_name, "my-esp32");
        assert_eq!(config.discovery.endpoint_id, "sample-bulb-01");
        assert_eq!(config.report_uncertainty_ms, 500);
    }

    #[test]
    fn test_env_overrides() {
        let config = AdapterConfig::from_lookup(lookup(&[
            ("SKILLBRIDGE_MQTT_HOST", "broker.local"),
            ("SKILLBRIDGE_MQTT_PORT", "8883"),
            ("SKILLBRIDGE_TIMEOUT_MS", "250"),
            ("SKILLBRIDGE_STATE_FILE", "/tmp/state.json"),
            ("SKILLBRIDGE_DEVICES", "lamp-1=SN-1@thing-1, lamp-2=SN-2@thing-2"),
        ]))
        .expect("valid config");

        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.collaborator_timeout, Duration::from_millis(250));
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/state.json")));
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.binding("lamp-2").unwrap().thing_name, "thing-2");
        assert!(config.binding("sample-bulb-01").is_none());
        assert_eq!(config.thing_names()["lamp-1"], "thing-1");
    }

    #[test]
    fn test_invalid_values() {
        assert!(AdapterConfig::from_lookup(lookup(&[("SKILLBRIDGE_MQTT_PORT", "abc")])).is_err());
        assert!(AdapterConfig::from_lookup(lookup(&[("SKILLBRIDGE_TIMEOUT_MS", "-1")])).is_err());
        assert!(AdapterConfig::from_lookup(lookup(&[("SKILLBRIDGE_DEVICES", "lamp-1")])).is_err());
        assert!(AdapterConfig::from_lookup(lookup(&[("SKILLBRIDGE_DEVICES", "lamp-1=SN-1")])).is_err());
        assert!(AdapterConfig::from_lookup(lookup(&[("SKILLBRIDGE_DEVICES", " , ")])).is_err());
    }
}
