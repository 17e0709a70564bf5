use crate::prelude::*;

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Vec::new")]
    pub inverters: Vec<InverterConfig>,

    pub battery: Option<InverterConfig>,

    #[serde(default)]
    pub meter: MeterConfig,

    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Window to wait for multicast discovery replies.
    #[serde(default = "Config::default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

impl Config {
    /// Loads a configuration from a YAML file.
    pub fn load(file: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file)?;
        serde_yaml::from_str(&content)
            .map_err(|err| Error::Config(format!("error parsing {}: {}", file, err)))
    }

    fn default_discovery_timeout_secs() -> u64 {
        1
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }
}

// InverterConfig {{{
#[derive(Clone, Debug, Deserialize)]
pub struct InverterConfig {
    pub host: String,

    #[serde(default = "InverterConfig::default_port")]
    pub port: u16,

    /// Fixed slave id. When absent, the device address is probed through
    /// the SunSpec common model.
    pub slave_id: Option<u8>,
}

impl InverterConfig {
    fn default_port() -> u16 {
        502
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
} // }}}

// MeterConfig {{{
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MeterConfig {
    /// IPv4 address of the interface that joins the multicast group.
    /// Unset means all interfaces.
    pub interface: Option<Ipv4Addr>,
}

impl MeterConfig {
    pub fn interface(&self) -> Ipv4Addr {
        self.interface.unwrap_or(Ipv4Addr::UNSPECIFIED)
    }
} // }}}

// ModbusConfig {{{
#[derive(Clone, Debug, Deserialize)]
pub struct ModbusConfig {
    #[serde(default = "ModbusConfig::default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    /// Deadline for a single register read. An expired deadline counts as
    /// a lost carrier and triggers a reconnect.
    #[serde(default = "ModbusConfig::default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "ModbusConfig::default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            dial_timeout_secs: Self::default_dial_timeout_secs(),
            read_timeout_secs: Self::default_read_timeout_secs(),
            keepalive_secs: Self::default_keepalive_secs(),
        }
    }
}

impl ModbusConfig {
    fn default_dial_timeout_secs() -> u64 {
        60
    }

    fn default_read_timeout_secs() -> u64 {
        20
    }

    fn default_keepalive_secs() -> u64 {
        30
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
} // }}}
