mod common;

use sma_energy::prelude::*;

use std::io::Write;
use std::net::Ipv4Addr;
use std::time::Duration;

#[test]
fn loads_yaml_and_fills_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "inverters:\n\
         \x20 - host: 192.168.1.10\n\
         \x20 - host: 192.168.1.11\n\
         \x20   port: 1502\n\
         \x20   slave_id: 3\n\
         battery:\n\
         \x20 host: 192.168.1.20\n\
         meter:\n\
         \x20 interface: 192.168.1.2\n"
    )
    .unwrap();

    let config = Config::load(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.inverters.len(), 2);
    assert_eq!(config.inverters[0].addr(), "192.168.1.10:502");
    assert_eq!(config.inverters[0].slave_id, None);
    assert_eq!(config.inverters[1].addr(), "192.168.1.11:1502");
    assert_eq!(config.inverters[1].slave_id, Some(3));

    assert_eq!(
        config.battery.as_ref().map(|b| b.host.as_str()),
        Some("192.168.1.20")
    );
    assert_eq!(config.meter.interface(), Ipv4Addr::new(192, 168, 1, 2));

    assert_eq!(config.loglevel(), "info");
    assert_eq!(config.discovery_timeout(), Duration::from_secs(1));
    assert_eq!(config.modbus.dial_timeout(), Duration::from_secs(60));
    assert_eq!(config.modbus.read_timeout(), Duration::from_secs(20));
    assert_eq!(config.modbus.keepalive(), Duration::from_secs(30));
}

#[test]
fn the_discovery_window_is_configurable() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "inverters: []\ndiscovery_timeout_secs: 5\n").unwrap();

    let config = Config::load(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.discovery_timeout(), Duration::from_secs(5));
}

#[test]
fn the_meter_interface_defaults_to_all_interfaces() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "inverters: []\n").unwrap();

    let config = Config::load(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.meter.interface(), Ipv4Addr::UNSPECIFIED);
    assert!(config.battery.is_none());
}

#[test]
fn missing_files_surface_as_io_errors() {
    let err = Config::load("/nonexistent/sma-energy.yaml").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn invalid_yaml_surfaces_as_config_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "inverters: 42\n").unwrap();

    let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
