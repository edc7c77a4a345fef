//! Outbound telemetry documents.
//!
//! Flat JSON objects published by the Session Manager: a device descriptor
//! once per session, a status snapshot on connect and on request, and a
//! periodic heartbeat. Timestamps are milliseconds since the Session Manager
//! was created; uptime is whole seconds.

use crate::config::{BrokerConfig, DeviceInfo};
use crate::link::LinkSnapshot;
use serde::Serialize;
use std::net::Ipv4Addr;

/// Device identity and session parameters, sent once per broker session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub device_type: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub chip_model: String,
    pub mac_address: String,
    pub wifi_ssid: String,
    pub ip_address: String,
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub subscribed_topics: String,
    pub timestamp: u64,
}

impl DeviceDescriptor {
    pub fn new(
        device: &DeviceInfo,
        broker: &BrokerConfig,
        link: &LinkSnapshot,
        timestamp: u64,
    ) -> Self {
        Self {
            device_id: device.device_id(),
            device_type: device.device_type.clone(),
            firmware_version: device.firmware_version.clone(),
            hardware_version: device.hardware_version.clone(),
            chip_model: device.chip_model.clone(),
            mac_address: device.device_id(),
            wifi_ssid: link.identifier.clone().unwrap_or_default(),
            ip_address: ip_string(link.address),
            mqtt_broker: broker.host.clone(),
            mqtt_port: broker.port,
            subscribed_topics: broker.events_topic.clone(),
            timestamp,
        }
    }
}

/// Current state of both connections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub device_id: String,
    pub timestamp: u64,
    pub mqtt_status: String,
    pub wifi_status: String,
    pub wifi_ssid: String,
    pub ip_address: String,
    pub mac_address: String,
    pub uptime: u64,
}

impl StatusSnapshot {
    pub fn new(
        device: &DeviceInfo,
        session_status: &str,
        link: &LinkSnapshot,
        timestamp: u64,
    ) -> Self {
        Self {
            device_id: device.device_id(),
            timestamp,
            mqtt_status: session_status.to_string(),
            wifi_status: link.status.as_str().to_string(),
            wifi_ssid: link.identifier.clone().unwrap_or_default(),
            ip_address: ip_string(link.address),
            mac_address: device.device_id(),
            uptime: timestamp / 1000,
        }
    }
}

/// Liveness message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heartbeat {
    pub device_id: String,
    pub timestamp: u64,
    pub uptime: u64,
    pub wifi_rssi: i32,
    pub wifi_ssid: String,
}

impl Heartbeat {
    pub fn new(device: &DeviceInfo, link: &LinkSnapshot, timestamp: u64) -> Self {
        Self {
            device_id: device.device_id(),
            timestamp,
            uptime: timestamp / 1000,
            wifi_rssi: link.signal_level,
            wifi_ssid: link.identifier.clone().unwrap_or_default(),
        }
    }
}

fn ip_string(address: Option<Ipv4Addr>) -> String {
    address.unwrap_or(Ipv4Addr::UNSPECIFIED).to_string()
}
