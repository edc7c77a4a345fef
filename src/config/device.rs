//! Device identity used in telemetry and the broker client id.

/// Static description of this unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    mac: [u8; 6],
    /// Product type reported in the device descriptor.
    pub device_type: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub chip_model: String,
}

impl DeviceInfo {
    /// Describe a device from its station MAC address.
    pub fn new(mac: [u8; 6]) -> Self {
        Self {
            mac,
            device_type: "WindChime_ESP32".to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            hardware_version: "ESP32-S3".to_string(),
            chip_model: "ESP32-S3".to_string(),
        }
    }

    /// Override the hardware description (host builds report the simulator).
    pub fn with_hardware(mut self, hardware_version: &str, chip_model: &str) -> Self {
        self.hardware_version = hardware_version.to_string();
        self.chip_model = chip_model.to_string();
        self
    }

    /// Raw MAC address.
    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    /// Stable identifier, formatted `AA:BB:CC:DD:EE:FF`.
    pub fn device_id(&self) -> String {
        self.mac
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Broker client id: prefix followed by the low 32 MAC bits in hex.
    pub fn client_id(&self, prefix: &str) -> String {
        let low = u32::from_be_bytes([self.mac[2], self.mac[3], self.mac[4], self.mac[5]]);
        format!("{}{:08X}", prefix, low)
    }
}
