//! ESP-IDF radio driver.
//!
//! Wraps a non-blocking `EspWifi` in station mode. Driver and DHCP events are
//! delivered on the system event loop task and forwarded into the Link
//! Manager's queue; commands and queries run on the control loop.

use super::radio::{RadioDriver, RadioError, RadioEvent, RadioEventSender};
use super::status::{AuthMode, LinkNetwork};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointInfo, AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent,
};
use esp_idf_sys::EspError;
use log::{debug, info, warn};
use std::net::Ipv4Addr;

/// Station-mode radio.
pub struct EspRadio<'a> {
    wifi: EspWifi<'a>,
    target: Option<String>,
    _subscriptions: Vec<EspSubscription<'static, System>>,
}

impl<'a> EspRadio<'a> {
    /// Bring up the station interface and start forwarding its events.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        events: RadioEventSender,
    ) -> Result<Self, EspError> {
        let mut wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;

        let wifi_events = events.clone();
        let wifi_subscription = sysloop.subscribe::<WifiEvent, _>(move |event| match event {
            WifiEvent::StaStarted => wifi_events.send(RadioEvent::Started),
            WifiEvent::StaConnected(_) => wifi_events.send(RadioEvent::LinkUp),
            WifiEvent::StaDisconnected(_) => wifi_events.send(RadioEvent::LinkDown),
            WifiEvent::ScanDone(_) => wifi_events.send(RadioEvent::ScanDone),
            _ => {}
        })?;

        let ip_events = events;
        let ip_subscription = sysloop.subscribe::<IpEvent, _>(move |event| {
            if let IpEvent::DhcpIpAssigned(assignment) = event {
                ip_events.send(RadioEvent::AddressAcquired(assignment.ip()));
            }
        })?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        info!("Station interface started");

        Ok(Self {
            wifi,
            target: None,
            _subscriptions: vec![wifi_subscription, ip_subscription],
        })
    }
}

impl RadioDriver for EspRadio<'_> {
    fn start_scan(&mut self) -> Result<(), RadioError> {
        self.wifi.start_scan(&Default::default(), false)?;
        Ok(())
    }

    fn stop_scan(&mut self) {
        if let Err(e) = self.wifi.stop_scan() {
            debug!("stop_scan: {:?}", e);
        }
    }

    fn scan_results(&mut self) -> Vec<LinkNetwork> {
        match self.wifi.get_scan_result() {
            Ok(aps) => aps.iter().map(network_from_ap).collect(),
            Err(e) => {
                warn!("Failed to fetch scan results: {:?}", e);
                Vec::new()
            }
        }
    }

    fn connect(&mut self, identifier: &str, secret: &str) -> Result<(), RadioError> {
        let auth_method = if secret.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let config = Configuration::Client(ClientConfiguration {
            ssid: identifier
                .try_into()
                .map_err(|_| RadioError::InvalidCredentials)?,
            password: secret
                .try_into()
                .map_err(|_| RadioError::InvalidCredentials)?,
            auth_method,
            ..Default::default()
        });

        self.wifi.set_configuration(&config)?;
        self.target = Some(identifier.to_string());
        self.wifi.connect()?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        self.target = None;
        self.wifi.disconnect()?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn signal_level(&self) -> i32 {
        let mut record = esp_idf_sys::wifi_ap_record_t::default();
        let err = unsafe { esp_idf_sys::esp_wifi_sta_get_ap_info(&mut record) };
        if err == esp_idf_sys::ESP_OK {
            i32::from(record.rssi)
        } else {
            0
        }
    }

    fn address(&self) -> Option<Ipv4Addr> {
        self.wifi.sta_netif().get_ip_info().ok().map(|info| info.ip)
    }

    fn connected_identifier(&self) -> Option<String> {
        if self.is_connected() {
            self.target.clone()
        } else {
            None
        }
    }
}

fn network_from_ap(ap: &AccessPointInfo) -> LinkNetwork {
    let auth_mode = match ap.auth_method {
        Some(AuthMethod::None) => AuthMode::Open,
        Some(AuthMethod::WEP) => AuthMode::Wep,
        Some(AuthMethod::WPA) => AuthMode::Wpa,
        Some(AuthMethod::WPA2Personal) => AuthMode::Wpa2,
        Some(AuthMethod::WPAWPA2Personal) => AuthMode::WpaWpa2,
        Some(AuthMethod::WPA2Enterprise) => AuthMode::Wpa2Enterprise,
        Some(AuthMethod::WPA3Personal) => AuthMode::Wpa3,
        Some(AuthMethod::WPA2WPA3Personal) => AuthMode::Wpa2Wpa3,
        _ => AuthMode::Unknown,
    };
    LinkNetwork::new(ap.ssid.as_str(), i32::from(ap.signal_strength), auth_mode)
}
