//! WindChime ESP32 firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("=== WindChime ESP32 starting ===");

    if let Err(e) = firmware::run() {
        log::error!("Connectivity startup failed: {}", e);
    }

    // Nothing left to drive; keep the task alive so the watchdog stays quiet
    loop {
        esp_idf_hal::delay::FreeRtos::delay_ms(1000);
    }
}

#[cfg(feature = "esp32")]
mod firmware {
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::info;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use windchime_esp32::clock::{Clock, SystemClock};
    use windchime_esp32::config::{BrokerConfig, DeviceInfo};
    use windchime_esp32::link::{event_channel, EspRadio, LinkManager};
    use windchime_esp32::session::{EspMqttTransport, SessionManager, SessionStatus};
    use windchime_esp32::store::{NvsStore, LINK_KEYS, NAMESPACE};

    /// Control loop period.
    const TICK_MS: u32 = 100;

    /// How often both managers dump their state to the log.
    const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(300);

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs_partition = EspDefaultNvsPartition::take()?;

        let store = NvsStore::open(nvs_partition.clone(), NAMESPACE, &LINK_KEYS)?;
        let (tx, rx) = event_channel();
        let radio = EspRadio::new(peripherals.modem, sysloop, Some(nvs_partition), tx)?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut link = LinkManager::new(radio, store, rx, clock.clone());
        link.set_status_handler(|status, reason| info!("WiFi: {} ({})", status, reason));

        let broker = BrokerConfig::default();
        let device = DeviceInfo::new(station_mac());
        let transport = EspMqttTransport::new(&broker);
        let mut session = SessionManager::new(transport, broker, device, clock);
        session.set_status_handler(|status, reason| info!("MQTT: {} ({})", status, reason));
        session.set_event_handler(|record| {
            info!(
                "Event {} intensity {} - {}",
                record.source, record.intensity, record.title
            );
        });

        if !link.auto_connect_from_saved() {
            info!("No saved network; waiting for configuration");
        }

        let mut last_status_log = Instant::now();
        loop {
            link.update();
            let snapshot = link.snapshot();

            if snapshot.is_connected() && session.status() == SessionStatus::Disconnected {
                session.connect(&snapshot)?;
            }
            session.update(&snapshot);

            if last_status_log.elapsed() >= STATUS_LOG_INTERVAL {
                link.log_status();
                session.log_status();
                last_status_log = Instant::now();
            }

            FreeRtos::delay_ms(TICK_MS);
        }
    }

    fn station_mac() -> [u8; 6] {
        let mut mac = [0u8; 6];
        let err = unsafe {
            esp_idf_sys::esp_read_mac(
                mac.as_mut_ptr(),
                esp_idf_sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
            )
        };
        if err != esp_idf_sys::ESP_OK {
            log::warn!("Failed to read station MAC ({})", err);
        }
        mac
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --features host --bin host-sim' to run it on a host.");
}
