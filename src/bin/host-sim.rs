//! Host simulator for the connectivity core.
//!
//! Runs the Link Manager against a simulated radio and the Session Manager
//! against a real MQTT broker, printing decoded events as they arrive.
//! Link credentials persist in `~/.windchime-esp32/wifi_config.json`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin host-sim --features host -- --ssid HomeNet --password password123 --save
//! ```
//!
//! Broker host, port and credentials come from `WINDCHIME_BROKER_HOST`,
//! `WINDCHIME_BROKER_PORT`, `WINDCHIME_BROKER_USER` and
//! `WINDCHIME_BROKER_PASS`.

use log::{error, info, warn};
use std::process::exit;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use windchime_esp32::clock::{Clock, SystemClock};
use windchime_esp32::config::{BrokerConfig, DeviceInfo};
use windchime_esp32::link::{event_channel, AuthMode, LinkManager, LinkNetwork, SimulatedRadio};
use windchime_esp32::session::{MqttTransport, SessionManager, SessionStatus};
use windchime_esp32::store::{FileStore, NAMESPACE};

/// Control loop period.
const TICK: Duration = Duration::from_millis(100);

/// How often both managers dump their state to the log.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// MAC reported by the simulated device.
const SIM_MAC: [u8; 6] = [0x02, 0x57, 0x43, 0x00, 0x00, 0x01];

struct Args {
    ssid: Option<String>,
    password: String,
    save: bool,
    forget: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        ssid: None,
        password: String::new(),
        save: false,
        forget: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--ssid" => parsed.ssid = iter.next().cloned(),
            "--password" => parsed.password = iter.next().cloned().unwrap_or_default(),
            "--save" => parsed.save = true,
            "--forget" => parsed.forget = true,
            "--help" => {
                println!("WindChime host simulator");
                println!();
                println!("Usage:");
                println!("  {} [OPTIONS]", args[0]);
                println!();
                println!("Options:");
                println!("  --ssid NAME       Join this simulated network");
                println!("  --password PASS   Passphrase (empty for open networks)");
                println!("  --save            Remember the network for auto-connect");
                println!("  --forget          Clear the saved network and exit");
                println!("  --help            Show this help");
                exit(0);
            }
            other => warn!("Ignoring unknown argument '{}'", other),
        }
    }
    parsed
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = parse_args();

    info!("=== WindChime host simulator starting ===");

    let store = match FileStore::open_default(NAMESPACE) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open credential store: {}", e);
            exit(1);
        }
    };

    let (tx, rx) = event_channel();
    let radio = SimulatedRadio::new(tx);
    radio.set_auto_complete(true);
    let mut networks = vec![
        LinkNetwork::new("WindChime-Lab", -47, AuthMode::Wpa2),
        LinkNetwork::new("Cafe", -73, AuthMode::Open),
    ];
    if let Some(ssid) = &args.ssid {
        if !networks.iter().any(|n| &n.identifier == ssid) {
            networks.push(LinkNetwork::new(ssid.as_str(), -58, AuthMode::Wpa2));
        }
    }
    radio.set_networks(networks);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut link = LinkManager::new(radio, store, rx, clock.clone());
    link.set_status_handler(|status, reason| info!("WiFi: {} ({})", status, reason));

    if args.forget {
        match link.clear_config() {
            Ok(()) => info!("Saved network forgotten"),
            Err(e) => error!("Failed to clear saved network: {}", e),
        }
        return;
    }

    let broker = BrokerConfig::from_env();
    let transport = MqttTransport::new(&broker);
    let device = DeviceInfo::new(SIM_MAC).with_hardware("host", "simulator");
    let mut session = SessionManager::new(transport, broker, device, clock);
    if let Some((user, pass)) = BrokerConfig::credentials_from_env() {
        if let Err(e) = session.set_credentials(&user, &pass) {
            warn!("Ignoring broker credentials: {}", e);
        }
    }
    session.set_status_handler(|status, reason| info!("MQTT: {} ({})", status, reason));
    session.set_event_handler(|record| {
        info!(
            "Event {} intensity {} at ({}, {}) r={} - {}",
            record.source,
            record.intensity,
            record.style.x,
            record.style.y,
            record.style.radius,
            record.title
        );
    });

    link.start_scan(|networks| {
        for network in networks {
            info!(
                "  {:<24} {:>4} dBm  {} bars  {}",
                network.identifier,
                network.signal_level,
                network.bars(),
                network.auth_mode
            );
        }
    });
    link.update();

    match &args.ssid {
        Some(ssid) => {
            if let Err(e) = link.connect(ssid, &args.password, args.save) {
                error!("Cannot join {}: {}", ssid, e);
                exit(1);
            }
        }
        None => {
            if !link.auto_connect_from_saved() {
                info!("No saved network; pass --ssid to join one");
            }
        }
    }

    let cancel = CancellationToken::new();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start signal runtime: {}", e);
            exit(1);
        }
    };
    let shutdown = cancel.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down");
        }
        shutdown.cancel();
    });

    info!("Entering main loop (Ctrl+C to exit)...");
    let mut last_status_log = Instant::now();
    while !cancel.is_cancelled() {
        link.update();
        let snapshot = link.snapshot();

        if snapshot.is_connected() && session.status() == SessionStatus::Disconnected {
            if let Err(e) = session.connect(&snapshot) {
                warn!("Broker connect refused: {}", e);
            }
        }
        session.update(&snapshot);

        if last_status_log.elapsed() >= STATUS_LOG_INTERVAL {
            link.log_status();
            session.log_status();
            last_status_log = Instant::now();
        }

        std::thread::sleep(TICK);
    }

    session.disconnect();
    link.disconnect();
    runtime.shutdown_timeout(Duration::from_secs(1));
}
