//! Host-based provisioning run for development.
//!
//! Runs the full boot sequence on the host with a simulated radio and a
//! file-backed store, so the portal can be tried from a browser. A "restart"
//! re-runs the sequence with the updated store.
//!
//! # Usage
//!
//! ```bash
//! WIFI_PICKER_NETWORKS="home:password123,cafe:" \
//! WIFI_PICKER_HTTP_PORT=8080 \
//!     cargo run --bin host-provisioner
//! ```
//!
//! Then open http://127.0.0.1:8080/ and add `home` / `password123`.
//!
//! # Environment
//!
//! - `WIFI_PICKER_STORE` - record path (default `~/.wifi-picker/networks`)
//! - `WIFI_PICKER_NETWORKS` - simulated networks in range, `ssid:pass,...`
//! - `WIFI_PICKER_AP_SSID` / `WIFI_PICKER_AP_PASS` - fallback AP settings
//! - `WIFI_PICKER_HTTP_PORT` - portal port (default 8080)
//! - `WIFI_PICKER_DNS_PORT` - captive DNS port (default 5353, `0` disables)

use log::{error, info};
use std::net::Ipv4Addr;
use wifi_picker::provisioner::Restart;
use wifi_picker::store::default_store_path;
use wifi_picker::{
    AccessPointConfig, FileStorage, HttpPortal, PortalConfig, Provisioner, ProvisionerConfig,
    RunOutcome, ServeExit, ShutdownToken, SimulatedRadio,
};

/// Chip id used for the default AP name on the host.
const HOST_CHIP_ID: u32 = 0x00c0_ffee;

/// Restart that only logs; the outer loop re-runs the boot sequence.
struct LoggedRestart;

impl Restart for LoggedRestart {
    fn restart(&mut self) {
        info!("=== Simulated restart ===");
    }
}

fn env_port(name: &str, default: u16) -> u16 {
    match std::env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            error!("{} is not a port number: {:?}", name, value);
            std::process::exit(1);
        }),
        Err(_) => default,
    }
}

fn simulated_radio() -> SimulatedRadio {
    let mut radio = SimulatedRadio::new()
        .with_negotiation(2)
        .with_ap_address(Ipv4Addr::LOCALHOST);

    if let Ok(networks) = std::env::var("WIFI_PICKER_NETWORKS") {
        for entry in networks.split(',').filter(|e| !e.is_empty()) {
            let (ssid, password) = entry.split_once(':').unwrap_or((entry, ""));
            info!("Simulated network in range: \"{}\"", ssid);
            radio = radio.with_network(ssid, password);
        }
    }
    radio
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== WiFi picker host run starting ===");

    let path = match default_store_path() {
        Ok(path) => path,
        Err(e) => {
            error!("Cannot determine store path: {}", e);
            std::process::exit(1);
        }
    };
    info!("Saved networks file: {:?}", path);

    let access_point = match AccessPointConfig::new(
        std::env::var("WIFI_PICKER_AP_SSID").unwrap_or_default(),
        std::env::var("WIFI_PICKER_AP_PASS").unwrap_or_default(),
        false,
        HOST_CHIP_ID,
    ) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid access point settings: {}", e);
            std::process::exit(1);
        }
    };

    let dns_port = env_port("WIFI_PICKER_DNS_PORT", 5353);
    let portal_config = PortalConfig {
        bind: Ipv4Addr::LOCALHOST,
        http_port: env_port("WIFI_PICKER_HTTP_PORT", 8080),
        dns_port: (dns_port != 0).then_some(dns_port),
        ..PortalConfig::default()
    };

    let shutdown = ShutdownToken::new();
    loop {
        let mut provisioner = Provisioner::new(
            simulated_radio(),
            FileStorage::new(&path),
            LoggedRestart,
            access_point.clone(),
            ProvisionerConfig::default(),
        );

        match provisioner.run(|address| HttpPortal::start(address, &portal_config), &shutdown) {
            Ok(RunOutcome::Joined) => {
                info!("Joined {:?}, done", provisioner.state());
                break;
            }
            Ok(RunOutcome::Served(ServeExit::Restarted)) => continue,
            Ok(RunOutcome::Served(ServeExit::Shutdown)) => break,
            Err(e) => {
                error!("Provisioning failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
