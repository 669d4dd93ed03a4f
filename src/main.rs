//! WiFi provisioning firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::{error, info, warn};
    use std::time::Duration;
    use wifi_picker::provisioner::Restart;
    use wifi_picker::store::NvsStorage;
    use wifi_picker::wifi::{EspRadio, EspRestart};
    use wifi_picker::{
        AccessPointConfig, HttpPortal, PortalConfig, Provisioner, ProvisionerConfig, RunOutcome,
        ShutdownToken,
    };

    /// Fallback AP name, chip-derived when unset.
    const AP_SSID: Option<&str> = option_env!("WIFI_PICKER_AP_SSID");
    /// Fallback AP passphrase, open when unset.
    const AP_PASS: Option<&str> = option_env!("WIFI_PICKER_AP_PASS");

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("=== WiFi picker starting ===");

    let run = || -> Result<RunOutcome, Box<dyn std::error::Error>> {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;

        let radio = EspRadio::new(peripherals.modem, sysloop)?;
        let chip_id = radio.chip_id()?;
        let access_point = AccessPointConfig::new(
            AP_SSID.unwrap_or(""),
            AP_PASS.unwrap_or(""),
            false,
            chip_id,
        )?;
        let storage = NvsStorage::take()?;

        let mut provisioner = Provisioner::new(
            radio,
            storage,
            EspRestart,
            access_point,
            ProvisionerConfig::default(),
        );

        let portal_config = PortalConfig::default();
        let shutdown = ShutdownToken::new();
        let outcome = provisioner.run(
            |address| HttpPortal::start(address, &portal_config),
            &shutdown,
        )?;
        Ok(outcome)
    };

    match run() {
        Ok(RunOutcome::Joined) => info!("Network joined"),
        Ok(RunOutcome::Served(exit)) => warn!("Portal ended: {:?}", exit),
        Err(e) => {
            error!("Provisioning failed, restarting: {}", e);
            std::thread::sleep(Duration::from_secs(1));
            EspRestart.restart();
        }
    }

    loop {
        std::thread::sleep(Duration::from_secs(10));
        info!("Heartbeat...");
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-provisioner' to try the portal on the host.");
}
