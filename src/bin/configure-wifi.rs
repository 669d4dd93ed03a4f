//! Credential seeding utility for ESP32.
//!
//! Adds one network to the saved networks in NVS, so a device can join it
//! on first boot without going through the portal.
//!
//! Usage:
//!   WIFI_SSID="MyNetwork" WIFI_PASSWORD="secret123" cargo configure-wifi
//!
//! For open networks (no password):
//!   WIFI_SSID="OpenNetwork" WIFI_PASSWORD="" cargo configure-wifi
//!
//! Set `WIFI_RESET=1` to clear all saved networks first.

/// WiFi SSID - set via WIFI_SSID environment variable at compile time.
#[cfg(feature = "esp32")]
const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");

/// WiFi password - set via WIFI_PASSWORD environment variable at compile time.
/// Empty string for open networks.
#[cfg(feature = "esp32")]
const WIFI_PASSWORD: Option<&str> = option_env!("WIFI_PASSWORD");

/// Clear saved networks before adding.
#[cfg(feature = "esp32")]
const WIFI_RESET: Option<&str> = option_env!("WIFI_RESET");

/// Print error message and halt. On ESP32, we pause briefly then return
/// so the process terminates cleanly (espflash monitor will show the output).
#[cfg(feature = "esp32")]
fn halt_with_error(msg: &str) -> ! {
    eprintln!("\n{}", msg);
    eprintln!("\n=== Configuration failed ===\n");
    // Brief pause to ensure serial output is flushed before process exits
    std::thread::sleep(std::time::Duration::from_secs(2));
    std::process::exit(1);
}

#[cfg(feature = "esp32")]
fn main() {
    use wifi_picker::config::{ConfigError, PASSWORD_PLACEHOLDER};
    use wifi_picker::store::{NvsStorage, StoreError};
    use wifi_picker::CredentialStore;

    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!("\n=== WiFi Configuration Utility ===\n");

    let ssid = match WIFI_SSID {
        Some(s) if !s.is_empty() => s,
        _ => {
            halt_with_error(
                "Error: WIFI_SSID environment variable not set at compile time.\n\n\
                 Usage:\n  \
                 WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret123\" cargo configure-wifi\n\n\
                 For open networks:\n  \
                 WIFI_SSID=\"OpenNetwork\" WIFI_PASSWORD=\"\" cargo configure-wifi",
            );
        }
    };

    let password = WIFI_PASSWORD.unwrap_or("");

    println!("SSID: {}", ssid);
    println!(
        "Password: {} ({} chars)",
        if password.is_empty() {
            "(none)"
        } else {
            "****"
        },
        password.len()
    );

    let storage = match NvsStorage::take() {
        Ok(storage) => storage,
        Err(e) => halt_with_error(&format!("Error initializing NVS: {:?}", e)),
    };
    let mut store = CredentialStore::open(storage);

    if WIFI_RESET.is_some_and(|v| v == "1") {
        if let Err(e) = store.reset() {
            halt_with_error(&format!("Error clearing saved networks: {}", e));
        }
        println!("Cleared saved networks");
    }

    match store.add(ssid, password) {
        Ok(()) => {}
        Err(StoreError::Config(ConfigError::SsidTooLong { len, max })) => {
            halt_with_error(&format!(
                "Error: SSID too long ({} bytes, max {})",
                len, max
            ));
        }
        Err(StoreError::Config(ConfigError::PasswordTooLong { len, max })) => {
            halt_with_error(&format!(
                "Error: Password too long ({} bytes, max {})",
                len, max
            ));
        }
        Err(e) => halt_with_error(&format!("Error: {}", e)),
    }

    if store.get(ssid).is_some_and(|c| c.password() == PASSWORD_PLACEHOLDER)
        && password != PASSWORD_PLACEHOLDER
    {
        println!(
            "Warning: password shorter than 8 chars, stored as \"{}\"",
            PASSWORD_PLACEHOLDER
        );
    }

    println!("\n=== Saved networks ({}) ===", store.len());
    for (i, credential) in store.credentials().iter().enumerate() {
        println!("  {}. {}", i + 1, credential.ssid());
    }

    println!("\n=== Done - you can disconnect the device ===\n");

    // Brief pause to ensure serial output is visible, then exit cleanly
    std::thread::sleep(std::time::Duration::from_secs(2));
}

#[cfg(not(feature = "esp32"))]
fn main() {
    eprintln!("This binary must be built for ESP32.");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret123\" cargo configure-wifi");
    std::process::exit(1);
}
