//! ESP-IDF WiFi driver wrapper.
//!
//! Implements [`Station`] and [`AccessPoint`] on top of `EspWifi`. The
//! driver's own connect call is non-blocking; the station status is derived
//! from the driver state plus the reason code of the last disconnect event.

use super::{classify_disconnect_reason, AccessPoint, LinkStatus, RadioError, Station};
use crate::config::{chip_id_from_mac, AccessPointConfig};
use crate::provisioner::Restart;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent,
};
use esp_idf_sys::EspError;
use log::{info, warn};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

/// WiFi radio backed by ESP-IDF.
pub struct EspRadio<'a> {
    /// ESP-IDF WiFi driver.
    wifi: EspWifi<'a>,
    /// Reason code of the last station disconnect, consumed by `status`.
    disconnect_reason: Arc<Mutex<Option<u16>>>,
    /// Keeps the event subscription alive.
    _subscription: EspSubscription<'static, System>,
    /// Link was up during the current join.
    was_connected: bool,
    ap_address: Option<Ipv4Addr>,
}

impl<'a> EspRadio<'a> {
    /// Create the driver and subscribe to WiFi events.
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop.clone(), None)?;

        let disconnect_reason = Arc::new(Mutex::new(None));
        let reason_slot = disconnect_reason.clone();
        let subscription = sysloop.subscribe::<WifiEvent, _>(move |event| {
            if let WifiEvent::StaDisconnected(info) = event {
                if let Ok(mut slot) = reason_slot.lock() {
                    *slot = Some(info.reason() as u16);
                }
            }
        })?;

        Ok(Self {
            wifi,
            disconnect_reason,
            _subscription: subscription,
            was_connected: false,
            ap_address: None,
        })
    }

    /// Chip id derived from the station MAC.
    pub fn chip_id(&self) -> Result<u32, EspError> {
        let mac = self.wifi.sta_netif().get_mac()?;
        Ok(chip_id_from_mac(mac))
    }

    fn take_disconnect_reason(&self) -> Option<u16> {
        self.disconnect_reason
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
    }
}

impl Station for EspRadio<'_> {
    fn join(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| RadioError::InvalidSsid)?,
            password: password
                .try_into()
                .map_err(|_| RadioError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        self.take_disconnect_reason();
        self.was_connected = false;

        self.wifi.set_configuration(&config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        self.wifi.connect()?;
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        match self.wifi.is_started() {
            Ok(true) => {}
            Ok(false) => return LinkStatus::Disconnected,
            Err(_) => return LinkStatus::NoAdapter,
        }

        if let Some(code) = self.take_disconnect_reason() {
            return classify_disconnect_reason(code, self.was_connected);
        }

        match (self.wifi.is_connected(), self.wifi.sta_netif().is_up()) {
            (Ok(true), Ok(true)) => {
                self.was_connected = true;
                LinkStatus::Connected
            }
            (Err(_), _) | (_, Err(_)) => LinkStatus::Unknown,
            _ => LinkStatus::Disconnected,
        }
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        info!("Disconnecting from WiFi");
        self.wifi.disconnect()?;
        Ok(())
    }
}

impl AccessPoint for EspRadio<'_> {
    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<Ipv4Addr, RadioError> {
        let auth_method = if config.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let ap = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: config
                .ssid()
                .try_into()
                .map_err(|_| RadioError::InvalidSsid)?,
            password: config
                .passphrase()
                .try_into()
                .map_err(|_| RadioError::InvalidPassword)?,
            channel: config.channel(),
            ssid_hidden: config.hidden(),
            auth_method,
            ..Default::default()
        });

        if self.wifi.is_started()? {
            self.wifi.stop()?;
        }
        self.wifi.set_configuration(&ap)?;
        self.wifi.start()?;

        let ip = self.wifi.ap_netif().get_ip_info()?.ip;
        let address = Ipv4Addr::from(ip.octets());
        info!("AP \"{}\" started, IP address: {}", config.ssid(), address);
        self.ap_address = Some(address);
        Ok(address)
    }

    fn stop_access_point(&mut self) -> Result<(), RadioError> {
        if self.ap_address.take().is_some() {
            self.wifi.stop()?;
        }
        Ok(())
    }

    fn own_address(&self) -> Option<Ipv4Addr> {
        self.ap_address
    }
}

/// Device restart through ESP-IDF. Never returns.
#[derive(Debug, Default)]
pub struct EspRestart;

impl Restart for EspRestart {
    fn restart(&mut self) {
        warn!("Restarting device");
        esp_idf_hal::reset::restart();
    }
}
