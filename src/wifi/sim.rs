//! Simulated radio.
//!
//! Stands in for the WiFi hardware on the host. Networks are registered up
//! front; a join resolves after a configurable number of "still negotiating"
//! samples, so the polling path is exercised the same way as on the device.

use super::{AccessPoint, LinkStatus, RadioError, Station};
use crate::config::AccessPointConfig;
use log::info;
use std::net::Ipv4Addr;

#[derive(Debug, Clone)]
struct Network {
    ssid: String,
    password: String,
    stalled: bool,
}

/// Host-side radio with scripted networks.
#[derive(Debug, Clone)]
pub struct SimulatedRadio {
    networks: Vec<Network>,
    negotiate_polls: u32,
    adapter_present: bool,
    pending: Option<(String, String)>,
    polls: u32,
    connected: Option<String>,
    joins: Vec<String>,
    ap_address: Ipv4Addr,
    access_point: Option<AccessPointConfig>,
}

impl SimulatedRadio {
    /// Radio with no networks in range.
    pub fn new() -> Self {
        Self {
            networks: Vec::new(),
            negotiate_polls: 0,
            adapter_present: true,
            pending: None,
            polls: 0,
            connected: None,
            joins: Vec::new(),
            ap_address: Ipv4Addr::new(192, 168, 4, 1),
            access_point: None,
        }
    }

    /// Put a network in range.
    pub fn with_network(mut self, ssid: impl Into<String>, password: impl Into<String>) -> Self {
        self.networks.push(Network {
            ssid: ssid.into(),
            password: password.into(),
            stalled: false,
        });
        self
    }

    /// Put a network in range that never finishes negotiating.
    pub fn with_stalled_network(mut self, ssid: impl Into<String>) -> Self {
        self.networks.push(Network {
            ssid: ssid.into(),
            password: String::new(),
            stalled: true,
        });
        self
    }

    /// Report `Disconnected` this many times before resolving a join.
    pub fn with_negotiation(mut self, polls: u32) -> Self {
        self.negotiate_polls = polls;
        self
    }

    /// Simulate missing WiFi hardware.
    pub fn without_adapter(mut self) -> Self {
        self.adapter_present = false;
        self
    }

    /// Address reported by the access point.
    pub fn with_ap_address(mut self, address: Ipv4Addr) -> Self {
        self.ap_address = address;
        self
    }

    /// SSIDs passed to `join`, in order.
    pub fn joins(&self) -> &[String] {
        &self.joins
    }

    /// Network currently joined.
    pub fn connected(&self) -> Option<&str> {
        self.connected.as_deref()
    }

    /// Configuration of the running access point.
    pub fn access_point(&self) -> Option<&AccessPointConfig> {
        self.access_point.as_ref()
    }
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Station for SimulatedRadio {
    fn join(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        self.joins.push(ssid.to_string());
        self.connected = None;
        self.polls = 0;
        self.pending = Some((ssid.to_string(), password.to_string()));
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        if !self.adapter_present {
            return LinkStatus::NoAdapter;
        }
        if self.connected.is_some() {
            return LinkStatus::Connected;
        }
        let Some((ssid, password)) = &self.pending else {
            return LinkStatus::Disconnected;
        };

        self.polls += 1;
        if self.polls <= self.negotiate_polls {
            return LinkStatus::Disconnected;
        }

        let status = match self.networks.iter().find(|n| &n.ssid == ssid) {
            None => LinkStatus::NoSuchNetwork,
            Some(network) if network.stalled => LinkStatus::Unknown,
            Some(network) if &network.password != password => LinkStatus::ConnectFailed,
            Some(_) => LinkStatus::Connected,
        };

        if status == LinkStatus::Connected {
            self.connected = Some(ssid.clone());
            self.pending = None;
        } else if status != LinkStatus::Unknown {
            self.pending = None;
        }
        status
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        self.pending = None;
        self.connected = None;
        Ok(())
    }
}

impl AccessPoint for SimulatedRadio {
    fn start_access_point(&mut self, config: &AccessPointConfig) -> Result<Ipv4Addr, RadioError> {
        if !self.adapter_present {
            return Err(RadioError::Unavailable("no adapter".into()));
        }
        info!(
            "Simulated AP \"{}\" up on channel {} at {}",
            config.ssid(),
            config.channel(),
            self.ap_address
        );
        self.access_point = Some(config.clone());
        Ok(self.ap_address)
    }

    fn stop_access_point(&mut self) -> Result<(), RadioError> {
        self.access_point = None;
        Ok(())
    }

    fn own_address(&self) -> Option<Ipv4Addr> {
        self.access_point.as_ref().map(|_| self.ap_address)
    }
}
