//! Provisioning orchestrator.
//!
//! Tries every saved network in priority order and, if none can be joined,
//! brings up the fallback access point and serves the captive portal until
//! a network is added (followed by a restart) or the caller shuts it down.
//!
//! # States
//!
//! ```text
//! Scanning ──(attempt joined)──────────► Joined { ssid }
//!    │
//!    └──(all attempts failed)──────────► Provisioning { address }
//!                                            │
//!                                            └─(network added)─► restart
//! ```
//!
//! # Example
//!
//! ```
//! use wifi_picker::config::AccessPointConfig;
//! use wifi_picker::provisioner::{Provisioner, ProvisionerConfig, Restart};
//! use wifi_picker::store::MemoryStorage;
//! use wifi_picker::wifi::SimulatedRadio;
//!
//! struct NoRestart;
//! impl Restart for NoRestart {
//!     fn restart(&mut self) {}
//! }
//!
//! let radio = SimulatedRadio::new().with_network("home", "password123");
//! let storage = MemoryStorage::with_record("home\r\npassword123\r\n");
//! let mut provisioner = Provisioner::new(
//!     radio,
//!     storage,
//!     NoRestart,
//!     AccessPointConfig::for_chip(1),
//!     ProvisionerConfig::default(),
//! );
//! assert!(provisioner.start().unwrap());
//! ```

use crate::config::AccessPointConfig;
use crate::portal::page::{render_rebooting, render_root};
use crate::portal::{
    route, PortalError, PortalRequest, PortalResponse, PortalTransport, Route,
};
use crate::store::{CredentialStore, Storage};
use crate::wifi::{attempt, AccessPoint, AttemptConfig, RadioError, Station};
use log::{info, warn};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default pause between acknowledging an add and restarting.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(500);

/// Device restart capability.
///
/// On the device this never returns. Other implementations may return, in
/// which case [`Provisioner::serve`] reports [`ServeExit::Restarted`].
pub trait Restart {
    /// Restart the device.
    fn restart(&mut self);
}

/// Provisioner tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Timing of each join attempt.
    pub attempt: AttemptConfig,
    /// Pause after acknowledging an add, so the response reaches the client.
    pub restart_delay: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            attempt: AttemptConfig::default(),
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }
}

/// Where the provisioner is in the boot cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionerState {
    /// Trying saved networks.
    Scanning,
    /// Joined a saved network.
    Joined { ssid: String },
    /// Fallback access point is up.
    Provisioning { address: Ipv4Addr },
}

/// Why [`Provisioner::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// A network was added and the restart capability returned.
    Restarted,
    /// The shutdown token was triggered.
    Shutdown,
}

/// Result of [`Provisioner::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A saved network was joined.
    Joined,
    /// The portal ran and ended.
    Served(ServeExit),
}

/// Cross-thread stop signal for the portal loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the portal loop to stop.
    pub fn trigger(&self) {
        // Release so the serving thread sees the write
        self.0.store(true, Ordering::Release);
    }

    /// Check whether stop was requested.
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Owns the radio, the credential store and the restart capability for one
/// boot cycle.
pub struct Provisioner<R, S: Storage, X> {
    radio: R,
    store: CredentialStore<S>,
    restart: X,
    access_point: AccessPointConfig,
    config: ProvisionerConfig,
    state: ProvisionerState,
    restart_pending: bool,
}

impl<R, S, X> Provisioner<R, S, X>
where
    R: Station + AccessPoint,
    S: Storage,
    X: Restart,
{
    /// Take ownership of the device resources.
    ///
    /// Any access point left running is stopped. The store is not read until
    /// [`start`](Self::start).
    pub fn new(
        mut radio: R,
        storage: S,
        restart: X,
        access_point: AccessPointConfig,
        config: ProvisionerConfig,
    ) -> Self {
        if let Err(e) = radio.stop_access_point() {
            warn!("Failed to stop access point: {}", e);
        }

        Self {
            radio,
            store: CredentialStore::new(storage),
            restart,
            access_point,
            config,
            state: ProvisionerState::Scanning,
            restart_pending: false,
        }
    }

    /// Try the saved networks, falling back to the access point.
    ///
    /// Returns `true` once a network is joined; later entries are not tried.
    /// Returns `false` after the access point has been started. Attempts run
    /// strictly one after another.
    pub fn start(&mut self) -> Result<bool, ProvisionError> {
        self.state = ProvisionerState::Scanning;
        self.store.load();
        info!("Trying {} saved networks", self.store.len());

        for credential in self.store.credentials() {
            let outcome = attempt(&mut self.radio, credential, self.config.attempt);
            if outcome.is_joined() {
                self.state = ProvisionerState::Joined {
                    ssid: credential.ssid().to_string(),
                };
                return Ok(true);
            }
        }

        self.enter_fallback()?;
        Ok(false)
    }

    /// Start the fallback access point.
    pub fn enter_fallback(&mut self) -> Result<Ipv4Addr, ProvisionError> {
        info!("Creating AP \"{}\"", self.access_point.ssid());
        if let Err(e) = self.radio.disconnect() {
            warn!("Failed to disconnect station: {}", e);
        }

        let address = self.radio.start_access_point(&self.access_point)?;
        info!("AP IP address: {}", address);
        self.state = ProvisionerState::Provisioning { address };
        Ok(address)
    }

    /// Serve the portal until a restart or shutdown.
    ///
    /// Each iteration answers one DNS query, then at most one HTTP request.
    pub fn serve<T>(
        &mut self,
        portal: &mut T,
        shutdown: &ShutdownToken,
    ) -> Result<ServeExit, ProvisionError>
    where
        T: PortalTransport + ?Sized,
    {
        if self.ap_address().is_none() {
            return Err(ProvisionError::NotProvisioning);
        }
        info!("Serving configuration portal");

        loop {
            if shutdown.is_triggered() {
                info!("Portal shutting down");
                return Ok(ServeExit::Shutdown);
            }

            if let Err(e) = portal.process_dns() {
                warn!("DNS error: {}", e);
            }

            let mut handler = |request: &PortalRequest| self.handle_request(request);
            if let Err(e) = portal.handle_client(&mut handler) {
                warn!("HTTP error: {}", e);
            }

            if self.restart_pending {
                self.restart_pending = false;
                std::thread::sleep(self.config.restart_delay);
                info!("Restarting to apply new network");
                self.restart.restart();
                return Ok(ServeExit::Restarted);
            }
        }
    }

    /// [`start`](Self::start), then serve a portal opened for the AP address
    /// if no network was joined.
    pub fn run<T, F>(
        &mut self,
        open_portal: F,
        shutdown: &ShutdownToken,
    ) -> Result<RunOutcome, ProvisionError>
    where
        T: PortalTransport,
        F: FnOnce(Ipv4Addr) -> Result<T, PortalError>,
    {
        if self.start()? {
            return Ok(RunOutcome::Joined);
        }
        let address = self.ap_address().ok_or(ProvisionError::NotProvisioning)?;
        let mut portal = open_portal(address)?;
        let exit = self.serve(&mut portal, shutdown)?;
        Ok(RunOutcome::Served(exit))
    }

    /// Answer one portal request.
    pub fn handle_request(&mut self, request: &PortalRequest) -> PortalResponse {
        let Some(address) = self.ap_address() else {
            return PortalResponse::page(render_root(self.store.credentials()));
        };

        match route(request) {
            Route::Add { ssid, password } => {
                info!("Portal add \"{}\" ({} char password)", ssid, password.len());
                match self.store.add(&ssid, &password) {
                    Ok(()) => {
                        self.restart_pending = true;
                        PortalResponse::page(render_rebooting())
                    }
                    Err(e) => {
                        warn!("Rejected network \"{}\": {}", ssid, e);
                        self.root(request, address)
                    }
                }
            }
            Route::Remove { ssid, password } => {
                if let Err(e) = self.store.remove(&ssid, &password) {
                    warn!("Failed to remove network \"{}\": {}", ssid, e);
                }
                self.root(request, address)
            }
            Route::Root => self.root(request, address),
        }
    }

    fn root(&self, request: &PortalRequest, address: Ipv4Addr) -> PortalResponse {
        if request.is_for(address) {
            PortalResponse::page(render_root(self.store.credentials()))
        } else {
            PortalResponse::captive_redirect(address)
        }
    }

    /// Stop the access point and drop any station link.
    pub fn shutdown(&mut self) -> Result<(), ProvisionError> {
        self.radio.stop_access_point()?;
        self.radio.disconnect()?;
        self.state = ProvisionerState::Scanning;
        Ok(())
    }

    /// Current state.
    pub fn state(&self) -> &ProvisionerState {
        &self.state
    }

    /// Address of the fallback access point while provisioning.
    pub fn ap_address(&self) -> Option<Ipv4Addr> {
        match self.state {
            ProvisionerState::Provisioning { address } => Some(address),
            _ => None,
        }
    }

    /// Fallback access point settings.
    pub fn access_point(&self) -> &AccessPointConfig {
        &self.access_point
    }

    /// Saved networks.
    pub fn store(&self) -> &CredentialStore<S> {
        &self.store
    }

    /// Saved networks, mutable (e.g. for a factory reset).
    pub fn store_mut(&mut self) -> &mut CredentialStore<S> {
        &mut self.store
    }

    /// The radio.
    pub fn radio(&self) -> &R {
        &self.radio
    }
}

/// Errors that end provisioning.
#[derive(Debug)]
pub enum ProvisionError {
    /// Radio failed (access point could not be started).
    Radio(RadioError),
    /// Portal transport failed.
    Portal(PortalError),
    /// The portal was asked to serve outside provisioning mode.
    NotProvisioning,
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(e) => write!(f, "radio error: {}", e),
            Self::Portal(e) => write!(f, "portal error: {}", e),
            Self::NotProvisioning => write!(f, "access point is not running"),
        }
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Radio(e) => Some(e),
            Self::Portal(e) => Some(e),
            Self::NotProvisioning => None,
        }
    }
}

impl From<RadioError> for ProvisionError {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

impl From<PortalError> for ProvisionError {
    fn from(e: PortalError) -> Self {
        Self::Portal(e)
    }
}
