//! Captive configuration portal.
//!
//! The portal is only started in provisioning mode. It answers every DNS
//! query with the access point's own address and serves a small page for
//! adding and removing saved networks.
//!
//! # HTTP Surface
//!
//! ```text
//! GET /                        saved networks + add form
//! GET /add?ssid=..&pass=..     save network, acknowledge, restart
//! GET /remove?ssid=..&pass=..  remove network (exact match), show root
//! anything else                same as /
//! ```
//!
//! Requests whose `Host` is not the access point address are redirected
//! there, which makes client devices pop up the portal.
//!
//! # Components
//!
//! - [`page`] - HTML rendering
//! - [`dns`] - captive DNS responder
//! - [`server`] - `tiny_http` transport implementing [`PortalTransport`]

pub mod dns;
pub mod page;
mod server;

pub use dns::DnsResponder;
pub use server::HttpPortal;

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default HTTP port of the portal.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default DNS port of the captive responder.
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Portal server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// Interface address to bind both servers to.
    pub bind: Ipv4Addr,
    /// HTTP port.
    pub http_port: u16,
    /// DNS port, `None` disables the responder.
    pub dns_port: Option<u16>,
    /// How long one HTTP poll waits for a request.
    pub poll_timeout: Duration,
    /// TTL of DNS answers in seconds.
    pub dns_ttl: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind: Ipv4Addr::UNSPECIFIED,
            http_port: DEFAULT_HTTP_PORT,
            dns_port: Some(DEFAULT_DNS_PORT),
            poll_timeout: Duration::from_millis(20),
            dns_ttl: 60,
        }
    }
}

/// Incoming portal request, reduced to what routing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest {
    path: String,
    query: Vec<(String, String)>,
    host: Option<String>,
}

impl PortalRequest {
    /// Parse a request target such as `/add?ssid=Home&pass=secret`.
    ///
    /// Query values are percent-decoded and `+` decodes to a space.
    pub fn from_url(url: &str, host: Option<&str>) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };

        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect();

        Self {
            path: path.to_string(),
            query,
            host: host.map(str::to_string),
        }
    }

    /// Request path without the query.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `Host` header, if sent.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// First value of a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Check whether the request was addressed to the access point itself.
    ///
    /// A `Host` with a port suffix still counts as addressed to it.
    pub fn is_for(&self, address: Ipv4Addr) -> bool {
        let Some(host) = self.host() else {
            return false;
        };
        let host = host.rsplit_once(':').map_or(host, |(name, _)| name);
        host.parse::<Ipv4Addr>() == Ok(address)
    }
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

/// What the portal is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Show saved networks and the add form.
    Root,
    /// Save a network.
    Add { ssid: String, password: String },
    /// Remove a network.
    Remove { ssid: String, password: String },
}

/// Map a request to its route. Unknown paths are [`Route::Root`].
pub fn route(request: &PortalRequest) -> Route {
    let ssid = || request.param("ssid").unwrap_or_default().to_string();
    let password = || request.param("pass").unwrap_or_default().to_string();

    match request.path() {
        "/add" => Route::Add {
            ssid: ssid(),
            password: password(),
        },
        "/remove" => Route::Remove {
            ssid: ssid(),
            password: password(),
        },
        _ => Route::Root,
    }
}

/// Response handed back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalResponse {
    /// HTML page.
    Html { status: u16, body: String },
    /// `302` redirect.
    Redirect { location: String },
}

impl PortalResponse {
    /// `200` HTML page.
    pub fn page(body: String) -> Self {
        Self::Html { status: 200, body }
    }

    /// Redirect to the portal root on the access point.
    pub fn captive_redirect(address: Ipv4Addr) -> Self {
        Self::Redirect {
            location: format!("http://{}", address),
        }
    }

    /// HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Html { status, .. } => *status,
            Self::Redirect { .. } => 302,
        }
    }
}

/// Request handler invoked by the transport.
pub type Handler<'a> = dyn FnMut(&PortalRequest) -> PortalResponse + 'a;

/// Transport serving the portal.
///
/// The provisioner calls both methods alternately from a single thread.
pub trait PortalTransport {
    /// Answer at most one pending DNS query. Returns whether one was handled.
    fn process_dns(&mut self) -> Result<bool, PortalError>;

    /// Wait briefly for one HTTP request and answer it with `handler`.
    /// Returns whether a request was handled.
    fn handle_client(&mut self, handler: &mut Handler<'_>) -> Result<bool, PortalError>;
}

/// Errors from the portal transport.
#[derive(Debug)]
pub enum PortalError {
    /// Socket I/O error.
    Io(std::io::Error),
    /// HTTP server could not be started.
    Bind(String),
    /// Response header could not be built.
    Header(String),
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Bind(msg) => write!(f, "failed to start HTTP server: {}", msg),
            Self::Header(name) => write!(f, "invalid header: {}", name),
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PortalError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    #[test]
    fn test_parse_query() {
        let request = PortalRequest::from_url("/add?ssid=My%20Net&pass=p%40ss+word", None);
        assert_eq!(request.path(), "/add");
        assert_eq!(request.param("ssid"), Some("My Net"));
        assert_eq!(request.param("pass"), Some("p@ss word"));
        assert_eq!(request.param("other"), None);
    }

    #[test]
    fn test_parse_encoded_plus() {
        let request = PortalRequest::from_url("/add?ssid=a%2Bb", None);
        assert_eq!(request.param("ssid"), Some("a+b"));
    }

    #[test]
    fn test_parse_without_query() {
        let request = PortalRequest::from_url("/", Some("192.168.4.1"));
        assert_eq!(request.path(), "/");
        assert_eq!(request.param("ssid"), None);
    }

    #[test]
    fn test_route_add_and_remove() {
        let add = PortalRequest::from_url("/add?ssid=home&pass=password123", None);
        assert_eq!(
            route(&add),
            Route::Add {
                ssid: "home".into(),
                password: "password123".into()
            }
        );

        let remove = PortalRequest::from_url("/remove?ssid=home", None);
        assert_eq!(
            route(&remove),
            Route::Remove {
                ssid: "home".into(),
                password: String::new()
            }
        );
    }

    #[test]
    fn test_unknown_path_routes_to_root() {
        let request = PortalRequest::from_url("/generate_204", None);
        assert_eq!(route(&request), Route::Root);
    }

    #[test]
    fn test_is_for_access_point() {
        assert!(PortalRequest::from_url("/", Some("192.168.4.1")).is_for(AP));
        assert!(PortalRequest::from_url("/", Some("192.168.4.1:80")).is_for(AP));
        assert!(!PortalRequest::from_url("/", Some("connectivitycheck.gstatic.com")).is_for(AP));
        assert!(!PortalRequest::from_url("/", None).is_for(AP));
    }

    #[test]
    fn test_captive_redirect() {
        let response = PortalResponse::captive_redirect(AP);
        assert_eq!(response.status_code(), 302);
        assert_eq!(
            response,
            PortalResponse::Redirect {
                location: "http://192.168.4.1".into()
            }
        );
    }
}
