//! Portal transport over `tiny_http` and UDP.
//!
//! Uses `tiny_http` which works on both host and ESP32 (via std::net). The
//! server is polled from the provisioner's thread; no worker threads are
//! spawned here.

use super::{
    DnsResponder, Handler, PortalConfig, PortalError, PortalRequest, PortalResponse,
    PortalTransport,
};
use log::{info, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

/// HTTP portal plus captive DNS responder.
pub struct HttpPortal {
    server: Server,
    dns: Option<DnsResponder>,
    poll_timeout: Duration,
}

impl HttpPortal {
    /// Start both servers for an access point at `address`.
    ///
    /// A DNS bind failure is logged and the portal runs without it; an HTTP
    /// bind failure is an error.
    pub fn start(address: Ipv4Addr, config: &PortalConfig) -> Result<Self, PortalError> {
        let http_addr = SocketAddr::from((config.bind, config.http_port));
        let server = Server::http(http_addr).map_err(|e| PortalError::Bind(e.to_string()))?;
        info!("HTTP server started on {}", http_addr);

        let dns = match config.dns_port {
            Some(port) => {
                let dns_addr = SocketAddr::from((config.bind, port));
                match DnsResponder::bind(dns_addr, address, config.dns_ttl) {
                    Ok(dns) => {
                        info!("DNS responder on {} answering {}", dns_addr, address);
                        Some(dns)
                    }
                    Err(e) => {
                        warn!("Failed to start DNS responder on {}: {}", dns_addr, e);
                        warn!("Continuing without captive DNS");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(Self {
            server,
            dns,
            poll_timeout: config.poll_timeout,
        })
    }

    /// Address the HTTP server listens on.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Check whether the DNS responder is running.
    pub fn has_dns(&self) -> bool {
        self.dns.is_some()
    }

    fn respond(request: Request, response: PortalResponse) -> Result<(), PortalError> {
        let result = match response {
            PortalResponse::Html { status, body } => {
                let content_type = header("Content-Type", "text/html; charset=utf-8")?;
                request.respond(
                    Response::from_string(body)
                        .with_status_code(status)
                        .with_header(content_type),
                )
            }
            PortalResponse::Redirect { location } => {
                let location = header("Location", &location)?;
                request.respond(
                    Response::from_string("")
                        .with_status_code(302)
                        .with_header(location),
                )
            }
        };

        if let Err(e) = result {
            warn!("Failed to send response: {}", e);
        }
        Ok(())
    }
}

fn header(name: &str, value: &str) -> Result<Header, PortalError> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|_| PortalError::Header(name.to_string()))
}

impl PortalTransport for HttpPortal {
    fn process_dns(&mut self) -> Result<bool, PortalError> {
        match &self.dns {
            Some(dns) => Ok(dns.process_next_request()?),
            None => Ok(false),
        }
    }

    fn handle_client(&mut self, handler: &mut Handler<'_>) -> Result<bool, PortalError> {
        let Some(request) = self.server.recv_timeout(self.poll_timeout)? else {
            return Ok(false);
        };

        let host = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Host"))
            .map(|h| h.value.as_str().to_string());
        let portal_request = PortalRequest::from_url(request.url(), host.as_deref());

        let response = handler(&portal_request);
        Self::respond(request, response)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::thread;

    const AP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    fn local_config() -> PortalConfig {
        PortalConfig {
            bind: Ipv4Addr::LOCALHOST,
            http_port: 0,
            dns_port: None,
            poll_timeout: Duration::from_millis(20),
            dns_ttl: 60,
        }
    }

    fn fetch(addr: SocketAddr, target: &str, host: &str) -> thread::JoinHandle<String> {
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            target, host
        );
        thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(request.as_bytes()).unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).unwrap();
            response
        })
    }

    fn serve_one(portal: &mut HttpPortal, handler: &mut Handler<'_>) {
        for _ in 0..250 {
            if portal.handle_client(handler).unwrap() {
                return;
            }
        }
        panic!("no request received");
    }

    #[test]
    fn test_idle_poll_returns_false() {
        let mut portal = HttpPortal::start(AP, &local_config()).unwrap();
        let mut handler = |_: &PortalRequest| PortalResponse::page(String::new());
        assert!(!portal.handle_client(&mut handler).unwrap());
        assert!(!portal.process_dns().unwrap());
        assert!(!portal.has_dns());
    }

    #[test]
    fn test_request_reaches_handler() {
        let mut portal = HttpPortal::start(AP, &local_config()).unwrap();
        let client = fetch(portal.http_addr().unwrap(), "/add?ssid=home&pass=x", "10.0.0.1");

        let mut seen = None;
        let mut handler = |request: &PortalRequest| {
            seen = Some(request.clone());
            PortalResponse::page("ok".into())
        };
        serve_one(&mut portal, &mut handler);

        let response = client.join().unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));

        let request = seen.unwrap();
        assert_eq!(request.path(), "/add");
        assert_eq!(request.param("ssid"), Some("home"));
        assert!(request.is_for(AP));
    }

    #[test]
    fn test_redirect_response() {
        let mut portal = HttpPortal::start(AP, &local_config()).unwrap();
        let client = fetch(portal.http_addr().unwrap(), "/", "example.com");

        let mut handler = |_: &PortalRequest| PortalResponse::captive_redirect(AP);
        serve_one(&mut portal, &mut handler);

        let response = client.join().unwrap();
        assert!(response.starts_with("HTTP/1.1 302"));
        assert!(response.contains("Location: http://10.0.0.1"));
    }
}
