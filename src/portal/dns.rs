//! Captive DNS responder.
//!
//! Answers every standard query for an A (or ANY) record with the access
//! point's own address, so any hostname a client looks up leads to the
//! portal. Other record types get an empty NOERROR answer. Malformed
//! packets and responses are dropped.
//!
//! # Packet Layout
//!
//! ```text
//! [header: 12 bytes][question: qname + qtype:2 + qclass:2][answer]
//!
//! answer: [name ptr 0xC00C:2][type A:2][class IN:2][ttl:4][rdlength 4:2][ipv4:4]
//! ```

use log::{debug, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

/// DNS header length in bytes.
pub const HEADER_LEN: usize = 12;

/// Largest query accepted (classic UDP DNS limit).
pub const MAX_PACKET_LEN: usize = 512;

const TYPE_A: u16 = 1;
const TYPE_ANY: u16 = 255;
const CLASS_IN: u16 = 1;

/// QR flag in the first flags byte.
const FLAG_QR: u8 = 0x80;
/// AA flag in the first flags byte.
const FLAG_AA: u8 = 0x04;
/// RD flag in the first flags byte.
const FLAG_RD: u8 = 0x01;
/// RA flag in the second flags byte.
const FLAG_RA: u8 = 0x80;

/// Build the answer to `query`, or `None` if it should be dropped.
pub fn build_response(query: &[u8], address: Ipv4Addr, ttl: u32) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN || query.len() > MAX_PACKET_LEN {
        return None;
    }

    // Responses and non-standard opcodes are ignored
    if query[2] & FLAG_QR != 0 || (query[2] >> 3) & 0x0F != 0 {
        return None;
    }

    let qdcount = u16::from_be_bytes([query[4], query[5]]);
    if qdcount != 1 {
        return None;
    }

    let question_end = question_end(query)?;
    let qtype = u16::from_be_bytes([query[question_end - 4], query[question_end - 3]]);
    let answer = qtype == TYPE_A || qtype == TYPE_ANY;

    let mut response = Vec::with_capacity(question_end + 16);
    response.extend_from_slice(&query[0..2]);
    response.push(FLAG_QR | FLAG_AA | (query[2] & FLAG_RD));
    response.push(FLAG_RA);
    response.extend_from_slice(&1u16.to_be_bytes());
    response.extend_from_slice(&u16::from(answer).to_be_bytes());
    response.extend_from_slice(&[0, 0, 0, 0]);
    response.extend_from_slice(&query[HEADER_LEN..question_end]);

    if answer {
        response.extend_from_slice(&[0xC0, 0x0C]);
        response.extend_from_slice(&TYPE_A.to_be_bytes());
        response.extend_from_slice(&CLASS_IN.to_be_bytes());
        response.extend_from_slice(&ttl.to_be_bytes());
        response.extend_from_slice(&4u16.to_be_bytes());
        response.extend_from_slice(&address.octets());
    }

    Some(response)
}

/// Offset just past the question section (qname, qtype, qclass).
fn question_end(query: &[u8]) -> Option<usize> {
    let mut pos = HEADER_LEN;
    loop {
        let len = *query.get(pos)? as usize;
        if len == 0 {
            pos += 1;
            break;
        }
        // Compression pointers are not valid in a question name here
        if len & 0xC0 != 0 {
            return None;
        }
        pos += 1 + len;
    }
    let end = pos + 4;
    (end <= query.len()).then_some(end)
}

/// UDP responder bound next to the portal.
#[derive(Debug)]
pub struct DnsResponder {
    socket: UdpSocket,
    address: Ipv4Addr,
    ttl: u32,
}

impl DnsResponder {
    /// Bind the responder. The socket is non-blocking.
    pub fn bind(bind: SocketAddr, address: Ipv4Addr, ttl: u32) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            address,
            ttl,
        })
    }

    /// Address the responder is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Answer at most one pending query. Returns whether a packet was read.
    pub fn process_next_request(&self) -> io::Result<bool> {
        let mut buf = [0u8; MAX_PACKET_LEN];
        let (len, peer) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(e) => return Err(e),
        };

        match build_response(&buf[..len], self.address, self.ttl) {
            Some(response) => {
                if let Err(e) = self.socket.send_to(&response, peer) {
                    warn!("Failed to answer DNS query from {}: {}", peer, e);
                }
            }
            None => debug!("Dropped {} byte DNS packet from {}", len, peer),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const AP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    fn query(name: &str, qtype: u16) -> Vec<u8> {
        let mut packet = vec![0x12, 0x34, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
        for label in name.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0);
        packet.extend_from_slice(&qtype.to_be_bytes());
        packet.extend_from_slice(&CLASS_IN.to_be_bytes());
        packet
    }

    #[test]
    fn test_a_query_answered_with_ap_address() {
        let query = query("example.com", TYPE_A);
        let response = build_response(&query, AP, 60).unwrap();

        assert_eq!(&response[0..2], &[0x12, 0x34]);
        assert_eq!(response[2], FLAG_QR | FLAG_AA | FLAG_RD);
        assert_eq!(&response[4..8], &[0, 1, 0, 1]);
        assert_eq!(&response[HEADER_LEN..query.len()], &query[HEADER_LEN..]);

        let answer = &response[query.len()..];
        assert_eq!(
            answer,
            &[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4, 192, 168, 4, 1]
        );
    }

    #[test]
    fn test_aaaa_query_gets_empty_answer() {
        let query = query("example.com", 28);
        let response = build_response(&query, AP, 60).unwrap();
        assert_eq!(&response[6..8], &[0, 0]);
        assert_eq!(response.len(), query.len());
    }

    #[test]
    fn test_truncated_query_dropped() {
        let mut query = query("example.com", TYPE_A);
        query.truncate(query.len() - 3);
        assert!(build_response(&query, AP, 60).is_none());
        assert!(build_response(&[0x12, 0x34], AP, 60).is_none());
    }

    #[test]
    fn test_response_packet_dropped() {
        let mut query = query("example.com", TYPE_A);
        query[2] |= FLAG_QR;
        assert!(build_response(&query, AP, 60).is_none());
    }

    #[test]
    fn test_multiple_questions_dropped() {
        let mut query = query("example.com", TYPE_A);
        query[5] = 2;
        assert!(build_response(&query, AP, 60).is_none());
    }

    #[test]
    fn test_responder_over_udp() {
        let responder = DnsResponder::bind("127.0.0.1:0".parse().unwrap(), AP, 60).unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        assert!(!responder.process_next_request().unwrap());

        client
            .send_to(&query("captive.test", TYPE_A), responder.local_addr().unwrap())
            .unwrap();

        let mut handled = false;
        for _ in 0..200 {
            if responder.process_next_request().unwrap() {
                handled = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handled);

        let mut buf = [0u8; MAX_PACKET_LEN];
        let (len, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[len - 4..len], &[192, 168, 4, 1]);
    }
}
