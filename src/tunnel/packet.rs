//! Defensive IP/UDP datagram framing.
//!
//! Parsing never panics on malformed input; anything that does not parse is
//! reported as `None` and forwarded unchanged by the caller.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::{DNS_PORT, IP_PROTOCOL_TCP, IP_PROTOCOL_UDP};

/// Transient per-datagram parse result. Lives for one packet, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketView {
    pub ip_version: u8,
    pub protocol: u8,
    pub source: IpAddr,
    pub dest: IpAddr,
    pub source_port: u16,
    pub dest_port: u16,
    /// Start of the UDP payload within the datagram. `None` for TCP.
    pub udp_payload_offset: Option<usize>,
}

impl PacketView {
    /// A DNS candidate is a UDP datagram addressed to port 53.
    pub fn is_dns_candidate(&self) -> bool {
        self.protocol == IP_PROTOCOL_UDP && self.dest_port == DNS_PORT
    }
}

/// Parse the IP and transport framing of a datagram.
///
/// Returns `None` for unknown IP versions, non-TCP/UDP transports, and
/// truncated packets. IPv6 extension headers are not walked; a next-header
/// that is not TCP/UDP simply fails to parse and passes through.
pub fn parse_packet(data: &[u8]) -> Option<PacketView> {
    if data.is_empty() {
        return None;
    }

    let version = data[0] >> 4;
    let (protocol, header_len, source, dest) = match version {
        4 => {
            if data.len() < 20 {
                return None;
            }
            let ihl = ((data[0] & 0x0F) as usize) * 4;
            if ihl < 20 || data.len() < ihl {
                return None;
            }
            let source = IpAddr::V4(Ipv4Addr::new(data[12], data[13], data[14], data[15]));
            let dest = IpAddr::V4(Ipv4Addr::new(data[16], data[17], data[18], data[19]));
            (data[9], ihl, source, dest)
        }
        6 => {
            if data.len() < 40 {
                return None;
            }
            let source = IpAddr::V6(Ipv6Addr::from(
                <[u8; 16]>::try_from(&data[8..24]).ok()?,
            ));
            let dest = IpAddr::V6(Ipv6Addr::from(
                <[u8; 16]>::try_from(&data[24..40]).ok()?,
            ));
            (data[6], 40, source, dest)
        }
        _ => return None,
    };

    if protocol != IP_PROTOCOL_UDP && protocol != IP_PROTOCOL_TCP {
        return None;
    }
    if data.len() < header_len + 4 {
        return None;
    }
    let source_port = u16::from_be_bytes([data[header_len], data[header_len + 1]]);
    let dest_port = u16::from_be_bytes([data[header_len + 2], data[header_len + 3]]);

    let udp_payload_offset = if protocol == IP_PROTOCOL_UDP {
        if data.len() < header_len + 8 {
            return None;
        }
        Some(header_len + 8)
    } else {
        None
    };

    Some(PacketView {
        ip_version: version,
        protocol,
        source,
        dest,
        source_port,
        dest_port,
        udp_payload_offset,
    })
}
