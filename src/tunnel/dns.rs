//! DNS query inspection and in-place NXDOMAIN synthesis.
//!
//! Only the question section of a standard query is examined. The name is a
//! label-length-prefixed sequence terminated by a zero byte (RFC 1035 wire
//! format); anything that deviates — compression in the question, overlong
//! names, truncation — is treated as unparseable and passed through.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::config::IP_PROTOCOL_UDP;
use crate::tunnel::packet::PacketView;

const DNS_HEADER_LEN: usize = 12;
const MAX_NAME_LEN: usize = 253;
const RCODE_NXDOMAIN: u8 = 3;

/// Extract the queried name from a DNS message, normalized to lowercase
/// dotted form. `None` when the message is not a parseable query.
pub fn parse_query_name(message: &[u8]) -> Option<String> {
    if message.len() < DNS_HEADER_LEN {
        return None;
    }
    // Responses (QR set) and empty question sections carry no name to check.
    if message[2] & 0x80 != 0 {
        return None;
    }
    let qdcount = u16::from_be_bytes([message[4], message[5]]);
    if qdcount == 0 {
        return None;
    }

    let mut name = String::new();
    let mut pos = DNS_HEADER_LEN;
    loop {
        let len = *message.get(pos)? as usize;
        if len == 0 {
            break;
        }
        // Compression pointers never start a question name in a query.
        if len & 0xC0 != 0 {
            return None;
        }
        let label = message.get(pos + 1..pos + 1 + len)?;
        if !name.is_empty() {
            name.push('.');
        }
        for &byte in label {
            name.push(char::from(byte.to_ascii_lowercase()));
        }
        if name.len() > MAX_NAME_LEN {
            return None;
        }
        pos += 1 + len;
    }

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// True when the name itself or any parent-domain suffix is listed.
pub fn name_is_blocked(name: &str, blocked: &HashSet<String>) -> bool {
    let mut suffix = name;
    loop {
        if blocked.contains(suffix) {
            return true;
        }
        match suffix.split_once('.') {
            Some((_, rest)) if !rest.is_empty() => suffix = rest,
            _ => return false,
        }
    }
}

/// Build the response datagram for a blocked query: the original IP/UDP
/// framing reflected back at the sender, the DNS header flagged as an
/// NXDOMAIN answer, and the message truncated after the question section.
/// `None` when the original framing cannot support a response; the caller
/// then drops the query instead.
pub fn nxdomain_response(original: &[u8], view: &PacketView) -> Option<Vec<u8>> {
    let payload_start = view.udp_payload_offset?;
    let message = original.get(payload_start..)?;
    let dns_len = DNS_HEADER_LEN + question_section_len(message)?;

    let mut dns = message.get(..dns_len)?.to_vec();
    dns[2] = 0x80 | (dns[2] & 0x79); // QR=1, keep opcode + RD, clear AA/TC
    dns[3] = 0x80 | RCODE_NXDOMAIN; // RA=1
    for byte in &mut dns[6..12] {
        *byte = 0; // no answer, authority, or additional records
    }

    let ip_header_len = payload_start - 8;
    let udp_len = 8 + dns.len();
    let mut out = Vec::with_capacity(ip_header_len + udp_len);
    out.extend_from_slice(original.get(..ip_header_len)?);

    match view.ip_version {
        4 => {
            let total_len = (ip_header_len + udp_len) as u16;
            out[2..4].copy_from_slice(&total_len.to_be_bytes());
            out[12..16].copy_from_slice(&original[16..20]);
            out[16..20].copy_from_slice(&original[12..16]);
        }
        6 => {
            out[4..6].copy_from_slice(&(udp_len as u16).to_be_bytes());
            out[8..24].copy_from_slice(&original[24..40]);
            out[24..40].copy_from_slice(&original[8..24]);
        }
        _ => return None,
    }

    // UDP header: ports reflected, new length, checksum patched below.
    out.extend_from_slice(&view.dest_port.to_be_bytes());
    out.extend_from_slice(&view.source_port.to_be_bytes());
    out.extend_from_slice(&(udp_len as u16).to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&dns);

    if view.ip_version == 4 {
        out[10] = 0;
        out[11] = 0;
        let header_checksum = internet_checksum(&out[..ip_header_len]);
        out[10..12].copy_from_slice(&header_checksum.to_be_bytes());
    }

    // Response addressing is the query's reversed: source = query dest.
    let udp_sum = udp_checksum(view.dest, view.source, &out[ip_header_len..]);
    out[ip_header_len + 6..ip_header_len + 8].copy_from_slice(&udp_sum.to_be_bytes());

    Some(out)
}

/// Length of the question section (name + QTYPE + QCLASS), from the byte
/// after the DNS header.
fn question_section_len(message: &[u8]) -> Option<usize> {
    let mut pos = DNS_HEADER_LEN;
    loop {
        let len = *message.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        if len & 0xC0 != 0 {
            return None;
        }
        pos += len;
    }
    pos += 4; // QTYPE + QCLASS
    if message.len() < pos {
        return None;
    }
    Some(pos - DNS_HEADER_LEN)
}

/// RFC 1071 ones'-complement checksum over a byte slice.
fn internet_checksum(data: &[u8]) -> u16 {
    fold(sum_be_words(data, 0))
}

fn sum_be_words(data: &[u8], mut sum: u32) -> u32 {
    for chunk in data.chunks(2) {
        let word = if chunk.len() == 2 {
            u16::from_be_bytes([chunk[0], chunk[1]])
        } else {
            u16::from_be_bytes([chunk[0], 0])
        };
        sum += u32::from(word);
    }
    sum
}

/// UDP checksum including the per-family pseudo-header. The checksum field
/// inside `segment` must be zero when this is computed.
fn udp_checksum(source: IpAddr, dest: IpAddr, segment: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    match (source, dest) {
        (IpAddr::V4(s), IpAddr::V4(d)) => {
            sum = sum_be_words(&s.octets(), sum);
            sum = sum_be_words(&d.octets(), sum);
        }
        (IpAddr::V6(s), IpAddr::V6(d)) => {
            sum = sum_be_words(&s.octets(), sum);
            sum = sum_be_words(&d.octets(), sum);
        }
        _ => return 0,
    }
    sum += u32::from(IP_PROTOCOL_UDP);
    sum += segment.len() as u32;
    sum = sum_be_words(segment, sum);

    let checksum = fold(sum);
    // An all-zero UDP checksum means "not computed"; transmit as 0xFFFF.
    if checksum == 0 {
        0xFFFF
    } else {
        checksum
    }
}

fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}
