//! Captive-portal DNS.
//!
//! Every well-formed query is answered with a single A record pointing at the
//! device. Client operating systems then send their connectivity probes to the
//! device's HTTP server, which redirects them to the landing page.
//!
//! # Response layout
//!
//! | Section | Content |
//! |---------|---------|
//! | Header | query id, flags `0x8180`, qd=1, an=1, ns=0, ar=0 |
//! | Question | first question of the query, verbatim |
//! | Answer | `C0 0C` (name pointer), type A, class IN, TTL 60, rdlength 4, address |

mod server;

pub use server::CaptiveDns;

use std::net::Ipv4Addr;

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;

/// Largest datagram read from the socket.
pub const MAX_PACKET_LEN: usize = 512;

/// TTL of the synthesized answer, in seconds.
pub const ANSWER_TTL_SECS: u32 = 60;

const HEADER_LEN: usize = 12;
const FLAG_QR: u8 = 0x80;
const RESPONSE_FLAGS: [u8; 2] = [0x81, 0x80];
/// Compressed name pointer to offset 12 (the question name).
const NAME_POINTER: [u8; 2] = [0xC0, 0x0C];
const TYPE_A: [u8; 2] = [0x00, 0x01];
const CLASS_IN: [u8; 2] = [0x00, 0x01];

/// Build the captive answer for `query`, or `None` if it should be dropped.
///
/// Dropped: packets no longer than the header, responses (QR set), queries
/// without a question, question names that run past the packet or use
/// compression, and questions without room for QTYPE/QCLASS. Only the first
/// question is answered, so the response always carries exactly one.
pub fn build_response(query: &[u8], addr: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() <= HEADER_LEN || query[2] & FLAG_QR != 0 {
        return None;
    }
    if u16::from_be_bytes([query[4], query[5]]) == 0 {
        return None;
    }

    let question_end = question_end(query)?;
    let question = &query[HEADER_LEN..question_end];

    let mut response = Vec::with_capacity(HEADER_LEN + question.len() + 16);
    response.extend_from_slice(&query[0..2]);
    response.extend_from_slice(&RESPONSE_FLAGS);
    response.extend_from_slice(&1u16.to_be_bytes());
    response.extend_from_slice(&1u16.to_be_bytes());
    response.extend_from_slice(&0u16.to_be_bytes());
    response.extend_from_slice(&0u16.to_be_bytes());
    response.extend_from_slice(question);

    response.extend_from_slice(&NAME_POINTER);
    response.extend_from_slice(&TYPE_A);
    response.extend_from_slice(&CLASS_IN);
    response.extend_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
    response.extend_from_slice(&4u16.to_be_bytes());
    response.extend_from_slice(&addr.octets());
    Some(response)
}

/// Offset just past QTYPE/QCLASS of the first question.
fn question_end(packet: &[u8]) -> Option<usize> {
    let mut pos = HEADER_LEN;
    loop {
        let len = *packet.get(pos)? as usize;
        if len == 0 {
            pos += 1;
            break;
        }
        // Compression pointers and the reserved 0x40/0x80 label types
        if len & 0xC0 != 0 {
            return None;
        }
        pos += 1 + len;
    }
    let end = pos + 4;
    (end <= packet.len()).then_some(end)
}
