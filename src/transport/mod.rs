//! Raw Ethernet transport boundary
//!
//! The protocol engines only ever see [`Transport`]: send one AVDECC payload to
//! a MAC address, wait a bounded time for the next frame, and read the link
//! state. [`raw::RawSocket`] implements it over an `AF_PACKET` socket on Linux;
//! [`memory::MemoryTransport`] implements it over in-process channels.

pub mod memory;
#[cfg(all(target_os = "linux", feature = "raw-socket"))]
pub mod raw;

use bytes::Bytes;
use std::time::Duration;

use crate::error::TransportError;
use crate::protocol::{MacAddress, AVTP_ETHERTYPE};

pub use memory::{memory_pair, MemoryPeer, MemoryTransport};
#[cfg(all(target_os = "linux", feature = "raw-socket"))]
pub use raw::RawSocket;

/// Ethernet header length (destination, source, ethertype)
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Smallest Ethernet frame without FCS; shorter frames are zero padded
pub const MIN_FRAME_LEN: usize = 60;

/// Receive buffer size
pub const MAX_FRAME_LEN: usize = 2048;

/// One received Ethernet frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub src: MacAddress,
    pub dest: MacAddress,
    pub ethertype: u16,
    pub payload: Bytes,
}

impl Frame {
    /// Split a raw Ethernet frame into header fields and payload
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < ETHERNET_HEADER_LEN {
            return None;
        }
        let mut dest = [0u8; 6];
        let mut src = [0u8; 6];
        dest.copy_from_slice(&raw[0..6]);
        src.copy_from_slice(&raw[6..12]);
        Some(Self {
            src: MacAddress(src),
            dest: MacAddress(dest),
            ethertype: u16::from_be_bytes([raw[12], raw[13]]),
            payload: Bytes::copy_from_slice(&raw[ETHERNET_HEADER_LEN..]),
        })
    }

    /// Whether the frame carries AVDECC
    pub fn is_avdecc(&self) -> bool {
        self.ethertype == AVTP_ETHERTYPE
    }
}

/// Build the wire form of a frame: header, payload, padding to [`MIN_FRAME_LEN`]
pub fn encode_frame(dest: MacAddress, src: MacAddress, ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let len = (ETHERNET_HEADER_LEN + payload.len()).max(MIN_FRAME_LEN);
    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(&dest.0);
    buf.extend_from_slice(&src.0);
    buf.extend_from_slice(&ethertype.to_be_bytes());
    buf.extend_from_slice(payload);
    buf.resize(len, 0);
    buf
}

/// Frame I/O consumed by the protocol engines
pub trait Transport: Send + Sync {
    /// MAC address of the local interface
    fn mac_address(&self) -> MacAddress;

    /// Send `payload` behind an Ethernet header; returns payload bytes sent
    fn send_frame(&self, dest: MacAddress, ethertype: u16, payload: &[u8]) -> Result<usize, TransportError>;

    /// Wait up to `timeout` for the next frame
    fn receive_frame(&self, timeout: Duration) -> Result<Option<Frame>, TransportError>;

    /// Whether the physical link is up
    fn link_is_up(&self) -> Result<bool, TransportError>;
}

/// Send an AVDECC payload, logging instead of propagating failures
pub(crate) fn send_logged(transport: &dyn Transport, dest: MacAddress, payload: &[u8], what: &str) -> bool {
    match transport.send_frame(dest, AVTP_ETHERTYPE, payload) {
        Ok(_) => {
            tracing::trace!("Sent {} to {}", what, dest);
            true
        }
        Err(e) => {
            tracing::warn!("Failed to send {} to {}: {}", what, dest, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_and_parse_frame() {
        let dest = MacAddress([0x91, 0xE0, 0xF0, 0x01, 0x00, 0x00]);
        let src = MacAddress([0x00, 0x1B, 0x21, 0x01, 0x02, 0x03]);
        let raw = encode_frame(dest, src, AVTP_ETHERTYPE, &[0xFA, 0x00]);

        assert_eq!(raw.len(), MIN_FRAME_LEN);
        assert_eq!(&raw[12..14], &[0x22, 0xF0]);

        let frame = Frame::parse(&raw).unwrap();
        assert_eq!(frame.dest, dest);
        assert_eq!(frame.src, src);
        assert!(frame.is_avdecc());
        assert_eq!(&frame.payload[..2], &[0xFA, 0x00]);
        assert!(Frame::parse(&raw[..10]).is_none());
    }
}
