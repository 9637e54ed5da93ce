//! In-process transport over crossbeam channels
//!
//! [`memory_pair`] returns the transport handed to the engine and a
//! [`MemoryPeer`] standing in for the rest of the network segment.

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Frame, Transport};
use crate::error::TransportError;
use crate::protocol::{MacAddress, AVTP_ETHERTYPE};

/// Engine side of an in-memory link
pub struct MemoryTransport {
    mac: MacAddress,
    inbound: Receiver<Frame>,
    outbound: Sender<Frame>,
    link_up: Arc<AtomicBool>,
    fail_sends: Arc<AtomicBool>,
    fail_next: Arc<AtomicUsize>,
}

/// Network side of an in-memory link
pub struct MemoryPeer {
    mac: MacAddress,
    inject: Sender<Frame>,
    sent: Receiver<Frame>,
    link_up: Arc<AtomicBool>,
    fail_sends: Arc<AtomicBool>,
    fail_next: Arc<AtomicUsize>,
}

/// Create a connected transport/peer pair for an interface with `mac`
pub fn memory_pair(mac: MacAddress) -> (MemoryTransport, MemoryPeer) {
    let (inject, inbound) = unbounded();
    let (outbound, sent) = unbounded();
    let link_up = Arc::new(AtomicBool::new(true));
    let fail_sends = Arc::new(AtomicBool::new(false));
    let fail_next = Arc::new(AtomicUsize::new(0));

    let transport = MemoryTransport {
        mac,
        inbound,
        outbound,
        link_up: link_up.clone(),
        fail_sends: fail_sends.clone(),
        fail_next: fail_next.clone(),
    };
    let peer = MemoryPeer { mac, inject, sent, link_up, fail_sends, fail_next };
    (transport, peer)
}

impl Transport for MemoryTransport {
    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn send_frame(&self, dest: MacAddress, ethertype: u16, payload: &[u8]) -> Result<usize, TransportError> {
        let fail_once = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail_once || self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("link refused frame".into()));
        }
        let frame = Frame {
            src: self.mac,
            dest,
            ethertype,
            payload: Bytes::copy_from_slice(payload),
        };
        self.outbound.send(frame).map_err(|_| TransportError::Closed)?;
        Ok(payload.len())
    }

    fn receive_frame(&self, timeout: Duration) -> Result<Option<Frame>, TransportError> {
        match self.inbound.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn link_is_up(&self) -> Result<bool, TransportError> {
        Ok(self.link_up.load(Ordering::SeqCst))
    }
}

impl MemoryPeer {
    /// MAC of the engine side
    pub fn engine_mac(&self) -> MacAddress {
        self.mac
    }

    /// Deliver an AVDECC payload to the engine as if sent by `src`
    pub fn inject(&self, src: MacAddress, dest: MacAddress, payload: Vec<u8>) {
        let frame = Frame {
            src,
            dest,
            ethertype: AVTP_ETHERTYPE,
            payload: Bytes::from(payload),
        };
        if self.inject.send(frame).is_err() {
            tracing::debug!("Memory transport dropped, frame discarded");
        }
    }

    /// Deliver a complete frame to the engine
    pub fn inject_frame(&self, frame: Frame) {
        let _ = self.inject.send(frame);
    }

    /// Next frame the engine sent, waiting up to `timeout`
    pub fn recv_sent(&self, timeout: Duration) -> Option<Frame> {
        self.sent.recv_timeout(timeout).ok()
    }

    /// Every frame the engine has sent so far
    pub fn drain_sent(&self) -> Vec<Frame> {
        self.sent.try_iter().collect()
    }

    pub fn set_link_up(&self, up: bool) {
        self.link_up.store(up, Ordering::SeqCst);
    }

    /// Make every subsequent engine send fail
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make only the next `count` engine sends fail
    pub fn fail_next_sends(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ADP_ACMP_MULTICAST;

    const MAC: MacAddress = MacAddress([2, 0, 0, 0, 0, 1]);

    #[test]
    fn test_memory_pair_round_trip() {
        let (transport, peer) = memory_pair(MAC);

        assert_eq!(transport.send_frame(ADP_ACMP_MULTICAST, AVTP_ETHERTYPE, &[1, 2, 3]).unwrap(), 3);
        let sent = peer.recv_sent(Duration::from_millis(10)).unwrap();
        assert_eq!(sent.src, MAC);
        assert_eq!(sent.dest, ADP_ACMP_MULTICAST);

        peer.inject(MacAddress([2, 0, 0, 0, 0, 2]), MAC, vec![9]);
        let received = transport.receive_frame(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(&received.payload[..], &[9]);
        assert!(transport.receive_frame(Duration::from_millis(1)).unwrap().is_none());
    }

    #[test]
    fn test_memory_link_and_failures() {
        let (transport, peer) = memory_pair(MAC);
        assert!(transport.link_is_up().unwrap());
        peer.set_link_up(false);
        assert!(!transport.link_is_up().unwrap());

        peer.fail_next_sends(1);
        assert!(transport.send_frame(MAC, AVTP_ETHERTYPE, &[0]).is_err());
        assert!(transport.send_frame(MAC, AVTP_ETHERTYPE, &[0]).is_ok());

        peer.set_fail_sends(true);
        assert!(matches!(
            transport.send_frame(MAC, AVTP_ETHERTYPE, &[0]),
            Err(TransportError::SendFailed(_))
        ));

        drop(peer);
        assert!(matches!(
            transport.receive_frame(Duration::from_millis(1)),
            Err(TransportError::Closed)
        ));
    }
}
