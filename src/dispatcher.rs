//! Protocol dispatcher
//!
//! Owns the entity model and the three protocol engines. The monitor loop
//! hands it each received frame and then one tick per iteration, always under
//! the same lock, so a frame's effects are visible to that iteration's tick.

use std::time::Instant;

use crate::acmp::ConnectionManager;
use crate::adp::Advertiser;
use crate::aecp::AecpResponder;
use crate::engine::{EngineOptions, Role};
use crate::entity::EntityModel;
use crate::error::DecodeError;
use crate::protocol::{peek_subtype, Acmpdu, Adpdu, Subtype};
use crate::transport::{Frame, Transport};

/// Routes frames to ADP, AECP and ACMP and drives their timers
#[derive(Debug)]
pub struct Dispatcher {
    model: EntityModel,
    advertiser: Advertiser,
    responder: AecpResponder,
    connections: ConnectionManager,
    acmp_started: bool,
}

impl Dispatcher {
    pub fn new(model: EntityModel, role: Role, options: &EngineOptions, link_up: bool) -> Self {
        Self {
            model,
            advertiser: Advertiser::new(options.valid_time, link_up),
            responder: AecpResponder::new(),
            connections: ConnectionManager::new(role, options.inflight_capacity),
            acmp_started: false,
        }
    }

    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut EntityModel {
        &mut self.model
    }

    pub fn advertiser(&self) -> &Advertiser {
        &self.advertiser
    }

    pub fn advertiser_mut(&mut self) -> &mut Advertiser {
        &mut self.advertiser
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn acmp_started(&self) -> bool {
        self.acmp_started
    }

    /// Gate ACMP frame handling and in-flight timers
    pub fn set_acmp_started(&mut self, started: bool) {
        if self.acmp_started != started {
            tracing::info!("ACMP processing {}", if started { "started" } else { "stopped" });
        }
        self.acmp_started = started;
    }

    /// Queue ENTITY_DEPARTING for the next tick
    pub fn begin_departing(&mut self) {
        self.advertiser.request_depart();
    }

    /// Decode and route one received frame; malformed frames are logged and dropped
    pub fn handle_frame(&mut self, frame: &Frame, now: Instant, transport: &dyn Transport) {
        if !frame.is_avdecc() {
            return;
        }
        if let Err(e) = self.route(frame, now, transport) {
            match e {
                DecodeError::NotControl => tracing::trace!("Skipping AVTP stream frame from {}", frame.src),
                DecodeError::UnexpectedSubtype(subtype) => {
                    tracing::trace!("Skipping AVTP subtype {:#04x} from {}", subtype, frame.src)
                }
                e => tracing::warn!("Dropping malformed frame from {}: {}", frame.src, e),
            }
        }
    }

    fn route(&mut self, frame: &Frame, now: Instant, transport: &dyn Transport) -> Result<(), DecodeError> {
        match peek_subtype(&frame.payload)? {
            Subtype::Adp => {
                let pdu = Adpdu::decode(&frame.payload)?;
                self.advertiser.handle(self.model.entity_id(), &pdu);
            }
            Subtype::Aecp => {
                self.responder.handle(&self.model, frame.src, &frame.payload, transport)?;
            }
            Subtype::Acmp => {
                if !self.acmp_started {
                    return Ok(());
                }
                let pdu = Acmpdu::decode(&frame.payload)?;
                self.connections.handle(&mut self.model, &pdu, now, transport);
            }
        }
        Ok(())
    }

    /// Run the per-iteration timers of every engine
    pub fn tick(&mut self, now: Instant, transport: &dyn Transport) {
        self.advertiser.tick(&self.model, now, transport);
        self.responder.tick(now);
        if self.acmp_started {
            self.connections.tick(now, transport);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::{sample_tree, MAC};
    use crate::protocol::aecpdu::encode_aem_command;
    use crate::protocol::{AcmpMessageType, AcmpStatus, AdpMessageType, AemCommandType, Eui64, MacAddress};
    use crate::transport::{memory_pair, MemoryPeer, MemoryTransport};
    use bytes::Bytes;

    const REMOTE: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x07]);

    fn setup(role: Role) -> (Dispatcher, MemoryTransport, MemoryPeer) {
        let model = EntityModel::build(&sample_tree(), MAC).unwrap();
        let (transport, peer) = memory_pair(MAC);
        (Dispatcher::new(model, role, &EngineOptions::default(), true), transport, peer)
    }

    fn frame(payload: Vec<u8>) -> Frame {
        Frame {
            src: REMOTE,
            dest: MAC,
            ethertype: crate::protocol::AVTP_ETHERTYPE,
            payload: Bytes::from(payload),
        }
    }

    fn connect_tx(own: Eui64) -> Vec<u8> {
        let mut pdu = Acmpdu::new(AcmpMessageType::ConnectTxCommand);
        pdu.talker_entity_id = own;
        pdu.listener_entity_id = Eui64(0x55);
        pdu.encode()
    }

    #[test]
    fn test_acmp_gated_until_started() {
        let (mut dispatcher, transport, peer) = setup(Role::Talker);
        let own = dispatcher.model().entity_id();
        let now = Instant::now();

        dispatcher.handle_frame(&frame(connect_tx(own)), now, &transport);
        assert!(peer.drain_sent().is_empty());

        dispatcher.set_acmp_started(true);
        dispatcher.handle_frame(&frame(connect_tx(own)), now, &transport);
        let sent = peer.drain_sent();
        assert_eq!(sent.len(), 1);
        let response = Acmpdu::decode(&sent[0].payload).unwrap();
        assert_eq!(response.status, AcmpStatus::SUCCESS);
        assert_eq!(dispatcher.model().find_talker_info(0, 0).unwrap().connection_count, 1);
    }

    #[test]
    fn test_aecp_routed_and_answered_unicast() {
        let (mut dispatcher, transport, peer) = setup(Role::Listener);
        let own = dispatcher.model().entity_id();
        let command = encode_aem_command(own, Eui64(0x99), 1, AemCommandType::ENTITY_AVAILABLE, &[]);

        dispatcher.handle_frame(&frame(command), Instant::now(), &transport);
        let sent = peer.drain_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].dest, REMOTE);
    }

    #[test]
    fn test_malformed_and_foreign_frames_dropped() {
        let (mut dispatcher, transport, peer) = setup(Role::Both);
        dispatcher.set_acmp_started(true);
        let now = Instant::now();

        dispatcher.handle_frame(&frame(vec![]), now, &transport);
        dispatcher.handle_frame(&frame(vec![0x00, 0x80, 0x00, 0x00]), now, &transport);
        dispatcher.handle_frame(&frame(vec![0xFC, 0x00, 0x00]), now, &transport);
        dispatcher.handle_frame(&frame(vec![0xFB, 0x00]), now, &transport);
        let mut not_avdecc = frame(connect_tx(dispatcher.model().entity_id()));
        not_avdecc.ethertype = 0x0800;
        dispatcher.handle_frame(&not_avdecc, now, &transport);

        assert!(peer.drain_sent().is_empty());
    }

    #[test]
    fn test_discover_then_tick_advertises() {
        let (mut dispatcher, transport, peer) = setup(Role::Talker);
        let now = Instant::now();
        dispatcher.tick(now, &transport);
        assert_eq!(peer.drain_sent().len(), 1);

        dispatcher.handle_frame(&frame(Adpdu::discover().encode()), now, &transport);
        dispatcher.tick(now, &transport);
        let sent = peer.drain_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(Adpdu::decode(&sent[0].payload).unwrap().message_type, AdpMessageType::EntityAvailable);
    }

    #[test]
    fn test_departing_on_tick() {
        let (mut dispatcher, transport, peer) = setup(Role::Both);
        let now = Instant::now();
        dispatcher.tick(now, &transport);
        peer.drain_sent();

        dispatcher.begin_departing();
        dispatcher.tick(now, &transport);
        let sent = peer.drain_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(Adpdu::decode(&sent[0].payload).unwrap().message_type, AdpMessageType::EntityDeparting);
    }
}
