//! ADP engine
//!
//! Advertises the entity with ENTITY_AVAILABLE, re-advertising every half
//! `valid_time`, on link changes and when the gPTP grandmaster changes. Sends
//! ENTITY_DISCOVER on request and ENTITY_DEPARTING on shutdown.
//!
//! The state is a set of sticky flags evaluated once per [`Advertiser::tick`].

use std::time::{Duration, Instant};

use crate::entity::EntityModel;
use crate::protocol::{AdpMessageType, Adpdu, Eui64, ADP_ACMP_MULTICAST};
use crate::transport::{send_logged, Transport};

/// Shortest re-advertisement window regardless of `valid_time`
pub const MIN_READVERTISE_INTERVAL: Duration = Duration::from_secs(1);

/// ADP advertise state machine
#[derive(Debug)]
pub struct Advertiser {
    valid_time: u8,
    available_index: u32,
    last_advertised: Option<Instant>,
    need_advertise: bool,
    need_discover: bool,
    need_depart: bool,
    link_up: bool,
    grandmaster_id: Eui64,
    advertised_grandmaster_id: Eui64,
}

impl Advertiser {
    /// `valid_time` is the advertised lifetime in seconds, `link_up` the link state at start
    pub fn new(valid_time: u8, link_up: bool) -> Self {
        Self {
            valid_time,
            available_index: 0,
            last_advertised: None,
            need_advertise: true,
            need_discover: false,
            need_depart: false,
            link_up,
            grandmaster_id: Eui64::ZERO,
            advertised_grandmaster_id: Eui64::ZERO,
        }
    }

    /// Half the advertised validity, but never under one second
    pub fn readvertise_interval(&self) -> Duration {
        (Duration::from_secs(u64::from(self.valid_time)) / 2).max(MIN_READVERTISE_INTERVAL)
    }

    pub fn available_index(&self) -> u32 {
        self.available_index
    }

    pub fn needs_advertise(&self) -> bool {
        self.need_advertise
    }

    pub fn grandmaster_id(&self) -> Eui64 {
        self.grandmaster_id
    }

    /// Record the current gPTP grandmaster; a change is advertised on the next tick
    pub fn set_grandmaster_id(&mut self, id: Eui64) {
        self.grandmaster_id = id;
    }

    pub fn request_discover(&mut self) {
        self.need_discover = true;
    }

    pub fn request_depart(&mut self) {
        self.need_depart = true;
    }

    /// Process a received ADPDU
    pub fn handle(&mut self, own_id: Eui64, adpdu: &Adpdu) {
        match adpdu.message_type {
            AdpMessageType::EntityDiscover => {
                tracing::debug!("Received ENTITY_DISCOVER for {}", adpdu.entity_id);
                if adpdu.entity_id.is_zero() || adpdu.entity_id == own_id {
                    self.need_advertise = true;
                }
            }
            AdpMessageType::EntityAvailable => {
                tracing::trace!("Received ENTITY_AVAILABLE from {}", adpdu.entity_id);
            }
            AdpMessageType::EntityDeparting => {
                tracing::trace!("Received ENTITY_DEPARTING from {}", adpdu.entity_id);
            }
        }
    }

    /// Evaluate timers, link and grandmaster state, then send what is pending
    pub fn tick(&mut self, model: &EntityModel, now: Instant, transport: &dyn Transport) {
        if let Some(last) = self.last_advertised {
            if now.saturating_duration_since(last) > self.readvertise_interval() {
                tracing::trace!("Re-advertise timer expired");
                self.need_advertise = true;
            }
        }

        match transport.link_is_up() {
            Ok(up) if up != self.link_up => {
                tracing::info!("Link is {}", if up { "up" } else { "down" });
                self.link_up = up;
                self.need_advertise = true;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Link state query failed: {}", e),
        }

        if self.grandmaster_id != self.advertised_grandmaster_id {
            tracing::debug!("Grandmaster changed to {}", self.grandmaster_id);
            self.advertised_grandmaster_id = self.grandmaster_id;
            self.need_advertise = true;
        }

        if self.need_advertise {
            let pdu = self.build(model, AdpMessageType::EntityAvailable);
            send_logged(transport, ADP_ACMP_MULTICAST, &pdu.encode(), "ENTITY_AVAILABLE");
            self.available_index = self.available_index.wrapping_add(1);
            self.last_advertised = Some(now);
            self.need_advertise = false;
        }

        if self.need_discover {
            send_logged(transport, ADP_ACMP_MULTICAST, &Adpdu::discover().encode(), "ENTITY_DISCOVER");
            self.need_discover = false;
        }

        if self.need_depart {
            let pdu = self.build(model, AdpMessageType::EntityDeparting);
            send_logged(transport, ADP_ACMP_MULTICAST, &pdu.encode(), "ENTITY_DEPARTING");
            self.available_index = 0;
            self.last_advertised = Some(now);
            self.need_advertise = false;
            self.need_depart = false;
        }
    }

    fn build(&self, model: &EntityModel, message_type: AdpMessageType) -> Adpdu {
        let entity = model.entity();
        Adpdu {
            message_type,
            valid_time: self.valid_time,
            entity_id: entity.entity_id,
            entity_model_id: entity.entity_model_id,
            entity_capabilities: entity.entity_capabilities,
            talker_stream_sources: entity.talker_stream_sources,
            talker_capabilities: entity.talker_capabilities,
            listener_stream_sinks: entity.listener_stream_sinks,
            listener_capabilities: entity.listener_capabilities,
            controller_capabilities: entity.controller_capabilities,
            available_index: self.available_index,
            gptp_grandmaster_id: self.grandmaster_id,
            gptp_domain_number: 0,
            identify_control_index: 0,
            interface_index: 0,
            association_id: entity.association_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::{sample_tree, MAC};
    use crate::transport::{memory_pair, MemoryPeer, MemoryTransport};

    fn setup() -> (Advertiser, EntityModel, MemoryTransport, MemoryPeer) {
        let model = EntityModel::build(&sample_tree(), MAC).unwrap();
        let (transport, peer) = memory_pair(MAC);
        (Advertiser::new(31, true), model, transport, peer)
    }

    fn sent_adpdus(peer: &MemoryPeer) -> Vec<Adpdu> {
        peer.drain_sent()
            .iter()
            .map(|frame| {
                assert_eq!(frame.dest, ADP_ACMP_MULTICAST);
                Adpdu::decode(&frame.payload).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_first_tick_advertises() {
        let (mut adp, model, transport, peer) = setup();
        adp.tick(&model, Instant::now(), &transport);

        let sent = sent_adpdus(&peer);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type, AdpMessageType::EntityAvailable);
        assert_eq!(sent[0].available_index, 0);
        assert_eq!(sent[0].valid_time, 31);
        assert_eq!(sent[0].entity_id, model.entity_id());
        assert_eq!(sent[0].talker_stream_sources, 1);
        assert_eq!(sent[0].listener_stream_sinks, 2);
        assert_eq!(adp.available_index(), 1);
        assert!(!adp.needs_advertise());
    }

    #[test]
    fn test_readvertise_after_half_valid_time() {
        let (mut adp, model, transport, peer) = setup();
        let start = Instant::now();
        adp.tick(&model, start, &transport);
        sent_adpdus(&peer);
        assert_eq!(adp.readvertise_interval(), Duration::from_millis(15_500));

        adp.tick(&model, start + Duration::from_millis(15_500), &transport);
        assert!(sent_adpdus(&peer).is_empty());

        adp.tick(&model, start + Duration::from_millis(15_501), &transport);
        let sent = sent_adpdus(&peer);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type, AdpMessageType::EntityAvailable);
        assert_eq!(sent[0].available_index, 1);
        assert_eq!(adp.available_index(), 2);
    }

    #[test]
    fn test_short_valid_time_floors_at_one_second() {
        let adp = Advertiser::new(1, true);
        assert_eq!(adp.readvertise_interval(), MIN_READVERTISE_INTERVAL);
    }

    #[test]
    fn test_link_change_triggers_advertise() {
        let (mut adp, model, transport, peer) = setup();
        let now = Instant::now();
        adp.tick(&model, now, &transport);
        sent_adpdus(&peer);

        peer.set_link_up(false);
        adp.tick(&model, now, &transport);
        assert_eq!(sent_adpdus(&peer).len(), 1);

        adp.tick(&model, now, &transport);
        assert!(sent_adpdus(&peer).is_empty());

        peer.set_link_up(true);
        adp.tick(&model, now, &transport);
        assert_eq!(sent_adpdus(&peer).len(), 1);
    }

    #[test]
    fn test_grandmaster_change_triggers_advertise() {
        let (mut adp, model, transport, peer) = setup();
        let now = Instant::now();
        adp.tick(&model, now, &transport);
        sent_adpdus(&peer);

        adp.set_grandmaster_id(Eui64(0xAABB));
        adp.tick(&model, now, &transport);
        let sent = sent_adpdus(&peer);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].gptp_grandmaster_id, Eui64(0xAABB));

        adp.set_grandmaster_id(Eui64(0xAABB));
        adp.tick(&model, now, &transport);
        assert!(sent_adpdus(&peer).is_empty());
    }

    #[test]
    fn test_discover_addressing() {
        let (mut adp, model, transport, peer) = setup();
        let now = Instant::now();
        adp.tick(&model, now, &transport);
        sent_adpdus(&peer);

        let mut discover = Adpdu::discover();
        discover.entity_id = Eui64(0x1234);
        adp.handle(model.entity_id(), &discover);
        assert!(!adp.needs_advertise());

        discover.entity_id = model.entity_id();
        adp.handle(model.entity_id(), &discover);
        assert!(adp.needs_advertise());
        adp.tick(&model, now, &transport);
        assert_eq!(sent_adpdus(&peer).len(), 1);

        adp.handle(model.entity_id(), &Adpdu::discover());
        assert!(adp.needs_advertise());
    }

    #[test]
    fn test_request_discover_sends_zero_target() {
        let (mut adp, model, transport, peer) = setup();
        adp.tick(&model, Instant::now(), &transport);
        sent_adpdus(&peer);

        adp.request_discover();
        adp.tick(&model, Instant::now(), &transport);
        let sent = sent_adpdus(&peer);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type, AdpMessageType::EntityDiscover);
        assert!(sent[0].entity_id.is_zero());
    }

    #[test]
    fn test_depart_resets_available_index() {
        let (mut adp, model, transport, peer) = setup();
        let now = Instant::now();
        adp.tick(&model, now, &transport);
        sent_adpdus(&peer);

        adp.request_depart();
        adp.tick(&model, now, &transport);
        let sent = sent_adpdus(&peer);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type, AdpMessageType::EntityDeparting);
        assert_eq!(sent[0].available_index, 1);
        assert_eq!(adp.available_index(), 0);

        adp.tick(&model, now, &transport);
        assert!(sent_adpdus(&peer).is_empty());
    }
}
