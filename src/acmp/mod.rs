//! ACMP engine
//!
//! Routes connection-management PDUs to the talker or listener state machine
//! depending on the message type, the entity's role and whether the PDU names
//! this entity as that talker or listener. All ACMP traffic, commands and
//! responses alike, goes to the ADP/ACMP multicast address.

pub mod inflight;
pub mod listener;
mod talker;

use std::time::Instant;

use crate::engine::Role;
use crate::entity::EntityModel;
use crate::protocol::{Acmpdu, ADP_ACMP_MULTICAST};
use crate::transport::{send_logged, Transport};

pub use inflight::{InflightCommand, InflightTable};
pub use listener::ListenerMachine;

/// Encode and multicast an ACMPDU; false if the transport refused it
pub(crate) fn send_pdu(transport: &dyn Transport, pdu: &Acmpdu, what: &str) -> bool {
    tracing::trace!("ACMP {:?} seq {} status {}", pdu.message_type, pdu.sequence_id, pdu.status);
    send_logged(transport, ADP_ACMP_MULTICAST, &pdu.encode(), what)
}

/// Talker and listener connection management for one entity
#[derive(Debug)]
pub struct ConnectionManager {
    role: Role,
    listener: ListenerMachine,
}

impl ConnectionManager {
    pub fn new(role: Role, inflight_capacity: usize) -> Self {
        Self {
            role,
            listener: ListenerMachine::new(inflight_capacity),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn inflight(&self) -> &InflightTable {
        self.listener.inflight()
    }

    /// Process one received ACMPDU
    pub fn handle(&mut self, model: &mut EntityModel, pdu: &Acmpdu, now: Instant, transport: &dyn Transport) {
        let own_id = model.entity_id();
        if pdu.message_type.is_talker_message() {
            if self.role.is_talker() && pdu.talker_entity_id == own_id {
                if let Some(response) = talker::respond(model, pdu) {
                    send_pdu(transport, &response, "ACMP talker response");
                }
            }
        } else if pdu.message_type.is_listener_message() {
            if self.role.is_listener() && pdu.listener_entity_id == own_id {
                self.listener.handle(model, pdu, now, transport);
            }
        } else {
            tracing::trace!("Ignoring ACMP {:?}", pdu.message_type);
        }
    }

    /// Drive in-flight retries and timeouts
    pub fn tick(&mut self, now: Instant, transport: &dyn Transport) {
        if self.role.is_listener() {
            self.listener.tick(now, transport);
        }
    }
}
