//! ACMP listener state machine
//!
//! CONNECT_RX and DISCONNECT_RX commands from a controller are forwarded to
//! the talker as CONNECT_TX/DISCONNECT_TX under a fresh sequence ID. The
//! controller is answered once the talker responds, or after one retry has
//! also timed out.

use std::time::Instant;

use super::inflight::{InflightCommand, InflightTable};
use super::send_pdu;
use crate::entity::EntityModel;
use crate::protocol::{AcmpMessageType, AcmpStatus, Acmpdu};
use crate::transport::Transport;

/// Listener side of connection management
#[derive(Debug)]
pub struct ListenerMachine {
    inflight: InflightTable,
    next_sequence_id: u16,
}

impl ListenerMachine {
    pub fn new(inflight_capacity: usize) -> Self {
        Self {
            inflight: InflightTable::new(inflight_capacity),
            next_sequence_id: 0,
        }
    }

    pub fn inflight(&self) -> &InflightTable {
        &self.inflight
    }

    /// Process a listener message addressed to this entity
    pub fn handle(&mut self, model: &mut EntityModel, pdu: &Acmpdu, now: Instant, transport: &dyn Transport) {
        match pdu.message_type {
            AcmpMessageType::ConnectRxCommand => self.connect_rx(model, pdu, now, transport),
            AcmpMessageType::ConnectTxResponse => self.connect_tx_response(model, pdu, transport),
            AcmpMessageType::DisconnectRxCommand => self.disconnect_rx(model, pdu, now, transport),
            AcmpMessageType::DisconnectTxResponse => self.disconnect_tx_response(model, pdu, transport),
            AcmpMessageType::GetRxStateCommand => get_rx_state(model, pdu, transport),
            other => tracing::trace!("Listener ignores {:?}", other),
        }
    }

    /// Retry or time out forwarded commands whose deadline has passed
    pub fn tick(&mut self, now: Instant, transport: &dyn Transport) {
        for slot in self.inflight.expired(now) {
            let Some(entry) = self.inflight.get_mut(slot) else {
                continue;
            };

            if !entry.retried {
                tracing::debug!(
                    "{:?} seq {} timed out, retrying",
                    entry.command.message_type,
                    entry.command.sequence_id
                );
                entry.retried = true;
                entry.deadline = now + entry.command.message_type.timeout();
                send_pdu(transport, &entry.command, "ACMP retry");
                continue;
            }

            if let Some(entry) = self.inflight.remove(slot) {
                tracing::warn!(
                    "{:?} to talker {} timed out after retry",
                    entry.command.message_type,
                    entry.command.talker_entity_id
                );
                let mut response = entry.command.clone();
                response.message_type = controller_response(entry.command.message_type);
                response.status = AcmpStatus::LISTENER_TALKER_TIMEOUT;
                response.sequence_id = entry.original_sequence_id;
                send_pdu(transport, &response, "ACMP timeout response");
            }
        }
    }

    fn connect_rx(&mut self, model: &EntityModel, command: &Acmpdu, now: Instant, transport: &dyn Transport) {
        let Some(info) = model.find_listener_info(model.current_configuration(), command.listener_unique_id) else {
            send_pdu(transport, &command.to_response(AcmpStatus::LISTENER_UNKNOWN_ID), "CONNECT_RX_RESPONSE");
            return;
        };
        if info.connected {
            tracing::debug!(
                "Stream {} already connected to {}:{}",
                info.listener_unique_id,
                info.talker_entity_id,
                info.talker_unique_id
            );
            send_pdu(transport, &command.to_response(AcmpStatus::LISTENER_EXCLUSIVE), "CONNECT_RX_RESPONSE");
            return;
        }
        self.forward(command, AcmpMessageType::ConnectTxCommand, now, transport);
    }

    fn disconnect_rx(&mut self, model: &EntityModel, command: &Acmpdu, now: Instant, transport: &dyn Transport) {
        let Some(info) = model.find_listener_info(model.current_configuration(), command.listener_unique_id) else {
            send_pdu(transport, &command.to_response(AcmpStatus::LISTENER_UNKNOWN_ID), "DISCONNECT_RX_RESPONSE");
            return;
        };
        if !info.is_connected_to(command.talker_entity_id, command.talker_unique_id) {
            send_pdu(transport, &command.to_response(AcmpStatus::NOT_CONNECTED), "DISCONNECT_RX_RESPONSE");
            return;
        }
        self.forward(command, AcmpMessageType::DisconnectTxCommand, now, transport);
    }

    /// Send `command` on to the talker as `message_type`, tracking it in flight
    fn forward(&mut self, command: &Acmpdu, message_type: AcmpMessageType, now: Instant, transport: &dyn Transport) {
        if self.inflight.is_full() {
            tracing::warn!("In-flight table full ({} entries)", self.inflight.capacity());
            send_pdu(transport, &command.to_response(AcmpStatus::LISTENER_MISBEHAVING), "ACMP rejection");
            return;
        }

        let mut outgoing = command.clone();
        outgoing.message_type = message_type;
        outgoing.status = AcmpStatus::SUCCESS;
        outgoing.sequence_id = self.next_sequence_id;
        self.next_sequence_id = self.next_sequence_id.wrapping_add(1);

        let entry = InflightCommand {
            command: outgoing,
            retried: false,
            original_sequence_id: command.sequence_id,
            deadline: now + message_type.timeout(),
        };
        let slot = match self.inflight.insert(entry) {
            Ok(slot) => slot,
            Err(_) => {
                send_pdu(transport, &command.to_response(AcmpStatus::LISTENER_MISBEHAVING), "ACMP rejection");
                return;
            }
        };

        let sent = self
            .inflight
            .get(slot)
            .is_some_and(|entry| send_pdu(transport, &entry.command, "ACMP command"));
        if !sent {
            self.inflight.remove(slot);
            send_pdu(transport, &command.to_response(AcmpStatus::COULD_NOT_SEND_MESSAGE), "ACMP rejection");
        }
    }

    fn connect_tx_response(&mut self, model: &mut EntityModel, response: &Acmpdu, transport: &dyn Transport) {
        let configuration = model.current_configuration();
        if model.find_listener_info(configuration, response.listener_unique_id).is_none() {
            tracing::debug!("CONNECT_TX_RESPONSE for unknown stream {}", response.listener_unique_id);
            return;
        }
        let Some(entry) = self
            .inflight
            .take_matching(AcmpMessageType::ConnectTxCommand, response.sequence_id)
        else {
            tracing::debug!("Unsolicited CONNECT_TX_RESPONSE seq {}", response.sequence_id);
            return;
        };

        let status = if response.status.is_success() {
            connect_listener(model, configuration, response)
        } else {
            tracing::info!("Talker {} refused connection: {}", response.talker_entity_id, response.status);
            response.status
        };

        let mut reply = response.clone();
        reply.message_type = AcmpMessageType::ConnectRxResponse;
        reply.status = status;
        reply.sequence_id = entry.original_sequence_id;
        send_pdu(transport, &reply, "CONNECT_RX_RESPONSE");
    }

    fn disconnect_tx_response(&mut self, model: &mut EntityModel, response: &Acmpdu, transport: &dyn Transport) {
        let configuration = model.current_configuration();
        if model.find_listener_info(configuration, response.listener_unique_id).is_none() {
            tracing::debug!("DISCONNECT_TX_RESPONSE for unknown stream {}", response.listener_unique_id);
            return;
        }
        let Some(entry) = self
            .inflight
            .take_matching(AcmpMessageType::DisconnectTxCommand, response.sequence_id)
        else {
            tracing::debug!("Unsolicited DISCONNECT_TX_RESPONSE seq {}", response.sequence_id);
            return;
        };

        let status = if response.status.is_success() {
            disconnect_listener(model, configuration, response)
        } else {
            tracing::info!("Talker {} refused disconnect: {}", response.talker_entity_id, response.status);
            response.status
        };

        let mut reply = response.clone();
        reply.message_type = AcmpMessageType::DisconnectRxResponse;
        reply.status = status;
        reply.sequence_id = entry.original_sequence_id;
        send_pdu(transport, &reply, "DISCONNECT_RX_RESPONSE");
    }
}

/// Record the talker's stream in the listener table
fn connect_listener(model: &mut EntityModel, configuration: u16, response: &Acmpdu) -> AcmpStatus {
    let Some(info) = model.find_listener_info_mut(configuration, response.listener_unique_id) else {
        return AcmpStatus::LISTENER_MISBEHAVING;
    };
    if info.connected {
        tracing::debug!("Stream {} connected while the command was in flight", info.listener_unique_id);
        return AcmpStatus::LISTENER_EXCLUSIVE;
    }

    info.connected = true;
    info.talker_entity_id = response.talker_entity_id;
    info.talker_unique_id = response.talker_unique_id;
    info.stream_id = response.stream_id;
    info.stream_dest_mac = response.stream_dest_mac;
    info.controller_entity_id = response.controller_entity_id;
    info.flags = response.flags;
    info.stream_vlan_id = response.stream_vlan_id;

    tracing::info!(
        "Stream {} connected to {}:{} (stream ID {}, {}, VLAN {})",
        info.listener_unique_id,
        info.talker_entity_id,
        info.talker_unique_id,
        info.stream_id,
        info.stream_dest_mac,
        info.stream_vlan_id
    );
    AcmpStatus::SUCCESS
}

fn disconnect_listener(model: &mut EntityModel, configuration: u16, response: &Acmpdu) -> AcmpStatus {
    match model.find_listener_info_mut(configuration, response.listener_unique_id) {
        Some(info) if info.is_connected_to(response.talker_entity_id, response.talker_unique_id) => {
            tracing::info!("Stream {} disconnected from {}", info.listener_unique_id, info.talker_entity_id);
            info.clear();
            AcmpStatus::SUCCESS
        }
        _ => {
            tracing::warn!("Could not disconnect stream {}", response.listener_unique_id);
            AcmpStatus::LISTENER_MISBEHAVING
        }
    }
}

fn get_rx_state(model: &EntityModel, command: &Acmpdu, transport: &dyn Transport) {
    let response = match model.find_listener_info(model.current_configuration(), command.listener_unique_id) {
        Some(info) => {
            let mut response = command.to_response(AcmpStatus::SUCCESS);
            response.connection_count = u16::from(info.connected);
            response.talker_entity_id = info.talker_entity_id;
            response.talker_unique_id = info.talker_unique_id;
            response.stream_id = info.stream_id;
            response.stream_dest_mac = info.stream_dest_mac;
            response.stream_vlan_id = info.stream_vlan_id;
            response.flags = info.flags;
            response
        }
        None => command.to_response(AcmpStatus::LISTENER_UNKNOWN_ID),
    };
    send_pdu(transport, &response, "GET_RX_STATE_RESPONSE");
}

/// Controller-facing response for a command forwarded to the talker
fn controller_response(forwarded: AcmpMessageType) -> AcmpMessageType {
    match forwarded {
        AcmpMessageType::DisconnectTxCommand => AcmpMessageType::DisconnectRxResponse,
        _ => AcmpMessageType::ConnectRxResponse,
    }
}
