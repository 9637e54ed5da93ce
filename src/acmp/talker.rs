//! ACMP talker state machine
//!
//! Stateless apart from the talker stream tables in the [`EntityModel`]. Every
//! command is answered with the matching `*_TX_RESPONSE`.

use crate::entity::{EntityModel, ListenerPair};
use crate::protocol::{AcmpMessageType, AcmpStatus, Acmpdu};

/// Build the response to a talker command addressed to this entity
pub(crate) fn respond(model: &mut EntityModel, command: &Acmpdu) -> Option<Acmpdu> {
    let response = match command.message_type {
        AcmpMessageType::ConnectTxCommand => connect(model, command),
        AcmpMessageType::DisconnectTxCommand => disconnect(model, command),
        AcmpMessageType::GetTxStateCommand => state(model, command),
        AcmpMessageType::GetTxConnectionCommand => connection(model, command),
        _ => return None,
    };
    Some(response)
}

fn connect(model: &mut EntityModel, command: &Acmpdu) -> Acmpdu {
    let configuration = model.current_configuration();
    let Some(info) = model.find_talker_info_mut(configuration, command.talker_unique_id) else {
        return command.to_response(AcmpStatus::TALKER_UNKNOWN_ID);
    };

    let pair = ListenerPair {
        listener_entity_id: command.listener_entity_id,
        listener_unique_id: command.listener_unique_id,
    };
    let status = match info.add_listener(pair) {
        Some(count) => {
            tracing::info!(
                "Listener {}:{} connected to stream {} ({} connection(s))",
                pair.listener_entity_id,
                pair.listener_unique_id,
                info.talker_unique_id,
                count
            );
            AcmpStatus::SUCCESS
        }
        None => AcmpStatus::TALKER_MISBEHAVING,
    };

    let mut response = command.to_response(status);
    response.stream_id = info.stream_id;
    response.stream_dest_mac = info.stream_dest_mac;
    response.stream_vlan_id = info.stream_vlan_id;
    response.connection_count = info.connection_count;
    response
}

fn disconnect(model: &mut EntityModel, command: &Acmpdu) -> Acmpdu {
    let configuration = model.current_configuration();
    let Some(info) = model.find_talker_info_mut(configuration, command.talker_unique_id) else {
        return command.to_response(AcmpStatus::TALKER_UNKNOWN_ID);
    };

    let pair = ListenerPair {
        listener_entity_id: command.listener_entity_id,
        listener_unique_id: command.listener_unique_id,
    };
    if info.remove_listener(&pair) {
        tracing::info!(
            "Listener {}:{} disconnected from stream {}",
            pair.listener_entity_id,
            pair.listener_unique_id,
            info.talker_unique_id
        );
    } else {
        tracing::debug!(
            "Listener {}:{} was not connected to stream {}",
            pair.listener_entity_id,
            pair.listener_unique_id,
            info.talker_unique_id
        );
    }

    let mut response = command.to_response(AcmpStatus::SUCCESS);
    response.connection_count = info.connection_count;
    response
}

fn state(model: &EntityModel, command: &Acmpdu) -> Acmpdu {
    let Some(info) = model.find_talker_info(model.current_configuration(), command.talker_unique_id) else {
        return command.to_response(AcmpStatus::TALKER_UNKNOWN_ID);
    };
    let mut response = command.to_response(AcmpStatus::SUCCESS);
    response.stream_id = info.stream_id;
    response.stream_dest_mac = info.stream_dest_mac;
    response.stream_vlan_id = info.stream_vlan_id;
    response.connection_count = info.connection_count;
    response
}

/// `connection_count` of the command selects the connection, counting from zero
fn connection(model: &EntityModel, command: &Acmpdu) -> Acmpdu {
    let Some(info) = model.find_talker_info(model.current_configuration(), command.talker_unique_id) else {
        return command.to_response(AcmpStatus::TALKER_UNKNOWN_ID);
    };
    let Some(pair) = info.connection(command.connection_count) else {
        return command.to_response(AcmpStatus::NO_SUCH_CONNECTION);
    };
    let mut response = command.to_response(AcmpStatus::SUCCESS);
    response.listener_entity_id = pair.listener_entity_id;
    response.listener_unique_id = pair.listener_unique_id;
    response.stream_id = info.stream_id;
    response.stream_dest_mac = info.stream_dest_mac;
    response.stream_vlan_id = info.stream_vlan_id;
    response.connection_count = info.connection_count;
    response
}
