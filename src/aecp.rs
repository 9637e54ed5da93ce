//! AECP engine
//!
//! Answers AEM commands addressed to this entity. ENTITY_AVAILABLE always
//! succeeds and READ_DESCRIPTOR is served from the [`EntityModel`]; every
//! other command, and every non-AEM message class, is echoed back with
//! NOT_IMPLEMENTED. Responses are unicast to the sender's MAC.

use bytes::BufMut;
use std::time::Instant;

use crate::entity::{DescriptorType, EntityModel};
use crate::error::DecodeError;
use crate::protocol::aecpdu::{
    encode_aem_response, encode_echo_response, AecpHeader, AemHeader, ReadDescriptorCommand,
};
use crate::protocol::{AecpMessageType, AemCommandType, AemStatus, MacAddress};
use crate::transport::{send_logged, Transport};

/// AEM command responder
#[derive(Debug, Default)]
pub struct AecpResponder {
    served: u64,
}

impl AecpResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands answered so far
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Process one AECPDU received from `src`
    pub fn handle(
        &mut self,
        model: &EntityModel,
        src: MacAddress,
        bytes: &[u8],
        transport: &dyn Transport,
    ) -> Result<(), DecodeError> {
        let header = AecpHeader::decode(bytes)?;
        if header.target_entity_id != model.entity_id() {
            tracing::trace!("Ignoring AECP for {}", header.target_entity_id);
            return Ok(());
        }
        if !header.message_type.is_command() {
            tracing::trace!("Ignoring AECP {:?} from {}", header.message_type, src);
            return Ok(());
        }

        let response = if header.message_type == AecpMessageType::AemCommand {
            let aem = AemHeader::decode(bytes)?;
            match aem.command_type {
                AemCommandType::ENTITY_AVAILABLE => {
                    tracing::debug!("ENTITY_AVAILABLE from {}", aem.common.controller_entity_id);
                    encode_aem_response(&aem, AemStatus::SUCCESS, &[])
                }
                AemCommandType::READ_DESCRIPTOR => {
                    let command = ReadDescriptorCommand::decode(bytes)?;
                    read_descriptor(model, &aem, &command)
                }
                other => {
                    tracing::debug!("AEM {} not implemented", other);
                    encode_echo_response(bytes, &header, AemStatus::NOT_IMPLEMENTED.0)
                }
            }
        } else {
            tracing::debug!("AECP {:?} not implemented", header.message_type);
            encode_echo_response(bytes, &header, AemStatus::NOT_IMPLEMENTED.0)
        };

        self.served += 1;
        send_logged(transport, src, &response, "AECP response");
        Ok(())
    }

    /// Periodic work; an entity without controller support holds no AECP timers
    pub fn tick(&mut self, _now: Instant) {}
}

/// Failure payload: the command's target fields unchanged
fn echo_target(command: &ReadDescriptorCommand) -> [u8; 8] {
    let mut payload = [0u8; 8];
    let mut buf = &mut payload[..];
    buf.put_u16(command.configuration_index);
    buf.put_u16(0);
    buf.put_u16(command.descriptor_type);
    buf.put_u16(command.descriptor_index);
    payload
}

fn read_descriptor(model: &EntityModel, aem: &AemHeader, command: &ReadDescriptorCommand) -> Vec<u8> {
    let not_found = || {
        tracing::debug!(
            "READ_DESCRIPTOR {:#06x}/{} in configuration {}: no such descriptor",
            command.descriptor_type,
            command.descriptor_index,
            command.configuration_index
        );
        encode_aem_response(aem, AemStatus::NO_SUCH_DESCRIPTOR, &echo_target(command))
    };

    let Some(kind) = DescriptorType::from_u16(command.descriptor_type) else {
        return not_found();
    };
    let Some(descriptor) = model.find_descriptor(command.configuration_index, kind, command.descriptor_index) else {
        return not_found();
    };

    let body = descriptor.to_bytes();
    if body.is_empty() {
        tracing::debug!("READ_DESCRIPTOR {} {}: not serializable", kind.name(), command.descriptor_index);
        return encode_aem_response(aem, AemStatus::NOT_SUPPORTED, &echo_target(command));
    }

    let configuration_index = match kind {
        DescriptorType::Entity | DescriptorType::Configuration => 0,
        _ => command.configuration_index,
    };
    let mut payload = Vec::with_capacity(4 + body.len());
    payload.put_u16(configuration_index);
    payload.put_u16(0);
    payload.extend_from_slice(&body);

    tracing::debug!(
        "READ_DESCRIPTOR {} {} served ({} bytes)",
        kind.name(),
        command.descriptor_index,
        body.len()
    );
    encode_aem_response(aem, AemStatus::SUCCESS, &payload)
}
