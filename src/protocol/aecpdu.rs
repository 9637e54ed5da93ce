//! AECP data unit and the AEM command subset served by an entity

use bytes::{Buf, BufMut};
use std::fmt;

use super::{ensure_len, ControlHeader, Eui64, Subtype};
use crate::error::DecodeError;

/// AECP message classes; commands are even, responses odd
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AecpMessageType {
    AemCommand = 0,
    AemResponse = 1,
    AddressAccessCommand = 2,
    AddressAccessResponse = 3,
    AvcCommand = 4,
    AvcResponse = 5,
    VendorUniqueCommand = 6,
    VendorUniqueResponse = 7,
    HdcpApmCommand = 8,
    HdcpApmResponse = 9,
    ExtendedCommand = 14,
    ExtendedResponse = 15,
}

impl AecpMessageType {
    pub fn is_command(self) -> bool {
        (self as u8) & 0x01 == 0
    }

    /// Response class answering this command class
    pub fn response(self) -> Self {
        use AecpMessageType::*;
        match self {
            AemCommand | AemResponse => AemResponse,
            AddressAccessCommand | AddressAccessResponse => AddressAccessResponse,
            AvcCommand | AvcResponse => AvcResponse,
            VendorUniqueCommand | VendorUniqueResponse => VendorUniqueResponse,
            HdcpApmCommand | HdcpApmResponse => HdcpApmResponse,
            ExtendedCommand | ExtendedResponse => ExtendedResponse,
        }
    }
}

impl TryFrom<u8> for AecpMessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use AecpMessageType::*;
        Ok(match value {
            0 => AemCommand,
            1 => AemResponse,
            2 => AddressAccessCommand,
            3 => AddressAccessResponse,
            4 => AvcCommand,
            5 => AvcResponse,
            6 => VendorUniqueCommand,
            7 => VendorUniqueResponse,
            8 => HdcpApmCommand,
            9 => HdcpApmResponse,
            14 => ExtendedCommand,
            15 => ExtendedResponse,
            other => return Err(DecodeError::UnknownMessageType(other)),
        })
    }
}

/// AEM status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AemStatus(pub u8);

impl AemStatus {
    pub const SUCCESS: AemStatus = AemStatus(0);
    pub const NOT_IMPLEMENTED: AemStatus = AemStatus(1);
    pub const NO_SUCH_DESCRIPTOR: AemStatus = AemStatus(2);
    pub const ENTITY_LOCKED: AemStatus = AemStatus(3);
    pub const ENTITY_ACQUIRED: AemStatus = AemStatus(4);
    pub const NOT_AUTHENTICATED: AemStatus = AemStatus(5);
    pub const AUTHENTICATION_DISABLED: AemStatus = AemStatus(6);
    pub const BAD_ARGUMENTS: AemStatus = AemStatus(7);
    pub const NO_RESOURCES: AemStatus = AemStatus(8);
    pub const IN_PROGRESS: AemStatus = AemStatus(9);
    pub const ENTITY_MISBEHAVING: AemStatus = AemStatus(10);
    pub const NOT_SUPPORTED: AemStatus = AemStatus(11);
    pub const STREAM_IS_RUNNING: AemStatus = AemStatus(12);
}

/// AEM command type (15 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AemCommandType(pub u16);

impl AemCommandType {
    pub const ACQUIRE_ENTITY: AemCommandType = AemCommandType(0x0000);
    pub const LOCK_ENTITY: AemCommandType = AemCommandType(0x0001);
    pub const ENTITY_AVAILABLE: AemCommandType = AemCommandType(0x0002);
    pub const CONTROLLER_AVAILABLE: AemCommandType = AemCommandType(0x0003);
    pub const READ_DESCRIPTOR: AemCommandType = AemCommandType(0x0004);
    pub const WRITE_DESCRIPTOR: AemCommandType = AemCommandType(0x0005);
    pub const SET_CONFIGURATION: AemCommandType = AemCommandType(0x0006);
    pub const GET_CONFIGURATION: AemCommandType = AemCommandType(0x0007);
}

impl fmt::Display for AemCommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::ACQUIRE_ENTITY => "ACQUIRE_ENTITY",
            Self::LOCK_ENTITY => "LOCK_ENTITY",
            Self::ENTITY_AVAILABLE => "ENTITY_AVAILABLE",
            Self::CONTROLLER_AVAILABLE => "CONTROLLER_AVAILABLE",
            Self::READ_DESCRIPTOR => "READ_DESCRIPTOR",
            Self::WRITE_DESCRIPTOR => "WRITE_DESCRIPTOR",
            Self::SET_CONFIGURATION => "SET_CONFIGURATION",
            Self::GET_CONFIGURATION => "GET_CONFIGURATION",
            _ => return write!(f, "command {:#06x}", self.0),
        };
        f.write_str(name)
    }
}

/// Fields common to every AECPDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AecpHeader {
    pub message_type: AecpMessageType,
    pub status: u8,
    pub control_data_length: u16,
    pub target_entity_id: Eui64,
    pub controller_entity_id: Eui64,
    pub sequence_id: u16,
}

impl AecpHeader {
    pub const LEN: usize = 22;

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header = ControlHeader::decode_expecting(bytes, Subtype::Aecp)?;
        ensure_len(bytes, Self::LEN)?;
        let message_type = AecpMessageType::try_from(header.message_type)?;
        let mut buf = &bytes[ControlHeader::LEN..];
        Ok(Self {
            message_type,
            status: header.status,
            control_data_length: header.control_data_length,
            target_entity_id: header.id,
            controller_entity_id: Eui64(buf.get_u64()),
            sequence_id: buf.get_u16(),
        })
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        ControlHeader::new(
            Subtype::Aecp,
            self.message_type as u8,
            self.status,
            self.control_data_length,
            self.target_entity_id,
        )
        .encode(buf);
        buf.put_u64(self.controller_entity_id.0);
        buf.put_u16(self.sequence_id);
    }
}

/// AEM command/response header: common fields plus `u | command_type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AemHeader {
    pub common: AecpHeader,
    pub unsolicited: bool,
    pub command_type: AemCommandType,
}

impl AemHeader {
    pub const LEN: usize = 24;

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let common = AecpHeader::decode(bytes)?;
        ensure_len(bytes, Self::LEN)?;
        let word = u16::from_be_bytes([bytes[22], bytes[23]]);
        Ok(Self {
            common,
            unsolicited: word & 0x8000 != 0,
            command_type: AemCommandType(word & 0x7FFF),
        })
    }
}

/// READ_DESCRIPTOR command body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDescriptorCommand {
    pub configuration_index: u16,
    pub descriptor_type: u16,
    pub descriptor_index: u16,
}

impl ReadDescriptorCommand {
    /// Full command length including the AEM header
    pub const LEN: usize = 32;

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(bytes, Self::LEN)?;
        let mut buf = &bytes[AemHeader::LEN..];
        let configuration_index = buf.get_u16();
        buf.advance(2);
        Ok(Self {
            configuration_index,
            descriptor_type: buf.get_u16(),
            descriptor_index: buf.get_u16(),
        })
    }
}

/// Encode an AEM response to `request` carrying `payload` after the command type
pub fn encode_aem_response(
    request: &AemHeader,
    status: AemStatus,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(AemHeader::LEN + payload.len());
    let header = AecpHeader {
        message_type: AecpMessageType::AemResponse,
        status: status.0,
        control_data_length: (AemHeader::LEN - ControlHeader::LEN + payload.len()) as u16,
        ..request.common.clone()
    };
    header.encode(&mut buf);
    buf.put_u16(request.command_type.0 & 0x7FFF);
    buf.put_slice(payload);
    buf
}

/// Echo a command back as its response class with `status`, keeping its payload
pub fn encode_echo_response(request_bytes: &[u8], request: &AecpHeader, status: u8) -> Vec<u8> {
    let declared = ControlHeader::LEN + usize::from(request.control_data_length);
    let len = declared.clamp(AecpHeader::LEN, request_bytes.len().max(AecpHeader::LEN));
    let mut buf = Vec::with_capacity(len);
    let header = AecpHeader {
        message_type: request.message_type.response(),
        status,
        control_data_length: (len - ControlHeader::LEN) as u16,
        ..request.clone()
    };
    header.encode(&mut buf);
    if let Some(rest) = request_bytes.get(AecpHeader::LEN..len) {
        buf.put_slice(rest);
    }
    buf
}

/// Encode an AEM command (used by tests and diagnostic callers)
pub fn encode_aem_command(
    target_entity_id: Eui64,
    controller_entity_id: Eui64,
    sequence_id: u16,
    command_type: AemCommandType,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(AemHeader::LEN + payload.len());
    AecpHeader {
        message_type: AecpMessageType::AemCommand,
        status: 0,
        control_data_length: (AemHeader::LEN - ControlHeader::LEN + payload.len()) as u16,
        target_entity_id,
        controller_entity_id,
        sequence_id,
    }
    .encode(&mut buf);
    buf.put_u16(command_type.0 & 0x7FFF);
    buf.put_slice(payload);
    buf
}

/// READ_DESCRIPTOR command body bytes (after the AEM header)
pub fn read_descriptor_payload(configuration_index: u16, descriptor_type: u16, descriptor_index: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.put_u16(configuration_index);
    buf.put_u16(0);
    buf.put_u16(descriptor_type);
    buf.put_u16(descriptor_index);
    buf
}
