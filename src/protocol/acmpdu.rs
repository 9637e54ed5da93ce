//! ACMP data unit (connection management)

use bytes::{Buf, BufMut};
use std::fmt;
use std::time::Duration;

use super::{ensure_len, ControlHeader, Eui64, MacAddress, Subtype};
use crate::error::DecodeError;

/// ACMP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AcmpMessageType {
    ConnectTxCommand = 0,
    ConnectTxResponse = 1,
    DisconnectTxCommand = 2,
    DisconnectTxResponse = 3,
    GetTxStateCommand = 4,
    GetTxStateResponse = 5,
    ConnectRxCommand = 6,
    ConnectRxResponse = 7,
    DisconnectRxCommand = 8,
    DisconnectRxResponse = 9,
    GetRxStateCommand = 10,
    GetRxStateResponse = 11,
    GetTxConnectionCommand = 12,
    GetTxConnectionResponse = 13,
}

impl AcmpMessageType {
    /// Response type answering this command (commands are even, responses odd)
    pub fn response(self) -> Self {
        use AcmpMessageType::*;
        match self {
            ConnectTxCommand | ConnectTxResponse => ConnectTxResponse,
            DisconnectTxCommand | DisconnectTxResponse => DisconnectTxResponse,
            GetTxStateCommand | GetTxStateResponse => GetTxStateResponse,
            ConnectRxCommand | ConnectRxResponse => ConnectRxResponse,
            DisconnectRxCommand | DisconnectRxResponse => DisconnectRxResponse,
            GetRxStateCommand | GetRxStateResponse => GetRxStateResponse,
            GetTxConnectionCommand | GetTxConnectionResponse => GetTxConnectionResponse,
        }
    }

    /// Messages handled by the talker state machine
    pub fn is_talker_message(self) -> bool {
        use AcmpMessageType::*;
        matches!(
            self,
            ConnectTxCommand | DisconnectTxCommand | GetTxStateCommand | GetTxConnectionCommand
        )
    }

    /// Messages handled by the listener state machine
    pub fn is_listener_message(self) -> bool {
        use AcmpMessageType::*;
        matches!(
            self,
            ConnectTxResponse
                | DisconnectTxResponse
                | ConnectRxCommand
                | DisconnectRxCommand
                | GetRxStateCommand
        )
    }

    /// In-flight timeout for commands a listener forwards to a talker
    pub fn timeout(self) -> Duration {
        use AcmpMessageType::*;
        let ms = match self {
            ConnectTxCommand => 2000,
            DisconnectTxCommand => 200,
            GetTxStateCommand => 200,
            ConnectRxCommand => 4500,
            DisconnectRxCommand => 500,
            GetRxStateCommand => 200,
            GetTxConnectionCommand => 200,
            _ => 0,
        };
        Duration::from_millis(ms)
    }
}

impl TryFrom<u8> for AcmpMessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use AcmpMessageType::*;
        Ok(match value {
            0 => ConnectTxCommand,
            1 => ConnectTxResponse,
            2 => DisconnectTxCommand,
            3 => DisconnectTxResponse,
            4 => GetTxStateCommand,
            5 => GetTxStateResponse,
            6 => ConnectRxCommand,
            7 => ConnectRxResponse,
            8 => DisconnectRxCommand,
            9 => DisconnectRxResponse,
            10 => GetRxStateCommand,
            11 => GetRxStateResponse,
            12 => GetTxConnectionCommand,
            13 => GetTxConnectionResponse,
            other => return Err(DecodeError::UnknownMessageType(other)),
        })
    }
}

/// ACMP status code (5 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AcmpStatus(pub u8);

impl AcmpStatus {
    pub const SUCCESS: AcmpStatus = AcmpStatus(0);
    pub const LISTENER_UNKNOWN_ID: AcmpStatus = AcmpStatus(1);
    pub const TALKER_UNKNOWN_ID: AcmpStatus = AcmpStatus(2);
    pub const TALKER_DEST_MAC_FAIL: AcmpStatus = AcmpStatus(3);
    pub const TALKER_NO_STREAM_INDEX: AcmpStatus = AcmpStatus(4);
    pub const TALKER_NO_BANDWIDTH: AcmpStatus = AcmpStatus(5);
    pub const TALKER_EXCLUSIVE: AcmpStatus = AcmpStatus(6);
    pub const LISTENER_TALKER_TIMEOUT: AcmpStatus = AcmpStatus(7);
    pub const LISTENER_EXCLUSIVE: AcmpStatus = AcmpStatus(8);
    pub const STATE_UNAVAILABLE: AcmpStatus = AcmpStatus(9);
    pub const NOT_CONNECTED: AcmpStatus = AcmpStatus(10);
    pub const NO_SUCH_CONNECTION: AcmpStatus = AcmpStatus(11);
    pub const COULD_NOT_SEND_MESSAGE: AcmpStatus = AcmpStatus(12);
    pub const TALKER_MISBEHAVING: AcmpStatus = AcmpStatus(13);
    pub const LISTENER_MISBEHAVING: AcmpStatus = AcmpStatus(14);
    pub const CONTROLLER_NOT_AUTHORIZED: AcmpStatus = AcmpStatus(16);
    pub const INCOMPATIBLE_REQUEST: AcmpStatus = AcmpStatus(17);
    pub const NOT_SUPPORTED: AcmpStatus = AcmpStatus(31);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "SUCCESS",
            1 => "LISTENER_UNKNOWN_ID",
            2 => "TALKER_UNKNOWN_ID",
            3 => "TALKER_DEST_MAC_FAIL",
            4 => "TALKER_NO_STREAM_INDEX",
            5 => "TALKER_NO_BANDWIDTH",
            6 => "TALKER_EXCLUSIVE",
            7 => "LISTENER_TALKER_TIMEOUT",
            8 => "LISTENER_EXCLUSIVE",
            9 => "STATE_UNAVAILABLE",
            10 => "NOT_CONNECTED",
            11 => "NO_SUCH_CONNECTION",
            12 => "COULD_NOT_SEND_MESSAGE",
            13 => "TALKER_MISBEHAVING",
            14 => "LISTENER_MISBEHAVING",
            16 => "CONTROLLER_NOT_AUTHORIZED",
            17 => "INCOMPATIBLE_REQUEST",
            31 => "NOT_SUPPORTED",
            _ => "RESERVED",
        }
    }
}

impl fmt::Display for AcmpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// ACMPDU: 56 bytes, identical layout for every message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acmpdu {
    pub message_type: AcmpMessageType,
    pub status: AcmpStatus,
    pub stream_id: Eui64,
    pub controller_entity_id: Eui64,
    pub talker_entity_id: Eui64,
    pub listener_entity_id: Eui64,
    pub talker_unique_id: u16,
    pub listener_unique_id: u16,
    pub stream_dest_mac: MacAddress,
    pub connection_count: u16,
    pub sequence_id: u16,
    pub flags: u16,
    pub stream_vlan_id: u16,
}

impl Acmpdu {
    /// Full PDU length
    pub const LEN: usize = 56;

    /// control_data_length value carried by every ACMPDU
    pub const CONTROL_DATA_LENGTH: u16 = 44;

    /// A zeroed PDU of the given type
    pub fn new(message_type: AcmpMessageType) -> Self {
        Self {
            message_type,
            status: AcmpStatus::SUCCESS,
            stream_id: Eui64::ZERO,
            controller_entity_id: Eui64::ZERO,
            talker_entity_id: Eui64::ZERO,
            listener_entity_id: Eui64::ZERO,
            talker_unique_id: 0,
            listener_unique_id: 0,
            stream_dest_mac: MacAddress::ZERO,
            connection_count: 0,
            sequence_id: 0,
            flags: 0,
            stream_vlan_id: 0,
        }
    }

    /// Copy of this command turned into its response with `status`
    pub fn to_response(&self, status: AcmpStatus) -> Self {
        let mut response = self.clone();
        response.message_type = self.message_type.response();
        response.status = status;
        response
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        ControlHeader::new(
            Subtype::Acmp,
            self.message_type as u8,
            self.status.0,
            Self::CONTROL_DATA_LENGTH,
            self.stream_id,
        )
        .encode(&mut buf);
        buf.put_u64(self.controller_entity_id.0);
        buf.put_u64(self.talker_entity_id.0);
        buf.put_u64(self.listener_entity_id.0);
        buf.put_u16(self.talker_unique_id);
        buf.put_u16(self.listener_unique_id);
        buf.put_slice(&self.stream_dest_mac.0);
        buf.put_u16(self.connection_count);
        buf.put_u16(self.sequence_id);
        buf.put_u16(self.flags);
        buf.put_u16(self.stream_vlan_id);
        buf.put_u16(0);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header = ControlHeader::decode_expecting(bytes, Subtype::Acmp)?;
        ensure_len(bytes, Self::LEN)?;
        let message_type = AcmpMessageType::try_from(header.message_type)?;

        let mut buf = &bytes[ControlHeader::LEN..];
        let controller_entity_id = Eui64(buf.get_u64());
        let talker_entity_id = Eui64(buf.get_u64());
        let listener_entity_id = Eui64(buf.get_u64());
        let talker_unique_id = buf.get_u16();
        let listener_unique_id = buf.get_u16();
        let mut mac = [0u8; 6];
        buf.copy_to_slice(&mut mac);

        Ok(Self {
            message_type,
            status: AcmpStatus(header.status),
            stream_id: header.id,
            controller_entity_id,
            talker_entity_id,
            listener_entity_id,
            talker_unique_id,
            listener_unique_id,
            stream_dest_mac: MacAddress(mac),
            connection_count: buf.get_u16(),
            sequence_id: buf.get_u16(),
            flags: buf.get_u16(),
            stream_vlan_id: buf.get_u16(),
        })
    }
}
