//! ADP data unit (entity advertisement)

use bytes::{Buf, BufMut};

use super::{ensure_len, ControlHeader, Eui64, Subtype};
use crate::error::DecodeError;

/// ADP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdpMessageType {
    EntityAvailable = 0,
    EntityDeparting = 1,
    EntityDiscover = 2,
}

impl TryFrom<u8> for AdpMessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AdpMessageType::EntityAvailable),
            1 => Ok(AdpMessageType::EntityDeparting),
            2 => Ok(AdpMessageType::EntityDiscover),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }
}

/// ADPDU: control header plus 56 bytes of entity summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adpdu {
    pub message_type: AdpMessageType,
    /// Advertisement lifetime in 2-second units
    pub valid_time: u8,
    pub entity_id: Eui64,
    pub entity_model_id: Eui64,
    pub entity_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    pub controller_capabilities: u32,
    pub available_index: u32,
    pub gptp_grandmaster_id: Eui64,
    pub gptp_domain_number: u8,
    pub identify_control_index: u16,
    pub interface_index: u16,
    pub association_id: Eui64,
}

impl Adpdu {
    /// Full PDU length
    pub const LEN: usize = 68;

    /// control_data_length value carried by every ADPDU
    pub const CONTROL_DATA_LENGTH: u16 = 56;

    /// A DISCOVER request for every entity on the segment
    pub fn discover() -> Self {
        Self {
            message_type: AdpMessageType::EntityDiscover,
            valid_time: 0,
            entity_id: Eui64::ZERO,
            entity_model_id: Eui64::ZERO,
            entity_capabilities: 0,
            talker_stream_sources: 0,
            talker_capabilities: 0,
            listener_stream_sinks: 0,
            listener_capabilities: 0,
            controller_capabilities: 0,
            available_index: 0,
            gptp_grandmaster_id: Eui64::ZERO,
            gptp_domain_number: 0,
            identify_control_index: 0,
            interface_index: 0,
            association_id: Eui64::ZERO,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        ControlHeader::new(
            Subtype::Adp,
            self.message_type as u8,
            self.valid_time,
            Self::CONTROL_DATA_LENGTH,
            self.entity_id,
        )
        .encode(&mut buf);
        buf.put_u64(self.entity_model_id.0);
        buf.put_u32(self.entity_capabilities);
        buf.put_u16(self.talker_stream_sources);
        buf.put_u16(self.talker_capabilities);
        buf.put_u16(self.listener_stream_sinks);
        buf.put_u16(self.listener_capabilities);
        buf.put_u32(self.controller_capabilities);
        buf.put_u32(self.available_index);
        buf.put_u64(self.gptp_grandmaster_id.0);
        buf.put_u8(self.gptp_domain_number);
        buf.put_bytes(0, 3);
        buf.put_u16(self.identify_control_index);
        buf.put_u16(self.interface_index);
        buf.put_u64(self.association_id.0);
        buf.put_u32(0);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header = ControlHeader::decode_expecting(bytes, Subtype::Adp)?;
        ensure_len(bytes, Self::LEN)?;
        let message_type = AdpMessageType::try_from(header.message_type)?;

        let mut buf = &bytes[ControlHeader::LEN..];
        let entity_model_id = Eui64(buf.get_u64());
        let entity_capabilities = buf.get_u32();
        let talker_stream_sources = buf.get_u16();
        let talker_capabilities = buf.get_u16();
        let listener_stream_sinks = buf.get_u16();
        let listener_capabilities = buf.get_u16();
        let controller_capabilities = buf.get_u32();
        let available_index = buf.get_u32();
        let gptp_grandmaster_id = Eui64(buf.get_u64());
        let gptp_domain_number = buf.get_u8();
        buf.advance(3);
        let identify_control_index = buf.get_u16();
        let interface_index = buf.get_u16();
        let association_id = Eui64(buf.get_u64());

        Ok(Self {
            message_type,
            valid_time: header.status,
            entity_id: header.id,
            entity_model_id,
            entity_capabilities,
            talker_stream_sources,
            talker_capabilities,
            listener_stream_sinks,
            listener_capabilities,
            controller_capabilities,
            available_index,
            gptp_grandmaster_id,
            gptp_domain_number,
            identify_control_index,
            interface_index,
            association_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adpdu_field_offsets() {
        let mut pdu = Adpdu::discover();
        pdu.message_type = AdpMessageType::EntityAvailable;
        pdu.valid_time = 31;
        pdu.entity_id = Eui64(0x0102_0304_0506_0708);
        pdu.available_index = 0xAABB_CCDD;
        pdu.gptp_grandmaster_id = Eui64(0x1122_3344_5566_7788);
        pdu.association_id = Eui64(0x99);

        let bytes = pdu.encode();
        assert_eq!(bytes.len(), Adpdu::LEN);
        assert_eq!(&bytes[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[36..40], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(bytes[40], 0x11);
        assert_eq!(bytes[63], 0x99);
        assert_eq!(Adpdu::decode(&bytes).unwrap(), pdu);
    }

    #[test]
    fn test_adpdu_rejects_short_frame() {
        let bytes = Adpdu::discover().encode();
        assert!(matches!(
            Adpdu::decode(&bytes[..40]),
            Err(DecodeError::Truncated { needed: 68, .. })
        ));
    }

    #[test]
    fn test_adpdu_rejects_other_subtype() {
        let mut bytes = Adpdu::discover().encode();
        bytes[0] = 0xFC;
        assert_eq!(Adpdu::decode(&bytes), Err(DecodeError::UnexpectedSubtype(0x7C)));
    }
}
