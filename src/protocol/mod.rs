//! IEEE 1722.1 wire formats
//!
//! All three AVDECC sub-protocols share the AVTP control header:
//!
//! ```text
//! ┌────────────────┬────────────────────────┬──────────────────────────────┬───────────────┐
//! │ cd|subtype (1) │ sv|version|msg_type (1)│ status(5)|control_data_len(11)│ entity id (8) │
//! └────────────────┴────────────────────────┴──────────────────────────────┴───────────────┘
//! ```
//!
//! Identifiers are EUI-64 ([`Eui64`]) and EUI-48 ([`MacAddress`]), all fields big-endian.

pub mod acmpdu;
pub mod adpdu;
pub mod aecpdu;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;

pub use acmpdu::{AcmpMessageType, AcmpStatus, Acmpdu};
pub use adpdu::{AdpMessageType, Adpdu};
pub use aecpdu::{AecpMessageType, AemCommandType, AemStatus};

/// IEEE 1722 ethertype carried by every AVDECC frame
pub const AVTP_ETHERTYPE: u16 = 0x22F0;

/// AVTP version understood by this stack
pub const AVTP_VERSION: u8 = 0;

/// Multicast destination for ADP and ACMP
pub const ADP_ACMP_MULTICAST: MacAddress = MacAddress([0x91, 0xE0, 0xF0, 0x01, 0x00, 0x00]);

/// AVTP control subtypes routed by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtype {
    Adp,
    Aecp,
    Acmp,
}

impl Subtype {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x7A => Some(Subtype::Adp),
            0x7B => Some(Subtype::Aecp),
            0x7C => Some(Subtype::Acmp),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Subtype::Adp => 0x7A,
            Subtype::Aecp => 0x7B,
            Subtype::Acmp => 0x7C,
        }
    }
}

/// EUI-64 identifier (entity, entity model, stream and clock identities)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Eui64(pub u64);

impl Eui64 {
    pub const ZERO: Eui64 = Eui64(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Derive an entity ID from an interface MAC (`mac[0..3] FF FE mac[3..6]`)
    pub fn from_mac(mac: MacAddress) -> Self {
        let m = mac.0;
        Self(u64::from_be_bytes([m[0], m[1], m[2], 0xFF, 0xFE, m[3], m[4], m[5]]))
    }

    /// Build a stream ID from a source MAC and a 16-bit unique ID
    pub fn stream_id(mac: MacAddress, unique_id: u16) -> Self {
        let m = mac.0;
        let u = unique_id.to_be_bytes();
        Self(u64::from_be_bytes([m[0], m[1], m[2], m[3], m[4], m[5], u[0], u[1]]))
    }
}

impl From<u64> for Eui64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl FromStr for Eui64 {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16)
                .map(Eui64)
                .map_err(|_| DecodeError::InvalidEui64(s.to_string()));
        }
        let bytes = parse_octets::<8>(s).ok_or_else(|| DecodeError::InvalidEui64(s.to_string()))?;
        Ok(Eui64(u64::from_be_bytes(bytes)))
    }
}

/// EUI-48 MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// Low 48 bits of `value`, most significant octet first
    pub fn from_u64(value: u64) -> Self {
        let b = value.to_be_bytes();
        Self([b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    pub fn to_u64(self) -> u64 {
        let m = self.0;
        u64::from_be_bytes([0, 0, m[0], m[1], m[2], m[3], m[4], m[5]])
    }

    pub fn octets(self) -> [u8; 6] {
        self.0
    }

    pub fn is_multicast(self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16)
                .ok()
                .filter(|v| *v <= 0xFFFF_FFFF_FFFF)
                .map(MacAddress::from_u64)
                .ok_or_else(|| DecodeError::InvalidMac(s.to_string()));
        }
        parse_octets::<6>(s)
            .map(MacAddress)
            .ok_or_else(|| DecodeError::InvalidMac(s.to_string()))
    }
}

fn parse_octets<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    let mut parts = s.split(|c| c == ':' || c == '-');
    for slot in out.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *slot = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Documents may spell identifiers either as strings or as plain integers
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(u64),
}

impl Serialize for Eui64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Eui64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match IdRepr::deserialize(deserializer)? {
            IdRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            IdRepr::Number(n) => Ok(Eui64(n)),
        }
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match IdRepr::deserialize(deserializer)? {
            IdRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            IdRepr::Number(n) if n <= 0xFFFF_FFFF_FFFF => Ok(MacAddress::from_u64(n)),
            IdRepr::Number(n) => Err(serde::de::Error::custom(format!("MAC out of range: {:#x}", n))),
        }
    }
}

/// AVTP control header shared by ADPDU, AECPDU and ACMPDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    pub subtype: u8,
    pub stream_valid: bool,
    pub version: u8,
    pub message_type: u8,
    /// `status` for AECP/ACMP, `valid_time` for ADP (5 bits)
    pub status: u8,
    /// 11 bits
    pub control_data_length: u16,
    /// entity_id (ADP), target_entity_id (AECP) or stream_id (ACMP)
    pub id: Eui64,
}

impl ControlHeader {
    pub const LEN: usize = 12;

    pub fn new(subtype: Subtype, message_type: u8, status: u8, control_data_length: u16, id: Eui64) -> Self {
        Self {
            subtype: subtype.as_u8(),
            stream_valid: false,
            version: AVTP_VERSION,
            message_type,
            status,
            control_data_length,
            id,
        }
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(0x80 | (self.subtype & 0x7F));
        buf.put_u8(((self.stream_valid as u8) << 7) | ((self.version & 0x07) << 4) | (self.message_type & 0x0F));
        buf.put_u16((u16::from(self.status & 0x1F) << 11) | (self.control_data_length & 0x07FF));
        buf.put_u64(self.id.0);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(bytes, Self::LEN)?;
        let mut buf = bytes;
        let b0 = buf.get_u8();
        if b0 & 0x80 == 0 {
            return Err(DecodeError::NotControl);
        }
        let b1 = buf.get_u8();
        let word = buf.get_u16();
        let header = Self {
            subtype: b0 & 0x7F,
            stream_valid: b1 & 0x80 != 0,
            version: (b1 >> 4) & 0x07,
            message_type: b1 & 0x0F,
            status: (word >> 11) as u8,
            control_data_length: word & 0x07FF,
            id: Eui64(buf.get_u64()),
        };
        if header.version != AVTP_VERSION {
            return Err(DecodeError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }

    pub fn subtype(&self) -> Option<Subtype> {
        Subtype::from_u8(self.subtype)
    }

    /// Decode and require a specific subtype
    pub fn decode_expecting(bytes: &[u8], subtype: Subtype) -> Result<Self, DecodeError> {
        let header = Self::decode(bytes)?;
        if header.subtype != subtype.as_u8() {
            return Err(DecodeError::UnexpectedSubtype(header.subtype));
        }
        Ok(header)
    }
}

/// Sub-protocol of an AVDECC payload, read from its first octet
pub fn peek_subtype(payload: &[u8]) -> Result<Subtype, DecodeError> {
    let first = *payload.first().ok_or(DecodeError::Truncated { needed: 1, available: 0 })?;
    if first & 0x80 == 0 {
        return Err(DecodeError::NotControl);
    }
    Subtype::from_u8(first & 0x7F).ok_or(DecodeError::UnexpectedSubtype(first & 0x7F))
}

pub(crate) fn ensure_len(bytes: &[u8], needed: usize) -> Result<(), DecodeError> {
    if bytes.len() < needed {
        return Err(DecodeError::Truncated { needed, available: bytes.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_header_layout() {
        let header = ControlHeader::new(Subtype::Adp, 0, 31, 56, Eui64(0x0011_22FF_FE33_4455));
        let mut bytes = Vec::new();
        header.encode(&mut bytes);

        assert_eq!(bytes.len(), ControlHeader::LEN);
        assert_eq!(bytes[0], 0xFA);
        assert_eq!(bytes[1], 0x00);
        // valid_time 31 in the top five bits, length 56 below
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), (31 << 11) | 56);
        assert_eq!(ControlHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_peek_subtype() {
        assert_eq!(peek_subtype(&[0xFB]).unwrap(), Subtype::Aecp);
        assert_eq!(peek_subtype(&[0xFC, 0x00]).unwrap(), Subtype::Acmp);
        assert_eq!(peek_subtype(&[0x7A]), Err(DecodeError::NotControl));
        assert!(matches!(peek_subtype(&[]), Err(DecodeError::Truncated { .. })));
        assert_eq!(peek_subtype(&[0x82]), Err(DecodeError::UnexpectedSubtype(0x02)));
    }

    #[test]
    fn test_eui64_from_mac() {
        let mac: MacAddress = "00:1b:21:aa:bb:cc".parse().unwrap();
        assert_eq!(Eui64::from_mac(mac), Eui64(0x001B_21FF_FEAA_BBCC));
        assert_eq!(Eui64::stream_id(mac, 1), Eui64(0x001B_21AA_BBCC_0001));
    }

    #[test]
    fn test_mac_parse_forms() {
        let a: MacAddress = "91:e0:f0:00:0e:80".parse().unwrap();
        let b: MacAddress = "0x91e0f0000e80".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_u64(), 0x91E0_F000_0E80);
        assert_eq!(MacAddress::from_u64(0x91E0_F000_0E80), a);
        assert!(a.is_multicast());
        assert_eq!(a.to_string(), "91:e0:f0:00:0e:80");
        assert!("91:e0:f0".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_eui64_parse_forms() {
        let a: Eui64 = "0x0001020304050607".parse().unwrap();
        let b: Eui64 = "00-01-02-03-04-05-06-07".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0x0001020304050607");
    }
}
