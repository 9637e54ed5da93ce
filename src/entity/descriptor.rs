//! AEM descriptors and their wire encoding
//!
//! Every descriptor starts with `descriptor_type (u16) | descriptor_index (u16)`,
//! followed by fixed fields and then any variable-length trailing arrays. Array
//! offsets are measured from the start of the descriptor and are always the
//! standard ones; decoding rejects any other offset.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EntityError};
use crate::protocol::{ensure_len, Eui64, MacAddress};

/// Width of every fixed string field
pub const STRING_LEN: usize = 64;

/// Largest descriptor a READ_DESCRIPTOR response can carry
pub const MAX_DESCRIPTOR_LEN: usize = 508;

/// Strings carried by one STRINGS descriptor
pub const STRINGS_PER_DESCRIPTOR: usize = 7;

/// AEM descriptor type codes (0x0000..=0x0025)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum DescriptorType {
    Entity = 0x0000,
    Configuration,
    AudioUnit,
    VideoUnit,
    SensorUnit,
    StreamInput,
    StreamOutput,
    JackInput,
    JackOutput,
    AvbInterface,
    ClockSource,
    MemoryObject,
    Locale,
    Strings,
    StreamPortInput,
    StreamPortOutput,
    ExternalPortInput,
    ExternalPortOutput,
    InternalPortInput,
    InternalPortOutput,
    AudioCluster,
    VideoCluster,
    SensorCluster,
    AudioMap,
    VideoMap,
    SensorMap,
    Control,
    SignalSelector,
    Mixer,
    Matrix,
    MatrixSignal,
    SignalSplitter,
    SignalCombiner,
    SignalDemultiplexer,
    SignalMultiplexer,
    SignalTranscoder,
    ClockDomain,
    ControlBlock,
}

impl DescriptorType {
    /// Every type, indexed by its code
    pub const ALL: [DescriptorType; 38] = {
        use DescriptorType::*;
        [
            Entity, Configuration, AudioUnit, VideoUnit, SensorUnit, StreamInput, StreamOutput,
            JackInput, JackOutput, AvbInterface, ClockSource, MemoryObject, Locale, Strings,
            StreamPortInput, StreamPortOutput, ExternalPortInput, ExternalPortOutput,
            InternalPortInput, InternalPortOutput, AudioCluster, VideoCluster, SensorCluster,
            AudioMap, VideoMap, SensorMap, Control, SignalSelector, Mixer, Matrix, MatrixSignal,
            SignalSplitter, SignalCombiner, SignalDemultiplexer, SignalMultiplexer,
            SignalTranscoder, ClockDomain, ControlBlock,
        ]
    };

    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether this stack knows the wire layout of the type
    pub fn has_wire_format(self) -> bool {
        use DescriptorType::*;
        matches!(
            self,
            Entity
                | Configuration
                | AudioUnit
                | VideoUnit
                | StreamInput
                | StreamOutput
                | JackInput
                | JackOutput
                | AvbInterface
                | ClockSource
                | Locale
                | Strings
                | StreamPortInput
                | StreamPortOutput
                | AudioCluster
                | VideoCluster
                | AudioMap
                | VideoMap
                | ClockDomain
        )
    }

    pub fn name(self) -> &'static str {
        use DescriptorType::*;
        match self {
            Entity => "ENTITY",
            Configuration => "CONFIGURATION",
            AudioUnit => "AUDIO_UNIT",
            VideoUnit => "VIDEO_UNIT",
            SensorUnit => "SENSOR_UNIT",
            StreamInput => "STREAM_INPUT",
            StreamOutput => "STREAM_OUTPUT",
            JackInput => "JACK_INPUT",
            JackOutput => "JACK_OUTPUT",
            AvbInterface => "AVB_INTERFACE",
            ClockSource => "CLOCK_SOURCE",
            MemoryObject => "MEMORY_OBJECT",
            Locale => "LOCALE",
            Strings => "STRINGS",
            StreamPortInput => "STREAM_PORT_INPUT",
            StreamPortOutput => "STREAM_PORT_OUTPUT",
            ExternalPortInput => "EXTERNAL_PORT_INPUT",
            ExternalPortOutput => "EXTERNAL_PORT_OUTPUT",
            InternalPortInput => "INTERNAL_PORT_INPUT",
            InternalPortOutput => "INTERNAL_PORT_OUTPUT",
            AudioCluster => "AUDIO_CLUSTER",
            VideoCluster => "VIDEO_CLUSTER",
            SensorCluster => "SENSOR_CLUSTER",
            AudioMap => "AUDIO_MAP",
            VideoMap => "VIDEO_MAP",
            SensorMap => "SENSOR_MAP",
            Control => "CONTROL",
            SignalSelector => "SIGNAL_SELECTOR",
            Mixer => "MIXER",
            Matrix => "MATRIX",
            MatrixSignal => "MATRIX_SIGNAL",
            SignalSplitter => "SIGNAL_SPLITTER",
            SignalCombiner => "SIGNAL_COMBINER",
            SignalDemultiplexer => "SIGNAL_DEMULTIPLEXER",
            SignalMultiplexer => "SIGNAL_MULTIPLEXER",
            SignalTranscoder => "SIGNAL_TRANSCODER",
            ClockDomain => "CLOCK_DOMAIN",
            ControlBlock => "CONTROL_BLOCK",
        }
    }
}

/// Read access shared by every descriptor kind
pub trait AemDescriptor {
    fn descriptor_type(&self) -> DescriptorType;

    fn descriptor_index(&self) -> u16;

    /// Append the wire form; kinds without a wire format append nothing
    fn write_to(&self, buf: &mut Vec<u8>);

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_to(&mut buf);
        buf
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn put_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(STRING_LEN);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, STRING_LEN - n);
}

fn get_string(buf: &mut &[u8]) -> String {
    let raw = &buf[..STRING_LEN];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(STRING_LEN);
    let s = String::from_utf8_lossy(&raw[..end]).into_owned();
    buf.advance(STRING_LEN);
    s
}

fn get_mac(buf: &mut &[u8]) -> MacAddress {
    let mut mac = [0u8; 6];
    buf.copy_to_slice(&mut mac);
    MacAddress(mac)
}

fn check_offset(field: &'static str, found: u16, expected: usize) -> Result<(), DecodeError> {
    if usize::from(found) != expected {
        return Err(DecodeError::BadOffset { field, found, expected: expected as u16 });
    }
    Ok(())
}

fn read_array<T>(
    buf: &mut &[u8],
    count: u16,
    width: usize,
    mut read: impl FnMut(&mut &[u8]) -> T,
) -> Result<Vec<T>, DecodeError> {
    ensure_len(buf, usize::from(count) * width)?;
    Ok((0..count).map(|_| read(buf)).collect())
}

fn check_string(field: &'static str, s: &str) -> Result<(), EntityError> {
    if s.len() > STRING_LEN {
        return Err(EntityError::StringTooLong { field, len: s.len() });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ENTITY / CONFIGURATION
// ---------------------------------------------------------------------------

/// ENTITY descriptor (312 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDescriptor {
    pub entity_id: Eui64,
    pub entity_model_id: Eui64,
    pub entity_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    pub controller_capabilities: u32,
    pub available_index: u32,
    pub association_id: Eui64,
    pub entity_name: String,
    pub vendor_name_string: u16,
    pub model_name_string: u16,
    pub firmware_version: String,
    pub group_name: String,
    pub serial_number: String,
    pub configurations_count: u16,
    pub current_configuration: u16,
}

impl EntityDescriptor {
    pub const LEN: usize = 312;

    fn write_body(&self, buf: &mut Vec<u8>) {
        buf.put_u64(self.entity_id.0);
        buf.put_u64(self.entity_model_id.0);
        buf.put_u32(self.entity_capabilities);
        buf.put_u16(self.talker_stream_sources);
        buf.put_u16(self.talker_capabilities);
        buf.put_u16(self.listener_stream_sinks);
        buf.put_u16(self.listener_capabilities);
        buf.put_u32(self.controller_capabilities);
        buf.put_u32(self.available_index);
        buf.put_u64(self.association_id.0);
        put_string(buf, &self.entity_name);
        buf.put_u16(self.vendor_name_string);
        buf.put_u16(self.model_name_string);
        put_string(buf, &self.firmware_version);
        put_string(buf, &self.group_name);
        put_string(buf, &self.serial_number);
        buf.put_u16(self.configurations_count);
        buf.put_u16(self.current_configuration);
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        Ok(Self {
            entity_id: Eui64(buf.get_u64()),
            entity_model_id: Eui64(buf.get_u64()),
            entity_capabilities: buf.get_u32(),
            talker_stream_sources: buf.get_u16(),
            talker_capabilities: buf.get_u16(),
            listener_stream_sinks: buf.get_u16(),
            listener_capabilities: buf.get_u16(),
            controller_capabilities: buf.get_u32(),
            available_index: buf.get_u32(),
            association_id: Eui64(buf.get_u64()),
            entity_name: get_string(buf),
            vendor_name_string: buf.get_u16(),
            model_name_string: buf.get_u16(),
            firmware_version: get_string(buf),
            group_name: get_string(buf),
            serial_number: get_string(buf),
            configurations_count: buf.get_u16(),
            current_configuration: buf.get_u16(),
        })
    }

    pub(crate) fn validate(&self) -> Result<(), EntityError> {
        check_string("entity_name", &self.entity_name)?;
        check_string("firmware_version", &self.firmware_version)?;
        check_string("group_name", &self.group_name)?;
        check_string("serial_number", &self.serial_number)
    }
}

impl AemDescriptor for EntityDescriptor {
    fn descriptor_type(&self) -> DescriptorType {
        DescriptorType::Entity
    }

    fn descriptor_index(&self) -> u16 {
        0
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_u16(DescriptorType::Entity.as_u16());
        buf.put_u16(0);
        self.write_body(buf);
    }
}

/// One `(descriptor_type, count)` entry of a CONFIGURATION descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DescriptorCount {
    pub descriptor_type: u16,
    pub count: u16,
}

/// CONFIGURATION descriptor (74 bytes + 4 per count)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub descriptor_counts: Vec<DescriptorCount>,
}

impl ConfigurationDescriptor {
    const COUNTS_OFFSET: usize = 74;

    pub(crate) fn validate(&self) -> Result<(), EntityError> {
        check_string("object_name", &self.object_name)
    }

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.descriptor_counts.len() as u16);
        buf.put_u16(Self::COUNTS_OFFSET as u16);
        for entry in &self.descriptor_counts {
            buf.put_u16(entry.descriptor_type);
            buf.put_u16(entry.count);
        }
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::COUNTS_OFFSET - 4)?;
        let object_name = get_string(buf);
        let localized_description = buf.get_u16();
        let count = buf.get_u16();
        check_offset("descriptor_counts_offset", buf.get_u16(), Self::COUNTS_OFFSET)?;
        let descriptor_counts = read_array(buf, count, 4, |b| DescriptorCount {
            descriptor_type: b.get_u16(),
            count: b.get_u16(),
        })?;
        Ok(Self { descriptor_index: 0, object_name, localized_description, descriptor_counts })
    }
}

impl AemDescriptor for ConfigurationDescriptor {
    fn descriptor_type(&self) -> DescriptorType {
        DescriptorType::Configuration
    }

    fn descriptor_index(&self) -> u16 {
        self.descriptor_index
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_u16(DescriptorType::Configuration.as_u16());
        buf.put_u16(self.descriptor_index);
        self.write_body(buf);
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// `number_of_*` / `base_*` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Span {
    pub count: u16,
    pub base: u16,
}

/// Port and processing-block ranges shared by AUDIO_UNIT and VIDEO_UNIT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitResources {
    pub stream_input_ports: Span,
    pub stream_output_ports: Span,
    pub external_input_ports: Span,
    pub external_output_ports: Span,
    pub internal_input_ports: Span,
    pub internal_output_ports: Span,
    pub controls: Span,
    pub signal_selectors: Span,
    pub mixers: Span,
    pub matrices: Span,
    pub splitters: Span,
    pub combiners: Span,
    pub demultiplexers: Span,
    pub multiplexers: Span,
    pub transcoders: Span,
    pub control_blocks: Span,
}

impl UnitResources {
    const LEN: usize = 64;

    fn spans(&self) -> [Span; 16] {
        [
            self.stream_input_ports,
            self.stream_output_ports,
            self.external_input_ports,
            self.external_output_ports,
            self.internal_input_ports,
            self.internal_output_ports,
            self.controls,
            self.signal_selectors,
            self.mixers,
            self.matrices,
            self.splitters,
            self.combiners,
            self.demultiplexers,
            self.multiplexers,
            self.transcoders,
            self.control_blocks,
        ]
    }

    fn write(&self, buf: &mut Vec<u8>) {
        for span in self.spans() {
            buf.put_u16(span.count);
            buf.put_u16(span.base);
        }
    }

    fn read(buf: &mut &[u8]) -> Self {
        let mut next = || Span { count: buf.get_u16(), base: buf.get_u16() };
        Self {
            stream_input_ports: next(),
            stream_output_ports: next(),
            external_input_ports: next(),
            external_output_ports: next(),
            internal_input_ports: next(),
            internal_output_ports: next(),
            controls: next(),
            signal_selectors: next(),
            mixers: next(),
            matrices: next(),
            splitters: next(),
            combiners: next(),
            demultiplexers: next(),
            multiplexers: next(),
            transcoders: next(),
            control_blocks: next(),
        }
    }
}

/// AUDIO_UNIT descriptor (144 bytes + 4 per sampling rate)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioUnitDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub clock_domain_index: u16,
    #[serde(flatten)]
    pub resources: UnitResources,
    pub current_sampling_rate: u32,
    pub sampling_rates: Vec<u32>,
}

impl AudioUnitDescriptor {
    const RATES_OFFSET: usize = 144;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.clock_domain_index);
        self.resources.write(buf);
        buf.put_u32(self.current_sampling_rate);
        buf.put_u16(Self::RATES_OFFSET as u16);
        buf.put_u16(self.sampling_rates.len() as u16);
        for rate in &self.sampling_rates {
            buf.put_u32(*rate);
        }
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::RATES_OFFSET - 4)?;
        let object_name = get_string(buf);
        let localized_description = buf.get_u16();
        let clock_domain_index = buf.get_u16();
        let resources = UnitResources::read(buf);
        let current_sampling_rate = buf.get_u32();
        check_offset("sampling_rates_offset", buf.get_u16(), Self::RATES_OFFSET)?;
        let count = buf.get_u16();
        let sampling_rates = read_array(buf, count, 4, |b| b.get_u32())?;
        Ok(Self {
            descriptor_index: 0,
            object_name,
            localized_description,
            clock_domain_index,
            resources,
            current_sampling_rate,
            sampling_rates,
        })
    }
}

/// VIDEO_UNIT descriptor (136 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoUnitDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub clock_domain_index: u16,
    #[serde(flatten)]
    pub resources: UnitResources,
}

impl VideoUnitDescriptor {
    pub const LEN: usize = 72 + UnitResources::LEN;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.clock_domain_index);
        self.resources.write(buf);
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        Ok(Self {
            descriptor_index: 0,
            object_name: get_string(buf),
            localized_description: buf.get_u16(),
            clock_domain_index: buf.get_u16(),
            resources: UnitResources::read(buf),
        })
    }
}

// ---------------------------------------------------------------------------
// Streams, jacks, interfaces, clocks
// ---------------------------------------------------------------------------

/// Backup talker reference inside a stream descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkerRef {
    pub entity_id: Eui64,
    pub unique_id: u16,
}

/// STREAM_INPUT / STREAM_OUTPUT descriptor (132 bytes + 8 per format)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub clock_domain_index: u16,
    pub stream_flags: u16,
    pub current_format: u64,
    pub formats: Vec<u64>,
    pub backup_talkers: [TalkerRef; 3],
    pub backedup_talker: TalkerRef,
    pub avb_interface_index: u16,
    pub buffer_length: u32,
}

impl StreamDescriptor {
    const FORMATS_OFFSET: usize = 132;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.clock_domain_index);
        buf.put_u16(self.stream_flags);
        buf.put_u64(self.current_format);
        buf.put_u16(Self::FORMATS_OFFSET as u16);
        buf.put_u16(self.formats.len() as u16);
        for backup in self.backup_talkers.iter().chain(std::iter::once(&self.backedup_talker)) {
            buf.put_u64(backup.entity_id.0);
            buf.put_u16(backup.unique_id);
        }
        buf.put_u16(self.avb_interface_index);
        buf.put_u32(self.buffer_length);
        for format in &self.formats {
            buf.put_u64(*format);
        }
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::FORMATS_OFFSET - 4)?;
        let object_name = get_string(buf);
        let localized_description = buf.get_u16();
        let clock_domain_index = buf.get_u16();
        let stream_flags = buf.get_u16();
        let current_format = buf.get_u64();
        check_offset("formats_offset", buf.get_u16(), Self::FORMATS_OFFSET)?;
        let count = buf.get_u16();
        let mut talker = || TalkerRef { entity_id: Eui64(buf.get_u64()), unique_id: buf.get_u16() };
        let backup_talkers = [talker(), talker(), talker()];
        let backedup_talker = talker();
        let avb_interface_index = buf.get_u16();
        let buffer_length = buf.get_u32();
        let formats = read_array(buf, count, 8, |b| b.get_u64())?;
        Ok(Self {
            descriptor_index: 0,
            object_name,
            localized_description,
            clock_domain_index,
            stream_flags,
            current_format,
            formats,
            backup_talkers,
            backedup_talker,
            avb_interface_index,
            buffer_length,
        })
    }
}

/// JACK_INPUT / JACK_OUTPUT descriptor (78 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JackDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub jack_flags: u16,
    pub jack_type: u16,
    pub number_of_controls: u16,
    pub base_control: u16,
}

impl JackDescriptor {
    pub const LEN: usize = 78;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.jack_flags);
        buf.put_u16(self.jack_type);
        buf.put_u16(self.number_of_controls);
        buf.put_u16(self.base_control);
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        Ok(Self {
            descriptor_index: 0,
            object_name: get_string(buf),
            localized_description: buf.get_u16(),
            jack_flags: buf.get_u16(),
            jack_type: buf.get_u16(),
            number_of_controls: buf.get_u16(),
            base_control: buf.get_u16(),
        })
    }
}

/// AVB_INTERFACE descriptor (98 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvbInterfaceDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    /// Overwritten with the interface MAC when the entity model is built
    pub mac_address: MacAddress,
    pub interface_flags: u16,
    pub clock_identity: Eui64,
    pub priority1: u8,
    pub clock_class: u8,
    pub offset_scaled_log_variance: u16,
    pub clock_accuracy: u8,
    pub priority2: u8,
    pub domain_number: u8,
    pub log_sync_interval: u8,
    pub log_announce_interval: u8,
    pub log_pdelay_interval: u8,
    pub port_number: u16,
}

impl AvbInterfaceDescriptor {
    pub const LEN: usize = 98;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_slice(&self.mac_address.0);
        buf.put_u16(self.interface_flags);
        buf.put_u64(self.clock_identity.0);
        buf.put_u8(self.priority1);
        buf.put_u8(self.clock_class);
        buf.put_u16(self.offset_scaled_log_variance);
        buf.put_u8(self.clock_accuracy);
        buf.put_u8(self.priority2);
        buf.put_u8(self.domain_number);
        buf.put_u8(self.log_sync_interval);
        buf.put_u8(self.log_announce_interval);
        buf.put_u8(self.log_pdelay_interval);
        buf.put_u16(self.port_number);
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        Ok(Self {
            descriptor_index: 0,
            object_name: get_string(buf),
            localized_description: buf.get_u16(),
            mac_address: get_mac(buf),
            interface_flags: buf.get_u16(),
            clock_identity: Eui64(buf.get_u64()),
            priority1: buf.get_u8(),
            clock_class: buf.get_u8(),
            offset_scaled_log_variance: buf.get_u16(),
            clock_accuracy: buf.get_u8(),
            priority2: buf.get_u8(),
            domain_number: buf.get_u8(),
            log_sync_interval: buf.get_u8(),
            log_announce_interval: buf.get_u8(),
            log_pdelay_interval: buf.get_u8(),
            port_number: buf.get_u16(),
        })
    }
}

/// CLOCK_SOURCE descriptor (86 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSourceDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub clock_source_flags: u16,
    pub clock_source_type: u16,
    pub clock_source_identifier: Eui64,
    pub clock_source_location_type: u16,
    pub clock_source_location_index: u16,
}

impl ClockSourceDescriptor {
    pub const LEN: usize = 86;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.clock_source_flags);
        buf.put_u16(self.clock_source_type);
        buf.put_u64(self.clock_source_identifier.0);
        buf.put_u16(self.clock_source_location_type);
        buf.put_u16(self.clock_source_location_index);
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        Ok(Self {
            descriptor_index: 0,
            object_name: get_string(buf),
            localized_description: buf.get_u16(),
            clock_source_flags: buf.get_u16(),
            clock_source_type: buf.get_u16(),
            clock_source_identifier: Eui64(buf.get_u64()),
            clock_source_location_type: buf.get_u16(),
            clock_source_location_index: buf.get_u16(),
        })
    }
}

/// CLOCK_DOMAIN descriptor (76 bytes + 2 per clock source)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockDomainDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub clock_source_index: u16,
    pub clock_sources: Vec<u16>,
}

impl ClockDomainDescriptor {
    const SOURCES_OFFSET: usize = 76;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.clock_source_index);
        buf.put_u16(Self::SOURCES_OFFSET as u16);
        buf.put_u16(self.clock_sources.len() as u16);
        for source in &self.clock_sources {
            buf.put_u16(*source);
        }
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::SOURCES_OFFSET - 4)?;
        let object_name = get_string(buf);
        let localized_description = buf.get_u16();
        let clock_source_index = buf.get_u16();
        check_offset("clock_sources_offset", buf.get_u16(), Self::SOURCES_OFFSET)?;
        let count = buf.get_u16();
        let clock_sources = read_array(buf, count, 2, |b| b.get_u16())?;
        Ok(Self { descriptor_index: 0, object_name, localized_description, clock_source_index, clock_sources })
    }
}

// ---------------------------------------------------------------------------
// Locale and strings
// ---------------------------------------------------------------------------

/// LOCALE descriptor (72 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleDescriptor {
    pub descriptor_index: u16,
    pub locale_identifier: String,
    /// Filled from the configuration's STRINGS count when left at zero
    pub number_of_strings: u16,
    pub base_strings: u16,
}

impl LocaleDescriptor {
    pub const LEN: usize = 72;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.locale_identifier);
        buf.put_u16(self.number_of_strings);
        buf.put_u16(self.base_strings);
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        Ok(Self {
            descriptor_index: 0,
            locale_identifier: get_string(buf),
            number_of_strings: buf.get_u16(),
            base_strings: buf.get_u16(),
        })
    }
}

/// STRINGS descriptor (452 bytes); missing entries encode as empty strings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StringsDescriptor {
    pub descriptor_index: u16,
    pub strings: Vec<String>,
}

impl StringsDescriptor {
    pub const LEN: usize = 4 + STRINGS_PER_DESCRIPTOR * STRING_LEN;

    fn write_body(&self, buf: &mut Vec<u8>) {
        for slot in 0..STRINGS_PER_DESCRIPTOR {
            put_string(buf, self.strings.get(slot).map(String::as_str).unwrap_or(""));
        }
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        let strings = (0..STRINGS_PER_DESCRIPTOR).map(|_| get_string(buf)).collect();
        Ok(Self { descriptor_index: 0, strings })
    }
}

// ---------------------------------------------------------------------------
// Ports, clusters, maps
// ---------------------------------------------------------------------------

/// STREAM_PORT_INPUT / STREAM_PORT_OUTPUT descriptor (20 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamPortDescriptor {
    pub descriptor_index: u16,
    pub clock_domain_index: u16,
    pub port_flags: u16,
    pub number_of_controls: u16,
    pub base_control: u16,
    pub number_of_clusters: u16,
    pub base_cluster: u16,
    pub number_of_maps: u16,
    pub base_map: u16,
}

impl StreamPortDescriptor {
    pub const LEN: usize = 20;

    fn write_body(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.clock_domain_index);
        buf.put_u16(self.port_flags);
        buf.put_u16(self.number_of_controls);
        buf.put_u16(self.base_control);
        buf.put_u16(self.number_of_clusters);
        buf.put_u16(self.base_cluster);
        buf.put_u16(self.number_of_maps);
        buf.put_u16(self.base_map);
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        Ok(Self {
            descriptor_index: 0,
            clock_domain_index: buf.get_u16(),
            port_flags: buf.get_u16(),
            number_of_controls: buf.get_u16(),
            base_control: buf.get_u16(),
            number_of_clusters: buf.get_u16(),
            base_cluster: buf.get_u16(),
            number_of_maps: buf.get_u16(),
            base_map: buf.get_u16(),
        })
    }
}

/// AUDIO_CLUSTER descriptor (87 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioClusterDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub signal_type: u16,
    pub signal_index: u16,
    pub signal_output: u16,
    pub path_latency: u32,
    pub block_latency: u32,
    pub channel_count: u16,
    pub format: u8,
}

impl AudioClusterDescriptor {
    pub const LEN: usize = 87;

    fn write_body(&self, buf: &mut Vec<u8>) {
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.signal_type);
        buf.put_u16(self.signal_index);
        buf.put_u16(self.signal_output);
        buf.put_u32(self.path_latency);
        buf.put_u32(self.block_latency);
        buf.put_u16(self.channel_count);
        buf.put_u8(self.format);
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::LEN - 4)?;
        Ok(Self {
            descriptor_index: 0,
            object_name: get_string(buf),
            localized_description: buf.get_u16(),
            signal_type: buf.get_u16(),
            signal_index: buf.get_u16(),
            signal_output: buf.get_u16(),
            path_latency: buf.get_u32(),
            block_latency: buf.get_u32(),
            channel_count: buf.get_u16(),
            format: buf.get_u8(),
        })
    }
}

/// VIDEO_CLUSTER descriptor (121 bytes + five trailing arrays)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoClusterDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub signal_type: u16,
    pub signal_index: u16,
    pub signal_output: u16,
    pub path_latency: u32,
    pub block_latency: u32,
    pub format: u8,
    pub current_format_specific: u32,
    pub supported_format_specifics: Vec<u32>,
    pub current_sampling_rate: u32,
    pub supported_sampling_rates: Vec<u32>,
    pub current_aspect_ratio: u16,
    pub supported_aspect_ratios: Vec<u16>,
    pub current_size: u32,
    pub supported_sizes: Vec<u32>,
    pub current_color_space: u16,
    pub supported_color_spaces: Vec<u16>,
}

impl VideoClusterDescriptor {
    const ARRAYS_OFFSET: usize = 121;

    /// Offsets of the five trailing arrays, in wire order
    fn array_offsets(&self) -> [usize; 5] {
        let format_specifics = Self::ARRAYS_OFFSET;
        let sampling_rates = format_specifics + 4 * self.supported_format_specifics.len();
        let aspect_ratios = sampling_rates + 4 * self.supported_sampling_rates.len();
        let sizes = aspect_ratios + 2 * self.supported_aspect_ratios.len();
        let color_spaces = sizes + 4 * self.supported_sizes.len();
        [format_specifics, sampling_rates, aspect_ratios, sizes, color_spaces]
    }

    fn write_body(&self, buf: &mut Vec<u8>) {
        let offsets = self.array_offsets();
        put_string(buf, &self.object_name);
        buf.put_u16(self.localized_description);
        buf.put_u16(self.signal_type);
        buf.put_u16(self.signal_index);
        buf.put_u16(self.signal_output);
        buf.put_u32(self.path_latency);
        buf.put_u32(self.block_latency);
        buf.put_u8(self.format);
        buf.put_u32(self.current_format_specific);
        buf.put_u16(offsets[0] as u16);
        buf.put_u16(self.supported_format_specifics.len() as u16);
        buf.put_u32(self.current_sampling_rate);
        buf.put_u16(offsets[1] as u16);
        buf.put_u16(self.supported_sampling_rates.len() as u16);
        buf.put_u16(self.current_aspect_ratio);
        buf.put_u16(offsets[2] as u16);
        buf.put_u16(self.supported_aspect_ratios.len() as u16);
        buf.put_u32(self.current_size);
        buf.put_u16(offsets[3] as u16);
        buf.put_u16(self.supported_sizes.len() as u16);
        buf.put_u16(self.current_color_space);
        buf.put_u16(offsets[4] as u16);
        buf.put_u16(self.supported_color_spaces.len() as u16);
        self.supported_format_specifics.iter().for_each(|v| buf.put_u32(*v));
        self.supported_sampling_rates.iter().for_each(|v| buf.put_u32(*v));
        self.supported_aspect_ratios.iter().for_each(|v| buf.put_u16(*v));
        self.supported_sizes.iter().for_each(|v| buf.put_u32(*v));
        self.supported_color_spaces.iter().for_each(|v| buf.put_u16(*v));
    }

    fn read_body(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::ARRAYS_OFFSET - 4)?;
        let mut d = Self {
            object_name: get_string(buf),
            localized_description: buf.get_u16(),
            signal_type: buf.get_u16(),
            signal_index: buf.get_u16(),
            signal_output: buf.get_u16(),
            path_latency: buf.get_u32(),
            block_latency: buf.get_u32(),
            format: buf.get_u8(),
            current_format_specific: buf.get_u32(),
            ..Default::default()
        };
        let mut found = [0u16; 5];
        let mut counts = [0u16; 5];
        found[0] = buf.get_u16();
        counts[0] = buf.get_u16();
        d.current_sampling_rate = buf.get_u32();
        found[1] = buf.get_u16();
        counts[1] = buf.get_u16();
        d.current_aspect_ratio = buf.get_u16();
        found[2] = buf.get_u16();
        counts[2] = buf.get_u16();
        d.current_size = buf.get_u32();
        found[3] = buf.get_u16();
        counts[3] = buf.get_u16();
        d.current_color_space = buf.get_u16();
        found[4] = buf.get_u16();
        counts[4] = buf.get_u16();

        d.supported_format_specifics = read_array(buf, counts[0], 4, |b| b.get_u32())?;
        d.supported_sampling_rates = read_array(buf, counts[1], 4, |b| b.get_u32())?;
        d.supported_aspect_ratios = read_array(buf, counts[2], 2, |b| b.get_u16())?;
        d.supported_sizes = read_array(buf, counts[3], 4, |b| b.get_u32())?;
        d.supported_color_spaces = read_array(buf, counts[4], 2, |b| b.get_u16())?;

        const FIELDS: [&str; 5] = [
            "format_specifics_offset",
            "sampling_rates_offset",
            "aspect_ratios_offset",
            "sizes_offset",
            "color_spaces_offset",
        ];
        for ((field, found), expected) in FIELDS.iter().zip(found).zip(d.array_offsets()) {
            check_offset(*field, found, expected)?;
        }
        Ok(d)
    }
}

/// One AUDIO_MAP entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMapping {
    pub stream_index: u16,
    pub stream_channel: u16,
    pub cluster_offset: u16,
    pub cluster_channel: u16,
}

/// AUDIO_MAP descriptor (8 bytes + 8 per mapping)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMapDescriptor {
    pub descriptor_index: u16,
    pub mappings: Vec<AudioMapping>,
}

/// One VIDEO_MAP entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMapping {
    pub stream_index: u16,
    pub program_stream: u16,
    pub elementary_stream: u16,
    pub cluster_offset: u16,
}

/// VIDEO_MAP descriptor (8 bytes + 8 per mapping)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMapDescriptor {
    pub descriptor_index: u16,
    pub mappings: Vec<VideoMapping>,
}

const MAPPINGS_OFFSET: usize = 8;

fn write_mappings(buf: &mut Vec<u8>, entries: impl ExactSizeIterator<Item = [u16; 4]>) {
    buf.put_u16(MAPPINGS_OFFSET as u16);
    buf.put_u16(entries.len() as u16);
    for entry in entries {
        entry.iter().for_each(|v| buf.put_u16(*v));
    }
}

fn read_mappings(buf: &mut &[u8]) -> Result<Vec<[u16; 4]>, DecodeError> {
    ensure_len(buf, MAPPINGS_OFFSET - 4)?;
    check_offset("mappings_offset", buf.get_u16(), MAPPINGS_OFFSET)?;
    let count = buf.get_u16();
    read_array(buf, count, 8, |b| [b.get_u16(), b.get_u16(), b.get_u16(), b.get_u16()])
}

// ---------------------------------------------------------------------------
// Tagged descriptor
// ---------------------------------------------------------------------------

/// Any descriptor that lives inside a configuration
///
/// `Entity` and `Configuration` exist so wire data can be decoded uniformly;
/// the entity model keeps those two outside the per-configuration list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Descriptor {
    Entity(EntityDescriptor),
    Configuration(ConfigurationDescriptor),
    AudioUnit(AudioUnitDescriptor),
    VideoUnit(VideoUnitDescriptor),
    StreamInput(StreamDescriptor),
    StreamOutput(StreamDescriptor),
    JackInput(JackDescriptor),
    JackOutput(JackDescriptor),
    AvbInterface(AvbInterfaceDescriptor),
    ClockSource(ClockSourceDescriptor),
    Locale(LocaleDescriptor),
    Strings(StringsDescriptor),
    StreamPortInput(StreamPortDescriptor),
    StreamPortOutput(StreamPortDescriptor),
    AudioCluster(AudioClusterDescriptor),
    VideoCluster(VideoClusterDescriptor),
    AudioMap(AudioMapDescriptor),
    VideoMap(VideoMapDescriptor),
    ClockDomain(ClockDomainDescriptor),
    /// A kind listed by the device but not serialized by this stack
    Unsupported {
        kind: DescriptorType,
        #[serde(default)]
        descriptor_index: u16,
    },
}

impl Descriptor {
    pub(crate) fn set_descriptor_index(&mut self, index: u16) {
        match self {
            Descriptor::Entity(_) => {}
            Descriptor::Configuration(d) => d.descriptor_index = index,
            Descriptor::AudioUnit(d) => d.descriptor_index = index,
            Descriptor::VideoUnit(d) => d.descriptor_index = index,
            Descriptor::StreamInput(d) | Descriptor::StreamOutput(d) => d.descriptor_index = index,
            Descriptor::JackInput(d) | Descriptor::JackOutput(d) => d.descriptor_index = index,
            Descriptor::AvbInterface(d) => d.descriptor_index = index,
            Descriptor::ClockSource(d) => d.descriptor_index = index,
            Descriptor::Locale(d) => d.descriptor_index = index,
            Descriptor::Strings(d) => d.descriptor_index = index,
            Descriptor::StreamPortInput(d) | Descriptor::StreamPortOutput(d) => d.descriptor_index = index,
            Descriptor::AudioCluster(d) => d.descriptor_index = index,
            Descriptor::VideoCluster(d) => d.descriptor_index = index,
            Descriptor::AudioMap(d) => d.descriptor_index = index,
            Descriptor::VideoMap(d) => d.descriptor_index = index,
            Descriptor::ClockDomain(d) => d.descriptor_index = index,
            Descriptor::Unsupported { descriptor_index, .. } => *descriptor_index = index,
        }
    }

    /// Check string widths and array limits before the descriptor is served
    pub(crate) fn validate(&self) -> Result<(), EntityError> {
        match self {
            Descriptor::Entity(d) => d.validate(),
            Descriptor::Configuration(d) => d.validate(),
            Descriptor::AudioUnit(d) => check_string("object_name", &d.object_name),
            Descriptor::VideoUnit(d) => check_string("object_name", &d.object_name),
            Descriptor::StreamInput(d) | Descriptor::StreamOutput(d) => check_string("object_name", &d.object_name),
            Descriptor::JackInput(d) | Descriptor::JackOutput(d) => check_string("object_name", &d.object_name),
            Descriptor::AvbInterface(d) => check_string("object_name", &d.object_name),
            Descriptor::ClockSource(d) => check_string("object_name", &d.object_name),
            Descriptor::Locale(d) => check_string("locale_identifier", &d.locale_identifier),
            Descriptor::Strings(d) => {
                if d.strings.len() > STRINGS_PER_DESCRIPTOR {
                    return Err(EntityError::ArrayTooLong {
                        field: "strings",
                        len: d.strings.len(),
                        max: STRINGS_PER_DESCRIPTOR,
                    });
                }
                d.strings.iter().try_for_each(|s| check_string("strings", s))
            }
            Descriptor::AudioCluster(d) => check_string("object_name", &d.object_name),
            Descriptor::VideoCluster(d) => check_string("object_name", &d.object_name),
            Descriptor::ClockDomain(d) => check_string("object_name", &d.object_name),
            Descriptor::StreamPortInput(_)
            | Descriptor::StreamPortOutput(_)
            | Descriptor::AudioMap(_)
            | Descriptor::VideoMap(_)
            | Descriptor::Unsupported { .. } => Ok(()),
        }?;

        let len = self.to_bytes().len();
        if len > MAX_DESCRIPTOR_LEN {
            return Err(EntityError::DescriptorTooLarge {
                kind: self.descriptor_type().name(),
                index: self.descriptor_index(),
                len,
                max: MAX_DESCRIPTOR_LEN,
            });
        }
        Ok(())
    }

    /// Decode one descriptor from the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(bytes, 4)?;
        let mut buf = bytes;
        let raw_type = buf.get_u16();
        let index = buf.get_u16();
        let kind = DescriptorType::from_u16(raw_type).ok_or(DecodeError::UnknownDescriptorType(raw_type))?;
        let buf = &mut buf;

        let mut descriptor = match kind {
            DescriptorType::Entity => Descriptor::Entity(EntityDescriptor::read_body(buf)?),
            DescriptorType::Configuration => Descriptor::Configuration(ConfigurationDescriptor::read_body(buf)?),
            DescriptorType::AudioUnit => Descriptor::AudioUnit(AudioUnitDescriptor::read_body(buf)?),
            DescriptorType::VideoUnit => Descriptor::VideoUnit(VideoUnitDescriptor::read_body(buf)?),
            DescriptorType::StreamInput => Descriptor::StreamInput(StreamDescriptor::read_body(buf)?),
            DescriptorType::StreamOutput => Descriptor::StreamOutput(StreamDescriptor::read_body(buf)?),
            DescriptorType::JackInput => Descriptor::JackInput(JackDescriptor::read_body(buf)?),
            DescriptorType::JackOutput => Descriptor::JackOutput(JackDescriptor::read_body(buf)?),
            DescriptorType::AvbInterface => Descriptor::AvbInterface(AvbInterfaceDescriptor::read_body(buf)?),
            DescriptorType::ClockSource => Descriptor::ClockSource(ClockSourceDescriptor::read_body(buf)?),
            DescriptorType::Locale => Descriptor::Locale(LocaleDescriptor::read_body(buf)?),
            DescriptorType::Strings => Descriptor::Strings(StringsDescriptor::read_body(buf)?),
            DescriptorType::StreamPortInput => Descriptor::StreamPortInput(StreamPortDescriptor::read_body(buf)?),
            DescriptorType::StreamPortOutput => Descriptor::StreamPortOutput(StreamPortDescriptor::read_body(buf)?),
            DescriptorType::AudioCluster => Descriptor::AudioCluster(AudioClusterDescriptor::read_body(buf)?),
            DescriptorType::VideoCluster => Descriptor::VideoCluster(VideoClusterDescriptor::read_body(buf)?),
            DescriptorType::AudioMap => Descriptor::AudioMap(AudioMapDescriptor {
                descriptor_index: 0,
                mappings: read_mappings(buf)?
                    .into_iter()
                    .map(|[stream_index, stream_channel, cluster_offset, cluster_channel]| AudioMapping {
                        stream_index,
                        stream_channel,
                        cluster_offset,
                        cluster_channel,
                    })
                    .collect(),
            }),
            DescriptorType::VideoMap => Descriptor::VideoMap(VideoMapDescriptor {
                descriptor_index: 0,
                mappings: read_mappings(buf)?
                    .into_iter()
                    .map(|[stream_index, program_stream, elementary_stream, cluster_offset]| VideoMapping {
                        stream_index,
                        program_stream,
                        elementary_stream,
                        cluster_offset,
                    })
                    .collect(),
            }),
            DescriptorType::ClockDomain => Descriptor::ClockDomain(ClockDomainDescriptor::read_body(buf)?),
            other => return Err(DecodeError::UnsupportedDescriptor(other.as_u16())),
        };
        descriptor.set_descriptor_index(index);
        Ok(descriptor)
    }
}

impl AemDescriptor for Descriptor {
    fn descriptor_type(&self) -> DescriptorType {
        match self {
            Descriptor::Entity(_) => DescriptorType::Entity,
            Descriptor::Configuration(_) => DescriptorType::Configuration,
            Descriptor::AudioUnit(_) => DescriptorType::AudioUnit,
            Descriptor::VideoUnit(_) => DescriptorType::VideoUnit,
            Descriptor::StreamInput(_) => DescriptorType::StreamInput,
            Descriptor::StreamOutput(_) => DescriptorType::StreamOutput,
            Descriptor::JackInput(_) => DescriptorType::JackInput,
            Descriptor::JackOutput(_) => DescriptorType::JackOutput,
            Descriptor::AvbInterface(_) => DescriptorType::AvbInterface,
            Descriptor::ClockSource(_) => DescriptorType::ClockSource,
            Descriptor::Locale(_) => DescriptorType::Locale,
            Descriptor::Strings(_) => DescriptorType::Strings,
            Descriptor::StreamPortInput(_) => DescriptorType::StreamPortInput,
            Descriptor::StreamPortOutput(_) => DescriptorType::StreamPortOutput,
            Descriptor::AudioCluster(_) => DescriptorType::AudioCluster,
            Descriptor::VideoCluster(_) => DescriptorType::VideoCluster,
            Descriptor::AudioMap(_) => DescriptorType::AudioMap,
            Descriptor::VideoMap(_) => DescriptorType::VideoMap,
            Descriptor::ClockDomain(_) => DescriptorType::ClockDomain,
            Descriptor::Unsupported { kind, .. } => *kind,
        }
    }

    fn descriptor_index(&self) -> u16 {
        match self {
            Descriptor::Entity(_) => 0,
            Descriptor::Configuration(d) => d.descriptor_index,
            Descriptor::AudioUnit(d) => d.descriptor_index,
            Descriptor::VideoUnit(d) => d.descriptor_index,
            Descriptor::StreamInput(d) | Descriptor::StreamOutput(d) => d.descriptor_index,
            Descriptor::JackInput(d) | Descriptor::JackOutput(d) => d.descriptor_index,
            Descriptor::AvbInterface(d) => d.descriptor_index,
            Descriptor::ClockSource(d) => d.descriptor_index,
            Descriptor::Locale(d) => d.descriptor_index,
            Descriptor::Strings(d) => d.descriptor_index,
            Descriptor::StreamPortInput(d) | Descriptor::StreamPortOutput(d) => d.descriptor_index,
            Descriptor::AudioCluster(d) => d.descriptor_index,
            Descriptor::VideoCluster(d) => d.descriptor_index,
            Descriptor::AudioMap(d) => d.descriptor_index,
            Descriptor::VideoMap(d) => d.descriptor_index,
            Descriptor::ClockDomain(d) => d.descriptor_index,
            Descriptor::Unsupported { descriptor_index, .. } => *descriptor_index,
        }
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        if let Descriptor::Unsupported { kind, .. } = self {
            tracing::debug!("{} descriptor has no wire format, not serialized", kind.name());
            return;
        }
        buf.put_u16(self.descriptor_type().as_u16());
        buf.put_u16(self.descriptor_index());
        match self {
            Descriptor::Entity(d) => d.write_body(buf),
            Descriptor::Configuration(d) => d.write_body(buf),
            Descriptor::AudioUnit(d) => d.write_body(buf),
            Descriptor::VideoUnit(d) => d.write_body(buf),
            Descriptor::StreamInput(d) | Descriptor::StreamOutput(d) => d.write_body(buf),
            Descriptor::JackInput(d) | Descriptor::JackOutput(d) => d.write_body(buf),
            Descriptor::AvbInterface(d) => d.write_body(buf),
            Descriptor::ClockSource(d) => d.write_body(buf),
            Descriptor::Locale(d) => d.write_body(buf),
            Descriptor::Strings(d) => d.write_body(buf),
            Descriptor::StreamPortInput(d) | Descriptor::StreamPortOutput(d) => d.write_body(buf),
            Descriptor::AudioCluster(d) => d.write_body(buf),
            Descriptor::VideoCluster(d) => d.write_body(buf),
            Descriptor::AudioMap(d) => write_mappings(
                buf,
                d.mappings
                    .iter()
                    .map(|m| [m.stream_index, m.stream_channel, m.cluster_offset, m.cluster_channel]),
            ),
            Descriptor::VideoMap(d) => write_mappings(
                buf,
                d.mappings
                    .iter()
                    .map(|m| [m.stream_index, m.program_stream, m.elementary_stream, m.cluster_offset]),
            ),
            Descriptor::ClockDomain(d) => d.write_body(buf),
            Descriptor::Unsupported { .. } => {}
        }
    }
}
