//! End-to-end tests driving the monitor thread over the in-memory transport

use std::sync::Arc;
use std::time::{Duration, Instant};

use avdecc_endpoint::entity::descriptor::{AvbInterfaceDescriptor, Descriptor, StreamDescriptor};
use avdecc_endpoint::entity::ConfigurationTree;
use avdecc_endpoint::entity::EntityDescriptor;
use avdecc_endpoint::protocol::aecpdu::encode_aem_command;
use avdecc_endpoint::protocol::{
    peek_subtype, AcmpMessageType, AcmpStatus, Acmpdu, AdpMessageType, Adpdu, AemCommandType, Subtype,
};
use avdecc_endpoint::transport::{memory_pair, Frame, MemoryPeer};
use avdecc_endpoint::{Avdecc, DescriptorTree, EngineOptions, Eui64, MacAddress, Role};

const MAC: MacAddress = MacAddress([0x00, 0x1B, 0x21, 0x0A, 0x0B, 0x0C]);
const CONTROLLER: MacAddress = MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
const CONTROLLER_ID: Eui64 = Eui64(0x0200_00FF_FE00_0001);
const REMOTE_ID: Eui64 = Eui64(0x0011_22FF_FE33_4455);
const WAIT: Duration = Duration::from_secs(2);

fn tree() -> DescriptorTree {
    DescriptorTree {
        entity: EntityDescriptor {
            entity_model_id: Eui64(0x0011_2233_4455_6677),
            entity_name: "integration".into(),
            ..Default::default()
        },
        configurations: vec![ConfigurationTree {
            object_name: "Default".into(),
            localized_description: 0xFFFF,
            descriptors: vec![
                Descriptor::StreamInput(StreamDescriptor { object_name: "In".into(), ..Default::default() }),
                Descriptor::StreamOutput(StreamDescriptor { object_name: "Out".into(), ..Default::default() }),
                Descriptor::AvbInterface(AvbInterfaceDescriptor::default()),
            ],
        }],
    }
}

fn start(role: Role) -> (Avdecc, MemoryPeer) {
    let (transport, peer) = memory_pair(MAC);
    let options = EngineOptions {
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let avdecc = Avdecc::start(&tree(), Arc::new(transport), role, options).unwrap();
    (avdecc, peer)
}

/// Next frame of `subtype` sent by the engine, skipping everything else
fn next_of(peer: &MemoryPeer, subtype: Subtype) -> Option<Frame> {
    let deadline = Instant::now() + WAIT;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        let frame = peer.recv_sent(remaining)?;
        if peek_subtype(&frame.payload).ok() == Some(subtype) {
            return Some(frame);
        }
    }
    None
}

fn next_acmp(peer: &MemoryPeer) -> Option<Acmpdu> {
    next_of(peer, Subtype::Acmp).map(|frame| Acmpdu::decode(&frame.payload).unwrap())
}

#[test]
fn test_talker_connect_end_to_end() {
    let (avdecc, peer) = start(Role::Talker);
    let stream_id = Eui64(0x0102_0304_0506_0001);
    let dest_mac = MacAddress::from_u64(0x91e0_f000_0e80);
    avdecc.set_talker_stream_info(0, 0, stream_id, dest_mac, 2).unwrap();
    avdecc.acmp_start();

    let mut command = Acmpdu::new(AcmpMessageType::ConnectTxCommand);
    command.controller_entity_id = CONTROLLER_ID;
    command.talker_entity_id = avdecc.entity_id();
    command.listener_entity_id = REMOTE_ID;
    command.sequence_id = 9;
    peer.inject(CONTROLLER, MAC, command.encode());

    let response = next_acmp(&peer).unwrap();
    assert_eq!(response.message_type, AcmpMessageType::ConnectTxResponse);
    assert_eq!(response.status, AcmpStatus::SUCCESS);
    assert_eq!(response.sequence_id, 9);
    assert_eq!(response.stream_id, stream_id);
    assert_eq!(response.stream_dest_mac, dest_mac);
    assert_eq!(response.stream_vlan_id, 2);
    assert_eq!(response.connection_count, 1);
    assert_eq!(avdecc.get_connection_count(0, 0).unwrap(), 1);

    avdecc.terminate();
}

#[test]
fn test_listener_connect_through_talker() {
    let (avdecc, peer) = start(Role::Listener);
    avdecc.acmp_start();

    let mut command = Acmpdu::new(AcmpMessageType::ConnectRxCommand);
    command.controller_entity_id = CONTROLLER_ID;
    command.talker_entity_id = REMOTE_ID;
    command.listener_entity_id = avdecc.entity_id();
    command.sequence_id = 77;
    peer.inject(CONTROLLER, MAC, command.encode());

    let forwarded = next_acmp(&peer).unwrap();
    assert_eq!(forwarded.message_type, AcmpMessageType::ConnectTxCommand);
    assert_eq!(forwarded.talker_entity_id, REMOTE_ID);

    let mut talker_response = forwarded.to_response(AcmpStatus::SUCCESS);
    talker_response.stream_id = Eui64(0x0011_2233_4455_0000);
    talker_response.stream_dest_mac = MacAddress::from_u64(0x91e0_f000_0e81);
    talker_response.stream_vlan_id = 2;
    talker_response.connection_count = 1;
    peer.inject(MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]), MAC, talker_response.encode());

    let reply = next_acmp(&peer).unwrap();
    assert_eq!(reply.message_type, AcmpMessageType::ConnectRxResponse);
    assert_eq!(reply.status, AcmpStatus::SUCCESS);
    assert_eq!(reply.sequence_id, 77);

    assert!(avdecc.get_connected_from_listener_stream_info(0, 0).unwrap());
    assert_eq!(
        avdecc.get_stream_id_from_listener_stream_info(0, 0).unwrap(),
        Eui64(0x0011_2233_4455_0000)
    );

    avdecc.terminate();
}

#[test]
fn test_acmp_ignored_before_start() {
    let (avdecc, peer) = start(Role::Talker);

    let mut command = Acmpdu::new(AcmpMessageType::ConnectTxCommand);
    command.talker_entity_id = avdecc.entity_id();
    command.listener_entity_id = REMOTE_ID;
    peer.inject(CONTROLLER, MAC, command.encode());

    std::thread::sleep(Duration::from_millis(200));
    let acmp = peer
        .drain_sent()
        .into_iter()
        .filter(|f| peek_subtype(&f.payload).ok() == Some(Subtype::Acmp))
        .count();
    assert_eq!(acmp, 0);
    assert_eq!(avdecc.get_connection_count(0, 0).unwrap(), 0);

    avdecc.terminate();
}

#[test]
fn test_aecp_answered_without_acmp() {
    let (avdecc, peer) = start(Role::Both);

    let command = encode_aem_command(avdecc.entity_id(), CONTROLLER_ID, 3, AemCommandType::ENTITY_AVAILABLE, &[]);
    peer.inject(CONTROLLER, MAC, command);

    let response = next_of(&peer, Subtype::Aecp).unwrap();
    assert_eq!(response.dest, CONTROLLER);
    assert_eq!(&response.payload[20..22], &3u16.to_be_bytes());

    avdecc.terminate();
}

#[test]
fn test_advertise_then_depart() {
    let (avdecc, peer) = start(Role::Both);
    let entity_id = avdecc.entity_id();
    assert_eq!(entity_id, Eui64::from_mac(MAC));

    let first = next_of(&peer, Subtype::Adp).unwrap();
    let available = Adpdu::decode(&first.payload).unwrap();
    assert_eq!(available.message_type, AdpMessageType::EntityAvailable);
    assert_eq!(available.talker_stream_sources, 1);
    assert_eq!(available.listener_stream_sinks, 1);

    avdecc.terminate();
    let departing = peer
        .drain_sent()
        .into_iter()
        .filter_map(|f| Adpdu::decode(&f.payload).ok())
        .last()
        .unwrap();
    assert_eq!(departing.message_type, AdpMessageType::EntityDeparting);
    assert_eq!(departing.entity_id, entity_id);
}

#[test]
fn test_getters_reject_unknown_streams() {
    let (avdecc, _peer) = start(Role::Both);

    assert_eq!(avdecc.get_current_configuration(), 0);
    assert!(avdecc.get_connection_count(0, 1).is_err());
    assert!(avdecc.get_connected_from_listener_stream_info(0, 1).is_err());
    assert!(avdecc.get_stream_id_from_listener_stream_info(2, 0).is_err());
    assert!(avdecc
        .set_talker_stream_info(0, 4, Eui64::ZERO, MacAddress::ZERO, 0)
        .is_err());

    avdecc.terminate();
}
