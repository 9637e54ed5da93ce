//! Benchmark: descriptor serialization and parsing, and a full READ_DESCRIPTOR
//! exchange through the AECP responder over the in-memory transport.

use avdecc_endpoint::aecp::AecpResponder;
use avdecc_endpoint::entity::descriptor::{
    AemDescriptor, AudioUnitDescriptor, AvbInterfaceDescriptor, Descriptor, DescriptorType, StreamDescriptor,
};
use avdecc_endpoint::entity::{ConfigurationTree, EntityDescriptor};
use avdecc_endpoint::protocol::aecpdu::{encode_aem_command, read_descriptor_payload};
use avdecc_endpoint::protocol::AemCommandType;
use avdecc_endpoint::transport::memory_pair;
use avdecc_endpoint::{DescriptorTree, EntityModel, Eui64, MacAddress};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const MAC: MacAddress = MacAddress([0x00, 0x1B, 0x21, 0x01, 0x02, 0x03]);

fn stream_output() -> Descriptor {
    Descriptor::StreamOutput(StreamDescriptor {
        object_name: "Out 0".into(),
        current_format: 0x00A0_0202_4000_0200,
        formats: (0..32).map(|i| 0x00A0_0202_4000_0200 + i).collect(),
        ..Default::default()
    })
}

fn tree() -> DescriptorTree {
    DescriptorTree {
        entity: EntityDescriptor {
            entity_name: "bench".into(),
            ..Default::default()
        },
        configurations: vec![ConfigurationTree {
            object_name: "Default".into(),
            localized_description: 0xFFFF,
            descriptors: vec![
                Descriptor::AudioUnit(AudioUnitDescriptor {
                    current_sampling_rate: 48_000,
                    sampling_rates: vec![44_100, 48_000, 96_000],
                    ..Default::default()
                }),
                stream_output(),
                Descriptor::AvbInterface(AvbInterfaceDescriptor::default()),
            ],
        }],
    }
}

fn bench_descriptors(c: &mut Criterion) {
    let descriptor = stream_output();
    let bytes = descriptor.to_bytes();

    c.bench_function("stream_output_to_bytes", |b| b.iter(|| black_box(&descriptor).to_bytes()));
    c.bench_function("stream_output_parse", |b| b.iter(|| Descriptor::parse(black_box(&bytes))));
}

fn bench_read_descriptor(c: &mut Criterion) {
    let model = match EntityModel::build(&tree(), MAC) {
        Ok(model) => model,
        Err(e) => panic!("bench tree rejected: {}", e),
    };
    let (transport, peer) = memory_pair(MAC);
    let mut responder = AecpResponder::new();
    let command = encode_aem_command(
        model.entity_id(),
        Eui64(0x0200_00FF_FE00_0001),
        1,
        AemCommandType::READ_DESCRIPTOR,
        &read_descriptor_payload(0, DescriptorType::StreamOutput.as_u16(), 0),
    );

    c.bench_function("read_descriptor_exchange", |b| {
        b.iter(|| {
            let _ = responder.handle(&model, MAC, black_box(&command), &transport);
            black_box(peer.drain_sent())
        })
    });
}

criterion_group!(benches, bench_descriptors, bench_read_descriptor);
criterion_main!(benches);
