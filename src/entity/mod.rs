//! Entity model
//!
//! The in-memory mirror of what the device exposes over AEM: one ENTITY
//! descriptor, a list of configurations with their descriptors, and the
//! per-stream connection tables the ACMP state machines mutate.
//!
//! A model is only ever handed out fully built; every validation failure in
//! [`EntityModel::build`] returns before anything is exposed.

pub mod descriptor;
pub mod stream_info;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EntityError;
use crate::protocol::{Eui64, MacAddress};

pub use descriptor::{
    AemDescriptor, ConfigurationDescriptor, Descriptor, DescriptorCount, DescriptorType, EntityDescriptor,
};
pub use stream_info::{ListenerPair, ListenerStreamInfo, TalkerStreamInfo};

/// Descriptor tree as supplied by the device description document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DescriptorTree {
    pub entity: EntityDescriptor,
    pub configurations: Vec<ConfigurationTree>,
}

/// One configuration of a [`DescriptorTree`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationTree {
    pub object_name: String,
    pub localized_description: u16,
    pub descriptors: Vec<Descriptor>,
}

/// One selectable bundle of descriptors plus its connection tables
#[derive(Debug, Clone)]
pub struct Configuration {
    descriptor: ConfigurationDescriptor,
    descriptors: Vec<Descriptor>,
    listener_stream_infos: Vec<ListenerStreamInfo>,
    talker_stream_infos: Vec<TalkerStreamInfo>,
}

impl Configuration {
    pub fn descriptor(&self) -> &ConfigurationDescriptor {
        &self.descriptor
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Number of descriptors of `kind` in this configuration
    pub fn count_of(&self, kind: DescriptorType) -> u16 {
        self.descriptors.iter().filter(|d| d.descriptor_type() == kind).count() as u16
    }

    pub fn listener_stream_infos(&self) -> &[ListenerStreamInfo] {
        &self.listener_stream_infos
    }

    pub fn talker_stream_infos(&self) -> &[TalkerStreamInfo] {
        &self.talker_stream_infos
    }
}

/// The entity and all of its configurations
#[derive(Debug, Clone)]
pub struct EntityModel {
    entity: EntityDescriptor,
    configurations: Vec<Configuration>,
}

impl EntityModel {
    /// Build the model from a descriptor tree and the interface MAC
    ///
    /// Assigns dense per-type descriptor indices in each configuration, fills
    /// AVB_INTERFACE MAC addresses, derives the entity's stream counts from the
    /// current configuration and computes each configuration's descriptor-count
    /// summary.
    pub fn build(tree: &DescriptorTree, local_mac: MacAddress) -> Result<Self, EntityError> {
        let count = tree.configurations.len();
        if count == 0 {
            return Err(EntityError::NoConfigurations);
        }
        if count > usize::from(u16::MAX) {
            return Err(EntityError::TooManyConfigurations(count));
        }
        let current = tree.entity.current_configuration;
        if usize::from(current) >= count {
            return Err(EntityError::CurrentConfigurationOutOfRange { current, count });
        }

        let mut entity = tree.entity.clone();
        entity.validate()?;
        if entity.entity_id.is_zero() {
            entity.entity_id = Eui64::from_mac(local_mac);
        }
        entity.configurations_count = count as u16;

        let mut configurations = Vec::with_capacity(count);
        for (position, node) in tree.configurations.iter().enumerate() {
            let position = position as u16;
            let (configuration, counts) = Self::build_configuration(position, node, local_mac)?;
            if position == current {
                entity.talker_stream_sources = counts.get(&DescriptorType::StreamOutput).copied().unwrap_or(0);
                entity.listener_stream_sinks = counts.get(&DescriptorType::StreamInput).copied().unwrap_or(0);
            }
            configurations.push(configuration);
        }

        let mut model = Self { entity, configurations };
        model.reset_stream_infos();

        tracing::debug!(
            "Built entity model {} with {} configuration(s), {} source(s), {} sink(s)",
            model.entity.entity_id,
            count,
            model.entity.talker_stream_sources,
            model.entity.listener_stream_sinks
        );
        Ok(model)
    }

    fn build_configuration(
        position: u16,
        node: &ConfigurationTree,
        local_mac: MacAddress,
    ) -> Result<(Configuration, BTreeMap<DescriptorType, u16>), EntityError> {
        let mut counts: BTreeMap<DescriptorType, u16> = BTreeMap::new();
        let mut descriptors = Vec::with_capacity(node.descriptors.len());

        for source in &node.descriptors {
            let kind = source.descriptor_type();
            match source {
                Descriptor::Entity(_) | Descriptor::Configuration(_) => {
                    return Err(EntityError::MisplacedDescriptor(kind.name()));
                }
                Descriptor::Unsupported { .. } if kind.has_wire_format() => {
                    return Err(EntityError::OpaqueDescriptor(kind.name()));
                }
                _ => {}
            }

            let next = counts.entry(kind).or_insert(0);
            let index = *next;
            *next = next.checked_add(1).ok_or(EntityError::TooManyDescriptors {
                configuration: position,
                kind: kind.name(),
            })?;

            let mut descriptor = source.clone();
            descriptor.set_descriptor_index(index);
            if let Descriptor::AvbInterface(avb) = &mut descriptor {
                avb.mac_address = local_mac;
            }
            descriptors.push(descriptor);
        }

        let strings = counts.get(&DescriptorType::Strings).copied().unwrap_or(0);
        for descriptor in &mut descriptors {
            if let Descriptor::Locale(locale) = descriptor {
                if locale.number_of_strings == 0 {
                    locale.number_of_strings = strings;
                }
            }
        }
        descriptors.iter().try_for_each(Descriptor::validate)?;

        let descriptor = ConfigurationDescriptor {
            descriptor_index: position,
            object_name: node.object_name.clone(),
            localized_description: node.localized_description,
            descriptor_counts: counts
                .iter()
                .filter(|(kind, _)| kind.has_wire_format())
                .map(|(kind, count)| DescriptorCount { descriptor_type: kind.as_u16(), count: *count })
                .collect(),
        };
        descriptor.validate()?;

        let configuration = Configuration {
            descriptor,
            descriptors,
            listener_stream_infos: Vec::new(),
            talker_stream_infos: Vec::new(),
        };
        Ok((configuration, counts))
    }

    /// Reallocate every configuration's connection tables, one entry per stream descriptor
    pub fn reset_stream_infos(&mut self) {
        for configuration in &mut self.configurations {
            let inputs = configuration.count_of(DescriptorType::StreamInput);
            let outputs = configuration.count_of(DescriptorType::StreamOutput);
            configuration.listener_stream_infos = (0..inputs).map(ListenerStreamInfo::new).collect();
            configuration.talker_stream_infos = (0..outputs).map(TalkerStreamInfo::new).collect();
        }
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    pub fn entity_id(&self) -> Eui64 {
        self.entity.entity_id
    }

    pub fn current_configuration(&self) -> u16 {
        self.entity.current_configuration
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub fn configuration(&self, index: u16) -> Option<&Configuration> {
        self.configurations.get(usize::from(index))
    }

    /// Resolve a READ_DESCRIPTOR target
    ///
    /// ENTITY and CONFIGURATION ignore `configuration`; for CONFIGURATION the
    /// descriptor index selects the configuration.
    pub fn find_descriptor(
        &self,
        configuration: u16,
        kind: DescriptorType,
        index: u16,
    ) -> Option<&dyn AemDescriptor> {
        match kind {
            DescriptorType::Entity => (index == 0).then_some(&self.entity as &dyn AemDescriptor),
            DescriptorType::Configuration => self
                .configuration(index)
                .map(|c| &c.descriptor as &dyn AemDescriptor),
            _ => self.configuration(configuration)?.descriptors.iter().find_map(|d| {
                (d.descriptor_type() == kind && d.descriptor_index() == index).then_some(d as &dyn AemDescriptor)
            }),
        }
    }

    pub fn find_listener_info(&self, configuration: u16, unique_id: u16) -> Option<&ListenerStreamInfo> {
        self.configuration(configuration)?
            .listener_stream_infos
            .get(usize::from(unique_id))
    }

    pub fn find_listener_info_mut(&mut self, configuration: u16, unique_id: u16) -> Option<&mut ListenerStreamInfo> {
        self.configurations
            .get_mut(usize::from(configuration))?
            .listener_stream_infos
            .get_mut(usize::from(unique_id))
    }

    pub fn find_talker_info(&self, configuration: u16, unique_id: u16) -> Option<&TalkerStreamInfo> {
        self.configuration(configuration)?
            .talker_stream_infos
            .get(usize::from(unique_id))
    }

    pub fn find_talker_info_mut(&mut self, configuration: u16, unique_id: u16) -> Option<&mut TalkerStreamInfo> {
        self.configurations
            .get_mut(usize::from(configuration))?
            .talker_stream_infos
            .get_mut(usize::from(unique_id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::descriptor::*;
    use super::*;

    pub(crate) const MAC: MacAddress = MacAddress([0x00, 0x1B, 0x21, 0x01, 0x02, 0x03]);

    /// Two configurations; the first has two stream inputs and one output
    pub(crate) fn sample_tree() -> DescriptorTree {
        let first = ConfigurationTree {
            object_name: "Default".into(),
            localized_description: 0xFFFF,
            descriptors: vec![
                Descriptor::AudioUnit(AudioUnitDescriptor {
                    object_name: "Audio".into(),
                    current_sampling_rate: 48_000,
                    sampling_rates: vec![44_100, 48_000],
                    ..Default::default()
                }),
                Descriptor::StreamInput(StreamDescriptor { object_name: "In 0".into(), ..Default::default() }),
                Descriptor::StreamOutput(StreamDescriptor {
                    object_name: "Out 0".into(),
                    formats: vec![0x00A0_0202_4000_0200],
                    ..Default::default()
                }),
                Descriptor::StreamInput(StreamDescriptor { object_name: "In 1".into(), ..Default::default() }),
                Descriptor::AvbInterface(AvbInterfaceDescriptor::default()),
                Descriptor::Locale(LocaleDescriptor { locale_identifier: "en-US".into(), ..Default::default() }),
                Descriptor::Strings(StringsDescriptor { strings: vec!["Vendor".into()], ..Default::default() }),
                Descriptor::Strings(StringsDescriptor::default()),
                Descriptor::Unsupported { kind: DescriptorType::Control, descriptor_index: 0 },
                Descriptor::ClockDomain(ClockDomainDescriptor { clock_sources: vec![0], ..Default::default() }),
            ],
        };
        let second = ConfigurationTree {
            object_name: "Alt".into(),
            descriptors: vec![Descriptor::StreamOutput(StreamDescriptor::default())],
            ..Default::default()
        };
        DescriptorTree {
            entity: EntityDescriptor {
                entity_model_id: Eui64(0x0011_2233_4455_6677),
                entity_name: "test entity".into(),
                ..Default::default()
            },
            configurations: vec![first, second],
        }
    }

    #[test]
    fn test_build_assigns_dense_indices() {
        let model = EntityModel::build(&sample_tree(), MAC).unwrap();

        for configuration in model.configurations() {
            let mut seen: BTreeMap<DescriptorType, Vec<u16>> = BTreeMap::new();
            for d in configuration.descriptors() {
                seen.entry(d.descriptor_type()).or_default().push(d.descriptor_index());
            }
            for (kind, indices) in seen {
                let expected: Vec<u16> = (0..indices.len() as u16).collect();
                assert_eq!(indices, expected, "{:?}", kind);
            }
        }
    }

    #[test]
    fn test_build_derives_entity_fields() {
        let model = EntityModel::build(&sample_tree(), MAC).unwrap();
        let entity = model.entity();

        assert_eq!(entity.entity_id, Eui64(0x001B_21FF_FE01_0203));
        assert_eq!(entity.configurations_count, 2);
        assert_eq!(entity.listener_stream_sinks, 2);
        assert_eq!(entity.talker_stream_sources, 1);
    }

    #[test]
    fn test_build_keeps_explicit_entity_id() {
        let mut tree = sample_tree();
        tree.entity.entity_id = Eui64(0xAB);
        tree.entity.current_configuration = 1;
        let model = EntityModel::build(&tree, MAC).unwrap();

        assert_eq!(model.entity_id(), Eui64(0xAB));
        assert_eq!(model.entity().listener_stream_sinks, 0);
        assert_eq!(model.entity().talker_stream_sources, 1);
    }

    #[test]
    fn test_build_fills_configuration_summary() {
        let model = EntityModel::build(&sample_tree(), MAC).unwrap();
        let config = model.configuration(0).unwrap().descriptor();

        assert_eq!(config.descriptor_index, 0);
        let summary: Vec<(u16, u16)> = config
            .descriptor_counts
            .iter()
            .map(|c| (c.descriptor_type, c.count))
            .collect();
        // CONTROL has no wire format and stays out of the summary
        assert_eq!(
            summary,
            vec![(0x02, 1), (0x05, 2), (0x06, 1), (0x09, 1), (0x0C, 1), (0x0D, 2), (0x24, 1)]
        );
        assert_eq!(model.configuration(1).unwrap().descriptor().descriptor_index, 1);
    }

    #[test]
    fn test_build_fills_mac_and_locale() {
        let model = EntityModel::build(&sample_tree(), MAC).unwrap();
        let descriptors = model.configuration(0).unwrap().descriptors();

        let avb = descriptors.iter().find_map(|d| match d {
            Descriptor::AvbInterface(a) => Some(a),
            _ => None,
        });
        assert_eq!(avb.unwrap().mac_address, MAC);

        let locale = descriptors.iter().find_map(|d| match d {
            Descriptor::Locale(l) => Some(l),
            _ => None,
        });
        assert_eq!(locale.unwrap().number_of_strings, 2);
    }

    #[test]
    fn test_build_rejects_inconsistent_trees() {
        let empty = DescriptorTree::default();
        assert_eq!(EntityModel::build(&empty, MAC).unwrap_err(), EntityError::NoConfigurations);

        let mut tree = sample_tree();
        tree.entity.current_configuration = 2;
        assert!(matches!(
            EntityModel::build(&tree, MAC),
            Err(EntityError::CurrentConfigurationOutOfRange { current: 2, count: 2 })
        ));

        let mut tree = sample_tree();
        tree.configurations[1]
            .descriptors
            .push(Descriptor::Entity(EntityDescriptor::default()));
        assert_eq!(
            EntityModel::build(&tree, MAC).unwrap_err(),
            EntityError::MisplacedDescriptor("ENTITY")
        );

        let mut tree = sample_tree();
        tree.configurations[0].descriptors.push(Descriptor::Unsupported {
            kind: DescriptorType::StreamInput,
            descriptor_index: 0,
        });
        assert_eq!(
            EntityModel::build(&tree, MAC).unwrap_err(),
            EntityError::OpaqueDescriptor("STREAM_INPUT")
        );

        let mut tree = sample_tree();
        tree.entity.entity_name = "n".repeat(70);
        assert!(matches!(
            EntityModel::build(&tree, MAC),
            Err(EntityError::StringTooLong { field: "entity_name", .. })
        ));
    }

    #[test]
    fn test_find_descriptor() {
        let model = EntityModel::build(&sample_tree(), MAC).unwrap();

        let entity = model.find_descriptor(5, DescriptorType::Entity, 0).unwrap();
        assert_eq!(entity.descriptor_type(), DescriptorType::Entity);
        assert!(model.find_descriptor(0, DescriptorType::Entity, 1).is_none());

        let config = model.find_descriptor(0, DescriptorType::Configuration, 1).unwrap();
        assert_eq!(config.descriptor_index(), 1);

        let input = model.find_descriptor(0, DescriptorType::StreamInput, 1).unwrap();
        assert_eq!(&input.to_bytes()[4..8], b"In 1");
        assert!(model.find_descriptor(0, DescriptorType::StreamInput, 2).is_none());
        assert!(model.find_descriptor(1, DescriptorType::StreamInput, 0).is_none());
        assert!(model.find_descriptor(9, DescriptorType::StreamOutput, 0).is_none());

        let control = model.find_descriptor(0, DescriptorType::Control, 0).unwrap();
        assert!(control.to_bytes().is_empty());
    }

    #[test]
    fn test_stream_info_tables() {
        let mut model = EntityModel::build(&sample_tree(), MAC).unwrap();

        assert_eq!(model.configuration(0).unwrap().listener_stream_infos().len(), 2);
        assert_eq!(model.configuration(0).unwrap().talker_stream_infos().len(), 1);
        assert_eq!(model.find_listener_info(0, 1).unwrap().listener_unique_id, 1);
        assert!(model.find_listener_info(0, 2).is_none());
        assert!(model.find_talker_info(1, 0).is_some());
        assert!(model.find_talker_info(2, 0).is_none());

        model.find_talker_info_mut(0, 0).unwrap().connection_count = 4;
        model.reset_stream_infos();
        assert_eq!(model.find_talker_info(0, 0).unwrap().connection_count, 0);
    }
}
