//! Public engine handle and the monitor loop worker
//!
//! [`Avdecc`] owns one background thread that waits a bounded time for a
//! frame, dispatches it, and ticks every protocol engine. API calls from other
//! threads take the same lock the worker holds while processing, so they see
//! and mutate the state the worker uses.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::constants::{DEFAULT_POLL_INTERVAL_MS, MAX_INFLIGHT_COMMANDS, VALID_TIME};
use crate::dispatcher::Dispatcher;
use crate::entity::{DescriptorTree, EntityModel};
use crate::error::{EntityError, Error, Result, TransportError};
use crate::protocol::{Eui64, MacAddress};
use crate::transport::Transport;

/// Which side(s) of a stream connection the entity serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Talker,
    Listener,
    #[default]
    Both,
}

impl Role {
    pub fn is_talker(self) -> bool {
        matches!(self, Role::Talker | Role::Both)
    }

    pub fn is_listener(self) -> bool {
        matches!(self, Role::Listener | Role::Both)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Talker => "talker",
            Role::Listener => "listener",
            Role::Both => "both",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "talker" => Ok(Role::Talker),
            "listener" => Ok(Role::Listener),
            "both" => Ok(Role::Both),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Runtime tuning of the monitor loop and protocol engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Longest wait for a frame before the engines are ticked
    pub poll_interval: Duration,
    /// Advertised ADP validity in seconds
    pub valid_time: u8,
    /// Capacity of the ACMP in-flight command table
    pub inflight_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            valid_time: VALID_TIME,
            inflight_capacity: MAX_INFLIGHT_COMMANDS,
        }
    }
}

struct Shared {
    dispatcher: Mutex<Dispatcher>,
    halt: AtomicBool,
}

/// A running AVDECC entity
pub struct Avdecc {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    entity_id: Eui64,
    role: Role,
    worker: Option<JoinHandle<()>>,
}

impl Avdecc {
    /// Open a raw socket on `interface` and start the entity with default options
    pub fn init(tree: &DescriptorTree, interface: &str, role: Role) -> Result<Self> {
        Self::init_with_options(tree, interface, role, EngineOptions::default())
    }

    #[cfg(all(target_os = "linux", feature = "raw-socket"))]
    pub fn init_with_options(tree: &DescriptorTree, interface: &str, role: Role, options: EngineOptions) -> Result<Self> {
        let socket = crate::transport::RawSocket::open(interface)?;
        Self::start(tree, Arc::new(socket), role, options)
    }

    #[cfg(not(all(target_os = "linux", feature = "raw-socket")))]
    pub fn init_with_options(
        _tree: &DescriptorTree,
        interface: &str,
        _role: Role,
        _options: EngineOptions,
    ) -> Result<Self> {
        Err(TransportError::OpenFailed(format!("no raw socket support for {} on this build", interface)).into())
    }

    /// Build the entity model and start the monitor loop over `transport`
    pub fn start(
        tree: &DescriptorTree,
        transport: Arc<dyn Transport>,
        role: Role,
        options: EngineOptions,
    ) -> Result<Self> {
        let model = EntityModel::build(tree, transport.mac_address())?;
        let link_up = transport.link_is_up()?;
        let entity_id = model.entity_id();

        let shared = Arc::new(Shared {
            dispatcher: Mutex::new(Dispatcher::new(model, role, &options, link_up)),
            halt: AtomicBool::new(false),
        });

        let worker_shared = shared.clone();
        let worker_transport = transport.clone();
        let poll_interval = options.poll_interval;
        let worker = thread::Builder::new()
            .name("avdecc-monitor".into())
            .spawn(move || monitor_loop(&worker_shared, worker_transport.as_ref(), poll_interval))
            .map_err(|e| Error::Worker(e.to_string()))?;

        tracing::info!(
            "AVDECC entity {} started as {} on {} (link {})",
            entity_id,
            role,
            transport.mac_address(),
            if link_up { "up" } else { "down" }
        );

        Ok(Self {
            shared,
            transport,
            entity_id,
            role,
            worker: Some(worker),
        })
    }

    pub fn entity_id(&self) -> Eui64 {
        self.entity_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn mac_address(&self) -> MacAddress {
        self.transport.mac_address()
    }

    /// Whether the monitor loop is still running
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Send ENTITY_DEPARTING and stop the monitor loop, waiting for it to exit
    pub fn terminate(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.halt.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("AVDECC monitor thread panicked");
            }
            tracing::info!("AVDECC entity {} stopped", self.entity_id);
        }
    }

    /// Advertise `id` as the current gPTP grandmaster
    pub fn set_grandmaster_id(&self, id: Eui64) {
        self.shared.dispatcher.lock().advertiser_mut().set_grandmaster_id(id);
    }

    pub fn get_current_configuration(&self) -> u16 {
        self.shared.dispatcher.lock().model().current_configuration()
    }

    /// Publish the identity of one of our stream outputs
    pub fn set_talker_stream_info(
        &self,
        configuration: u16,
        unique_id: u16,
        stream_id: Eui64,
        dest_mac: MacAddress,
        vlan_id: u16,
    ) -> Result<()> {
        let mut dispatcher = self.shared.dispatcher.lock();
        let info = dispatcher
            .model_mut()
            .find_talker_info_mut(configuration, unique_id)
            .ok_or(EntityError::TalkerStreamNotFound { configuration, unique_id })?;
        info.stream_id = stream_id;
        info.stream_dest_mac = dest_mac;
        info.stream_vlan_id = vlan_id;
        tracing::info!(
            "Stream output {} publishes {} to {} on VLAN {}",
            unique_id,
            stream_id,
            dest_mac,
            vlan_id
        );
        Ok(())
    }

    /// Number of listeners connected to a stream output
    pub fn get_connection_count(&self, configuration: u16, talker_unique_id: u16) -> Result<u16> {
        let dispatcher = self.shared.dispatcher.lock();
        let info = dispatcher
            .model()
            .find_talker_info(configuration, talker_unique_id)
            .ok_or(EntityError::TalkerStreamNotFound { configuration, unique_id: talker_unique_id })?;
        Ok(info.connection_count)
    }

    /// Whether a stream input is connected to a talker
    pub fn get_connected_from_listener_stream_info(&self, configuration: u16, listener_unique_id: u16) -> Result<bool> {
        let dispatcher = self.shared.dispatcher.lock();
        let info = dispatcher
            .model()
            .find_listener_info(configuration, listener_unique_id)
            .ok_or(EntityError::ListenerStreamNotFound { configuration, unique_id: listener_unique_id })?;
        Ok(info.connected)
    }

    /// Stream ID a stream input is connected to (zero when unconnected)
    pub fn get_stream_id_from_listener_stream_info(&self, configuration: u16, listener_unique_id: u16) -> Result<Eui64> {
        let dispatcher = self.shared.dispatcher.lock();
        let info = dispatcher
            .model()
            .find_listener_info(configuration, listener_unique_id)
            .ok_or(EntityError::ListenerStreamNotFound { configuration, unique_id: listener_unique_id })?;
        Ok(info.stream_id)
    }

    /// Start handling ACMP frames and in-flight timers
    pub fn acmp_start(&self) {
        self.shared.dispatcher.lock().set_acmp_started(true);
    }

    pub fn acmp_stop(&self) {
        self.shared.dispatcher.lock().set_acmp_started(false);
    }

    /// Broadcast ENTITY_DISCOVER on the next iteration
    pub fn discover(&self) {
        self.shared.dispatcher.lock().advertiser_mut().request_discover();
    }
}

impl Drop for Avdecc {
    fn drop(&mut self) {
        self.stop();
    }
}

fn monitor_loop(shared: &Shared, transport: &dyn Transport, poll_interval: Duration) {
    tracing::debug!("Monitor loop running, poll interval {:?}", poll_interval);
    loop {
        let mut halting = shared.halt.load(Ordering::SeqCst);

        let frame = if halting {
            None
        } else {
            match transport.receive_frame(poll_interval) {
                Ok(frame) => frame,
                Err(TransportError::Closed) => {
                    tracing::error!("Transport closed, stopping monitor loop");
                    halting = true;
                    None
                }
                Err(e) => {
                    tracing::warn!("Receive failed: {}", e);
                    thread::sleep(poll_interval.min(Duration::from_millis(100)));
                    None
                }
            }
        };

        let mut dispatcher = shared.dispatcher.lock();
        let now = Instant::now();
        if let Some(frame) = frame {
            dispatcher.handle_frame(&frame, now, transport);
        }
        if halting {
            dispatcher.begin_departing();
        }
        dispatcher.tick(now, transport);

        if halting {
            break;
        }
    }
    tracing::debug!("Monitor loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::{sample_tree, MAC};
    use crate::protocol::{AdpMessageType, Adpdu};
    use crate::transport::memory_pair;

    fn fast_options() -> EngineOptions {
        EngineOptions {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("Talker".parse::<Role>().unwrap(), Role::Talker);
        assert_eq!("listener".parse::<Role>().unwrap(), Role::Listener);
        assert_eq!(Role::Both.to_string(), "both");
        assert!("controller".parse::<Role>().is_err());

        assert!(Role::Both.is_talker() && Role::Both.is_listener());
        assert!(!Role::Talker.is_listener());
        assert!(!Role::Listener.is_talker());
    }

    #[test]
    fn test_default_options() {
        let options = EngineOptions::default();
        assert_eq!(options.poll_interval, Duration::from_millis(1000));
        assert_eq!(options.valid_time, 31);
        assert_eq!(options.inflight_capacity, 4);
    }

    #[test]
    fn test_start_advertises_and_terminate_departs() {
        let (transport, peer) = memory_pair(MAC);
        let avdecc = Avdecc::start(&sample_tree(), Arc::new(transport), Role::Both, fast_options()).unwrap();
        assert!(avdecc.is_running());

        let first = peer.recv_sent(Duration::from_secs(2)).unwrap();
        let adpdu = Adpdu::decode(&first.payload).unwrap();
        assert_eq!(adpdu.message_type, AdpMessageType::EntityAvailable);
        assert_eq!(adpdu.entity_id, avdecc.entity_id());

        avdecc.terminate();
        let last = peer.drain_sent().pop().unwrap();
        assert_eq!(
            Adpdu::decode(&last.payload).unwrap().message_type,
            AdpMessageType::EntityDeparting
        );
    }

    #[test]
    fn test_stream_info_accessors() {
        let (transport, _peer) = memory_pair(MAC);
        let avdecc = Avdecc::start(&sample_tree(), Arc::new(transport), Role::Both, fast_options()).unwrap();

        assert_eq!(avdecc.get_current_configuration(), 0);
        assert_eq!(avdecc.get_connection_count(0, 0).unwrap(), 0);
        assert!(!avdecc.get_connected_from_listener_stream_info(0, 1).unwrap());
        assert_eq!(avdecc.get_stream_id_from_listener_stream_info(0, 0).unwrap(), Eui64::ZERO);

        avdecc
            .set_talker_stream_info(0, 0, Eui64(0x0102_0304_0506_0001), MacAddress::from_u64(0x91e0_f000_0e80), 2)
            .unwrap();

        assert!(matches!(
            avdecc.get_connection_count(0, 5),
            Err(Error::Entity(EntityError::TalkerStreamNotFound { configuration: 0, unique_id: 5 }))
        ));
        assert!(matches!(
            avdecc.get_connected_from_listener_stream_info(1, 0),
            Err(Error::Entity(EntityError::ListenerStreamNotFound { configuration: 1, unique_id: 0 }))
        ));
        assert!(avdecc.set_talker_stream_info(3, 0, Eui64::ZERO, MacAddress::ZERO, 0).is_err());
    }

    #[test]
    fn test_start_rejects_empty_tree() {
        let (transport, _peer) = memory_pair(MAC);
        let result = Avdecc::start(&DescriptorTree::default(), Arc::new(transport), Role::Talker, fast_options());
        assert!(matches!(result, Err(Error::Entity(EntityError::NoConfigurations))));
    }

    #[test]
    fn test_monitor_stops_when_transport_closes() {
        let (transport, peer) = memory_pair(MAC);
        let avdecc = Avdecc::start(&sample_tree(), Arc::new(transport), Role::Listener, fast_options()).unwrap();
        drop(peer);

        let deadline = Instant::now() + Duration::from_secs(2);
        while avdecc.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!avdecc.is_running());
    }
}
