//! # AVDECC Endpoint
//!
//! IEEE 1722.1 entity stack for AVB talkers and listeners: discovery (ADP),
//! enumeration (AECP/AEM READ_DESCRIPTOR) and connection management (ACMP).
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              CALLER                                          │
//! │   Avdecc::init / start ─ set_talker_stream_info ─ acmp_start ─ terminate    │
//! │   get_connection_count ─ get_connected_from_listener_stream_info ─ ...      │
//! └──────────────────────────────────┬──────────────────────────────────────────┘
//!                                    │ parking_lot::Mutex<Dispatcher>
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                    Monitor thread (engine::monitor_loop)                     │
//! │                                                                             │
//! │   receive_frame(poll interval) ──► Dispatcher::handle_frame ──► tick        │
//! │                                                                             │
//! │  ┌──────────────────────────────────────────────────────────────────────┐  │
//! │  │                        Dispatcher (dispatcher)                        │  │
//! │  │   subtype 0x7A            subtype 0x7B              subtype 0x7C       │  │
//! │  │  ┌─────────────┐       ┌───────────────┐       ┌──────────────────┐   │  │
//! │  │  │ Advertiser  │       │ AecpResponder │       │ConnectionManager │   │  │
//! │  │  │   (adp)     │       │    (aecp)     │       │     (acmp)       │   │  │
//! │  │  │ AVAILABLE   │       │ ENTITY_AVAIL. │       │ Talker │Listener │   │  │
//! │  │  │ DEPARTING   │       │ READ_DESCR.   │       │        │in-flight│   │  │
//! │  │  │ DISCOVER    │       │ NOT_IMPLEM.   │       │        │ table   │   │  │
//! │  │  └──────┬──────┘       └───────┬───────┘       └────────┬─────────┘   │  │
//! │  │         └──────────────────────┼────────────────────────┘             │  │
//! │  │                                ▼                                      │  │
//! │  │                 EntityModel (entity) + stream tables                  │  │
//! │  └──────────────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────┬──────────────────────────────────────────┘
//!                                    │ Transport trait (transport)
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │   RawSocket (AF_PACKET, ethertype 0x22F0)     MemoryTransport (tests)        │
//! │   multicast 91:E0:F0:01:00:00 for ADP/ACMP, unicast AECP responses          │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod acmp;
pub mod adp;
pub mod aecp;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod entity;
pub mod error;
pub mod protocol;
pub mod transport;

pub use engine::{Avdecc, EngineOptions, Role};
pub use entity::{DescriptorTree, EntityModel};
pub use error::{Error, Result};
pub use protocol::{Eui64, MacAddress};

/// Application-wide constants
pub mod constants {
    /// Advertised ADP validity in seconds
    pub const VALID_TIME: u8 = 31;

    /// Longest wait for a frame before the engines are ticked
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

    /// Commands a listener may have forwarded to talkers at once
    pub const MAX_INFLIGHT_COMMANDS: usize = 4;

    /// How often the launcher checks whether a stream got connected
    pub const CONNECTION_POLL_INTERVAL_MS: u64 = 100;
}
