//! Per-stream connection bookkeeping used by the ACMP state machines

use crate::protocol::{Eui64, MacAddress};

/// A listener connected to one of our stream outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerPair {
    pub listener_entity_id: Eui64,
    pub listener_unique_id: u16,
}

/// Connection state of one stream input while acting as a Listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerStreamInfo {
    pub listener_unique_id: u16,
    pub connected: bool,
    pub talker_entity_id: Eui64,
    pub talker_unique_id: u16,
    pub stream_id: Eui64,
    pub stream_dest_mac: MacAddress,
    pub controller_entity_id: Eui64,
    pub flags: u16,
    pub stream_vlan_id: u16,
}

impl ListenerStreamInfo {
    pub fn new(listener_unique_id: u16) -> Self {
        Self {
            listener_unique_id,
            connected: false,
            talker_entity_id: Eui64::ZERO,
            talker_unique_id: 0,
            stream_id: Eui64::ZERO,
            stream_dest_mac: MacAddress::ZERO,
            controller_entity_id: Eui64::ZERO,
            flags: 0,
            stream_vlan_id: 0,
        }
    }

    /// Whether this stream is bound to exactly this talker stream
    pub fn is_connected_to(&self, talker_entity_id: Eui64, talker_unique_id: u16) -> bool {
        self.connected
            && self.talker_entity_id == talker_entity_id
            && self.talker_unique_id == talker_unique_id
    }

    /// Back to the never-connected state
    pub fn clear(&mut self) {
        *self = Self::new(self.listener_unique_id);
    }
}

/// Published identity and listener list of one stream output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkerStreamInfo {
    pub talker_unique_id: u16,
    pub stream_id: Eui64,
    pub stream_dest_mac: MacAddress,
    pub stream_vlan_id: u16,
    pub connection_count: u16,
    pub connected_listeners: Vec<ListenerPair>,
}

impl TalkerStreamInfo {
    pub fn new(talker_unique_id: u16) -> Self {
        Self {
            talker_unique_id,
            stream_id: Eui64::ZERO,
            stream_dest_mac: MacAddress::ZERO,
            stream_vlan_id: 0,
            connection_count: 0,
            connected_listeners: Vec::new(),
        }
    }

    /// Append a listener; `None` once the counter cannot grow
    pub fn add_listener(&mut self, pair: ListenerPair) -> Option<u16> {
        let count = self.connection_count.checked_add(1)?;
        self.connected_listeners.push(pair);
        self.connection_count = count;
        Some(count)
    }

    /// Remove the first matching listener; false if it was not connected
    pub fn remove_listener(&mut self, pair: &ListenerPair) -> bool {
        match self.connected_listeners.iter().position(|p| p == pair) {
            Some(pos) => {
                self.connected_listeners.remove(pos);
                self.connection_count = self.connection_count.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// The `index`-th connection, counting from zero
    pub fn connection(&self, index: u16) -> Option<&ListenerPair> {
        self.connected_listeners.get(usize::from(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(id: u64, uid: u16) -> ListenerPair {
        ListenerPair { listener_entity_id: Eui64(id), listener_unique_id: uid }
    }

    #[test]
    fn test_talker_listener_list() {
        let mut info = TalkerStreamInfo::new(0);
        assert_eq!(info.add_listener(pair(1, 0)), Some(1));
        assert_eq!(info.add_listener(pair(2, 0)), Some(2));
        assert_eq!(info.add_listener(pair(1, 0)), Some(3));

        assert!(info.remove_listener(&pair(1, 0)));
        assert_eq!(info.connection_count, 2);
        assert_eq!(info.connection(0), Some(&pair(2, 0)));
        assert_eq!(info.connection(1), Some(&pair(1, 0)));
        assert_eq!(info.connection(2), None);

        assert!(!info.remove_listener(&pair(9, 9)));
        assert_eq!(info.connection_count, 2);
    }

    #[test]
    fn test_listener_clear_keeps_unique_id() {
        let mut info = ListenerStreamInfo::new(3);
        info.connected = true;
        info.talker_entity_id = Eui64(7);
        info.talker_unique_id = 1;
        assert!(info.is_connected_to(Eui64(7), 1));
        assert!(!info.is_connected_to(Eui64(7), 2));

        info.clear();
        assert_eq!(info, ListenerStreamInfo::new(3));
    }
}
