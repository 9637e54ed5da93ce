//! Fixed-capacity table of commands forwarded to a talker and not yet answered

use std::time::Instant;

use crate::protocol::{AcmpMessageType, Acmpdu};

/// A forwarded CONNECT_TX/DISCONNECT_TX command awaiting its response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InflightCommand {
    /// The command as sent to the talker
    pub command: Acmpdu,
    /// Whether the single retransmission has been used
    pub retried: bool,
    /// Sequence ID of the controller command being serviced
    pub original_sequence_id: u16,
    pub deadline: Instant,
}

/// Slots are `None` while free
#[derive(Debug)]
pub struct InflightTable {
    slots: Vec<Option<InflightCommand>>,
}

impl InflightTable {
    pub fn new(capacity: usize) -> Self {
        Self { slots: vec![None; capacity] }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Store `entry` in the first free slot; hands it back when the table is full
    pub fn insert(&mut self, entry: InflightCommand) -> Result<usize, InflightCommand> {
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                Ok(slot)
            }
            None => Err(entry),
        }
    }

    pub fn get(&self, slot: usize) -> Option<&InflightCommand> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut InflightCommand> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Free a slot, returning what it held
    pub fn remove(&mut self, slot: usize) -> Option<InflightCommand> {
        self.slots.get_mut(slot)?.take()
    }

    /// Remove the entry for the command of `message_type` sent with `sequence_id`
    pub fn take_matching(&mut self, message_type: AcmpMessageType, sequence_id: u16) -> Option<InflightCommand> {
        self.slots
            .iter_mut()
            .find(|slot| {
                slot.as_ref().is_some_and(|entry| {
                    entry.command.message_type == message_type && entry.command.sequence_id == sequence_id
                })
            })?
            .take()
    }

    /// Slots whose deadline has passed at `now`
    pub fn expired(&self, now: Instant) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().filter(|e| e.deadline <= now).map(|_| slot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(message_type: AcmpMessageType, sequence_id: u16, deadline: Instant) -> InflightCommand {
        let mut command = Acmpdu::new(message_type);
        command.sequence_id = sequence_id;
        InflightCommand { command, retried: false, original_sequence_id: 100 + sequence_id, deadline }
    }

    #[test]
    fn test_insert_until_full() {
        let now = Instant::now();
        let mut table = InflightTable::new(2);
        assert!(table.is_empty());

        assert_eq!(table.insert(entry(AcmpMessageType::ConnectTxCommand, 1, now)), Ok(0));
        assert_eq!(table.insert(entry(AcmpMessageType::ConnectTxCommand, 2, now)), Ok(1));
        assert!(table.is_full());

        let rejected = table.insert(entry(AcmpMessageType::ConnectTxCommand, 3, now)).unwrap_err();
        assert_eq!(rejected.command.sequence_id, 3);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0).unwrap().command.sequence_id, 1);

        table.remove(0);
        assert_eq!(table.insert(entry(AcmpMessageType::DisconnectTxCommand, 4, now)), Ok(0));
    }

    #[test]
    fn test_take_matching_checks_type_and_sequence() {
        let now = Instant::now();
        let mut table = InflightTable::new(4);
        table.insert(entry(AcmpMessageType::ConnectTxCommand, 7, now)).unwrap();
        table.insert(entry(AcmpMessageType::DisconnectTxCommand, 8, now)).unwrap();

        assert!(table.take_matching(AcmpMessageType::DisconnectTxCommand, 7).is_none());
        let taken = table.take_matching(AcmpMessageType::ConnectTxCommand, 7).unwrap();
        assert_eq!(taken.original_sequence_id, 107);
        assert!(table.take_matching(AcmpMessageType::ConnectTxCommand, 7).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_expired_slots() {
        let now = Instant::now();
        let mut table = InflightTable::new(3);
        table.insert(entry(AcmpMessageType::ConnectTxCommand, 1, now + Duration::from_millis(200))).unwrap();
        table.insert(entry(AcmpMessageType::ConnectTxCommand, 2, now + Duration::from_millis(2000))).unwrap();

        assert!(table.expired(now).is_empty());
        assert_eq!(table.expired(now + Duration::from_millis(200)), vec![0]);
        assert_eq!(table.expired(now + Duration::from_secs(5)), vec![0, 1]);
    }
}
