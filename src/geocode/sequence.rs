//! Last-request-wins bookkeeping for geocode calls.
//!
//! Every call is tagged with a ticket before it is issued. When the response
//! arrives it is applied only if its ticket is still the latest one issued
//! for the same key (marker id); anything older is discarded.

use crate::prelude::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    key: String,
    sequence: u64,
}

impl Ticket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    next: u64,
    latest: HashMap<String, u64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag a new request for `key`, superseding any in flight
    pub fn issue(&mut self, key: &str) -> Ticket {
        self.next += 1;
        self.latest.insert(key.to_string(), self.next);
        Ticket {
            key: key.to_string(),
            sequence: self.next,
        }
    }

    pub fn is_latest(&self, ticket: &Ticket) -> bool {
        self.latest.get(&ticket.key) == Some(&ticket.sequence)
    }

    /// Invalidate every outstanding ticket for `key`
    pub fn forget(&mut self, key: &str) {
        self.latest.remove(key);
    }

    /// Invalidate everything
    pub fn clear(&mut self) {
        self.latest.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let mut sequencer = RequestSequencer::new();
        let first = sequencer.issue("picker");
        let second = sequencer.issue("picker");

        assert!(second.sequence() > first.sequence());
        assert!(!sequencer.is_latest(&first));
        assert!(sequencer.is_latest(&second));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut sequencer = RequestSequencer::new();
        let picker = sequencer.issue("picker");
        let other = sequencer.issue("item-7");

        assert!(sequencer.is_latest(&picker));
        assert!(sequencer.is_latest(&other));
        assert_eq!(other.key(), "item-7");
    }

    #[test]
    fn test_forget_discards_in_flight() {
        let mut sequencer = RequestSequencer::new();
        let ticket = sequencer.issue("picker");
        sequencer.forget("picker");
        assert!(!sequencer.is_latest(&ticket));

        let again = sequencer.issue("picker");
        sequencer.clear();
        assert!(!sequencer.is_latest(&again));
    }
}
