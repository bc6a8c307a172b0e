//! Typed attribute keys and values shared by vertices and edges.
//!
//! The key set is open-ended across the two pass families this crate ships
//! (compile-time annotating passes, the runtime skew pass) and more will be
//! added as more passes are, so attributes live in a data-driven map keyed
//! by [`AttributeKey`] rather than a fixed struct of `Option` fields. A
//! pass's declared read-set/write-attribute (see [`crate::pass`]) is exactly
//! the set of `AttributeKey` variants it is permitted to touch.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::physical::HashRange;

/// A typed attribute key. Integer-valued and categorical keys share one
/// closed enum so attribute maps can be keyed uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    /// Edge attribute: one of [`CommunicationPattern`].
    CommunicationPattern,
    /// Edge attribute: opaque decoder factory marker.
    Decoder,
    /// Edge attribute, presence-only: marks a side-input edge.
    SideInput,
    /// Vertex attribute: positive integer parallelism.
    Parallelism,
    /// Physical-layer edge attribute: task index -> key range.
    TaskIndexToKeyRange,
}

/// The closed set of communication patterns an edge may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommunicationPattern {
    OneToOne,
    Broadcast,
    Shuffle,
}

/// An opaque decoder factory marker. The executor interprets the marker; this
/// crate never inspects `custom` beyond equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoder {
    /// "Read bytes without deserialization" — written by
    /// [`crate::pass::LargeShuffleDecoderPass`].
    BytesDecoder,
    /// Any other decoder marker, opaque to this crate.
    Custom(String),
}

/// The value half of an attribute map entry.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    CommunicationPattern(CommunicationPattern),
    Decoder(Decoder),
    /// Presence-only marker (e.g. `SideInput`); the bool is always `true`
    /// when present, entries are simply absent otherwise.
    Flag(bool),
    Parallelism(u32),
    TaskIndexToKeyRange(HashMap<u32, HashRange>),
}

/// Insertion-ordered attribute map. Insertion order is not semantically
/// meaningful for attributes themselves (lookups are by key) but is
/// preserved so that `Debug` output and any future iteration stay
/// deterministic, matching the insertion-ordered discipline the rest of the
/// graph (adjacency sets) relies on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: IndexMap<AttributeKey, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        AttributeMap {
            entries: IndexMap::new(),
        }
    }

    pub fn get(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.entries.get(&key)
    }

    pub fn set(&mut self, key: AttributeKey, value: AttributeValue) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: AttributeKey) -> Option<AttributeValue> {
        self.entries.shift_remove(&key)
    }

    pub fn contains(&self, key: AttributeKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Convenience accessor for [`AttributeKey::CommunicationPattern`].
    pub fn communication_pattern(&self) -> Option<CommunicationPattern> {
        match self.get(AttributeKey::CommunicationPattern) {
            Some(AttributeValue::CommunicationPattern(p)) => Some(*p),
            _ => None,
        }
    }

    /// Convenience accessor for [`AttributeKey::Parallelism`].
    pub fn parallelism(&self) -> Option<u32> {
        match self.get(AttributeKey::Parallelism) {
            Some(AttributeValue::Parallelism(p)) => Some(*p),
            _ => None,
        }
    }

    /// Convenience accessor for [`AttributeKey::SideInput`] presence.
    pub fn has_side_input(&self) -> bool {
        self.contains(AttributeKey::SideInput)
    }

    pub fn set_decoder(&mut self, decoder: Decoder) {
        self.set(AttributeKey::Decoder, AttributeValue::Decoder(decoder));
    }

    pub fn decoder(&self) -> Option<&Decoder> {
        match self.get(AttributeKey::Decoder) {
            Some(AttributeValue::Decoder(d)) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trips() {
        let mut attrs = AttributeMap::new();
        attrs.set(AttributeKey::Parallelism, AttributeValue::Parallelism(4));
        assert_eq!(attrs.parallelism(), Some(4));
    }

    #[test]
    fn missing_key_is_none() {
        let attrs = AttributeMap::new();
        assert_eq!(attrs.parallelism(), None);
        assert!(!attrs.has_side_input());
    }

    #[test]
    fn remove_clears_entry() {
        let mut attrs = AttributeMap::new();
        attrs.set(AttributeKey::SideInput, AttributeValue::Flag(true));
        assert!(attrs.has_side_input());
        attrs.remove(AttributeKey::SideInput);
        assert!(!attrs.has_side_input());
    }
}
