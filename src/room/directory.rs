//! Lookup of collaborator-supplied room records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::RoomId;

/// A persistent room record, as supplied by the hosting system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomRecord {
    pub id: RoomId,
    pub initial_temp: f64,
    #[serde(default)]
    pub stay_id: Option<String>,
}

/// Source of room identity data, consulted once when a room is first referenced.
pub trait RoomDirectory {
    /// Rest temperature of `id`, if the room is known.
    fn initial_temp(&self, id: &RoomId) -> Option<f64>;

    /// Stay tag to attach to the room's ledger segments.
    fn stay_id(&self, id: &RoomId) -> Option<String>;
}

/// In-memory directory built from a fixed list of records.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    records: BTreeMap<RoomId, RoomRecord>,
}

impl StaticDirectory {
    pub fn new(records: impl IntoIterator<Item = RoomRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RoomDirectory for StaticDirectory {
    fn initial_temp(&self, id: &RoomId) -> Option<f64> {
        self.records.get(id).map(|r| r.initial_temp)
    }

    fn stay_id(&self, id: &RoomId) -> Option<String> {
        self.records.get(id).and_then(|r| r.stay_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_rooms_only() {
        let dir = StaticDirectory::new([RoomRecord {
            id: RoomId::from("101"),
            initial_temp: 32.0,
            stay_id: Some("s1".into()),
        }]);
        assert_eq!(dir.initial_temp(&RoomId::from("101")), Some(32.0));
        assert_eq!(dir.stay_id(&RoomId::from("101")).as_deref(), Some("s1"));
        assert_eq!(dir.initial_temp(&RoomId::from("999")), None);
        assert_eq!(dir.len(), 1);
    }
}
