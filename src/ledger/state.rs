use crate::gateway::proposal::{KvRead, KvWrite, ReadWriteSet};
use crate::wallet::SerializedIdentity;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub version: u64,
    pub value: Vec<u8>,
}

/// Committed key/value state. Each value carries the block height that
/// last wrote it, which is what read sets are checked against.
#[derive(Debug, Default)]
pub struct WorldState {
    entries: HashMap<String, VersionedValue>,
}

impl WorldState {
    pub fn get(&self, key: &str) -> Option<&VersionedValue> {
        self.entries.get(key)
    }

    pub fn version(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|v| v.version)
    }

    pub fn put(&mut self, key: &str, value: Vec<u8>, version: u64) {
        self.entries
            .insert(key.to_string(), VersionedValue { version, value });
    }

    /// True when nothing read during simulation has changed since.
    pub fn reads_current(&self, reads: &[KvRead]) -> bool {
        reads.iter().all(|read| self.version(&read.key) == read.version)
    }

    pub fn apply(&mut self, writes: &[KvWrite], version: u64) {
        for write in writes {
            self.put(&write.key, write.value.clone(), version);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Simulation context handed to the contract. Reads go to the committed
/// state and are recorded with their versions; writes are buffered.
pub struct Stub<'w> {
    world: &'w WorldState,
    creator: SerializedIdentity,
    reads: Vec<KvRead>,
    writes: BTreeMap<String, Vec<u8>>,
}

impl<'w> Stub<'w> {
    pub fn new(world: &'w WorldState, creator: SerializedIdentity) -> Self {
        Self {
            world,
            creator,
            reads: Vec::new(),
            writes: BTreeMap::new(),
        }
    }

    pub fn creator(&self) -> &SerializedIdentity {
        &self.creator
    }

    pub fn get_state(&mut self, key: &str) -> Option<Vec<u8>> {
        if let Some(pending) = self.writes.get(key) {
            return Some(pending.clone());
        }
        let current = self.world.get(key);
        if !self.reads.iter().any(|r| r.key == key) {
            self.reads.push(KvRead {
                key: key.to_string(),
                version: current.map(|v| v.version),
            });
        }
        current.map(|v| v.value.clone())
    }

    pub fn put_state(&mut self, key: &str, value: Vec<u8>) {
        self.writes.insert(key.to_string(), value);
    }

    pub fn into_rwset(self) -> ReadWriteSet {
        ReadWriteSet {
            reads: self.reads,
            writes: self
                .writes
                .into_iter()
                .map(|(key, value)| KvWrite { key, value })
                .collect(),
        }
    }
}
