use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::session::Session;
use crate::radio::interface::{ConState, DisconnectInfo, RatFamily};
use crate::storage::config::{MdcConfig, SlotRange};
use crate::storage::profile::ProfileData;

/// Everything the manager knows about one slot.
#[derive(Debug, Default)]
pub(crate) struct SlotRecord {
    pub data: ProfileData,
    pub state: ConState,
    pub session: Option<Session>,
    pub last_disconnect: DisconnectInfo,
}

/// One profile slot.
///
/// `record` is only ever locked for short, synchronous reads and commits so
/// that listener contexts can read it at any time. `transition` serializes
/// the multi-step sequences (guard check, radio RPC, commit) per slot.
#[derive(Debug)]
pub(crate) struct Slot {
    pub index: u32,
    pub transition: tokio::sync::Mutex<()>,
    record: Mutex<SlotRecord>,
}

impl Slot {
    fn new(index: u32, data: ProfileData) -> Self {
        Self {
            index,
            transition: tokio::sync::Mutex::new(()),
            record: Mutex::new(SlotRecord {
                data,
                ..SlotRecord::default()
            }),
        }
    }

    pub fn record(&self) -> MutexGuard<'_, SlotRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-capacity table of profile slots, keyed by index.
///
/// Slots are materialized on first access with the content the radio reports
/// for that index; afterwards the store is the read path and setters write
/// through to the radio before updating it.
#[derive(Debug)]
pub struct ProfileStore {
    gsm: SlotRange,
    cdma: SlotRange,
    slots: Mutex<BTreeMap<u32, Arc<Slot>>>,
}

impl ProfileStore {
    pub fn new(config: &MdcConfig) -> Self {
        Self {
            gsm: config.gsm_profiles,
            cdma: config.cdma_profiles,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, BTreeMap<u32, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains_index(&self, index: u32) -> bool {
        self.gsm.contains(index) || self.cdma.contains(index)
    }

    /// Every valid index, GSM range first, each in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = u32> {
        self.gsm.indices().chain(self.cdma.indices())
    }

    /// Slot that backs the default profile for a technology family.
    pub fn default_index(&self, family: RatFamily) -> u32 {
        match family {
            RatFamily::Gsm => self.gsm.first,
            RatFamily::Cdma => self.cdma.first,
        }
    }

    pub(crate) fn slot(&self, index: u32) -> Option<Arc<Slot>> {
        self.slots().get(&index).cloned()
    }

    /// Insert a freshly read slot. If a concurrent caller got there first the
    /// existing slot wins, so handles to one index always share a slot.
    pub(crate) fn materialize(&self, index: u32, data: ProfileData) -> Arc<Slot> {
        self.slots()
            .entry(index)
            .or_insert_with(|| Arc::new(Slot::new(index, data)))
            .clone()
    }

    pub fn loaded_count(&self) -> usize {
        self.slots().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::profile::PdpType;

    #[test]
    fn default_index_follows_technology_family() {
        let store = ProfileStore::new(&MdcConfig::default());
        assert_eq!(store.default_index(RatFamily::Gsm), 1);
        assert_eq!(store.default_index(RatFamily::Cdma), 101);
    }

    #[test]
    fn indices_cover_gsm_then_cdma_in_order() {
        let store = ProfileStore::new(&MdcConfig::default());
        let indices: Vec<u32> = store.indices().collect();
        assert_eq!(indices.first(), Some(&1));
        assert_eq!(indices.last(), Some(&107));
        assert_eq!(indices.len(), 16 + 7);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(!store.contains_index(0));
        assert!(!store.contains_index(17));
    }

    #[test]
    fn first_materialization_wins() {
        let store = ProfileStore::new(&MdcConfig::default());
        let first = store.materialize(3, ProfileData::new("first", PdpType::Ipv4));
        let second = store.materialize(3, ProfileData::new("second", PdpType::Ipv6));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.record().data.apn, "first");
        assert_eq!(store.loaded_count(), 1);
    }
}
