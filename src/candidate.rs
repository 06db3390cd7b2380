//! Candidate points of interest and the directory that owns them.
//!
//! The directory is an external collaborator: it keeps the live collection and pushes
//! changes to subscribers. Corridor search only ever works on a [`CandidateDirectory::snapshot`].

use crate::GeoPoint;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Named capability flags a candidate can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Has spaces for large trucks
    LargeVehicle,
    Shower,
    Toilet,
    ConvenienceStore,
    Restaurant,
    Laundry,
    VendingMachine,
    Wifi,
    ElectricOutlet,
    GasStation,
    TirePressure,
    TruckWash,
    SleepingArea,
    /// Camper vans allowed (campgrounds)
    CamperVan,
    DogRun,
    Open24Hours,
}

/// A point of interest tested against the corridor and capability filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Directory identity; results are deduplicated on it
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            capabilities: BTreeSet::new(),
        }
    }

    /// Builder-style capability setter.
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// True if every required capability is present.
    pub fn has_all(&self, required: &BTreeSet<Capability>) -> bool {
        required.is_subset(&self.capabilities)
    }
}

/// Callback invoked with the full candidate list after every change.
pub type ChangeCallback = Arc<dyn Fn(&[Candidate]) + Send + Sync>;

/// A readable, observable collection of candidates.
pub trait CandidateDirectory: Send + Sync {
    /// The current candidates.
    fn snapshot(&self) -> Vec<Candidate>;

    /// Register for change notifications. The callback fires immediately with the
    /// current snapshot, then after every change until the subscription ends.
    fn subscribe(&self, on_change: ChangeCallback) -> Subscription;
}

/// Handle for an active subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<HashMap<u64, ChangeCallback>>>,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).remove(&self.id);
            debug!("[Directory] Subscription {} closed", self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// In-memory directory, ordered by insertion.
#[derive(Default)]
pub struct InMemoryDirectory {
    candidates: Mutex<Vec<Candidate>>,
    listeners: Arc<Mutex<HashMap<u64, ChangeCallback>>>,
    next_id: AtomicU64,
}

impl InMemoryDirectory {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: Mutex::new(candidates),
            ..Default::default()
        }
    }

    /// Replace the whole collection.
    pub fn replace_all(&self, candidates: Vec<Candidate>) {
        let snapshot = {
            let mut current = lock(&self.candidates);
            *current = candidates;
            current.clone()
        };
        self.notify(&snapshot);
    }

    /// Insert a candidate, or replace the one with the same id in place.
    pub fn upsert(&self, candidate: Candidate) {
        let snapshot = {
            let mut current = lock(&self.candidates);
            match current.iter_mut().find(|c| c.id == candidate.id) {
                Some(existing) => *existing = candidate,
                None => current.push(candidate),
            }
            current.clone()
        };
        self.notify(&snapshot);
    }

    /// Remove by id. Returns false if no such candidate existed.
    pub fn remove(&self, id: &str) -> bool {
        let snapshot = {
            let mut current = lock(&self.candidates);
            let before = current.len();
            current.retain(|c| c.id != id);
            if current.len() == before {
                return false;
            }
            current.clone()
        };
        self.notify(&snapshot);
        true
    }

    fn notify(&self, snapshot: &[Candidate]) {
        // Call outside the lock so callbacks may unsubscribe
        let callbacks: Vec<ChangeCallback> = lock(&self.listeners).values().cloned().collect();
        debug!(
            "[Directory] Notifying {} subscribers ({} candidates)",
            callbacks.len(),
            snapshot.len()
        );
        for cb in callbacks {
            cb(snapshot);
        }
    }
}

impl CandidateDirectory for InMemoryDirectory {
    fn snapshot(&self) -> Vec<Candidate> {
        lock(&self.candidates).clone()
    }

    fn subscribe(&self, on_change: ChangeCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, Arc::clone(&on_change));
        on_change(&self.snapshot());

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }
}

/// Lock, recovering the data if a subscriber panicked while it was held.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn lot(id: &str) -> Candidate {
        Candidate::new(id, format!("Lot {}", id), GeoPoint::new(34.5, 133.0))
    }

    #[test]
    fn test_capabilities() {
        let c = lot("a").with_capabilities([Capability::Shower, Capability::LargeVehicle]);
        assert!(c.has(Capability::Shower));
        assert!(!c.has(Capability::Wifi));

        let mut required = BTreeSet::new();
        assert!(c.has_all(&required));
        required.insert(Capability::Shower);
        assert!(c.has_all(&required));
        required.insert(Capability::Wifi);
        assert!(!c.has_all(&required));
    }

    #[test]
    fn test_candidate_deserialize() {
        let json = r#"{
            "id": "sa-01",
            "name": "Miyajima SA",
            "location": {"latitude": 34.31, "longitude": 132.30},
            "capabilities": ["largeVehicle", "convenienceStore", "open24Hours"]
        }"#;
        let c: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.id, "sa-01");
        assert!(c.has(Capability::ConvenienceStore));
        assert!(c.has(Capability::Open24Hours));
        assert_eq!(c.capabilities.len(), 3);

        let bare: Candidate = serde_json::from_str(
            r#"{"id": "x", "name": "x", "location": {"latitude": 0.0, "longitude": 0.0}}"#,
        )
        .unwrap();
        assert!(bare.capabilities.is_empty());
    }

    #[test]
    fn test_directory_snapshot_and_mutations() {
        let dir = InMemoryDirectory::new(vec![lot("a"), lot("b")]);
        assert_eq!(dir.snapshot().len(), 2);

        let mut renamed = lot("a");
        renamed.name = "Renamed".to_string();
        dir.upsert(renamed);
        dir.upsert(lot("c"));

        let snap = dir.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].name, "Renamed");
        assert_eq!(snap[2].id, "c");

        assert!(dir.remove("b"));
        assert!(!dir.remove("b"));
        assert_eq!(dir.snapshot().len(), 2);
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let dir = InMemoryDirectory::new(vec![lot("a")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let last_len = Arc::new(AtomicUsize::new(0));

        let sub = {
            let calls = Arc::clone(&calls);
            let last_len = Arc::clone(&last_len);
            dir.subscribe(Arc::new(move |lots: &[Candidate]| {
                calls.fetch_add(1, Ordering::SeqCst);
                last_len.store(lots.len(), Ordering::SeqCst);
            }))
        };

        // Initial snapshot delivered on subscribe
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_len.load(Ordering::SeqCst), 1);

        dir.upsert(lot("b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(last_len.load(Ordering::SeqCst), 2);

        sub.unsubscribe();
        dir.replace_all(vec![]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscription_outliving_directory() {
        let dir = InMemoryDirectory::new(vec![]);
        let sub = dir.subscribe(Arc::new(|_: &[Candidate]| {}));
        drop(dir);
        drop(sub);
    }
}
