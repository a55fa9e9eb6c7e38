//! Cache-owning refresh coordinator.
//!
//! # Design
//! The coordinator owns the only mutable state in the engine: the list
//! catalogue (fetched at most once per process lifetime) and the entries
//! per list (fully rebuilt on every successful poll). Refreshes are
//! single-flight — a caller arriving while a cycle is in flight waits for
//! it and, if that cycle committed, takes its snapshot instead of starting
//! another round of fetches. A failed cycle never touches the cache: the
//! last known good snapshot stays visible until a later cycle succeeds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::client::ZenkitClient;
use crate::error::Error;
use crate::fields;
use crate::types::{List, NormalizedItem, Record};

/// Poll cadence of the scheduled refresh.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// The consumer-visible copy of the committed cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Lists in service order, fixed after the first successful discovery.
    pub lists: Vec<List>,
    /// Entries per list short id, from the most recent successful cycle.
    pub entries_by_list: HashMap<String, Vec<Record>>,
}

#[derive(Default)]
struct Cache {
    lists: Option<Vec<List>>,
    entries: HashMap<String, Vec<Record>>,
}

/// Serializes refresh cycles and owns the cached snapshot.
pub struct Coordinator {
    pub(crate) client: ZenkitClient,
    cache: Mutex<Cache>,
    refresh_gate: Mutex<()>,
    committed_cycles: AtomicU64,
}

impl Coordinator {
    pub fn new(client: ZenkitClient) -> Self {
        Self {
            client,
            cache: Mutex::new(Cache::default()),
            refresh_gate: Mutex::new(()),
            committed_cycles: AtomicU64::new(0),
        }
    }

    /// Run one refresh cycle and return the resulting snapshot.
    ///
    /// Lists are discovered once: the first successful `get_lists` is kept
    /// for the process lifetime, even when the same cycle later fails on
    /// entries. A failure on any single list aborts the whole cycle with
    /// `Error::UpdateFailed` naming that list, and the committed entries
    /// are left exactly as they were.
    pub fn refresh(&self) -> Result<Snapshot, Error> {
        let waited_from = self.committed_cycles.load(Ordering::Acquire);
        let _gate = self
            .refresh_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // A cycle committed while we were waiting for the gate; its
        // snapshot is as fresh as one we would fetch ourselves.
        if self.committed_cycles.load(Ordering::Acquire) > waited_from {
            return Ok(self.snapshot());
        }

        let lists = match self.known_lists() {
            Some(lists) => lists,
            None => self.discover_lists()?,
        };

        let mut entries_by_list = HashMap::with_capacity(lists.len());
        for list in &lists {
            let entries = self.client.get_list_entries(&list.short_id).map_err(|err| {
                Error::UpdateFailed(format!(
                    "failed to fetch entries for list {}: {err}",
                    list.short_id
                ))
            })?;
            entries_by_list.insert(list.short_id.clone(), entries);
        }

        let snapshot = Snapshot {
            lists,
            entries_by_list,
        };
        self.commit(&snapshot);
        debug!("refresh cycle committed for {} lists", snapshot.lists.len());
        Ok(snapshot)
    }

    /// Fetch the list catalogue and store it immediately, so the catalogue
    /// survives a later entries failure in the same cycle. The entries map
    /// stays untouched here; an empty map is consistent with known lists.
    fn discover_lists(&self) -> Result<Vec<List>, Error> {
        let lists = self
            .client
            .get_lists()
            .map_err(|err| Error::UpdateFailed(format!("failed to fetch lists: {err}")))?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lists = Some(lists.clone());
        Ok(lists)
    }

    fn commit(&self, snapshot: &Snapshot) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.lists = Some(snapshot.lists.clone());
        cache.entries = snapshot.entries_by_list.clone();
        drop(cache);
        self.committed_cycles.fetch_add(1, Ordering::Release);
    }

    fn known_lists(&self) -> Option<Vec<List>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lists
            .clone()
    }

    /// The most recently committed snapshot. Never blocks on an in-flight
    /// refresh; before the first successful cycle this is empty.
    pub fn snapshot(&self) -> Snapshot {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            lists: cache.lists.clone().unwrap_or_default(),
            entries_by_list: cache.entries.clone(),
        }
    }

    /// Normalized items of one list, derived from the committed snapshot.
    pub fn list_items(&self, list_short_id: &str) -> Vec<NormalizedItem> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entries
            .get(list_short_id)
            .map(|records| records.iter().filter_map(fields::normalize).collect())
            .unwrap_or_default()
    }

    /// Refresh triggered after a mutation. Failures here are logged and
    /// swallowed: the mutation outcome has already been decided and the
    /// scheduled poll will retry the fetch anyway.
    pub(crate) fn refresh_after_mutation(&self) {
        if let Err(err) = self.refresh() {
            warn!("post-mutation refresh failed: {err}");
        }
    }
}

/// Handle for the background poll loop. Dropping it stops the loop and
/// joins the thread; an in-flight cycle is allowed to finish first.
pub struct Poller {
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Poller {
    /// Refresh `coordinator` every `UPDATE_INTERVAL` until dropped.
    pub fn spawn(coordinator: Arc<Coordinator>) -> Self {
        Self::spawn_with_interval(coordinator, UPDATE_INTERVAL)
    }

    pub fn spawn_with_interval(coordinator: Arc<Coordinator>, interval: Duration) -> Self {
        let shutdown = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_shutdown = Arc::clone(&shutdown);
        let handle = thread::spawn(move || loop {
            match coordinator.refresh() {
                Ok(snapshot) => debug!("scheduled refresh done, {} lists", snapshot.lists.len()),
                Err(err) => warn!("scheduled refresh failed, retrying next cycle: {err}"),
            }

            let (stopped, signal) = &*thread_shutdown;
            let mut stopped = stopped.lock().unwrap_or_else(PoisonError::into_inner);
            while !*stopped {
                let (guard, timeout) = signal
                    .wait_timeout(stopped, interval)
                    .unwrap_or_else(PoisonError::into_inner);
                stopped = guard;
                if timeout.timed_out() {
                    break;
                }
            }
            if *stopped {
                return;
            }
        });
        Self {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let (stopped, signal) = &*self.shutdown;
        *stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
