//! Per-tile mutual exclusion.
//!
//! Entries are created on first use and pruned when the last guard for a tile
//! is released with nobody else waiting on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug)]
struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Callers holding or waiting for this tile
    interested: usize,
}

type LockTable = Mutex<HashMap<i32, Slot>>;

#[derive(Debug, Default)]
pub struct TileLocks {
    table: Arc<LockTable>,
}

/// Held for the duration of one read-modify-persist on a tile
#[derive(Debug)]
pub struct TileGuard {
    // Field order matters: the mutex is released before the interest is dropped
    _guard: OwnedMutexGuard<()>,
    interest: Interest,
}

/// One caller's claim on a tile entry. Dropping the last claim prunes the
/// entry, whether the caller got the lock or gave up waiting for it.
#[derive(Debug)]
struct Interest {
    tile: i32,
    table: Arc<LockTable>,
}

impl TileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `tile`
    pub async fn lock(&self, tile: i32) -> TileGuard {
        let (interest, mutex) = Interest::register(&self.table, tile);
        let guard = mutex.lock_owned().await;
        TileGuard {
            _guard: guard,
            interest,
        }
    }

    /// Tiles with a live lock entry
    pub fn len(&self) -> usize {
        entry_table(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TileGuard {
    pub fn tile(&self) -> i32 {
        self.interest.tile
    }
}

impl Interest {
    fn register(table: &Arc<LockTable>, tile: i32) -> (Self, Arc<AsyncMutex<()>>) {
        let mut entries = entry_table(table);
        let slot = entries.entry(tile).or_insert_with(|| Slot {
            mutex: Arc::new(AsyncMutex::new(())),
            interested: 0,
        });
        slot.interested += 1;
        let mutex = Arc::clone(&slot.mutex);
        drop(entries);

        let interest = Self {
            tile,
            table: Arc::clone(table),
        };
        (interest, mutex)
    }
}

impl Drop for Interest {
    fn drop(&mut self) {
        let mut entries = entry_table(&self.table);
        let Some(slot) = entries.get_mut(&self.tile) else {
            return;
        };
        slot.interested = slot.interested.saturating_sub(1);
        if slot.interested == 0 {
            entries.remove(&self.tile);
        }
    }
}

fn entry_table(table: &LockTable) -> MutexGuard<'_, HashMap<i32, Slot>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}
