//! Process-local tables used when no database is configured.

use crate::feature::{item::item_repository::Item, user::user_repository::Credentials};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The tables of the memory backend.
#[derive(Clone, Debug, Default)]
pub struct MemoryTables {
    /// Items by id.
    pub(crate) items: BTreeMap<i64, Item>,
    /// The most recently assigned item id.
    pub(crate) last_item_id: i64,
    /// Users by username.
    pub(crate) users: BTreeMap<String, Credentials>,
}

/// A shared handle to the memory tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryDb {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryDb {
    /// Takes exclusive access to the tables until the returned transaction is dropped.
    pub async fn begin(&self) -> MemoryTx {
        let guard = self.tables.clone().lock_owned().await;
        MemoryTx {
            guard,
            staged: None,
        }
    }
}

/// Exclusive access to the memory tables.
///
/// Reads go straight to the locked tables. The first write stages a copy,
/// which is only written back on [`MemoryTx::commit`].
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryTables>,
    staged: Option<MemoryTables>,
}

impl MemoryTx {
    /// The tables as seen by this transaction.
    pub(crate) fn tables(&self) -> &MemoryTables {
        self.staged.as_ref().unwrap_or(&*self.guard)
    }

    /// The staged tables, for writing.
    pub(crate) fn tables_mut(&mut self) -> &mut MemoryTables {
        let guard = &self.guard;
        self.staged.get_or_insert_with(|| MemoryTables::clone(guard))
    }

    /// Publishes the staged tables, if anything was written.
    pub fn commit(self) {
        let MemoryTx { mut guard, staged } = self;
        if let Some(staged) = staged {
            *guard = staged;
        }
    }
}
