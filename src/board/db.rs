use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, params};

use super::models::*;
use crate::ordering::key::insertion_key_with;
use crate::ordering::{OrderStore, OrderedItem, OrderingPolicy};

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Used during startup and
    /// in CLI commands that run outside the server.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, BoardDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

fn parse_item_id(item_id: &str) -> Result<i64> {
    item_id
        .parse::<i64>()
        .with_context(|| format!("Invalid item id: {}", item_id))
}

#[async_trait]
impl OrderStore for DbHandle {
    async fn list_items(&self, collection: &str) -> Result<Vec<OrderedItem>> {
        let collection = collection.to_string();
        let items = self.call(move |db| db.list_items(&collection)).await?;
        Ok(items.iter().map(Item::to_ordered).collect())
    }

    async fn update_sort_key(&self, collection: &str, item_id: &str, key: f64) -> Result<()> {
        let id = parse_item_id(item_id)?;
        let collection = collection.to_string();
        self.call(move |db| {
            if !db.set_sort_key(&collection, id, key)? {
                anyhow::bail!("Item {} not found in {}", id, collection);
            }
            Ok(())
        })
        .await
    }

    async fn update_sort_keys(&self, collection: &str, writes: &[(String, f64)]) -> Result<()> {
        let writes = writes
            .iter()
            .map(|(id, key)| Ok((parse_item_id(id)?, *key)))
            .collect::<Result<Vec<_>>>()?;
        let collection = collection.to_string();
        self.call(move |db| db.set_sort_keys(&collection, &writes))
            .await
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

pub struct BoardDb {
    conn: Connection,
    policy: OrderingPolicy,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self {
            conn,
            policy: OrderingPolicy::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Raw connection, for tests that install triggers.
    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self {
            conn,
            policy: OrderingPolicy::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Policy used to place appended items.
    pub fn with_policy(mut self, policy: OrderingPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn init(&self) -> Result<()> {
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    collection TEXT NOT NULL,
                    title TEXT NOT NULL,
                    sort_key REAL NOT NULL DEFAULT 100000,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection, sort_key);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Item CRUD ─────────────────────────────────────────────────────

    /// Insert an item. Without an explicit key it goes after the current
    /// last item, or at the default key in an empty collection.
    pub fn create_item(&self, collection: &str, title: &str, sort_key: Option<f64>) -> Result<Item> {
        let sort_key = match sort_key {
            Some(k) => k,
            None => {
                let max_key: Option<f64> = self
                    .conn
                    .query_row(
                        "SELECT MAX(sort_key) FROM items WHERE collection = ?1",
                        params![collection],
                        |row| row.get(0),
                    )
                    .context("Failed to get max sort key")?;
                insertion_key_with(
                    max_key,
                    None,
                    self.policy.append_gap,
                    self.policy.default_key,
                )
            }
        };

        self.conn
            .execute(
                "INSERT INTO items (collection, title, sort_key) VALUES (?1, ?2, ?3)",
                params![collection, title, sort_key],
            )
            .context("Failed to insert item")?;
        let id = self.conn.last_insert_rowid();
        self.get_item(id)?.context("Item not found after insert")
    }

    /// Items of one collection, ascending by key; equal keys by id.
    pub fn list_items(&self, collection: &str) -> Result<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, collection, title, sort_key, created_at, updated_at
                 FROM items WHERE collection = ?1 ORDER BY sort_key, id",
            )
            .context("Failed to prepare list_items")?;
        let rows = stmt
            .query_map(params![collection], row_to_item)
            .context("Failed to query items")?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row.context("Failed to read item row")?);
        }
        Ok(items)
    }

    pub fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, collection, title, sort_key, created_at, updated_at
                 FROM items WHERE id = ?1",
            )
            .context("Failed to prepare get_item")?;
        let mut rows = stmt
            .query_map(params![id], row_to_item)
            .context("Failed to query item")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read item row")?)),
            None => Ok(None),
        }
    }

    /// Returns false when no item with `id` exists in `collection`.
    pub fn set_sort_key(&self, collection: &str, id: i64, sort_key: f64) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE items SET sort_key = ?1, updated_at = datetime('now')
                 WHERE id = ?2 AND collection = ?3",
                params![sort_key, id, collection],
            )
            .context("Failed to update sort key")?;
        Ok(count > 0)
    }

    /// Write several keys atomically. Fails without changes if any id is
    /// missing from the collection.
    pub fn set_sort_keys(&self, collection: &str, writes: &[(i64, f64)]) -> Result<()> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        for (id, key) in writes {
            let count = tx
                .execute(
                    "UPDATE items SET sort_key = ?1, updated_at = datetime('now')
                     WHERE id = ?2 AND collection = ?3",
                    params![key, id, collection],
                )
                .context("Failed to update sort key")?;
            if count == 0 {
                anyhow::bail!("Item {} not found in {}", id, collection);
            }
        }
        tx.commit().context("Failed to commit sort keys")?;
        Ok(())
    }

    pub fn delete_item(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1", params![id])
            .context("Failed to delete item")?;
        Ok(count > 0)
    }

    pub fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT collection, COUNT(*) FROM items GROUP BY collection ORDER BY collection",
            )
            .context("Failed to prepare list_collections")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CollectionSummary {
                    name: row.get(0)?,
                    item_count: row.get(1)?,
                })
            })
            .context("Failed to query collections")?;
        let mut collections = Vec::new();
        for row in rows {
            collections.push(row.context("Failed to read collection row")?);
        }
        Ok(collections)
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        collection: row.get(1)?,
        title: row.get(2)?,
        sort_key: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
