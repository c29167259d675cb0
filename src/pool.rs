//! Bounded pool of [`Connection`]s guarded by a single async mutex.
//!
//! `locked()` hands out a free connection for the scope of a guard, or, while
//! the pool has spare capacity, opens a new one. Once capacity is exhausted,
//! callers wait on a `Notify` that's woken as soon as a connection is
//! returned rather than polling on a fixed interval.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::connection::{Connection, DriverParams};
use crate::error::Result;
use crate::statement::{Params, Projected, Row};

/// Pool capacity.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_size: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig { max_size: 4 }
    }
}

/// `connection` is `None` exactly while the slot is checked out: the entry
/// itself stays in `slots` (flagged `in_use`) so its id counts toward the
/// pool's total size even though the connection has been handed to a guard.
struct Slot {
    connection: Option<Connection>,
    in_use: bool,
}

struct Inner {
    driver_name: &'static str,
    auto_commit: bool,
    slots: Mutex<HashMap<u64, Slot>>,
    next_id: AtomicU64,
    max_size: u32,
    notify: Notify,
}

/// A bounded multiplexer over several [`Connection`]s, all sharing the same
/// driver/params. `locked()` hands out a scoped, exclusive guard; the
/// convenience methods each run their statement under one such scope.
pub struct SafePool {
    inner: Arc<Inner>,
    params_factory: Arc<dyn Fn() -> DriverParams + Send + Sync>,
}

/// RAII guard returned by [`SafePool::locked`]. The connection is marked free
/// again on drop, including on an early return or panic unwind.
pub struct PoolGuard {
    inner: Arc<Inner>,
    id: u64,
    connection: Option<Connection>,
}

impl std::ops::Deref for PoolGuard {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.connection.as_ref().expect("connection present until drop")
    }
}

impl std::ops::DerefMut for PoolGuard {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection.as_mut().expect("connection present until drop")
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        let connection = self.connection.take().expect("connection present until drop");
        let inner = self.inner.clone();
        let id = self.id;
        tokio::spawn(async move {
            let mut slots = inner.slots.lock().await;
            if let Some(slot) = slots.get_mut(&id) {
                slot.connection = Some(connection);
                slot.in_use = false;
            }
            drop(slots);
            inner.notify.notify_one();
        });
    }
}

impl SafePool {
    pub fn new(
        driver_name: &'static str,
        auto_commit: bool,
        config: PoolConfig,
        params_factory: impl Fn() -> DriverParams + Send + Sync + 'static,
    ) -> Self {
        SafePool {
            inner: Arc::new(Inner {
                driver_name,
                auto_commit,
                slots: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                max_size: config.max_size.max(1),
                notify: Notify::new(),
            }),
            params_factory: Arc::new(params_factory),
        }
    }

    /// Acquisition policy: (1) hand back any free connection; (2) if there is
    /// spare capacity, reserve a slot and open a new one; (3) otherwise wait
    /// to be woken by a connection being released. The slot count (not the
    /// free-connection count) is what's bounded by `max_size`, so a checked-out
    /// connection still counts against capacity.
    pub async fn locked(&self) -> Result<PoolGuard> {
        loop {
            let reserved_id = {
                let mut slots = self.inner.slots.lock().await;
                if let Some((&id, slot)) = slots.iter_mut().find(|(_, s)| !s.in_use) {
                    slot.in_use = true;
                    let connection = slot.connection.take().expect("free slot holds a connection");
                    return Ok(PoolGuard { inner: self.inner.clone(), id, connection: Some(connection) });
                }

                if slots.len() as u32 >= self.inner.max_size {
                    None
                } else {
                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    slots.insert(id, Slot { connection: None, in_use: true });
                    Some(id)
                }
            };

            let Some(id) = reserved_id else {
                self.inner.notify.notified().await;
                continue;
            };

            let params = (self.params_factory)();
            match Connection::connect(self.inner.driver_name, params, self.inner.auto_commit).await {
                Ok(connection) => {
                    return Ok(PoolGuard { inner: self.inner.clone(), id, connection: Some(connection) });
                }
                Err(e) => {
                    self.inner.slots.lock().await.remove(&id);
                    self.inner.notify.notify_one();
                    return Err(e);
                }
            }
        }
    }

    pub async fn query(&self, sql: &str, params: Params) -> Result<Vec<Row>> {
        let mut conn = self.locked().await?;
        conn.query(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: Params) -> Result<u64> {
        let mut conn = self.locked().await?;
        conn.execute(sql, params).await
    }

    pub async fn fetch(&self, sql: &str, params: Params) -> Result<Option<Projected>> {
        let mut conn = self.locked().await?;
        conn.fetch(sql, params).await
    }

    pub async fn fetch_all(&self, sql: &str, params: Params) -> Result<Vec<Projected>> {
        let mut conn = self.locked().await?;
        conn.fetch_all(sql, params).await
    }

    pub async fn fetch_column(&self, sql: &str, params: Params, column_index: usize) -> Result<Option<crate::statement::Value>> {
        let mut conn = self.locked().await?;
        conn.fetch_column(sql, params, column_index).await
    }

    pub async fn transaction<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut conn = self.locked().await?;
        conn.transaction(body).await
    }

    pub async fn insert(&self, table: &str, values: HashMap<String, crate::statement::Value>) -> Result<i64> {
        let mut conn = self.locked().await?;
        conn.insert(table, values).await
    }

    pub async fn update(
        &self,
        table: &str,
        values: HashMap<String, crate::statement::Value>,
        identifier: HashMap<String, crate::statement::Value>,
    ) -> Result<u64> {
        let mut conn = self.locked().await?;
        conn.update(table, values, identifier).await
    }

    pub async fn delete(&self, table: &str, identifier: HashMap<String, crate::statement::Value>) -> Result<u64> {
        let mut conn = self.locked().await?;
        conn.delete(table, identifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::sqlite::SqliteParams;

    fn sqlite_pool(max_size: u32) -> SafePool {
        SafePool::new("sqlite", true, PoolConfig { max_size }, || DriverParams::Sqlite(SqliteParams::default()))
    }

    #[tokio::test]
    async fn checked_out_connections_count_toward_capacity() {
        let pool = sqlite_pool(1);
        let guard = pool.locked().await.unwrap();

        let blocked = tokio::time::timeout(std::time::Duration::from_millis(100), pool.locked()).await;
        assert!(blocked.is_err(), "locked() must block while the only slot is checked out");

        drop(guard);
        let unblocked = tokio::time::timeout(std::time::Duration::from_millis(200), pool.locked()).await;
        assert!(unblocked.is_ok(), "locked() must resolve once the slot is released");
    }

    #[tokio::test]
    async fn never_exceeds_max_size_under_contention() {
        let pool = Arc::new(sqlite_pool(2));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let guard = pool.locked().await.unwrap();
                tokio::task::yield_now().await;
                drop(guard);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(pool.inner.slots.lock().await.len(), 2);
    }
}
