//! Per-address connection pool.
//!
//! One [`AddressPool`] per remote address, held in a [`DashMap`] so
//! `acquire`/`release` against unrelated addresses never serialize on a
//! single lock. Idle connections sit in a [`SegQueue`] (a FIFO free list);
//! a [`moka::sync::Cache`] with a `time_to_idle` tracks which of them are
//! still fresh, so a connection that has sat idle past `idle_timeout` is
//! closed instead of handed back out. Popping from the FIFO also gives the
//! "reuse oldest, evict newest-over-budget" policy needed once a pool hits
//! `max_connections`.
//!
//! `open_count` tracks only idle connections; `checked_out` tracks ones
//! currently in a caller's hands. Their sum is `live_count`, the figure
//! [`crate::client::StorageClient::acquire`] checks against
//! `max_connections` before dialing a new socket. A `release` past that
//! budget is reaped from the idle side; a caller that finds the pool
//! already at budget waits on `released` instead of growing it further.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use moka::sync::Cache;
use tokio::net::TcpStream;
use tokio::sync::Notify;

struct PooledConnection {
    id: u64,
    stream: TcpStream,
}

struct AddressPool {
    idle: SegQueue<PooledConnection>,
    freshness: Cache<u64, ()>,
    next_id: AtomicU64,
    open_count: AtomicUsize,
    checked_out: AtomicUsize,
    max_connections: usize,
    released: Notify,
}

impl AddressPool {
    fn new(max_connections: usize, idle_timeout: Duration) -> Self {
        AddressPool {
            idle: SegQueue::new(),
            freshness: Cache::builder().time_to_idle(idle_timeout).build(),
            next_id: AtomicU64::new(1),
            open_count: AtomicUsize::new(0),
            checked_out: AtomicUsize::new(0),
            max_connections,
            released: Notify::new(),
        }
    }

    fn take(&self) -> Option<TcpStream> {
        while let Some(conn) = self.idle.pop() {
            if self.freshness.contains_key(&conn.id) {
                self.freshness.invalidate(&conn.id);
                self.open_count.fetch_sub(1, Ordering::AcqRel);
                self.checked_out.fetch_add(1, Ordering::AcqRel);
                return Some(conn.stream);
            }
            self.open_count.fetch_sub(1, Ordering::AcqRel);
        }
        None
    }

    fn release(&self, stream: TcpStream) {
        self.checked_out.fetch_sub(1, Ordering::AcqRel);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.freshness.insert(id, ());
        self.open_count.fetch_add(1, Ordering::AcqRel);
        self.idle.push(PooledConnection { id, stream });

        while self.open_count.load(Ordering::Acquire) > self.max_connections.max(1) {
            match self.idle.pop() {
                Some(evicted) => {
                    self.freshness.invalidate(&evicted.id);
                    self.open_count.fetch_sub(1, Ordering::AcqRel);
                }
                None => break,
            }
        }

        self.released.notify_one();
    }

    /// Drops a connection that failed mid-use without returning it to the
    /// idle list, so its slot in `live_count` is freed for the next caller.
    fn discard(&self) {
        self.checked_out.fetch_sub(1, Ordering::AcqRel);
        self.released.notify_one();
    }

    fn mark_checked_out(&self) {
        self.checked_out.fetch_add(1, Ordering::AcqRel);
    }

    fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Acquire)
    }

    fn live_count(&self) -> usize {
        self.open_count.load(Ordering::Acquire) + self.checked_out.load(Ordering::Acquire)
    }

    async fn wait_for_release(&self) {
        self.released.notified().await;
    }
}

/// Pool of idle connections, keyed by remote address.
pub struct ConnectionPool {
    addresses: DashMap<SocketAddr, Arc<AddressPool>>,
    max_connections: usize,
    idle_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(max_connections: usize, idle_timeout: Duration) -> Self {
        ConnectionPool { addresses: DashMap::new(), max_connections, idle_timeout }
    }

    fn address_pool(&self, addr: SocketAddr) -> Arc<AddressPool> {
        self.addresses.entry(addr).or_insert_with(|| Arc::new(AddressPool::new(self.max_connections, self.idle_timeout))).clone()
    }

    /// Takes an idle, still-fresh connection for `addr`, if one is queued.
    pub fn try_take(&self, addr: SocketAddr) -> Option<TcpStream> {
        self.addresses.get(&addr)?.take()
    }

    /// Returns a connection to the pool for reuse.
    pub fn release(&self, addr: SocketAddr, stream: TcpStream) {
        self.address_pool(addr).release(stream);
    }

    /// Drops a connection that broke mid-use, freeing its `live_count` slot
    /// without handing it back out.
    pub fn discard(&self, addr: SocketAddr) {
        if let Some(pool) = self.addresses.get(&addr) {
            pool.discard();
        }
    }

    /// Marks a freshly dialed connection as checked out, so it counts
    /// toward `live_count` until it is released or discarded.
    pub fn mark_checked_out(&self, addr: SocketAddr) {
        self.address_pool(addr).mark_checked_out();
    }

    /// Number of idle connections currently held (not yet reaped) for `addr`.
    pub fn open_count(&self, addr: SocketAddr) -> usize {
        self.addresses.get(&addr).map(|p| p.open_count()).unwrap_or(0)
    }

    /// Idle plus checked-out connections for `addr`: the figure capped by
    /// `max_connections`.
    pub fn live_count(&self, addr: SocketAddr) -> usize {
        self.addresses.get(&addr).map(|p| p.live_count()).unwrap_or(0)
    }

    /// Waits until a connection for `addr` is released or discarded.
    pub async fn wait_for_release(&self, addr: SocketAddr) {
        self.address_pool(addr).wait_for_release().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (SocketAddr, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (client, _accepted) = tokio::join!(connect, listener.accept());
        (addr, client.unwrap())
    }

    #[tokio::test]
    async fn released_connection_is_handed_back_by_try_take() {
        let pool = ConnectionPool::new(4, Duration::from_secs(60));
        let (addr, stream) = loopback_pair().await;
        pool.mark_checked_out(addr);
        pool.release(addr, stream);
        assert_eq!(pool.open_count(addr), 1);
        assert!(pool.try_take(addr).is_some());
        assert_eq!(pool.open_count(addr), 0);
    }

    #[tokio::test]
    async fn try_take_on_unknown_address_returns_none() {
        let pool = ConnectionPool::new(4, Duration::from_secs(60));
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        assert!(pool.try_take(addr).is_none());
    }

    #[tokio::test]
    async fn releasing_past_capacity_evicts_the_oldest_connection() {
        let pool = ConnectionPool::new(1, Duration::from_secs(60));
        let (addr, a) = loopback_pair().await;
        let (_, b) = loopback_pair().await;
        pool.mark_checked_out(addr);
        pool.release(addr, a);
        pool.mark_checked_out(addr);
        pool.release(addr, b);
        assert_eq!(pool.open_count(addr), 1);
    }

    #[tokio::test]
    async fn expired_idle_connections_are_not_handed_back_out() {
        let pool = ConnectionPool::new(4, Duration::from_millis(10));
        let (addr, stream) = loopback_pair().await;
        pool.mark_checked_out(addr);
        pool.release(addr, stream);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pool.try_take(addr).is_none());
    }

    #[tokio::test]
    async fn live_count_tracks_checked_out_connections_until_released() {
        let pool = ConnectionPool::new(4, Duration::from_secs(60));
        let (addr, stream) = loopback_pair().await;
        pool.mark_checked_out(addr);
        assert_eq!(pool.live_count(addr), 1);
        pool.release(addr, stream);
        assert_eq!(pool.live_count(addr), 1);
        assert!(pool.try_take(addr).is_some());
        assert_eq!(pool.live_count(addr), 1);
    }

    #[tokio::test]
    async fn discard_frees_a_checked_out_slot_without_requeuing_it() {
        let pool = ConnectionPool::new(4, Duration::from_secs(60));
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        pool.mark_checked_out(addr);
        assert_eq!(pool.live_count(addr), 1);
        pool.discard(addr);
        assert_eq!(pool.live_count(addr), 0);
    }
}
