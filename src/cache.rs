//! Memoizing async cache with single-flight de-duplication.
//!
//! Every miss registers a shared future in an in-flight map before it is
//! awaited, so concurrent callers asking for the same key join the pending
//! fetch instead of starting their own. The fetch is also driven by a spawned
//! task, so it settles even when every caller gives up on it. Successful
//! values are kept according to the [`CachePolicy`]; failures are handed to
//! every waiter and then forgotten.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use lru::LruCache;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Entries are reused until `ttl` has passed since they were populated.
    Ttl(Duration),
    /// Entries never expire, but at most `capacity` are kept.
    Lru { capacity: usize },
}

struct Entry<V> {
    value: V,
    populated_at: Instant,
}

struct State<K: Hash + Eq, V, E> {
    ready: LruCache<K, Entry<V>>,
    in_flight: HashMap<K, (u64, SharedFetch<V, E>)>,
    generation: u64,
}

impl<K, V, E> State<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn new(policy: CachePolicy) -> Self {
        let ready = match policy {
            CachePolicy::Ttl(_) => LruCache::unbounded(),
            CachePolicy::Lru { capacity } => {
                LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
            }
        };
        State {
            ready,
            in_flight: HashMap::new(),
            generation: 0,
        }
    }

    fn lookup(&mut self, key: &K, policy: CachePolicy) -> Option<V> {
        if let CachePolicy::Ttl(ttl) = policy {
            let expired = self.ready.peek(key)?.populated_at.elapsed() >= ttl;
            if expired {
                self.ready.pop(key);
                return None;
            }
        }
        self.ready.get(key).map(|entry| entry.value.clone())
    }

    /// Clears the in-flight slot if it still belongs to `generation`, keeping
    /// the value on success. Later calls for the same fetch are no-ops.
    fn settle(&mut self, key: K, generation: u64, result: &Result<V, E>) {
        if !matches!(self.in_flight.get(&key), Some((g, _)) if *g == generation) {
            return;
        }
        self.in_flight.remove(&key);
        if let Ok(value) = result {
            self.ready.put(
                key,
                Entry {
                    value: value.clone(),
                    populated_at: Instant::now(),
                },
            );
        }
    }
}

/// A process-lifetime cache shared by every caller of one upstream client.
pub struct MemoCache<K: Hash + Eq, V, E> {
    policy: CachePolicy,
    state: Arc<Mutex<State<K, V, E>>>,
}

impl<K, V, E> MemoCache<K, V, E>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(policy: CachePolicy) -> Self {
        MemoCache {
            policy,
            state: Arc::new(Mutex::new(State::new(policy))),
        }
    }

    /// Returns the cached value for `key`, joining an in-flight fetch or
    /// starting one with `producer` when neither is available.
    pub async fn get<F, Fut>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (generation, fetch) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if let Some(value) = state.lookup(&key, self.policy) {
                return Ok(value);
            }
            match state.in_flight.get(&key) {
                Some((generation, fetch)) => (*generation, fetch.clone()),
                None => {
                    state.generation += 1;
                    let generation = state.generation;
                    let fetch = producer().boxed().shared();
                    state
                        .in_flight
                        .insert(key.clone(), (generation, fetch.clone()));
                    self.drive(key.clone(), generation, fetch.clone());
                    (generation, fetch)
                }
            }
        };

        let result = fetch.await;
        self.state.lock().await.settle(key, generation, &result);
        result
    }

    /// Polls `fetch` to completion in the background and settles its slot.
    fn drive(&self, key: K, generation: u64, fetch: SharedFetch<V, E>) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            state.lock().await.settle(key, generation, &result);
        });
    }

    /// Number of settled entries currently held.
    pub async fn len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
