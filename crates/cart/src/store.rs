//! The cart state container.
//!
//! One [`CartStore`] is built at application start and shared (typically as
//! `Arc<CartStore>`) with every surface that shows or edits the cart.
//!
//! Every operation is synchronous and total. A mutation that changes the
//! state:
//! 1. updates the watched state (seen by [`CartStore::watch`] receivers),
//! 2. hands the item list to the write queue if items changed,
//! 3. queues the new state for the listeners,
//!
//! all under one mutation lock, so states are queued in mutation order.
//! The lock is released before any listener runs.
//!
//! Listeners are called from a per-store dispatch queue, one state at a
//! time and in mutation order. The outermost publishing call drains the
//! queue before it returns. A listener may read the store or mutate it: a
//! mutation made from inside a listener is applied at once, and its state
//! is delivered after the current one has reached every listener.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use curio_core::{Price, ProductId, ProductSnapshot};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use crate::persist::{self, CartWriter};
use crate::state::{CartLineItem, CartState, Change};
use crate::storage::KeyValueStore;

/// Callback invoked with the new state after every change.
pub type Listener = Arc<dyn Fn(&CartState) + Send + Sync>;

/// Handle returned by [`CartStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

/// States waiting for delivery, and the thread currently delivering them.
#[derive(Default)]
struct Dispatch {
    pending: VecDeque<CartState>,
    drainer: Option<ThreadId>,
}

/// Shared cart state with synchronous publish and background persistence.
pub struct CartStore {
    state: watch::Sender<CartState>,
    mutation: Mutex<()>,
    listeners: Mutex<Listeners>,
    dispatch: Mutex<Dispatch>,
    dispatch_idle: Condvar,
    writer: Option<CartWriter>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &*self.state.borrow())
            .field("persistent", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the drainer role when delivery ends, even by panic.
struct Draining<'a>(&'a CartStore);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.lock_dispatch().drainer = None;
        self.0.dispatch_idle.notify_all();
    }
}

impl CartStore {
    /// Create an empty cart with no persistence medium.
    #[must_use]
    pub fn new() -> Self {
        Self::build(CartState::default(), None)
    }

    /// Load the cart persisted under `key` and persist future changes there.
    ///
    /// A missing, unreadable or corrupt stored value starts an empty cart.
    /// The drawer always starts closed. Must be called within a Tokio
    /// runtime, which hosts the write queue.
    #[instrument(skip(storage, key), fields(key = %key.as_ref()))]
    pub async fn load(storage: Arc<dyn KeyValueStore>, key: impl AsRef<str>) -> Self {
        let key = key.as_ref().to_owned();
        let state = CartState::from_items(persist::read_items(storage.as_ref(), &key).await);
        info!(
            items = state.items().len(),
            count = state.total_item_count(),
            "Cart loaded"
        );

        let writer = CartWriter::spawn(storage, key);
        Self::build(state, Some(writer))
    }

    fn build(state: CartState, writer: Option<CartWriter>) -> Self {
        Self {
            state: watch::Sender::new(state),
            mutation: Mutex::new(()),
            listeners: Mutex::new(Listeners::default()),
            dispatch: Mutex::new(Dispatch::default()),
            dispatch_idle: Condvar::new(),
            writer,
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`, appending it if new, and open the drawer.
    pub fn add_item(&self, product: ProductSnapshot) {
        let id = product.id;
        self.apply("add_item", Some(id), |state| state.add_item(product));
    }

    /// Add `units` units of `product` as a single change.
    ///
    /// Equivalent to calling [`add_item`](Self::add_item) `units` times.
    /// Zero units is a no-op and leaves the drawer alone.
    pub fn add_units(&self, product: ProductSnapshot, units: u32) {
        let id = product.id;
        self.apply("add_units", Some(id), |state| state.add_units(product, units));
    }

    /// Remove the line item for `id`, if any.
    pub fn remove_item(&self, id: ProductId) {
        self.apply("remove_item", Some(id), |state| state.remove_item(id));
    }

    /// Overwrite the quantity of an existing line item.
    ///
    /// `quantity <= 0` removes the item. Setting a quantity for a product
    /// that is not in the cart does nothing.
    pub fn set_quantity(&self, id: ProductId, quantity: i64) {
        self.apply("set_quantity", Some(id), |state| state.set_quantity(id, quantity));
    }

    /// Remove every line item. Drawer visibility is unchanged.
    pub fn clear(&self) {
        self.apply("clear", None, CartState::clear);
    }

    pub fn open_drawer(&self) {
        self.apply("open_drawer", None, |state| state.set_drawer(true));
    }

    pub fn close_drawer(&self) {
        self.apply("close_drawer", None, |state| state.set_drawer(false));
    }

    pub fn toggle_drawer(&self) {
        self.apply("toggle_drawer", None, CartState::toggle_drawer);
    }

    fn apply(
        &self,
        op: &'static str,
        id: Option<ProductId>,
        f: impl FnOnce(&mut CartState) -> Change,
    ) {
        let changed = {
            let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
            self.commit(op, id, f)
        };
        if changed {
            self.publish();
        }
    }

    /// Apply `f`, feed the write queue and queue the new state for
    /// listeners. The caller holds the mutation lock.
    fn commit(
        &self,
        op: &'static str,
        id: Option<ProductId>,
        f: impl FnOnce(&mut CartState) -> Change,
    ) -> bool {
        let mut change = Change::NONE;
        self.state.send_if_modified(|state| {
            change = f(state);
            change.any()
        });

        if !change.any() {
            debug!(op, product_id = ?id, "Cart unchanged");
            return false;
        }

        let snapshot = self.state.borrow().clone();
        debug!(
            op,
            product_id = ?id,
            items = snapshot.items().len(),
            count = snapshot.total_item_count(),
            drawer_open = snapshot.is_drawer_open(),
            "Cart updated"
        );

        if change.items {
            if let Some(writer) = &self.writer {
                writer.enqueue(snapshot.items().to_vec());
            }
        }

        self.lock_dispatch().pending.push_back(snapshot);
        true
    }

    /// Deliver queued states to the listeners.
    ///
    /// Returns at once when called from a listener: the outer call on this
    /// thread delivers the queued state after the current one. When another
    /// thread is delivering, waits for it to finish, so every state queued
    /// before this call has reached the listeners when it returns.
    fn publish(&self) {
        let current = thread::current().id();
        let mut dispatch = self.lock_dispatch();
        loop {
            match dispatch.drainer {
                Some(owner) if owner == current => return,
                Some(_) => {
                    dispatch = self
                        .dispatch_idle
                        .wait(dispatch)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => break,
            }
        }
        if dispatch.pending.is_empty() {
            return;
        }
        dispatch.drainer = Some(current);
        drop(dispatch);

        let _draining = Draining(self);
        while let Some(state) = self.next_pending() {
            for listener in self.registered_listeners() {
                listener(&state);
            }
        }
    }

    /// Pop the next queued state. The dispatch lock is not held while
    /// listeners run, so they can queue more.
    fn next_pending(&self) -> Option<CartState> {
        self.lock_dispatch().pending.pop_front()
    }

    fn lock_dispatch(&self) -> MutexGuard<'_, Dispatch> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registered_listeners(&self) -> Vec<Listener> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Clone of the current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Clone of the current line items, in first-added order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.state.borrow().items().to_vec()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    #[must_use]
    pub fn is_drawer_open(&self) -> bool {
        self.state.borrow().is_drawer_open()
    }

    /// Sum of quantities across all line items.
    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.state.borrow().total_item_count()
    }

    /// Subtotal of all line items.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.state.borrow().total_price()
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a listener called with the new state after every change.
    pub fn subscribe(&self, listener: impl Fn(&CartState) + Send + Sync + 'static) -> ListenerId {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry, _)| *entry != id);
        listeners.entries.len() != before
    }

    /// Receiver for async observers; updated atomically with each mutation.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    /// Close the write queue and wait for the last pending write.
    ///
    /// Call once on process exit. Later mutations still update memory but
    /// are no longer persisted.
    pub async fn shutdown(&self) {
        if let Some(writer) = &self.writer {
            writer.close().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::persist::{STORAGE_KEY, decode_items};
    use crate::storage::MemoryStore;

    fn product(id: i32, cents: i64) -> ProductSnapshot {
        ProductSnapshot::new(id, format!("Product {id}"), Price::from_cents(cents))
    }

    fn quantities(store: &CartStore) -> Vec<(i32, u32)> {
        store
            .items()
            .iter()
            .map(|item| (item.id.as_i32(), item.quantity))
            .collect()
    }

    #[test]
    fn test_scenario_add_and_totals() {
        let store = CartStore::new();
        store.add_item(product(1, 1000));
        store.add_item(product(1, 1000));
        store.add_item(product(2, 500));

        assert_eq!(quantities(&store), vec![(1, 2), (2, 1)]);
        assert_eq!(store.total_item_count(), 3);
        assert_eq!(store.total_price(), Price::from_cents(2500));
        assert!(store.is_drawer_open());

        store.set_quantity(ProductId::new(1), 0);
        assert_eq!(quantities(&store), vec![(2, 1)]);
    }

    #[test]
    fn test_clear_keeps_drawer_state() {
        let store = CartStore::new();
        store.add_item(product(1, 1000));
        store.clear();
        assert!(store.is_empty());
        assert!(store.is_drawer_open());

        store.close_drawer();
        store.add_item(product(1, 1000));
        store.close_drawer();
        store.clear();
        assert!(!store.is_drawer_open());
    }

    #[test]
    fn test_drawer_controls() {
        let store = CartStore::new();
        assert!(!store.is_drawer_open());
        store.open_drawer();
        assert!(store.is_drawer_open());
        store.toggle_drawer();
        assert!(!store.is_drawer_open());
        store.toggle_drawer();
        store.close_drawer();
        assert!(!store.is_drawer_open());
        assert!(store.is_empty());
    }

    #[test]
    fn test_listeners_see_every_change_in_order() {
        let store = CartStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |state| {
            sink.lock().unwrap().push(state.total_item_count());
        });

        store.add_item(product(1, 1000));
        store.add_item(product(1, 1000));
        store.remove_item(ProductId::new(5));
        store.set_quantity(ProductId::new(1), 5);
        store.clear();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 5, 0]);
    }

    #[test]
    fn test_listener_reads_updated_store() {
        let store = Arc::new(CartStore::new());
        let observed = Arc::new(Mutex::new(None));
        let (reader, sink) = (Arc::clone(&store), Arc::clone(&observed));
        store.subscribe(move |state| {
            *sink.lock().unwrap() = Some((state.total_price(), reader.total_price()));
        });

        store.add_item(product(1, 1250));
        let (published, read_back) = observed.lock().unwrap().take().unwrap();
        assert_eq!(published, Price::from_cents(1250));
        assert_eq!(read_back, published);
    }

    #[test]
    fn test_listener_may_mutate_the_cart() {
        let store = Arc::new(CartStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (inner, sink) = (Arc::downgrade(&store), Arc::clone(&seen));
        store.subscribe(move |state| {
            sink.lock().unwrap().push(state.is_drawer_open());
            // an empty drawer snaps shut
            let empty_and_open = state.is_drawer_open() && state.is_empty();
            match inner.upgrade() {
                Some(store) if empty_and_open => store.close_drawer(),
                _ => {}
            }
        });

        let (done, finished) = mpsc::channel();
        let worker = Arc::clone(&store);
        thread::spawn(move || {
            worker.open_drawer();
            done.send(worker.is_drawer_open()).unwrap();
        });

        let open_after_return = finished.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!open_after_return);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_nested_mutations_reach_every_listener_in_order() {
        let store = Arc::new(CartStore::new());
        let inner = Arc::downgrade(&store);
        store.subscribe(move |state| {
            // buying the candle set suggests the matching holder
            let suggest = state.items().len() == 1 && state.item(ProductId::new(1)).is_some();
            match inner.upgrade() {
                Some(store) if suggest => store.add_item(product(2, 1800)),
                _ => {}
            }
        });
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&counts);
        store.subscribe(move |state| sink.lock().unwrap().push(state.items().len()));

        store.add_item(product(1, 4500));

        assert_eq!(quantities(&store), vec![(1, 1), (2, 1)]);
        assert_eq!(*counts.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_mutations_are_all_published() {
        let store = Arc::new(CartStore::new());
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&counts);
        store.subscribe(move |state| sink.lock().unwrap().push(state.total_item_count()));

        let workers: Vec<_> = (1..=4)
            .map(|id| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.add_item(product(id, 100));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(store.total_item_count(), 100);
        assert_eq!(*counts.lock().unwrap(), (1..=100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_unsubscribe() {
        let store = CartStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.open_drawer();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.close_drawer();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_watch_receiver_sees_latest_state() {
        let store = CartStore::new();
        let mut rx = store.watch();
        assert!(!rx.has_changed().unwrap());

        store.add_item(product(3, 5200));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().total_item_count(), 1);

        store.remove_item(ProductId::new(99));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_persists_items_but_not_drawer() {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::load(storage.clone(), STORAGE_KEY).await;

        store.add_item(product(1, 1000));
        store.add_item(product(1, 1000));
        store.add_item(product(3, 5200));
        store.shutdown().await;

        let stored = storage.get(STORAGE_KEY).await.unwrap().unwrap();
        let items = decode_items(&stored).unwrap();
        assert_eq!(items.len(), 2);
        assert!(!stored.contains("drawer"));

        let reloaded = CartStore::load(storage, STORAGE_KEY).await;
        assert_eq!(reloaded.items(), store.items());
        assert!(!reloaded.is_drawer_open());
    }

    #[tokio::test]
    async fn test_storage_faults_do_not_affect_mutations() {
        let storage = Arc::new(MemoryStore::new());
        storage.set_unavailable(true);

        let store = CartStore::load(storage.clone(), STORAGE_KEY).await;
        store.add_item(product(1, 1000));
        store.set_quantity(ProductId::new(1), 4);
        store.shutdown().await;

        assert_eq!(quantities(&store), vec![(1, 4)]);
        storage.set_unavailable(false);
        assert_eq!(storage.get(STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_drawer_only_changes_are_not_persisted() {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::load(storage.clone(), STORAGE_KEY).await;

        store.open_drawer();
        store.toggle_drawer();
        store.shutdown().await;

        assert_eq!(storage.get(STORAGE_KEY).await.unwrap(), None);
    }
}
