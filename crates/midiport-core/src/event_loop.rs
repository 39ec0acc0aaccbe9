//! Single-threaded consumer loop.
//!
//! Driver threads never call into listeners. They hold a [`Waker`] and
//! signal the loop; the loop thread then runs the registered dispatch routine
//! for that source. Wakes are coalesced: while a source is pending, further
//! wakes are free and do not queue extra dispatches.
//!
//! ```ignore
//! let event_loop = EventLoop::new();
//! let source = event_loop.async_source(move || drain_and_emit());
//! let waker = source.waker();
//! std::thread::spawn(move || waker.wake());
//! event_loop.run_once(Duration::from_millis(100));
//! ```

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

pub type SourceId = u64;

/// How often [`EventLoop::run`] re-checks the keep-alive count while idle.
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(50);

type DispatchFn = Box<dyn FnMut() -> usize>;

struct Source {
    pending: Arc<AtomicBool>,
    dispatch: RefCell<DispatchFn>,
    redispatch: Cell<bool>,
}

struct LoopInner {
    wake_tx: Sender<SourceId>,
    wake_rx: Receiver<SourceId>,
    sources: RefCell<HashMap<SourceId, Rc<Source>>>,
    next_id: Cell<SourceId>,
    alive: Cell<usize>,
}

/// Cheap to clone; all clones drive the same loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl EventLoop {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = unbounded();
        Self {
            inner: Rc::new(LoopInner {
                wake_tx,
                wake_rx,
                sources: RefCell::new(HashMap::new()),
                next_id: Cell::new(0),
                alive: Cell::new(0),
            }),
        }
    }

    /// Registers `dispatch` to run on this thread whenever the returned
    /// source's waker fires. `dispatch` returns how many messages it delivered.
    pub fn async_source<F>(&self, dispatch: F) -> AsyncSource
    where
        F: FnMut() -> usize + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let pending = Arc::new(AtomicBool::new(false));
        let source = Rc::new(Source {
            pending: Arc::clone(&pending),
            dispatch: RefCell::new(Box::new(dispatch)),
            redispatch: Cell::new(false),
        });
        self.inner.sources.borrow_mut().insert(id, source);
        trace!("Attached async source {}", id);

        AsyncSource {
            id,
            waker: Waker {
                id,
                pending,
                wake_tx: self.inner.wake_tx.clone(),
            },
            event_loop: Rc::downgrade(&self.inner),
        }
    }

    /// Keeps [`EventLoop::run`] from returning while the token is held.
    pub fn keep_alive(&self) -> KeepAlive {
        self.inner.alive.set(self.inner.alive.get() + 1);
        KeepAlive {
            event_loop: Rc::downgrade(&self.inner),
        }
    }

    /// Number of outstanding [`KeepAlive`] tokens.
    pub fn alive(&self) -> usize {
        self.inner.alive.get()
    }

    pub fn source_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    /// Waits up to `timeout` for a wake, then dispatches every source that
    /// was pending at that point. Returns the number of messages delivered.
    pub fn run_once(&self, timeout: Duration) -> usize {
        let first = if timeout.is_zero() {
            self.inner.wake_rx.try_recv().ok()
        } else {
            self.inner.wake_rx.recv_timeout(timeout).ok()
        };
        let Some(id) = first else {
            return 0;
        };

        let mut delivered = self.dispatch(id);
        // Only what was queued now; wakes raised during dispatch wait for the next turn.
        for _ in 0..self.inner.wake_rx.len() {
            match self.inner.wake_rx.try_recv() {
                Ok(id) => delivered += self.dispatch(id),
                Err(_) => break,
            }
        }
        delivered
    }

    /// Dispatches whatever is pending without blocking.
    pub fn run_until_idle(&self) -> usize {
        self.run_once(Duration::ZERO)
    }

    /// Dispatches until no keep-alive tokens remain, then flushes what is
    /// still pending.
    pub fn run(&self) -> usize {
        let mut delivered = 0;
        while self.alive() > 0 {
            delivered += self.run_once(RUN_POLL_INTERVAL);
        }
        delivered + self.run_until_idle()
    }

    fn dispatch(&self, id: SourceId) -> usize {
        let source = match self.inner.sources.borrow().get(&id) {
            Some(source) => Rc::clone(source),
            None => {
                trace!("Wake for detached source {} ignored", id);
                return 0;
            }
        };

        // Cleared first so producers racing with this dispatch wake us again.
        source.pending.store(false, Ordering::Release);

        let Ok(mut dispatch) = source.dispatch.try_borrow_mut() else {
            // Re-entered from one of this source's own listeners.
            source.redispatch.set(true);
            return 0;
        };

        let mut delivered = 0;
        loop {
            delivered += (*dispatch)();
            if !source.redispatch.replace(false) {
                break;
            }
        }
        delivered
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("sources", &self.source_count())
            .field("alive", &self.alive())
            .finish()
    }
}

/// Driver-side handle. `Send + Sync`; never blocks.
#[derive(Clone)]
pub struct Waker {
    id: SourceId,
    pending: Arc<AtomicBool>,
    wake_tx: Sender<SourceId>,
}

impl Waker {
    pub fn wake(&self) {
        if self.pending.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.wake_tx.send(self.id).is_err() {
            trace!("Event loop dropped; wake for source {} discarded", self.id);
        }
    }
}

impl std::fmt::Debug for Waker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waker").field("id", &self.id).finish()
    }
}

/// Registration of a dispatch routine. Detaches on drop.
pub struct AsyncSource {
    id: SourceId,
    waker: Waker,
    event_loop: Weak<LoopInner>,
}

impl AsyncSource {
    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn waker(&self) -> Waker {
        self.waker.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.event_loop
            .upgrade()
            .map(|inner| inner.sources.borrow().contains_key(&self.id))
            .unwrap_or(false)
    }

    /// Removes the dispatch routine. Later wakes are ignored. Idempotent.
    pub fn detach(&mut self) {
        if let Some(inner) = self.event_loop.upgrade() {
            if inner.sources.borrow_mut().remove(&self.id).is_some() {
                trace!("Detached async source {}", self.id);
            }
        }
    }
}

impl Drop for AsyncSource {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for AsyncSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSource").field("id", &self.id).finish()
    }
}

/// RAII keep-alive token; see [`EventLoop::keep_alive`].
pub struct KeepAlive {
    event_loop: Weak<LoopInner>,
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        if let Some(inner) = self.event_loop.upgrade() {
            inner.alive.set(inner.alive.get().saturating_sub(1));
        }
    }
}

impl std::fmt::Debug for KeepAlive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeepAlive")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const WAIT: Duration = Duration::from_millis(500);

    #[test]
    fn test_wake_from_other_thread() {
        let event_loop = EventLoop::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = Rc::clone(&hits);
        let source = event_loop.async_source(move || {
            hits_clone.set(hits_clone.get() + 1);
            1
        });

        let waker = source.waker();
        thread::spawn(move || waker.wake()).join().unwrap();

        assert_eq!(event_loop.run_once(WAIT), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_wakes_coalesce_while_pending() {
        let event_loop = EventLoop::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = Rc::clone(&hits);
        let source = event_loop.async_source(move || {
            hits_clone.set(hits_clone.get() + 1);
            0
        });

        let waker = source.waker();
        for _ in 0..10 {
            waker.wake();
        }
        event_loop.run_until_idle();
        assert_eq!(hits.get(), 1, "ten wakes before dispatch run once");

        // Pending was cleared, so the next wake dispatches again
        waker.wake();
        event_loop.run_until_idle();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_wake_after_detach_is_ignored() {
        let event_loop = EventLoop::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = Rc::clone(&hits);
        let mut source = event_loop.async_source(move || {
            hits_clone.set(hits_clone.get() + 1);
            0
        });
        let waker = source.waker();

        source.detach();
        source.detach();
        assert!(!source.is_attached());
        assert_eq!(event_loop.source_count(), 0);

        waker.wake();
        assert_eq!(event_loop.run_until_idle(), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_wake_after_loop_dropped_does_not_panic() {
        let event_loop = EventLoop::new();
        let source = event_loop.async_source(|| 0);
        let waker = source.waker();
        drop(source);
        drop(event_loop);

        thread::spawn(move || waker.wake()).join().unwrap();
    }

    #[test]
    fn test_keep_alive_counting() {
        let event_loop = EventLoop::new();
        assert_eq!(event_loop.alive(), 0);

        let a = event_loop.keep_alive();
        let b = event_loop.keep_alive();
        assert_eq!(event_loop.alive(), 2);

        drop(a);
        assert_eq!(event_loop.alive(), 1);
        drop(b);
        assert_eq!(event_loop.alive(), 0);
    }

    #[test]
    fn test_run_returns_when_last_token_released() {
        let event_loop = EventLoop::new();
        let token = Rc::new(RefCell::new(Some(event_loop.keep_alive())));
        let token_clone = Rc::clone(&token);
        let source = event_loop.async_source(move || {
            token_clone.borrow_mut().take();
            3
        });

        let waker = source.waker();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            waker.wake();
        });

        assert_eq!(event_loop.run(), 3);
        assert_eq!(event_loop.alive(), 0);
        handle.join().unwrap();
    }

    #[test]
    fn test_run_without_tokens_returns_immediately() {
        let event_loop = EventLoop::new();
        assert_eq!(event_loop.run(), 0);
    }

    #[test]
    fn test_run_once_times_out() {
        let event_loop = EventLoop::new();
        let _source = event_loop.async_source(|| 1);
        assert_eq!(event_loop.run_once(Duration::from_millis(10)), 0);
    }

    #[test]
    fn test_drop_detaches() {
        let event_loop = EventLoop::new();
        let source = event_loop.async_source(|| 0);
        assert_eq!(event_loop.source_count(), 1);
        drop(source);
        assert_eq!(event_loop.source_count(), 0);
    }
}
