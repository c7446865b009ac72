//! Event engine for the trading system.
//! This module provides an event-driven framework similar to VeighNa's event system
//! but implemented in Rust with thread-safe event handling.
//!
//! One dispatch thread drains a single FIFO queue, so events are delivered in
//! enqueue order across all event types. A second thread posts [`EVENT_TIMER`]
//! events at a fixed interval. Handlers run on the dispatch thread; a consumer
//! that owns thread-affine state (a UI) must hand the payload back to its own
//! thread.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self as sync_mpsc, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::error::{EngineError, Result};

/// Timer event type constant
pub const EVENT_TIMER: &str = "eTimer";

/// Default timer interval
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// How often an idle dispatch thread re-checks the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Event data structure
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: Option<Arc<dyn Any + Send + Sync>>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: Option<Arc<dyn Any + Send + Sync>>) -> Self {
        Event {
            event_type: event_type.into(),
            data,
        }
    }

    /// Wrap `data` into an immutable shared payload
    pub fn with_data<T: Any + Send + Sync>(event_type: impl Into<String>, data: T) -> Self {
        Self::new(event_type, Some(Arc::new(data)))
    }

    /// Borrow the payload as `T`, if it is one
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref().and_then(|data| data.downcast_ref::<T>())
    }

    /// Clone out the shared payload as `Arc<T>`, if it is one
    pub fn data_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.data.clone()?.downcast::<T>().ok()
    }
}

/// Type alias for event handler functions.
///
/// Handler identity is the identity of the `Arc`: registering a clone of the
/// same `Arc` twice is a no-op.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// A wrapper that allows us to identify handlers for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(usize);

/// Counters collected by the engine since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Events accepted into the queue (timer events included)
    pub enqueued: u64,
    /// Events taken off the queue and routed, with or without handlers
    pub dispatched: u64,
    /// Successful handler invocations
    pub delivered: u64,
    /// Events rejected because the engine was not running
    pub dropped: u64,
    /// Handler invocations that panicked
    pub handler_panics: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    handler_panics: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> EngineStats {
        EngineStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Acquire),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

struct HandlerEntry {
    id: HandlerId,
    handler: EventHandler,
}

#[derive(Default)]
struct Registry {
    /// Map of event type to handlers
    handlers: HashMap<String, Vec<HandlerEntry>>,
    /// General handlers that receive all events
    general: Vec<HandlerEntry>,
}

impl Registry {
    /// Handlers for one event, type-specific first, then general.
    fn snapshot(&self, event_type: &str) -> Vec<EventHandler> {
        self.handlers
            .get(event_type)
            .into_iter()
            .flatten()
            .chain(self.general.iter())
            .map(|entry| Arc::clone(&entry.handler))
            .collect()
    }
}

/// State shared between the engine handle and its worker threads
struct Shared {
    registry: Mutex<Registry>,
    active: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn send(&self, sender: &sync_mpsc::Sender<Event>, event: Event) -> bool {
        match sender.send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Process an event by calling appropriate handlers.
    ///
    /// The handler list is copied before any handler runs, so handlers may
    /// register or unregister freely; changes apply from the next event on.
    /// Handlers stop being called as soon as `running` is cleared.
    fn process_event(&self, event: &Event, running: &AtomicBool) {
        let handlers = self.registry().snapshot(&event.event_type);

        for handler in handlers {
            if !running.load(Ordering::Acquire) {
                break;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    self.counters.handler_panics.fetch_add(1, Ordering::Relaxed);
                    let err = EngineError::Dispatch {
                        event_type: event.event_type.clone(),
                        message: panic_message(&*payload),
                    };
                    error!("{}", err);
                }
            }
        }

        self.counters.dispatched.fetch_add(1, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Default)]
struct Workers {
    /// Run flag owned by the current worker threads; a restart gets a new one
    running: Option<Arc<AtomicBool>>,
    /// Channel sender for putting events
    sender: Option<sync_mpsc::Sender<Event>>,
    /// Dropping this wakes the timer thread for shutdown
    timer_stop: Option<sync_mpsc::Sender<()>>,
    /// Timer thread handle
    timer_handle: Option<JoinHandle<()>>,
    /// Processing thread handle
    processing_handle: Option<JoinHandle<()>>,
}

/// Event Engine that distributes events based on their type.
///
/// Lifecycle is `Stopped -> Running -> Stopped`. Events put while stopped are
/// dropped and counted; there is no replay on a later start.
pub struct EventEngine {
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
    /// Counter for generating unique handler IDs
    handler_counter: AtomicUsize,
    /// Timer interval
    interval: Duration,
}

impl EventEngine {
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("Zero timer interval requested, using {:?}", DEFAULT_INTERVAL);
            DEFAULT_INTERVAL
        } else {
            interval
        };

        EventEngine {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                active: AtomicBool::new(false),
                counters: Counters::default(),
            }),
            workers: Mutex::new(Workers::default()),
            handler_counter: AtomicUsize::new(0),
            interval,
        }
    }

    fn workers(&self) -> MutexGuard<'_, Workers> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate a new unique handler ID
    fn generate_handler_id(&self) -> HandlerId {
        HandlerId(self.handler_counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Start the event engine. Starting a running engine is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers();
        if self.shared.is_active() {
            debug!("Event engine already running, start ignored");
            return Ok(());
        }

        let (sender, receiver) = sync_mpsc::channel();
        let (timer_stop, timer_stop_rx) = sync_mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        self.shared.active.store(true, Ordering::Release);

        // Start event processing loop
        let shared = Arc::clone(&self.shared);
        let run_flag = Arc::clone(&running);
        let processing_handle = match thread::Builder::new()
            .name("event-dispatch".to_string())
            .spawn(move || run_processing(shared, run_flag, receiver))
        {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.active.store(false, Ordering::Release);
                return Err(EngineError::Lifecycle(format!(
                    "failed to spawn dispatch thread: {}",
                    e
                )));
            }
        };

        // Start timer thread
        let shared = Arc::clone(&self.shared);
        let run_flag = Arc::clone(&running);
        let timer_sender = sender.clone();
        let interval = self.interval;
        let timer_handle = match thread::Builder::new()
            .name("event-timer".to_string())
            .spawn(move || run_timer(shared, run_flag, timer_sender, timer_stop_rx, interval))
        {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::Release);
                self.shared.active.store(false, Ordering::Release);
                drop(sender);
                let _ = processing_handle.join();
                return Err(EngineError::Lifecycle(format!(
                    "failed to spawn timer thread: {}",
                    e
                )));
            }
        };

        workers.running = Some(running);
        workers.sender = Some(sender);
        workers.timer_stop = Some(timer_stop);
        workers.timer_handle = Some(timer_handle);
        workers.processing_handle = Some(processing_handle);

        info!(interval_ms = self.interval.as_millis() as u64, "Event engine started");
        Ok(())
    }

    /// Stop the event engine.
    ///
    /// Queued events are discarded and both worker threads are joined before
    /// returning, so no handler runs after this call. Stopping a stopped engine
    /// is a no-op. When called from inside a handler the dispatch thread cannot
    /// join itself; it exits as soon as that handler returns.
    pub fn stop(&self) {
        let (was_active, sender, timer_stop, timer_handle, processing_handle) = {
            let mut workers = self.workers();
            if let Some(running) = workers.running.take() {
                running.store(false, Ordering::Release);
            }
            (
                self.shared.active.swap(false, Ordering::AcqRel),
                workers.sender.take(),
                workers.timer_stop.take(),
                workers.timer_handle.take(),
                workers.processing_handle.take(),
            )
        };

        if !was_active {
            debug!("Event engine not running, stop ignored");
        }

        drop(sender);
        drop(timer_stop);

        if let Some(handle) = timer_handle {
            if handle.join().is_err() {
                error!("Timer thread terminated abnormally");
            }
        }

        if let Some(handle) = processing_handle {
            if handle.thread().id() == thread::current().id() {
                warn!("Event engine stopped from inside a handler");
            } else if handle.join().is_err() {
                error!("Dispatch thread terminated abnormally");
            }
        }

        if was_active {
            info!("Event engine stopped");
        }
    }

    /// Put an event into the queue.
    ///
    /// Never blocks on consumers. Returns `false` when the engine is not
    /// running and the event was dropped.
    pub fn put(&self, event: Event) -> bool {
        let workers = self.workers();
        match workers.sender.as_ref() {
            Some(sender) if self.shared.is_active() => self.shared.send(sender, event),
            _ => {
                self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(event_type = %event.event_type, "Event engine not running, event dropped");
                false
            }
        }
    }

    /// Register a handler for a specific event type.
    ///
    /// Registering the same handler again for the same type returns the
    /// existing id and does not add a second delivery.
    pub fn register(&self, event_type: &str, handler: EventHandler) -> HandlerId {
        let mut registry = self.shared.registry();
        let handler_list = registry.handlers.entry(event_type.to_string()).or_default();

        if let Some(entry) = handler_list.iter().find(|e| Arc::ptr_eq(&e.handler, &handler)) {
            return entry.id;
        }

        let handler_id = self.generate_handler_id();
        handler_list.push(HandlerEntry {
            id: handler_id,
            handler,
        });
        debug!(event_type, ?handler_id, "Handler registered");
        handler_id
    }

    /// Unregister a handler for a specific event type
    pub fn unregister(&self, event_type: &str, handler: &EventHandler) -> bool {
        self.remove_where(event_type, |entry| Arc::ptr_eq(&entry.handler, handler))
    }

    /// Unregister a handler by the id returned from [`EventEngine::register`]
    pub fn unregister_by_id(&self, event_type: &str, handler_id: HandlerId) -> bool {
        self.remove_where(event_type, |entry| entry.id == handler_id)
    }

    fn remove_where(&self, event_type: &str, matches: impl Fn(&HandlerEntry) -> bool) -> bool {
        let mut registry = self.shared.registry();
        let Some(handler_list) = registry.handlers.get_mut(event_type) else {
            return false;
        };

        let before = handler_list.len();
        handler_list.retain(|entry| !matches(entry));
        let removed = handler_list.len() != before;

        // Remove the key if no handlers left
        if handler_list.is_empty() {
            registry.handlers.remove(event_type);
        }
        if removed {
            debug!(event_type, "Handler unregistered");
        }
        removed
    }

    /// Register a general handler that receives all events
    pub fn register_general(&self, handler: EventHandler) -> HandlerId {
        let mut registry = self.shared.registry();
        if let Some(entry) = registry.general.iter().find(|e| Arc::ptr_eq(&e.handler, &handler)) {
            return entry.id;
        }

        let handler_id = self.generate_handler_id();
        registry.general.push(HandlerEntry {
            id: handler_id,
            handler,
        });
        handler_id
    }

    /// Unregister a general handler
    pub fn unregister_general(&self, handler: &EventHandler) -> bool {
        let mut registry = self.shared.registry();
        let before = registry.general.len();
        registry.general.retain(|entry| !Arc::ptr_eq(&entry.handler, handler));
        registry.general.len() != before
    }

    /// Number of handlers registered for `event_type`, general handlers excluded
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.shared
            .registry()
            .handlers
            .get(event_type)
            .map_or(0, Vec::len)
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.counters.snapshot()
    }
}

impl Default for EventEngine {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Drop for EventEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Dispatch loop of one run. It only consults its own `running` flag, so a
/// thread left behind by a stop from inside a handler never resumes after a
/// restart.
fn run_processing(
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    receiver: sync_mpsc::Receiver<Event>,
) {
    loop {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if !running.load(Ordering::Acquire) {
                    shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                shared.process_event(&event, &running);
            }
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let discarded = receiver.try_iter().count() as u64;
    if discarded > 0 {
        shared.counters.dropped.fetch_add(discarded, Ordering::Relaxed);
        debug!(discarded, "Queued events discarded on stop");
    }
}

/// Post a timer event every `interval`. The next deadline advances from the
/// previous deadline, not from when the event was sent; if the thread falls
/// more than a whole interval behind it re-anchors on the current time instead
/// of bursting.
fn run_timer(
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    sender: sync_mpsc::Sender<Event>,
    stop: sync_mpsc::Receiver<()>,
    interval: Duration,
) {
    let mut next_fire = Instant::now() + interval;

    loop {
        let wait = next_fire.saturating_duration_since(Instant::now());
        match stop.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        if !running.load(Ordering::Acquire)
            || !shared.send(&sender, Event::new(EVENT_TIMER, None))
        {
            break;
        }

        next_fire = next_deadline(next_fire, interval, Instant::now());
    }
}

/// Deadline following `previous`, re-anchored on `now` when a whole interval was missed
fn next_deadline(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let next = previous + interval;
    if next <= now {
        now + interval
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(2);

    fn forwarding_handler(tx: mpsc::Sender<String>) -> EventHandler {
        let tx = Mutex::new(tx);
        Arc::new(move |event: &Event| {
            let _ = tx.lock().unwrap().send(event.event_type.clone());
        })
    }

    fn wait_dispatched(engine: &EventEngine, count: u64) {
        let deadline = Instant::now() + WAIT;
        while engine.stats().dispatched < count {
            assert!(Instant::now() < deadline, "timed out waiting for dispatch");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_register_then_put_delivers_once() {
        let engine = EventEngine::new(Duration::from_secs(60));
        let (tx, rx) = mpsc::channel();
        engine.register("eTest", forwarding_handler(tx));
        engine.start().unwrap();

        assert!(engine.put(Event::new("eTest", None)));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "eTest");

        engine.stop();
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.stats().delivered, 1);
    }

    #[test]
    fn test_duplicate_register_is_idempotent() {
        let engine = EventEngine::new(Duration::from_secs(60));
        let (tx, rx) = mpsc::channel();
        let handler = forwarding_handler(tx);

        let first = engine.register("eTest", Arc::clone(&handler));
        let second = engine.register("eTest", Arc::clone(&handler));
        assert_eq!(first, second);
        assert_eq!(engine.handler_count("eTest"), 1);

        engine.start().unwrap();
        engine.put(Event::new("eTest", None));
        wait_dispatched(&engine, 1);
        engine.stop();

        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let engine = EventEngine::new(Duration::from_secs(60));
        let (tx, rx) = mpsc::channel();
        let handler = forwarding_handler(tx);
        engine.register("eTest", Arc::clone(&handler));
        engine.start().unwrap();

        engine.put(Event::new("eTest", None));
        wait_dispatched(&engine, 1);

        assert!(engine.unregister("eTest", &handler));
        assert!(!engine.unregister("eTest", &handler));
        assert_eq!(engine.handler_count("eTest"), 0);

        engine.put(Event::new("eTest", None));
        wait_dispatched(&engine, 2);
        engine.stop();

        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_unregister_by_id() {
        let engine = EventEngine::default();
        let (tx, _rx) = mpsc::channel();
        let id = engine.register("eTest", forwarding_handler(tx));

        assert!(engine.unregister_by_id("eTest", id));
        assert!(!engine.unregister_by_id("eTest", id));
        assert!(!engine.unregister_by_id("eOther", id));
    }

    #[test]
    fn test_put_while_stopped_is_dropped() {
        let engine = EventEngine::new(Duration::from_secs(60));
        assert!(!engine.put(Event::new("eTest", None)));
        assert_eq!(engine.stats().dropped, 1);

        // Nothing buffered before start is replayed
        let (tx, rx) = mpsc::channel();
        engine.register("eTest", forwarding_handler(tx));
        engine.start().unwrap();
        engine.put(Event::new("eMarker", None));
        wait_dispatched(&engine, 1);
        engine.stop();
        assert!(rx.try_recv().is_err());

        assert!(!engine.put(Event::new("eTest", None)));
        assert_eq!(engine.stats().dropped, 2);
    }

    #[test]
    fn test_lifecycle_no_ops() {
        let engine = EventEngine::new(Duration::from_secs(60));
        engine.stop();
        assert!(!engine.is_active());

        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_active());

        let (tx, rx) = mpsc::channel();
        engine.register("eTest", forwarding_handler(tx));
        engine.put(Event::new("eTest", None));
        wait_dispatched(&engine, 1);

        engine.stop();
        engine.stop();
        assert!(!engine.is_active());
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_restart_after_stop() {
        let engine = EventEngine::new(Duration::from_secs(60));
        let (tx, rx) = mpsc::channel();
        engine.register("eTest", forwarding_handler(tx));

        engine.start().unwrap();
        engine.stop();
        engine.start().unwrap();

        engine.put(Event::new("eTest", None));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "eTest");
        engine.stop();
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let engine = EventEngine::new(Duration::from_secs(60));
        let bad: EventHandler = Arc::new(|_event: &Event| panic!("bad handler"));
        let (tx, rx) = mpsc::channel();

        engine.register("eTest", bad);
        engine.register("eTest", forwarding_handler(tx));
        engine.start().unwrap();

        engine.put(Event::new("eTest", None));
        engine.put(Event::new("eTest", None));
        wait_dispatched(&engine, 2);
        engine.stop();

        assert_eq!(rx.try_iter().count(), 2);
        let stats = engine.stats();
        assert_eq!(stats.handler_panics, 2);
        assert_eq!(stats.delivered, 2);
    }

    #[test]
    fn test_general_handler_receives_all_types() {
        let engine = EventEngine::new(Duration::from_secs(60));
        let (tx, rx) = mpsc::channel();
        let handler = forwarding_handler(tx);
        engine.register_general(Arc::clone(&handler));
        engine.register_general(Arc::clone(&handler));
        engine.start().unwrap();

        engine.put(Event::new("eA", None));
        engine.put(Event::new("eB", None));
        wait_dispatched(&engine, 2);

        assert!(engine.unregister_general(&handler));
        engine.put(Event::new("eC", None));
        wait_dispatched(&engine, 3);
        engine.stop();

        let received: Vec<String> = rx.try_iter().collect();
        assert_eq!(received, vec!["eA".to_string(), "eB".to_string()]);
    }

    #[test]
    fn test_fifo_order() {
        let engine = EventEngine::new(Duration::from_secs(60));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let handler: EventHandler = Arc::new(move |event: &Event| {
            if let Some(n) = event.data::<usize>() {
                seen_clone.lock().unwrap().push(*n);
            }
        });
        engine.register_general(handler);
        engine.start().unwrap();

        for n in 0..100usize {
            let event_type = if n % 2 == 0 { "eEven" } else { "eOdd" };
            engine.put(Event::with_data(event_type, n));
        }
        wait_dispatched(&engine, 100);
        engine.stop();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_timer_events() {
        let engine = EventEngine::new(Duration::from_millis(20));
        let (tx, rx) = mpsc::channel();
        engine.register(EVENT_TIMER, forwarding_handler(tx));
        engine.start().unwrap();

        for _ in 0..3 {
            assert_eq!(rx.recv_timeout(WAIT).unwrap(), EVENT_TIMER);
        }
        engine.stop();
    }

    #[test]
    fn test_timer_cadence_does_not_drift() {
        let interval = Duration::from_millis(20);
        let engine = EventEngine::new(interval);
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        engine.register(
            EVENT_TIMER,
            Arc::new(move |_event: &Event| {
                let _ = tx.lock().unwrap().send(Instant::now());
            }),
        );

        let started = Instant::now();
        engine.start().unwrap();
        let slack = Duration::from_millis(100);
        for k in 1..=25u32 {
            let fired = rx.recv_timeout(WAIT).unwrap();
            let scheduled = started + interval * k;
            assert!(fired >= scheduled, "timer event {} fired early", k);
            assert!(
                fired <= scheduled + slack,
                "timer event {} late by {:?}",
                k,
                fired - scheduled
            );
        }
        engine.stop();
    }

    #[test]
    fn test_timer_keeps_cadence_while_dispatch_blocks() {
        let interval = Duration::from_millis(20);
        let engine = EventEngine::new(interval);
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let blocked = AtomicBool::new(false);
        engine.register(
            EVENT_TIMER,
            Arc::new(move |_event: &Event| {
                if !blocked.swap(true, Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(200));
                }
                let _ = tx.lock().unwrap().send(());
            }),
        );
        engine.start().unwrap();

        rx.recv_timeout(WAIT).unwrap();
        // Timer events kept being queued while the first handler call slept
        assert!(engine.stats().enqueued >= 6);
        for _ in 0..5 {
            rx.recv_timeout(Duration::from_millis(50)).unwrap();
        }
        engine.stop();
    }

    #[test]
    fn test_next_deadline() {
        let interval = Duration::from_millis(20);
        let base = Instant::now();

        // On time: advance from the previous deadline, not from now
        let now = base + Duration::from_millis(5);
        assert_eq!(next_deadline(base, interval, now), base + interval);

        // A whole interval behind: re-anchor instead of bursting
        let now = base + Duration::from_millis(75);
        assert_eq!(next_deadline(base, interval, now), now + interval);

        let now = base + interval;
        assert_eq!(next_deadline(base, interval, now), now + interval);
    }

    #[test]
    fn test_restart_after_stop_from_handler() {
        let engine = Arc::new(EventEngine::new(Duration::from_secs(60)));
        let weak = Arc::downgrade(&engine);
        let late = Arc::new(AtomicUsize::new(0));
        let skipped = Arc::new(AtomicUsize::new(0));

        engine.register(
            "eStop",
            Arc::new(move |_event: &Event| {
                if let Some(engine) = weak.upgrade() {
                    engine.stop();
                }
                thread::sleep(Duration::from_millis(100));
            }),
        );
        let counter = Arc::clone(&skipped);
        engine.register(
            "eStop",
            Arc::new(move |_event: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = Arc::clone(&late);
        engine.register(
            "eLate",
            Arc::new(move |_event: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        engine.start().unwrap();

        engine.put(Event::new("eStop", None));
        for _ in 0..5 {
            engine.put(Event::new("eLate", None));
        }

        let deadline = Instant::now() + WAIT;
        while engine.is_active() {
            assert!(Instant::now() < deadline, "engine never stopped");
            thread::sleep(Duration::from_millis(1));
        }
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        engine.stop();

        assert_eq!(late.load(Ordering::SeqCst), 0);
        assert_eq!(skipped.load(Ordering::SeqCst), 0);
        assert_eq!(engine.stats().dropped, 5);
    }

    #[test]
    fn test_unregister_inside_handler() {
        let engine = Arc::new(EventEngine::new(Duration::from_secs(60)));
        let count = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let weak = Arc::downgrade(&engine);
        let count_clone = Arc::clone(&count);
        let slot: Arc<Mutex<Option<EventHandler>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);
        let once: EventHandler = Arc::new(move |_event: &Event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            let me = slot_clone.lock().unwrap().clone();
            if let (Some(engine), Some(me)) = (weak.upgrade(), me) {
                engine.unregister("eTest", &me);
            }
        });
        *slot.lock().unwrap() = Some(Arc::clone(&once));

        engine.register("eTest", once);
        engine.register("eTest", forwarding_handler(tx));
        engine.start().unwrap();

        engine.put(Event::new("eTest", None));
        engine.put(Event::new("eTest", None));
        wait_dispatched(&engine, 2);
        engine.stop();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_iter().count(), 2);
        slot.lock().unwrap().take();
    }

    #[test]
    fn test_no_callbacks_after_stop() {
        let engine = EventEngine::new(Duration::from_secs(60));
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        engine.register(
            "eSlow",
            Arc::new(move |_event: &Event| {
                thread::sleep(Duration::from_millis(1));
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        engine.start().unwrap();

        for _ in 0..500 {
            engine.put(Event::new("eSlow", None));
        }
        engine.stop();

        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
        assert!(after_stop < 500);
    }

    #[test]
    fn test_stop_from_inside_handler() {
        let engine = Arc::new(EventEngine::new(Duration::from_secs(60)));
        let weak = Arc::downgrade(&engine);
        let (tx, rx) = mpsc::channel();

        engine.register(
            "eStop",
            Arc::new(move |_event: &Event| {
                if let Some(engine) = weak.upgrade() {
                    engine.stop();
                }
            }),
        );
        engine.register("eAfter", forwarding_handler(tx));
        engine.start().unwrap();

        engine.put(Event::new("eStop", None));
        wait_dispatched(&engine, 1);
        assert!(!engine.is_active());
        assert!(!engine.put(Event::new("eAfter", None)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_payload_downcast() {
        let event = Event::with_data("eTest", 42u32);
        assert_eq!(event.data::<u32>(), Some(&42));
        assert!(event.data::<String>().is_none());
        assert_eq!(event.data_arc::<u32>().as_deref(), Some(&42));

        let empty = Event::new(EVENT_TIMER, None);
        assert!(empty.data::<u32>().is_none());
    }
}
