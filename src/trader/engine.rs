//! Engine module for the trading terminal core functionality.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::constant::Exchange;
use super::event::*;
use super::gateway::{OrderAck, OrderExecutor, TickGenerator};
use super::logger::{DEBUG, INFO, WARNING};
use super::object::{CancelRequest, LogData, OrderRequest, SubscribeRequest, TickData};
use super::setting::{Settings, SETTINGS};
use crate::error::{EngineError, Result};
use crate::event::{Event, EventEngine, EventHandler};

/// Base engine trait for implementing function engines
pub trait BaseEngine: Send + Sync {
    /// Get the engine name
    fn engine_name(&self) -> &str;

    /// Close the engine
    fn close(&self) {}
}

/// Log engine forwarding log events to `tracing`
pub struct LogEngine {
    event_engine: Arc<EventEngine>,
    handler: EventHandler,
    active: bool,
}

impl LogEngine {
    pub const ENGINE_NAME: &'static str = "log";

    /// Create a new LogEngine, listening only if `log.active` is set
    pub fn new(event_engine: Arc<EventEngine>, settings: &Settings) -> Self {
        let active = settings.get_bool("log.active").unwrap_or(true);
        let handler: EventHandler = Arc::new(|event: &Event| {
            if let Some(log) = event.data::<LogData>() {
                Self::process_log(log);
            }
        });

        if active {
            event_engine.register(EVENT_LOG, Arc::clone(&handler));
        }

        Self {
            event_engine,
            handler,
            active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Process log event
    pub fn process_log(log: &LogData) {
        let source = &log.source;
        let msg = &log.msg;

        match log.level {
            i32::MIN..=DEBUG => debug!(source = %source, "{}", msg),
            l if l <= INFO => info!(source = %source, "{}", msg),
            l if l <= WARNING => warn!(source = %source, "{}", msg),
            _ => error!(source = %source, "{}", msg),
        }
    }
}

impl BaseEngine for LogEngine {
    fn engine_name(&self) -> &str {
        Self::ENGINE_NAME
    }

    fn close(&self) {
        self.event_engine.unregister(EVENT_LOG, &self.handler);
    }
}

/// Main engine acts as the core of the trading terminal.
///
/// It owns the event engine lifecycle, routes subscribe and order requests
/// onto the event bus and keeps a registry of named function engines.
pub struct MainEngine {
    event_engine: Arc<EventEngine>,
    engines: RwLock<HashMap<String, Arc<dyn BaseEngine>>>,
    exchanges: Vec<Exchange>,

    subscriptions: Arc<RwLock<BTreeMap<String, SubscribeRequest>>>,
    order_executor: RwLock<Option<Arc<dyn OrderExecutor>>>,
    timer_feed: Mutex<Option<EventHandler>>,
    closed: AtomicBool,
}

impl MainEngine {
    /// Create a MainEngine on `event_engine` using the global settings.
    /// The event engine is started here.
    pub fn new(event_engine: Arc<EventEngine>) -> Result<Self> {
        Self::with_settings(event_engine, &SETTINGS)
    }

    /// Create a MainEngine with its own event engine, timer cadence from `event.interval_ms`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let interval_ms = settings.get_int("event.interval_ms").unwrap_or(1000).max(1) as u64;
        let event_engine = Arc::new(EventEngine::new(Duration::from_millis(interval_ms)));
        Self::with_settings(event_engine, settings)
    }

    pub fn with_settings(event_engine: Arc<EventEngine>, settings: &Settings) -> Result<Self> {
        event_engine.start()?;

        let engine = Self {
            event_engine,
            engines: RwLock::new(HashMap::new()),
            exchanges: Exchange::all(),
            subscriptions: Arc::new(RwLock::new(BTreeMap::new())),
            order_executor: RwLock::new(None),
            timer_feed: Mutex::new(None),
            closed: AtomicBool::new(false),
        };

        engine.add_engine(|_, event_engine| LogEngine::new(event_engine, settings));

        if settings.get_bool("feed.timer_resample").unwrap_or(false) {
            engine.start_timer_feed();
        }

        info!("Main engine initialized");
        Ok(engine)
    }

    /// Get the event engine handle
    pub fn event_engine(&self) -> &Arc<EventEngine> {
        &self.event_engine
    }

    /// Add a function engine built by `factory`.
    ///
    /// An engine already registered under the same name is closed and replaced.
    pub fn add_engine<E, F>(&self, factory: F) -> Arc<E>
    where
        E: BaseEngine + 'static,
        F: FnOnce(&MainEngine, Arc<EventEngine>) -> E,
    {
        let engine = Arc::new(factory(self, Arc::clone(&self.event_engine)));
        let engine_name = engine.engine_name().to_string();

        let previous = self
            .engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(engine_name.clone(), Arc::clone(&engine) as Arc<dyn BaseEngine>);

        if let Some(previous) = previous {
            warn!(engine = %engine_name, "Replacing existing engine");
            previous.close();
        }

        debug!(engine = %engine_name, "Engine added");
        engine
    }

    /// Get a function engine by name
    pub fn get_engine(&self, engine_name: &str) -> Option<Arc<dyn BaseEngine>> {
        self.engines.read().ok()?.get(engine_name).cloned()
    }

    /// Get all function engine names
    pub fn get_all_engine_names(&self) -> Vec<String> {
        self.engines
            .read()
            .map(|engines| engines.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Get all exchanges
    pub fn get_all_exchanges(&self) -> Vec<Exchange> {
        self.exchanges.clone()
    }

    /// Attach the collaborator that executes orders
    pub fn set_order_executor(&self, executor: Arc<dyn OrderExecutor>) {
        *self
            .order_executor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(executor);
    }

    fn order_executor(&self) -> Option<Arc<dyn OrderExecutor>> {
        self.order_executor.read().ok()?.clone()
    }

    /// Write a log message
    pub fn write_log(&self, msg: impl Into<String>, source: &str) {
        let log = LogData::new(source.to_string(), msg.into());
        self.event_engine.put(Event::with_data(EVENT_LOG, log));
    }

    /// Subscribe to tick data.
    ///
    /// Records the subscription and publishes exactly one freshly sampled
    /// tick, which is also returned. Every call builds a new generator, so the
    /// anchor price is redrawn each time.
    pub fn subscribe(&self, req: &SubscribeRequest) -> Result<Arc<TickData>> {
        req.validate()?;
        let vt_symbol = req.vt_symbol();
        self.write_log(format!("Subscribe -> {}", vt_symbol), "MainEngine");

        let generator = TickGenerator::new(Arc::clone(&self.event_engine), req)?;
        if let Ok(mut subscriptions) = self.subscriptions.write() {
            subscriptions.insert(vt_symbol, req.clone());
        }

        Ok(generator.generate_tick())
    }

    /// Drop a subscription from the recurring feed
    pub fn unsubscribe(&self, vt_symbol: &str) -> bool {
        self.subscriptions
            .write()
            .map(|mut subscriptions| subscriptions.remove(vt_symbol).is_some())
            .unwrap_or(false)
    }

    /// Get all active subscriptions, ordered by vt_symbol
    pub fn get_all_subscriptions(&self) -> Vec<SubscribeRequest> {
        self.subscriptions
            .read()
            .map(|subscriptions| subscriptions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Send an order.
    ///
    /// The request is validated, the instrument is sampled once more and the
    /// request itself is published verbatim as an order event. Without an
    /// attached [`OrderExecutor`] nothing else happens and `Ok(None)` is
    /// returned.
    pub fn send_order(&self, req: &OrderRequest) -> Result<Option<OrderAck>> {
        req.validate()?;
        self.write_log(
            format!(
                "Send order -> {} {} {} {}@{}",
                req.vt_symbol(),
                req.direction,
                req.order_type,
                req.volume,
                req.price
            ),
            "MainEngine",
        );

        self.subscribe(&req.subscribe_request())?;
        self.event_engine.put(Event::with_data(EVENT_ORDER, req.clone()));

        match self.order_executor() {
            Some(executor) => executor.submit(req).map(Some),
            None => Ok(None),
        }
    }

    /// Cancel an order through the attached executor
    pub fn cancel_order(&self, req: &CancelRequest) -> Result<()> {
        self.write_log(format!("Cancel order -> {}", req.orderid), "MainEngine");
        match self.order_executor() {
            Some(executor) => executor.cancel(req),
            None => Err(EngineError::invalid("no order executor attached")),
        }
    }

    /// Resample every active subscription on each timer event.
    /// Returns `false` if the feed was already running.
    pub fn start_timer_feed(&self) -> bool {
        let mut slot = self.timer_feed.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }

        let event_engine = Arc::downgrade(&self.event_engine);
        let subscriptions = Arc::clone(&self.subscriptions);
        let handler: EventHandler = Arc::new(move |_event: &Event| {
            let Some(event_engine) = event_engine.upgrade() else {
                return;
            };
            let requests: Vec<SubscribeRequest> = subscriptions
                .read()
                .map(|subscriptions| subscriptions.values().cloned().collect())
                .unwrap_or_default();

            for req in &requests {
                match TickGenerator::new(Arc::clone(&event_engine), req) {
                    Ok(generator) => {
                        generator.generate_tick();
                    }
                    Err(e) => warn!(vt_symbol = %req.vt_symbol(), "Timer resample failed: {}", e),
                }
            }
        });

        self.event_engine.register(EVENT_TIMER, Arc::clone(&handler));
        *slot = Some(handler);
        info!("Timer feed started");
        true
    }

    /// Stop the recurring feed. Returns `false` if it was not running.
    pub fn stop_timer_feed(&self) -> bool {
        let handler = self
            .timer_feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handler {
            Some(handler) => {
                self.event_engine.unregister(EVENT_TIMER, &handler);
                info!("Timer feed stopped");
                true
            }
            None => false,
        }
    }

    /// Close the main engine. Function engines are closed first, then the
    /// event engine is stopped. Calling it again does nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.stop_timer_feed();

        // Close all engines
        if let Ok(engines) = self.engines.read() {
            for engine in engines.values() {
                engine.close();
            }
        }

        // Stop event engine last so no timer event arrives after this
        self.event_engine.stop();
        info!("Main engine closed");
    }
}

impl Drop for MainEngine {
    fn drop(&mut self) {
        self.close();
    }
}
