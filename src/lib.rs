//! Sim Trader - the event core of a simulated trading terminal
//!
//! This crate provides:
//!
//! - A threaded publish/subscribe event engine with a periodic timer
//! - A synthetic tick generator standing in for an exchange feed
//! - A main engine façade for subscriptions, orders and function engines
//! - Headless monitors that turn events into table rows
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sim_trader::{EventEngine, Exchange, MainEngine, SubscribeRequest};
//!
//! let event_engine = Arc::new(EventEngine::new(Duration::from_secs(1)));
//! let engine = MainEngine::new(event_engine).unwrap();
//!
//! let req = SubscribeRequest::new("AAPL".to_string(), Exchange::Smart);
//! let tick = engine.subscribe(&req).unwrap();
//! println!("{} last {}", tick.vt_symbol(), tick.last_price);
//!
//! engine.close();
//! ```

pub mod error;
pub mod event;
pub mod trader;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use event::{EngineStats, Event, EventEngine, EventHandler, HandlerId, EVENT_TIMER};
pub use trader::{
    // Constants
    Direction, Exchange, OrderType,
    // Data objects
    AccountData, LogData, OrderData, PositionData, TickData, TradeData,
    // Requests
    CancelRequest, OrderRequest, SubscribeRequest,
    // Engine
    BaseEngine, LogEngine, MainEngine,
    // Gateway
    OrderAck, OrderExecutor, TickGenerator,
    // Monitor
    Monitor, MonitorData, PositionMonitor, TickMonitor, TradeMonitor,
    // Settings
    Settings, SETTINGS,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
