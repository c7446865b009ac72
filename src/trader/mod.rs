//! Trader module - Core trading terminal functionality.
//!
//! - **constant**: Direction, Exchange and OrderType
//! - **object**: Data structures for ticks, orders, trades, positions and requests
//! - **event**: Event type definitions for the event-driven architecture
//! - **gateway**: Synthetic tick generator and the order executor seam
//! - **engine**: Main engine façade and pluggable function engines
//! - **monitor**: Headless table models fed from the event bus
//! - **setting**: Global settings management
//! - **logger**: Logging initialization
//! - **utility**: Symbol helpers, paths and rounding

pub mod constant;
pub mod engine;
pub mod event;
pub mod gateway;
pub mod logger;
pub mod monitor;
pub mod object;
pub mod setting;
pub mod utility;

// Re-exports for convenience
pub use constant::{Direction, Exchange, OrderType};
pub use engine::{BaseEngine, LogEngine, MainEngine};
pub use event::*;
pub use gateway::{OrderAck, OrderExecutor, TickGenerator};
pub use logger::{init_logger, CRITICAL, DEBUG, ERROR, INFO, WARNING};
pub use monitor::{
    Cell, CellColor, CellKind, ColumnDef, Monitor, MonitorData, PositionMonitor, Row,
    TickMonitor, TradeMonitor,
};
pub use object::{
    AccountData, CancelRequest, LogData, OrderData, OrderRequest, PositionData,
    SubscribeRequest, TickData, TradeData,
};
pub use setting::{get_settings, SettingValue, Settings, SETTINGS};
pub use utility::{extract_vt_symbol, generate_vt_symbol, round_to};
