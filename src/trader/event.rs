//! Event type strings used in the trading terminal.
//!
//! Together with [`EVENT_TIMER`] these form the closed set of tags the
//! terminal publishes.

pub use crate::event::EVENT_TIMER;

/// Tick data event type
pub const EVENT_TICK: &str = "eTick.";

/// Trade data event type
pub const EVENT_TRADE: &str = "eTrade.";

/// Order event type
pub const EVENT_ORDER: &str = "eOrder.";

/// Position data event type
pub const EVENT_POSITION: &str = "ePosition.";

/// Account data event type
pub const EVENT_ACCOUNT: &str = "eAccount.";

/// Contract data event type
pub const EVENT_CONTRACT: &str = "eContract.";

/// Log event type
pub const EVENT_LOG: &str = "eLog";
