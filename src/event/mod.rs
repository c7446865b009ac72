//! Event-driven framework for the trading terminal.
//! Based on the VeighNa framework's event system.

mod engine;

pub use engine::{EngineStats, Event, EventEngine, EventHandler, HandlerId, EVENT_TIMER};
