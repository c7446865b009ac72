//! Market data and order collaborators of the terminal.
//!
//! [`TickGenerator`] stands in for an exchange feed: it synthesizes one quote
//! snapshot per call and publishes it on the event bus. There is no
//! connection and no streaming. [`OrderExecutor`] is the seam for whatever
//! matches orders; the core ships no implementation of it.

use chrono::Utc;
use rand::Rng;
use rand_distr::{Distribution, LogNormal, StandardNormal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

use super::constant::Exchange;
use super::event::EVENT_TICK;
use super::object::{CancelRequest, OrderRequest, SubscribeRequest, TickData};
use super::utility::{floor_to, generate_vt_symbol, round_to};
use crate::error::{EngineError, Result};
use crate::event::{Event, EventEngine};

/// Shape parameters of the lognormal anchor price draw
const ANCHOR_MU: f64 = 3.0;
const ANCHOR_SIGMA: f64 = 1.0;

/// Distance of the session high/low from the anchor
const RANGE_OFFSET: f64 = 3.0;

/// Bid sits above last and ask below it; the synthetic book is inverted
const BID_OFFSET: f64 = 0.1;
const ASK_OFFSET: f64 = 1.0;

/// Best-level volume is N(mean, std) floored to whole lots
const VOLUME_MEAN: f64 = 2000.0;
const VOLUME_STD: f64 = 500.0;
const VOLUME_LOT: f64 = 100.0;

const PRICE_TICK: f64 = 0.01;

/// Display name stamped on every synthetic tick
const TICK_NAME: &str = "stock";

/// Synthetic quote source for one instrument.
///
/// The anchor price is drawn once when the generator is built. The terminal
/// builds a fresh generator for every subscribe call, so two subscriptions
/// to the same symbol get unrelated anchors.
pub struct TickGenerator {
    event_engine: Arc<EventEngine>,
    symbol: String,
    exchange: Exchange,
    anchor_price: f64,
}

impl TickGenerator {
    pub fn new(event_engine: Arc<EventEngine>, req: &SubscribeRequest) -> Result<Self> {
        Self::with_rng(event_engine, req, &mut rand::rng())
    }

    /// Build a generator drawing its anchor from `rng`
    pub fn with_rng<R: Rng + ?Sized>(
        event_engine: Arc<EventEngine>,
        req: &SubscribeRequest,
        rng: &mut R,
    ) -> Result<Self> {
        req.validate()?;

        let anchor = LogNormal::new(ANCHOR_MU, ANCHOR_SIGMA)
            .map_err(|e| EngineError::invalid(format!("anchor distribution: {}", e)))?;

        Ok(Self {
            event_engine,
            symbol: req.symbol.clone(),
            exchange: req.exchange,
            anchor_price: round_to(anchor.sample(rng), PRICE_TICK),
        })
    }

    /// Build a generator for `symbol`/`exchange` and publish one tick from it
    pub fn generate(
        event_engine: Arc<EventEngine>,
        symbol: &str,
        exchange: Exchange,
    ) -> Result<Arc<TickData>> {
        let req = SubscribeRequest::new(symbol.to_string(), exchange);
        Ok(Self::new(event_engine, &req)?.generate_tick())
    }

    pub fn anchor_price(&self) -> f64 {
        self.anchor_price
    }

    pub fn vt_symbol(&self) -> String {
        generate_vt_symbol(&self.symbol, self.exchange)
    }

    /// Draw one snapshot around the anchor without publishing it
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TickData {
        let anchor = self.anchor_price;
        let mut tick = TickData::new(self.symbol.clone(), self.exchange, Utc::now());

        tick.name = TICK_NAME.to_string();
        tick.open_price = anchor;
        tick.high_price = anchor + RANGE_OFFSET;
        tick.low_price = anchor - RANGE_OFFSET;

        let noise: f64 = StandardNormal.sample(rng);
        tick.last_price = anchor + round_to(noise, PRICE_TICK);
        tick.bid_price_1 = tick.last_price + BID_OFFSET;
        tick.ask_price_1 = tick.last_price - ASK_OFFSET;

        tick.bid_volume_1 = draw_volume(rng);
        tick.ask_volume_1 = draw_volume(rng);
        tick
    }

    /// Draw one snapshot and publish it as a single tick event
    pub fn generate_tick(&self) -> Arc<TickData> {
        let tick = Arc::new(self.sample(&mut rand::rng()));
        self.on_tick(Arc::clone(&tick));
        tick
    }

    fn on_tick(&self, tick: Arc<TickData>) {
        let published = self.event_engine.put(Event::new(EVENT_TICK, Some(tick)));
        trace!(vt_symbol = %self.vt_symbol(), published, "Synthetic tick generated");
    }
}

fn draw_volume<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    let raw = (VOLUME_MEAN + VOLUME_STD * z).round();
    floor_to(raw, VOLUME_LOT).max(0.0)
}

/// Answer of an [`OrderExecutor`] to a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub orderid: String,
    pub accepted: bool,
    pub message: String,
}

impl OrderAck {
    pub fn accepted(orderid: impl Into<String>) -> Self {
        Self {
            orderid: orderid.into(),
            accepted: true,
            message: String::new(),
        }
    }

    pub fn rejected(orderid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            orderid: orderid.into(),
            accepted: false,
            message: message.into(),
        }
    }
}

/// Order matching and accounting live behind this trait.
///
/// Implementations may publish ORDER/TRADE/POSITION/ACCOUNT events on their
/// own event engine handle. Calls arrive on the caller's thread.
pub trait OrderExecutor: Send + Sync {
    fn submit(&self, req: &OrderRequest) -> Result<OrderAck>;

    fn cancel(&self, req: &CancelRequest) -> Result<()> {
        Err(EngineError::invalid(format!(
            "cancel of order '{}' is not supported",
            req.orderid
        )))
    }
}
