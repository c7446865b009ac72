//! Basic data structures used for general trading function in the trading terminal.
//!
//! Every record is a plain value. Once published inside an [`crate::Event`]
//! it sits behind an `Arc` and is never mutated again; producers build a new
//! value for every update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::constant::{Direction, Exchange, OrderType};
use super::logger::INFO;
use super::utility::{extract_vt_symbol, generate_vt_symbol};
use crate::error::{EngineError, Result};

fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(EngineError::invalid("symbol must not be empty"));
    }
    Ok(())
}

/// Tick data contains information about:
/// - last trade in market
/// - orderbook snapshot (best level only)
/// - intraday market statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickData {
    pub symbol: String,
    pub exchange: Exchange,
    pub datetime: DateTime<Utc>,

    pub name: String,
    pub volume: f64,
    pub open_interest: f64,
    pub last_price: f64,
    pub last_volume: f64,
    pub limit_up: f64,
    pub limit_down: f64,

    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub pre_close: f64,

    pub bid_price_1: f64,
    pub ask_price_1: f64,
    pub bid_volume_1: f64,
    pub ask_volume_1: f64,
}

impl TickData {
    /// Create a new TickData
    pub fn new(symbol: String, exchange: Exchange, datetime: DateTime<Utc>) -> Self {
        Self {
            symbol,
            exchange,
            datetime,
            name: String::new(),
            volume: 0.0,
            open_interest: 0.0,
            last_price: 0.0,
            last_volume: 0.0,
            limit_up: 0.0,
            limit_down: 0.0,
            open_price: 0.0,
            high_price: 0.0,
            low_price: 0.0,
            pre_close: 0.0,
            bid_price_1: 0.0,
            ask_price_1: 0.0,
            bid_volume_1: 0.0,
            ask_volume_1: 0.0,
        }
    }

    /// Get vt_symbol (symbol.exchange)
    pub fn vt_symbol(&self) -> String {
        generate_vt_symbol(&self.symbol, self.exchange)
    }

    /// Percentage change against the previous close, if one is known
    pub fn change_percent(&self) -> Option<f64> {
        if self.pre_close == 0.0 {
            return None;
        }
        Some((self.last_price / self.pre_close - 1.0) * 100.0)
    }
}

/// Order data contains information for tracking latest status of a specific order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    pub symbol: String,
    pub exchange: Exchange,
    pub orderid: String,

    pub order_type: OrderType,
    pub direction: Direction,
    pub price: f64,
    pub volume: f64,
    pub traded: f64,
    pub datetime: Option<DateTime<Utc>>,
}

impl OrderData {
    /// Create a new OrderData
    pub fn new(symbol: String, exchange: Exchange, orderid: String, direction: Direction) -> Self {
        Self {
            symbol,
            exchange,
            orderid,
            order_type: OrderType::Limit,
            direction,
            price: 0.0,
            volume: 0.0,
            traded: 0.0,
            datetime: None,
        }
    }

    /// Get vt_symbol (symbol.exchange)
    pub fn vt_symbol(&self) -> String {
        generate_vt_symbol(&self.symbol, self.exchange)
    }

    /// Volume not yet traded
    pub fn remaining(&self) -> f64 {
        (self.volume - self.traded).max(0.0)
    }

    /// Create cancel request object from order
    pub fn create_cancel_request(&self) -> CancelRequest {
        CancelRequest::new(self.orderid.clone(), self.symbol.clone(), self.exchange)
    }
}

/// Trade data contains information of a fill of an order.
/// One order can have several trade fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeData {
    pub symbol: String,
    pub exchange: Exchange,
    pub orderid: String,
    pub tradeid: String,
    pub direction: Direction,

    pub price: f64,
    pub volume: f64,
    pub datetime: Option<DateTime<Utc>>,
}

impl TradeData {
    /// Create a new TradeData
    pub fn new(
        symbol: String,
        exchange: Exchange,
        orderid: String,
        tradeid: String,
        direction: Direction,
    ) -> Self {
        Self {
            symbol,
            exchange,
            orderid,
            tradeid,
            direction,
            price: 0.0,
            volume: 0.0,
            datetime: None,
        }
    }

    /// Get vt_symbol (symbol.exchange)
    pub fn vt_symbol(&self) -> String {
        generate_vt_symbol(&self.symbol, self.exchange)
    }

    /// Get vt_tradeid (vt_symbol.tradeid)
    pub fn vt_tradeid(&self) -> String {
        format!("{}.{}", self.vt_symbol(), self.tradeid)
    }
}

/// Position data is used for tracking each individual position holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionData {
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,

    pub all_volume: f64,
    pub volume: f64,
    pub frozen: f64,
    pub price: f64,
    pub pnl: f64,
    pub yd_volume: f64,
}

impl PositionData {
    /// Create a new PositionData
    pub fn new(symbol: String, exchange: Exchange, direction: Direction) -> Self {
        Self {
            symbol,
            exchange,
            direction,
            all_volume: 0.0,
            volume: 0.0,
            frozen: 0.0,
            price: 0.0,
            pnl: 0.0,
            yd_volume: 0.0,
        }
    }

    /// Get vt_symbol (symbol.exchange)
    pub fn vt_symbol(&self) -> String {
        generate_vt_symbol(&self.symbol, self.exchange)
    }

    /// Get vt_positionid (vt_symbol.direction)
    pub fn vt_positionid(&self) -> String {
        format!("{}.{}", self.vt_symbol(), self.direction)
    }
}

/// Account data contains information about balance, frozen and available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    pub accountid: String,

    pub balance: f64,
    pub frozen: f64,
}

impl AccountData {
    /// Create a new AccountData
    pub fn new(accountid: String) -> Self {
        Self {
            accountid,
            balance: 0.0,
            frozen: 0.0,
        }
    }

    /// Get available balance
    pub fn available(&self) -> f64 {
        self.balance - self.frozen
    }
}

/// Log data is used for recording log messages in log files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    pub source: String,
    pub msg: String,
    pub level: i32,
    pub time: DateTime<Utc>,
}

impl LogData {
    /// Create a new LogData
    pub fn new(source: String, msg: String) -> Self {
        Self::with_level(source, msg, INFO)
    }

    /// Create LogData with specific level
    pub fn with_level(source: String, msg: String, level: i32) -> Self {
        Self {
            source,
            msg,
            level,
            time: Utc::now(),
        }
    }
}

/// Request for subscribing tick data update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub symbol: String,
    pub exchange: Exchange,
}

impl SubscribeRequest {
    /// Create a new SubscribeRequest
    pub fn new(symbol: String, exchange: Exchange) -> Self {
        Self { symbol, exchange }
    }

    /// Parse a `symbol.EXCHANGE` string
    pub fn from_vt_symbol(vt_symbol: &str) -> Result<Self> {
        let (symbol, exchange) = extract_vt_symbol(vt_symbol)?;
        let req = Self::new(symbol, exchange);
        req.validate()?;
        Ok(req)
    }

    /// Get vt_symbol (symbol.exchange)
    pub fn vt_symbol(&self) -> String {
        generate_vt_symbol(&self.symbol, self.exchange)
    }

    pub fn validate(&self) -> Result<()> {
        validate_symbol(&self.symbol)
    }
}

/// Request for creating a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,
    pub order_type: OrderType,
    pub volume: f64,
    pub price: f64,
}

impl OrderRequest {
    /// Create a new OrderRequest
    pub fn new(
        symbol: String,
        exchange: Exchange,
        direction: Direction,
        order_type: OrderType,
        volume: f64,
    ) -> Self {
        Self {
            symbol,
            exchange,
            direction,
            order_type,
            volume,
            price: 0.0,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Get vt_symbol (symbol.exchange)
    pub fn vt_symbol(&self) -> String {
        generate_vt_symbol(&self.symbol, self.exchange)
    }

    /// Reject input a manual order ticket would refuse
    pub fn validate(&self) -> Result<()> {
        validate_symbol(&self.symbol)?;
        if !self.volume.is_finite() || self.volume <= 0.0 {
            return Err(EngineError::invalid(format!(
                "volume must be positive, got {}",
                self.volume
            )));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(EngineError::invalid(format!(
                "price must not be negative, got {}",
                self.price
            )));
        }
        Ok(())
    }

    /// Subscription for the instrument this order refers to
    pub fn subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::new(self.symbol.clone(), self.exchange)
    }

    /// Create order data from request
    pub fn create_order_data(&self, orderid: String) -> OrderData {
        let mut order = OrderData::new(self.symbol.clone(), self.exchange, orderid, self.direction);
        order.order_type = self.order_type;
        order.price = self.price;
        order.volume = self.volume;
        order.datetime = Some(Utc::now());
        order
    }
}

/// Request for canceling an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub orderid: String,
    pub symbol: String,
    pub exchange: Exchange,
}

impl CancelRequest {
    /// Create a new CancelRequest
    pub fn new(orderid: String, symbol: String, exchange: Exchange) -> Self {
        Self {
            orderid,
            symbol,
            exchange,
        }
    }

    /// Get vt_symbol (symbol.exchange)
    pub fn vt_symbol(&self) -> String {
        generate_vt_symbol(&self.symbol, self.exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_data_vt_symbol() {
        let tick = TickData::new("AAPL".to_string(), Exchange::Nymex, Utc::now());
        assert_eq!(tick.vt_symbol(), "AAPL.NYMEX");
        assert!(tick.change_percent().is_none());
    }

    #[test]
    fn test_account_data_available() {
        let mut account = AccountData::new("acc1".to_string());
        assert_eq!(account.available(), 0.0);
        account.balance = 10000.0;
        account.frozen = 2000.0;
        assert_eq!(account.available(), 8000.0);
    }

    #[test]
    fn test_subscribe_request_from_vt_symbol() {
        let req = SubscribeRequest::from_vt_symbol("BRK.B.NYSE").unwrap();
        assert_eq!(req.symbol, "BRK.B");
        assert_eq!(req.exchange, Exchange::Nyse);
        assert_eq!(req.vt_symbol(), "BRK.B.NYSE");

        assert!(SubscribeRequest::from_vt_symbol("AAPL").is_err());
        assert!(SubscribeRequest::from_vt_symbol(".SMART").is_err());
        assert!(SubscribeRequest::from_vt_symbol("AAPL.").is_err());
    }

    #[test]
    fn test_order_request_validate() {
        let req = OrderRequest::new(
            "AAPL".to_string(),
            Exchange::Smart,
            Direction::Long,
            OrderType::Limit,
            100.0,
        )
        .with_price(12.5);
        assert!(req.validate().is_ok());

        let mut bad = req.clone();
        bad.symbol = "  ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = req.clone();
        bad.volume = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = req.clone();
        bad.price = -1.0;
        assert!(bad.validate().is_err());

        let mut bad = req;
        bad.volume = f64::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_create_order_data() {
        let req = OrderRequest::new(
            "CL".to_string(),
            Exchange::Nymex,
            Direction::Short,
            OrderType::Limit,
            3.0,
        )
        .with_price(71.2);
        let order = req.create_order_data("1".to_string());

        assert_eq!(order.vt_symbol(), "CL.NYMEX");
        assert_eq!(order.direction, Direction::Short);
        assert_eq!(order.volume, 3.0);
        assert_eq!(order.remaining(), 3.0);

        let cancel = order.create_cancel_request();
        assert_eq!(cancel.orderid, "1");
        assert_eq!(cancel.vt_symbol(), "CL.NYMEX");
    }

    #[test]
    fn test_position_and_trade_keys() {
        let position = PositionData::new("CL".to_string(), Exchange::Nymex, Direction::Long);
        assert_eq!(position.vt_positionid(), "CL.NYMEX.LONG");

        let trade = TradeData::new(
            "CL".to_string(),
            Exchange::Nymex,
            "1".to_string(),
            "7".to_string(),
            Direction::Short,
        );
        assert_eq!(trade.vt_tradeid(), "CL.NYMEX.7");
    }
}
