//! General constant enums used in the trading terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Direction of order/trade/position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn value(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(EngineError::invalid(format!("unknown direction '{}'", other))),
        }
    }
}

/// Order type. Only limit orders are accepted by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderType {
    #[default]
    Limit,
}

impl OrderType {
    pub fn value(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for OrderType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LIMIT" => Ok(OrderType::Limit),
            other => Err(EngineError::invalid(format!("unknown order type '{}'", other))),
        }
    }
}

/// Exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// Smart Router for US stocks
    Smart,
    /// New York Mercantile Exchange
    Nymex,
    /// New York Stock Exchange
    Nyse,
    /// Nasdaq Exchange
    Nasdaq,
    /// For local generated data
    Local,
}

impl Exchange {
    /// Get the exchange value string
    pub fn value(&self) -> &'static str {
        match self {
            Exchange::Smart => "SMART",
            Exchange::Nymex => "NYMEX",
            Exchange::Nyse => "NYSE",
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Local => "LOCAL",
        }
    }

    /// All exchanges known to the terminal
    pub fn all() -> Vec<Exchange> {
        vec![
            Exchange::Smart,
            Exchange::Nymex,
            Exchange::Nyse,
            Exchange::Nasdaq,
            Exchange::Local,
        ]
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for Exchange {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(EngineError::invalid("exchange must not be empty"));
        }

        Exchange::all()
            .into_iter()
            .find(|exchange| exchange.value().eq_ignore_ascii_case(value))
            .ok_or_else(|| EngineError::invalid(format!("unknown exchange '{}'", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_display() {
        assert_eq!(format!("{}", Direction::Long), "LONG");
        assert_eq!(format!("{}", Direction::Short), "SHORT");
        assert_eq!("SHORT".parse::<Direction>().unwrap(), Direction::Short);
        assert!("SIDEWAYS".parse::<Direction>().is_err());
    }

    #[test]
    fn test_exchange_value() {
        assert_eq!(Exchange::Nymex.value(), "NYMEX");
        assert_eq!(Exchange::Smart.to_string(), "SMART");
    }

    #[test]
    fn test_exchange_from_str() {
        assert_eq!("NYMEX".parse::<Exchange>().unwrap(), Exchange::Nymex);
        assert_eq!(" nasdaq ".parse::<Exchange>().unwrap(), Exchange::Nasdaq);
        assert!(matches!(
            "".parse::<Exchange>(),
            Err(EngineError::InvalidParameter(_))
        ));
        assert!("LSE".parse::<Exchange>().is_err());
    }

    #[test]
    fn test_order_type_default() {
        assert_eq!(OrderType::default(), OrderType::Limit);
        assert_eq!("LIMIT".parse::<OrderType>().unwrap(), OrderType::Limit);
    }
}
