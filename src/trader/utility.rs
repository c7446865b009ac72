//! General utility functions.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use super::constant::Exchange;
use crate::error::{EngineError, Result};

/// Name of the per-user data folder
const TRADER_FOLDER: &str = ".simtrader";

/// Extract symbol and exchange from vt_symbol
pub fn extract_vt_symbol(vt_symbol: &str) -> Result<(String, Exchange)> {
    let (symbol, exchange) = vt_symbol
        .rsplit_once('.')
        .ok_or_else(|| EngineError::invalid(format!("'{}' is not symbol.EXCHANGE", vt_symbol)))?;
    Ok((symbol.to_string(), exchange.parse()?))
}

/// Generate vt_symbol from symbol and exchange
pub fn generate_vt_symbol(symbol: &str, exchange: Exchange) -> String {
    format!("{}.{}", symbol, exchange.value())
}

/// Get trader directory
fn get_trader_dir(temp_name: &str) -> (PathBuf, PathBuf) {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let temp_path = cwd.join(temp_name);

    // If the data folder exists in current working directory, use it
    if temp_path.exists() {
        return (cwd, temp_path);
    }

    // Otherwise use home path
    let home_path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let temp_path = home_path.join(temp_name);

    if !temp_path.exists() {
        let _ = fs::create_dir_all(&temp_path);
    }

    (home_path, temp_path)
}

/// Trader directory
pub static TRADER_DIR: LazyLock<PathBuf> = LazyLock::new(|| get_trader_dir(TRADER_FOLDER).0);

/// Temp directory
pub static TEMP_DIR: LazyLock<PathBuf> = LazyLock::new(|| get_trader_dir(TRADER_FOLDER).1);

/// Get path for temp file with filename
pub fn get_file_path(filename: &str) -> PathBuf {
    TEMP_DIR.join(filename)
}

/// Get path for temp folder with folder name
pub fn get_folder_path(folder_name: &str) -> PathBuf {
    let folder_path = TEMP_DIR.join(folder_name);
    if !folder_path.exists() {
        let _ = fs::create_dir_all(&folder_path);
    }
    folder_path
}

/// Round price to price tick value
pub fn round_to(value: f64, target: f64) -> f64 {
    let decimal_value = Decimal::from_f64(value).unwrap_or_default();
    let decimal_target = Decimal::from_f64(target).unwrap_or(Decimal::ONE);

    if decimal_target.is_zero() {
        return value;
    }

    let result = (decimal_value / decimal_target).round() * decimal_target;
    result.to_f64().unwrap_or(value)
}

/// Floor to target float number
pub fn floor_to(value: f64, target: f64) -> f64 {
    let decimal_value = Decimal::from_f64(value).unwrap_or_default();
    let decimal_target = Decimal::from_f64(target).unwrap_or(Decimal::ONE);

    if decimal_target.is_zero() {
        return value;
    }

    let result = (decimal_value / decimal_target).floor() * decimal_target;
    result.to_f64().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_vt_symbol() {
        let (symbol, exchange) = extract_vt_symbol("CL.NYMEX").unwrap();
        assert_eq!(symbol, "CL");
        assert_eq!(exchange, Exchange::Nymex);

        assert!(extract_vt_symbol("CL").is_err());
        assert!(extract_vt_symbol("CL.MOON").is_err());
    }

    #[test]
    fn test_generate_vt_symbol() {
        assert_eq!(generate_vt_symbol("AAPL", Exchange::Smart), "AAPL.SMART");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.234, 0.01), 1.23);
        assert_eq!(round_to(20.0861, 0.01), 20.09);
        assert_eq!(round_to(5.0, 0.0), 5.0);
    }

    #[test]
    fn test_floor_to() {
        assert_eq!(floor_to(1.239, 0.01), 1.23);
        assert_eq!(floor_to(2187.0, 100.0), 2100.0);
        assert_eq!(floor_to(-40.0, 100.0), -100.0);
    }
}
