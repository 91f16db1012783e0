use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Market metrics captured once per round and shared by all three personas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Spot price in USD.
    pub price: Decimal,
    /// 24h price change in percent (e.g. `-3.25`).
    pub change_24h: Decimal,
    /// 24h traded volume in USD.
    pub volume_24h: Decimal,
    /// Relative strength index, 0 to 100.
    pub rsi: Decimal,
    pub captured_at: DateTime<Utc>,
    /// True when the provider was unreachable and the numbers were synthesized.
    #[serde(default)]
    pub synthetic: bool,
}

impl MarketSnapshot {
    /// Build a snapshot from raw provider floats, rejecting NaN and infinities.
    pub fn from_f64(
        symbol: &str,
        price: f64,
        change_24h: f64,
        volume_24h: f64,
        rsi: f64,
    ) -> Result<Self, ModelError> {
        let rsi = finite("rsi", rsi)?;
        if rsi < Decimal::ZERO || rsi > Decimal::ONE_HUNDRED {
            return Err(ModelError::RsiOutOfRange(rsi.to_string()));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            price: finite("price", price)?,
            change_24h: finite("change_24h", change_24h)?,
            volume_24h: finite("volume_24h", volume_24h)?,
            rsi,
            captured_at: Utc::now(),
            synthetic: false,
        })
    }
}

fn finite(field: &'static str, value: f64) -> Result<Decimal, ModelError> {
    if !value.is_finite() {
        return Err(ModelError::NonFinite(field));
    }
    Decimal::from_f64(value).ok_or(ModelError::NonFinite(field))
}
