use std::collections::HashMap;

use async_trait::async_trait;
use pantheon_models::{MarketConfig, MarketSnapshot};
use rand::Rng;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::MarketError;
use crate::rsi::calculate_rsi;

/// RSI reported when price history is unavailable.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Source of per-round market metrics. Mockable for testing.
#[async_trait]
pub trait MarketSource: Send + Sync {
    fn name(&self) -> &str;

    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketError>;
}

/// CoinGecko public API: spot figures from `simple/price`, RSI from
/// `coins/{id}/market_chart`.
pub struct CoinGeckoSource {
    http: Client,
    config: MarketConfig,
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: f64,
    #[serde(default)]
    usd_24h_change: Option<f64>,
    #[serde(default)]
    usd_24h_vol: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<[f64; 2]>,
}

impl CoinGeckoSource {
    pub fn new(config: MarketConfig) -> Result<Self, MarketError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MarketError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketError> {
        let url = format!("{}/{path}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| MarketError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::Status(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| MarketError::Decode(format!("{path}: {e}")))
    }

    async fn rsi(&self, coin_id: &str) -> Result<f64, MarketError> {
        let chart: MarketChart = self
            .get_json(
                &format!("coins/{coin_id}/market_chart"),
                &[
                    ("vs_currency", "usd".to_string()),
                    ("days", self.config.history_days.to_string()),
                ],
            )
            .await?;
        let prices: Vec<f64> = chart.prices.iter().map(|p| p[1]).collect();
        calculate_rsi(&prices, self.config.rsi_period).ok_or_else(|| {
            MarketError::Decode(format!(
                "{} prices are not enough for RSI({})",
                prices.len(),
                self.config.rsi_period
            ))
        })
    }
}

#[async_trait]
impl MarketSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketError> {
        let coin_id = self
            .config
            .coin_id(symbol)
            .ok_or_else(|| MarketError::UnknownSymbol(symbol.to_string()))?
            .to_string();

        let mut prices: HashMap<String, SimplePrice> = self
            .get_json(
                "simple/price",
                &[
                    ("ids", coin_id.clone()),
                    ("vs_currencies", "usd".to_string()),
                    ("include_24hr_change", "true".to_string()),
                    ("include_24hr_vol", "true".to_string()),
                ],
            )
            .await?;
        let price = prices
            .remove(&coin_id)
            .ok_or_else(|| MarketError::Decode(format!("no price for {coin_id}")))?;

        let rsi = match self.rsi(&coin_id).await {
            Ok(rsi) => rsi,
            Err(e) => {
                warn!(coin = %coin_id, error = %e, "RSI unavailable, using neutral value");
                NEUTRAL_RSI
            }
        };

        let snapshot = MarketSnapshot::from_f64(
            &symbol.to_uppercase(),
            price.usd,
            price.usd_24h_change.unwrap_or(0.0),
            price.usd_24h_vol.unwrap_or(0.0),
            rsi,
        )?;
        debug!(
            symbol = %snapshot.symbol,
            price = %snapshot.price,
            change_24h = %snapshot.change_24h,
            rsi = %snapshot.rsi,
            "Market snapshot captured"
        );
        Ok(snapshot)
    }
}

/// Plausible stand-in figures used when the provider is unreachable.
pub fn synthetic_snapshot<R: Rng>(symbol: &str, rng: &mut R) -> Result<MarketSnapshot, MarketError> {
    let mut snapshot = MarketSnapshot::from_f64(
        &symbol.to_uppercase(),
        3500.0 + rng.gen_range(-100.0..100.0),
        rng.gen_range(-5.0..5.0),
        rng.gen_range(15.0e9..20.0e9),
        rng.gen_range(35.0..65.0),
    )?;
    snapshot.synthetic = true;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal::Decimal;

    fn source_for(server: &mockito::Server) -> CoinGeckoSource {
        CoinGeckoSource::new(MarketConfig {
            base_url: server.url(),
            ..MarketConfig::default()
        })
        .unwrap()
    }

    fn rising_chart(points: usize) -> String {
        let prices: Vec<[f64; 2]> = (0..points)
            .map(|i| [1_700_000_000_000.0 + i as f64 * 3_600_000.0, 3000.0 + i as f64])
            .collect();
        serde_json::json!({ "prices": prices, "market_caps": [], "total_volumes": [] }).to_string()
    }

    #[tokio::test]
    async fn builds_snapshot_from_provider() {
        let mut server = mockito::Server::new_async().await;
        let price = server
            .mock("GET", "/simple/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ids".into(), "ethereum".into()),
                Matcher::UrlEncoded("vs_currencies".into(), "usd".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"ethereum": {"usd": 3456.78, "usd_24h_change": -2.5, "usd_24h_vol": 15234000000.0}}"#)
            .create_async()
            .await;
        let chart = server
            .mock("GET", "/coins/ethereum/market_chart")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(rising_chart(30))
            .create_async()
            .await;

        let snapshot = source_for(&server).snapshot("eth").await.unwrap();
        assert_eq!(snapshot.symbol, "ETH");
        assert_eq!(snapshot.price.round_dp(2).to_string(), "3456.78");
        assert_eq!(snapshot.change_24h, Decimal::new(-25, 1));
        assert_eq!(snapshot.rsi, Decimal::ONE_HUNDRED);
        assert!(!snapshot.synthetic);
        price.assert_async().await;
        chart.assert_async().await;
    }

    #[tokio::test]
    async fn missing_history_uses_neutral_rsi() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/simple/price")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"bitcoin": {"usd": 97000.0, "usd_24h_change": 1.0, "usd_24h_vol": 3.0e10}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/coins/bitcoin/market_chart")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let snapshot = source_for(&server).snapshot("BTC").await.unwrap();
        assert_eq!(snapshot.rsi, Decimal::from(50));
    }

    #[tokio::test]
    async fn provider_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/simple/price")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let err = source_for(&server).snapshot("ETH").await.unwrap_err();
        assert!(matches!(err, MarketError::Status(429)));
    }

    #[tokio::test]
    async fn unknown_symbol_is_rejected() {
        let server = mockito::Server::new_async().await;
        let err = source_for(&server).snapshot("DOGE").await.unwrap_err();
        assert!(matches!(err, MarketError::UnknownSymbol(_)));
    }

    #[test]
    fn synthetic_snapshot_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let snapshot = synthetic_snapshot("eth", &mut rng).unwrap();
            assert!(snapshot.synthetic);
            assert_eq!(snapshot.symbol, "ETH");
            assert!(snapshot.price >= Decimal::from(3400) && snapshot.price <= Decimal::from(3600));
            assert!(snapshot.change_24h.abs() <= Decimal::from(5));
            assert!(snapshot.rsi >= Decimal::from(35) && snapshot.rsi <= Decimal::from(65));
        }
    }
}
