use pantheon_models::MarketSnapshot;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// How much risk a persona leans toward when the data is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBias {
    Conservative,
    Defensive,
    Aggressive,
}

/// A fixed prompting configuration for one council seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Persona {
    /// Stable key used in logs and reports.
    pub key: &'static str,
    pub title: &'static str,
    #[serde(skip)]
    pub framing: &'static str,
    pub risk_bias: RiskBias,
}

pub const ANALYST: Persona = Persona {
    key: "analyst",
    title: "THE ANALYST",
    framing: "You are THE ANALYST - a meticulous technical analyst.\n\
              Focus on: RSI, volume trends, support/resistance levels.\n\
              Be data-driven and conservative.",
    risk_bias: RiskBias::Conservative,
};

pub const SKEPTIC: Persona = Persona {
    key: "skeptic",
    title: "THE SKEPTIC",
    framing: "You are THE SKEPTIC - a cautious risk manager.\n\
              Focus on: Downside risks, market uncertainty, protecting capital.\n\
              Be defensive and question bullish narratives.",
    risk_bias: RiskBias::Defensive,
};

pub const DEGEN: Persona = Persona {
    key: "degen",
    title: "THE DEGEN",
    framing: "You are THE DEGEN - an aggressive momentum trader.\n\
              Focus on: Breakouts, FOMO opportunities, high-risk/high-reward plays.\n\
              Be bold and optimistic.",
    risk_bias: RiskBias::Aggressive,
};

/// Council seats in recording order: analyst, skeptic, degen.
pub const COUNCIL: [Persona; 3] = [ANALYST, SKEPTIC, DEGEN];

const BILLION: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Build the single-turn prompt for one persona.
pub fn build_opinion_prompt(persona: &Persona, snapshot: &MarketSnapshot) -> String {
    format!(
        "{framing}\n\n\
         Market Data ({symbol}):\n\
         - Price: ${price:.2}\n\
         - 24h Change: {change:.2}%\n\
         - Volume: ${volume:.2}B\n\
         - RSI: {rsi:.0}\n\n\
         Respond ONLY in this exact format (no extra text):\n\
         DECISION|CONFIDENCE|REASONING\n\n\
         Where:\n\
         - DECISION is exactly one of: BUY, SELL, or HOLD\n\
         - CONFIDENCE is a number from 1-100\n\
         - REASONING is a brief explanation (max 100 chars)\n\n\
         Example: HOLD|75|Market consolidating, awaiting breakout signal",
        framing = persona.framing,
        symbol = snapshot.symbol,
        price = round(snapshot.price, 2),
        change = round(snapshot.change_24h, 2),
        volume = round(snapshot.volume_24h / BILLION, 2),
        rsi = round(snapshot.rsi, 0),
    )
}

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "ETH".to_string(),
            price: dec!(3456.789),
            change_24h: dec!(-2.345),
            volume_24h: dec!(15234000000),
            rsi: dec!(48.6),
            captured_at: Utc::now(),
            synthetic: false,
        }
    }

    #[test]
    fn formats_market_figures() {
        let prompt = build_opinion_prompt(&ANALYST, &snapshot());
        assert!(prompt.contains("Price: $3456.79"), "{prompt}");
        assert!(prompt.contains("24h Change: -2.35%"), "{prompt}");
        assert!(prompt.contains("Volume: $15.23B"), "{prompt}");
        assert!(prompt.contains("RSI: 49"), "{prompt}");
    }

    #[test]
    fn pads_whole_numbers() {
        let mut snap = snapshot();
        snap.price = dec!(3500);
        snap.change_24h = dec!(5);
        let prompt = build_opinion_prompt(&SKEPTIC, &snap);
        assert!(prompt.contains("Price: $3500.00"), "{prompt}");
        assert!(prompt.contains("24h Change: 5.00%"), "{prompt}");
    }

    #[test]
    fn embeds_persona_framing_and_format() {
        for persona in COUNCIL {
            let prompt = build_opinion_prompt(&persona, &snapshot());
            assert!(prompt.starts_with(persona.framing));
            assert!(prompt.contains(persona.title));
            assert!(prompt.contains("DECISION|CONFIDENCE|REASONING"));
            assert!(prompt.contains("BUY, SELL, or HOLD"));
        }
    }

    #[test]
    fn council_order_is_fixed() {
        let keys: Vec<&str> = COUNCIL.iter().map(|p| p.key).collect();
        assert_eq!(keys, vec!["analyst", "skeptic", "degen"]);
        assert_eq!(DEGEN.risk_bias, RiskBias::Aggressive);
    }
}
