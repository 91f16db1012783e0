use std::sync::Arc;
use std::time::{Duration, Instant};

use pantheon_models::{AgentOpinion, CompletionConfig, Decision, MarketSnapshot};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::completion::CompletionClient;
use crate::parser::parse_opinion;
use crate::prompts::{build_opinion_prompt, Persona};

/// Bounded retry schedule for one persona call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub backoff: Duration,
    pub rate_limit_backoff: Duration,
}

impl From<&CompletionConfig> for RetryPolicy {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
            rate_limit_backoff: config.rate_limit_backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpinionOrigin {
    Model,
    Fallback,
}

/// One persona's opinion plus how it was obtained.
#[derive(Debug, Clone, Serialize)]
pub struct CollectedOpinion {
    pub persona: &'static str,
    pub opinion: AgentOpinion,
    pub origin: OpinionOrigin,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

/// Asks the completion service for persona opinions. Never fails: when the
/// service cannot produce a valid reply the rule-based fallback is returned.
pub struct OpinionCollector {
    client: Arc<dyn CompletionClient>,
    policy: RetryPolicy,
}

impl OpinionCollector {
    pub fn new(client: Arc<dyn CompletionClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn collect(&self, persona: &Persona, snapshot: &MarketSnapshot) -> CollectedOpinion {
        let start = Instant::now();
        let prompt = build_opinion_prompt(persona, snapshot);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match self.client.complete(&prompt).await {
                Ok(raw) => parse_opinion(&raw),
                Err(e) => Err(e),
            };

            match result {
                Ok(opinion) => {
                    info!(
                        persona = persona.key,
                        decision = %opinion.decision,
                        confidence = opinion.confidence,
                        attempt,
                        "Opinion collected"
                    );
                    return CollectedOpinion {
                        persona: persona.key,
                        opinion,
                        origin: OpinionOrigin::Model,
                        attempts: attempt,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    };
                }
                Err(e) if !e.is_retryable() => {
                    warn!(persona = persona.key, error = %e, "Completion failed permanently, using fallback");
                    break;
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(
                        persona = persona.key,
                        error = %e,
                        attempts = attempt,
                        "Completion attempts exhausted, using fallback"
                    );
                    break;
                }
                Err(e) => {
                    let wait = if e.is_rate_limit() {
                        self.policy.rate_limit_backoff
                    } else {
                        self.policy.backoff
                    };
                    warn!(
                        persona = persona.key,
                        error = %e,
                        attempt,
                        max_attempts,
                        wait_secs = wait.as_secs(),
                        "Completion failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }

        let opinion = fallback_opinion(snapshot);
        info!(
            persona = persona.key,
            decision = %opinion.decision,
            change_24h = %snapshot.change_24h,
            "Fallback opinion applied"
        );
        CollectedOpinion {
            persona: persona.key,
            opinion,
            origin: OpinionOrigin::Fallback,
            attempts: attempt,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}

const FALLBACK_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Deterministic opinion derived from the 24h change alone.
pub fn fallback_opinion(snapshot: &MarketSnapshot) -> AgentOpinion {
    let (decision, confidence, reasoning) = if snapshot.change_24h > FALLBACK_THRESHOLD {
        (Decision::Buy, 60, "Strong upward momentum detected")
    } else if snapshot.change_24h < -FALLBACK_THRESHOLD {
        (Decision::Sell, 60, "Significant downward pressure")
    } else {
        (Decision::Hold, 50, "Market showing consolidation pattern")
    };
    AgentOpinion {
        decision,
        confidence,
        reasoning: reasoning.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{ANALYST, DEGEN};
    use crate::test_support::{sample_snapshot, ScriptedCompletion};
    use crate::AgentError;
    use pantheon_models::ModelError;
    use rust_decimal_macros::dec;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(15),
            rate_limit_backoff: Duration::from_secs(30),
        }
    }

    #[test]
    fn fallback_thresholds() {
        let buy = fallback_opinion(&sample_snapshot(dec!(7.0)));
        assert_eq!(buy.to_wire(), "BUY|60|Strong upward momentum detected");

        let sell = fallback_opinion(&sample_snapshot(dec!(-8.0)));
        assert_eq!(sell.to_wire(), "SELL|60|Significant downward pressure");

        let hold = fallback_opinion(&sample_snapshot(dec!(1.5)));
        assert_eq!(hold.to_wire(), "HOLD|50|Market showing consolidation pattern");
    }

    #[test]
    fn fallback_boundaries_are_exclusive() {
        assert_eq!(fallback_opinion(&sample_snapshot(dec!(5))).decision, Decision::Hold);
        assert_eq!(fallback_opinion(&sample_snapshot(dec!(-5))).decision, Decision::Hold);
        assert_eq!(fallback_opinion(&sample_snapshot(dec!(5.01))).decision, Decision::Buy);
    }

    #[test]
    fn policy_from_config_has_at_least_one_attempt() {
        let config = CompletionConfig {
            max_attempts: 0,
            ..CompletionConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff, Duration::from_secs(15));
        assert_eq!(policy.rate_limit_backoff, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn first_valid_reply_wins() {
        let client = Arc::new(ScriptedCompletion::always("BUY|82|Volume confirms breakout"));
        let collector = OpinionCollector::new(client.clone(), policy());

        let collected = collector.collect(&ANALYST, &sample_snapshot(dec!(1))).await;
        assert_eq!(collected.origin, OpinionOrigin::Model);
        assert_eq!(collected.attempts, 1);
        assert_eq!(collected.persona, "analyst");
        assert_eq!(collected.opinion.to_wire(), "BUY|82|Volume confirms breakout");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_reply_is_retried_after_backoff() {
        let client = Arc::new(ScriptedCompletion::new(vec![
            Ok("I think you should buy".to_string()),
            Ok("SELL|70|Lower highs forming".to_string()),
        ]));
        let collector = OpinionCollector::new(client.clone(), policy());

        let start = tokio::time::Instant::now();
        let collected = collector.collect(&DEGEN, &sample_snapshot(dec!(1))).await;
        assert_eq!(collected.origin, OpinionOrigin::Model);
        assert_eq!(collected.attempts, 2);
        assert_eq!(collected.opinion.decision, Decision::Sell);
        assert!(start.elapsed() >= Duration::from_secs(15));
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_fall_back() {
        let client = Arc::new(ScriptedCompletion::new(vec![
            Err(AgentError::Transport("connection reset".into())),
            Ok("buy|80|lowercase".to_string()),
            Err(AgentError::Validation(ModelError::EmptyReasoning)),
            Ok("BUY|80|never reached".to_string()),
        ]));
        let collector = OpinionCollector::new(client.clone(), policy());

        let collected = collector.collect(&ANALYST, &sample_snapshot(dec!(7.0))).await;
        assert_eq!(collected.origin, OpinionOrigin::Fallback);
        assert_eq!(collected.attempts, 3);
        assert_eq!(collected.opinion.to_wire(), "BUY|60|Strong upward momentum detected");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_longer() {
        let client = Arc::new(ScriptedCompletion::new(vec![
            Err(AgentError::RateLimited("quota".into())),
            Ok("HOLD|55|Waiting for confirmation".to_string()),
        ]));
        let collector = OpinionCollector::new(client, policy());

        let start = tokio::time::Instant::now();
        let collected = collector.collect(&ANALYST, &sample_snapshot(dec!(0))).await;
        assert_eq!(collected.origin, OpinionOrigin::Model);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_skips_retries() {
        let client = Arc::new(ScriptedCompletion::new(vec![
            Err(AgentError::Auth("API key not valid".into())),
            Ok("BUY|90|unreachable".to_string()),
        ]));
        let collector = OpinionCollector::new(client.clone(), policy());

        let collected = collector.collect(&ANALYST, &sample_snapshot(dec!(-8.0))).await;
        assert_eq!(collected.origin, OpinionOrigin::Fallback);
        assert_eq!(collected.attempts, 1);
        assert_eq!(collected.opinion.decision, Decision::Sell);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_carries_persona_and_market() {
        let client = Arc::new(ScriptedCompletion::always("HOLD|50|Flat"));
        let collector = OpinionCollector::new(client.clone(), policy());
        collector.collect(&DEGEN, &sample_snapshot(dec!(2.5))).await;

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("THE DEGEN"));
        assert!(prompts[0].contains("24h Change: 2.50%"));
    }
}
