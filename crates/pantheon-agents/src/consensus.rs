use pantheon_models::{Agreement, AgentOpinion, Consensus, Decision, Votes};

/// Order in which tied decisions win. A three-way split therefore yields HOLD.
pub const TIE_PRECEDENCE: [Decision; 3] = [Decision::Hold, Decision::Sell, Decision::Buy];

/// Fold the three council opinions into a majority-vote consensus.
pub fn aggregate(opinions: &[AgentOpinion; 3]) -> Consensus {
    let mut votes = Votes::default();
    for opinion in opinions {
        votes.add(opinion.decision);
    }

    let max_votes = votes.max();
    let decision = TIE_PRECEDENCE
        .into_iter()
        .find(|d| votes.get(*d) == max_votes)
        .unwrap_or(Decision::Hold);

    let sum: u32 = opinions.iter().map(|o| u32::from(o.confidence)).sum();
    let average = round_half_up(sum, opinions.len() as u32);

    Consensus {
        decision,
        agreement: Agreement::from_max_votes(max_votes),
        average_confidence: average.min(100) as u8,
        votes,
    }
}

/// `sum / count` rounded half-up, in integers.
pub fn round_half_up(sum: u32, count: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    (2 * sum + count) / (2 * count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opinion(decision: Decision, confidence: u8) -> AgentOpinion {
        AgentOpinion::new(decision, confidence, "test").unwrap()
    }

    #[test]
    fn majority_buy() {
        let consensus = aggregate(&[
            opinion(Decision::Buy, 80),
            opinion(Decision::Buy, 60),
            opinion(Decision::Sell, 40),
        ]);
        assert_eq!(consensus.decision, Decision::Buy);
        assert_eq!(consensus.agreement, Agreement::Majority);
        assert_eq!(consensus.average_confidence, 60);
        assert_eq!(consensus.to_wire(), "BUY|MAJORITY|60");
        assert_eq!(consensus.votes.total(), 3);
    }

    #[test]
    fn unanimous_sell() {
        let consensus = aggregate(&[
            opinion(Decision::Sell, 70),
            opinion(Decision::Sell, 75),
            opinion(Decision::Sell, 90),
        ]);
        assert_eq!(consensus.to_wire(), "SELL|UNANIMOUS|78");
        assert_eq!(consensus.votes.sell, 3);
    }

    #[test]
    fn three_way_split_is_hold() {
        let consensus = aggregate(&[
            opinion(Decision::Buy, 90),
            opinion(Decision::Sell, 50),
            opinion(Decision::Hold, 30),
        ]);
        assert_eq!(consensus.decision, Decision::Hold);
        assert_eq!(consensus.agreement, Agreement::Split);
        assert_eq!(consensus.average_confidence, 57);
    }

    #[test]
    fn split_order_does_not_matter() {
        let a = aggregate(&[
            opinion(Decision::Hold, 50),
            opinion(Decision::Buy, 50),
            opinion(Decision::Sell, 50),
        ]);
        let b = aggregate(&[
            opinion(Decision::Sell, 50),
            opinion(Decision::Hold, 50),
            opinion(Decision::Buy, 50),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.decision, Decision::Hold);
    }

    #[test]
    fn votes_always_sum_to_three() {
        for a in Decision::ALL {
            for b in Decision::ALL {
                for c in Decision::ALL {
                    let consensus = aggregate(&[opinion(a, 10), opinion(b, 20), opinion(c, 30)]);
                    assert_eq!(consensus.votes.total(), 3);
                    assert_eq!(
                        consensus.agreement,
                        Agreement::from_max_votes(consensus.votes.max())
                    );
                    assert_eq!(consensus.votes.get(consensus.decision), consensus.votes.max());
                }
            }
        }
    }

    #[test]
    fn averages_round_on_both_sides() {
        // 181 / 3 = 60.33
        let down = aggregate(&[
            opinion(Decision::Hold, 61),
            opinion(Decision::Hold, 60),
            opinion(Decision::Hold, 60),
        ]);
        assert_eq!(down.average_confidence, 60);

        // 182 / 3 = 60.67
        let up = aggregate(&[
            opinion(Decision::Hold, 61),
            opinion(Decision::Hold, 61),
            opinion(Decision::Hold, 60),
        ]);
        assert_eq!(up.average_confidence, 61);
    }

    #[test]
    fn half_rounds_up() {
        assert_eq!(round_half_up(121, 2), 61);
        assert_eq!(round_half_up(120, 2), 60);
        assert_eq!(round_half_up(3, 2), 2);
        assert_eq!(round_half_up(300, 3), 100);
        assert_eq!(round_half_up(3, 3), 1);
        assert_eq!(round_half_up(5, 0), 0);
    }
}
