/// Relative Strength Index over the last `period` price changes, using simple
/// averages of gains and losses.
///
/// Returns `None` when fewer than `period + 1` prices are available.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &changes[changes.len() - period..];

    let avg_gain = recent.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
    let avg_loss = recent.iter().filter(|c| **c < 0.0).map(|c| c.abs()).sum::<f64>() / period as f64;

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_within_bounds() {
        let prices = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5, 46.0, 46.5, 46.25, 46.0,
            46.5,
        ];
        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi > 50.0 && rsi < 100.0, "{rsi}");
    }

    #[test]
    fn insufficient_data() {
        assert!(calculate_rsi(&[100.0, 102.0, 101.0], 14).is_none());
        assert!(calculate_rsi(&[100.0, 102.0], 0).is_none());
    }

    #[test]
    fn all_gains_is_100() {
        let prices = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        assert_eq!(calculate_rsi(&prices, 5), Some(100.0));
    }

    #[test]
    fn all_losses_is_0() {
        let prices = vec![105.0, 104.0, 103.0, 102.0, 101.0, 100.0];
        assert_eq!(calculate_rsi(&prices, 5), Some(0.0));
    }

    #[test]
    fn flat_prices_are_neutral() {
        assert_eq!(calculate_rsi(&[10.0; 6], 5), Some(50.0));
    }

    #[test]
    fn equal_moves_are_50() {
        let prices = vec![100.0, 102.0, 100.0, 102.0, 100.0];
        assert_eq!(calculate_rsi(&prices, 4), Some(50.0));
    }

    #[test]
    fn only_last_period_counts() {
        // Early crash is outside the window.
        let prices = vec![200.0, 100.0, 101.0, 102.0, 103.0];
        assert_eq!(calculate_rsi(&prices, 3), Some(100.0));
    }
}
