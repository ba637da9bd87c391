//! Numerically stable logistic helpers.

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs.
pub const PROB_EPS: f64 = 1e-15;

/// Logistic function `1 / (1 + e^{-x})` without overflow for large `|x|`.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Log-odds of a probability (clipped away from 0 and 1).
pub fn logit(p: f64) -> f64 {
    let p = clip_probability(p);
    (p / (1.0 - p)).ln()
}

pub fn clip_probability(p: f64) -> f64 {
    if p.is_nan() {
        return 0.5;
    }
    p.clamp(PROB_EPS, 1.0 - PROB_EPS)
}

/// Binary cross-entropy of a single prediction.
pub fn log_loss_term(y: f64, p: f64) -> f64 {
    let p = clip_probability(p);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_stable_and_symmetric() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-15);
        assert!(sigmoid(1000.0) <= 1.0 && sigmoid(1000.0) > 0.999);
        assert!(sigmoid(-1000.0) >= 0.0 && sigmoid(-1000.0) < 1e-300);
        for &x in &[0.1, 2.0, 7.5] {
            assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn logit_inverts_sigmoid() {
        for &x in &[-4.0, -0.3, 0.0, 2.2] {
            assert!((logit(sigmoid(x)) - x).abs() < 1e-9);
        }
    }

    #[test]
    fn log_loss_is_finite_at_extremes() {
        assert!(log_loss_term(1.0, 0.0).is_finite());
        assert!(log_loss_term(0.0, 1.0).is_finite());
        assert!((log_loss_term(1.0, 0.5) - std::f64::consts::LN_2).abs() < 1e-12);
    }
}
