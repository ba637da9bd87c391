//! Regularization grid generation.
//!
//! The ridge strength λ is chosen by a deterministic grid search scored with
//! cross-validation. Candidates are log-spaced because the useful range spans
//! several orders of magnitude.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::new(
            2,
            format!("Invalid lambda range: min={min}, max={max} (must be finite, >0, and max>min)."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(2, "Lambda steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Ascending λ candidates. A degenerate range (`min == max`) yields one candidate.
pub fn lambda_grid(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if min.is_finite() && min > 0.0 && min == max {
        return Ok(vec![min]);
    }
    log_space(min, max, steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(1e-4, 10.0, 6).unwrap();
        assert!((v[0] - 1e-4).abs() < 1e-16);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-10);
        assert!((v[1] / v[0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_ranges_are_input_errors() {
        assert_eq!(log_space(0.0, 1.0, 5).unwrap_err().exit_code(), 2);
        assert_eq!(log_space(1.0, 0.5, 5).unwrap_err().exit_code(), 2);
        assert_eq!(log_space(0.1, 1.0, 1).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn single_lambda_grid() {
        assert_eq!(lambda_grid(0.5, 0.5, 9).unwrap(), vec![0.5]);
    }
}
