//! Factor combination and rolling weight optimization.

use std::collections::BTreeMap;

use glci_primitives::Date;
use ndarray::{Array1, Array2};
use tracing::debug;

use crate::{ModelError, linalg};

/// A factor series keyed by name.
pub type NamedSeries = (String, Vec<(Date, f64)>);

/// Combine named factor series into a standardized composite.
///
/// Series are aligned on the union of their dates; a missing factor value
/// contributes zero for that date. Weights are normalized to sum to one over
/// the series actually present, and the weighted sum is z-standardized.
pub fn combine_factors(
    factors: &[NamedSeries],
    weights: &[(String, f64)],
) -> Result<Vec<(Date, f64)>, ModelError> {
    if factors.is_empty() {
        return Err(ModelError::EmptyData);
    }

    let mut normalized: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total = 0.0;
    for (name, _) in factors {
        let w = weights
            .iter()
            .find(|(n, _)| n == name)
            .map_or(1.0 / factors.len() as f64, |(_, w)| *w);
        normalized.insert(name.as_str(), w);
        total += w;
    }
    if total <= 0.0 {
        return Err(ModelError::InvalidConfig(format!("weights sum to {total}")));
    }
    for w in normalized.values_mut() {
        *w /= total;
    }

    let mut grid: BTreeMap<Date, f64> = BTreeMap::new();
    for (name, series) in factors {
        let weight = normalized[name.as_str()];
        for (date, value) in series {
            if value.is_finite() {
                *grid.entry(*date).or_insert(0.0) += weight * value;
            } else {
                grid.entry(*date).or_insert(0.0);
            }
        }
    }

    if grid.is_empty() {
        return Err(ModelError::EmptyData);
    }
    let values: Vec<f64> = grid.values().copied().collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len().saturating_sub(1)).max(1) as f64;
    let std = var.sqrt();

    let combined: Vec<(Date, f64)> = grid
        .into_iter()
        .map(|(date, v)| {
            let z = if std > 1e-12 { (v - mean) / std } else { 0.0 };
            (date, z)
        })
        .collect();
    debug!(n = combined.len(), "combined {} factor series", factors.len());
    Ok(combined)
}

/// Time-varying pillar weights from the predictive power of each factor.
///
/// An expanding-origin Ridge regression of `forward_periods`-ahead target
/// returns on the pillar factors; at each date past `window` the fitted
/// coefficients are taken in absolute value and normalized to sum to one.
/// Discarding coefficient signs is intentional: the output is a weighting,
/// not a trading signal, though it does mask negative predictive
/// relationships.
///
/// Returns `(dates, weights_per_date)` with one weight per factor, in input
/// order. With too little history a single equal-weight row comes back.
pub fn optimize_pillar_weights(
    factors: &[NamedSeries],
    target: &[(Date, f64)],
    window: usize,
    forward_periods: usize,
    regularization: f64,
) -> Result<(Vec<Date>, Vec<Vec<f64>>), ModelError> {
    let p = factors.len();
    if p == 0 {
        return Err(ModelError::EmptyData);
    }
    if window == 0 || forward_periods == 0 {
        return Err(ModelError::InvalidConfig(
            "window and forward_periods must be positive".to_string(),
        ));
    }

    // Align factors and the forward-shifted target on common dates.
    let target_map: BTreeMap<Date, f64> =
        target.iter().filter(|(_, v)| v.is_finite()).map(|(d, v)| (*d, *v)).collect();
    let target_dates: Vec<Date> = target_map.keys().copied().collect();

    let factor_maps: Vec<BTreeMap<Date, f64>> = factors
        .iter()
        .map(|(_, series)| {
            series.iter().filter(|(_, v)| v.is_finite()).map(|(d, v)| (*d, *v)).collect()
        })
        .collect();

    let mut rows: Vec<(Date, Vec<f64>, f64)> = Vec::new();
    for (i, date) in target_dates.iter().enumerate() {
        // Forward return: the target observed `forward_periods` ticks later.
        let Some(forward_date) = target_dates.get(i + forward_periods) else {
            break;
        };
        let forward = target_map[forward_date];
        let values: Option<Vec<f64>> =
            factor_maps.iter().map(|m| m.get(date).copied()).collect();
        if let Some(values) = values {
            rows.push((*date, values, forward));
        }
    }

    let equal = vec![1.0 / p as f64; p];
    if rows.len() <= window {
        let last_date = rows.last().map_or_else(
            || target_dates.last().copied().unwrap_or_default(),
            |(d, _, _)| *d,
        );
        return Ok((vec![last_date], vec![equal]));
    }

    let mut out_dates = Vec::new();
    let mut out_weights = Vec::new();
    for t in window..rows.len() {
        let mut x = Array2::zeros((t, p));
        let mut y = Array1::zeros(t);
        for (r, (_, values, forward)) in rows[..t].iter().enumerate() {
            for (c, v) in values.iter().enumerate() {
                x[[r, c]] = *v;
            }
            y[r] = *forward;
        }

        let coefs = match linalg::ridge_regression(&x, &y, regularization) {
            Ok(c) => c,
            Err(_) => Array1::from_vec(equal.clone()),
        };
        let abs: Vec<f64> = coefs.iter().map(|c| c.abs()).collect();
        let total: f64 = abs.iter().sum();
        let normalized = if total > 0.0 {
            abs.iter().map(|a| a / total).collect()
        } else {
            equal.clone()
        };

        out_dates.push(rows[t].0);
        out_weights.push(normalized);
    }
    Ok((out_dates, out_weights))
}
