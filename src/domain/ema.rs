//! Exponential moving average over a close series.
//!
//! k = 2/(n+1), seeded with the SMA of the first n values, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). The first n-1 points are warmup and
//! have no value.

pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut current = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i < period - 1 {
            sum += value;
            out.push(None);
        } else if i == period - 1 {
            sum += value;
            current = sum / period as f64;
            out.push(Some(current));
        } else {
            current = value * k + current * (1.0 - k);
            out.push(Some(current));
        }
    }
    out
}
