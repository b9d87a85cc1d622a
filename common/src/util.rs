/// Geometric mean of `1 + v` over `values`, shifted back by one.
///
/// Ratio-like columns can be negative, the shift keeps every factor
/// positive. Any missing value makes the result NaN, as does an empty input.
pub fn shifted_geomean<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut product = 1.0;
    let mut count = 0usize;
    for v in values {
        match v {
            Some(v) => product *= 1.0 + v,
            None => return f64::NAN,
        }
        count += 1;
    }
    if count == 0 {
        return f64::NAN;
    }
    product.powf(1.0 / count as f64) - 1.0
}

/// Formats a float the way reports always have, `nan` for missing values.
pub fn format_real(x: f64, precision: usize) -> String {
    if x.is_nan() {
        "nan".to_owned()
    } else {
        format!("{x:.precision$}")
    }
}
