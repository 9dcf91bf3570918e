//! Helpers for reading values back out of polars frames.
//!
//! Cells are displayed the way a dataframe prints them: missing values as
//! `NaN`, booleans as `True`/`False` and floats with six significant digits.

use polars::prelude::*;

/// Significant digits kept when displaying floats
pub const SIGNIFICANT_DIGITS: i32 = 6;

/// Whether a column holds numbers
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Display a float with six significant digits, keeping at least one decimal
///
/// # Examples
/// ```
/// use eda_report::frame::format_float;
///
/// assert_eq!(format_float(1.0 / 3.0), "0.333333");
/// assert_eq!(format_float(2.0), "2.0");
/// assert_eq!(format_float(123.456789), "123.457");
/// ```
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == x.trunc() && x.abs() < 1e16 {
        return format!("{:.1}", x);
    }

    let magnitude = x.abs().log10().floor() as i32;
    if !(-4..16).contains(&magnitude) {
        return format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, x);
    }
    let decimals = (SIGNIFICANT_DIGITS - 1 - magnitude).max(1) as usize;
    let text = format!("{:.*}", decimals, x);
    let trimmed = text.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Display text of one cell
pub fn cell_text(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => "NaN".to_string(),
        AnyValue::Boolean(true) => "True".to_string(),
        AnyValue::Boolean(false) => "False".to_string(),
        AnyValue::Float64(x) => format_float(*x),
        AnyValue::Float32(x) => format_float(f64::from(*x)),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// Display text of every cell in a column, `None` where the value is missing
pub fn display_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    (0..series.len())
        .map(|i| {
            series.get(i).map(|value| match value {
                AnyValue::Null => None,
                other => Some(cell_text(&other)),
            })
        })
        .collect()
}

/// Numeric values of a column as `f64`, `None` where the value is missing
pub fn float_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats.f64()?.into_iter().collect())
}
