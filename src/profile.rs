//! Profiling engine: turns a parsed table into an exploratory data report.
//!
//! The output mirrors what a typical automated EDA tool shows: an overview of
//! the dataset, one section per variable, alerts about data-quality issues,
//! correlation matrices, a missing-value summary, head/tail samples and the
//! most common duplicate rows.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use polars::prelude::{DataFrame, DataType, PolarsResult, Series};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::Result;
use crate::frame::{display_values, float_values, is_numeric};
use crate::graph::{ChartOptions, completeness_svg, heatmap_svg, histogram_svg};
use crate::preview::render_table;
use crate::stats;

/// Title given to every generated report
pub const REPORT_TITLE: &str = "Automated EDA Report";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DAY_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

type Coefficient = fn(&[f64], &[f64]) -> Option<f64>;

/// Knobs controlling how much analysis is done
#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub title: String,

    /// Enables Spearman correlations and word frequencies for text
    pub explorative: bool,

    /// Rows shown in the head and tail samples
    pub sample_rows: usize,

    /// Entries kept in frequency tables
    pub top_values: usize,

    /// Upper bound on histogram bins
    pub max_bins: usize,

    /// Distinct count above which a categorical variable is flagged
    pub high_cardinality: usize,

    /// Absolute Pearson coefficient above which a pair is flagged
    pub correlation_threshold: f64,

    /// Fraction of zeros above which a numeric variable is flagged
    pub zeros_threshold: f64,

    /// Absolute skewness above which a numeric variable is flagged
    pub skew_threshold: f64,
}

impl ProfileConfig {
    /// Full-depth profile with the given title
    pub fn explorative(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            explorative: true,
            ..Self::default()
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            explorative: false,
            sample_rows: 10,
            top_values: 10,
            max_bins: 50,
            high_cardinality: 50,
            correlation_threshold: 0.9,
            zeros_threshold: 0.1,
            skew_threshold: 20.0,
        }
    }
}

/// Type assigned to a variable for reporting purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VariableType {
    Numeric,
    Categorical,
    Boolean,
    DateTime,
    Text,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Missing,
    Constant,
    Unique,
    HighCardinality,
    Zeros,
    Skewed,
    HighCorrelation,
    Duplicates,
    Unsupported,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub column: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeCount {
    pub var_type: VariableType,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub n_variables: usize,
    pub n_observations: usize,
    pub n_cells_missing: usize,
    pub p_cells_missing: f64,
    pub n_duplicates: usize,
    pub p_duplicates: f64,
    pub types: Vec<TypeCount>,
    pub analysis_started: String,
    pub analysis_finished: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Frequency {
    pub value: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quantiles {
    pub p5: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub p95: f64,
    pub iqr: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub mean: f64,
    pub std: Option<f64>,
    pub variance: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub sum: f64,
    pub n_zeros: usize,
    pub p_zeros: f64,
    pub n_negative: usize,
    pub p_negative: f64,
    pub n_infinite: usize,
    pub quantiles: Quantiles,
    pub cv: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub mad: f64,
    pub monotonicity: &'static str,
    pub histogram: Vec<stats::Bin>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoricalSummary {
    pub top: Vec<Frequency>,
    pub n_other: usize,
    pub length_min: usize,
    pub length_max: usize,
    pub length_mean: f64,
    /// Most common words; only filled for text variables in explorative mode
    pub words: Vec<Frequency>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BooleanSummary {
    pub n_true: usize,
    pub n_false: usize,
    pub p_true: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateTimeSummary {
    pub min: String,
    pub max: String,
    pub range: String,
    pub histogram: Vec<stats::Bin>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableProfile {
    pub name: String,
    pub var_type: VariableType,
    pub dtype: String,
    pub n: usize,
    pub count: usize,
    pub n_missing: usize,
    pub p_missing: f64,
    pub n_distinct: usize,
    pub p_distinct: f64,
    pub is_unique: bool,
    pub numeric: Option<NumericSummary>,
    pub categorical: Option<CategoricalSummary>,
    pub boolean: Option<BooleanSummary>,
    pub datetime: Option<DateTimeSummary>,
    pub chart_svg: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationRow {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub method: &'static str,
    pub columns: Vec<String>,
    pub rows: Vec<CorrelationRow>,
    pub chart_svg: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingSummary {
    pub name: String,
    pub n_missing: usize,
    pub p_missing: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateRow {
    pub values: Vec<String>,
    pub count: usize,
}

/// Everything the report template needs
#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub title: String,
    pub explorative: bool,
    pub overview: Overview,
    pub variables: Vec<VariableProfile>,
    pub alerts: Vec<Alert>,
    pub correlations: Vec<CorrelationMatrix>,
    pub missing: Vec<MissingSummary>,
    pub missing_chart_svg: Option<String>,
    pub column_names: Vec<String>,
    pub sample_head_html: String,
    pub sample_tail_html: String,
    pub duplicates: Vec<DuplicateRow>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Profile a data frame
pub fn profile_frame(frame: &DataFrame, config: &ProfileConfig) -> Result<ProfileReport> {
    let started = Utc::now();
    let chart_options = ChartOptions::default();
    let series: Vec<&Series> = frame
        .get_columns()
        .iter()
        .map(|c| c.as_materialized_series())
        .collect();

    let variables = series
        .iter()
        .map(|s| profile_variable(s, config, &chart_options))
        .collect::<Result<Vec<VariableProfile>>>()?;

    let correlations = correlation_matrices(&series, &variables, config, &chart_options)?;
    let (n_duplicates, duplicates) = duplicate_rows(&series, frame.height(), config.top_values)?;
    let alerts = collect_alerts(&variables, &correlations, n_duplicates, frame.height(), config);

    let n_cells = frame.height() * frame.width();
    let n_cells_missing: usize = variables.iter().map(|v| v.n_missing).sum();

    let mut types: Vec<TypeCount> = Vec::new();
    for variable in &variables {
        match types.iter_mut().find(|t| t.var_type == variable.var_type) {
            Some(entry) => entry.count += 1,
            None => types.push(TypeCount {
                var_type: variable.var_type,
                count: 1,
            }),
        }
    }

    let missing: Vec<MissingSummary> = variables
        .iter()
        .map(|v| MissingSummary {
            name: v.name.clone(),
            n_missing: v.n_missing,
            p_missing: v.p_missing,
        })
        .collect();
    let missing_chart_svg = if missing.is_empty() {
        None
    } else {
        let fractions: Vec<f64> = missing.iter().map(|m| m.p_missing / 100.0).collect();
        chart("missing values", || completeness_svg(&fractions, &chart_options))
    };

    let overview = Overview {
        n_variables: frame.width(),
        n_observations: frame.height(),
        n_cells_missing,
        p_cells_missing: percent(n_cells_missing, n_cells),
        n_duplicates,
        p_duplicates: percent(n_duplicates, frame.height()),
        types,
        analysis_started: started.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        analysis_finished: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    };

    debug!(
        variables = overview.n_variables,
        observations = overview.n_observations,
        alerts = alerts.len(),
        "profiled frame"
    );

    Ok(ProfileReport {
        title: config.title.clone(),
        explorative: config.explorative,
        overview,
        variables,
        alerts,
        correlations,
        missing,
        missing_chart_svg,
        column_names: frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect(),
        sample_head_html: render_table(&frame.head(Some(config.sample_rows)))?,
        sample_tail_html: render_table(&frame.tail(Some(config.sample_rows)))?,
        duplicates,
    })
}

/// Decide the reporting type of a column
pub fn classify(series: &Series, config: &ProfileConfig) -> Result<VariableType> {
    if series.null_count() == series.len() {
        return Ok(VariableType::Unsupported);
    }
    let dtype = series.dtype();
    if is_numeric(dtype) {
        return Ok(VariableType::Numeric);
    }
    if dtype == &DataType::Boolean {
        return Ok(VariableType::Boolean);
    }

    let texts = non_null_strings(series)?;
    if texts.iter().all(|s| parse_datetime(s).is_some()) {
        return Ok(VariableType::DateTime);
    }
    let distinct = series.drop_nulls().n_unique()?;
    if distinct > config.high_cardinality && distinct * 2 > texts.len() {
        Ok(VariableType::Text)
    } else {
        Ok(VariableType::Categorical)
    }
}

/// Parse the date formats commonly found in exported spreadsheets
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DAY_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn non_null_strings(series: &Series) -> Result<Vec<String>> {
    Ok(display_values(series)?.into_iter().flatten().collect())
}

fn frequencies(values: &[String], limit: usize, total: usize) -> (Vec<Frequency>, usize) {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, v) in values.iter().enumerate() {
        counts.entry(v.as_str()).or_insert((0, index)).0 += 1;
    }
    let mut ordered: Vec<(&str, usize, usize)> =
        counts.into_iter().map(|(v, (c, first))| (v, c, first)).collect();
    // most frequent first, ties in order of first appearance
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let top: Vec<Frequency> = ordered
        .iter()
        .take(limit)
        .map(|(v, c, _)| Frequency {
            value: v.to_string(),
            count: *c,
            percent: percent(*c, total),
        })
        .collect();
    let n_other = ordered.iter().skip(limit).map(|(_, c, _)| c).sum();
    (top, n_other)
}

fn profile_variable(
    series: &Series,
    config: &ProfileConfig,
    chart_options: &ChartOptions,
) -> Result<VariableProfile> {
    let name = series.name().to_string();
    let var_type = classify(series, config)?;
    let n = series.len();
    let n_missing = series.null_count();
    let count = n - n_missing;
    let n_distinct = series.drop_nulls().n_unique()?;

    let mut profile = VariableProfile {
        name: name.clone(),
        var_type,
        dtype: series.dtype().to_string(),
        n,
        count,
        n_missing,
        p_missing: percent(n_missing, n),
        n_distinct,
        p_distinct: percent(n_distinct, count),
        is_unique: count > 0 && n_distinct == count,
        numeric: None,
        categorical: None,
        boolean: None,
        datetime: None,
        chart_svg: None,
    };

    match var_type {
        VariableType::Numeric => {
            let summary = numeric_summary(&float_values(series)?, config);
            if let Some(summary) = &summary {
                profile.chart_svg = chart(&name, || {
                    histogram_svg(&summary.histogram, chart_options)
                });
            }
            profile.numeric = summary;
        }
        VariableType::Categorical | VariableType::Text => {
            let texts = non_null_strings(series)?;
            profile.categorical = Some(categorical_summary(
                &texts,
                var_type == VariableType::Text && config.explorative,
                config,
            ));
        }
        VariableType::Boolean => {
            let n_true = series
                .bool()?
                .into_iter()
                .filter(|v| *v == Some(true))
                .count();
            profile.boolean = Some(BooleanSummary {
                n_true,
                n_false: count - n_true,
                p_true: percent(n_true, count),
            });
        }
        VariableType::DateTime => {
            let summary = datetime_summary(&non_null_strings(series)?, config);
            if let Some(summary) = &summary {
                profile.chart_svg = chart(&name, || {
                    histogram_svg(&summary.histogram, chart_options)
                });
            }
            profile.datetime = summary;
        }
        VariableType::Unsupported => {}
    }

    Ok(profile)
}

/// Render a chart, logging and dropping it on failure
fn chart<F>(name: &str, render: F) -> Option<String>
where
    F: FnOnce() -> std::result::Result<String, Box<dyn std::error::Error>>,
{
    match render() {
        Ok(svg) => Some(svg),
        Err(e) => {
            warn!(column = %name, error = %e, "chart rendering failed");
            None
        }
    }
}

fn numeric_summary(cells: &[Option<f64>], config: &ProfileConfig) -> Option<NumericSummary> {
    let all: Vec<f64> = cells.iter().flatten().copied().collect();
    let n_infinite = all.iter().filter(|x| x.is_infinite()).count();
    let values: Vec<f64> = all.into_iter().filter(|x| x.is_finite()).collect();
    if values.is_empty() {
        return None;
    }

    let sorted = stats::sorted(&values);
    let q = |p: f64| stats::quantile_sorted(&sorted, p).unwrap_or(f64::NAN);
    let mean = stats::mean(&values)?;
    let std = stats::std_dev(&values);
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let n_zeros = values.iter().filter(|x| **x == 0.0).count();
    let n_negative = values.iter().filter(|x| **x < 0.0).count();
    let n = cells.len();

    Some(NumericSummary {
        mean,
        std,
        variance: stats::variance(&values),
        min,
        max,
        range: max - min,
        sum: values.iter().sum(),
        n_zeros,
        p_zeros: percent(n_zeros, n),
        n_negative,
        p_negative: percent(n_negative, n),
        n_infinite,
        quantiles: Quantiles {
            p5: q(0.05),
            q1: q(0.25),
            median: q(0.5),
            q3: q(0.75),
            p95: q(0.95),
            iqr: q(0.75) - q(0.25),
        },
        cv: std.filter(|_| mean != 0.0).map(|s| s / mean),
        skewness: stats::skewness(&values),
        kurtosis: stats::kurtosis(&values),
        mad: stats::median_abs_deviation(&values).unwrap_or(0.0),
        monotonicity: stats::monotonicity(&values).label(),
        histogram: stats::histogram(&values, config.max_bins),
    })
}

fn categorical_summary(texts: &[String], with_words: bool, config: &ProfileConfig) -> CategoricalSummary {
    let (top, n_other) = frequencies(texts, config.top_values, texts.len());
    let lengths: Vec<usize> = texts.iter().map(|s| s.chars().count()).collect();

    let words = if with_words {
        let words: Vec<String> = texts
            .iter()
            .flat_map(|s| s.split_whitespace())
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();
        frequencies(&words, config.top_values, words.len()).0
    } else {
        Vec::new()
    };

    CategoricalSummary {
        top,
        n_other,
        length_min: lengths.iter().copied().min().unwrap_or(0),
        length_max: lengths.iter().copied().max().unwrap_or(0),
        length_mean: if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
        },
        words,
    }
}

fn datetime_summary(texts: &[String], config: &ProfileConfig) -> Option<DateTimeSummary> {
    let moments: Vec<NaiveDateTime> = texts.iter().filter_map(|s| parse_datetime(s)).collect();
    let min = *moments.iter().min()?;
    let max = *moments.iter().max()?;
    let span = max - min;

    let seconds: Vec<f64> = moments
        .iter()
        .map(|dt| dt.and_utc().timestamp() as f64)
        .collect();

    Some(DateTimeSummary {
        min: min.format("%Y-%m-%d %H:%M:%S").to_string(),
        max: max.format("%Y-%m-%d %H:%M:%S").to_string(),
        range: format!(
            "{} days {:02}:{:02}:{:02}",
            span.num_days(),
            span.num_hours() % 24,
            span.num_minutes() % 60,
            span.num_seconds() % 60
        ),
        histogram: stats::histogram(&seconds, config.max_bins),
    })
}

fn correlation_matrices(
    series: &[&Series],
    variables: &[VariableProfile],
    config: &ProfileConfig,
    chart_options: &ChartOptions,
) -> Result<Vec<CorrelationMatrix>> {
    let numeric: Vec<(String, Vec<Option<f64>>)> = series
        .iter()
        .zip(variables)
        .filter(|(_, v)| v.var_type == VariableType::Numeric)
        .map(|(s, v)| -> Result<(String, Vec<Option<f64>>)> {
            Ok((v.name.clone(), float_values(s)?))
        })
        .collect::<Result<_>>()?;
    if numeric.len() < 2 {
        return Ok(Vec::new());
    }

    let mut methods: Vec<(&'static str, Coefficient)> =
        vec![("Pearson", stats::pearson as Coefficient)];
    if config.explorative {
        methods.push(("Spearman", stats::spearman as Coefficient));
    }

    let matrices = methods
        .into_iter()
        .map(|(method, coefficient)| {
            let matrix: Vec<Vec<Option<f64>>> = numeric
                .iter()
                .map(|(_, a)| {
                    numeric
                        .iter()
                        .map(|(_, b)| {
                            let (xs, ys) = paired_finite(a, b);
                            coefficient(&xs, &ys)
                        })
                        .collect()
                })
                .collect();
            let chart_svg = chart(method, || heatmap_svg(&matrix, chart_options));
            CorrelationMatrix {
                method,
                columns: numeric.iter().map(|(name, _)| name.clone()).collect(),
                rows: numeric
                    .iter()
                    .zip(matrix)
                    .map(|((name, _), values)| CorrelationRow {
                        name: name.clone(),
                        values,
                    })
                    .collect(),
                chart_svg,
            }
        })
        .collect();
    Ok(matrices)
}

/// Observations where both columns hold a finite number
fn paired_finite(a: &[Option<f64>], b: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .unzip()
}

/// Count rows identical to an earlier row and list the most repeated ones
fn duplicate_rows(
    series: &[&Series],
    height: usize,
    limit: usize,
) -> Result<(usize, Vec<DuplicateRow>)> {
    let columns = series
        .iter()
        .map(|s| display_values(s))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut counts: HashMap<Vec<String>, (usize, usize)> = HashMap::new();
    for index in 0..height {
        let key: Vec<String> = columns
            .iter()
            .map(|c| c[index].clone().unwrap_or_else(|| "NaN".to_string()))
            .collect();
        counts.entry(key).or_insert((0, index)).0 += 1;
    }

    let n_duplicates = height - counts.len();
    let mut repeated: Vec<(Vec<String>, usize, usize)> = counts
        .into_iter()
        .filter(|(_, (count, _))| *count > 1)
        .map(|(values, (count, first))| (values, count, first))
        .collect();
    repeated.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let rows = repeated
        .into_iter()
        .take(limit)
        .map(|(values, count, _)| DuplicateRow { values, count })
        .collect();
    Ok((n_duplicates, rows))
}

fn collect_alerts(
    variables: &[VariableProfile],
    correlations: &[CorrelationMatrix],
    n_duplicates: usize,
    n_rows: usize,
    config: &ProfileConfig,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let mut push = |kind, column: Option<&str>, message: String| {
        alerts.push(Alert {
            kind,
            column: column.map(str::to_string),
            message,
        })
    };

    if n_duplicates > 0 {
        push(
            AlertKind::Duplicates,
            None,
            format!(
                "Dataset has {} ({:.1}%) duplicate rows",
                n_duplicates,
                percent(n_duplicates, n_rows)
            ),
        );
    }

    for v in variables {
        let name = Some(v.name.as_str());
        if v.var_type == VariableType::Unsupported {
            push(
                AlertKind::Unsupported,
                name,
                format!("{} is an unsupported type (no non-missing values)", v.name),
            );
            continue;
        }
        if v.n_missing > 0 {
            push(
                AlertKind::Missing,
                name,
                format!("{} has {} ({:.1}%) missing values", v.name, v.n_missing, v.p_missing),
            );
        }
        if v.n_distinct == 1 {
            push(
                AlertKind::Constant,
                name,
                format!("{} has constant value", v.name),
            );
        } else if v.is_unique && v.count > 1 {
            push(AlertKind::Unique, name, format!("{} has unique values", v.name));
        }
        if v.var_type == VariableType::Categorical && v.n_distinct > config.high_cardinality {
            push(
                AlertKind::HighCardinality,
                name,
                format!("{} has a high cardinality: {} distinct values", v.name, v.n_distinct),
            );
        }
        if let Some(numeric) = &v.numeric {
            if numeric.p_zeros > config.zeros_threshold * 100.0 {
                push(
                    AlertKind::Zeros,
                    name,
                    format!("{} has {} ({:.1}%) zeros", v.name, numeric.n_zeros, numeric.p_zeros),
                );
            }
            if let Some(skew) = numeric.skewness.filter(|s| s.abs() > config.skew_threshold) {
                push(
                    AlertKind::Skewed,
                    name,
                    format!("{} is highly skewed (\u{03b3}1 = {:.2})", v.name, skew),
                );
            }
        }
    }

    if let Some(pearson) = correlations.iter().find(|m| m.method == "Pearson") {
        for (i, row) in pearson.rows.iter().enumerate() {
            for (j, value) in row.values.iter().enumerate().skip(i + 1) {
                if let Some(r) = value.filter(|r| r.abs() > config.correlation_threshold) {
                    push(
                        AlertKind::HighCorrelation,
                        Some(row.name.as_str()),
                        format!(
                            "{} is highly correlated with {} (\u{03c1} = {:.2})",
                            row.name, pearson.columns[j], r
                        ),
                    );
                }
            }
        }
    }

    alerts
}
