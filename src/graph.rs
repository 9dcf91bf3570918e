use plotters::prelude::*;

use crate::stats::Bin;

/// Styling shared by the report charts
///
/// Charts carry no text; labels and axis extents are rendered by the
/// surrounding HTML so the SVG output does not depend on system fonts.
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,

    /// Fill colour for bars
    pub color: RGBColor,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 360,
            height: 180,
            color: RGBColor(55, 126, 184),
        }
    }
}

/// Render histogram bins as an inline SVG document
///
/// # Arguments
/// * `bins` - Buckets produced by `stats::histogram`
/// * `options` - Chart dimensions and colour
///
/// # Returns
/// * The `<svg>` markup, or an error from the drawing backend
pub fn histogram_svg(
    bins: &[Bin],
    options: &ChartOptions,
) -> Result<String, Box<dyn std::error::Error>> {
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return Err("no data to plot".into());
    };

    let (mut x_min, mut x_max) = (first.start, last.end);
    if x_min == x_max {
        x_min -= 0.5;
        x_max += 0.5;
    }
    let y_max = bins.iter().map(|b| b.count).max().unwrap_or(1).max(1) as f64 * 1.05;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(4)
            .build_cartesian_2d(x_min..x_max, 0f64..y_max)?;

        let single = bins.len() == 1;
        chart.draw_series(bins.iter().map(|b| {
            let (start, end) = if single { (x_min, x_max) } else { (b.start, b.end) };
            Rectangle::new([(start, 0.0), (end, b.count as f64)], options.color.filled())
        }))?;
        chart.draw_series(bins.iter().filter(|b| b.count > 0).map(|b| {
            let (start, end) = if single { (x_min, x_max) } else { (b.start, b.end) };
            Rectangle::new([(start, 0.0), (end, b.count as f64)], WHITE.stroke_width(1))
        }))?;

        root.present()?;
    }

    Ok(svg)
}

/// Render one bar per column showing the fraction of values present
///
/// `fractions` holds the share of missing cells per column, in `0.0..=1.0`;
/// the filled part of each bar is the complement.
pub fn completeness_svg(
    fractions: &[f64],
    options: &ChartOptions,
) -> Result<String, Box<dyn std::error::Error>> {
    if fractions.is_empty() {
        return Err("no data to plot".into());
    }
    let n = fractions.len() as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(4)
            .build_cartesian_2d(0f64..n, 0f64..1f64)?;

        chart.draw_series(fractions.iter().enumerate().map(|(i, missing)| {
            let present = 1.0 - missing.clamp(0.0, 1.0);
            let x = i as f64;
            Rectangle::new([(x + 0.1, 0.0), (x + 0.9, present)], options.color.filled())
        }))?;

        root.present()?;
    }

    Ok(svg)
}

/// Render a square correlation matrix as an SVG heatmap
///
/// Positive coefficients shade towards blue, negative towards red; cells
/// without a coefficient are grey. Row 0 is drawn at the top.
pub fn heatmap_svg(
    matrix: &[Vec<Option<f64>>],
    options: &ChartOptions,
) -> Result<String, Box<dyn std::error::Error>> {
    let n = matrix.len() as i32;
    if n == 0 {
        return Err("no data to plot".into());
    }

    let side = options.width.min(options.height).max(40);
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (side, side)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(2)
            .build_cartesian_2d(0i32..n, 0i32..n)?;

        chart.draw_series(matrix.iter().enumerate().flat_map(|(i, row)| {
            row.iter().enumerate().map(move |(j, value)| {
                let (i, j) = (i as i32, j as i32);
                Rectangle::new(
                    [(j, n - 1 - i), (j + 1, n - i)],
                    correlation_color(*value).filled(),
                )
            })
        }))?;

        root.present()?;
    }

    Ok(svg)
}

fn correlation_color(value: Option<f64>) -> RGBColor {
    let Some(r) = value else {
        return RGBColor(220, 220, 220);
    };
    let strength = r.abs().clamp(0.0, 1.0);
    let fade = |c: u8| (255.0 - (255.0 - c as f64) * strength).round() as u8;
    if r >= 0.0 {
        RGBColor(fade(33), fade(102), fade(172))
    } else {
        RGBColor(fade(178), fade(24), fade(43))
    }
}
