use handlebars::html_escape;
use polars::prelude::DataFrame;

use crate::error::Result;
use crate::frame::cell_text;

/// Rows shown in the upload preview
pub const PREVIEW_ROWS: usize = 10;

/// Render the first `PREVIEW_ROWS` rows of a frame as an HTML fragment
pub fn render_preview(frame: &DataFrame) -> Result<String> {
    render_table(&frame.head(Some(PREVIEW_ROWS)))
}

/// Render a whole frame as `<table class="dataframe">`, without an index column
///
/// Header and cell text is HTML-escaped.
pub fn render_table(frame: &DataFrame) -> Result<String> {
    let mut html = String::new();
    html.push_str("<table class=\"dataframe\">\n");
    html.push_str("  <thead>\n    <tr style=\"text-align: right;\">\n");
    for name in frame.get_column_names() {
        html.push_str(&format!("      <th>{}</th>\n", html_escape(name)));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for row in 0..frame.height() {
        html.push_str("    <tr>\n");
        for column in frame.get_columns() {
            let cell = cell_text(&column.get(row)?);
            html.push_str(&format!("      <td>{}</td>\n", html_escape(&cell)));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>");
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{IntoColumn, NamedFrom, Series};

    fn numbers(rows: i64) -> DataFrame {
        let n: Vec<i64> = (0..rows).collect();
        let labels: Vec<String> = (0..rows).map(|i| format!("row {}", i)).collect();
        DataFrame::new(vec![
            Series::new("n".into(), n).into_column(),
            Series::new("label".into(), labels).into_column(),
        ])
        .unwrap()
    }

    #[test]
    fn preview_is_capped_at_ten_rows() {
        let html = render_preview(&numbers(25)).unwrap();
        assert_eq!(html.matches("<tr>").count(), 10);
        assert!(html.contains("<td>row 9</td>"));
        assert!(!html.contains("<td>row 10</td>"));
    }

    #[test]
    fn short_frames_show_every_row() {
        let html = render_preview(&numbers(3)).unwrap();
        assert_eq!(html.matches("<tr>").count(), 3);
    }

    #[test]
    fn headers_keep_source_order_and_are_escaped() {
        let frame = DataFrame::new(vec![
            Series::new("<b>".into(), vec![Some("<script>")]).into_column(),
            Series::new("a&b".into(), vec![None::<f64>]).into_column(),
        ])
        .unwrap();
        let html = render_preview(&frame).unwrap();
        let first = html.find("&lt;b&gt;").unwrap();
        let second = html.find("a&amp;b").unwrap();
        assert!(first < second);
        assert!(html.contains("<td>&lt;script&gt;</td>"));
        assert!(html.contains("<td>NaN</td>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn floats_show_six_significant_digits() {
        let frame = DataFrame::new(vec![
            Series::new("ratio".into(), vec![1.0 / 3.0, 2.0, 0.1 + 0.2]).into_column(),
        ])
        .unwrap();
        let html = render_preview(&frame).unwrap();
        assert!(html.contains("<td>0.333333</td>"));
        assert!(html.contains("<td>2.0</td>"));
        assert!(html.contains("<td>0.3</td>"));
        assert!(!html.contains("0.30000000000000004"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let frame = numbers(5);
        assert_eq!(
            render_preview(&frame).unwrap(),
            render_preview(&frame).unwrap()
        );
    }
}
