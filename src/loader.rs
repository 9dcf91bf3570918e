use calamine::{Data, DataType as _, Range, Reader, Xls, Xlsx};
use polars::prelude::{
    Column, CsvParseOptions, CsvReadOptions, DataFrame, IntoColumn, NamedFrom, NullValues,
    PlSmallStr, SerReader, Series,
};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use crate::config::ALLOWED_EXTENSIONS;
use crate::error::{EdaError, Result};
use crate::frame::format_float;

/// Cell contents treated as missing when reading CSV
pub const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Supported dataset formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    /// Map a lowercased extension onto a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "csv" => Some(FileFormat::Csv),
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            _ => None,
        }
    }
}

/// Lowercased text after the last `.` of a filename, if any
pub fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
}

/// Whether a client-supplied filename carries an allowed extension
///
/// # Examples
/// ```
/// use eda_report::loader::allowed_file;
///
/// assert!(allowed_file("data.CSV"));
/// assert!(allowed_file("book.xlsx"));
/// assert!(!allowed_file("notes.txt"));
/// assert!(!allowed_file("csv"));
/// ```
pub fn allowed_file(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Detect the format from the filename and parse the bytes
pub fn load_frame(filename: &str, bytes: &[u8]) -> Result<DataFrame> {
    let extension = extension_of(filename).ok_or(EdaError::MissingExtension)?;
    let format = FileFormat::from_extension(&extension)
        .ok_or_else(|| EdaError::UnsupportedFileType(extension.clone()))?;

    match format {
        FileFormat::Csv => read_csv(bytes),
        FileFormat::Xlsx | FileFormat::Xls => read_spreadsheet(Cursor::new(bytes), format),
    }
}

/// Parse CSV with a header row.
///
/// Column types are inferred from every row, and the usual missing-value
/// markers (`NA`, `null`, `nan`, `None`, ...) read as nulls.
pub fn read_csv(bytes: &[u8]) -> Result<DataFrame> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(EdaError::EmptyDataset);
    }

    let null_values: Vec<PlSmallStr> = NA_VALUES.iter().map(|s| PlSmallStr::from(*s)).collect();
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(
            CsvParseOptions::default().with_null_values(Some(NullValues::AllColumns(null_values))),
        )
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    if frame.width() == 0 {
        return Err(EdaError::EmptyDataset);
    }
    Ok(frame)
}

/// Parse the first worksheet of an Excel workbook; its first row is the header
pub fn read_spreadsheet<RS: Read + Seek>(reader: RS, format: FileFormat) -> Result<DataFrame> {
    let range: Range<Data> = match format {
        FileFormat::Xlsx => {
            let mut workbook: Xlsx<_> = Xlsx::new(reader).map_err(spreadsheet_error)?;
            workbook
                .worksheet_range_at(0)
                .ok_or_else(no_worksheet)?
                .map_err(spreadsheet_error)?
        }
        FileFormat::Xls => {
            let mut workbook: Xls<_> = Xls::new(reader).map_err(spreadsheet_error)?;
            workbook
                .worksheet_range_at(0)
                .ok_or_else(no_worksheet)?
                .map_err(spreadsheet_error)?
        }
        FileFormat::Csv => {
            return Err(EdaError::Spreadsheet(
                "CSV data passed to spreadsheet reader".to_string(),
            ));
        }
    };

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(header_text).collect(),
        None => return Err(EdaError::EmptyDataset),
    };
    let body: Vec<&[Data]> = rows.collect();

    let columns: Vec<Column> = unique_headers(headers)
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let cells: Vec<&Data> = body.iter().map(|row| &row[i]).collect();
            sheet_column(name, &cells)
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

fn no_worksheet() -> EdaError {
    EdaError::Spreadsheet("No worksheet found in workbook".to_string())
}

fn spreadsheet_error(err: impl std::fmt::Display) -> EdaError {
    EdaError::Spreadsheet(err.to_string())
}

/// Type one worksheet column from its cells.
///
/// A column is boolean, integer or float only when every present cell
/// agrees; anything else is read as text.
fn sheet_column(name: String, cells: &[&Data]) -> Column {
    let name = PlSmallStr::from(name);
    let present: Vec<&Data> = cells.iter().copied().filter(|c| !is_missing(c)).collect();

    let series = if present.is_empty() {
        Series::new(name, vec![None::<f64>; cells.len()])
    } else if present.iter().all(|c| matches!(c, Data::Bool(_))) {
        let values: Vec<Option<bool>> = cells.iter().map(|c| c.get_bool()).collect();
        Series::new(name, values)
    } else if present.iter().all(|c| whole_number(c).is_some()) {
        let values: Vec<Option<i64>> = cells.iter().map(|c| whole_number(c)).collect();
        Series::new(name, values)
    } else if present.iter().all(|c| matches!(c, Data::Int(_) | Data::Float(_))) {
        let values: Vec<Option<f64>> = cells.iter().map(|c| number(c)).collect();
        Series::new(name, values)
    } else {
        let values: Vec<Option<String>> = cells.iter().map(|c| cell_text(c)).collect();
        Series::new(name, values)
    };
    series.into_column()
}

fn is_missing(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

fn number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        _ => None,
    }
}

// Workbooks store every number as a float; whole values read back as ints
fn whole_number(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(*f as i64),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    if is_missing(cell) {
        return None;
    }
    let text = match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => match whole_number(cell) {
            Some(i) => i.to_string(),
            None => format_float(*f),
        },
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        Data::String(s) => s.clone(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    };
    Some(text)
}

fn header_text(cell: &Data) -> String {
    cell_text(cell).unwrap_or_default()
}

/// Make worksheet header names unique and non-empty.
///
/// Empty headers become `Unnamed: <index>`; repeats get a `.1`, `.2`, ...
/// suffix in order of appearance.
fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut result = Vec::with_capacity(headers.len());

    for (index, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", index)
        } else {
            header
        };

        let mut name = base.clone();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{}.{}", base, count);
        }
        seen.insert(name.clone(), 0);
        if name != base {
            seen.entry(base).or_insert(0);
        }
        result.push(name);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::DataType;

    fn column_dtype(frame: &DataFrame, name: &str) -> DataType {
        frame.column(name).unwrap().dtype().clone()
    }

    #[test]
    fn extension_is_case_insensitive_and_uses_last_dot() {
        assert_eq!(extension_of("archive.tar.CSV").as_deref(), Some("csv"));
        assert_eq!(extension_of("noext"), None);
        assert!(!allowed_file("data.csv.exe"));
        assert!(allowed_file("Sales.XLS"));
    }

    #[test]
    fn csv_columns_are_typed() {
        let data = "id,score,name\n1,2.5,ann\n2,,bob\n";
        let frame = read_csv(data.as_bytes()).unwrap();
        assert_eq!(frame.shape(), (2, 3));
        assert_eq!(column_dtype(&frame, "id"), DataType::Int64);
        assert_eq!(column_dtype(&frame, "score"), DataType::Float64);
        assert_eq!(column_dtype(&frame, "name"), DataType::String);
        assert_eq!(frame.column("score").unwrap().null_count(), 1);
    }

    #[test]
    fn lowercase_and_python_null_markers_are_missing() {
        for marker in ["nan", "None", "n/a", "NA", "null"] {
            let data = format!("x\n1\n{}\n3\n", marker);
            let frame = read_csv(data.as_bytes()).unwrap();
            let column = frame.column("x").unwrap();
            assert_eq!(column.dtype(), &DataType::Int64, "marker {}", marker);
            assert_eq!(column.null_count(), 1, "marker {}", marker);
        }
    }

    #[test]
    fn mixed_csv_column_stays_text() {
        let data = "code\n007\nA1\n";
        let frame = read_csv(data.as_bytes()).unwrap();
        let column = frame.column("code").unwrap();
        assert_eq!(column.dtype(), &DataType::String);
        assert_eq!(column.str().unwrap().get(0), Some("007"));
    }

    #[test]
    fn empty_csv_is_rejected() {
        assert!(matches!(read_csv(b""), Err(EdaError::EmptyDataset)));
        assert!(matches!(read_csv(b"\n\n"), Err(EdaError::EmptyDataset)));
    }

    #[test]
    fn worksheet_columns_are_typed_by_their_cells() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in ["count", "ratio", "ok", "label", "label"].iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_number(1, 0, 3).unwrap();
        sheet.write_number(1, 1, 0.5).unwrap();
        sheet.write_boolean(1, 2, true).unwrap();
        sheet.write_string(1, 3, "x").unwrap();
        sheet.write_number(1, 4, 1).unwrap();
        sheet.write_number(2, 1, 2).unwrap();
        sheet.write_boolean(2, 2, false).unwrap();
        sheet.write_number(2, 3, 7).unwrap();
        sheet.write_string(2, 4, "y").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let frame = load_frame("book.xlsx", &bytes).unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(column_dtype(&frame, "count"), DataType::Int64);
        assert_eq!(frame.column("count").unwrap().null_count(), 1);
        assert_eq!(column_dtype(&frame, "ratio"), DataType::Float64);
        assert_eq!(column_dtype(&frame, "ok"), DataType::Boolean);
        assert_eq!(column_dtype(&frame, "label"), DataType::String);
        assert_eq!(column_dtype(&frame, "label.1"), DataType::String);
        assert_eq!(frame.column("label").unwrap().str().unwrap().get(1), Some("7"));
    }

    #[test]
    fn duplicate_and_blank_headers_are_renamed() {
        let headers = vec!["a".into(), "a".into(), "".into(), "a".into(), "a.1".into()];
        assert_eq!(
            unique_headers(headers),
            vec!["a", "a.1", "Unnamed: 2", "a.2", "a.1.1"]
        );
    }

    #[test]
    fn garbage_spreadsheet_fails_cleanly() {
        let err = load_frame("book.xlsx", b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, EdaError::Spreadsheet(_)));
    }

    #[test]
    fn load_frame_rejects_unknown_extension() {
        assert!(matches!(
            load_frame("notes.txt", b"hello"),
            Err(EdaError::UnsupportedFileType(ext)) if ext == "txt"
        ));
    }
}
