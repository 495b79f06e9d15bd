//! CSV line encoding
//!
//! Pure functions that turn a row of [`Cell`] values into one CSV line. No I/O
//! happens here; writers and the buffered path both go through [`encode_line`]
//! so the two output modes can never disagree on quoting.

use std::fmt;

use serde_json::Value as JsonValue;

/// Field separator allowed by the export settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    Comma,
    #[default]
    Semicolon,
    Tab,
}

impl Delimiter {
    /// All accepted delimiters, in settings-screen order.
    pub const ALL: [Delimiter; 3] = [Delimiter::Comma, Delimiter::Semicolon, Delimiter::Tab];

    /// The separator character.
    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Semicolon => ';',
            Delimiter::Tab => '\t',
        }
    }

    /// The persisted setting value.
    pub fn as_setting(self) -> &'static str {
        match self {
            Delimiter::Comma => ",",
            Delimiter::Semicolon => ";",
            Delimiter::Tab => "\t",
        }
    }

    /// Parse a persisted setting value; `None` when it is not an allowed one.
    ///
    /// The two-character escape `\t` is accepted for tab, since that is how a
    /// tab tends to arrive from a settings form or a command line.
    pub fn from_setting(value: &str) -> Option<Self> {
        match value {
            "," => Some(Delimiter::Comma),
            ";" => Some(Delimiter::Semicolon),
            "\t" | "\\t" => Some(Delimiter::Tab),
            _ => None,
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Comma => write!(f, "comma (,)"),
            Delimiter::Semicolon => write!(f, "semicolon (;)"),
            Delimiter::Tab => write!(f, "tab (\\t)"),
        }
    }
}

/// One scalar value of a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// Absent value, encoded as an empty field.
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Float(f64),
    /// Array or object, marshalled to compact JSON before encoding.
    Composite(JsonValue),
}

impl Cell {
    /// Canonical text form of the cell, before any quoting.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Integer(n) => n.to_string(),
            Cell::Float(n) => n.to_string(),
            // Value's Display is compact JSON with sorted object keys
            Cell::Composite(JsonValue::Null) => String::new(),
            Cell::Composite(JsonValue::String(s)) => s.clone(),
            Cell::Composite(value) => value.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => Cell::Integer(n),
            Err(_) => Cell::Text(value.to_string()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<JsonValue> for Cell {
    fn from(value: JsonValue) -> Self {
        Cell::Composite(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// A projected record, one cell per column.
pub type Row = Vec<Cell>;

/// Quote a field if it contains the delimiter, a quote or a line break
///
/// # Arguments
/// * `value` - Field text
/// * `delimiter` - Active separator
///
/// # Returns
/// * `String` - Field ready to be joined into a line
pub fn escape_field(value: &str, delimiter: char) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c == delimiter || c == '"' || c == '\n' || c == '\r');

    if needs_quotes {
        // Wrap in quotes and escape internal quotes by doubling them
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Encode one row as a CSV line terminated by a single `\n`
///
/// Deterministic and side-effect free: identical inputs give identical lines.
pub fn encode_line(row: &[Cell], delimiter: Delimiter) -> String {
    let sep = delimiter.as_char();
    let mut buf = [0u8; 4];
    let sep_str: &str = sep.encode_utf8(&mut buf);
    let mut line = row
        .iter()
        .map(|cell| escape_field(&cell.to_text(), sep))
        .collect::<Vec<_>>()
        .join(sep_str);
    line.push('\n');
    line
}

/// Encode a header row of column titles.
pub fn encode_header<S: AsRef<str>>(columns: &[S], delimiter: Delimiter) -> String {
    let cells: Vec<Cell> = columns.iter().map(|c| Cell::from(c.as_ref())).collect();
    encode_line(&cells, delimiter)
}

/// Complete CSV text assembled in memory
///
/// The header row is written by the constructor, so a document can never
/// hold data rows without exactly one header above them.
#[derive(Debug, Clone)]
pub struct CsvDocument {
    text: String,
    delimiter: Delimiter,
    rows: u64,
}

impl CsvDocument {
    /// Start a document with its header row.
    pub fn new<S: AsRef<str>>(columns: &[S], delimiter: Delimiter) -> Self {
        Self {
            text: encode_header(columns, delimiter),
            delimiter,
            rows: 0,
        }
    }

    /// Append one data row.
    pub fn push_row(&mut self, row: &[Cell]) {
        self.text.push_str(&encode_line(row, self.delimiter));
        self.rows += 1;
    }

    /// Number of data rows, header excluded.
    pub fn row_count(&self) -> u64 {
        self.rows
    }

    /// The CSV text, header first.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_line(line: &str, delimiter: Delimiter) -> Vec<String> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_char() as u8)
            .has_headers(false)
            .from_reader(line.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        record.iter().map(str::to_string).collect()
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("simple", ','), "simple");
        assert_eq!(escape_field("with,comma", ','), "\"with,comma\"");
        assert_eq!(escape_field("with,comma", ';'), "with,comma");
        assert_eq!(escape_field("with\"quote", ';'), "\"with\"\"quote\"");
        assert_eq!(escape_field("with\nnewline", ';'), "\"with\nnewline\"");
        assert_eq!(escape_field("with\rreturn", ';'), "\"with\rreturn\"");
        assert_eq!(escape_field("a\tb", '\t'), "\"a\tb\"");
    }

    #[test]
    fn test_encode_line_basic() {
        let row = vec![
            Cell::from(5u64),
            Cell::from("Tools"),
            Cell::from("tools"),
            Cell::Empty,
            Cell::from(""),
            Cell::Integer(3),
        ];
        assert_eq!(encode_line(&row, Delimiter::Semicolon), "5;Tools;tools;;;3\n");
    }

    #[test]
    fn test_encode_line_no_trailing_delimiter() {
        let row = vec![Cell::from("a"), Cell::from("b")];
        assert_eq!(encode_line(&row, Delimiter::Comma), "a,b\n");
        assert_eq!(encode_line(&[], Delimiter::Comma), "\n");
    }

    #[test]
    fn test_encode_line_quotes_website_with_comma() {
        let row = vec![Cell::from("jdoe"), Cell::from("http://a,b.com")];
        assert_eq!(
            encode_line(&row, Delimiter::Comma),
            "jdoe,\"http://a,b.com\"\n"
        );
    }

    #[test]
    fn test_cell_text_forms() {
        assert_eq!(Cell::Float(19.5).to_text(), "19.5");
        assert_eq!(Cell::Float(3.0).to_text(), "3");
        assert_eq!(Cell::from(None::<String>).to_text(), "");
        assert_eq!(Cell::from(json!(["a", "b"])).to_text(), "[\"a\",\"b\"]");
        assert_eq!(Cell::from(json!(null)).to_text(), "");
    }

    #[test]
    fn test_composite_is_stable() {
        let a = Cell::from(json!({"b": 1, "a": [1, 2]}));
        let b = Cell::from(json!({"a": [1, 2], "b": 1}));
        assert_eq!(a.to_text(), b.to_text());
        assert_eq!(
            encode_line(&[a], Delimiter::Comma),
            "\"{\"\"a\"\":[1,2],\"\"b\"\":1}\"\n"
        );
    }

    #[test]
    fn test_encoded_lines_decode_back() {
        let samples = [
            "plain",
            "",
            "semi;colon",
            "comma,here",
            "tab\there",
            "\"quoted\"",
            "multi\nline",
            "cr\r\nlf",
            "mixed \"q\", ; and \t",
        ];

        for delimiter in Delimiter::ALL {
            let row: Vec<Cell> = samples.iter().map(|s| Cell::from(*s)).collect();
            let line = encode_line(&row, delimiter);
            let decoded = decode_line(&line, delimiter);
            assert_eq!(decoded, samples, "delimiter {delimiter}");
        }
    }

    #[test]
    fn test_unquoted_when_no_special_characters() {
        let row = vec![Cell::from("a b"), Cell::from("x'y")];
        assert_eq!(encode_line(&row, Delimiter::Semicolon), "a b;x'y\n");
    }

    #[test]
    fn test_delimiter_settings() {
        assert_eq!(Delimiter::from_setting(","), Some(Delimiter::Comma));
        assert_eq!(Delimiter::from_setting("\t"), Some(Delimiter::Tab));
        assert_eq!(Delimiter::from_setting("\\t"), Some(Delimiter::Tab));
        assert_eq!(Delimiter::from_setting("|"), None);
        assert_eq!(Delimiter::default().as_setting(), ";");
    }

    #[test]
    fn test_document_has_single_header() {
        let mut doc = CsvDocument::new(&["ID", "Name"], Delimiter::Comma);
        doc.push_row(&[Cell::Integer(1), Cell::from("Alice")]);
        doc.push_row(&[Cell::Integer(2), Cell::from("Bob")]);
        assert_eq!(doc.row_count(), 2);
        assert_eq!(doc.as_str(), "ID,Name\n1,Alice\n2,Bob\n");

        let empty = CsvDocument::new(&["ID"], Delimiter::Comma);
        assert_eq!(empty.into_string(), "ID\n");
    }
}
