//! CSV reading with encoding and delimiter auto-detection.
//!
//! Produces rows of text values keyed by the header line. Used by
//! [`CsvStorage`](crate::storage::CsvStorage).

use std::path::Path;

use crate::value::{Row, Value};

/// CSV parsing error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(col) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            None => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

/// Parsed rows with the detected layout.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub rows: Vec<Row>,
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string; unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;
    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Every cell becomes a [`Value::Text`]; short records are padded with empty
/// strings and extra cells are ignored.
pub fn parse_str(content: &str, delimiter: char) -> Result<(Vec<String>, Vec<Row>), CsvError> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| CsvError::new(0, format!("Delimiter '{delimiter}' is not a single byte")))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let record = record.map_err(|e| CsvError::new(line, format!("Cannot read record: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), Value::from(record.get(i).unwrap_or(""))))
            .collect();
        rows.push(row);
    }

    Ok((headers, rows))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParsedCsv, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let (headers, rows) = parse_str(&content, delimiter)?;
    log::debug!(
        "parsed {} csv rows (encoding {encoding}, delimiter {delimiter:?})",
        rows.len()
    );

    Ok(ParsedCsv {
        rows,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> Result<ParsedCsv, CsvError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| CsvError::new(0, format!("Cannot read file '{}': {e}", path.display())))?;
    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let (headers, rows) = parse_str("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(headers, vec!["name", "age"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], Value::from("Alice"));
        assert_eq!(rows[1]["age"], Value::from("25"));
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let (_, rows) = parse_str("name,value\n\"Smith, J\",\"Hello World\"", ',').unwrap();
        assert_eq!(rows[0]["name"], Value::from("Smith, J"));
        assert_eq!(rows[0]["value"], Value::from("Hello World"));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let (_, rows) = parse_str("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_short_and_long_records() {
        let (_, rows) = parse_str("a;b;c\n1\n1;2;3;4", ';').unwrap();
        assert_eq!(rows[0]["b"], Value::from(""));
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_error_message_format() {
        let msg = CsvError::new(5, "Invalid value").with_column("age").to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'age'"));
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_str("", ';').unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_auto_parse() {
        let parsed = parse_bytes_auto(b"name;age\nAlice;30\nBob;25").unwrap();
        assert_eq!(parsed.delimiter, ';');
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }
}
