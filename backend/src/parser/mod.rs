//! Configurable CSV parser.
//!
//! [`parse`] turns an in-memory string into a [`Table`] under a
//! [`ParseConfiguration`]. It is pure: no I/O, no logging, no shared state.
//! The byte and file helpers add encoding detection in front of it.
//!
//! # Example
//! ```
//! use csvfetch::{parse, ParseConfiguration};
//!
//! let table = parse("a,\"b,c\",d", ParseConfiguration::default()).unwrap();
//! assert_eq!(table.rows()[0].fields(), ["a", "b,c", "d"]);
//! ```

pub mod config;
pub(crate) mod scanner;
pub mod table;

use std::path::Path;

use crate::error::{CsvError, CsvResult};

pub use config::ParseConfiguration;
pub use table::{Field, Row, Table};

/// Parse `text` into a table.
///
/// The configuration is checked first; an invalid one yields
/// [`CsvError::Configuration`] whatever the input. Malformed input yields
/// [`CsvError::Parse`]. Empty input yields an empty table.
pub fn parse(text: &str, config: ParseConfiguration) -> CsvResult<Table> {
    config.validate()?;
    Ok(scanner::scan(text, config)?)
}

/// Decode raw bytes (auto-detecting the encoding) and parse them.
pub fn parse_bytes(bytes: &[u8], config: ParseConfiguration) -> CsvResult<Table> {
    config.validate()?;
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    Ok(scanner::scan(&content, config)?)
}

/// Read a file and parse it with [`parse_bytes`].
pub fn parse_file<P: AsRef<Path>>(path: P, config: ParseConfiguration) -> CsvResult<Table> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes(&bytes, config)
}

/// Detect the encoding of raw bytes.
///
/// Input that is valid UTF-8 is always UTF-8; chardet is only consulted for
/// bytes that are not.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) || std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the named encoding.
///
/// A byte order mark is honoured and stripped. Unknown labels fall back to
/// UTF-8. Malformed sequences for the chosen encoding are an error.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let encoding_impl =
        encoding_rs::Encoding::for_label(encoding.trim().as_bytes()).unwrap_or(encoding_rs::UTF_8);

    let (decoded, used, had_errors) = encoding_impl.decode(bytes);
    if had_errors {
        return Err(CsvError::Encoding(format!(
            "input is not valid {}",
            used.name()
        )));
    }
    Ok(decoded.into_owned())
}

/// Guess the delimiter from the first line: the most frequent of
/// `,` `;` tab `|`. Falls back to comma.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}
