//! Single-pass CSV scanner.
//!
//! The scanner walks the input once, left to right, with at most one
//! character of lookahead past the current one. Field post-processing
//! (doubled-quote collapse, trimming) is applied as each field closes.
//!
//! Inside a field, a backslash escape is checked before doubled-quote
//! handling, so with both `recognize_backslash_escapes` and
//! `sanitize_fields` enabled `\""` reads as an escaped quote followed by a
//! closing quote.

use crate::error::{ParseError, ParseErrorKind, Position};

use super::config::ParseConfiguration;
use super::table::{Row, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    InUnquotedField,
    InQuotedField,
    AfterClosingQuote,
    InComment,
}

/// Character cursor tracking line, column and byte offset.
struct Cursor<'a> {
    text: &'a str,
    position: Position,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, position: Position::start() }
    }

    fn rest(&self) -> &'a str {
        let text: &'a str = self.text;
        &text[self.position.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn position(&self) -> Position {
        self.position
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position.offset += c.len_utf8();
        // A CR that starts a CRLF pair leaves the line break to the LF.
        let breaks_line = c == '\n' || (c == '\r' && self.peek() != Some('\n'));
        if breaks_line {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        Some(c)
    }

    /// Consume one row terminator: `\n`, `\r\n` or a bare `\r`.
    fn bump_terminator(&mut self) {
        if self.bump() == Some('\r') && self.peek() == Some('\n') {
            self.bump();
        }
    }
}

fn is_terminator(c: char) -> bool {
    c == '\n' || c == '\r'
}

struct Scanner<'a> {
    cursor: Cursor<'a>,
    config: ParseConfiguration,
    rows: Vec<Row>,
    row: Vec<String>,
    field: String,
    row_started: bool,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, config: ParseConfiguration) -> Self {
        Self {
            cursor: Cursor::new(text),
            config,
            rows: Vec::new(),
            row: Vec::new(),
            field: String::new(),
            row_started: false,
        }
    }

    fn run(mut self) -> Result<Table, ParseError> {
        let mut state = State::FieldStart;
        let mut quote_start = Position::start();

        loop {
            state = match state {
                State::FieldStart => {
                    if self.config.trim_whitespace {
                        self.skip_leading_whitespace();
                    }
                    match self.cursor.peek() {
                        None => break,
                        Some(c) if c == self.config.delimiter => {
                            self.row_started = true;
                            State::InUnquotedField
                        }
                        Some('=')
                            if self.config.recognize_leading_equal_sign
                                && self.cursor.peek_second() == Some('"') =>
                        {
                            quote_start = self.cursor.position();
                            self.cursor.bump();
                            self.cursor.bump();
                            self.row_started = true;
                            State::InQuotedField
                        }
                        Some('"') => {
                            quote_start = self.cursor.position();
                            self.cursor.bump();
                            self.row_started = true;
                            State::InQuotedField
                        }
                        Some('#') if self.config.recognize_comments => {
                            self.cursor.bump();
                            State::InComment
                        }
                        Some(_) => {
                            self.row_started = true;
                            State::InUnquotedField
                        }
                    }
                }

                State::InUnquotedField => match self.cursor.peek() {
                    None => break,
                    Some(c) if c == self.config.delimiter => {
                        self.cursor.bump();
                        self.end_field();
                        State::FieldStart
                    }
                    Some(c) if is_terminator(c) => {
                        self.cursor.bump_terminator();
                        self.end_row();
                        State::FieldStart
                    }
                    Some('\\') if self.config.recognize_backslash_escapes => {
                        if !self.push_escaped() {
                            self.push_current();
                        }
                        State::InUnquotedField
                    }
                    Some(_) => {
                        self.push_current();
                        State::InUnquotedField
                    }
                },

                State::InQuotedField => match self.cursor.peek() {
                    None => {
                        return Err(ParseError::new(ParseErrorKind::UnterminatedQuote, quote_start))
                    }
                    Some('\\') if self.config.recognize_backslash_escapes => {
                        if !self.push_escaped() {
                            self.push_current();
                        }
                        State::InQuotedField
                    }
                    Some('"') => {
                        self.cursor.bump();
                        if self.cursor.peek() == Some('"') {
                            self.cursor.bump();
                            if self.config.sanitize_fields {
                                self.field.push('"');
                            } else {
                                self.field.push_str("\"\"");
                            }
                            State::InQuotedField
                        } else {
                            State::AfterClosingQuote
                        }
                    }
                    Some(_) => {
                        self.push_current();
                        State::InQuotedField
                    }
                },

                State::AfterClosingQuote => match self.cursor.peek() {
                    None => break,
                    Some(c) if c == self.config.delimiter => {
                        self.cursor.bump();
                        self.end_field();
                        State::FieldStart
                    }
                    Some(c) if is_terminator(c) => {
                        self.cursor.bump_terminator();
                        self.end_row();
                        State::FieldStart
                    }
                    Some(c) if c.is_whitespace() => {
                        self.cursor.bump();
                        State::AfterClosingQuote
                    }
                    Some(c) => {
                        return Err(ParseError::new(
                            ParseErrorKind::UnexpectedAfterQuote(c),
                            self.cursor.position(),
                        ))
                    }
                },

                State::InComment => match self.cursor.peek() {
                    None => break,
                    Some('\\') if self.config.recognize_backslash_escapes => {
                        self.cursor.bump();
                        match self.cursor.peek() {
                            Some(c) if is_terminator(c) => self.cursor.bump_terminator(),
                            Some(_) => {
                                self.cursor.bump();
                            }
                            None => {}
                        }
                        State::InComment
                    }
                    Some(c) if is_terminator(c) => {
                        self.cursor.bump_terminator();
                        self.end_comment_line();
                        State::FieldStart
                    }
                    Some(_) => {
                        self.cursor.bump();
                        State::InComment
                    }
                },
            };
        }

        if state == State::InComment {
            self.end_comment_line();
        } else if self.row_started {
            self.end_row();
        }

        Ok(Table::new(self.rows))
    }

    fn push_current(&mut self) {
        if let Some(c) = self.cursor.bump() {
            self.field.push(c);
        }
    }

    /// At a backslash: if it escapes the next character, append that
    /// character literally and return `true`. Otherwise consume nothing.
    fn push_escaped(&mut self) -> bool {
        let escaped = match self.cursor.peek_second() {
            Some(c) => c,
            None => return false,
        };
        let escapable = escaped == self.config.delimiter
            || escaped == '"'
            || escaped == '\\'
            || is_terminator(escaped);
        if !escapable {
            return false;
        }

        self.cursor.bump();
        self.push_current();
        if escaped == '\r' && self.cursor.peek() == Some('\n') {
            self.push_current();
        }
        true
    }

    /// Whitespace before a field is skipped, but never the delimiter or a
    /// row terminator themselves.
    fn skip_leading_whitespace(&mut self) {
        while let Some(c) = self.cursor.peek() {
            if !c.is_whitespace() || c == self.config.delimiter || is_terminator(c) {
                break;
            }
            self.cursor.bump();
            self.row_started = true;
        }
    }

    fn end_field(&mut self) {
        let mut field = std::mem::take(&mut self.field);
        if self.config.trim_whitespace {
            let trimmed = field.trim_matches(|c: char| c.is_ascii_whitespace());
            if trimmed.len() != field.len() {
                field = trimmed.to_string();
            }
        }
        self.row.push(field);
        self.row_started = true;
    }

    fn end_row(&mut self) {
        self.end_field();
        self.rows.push(Row::new(std::mem::take(&mut self.row)));
        self.row_started = false;
    }

    /// A comment discards itself and the rest of the line. Fields before it
    /// on the same line still form a row; a comment-only line forms none.
    fn end_comment_line(&mut self) {
        self.field.clear();
        if !self.row.is_empty() {
            self.rows.push(Row::new(std::mem::take(&mut self.row)));
        }
        self.row_started = false;
    }
}

/// Scan `text` into a [`Table`]. The configuration must already be valid.
pub(crate) fn scan(text: &str, config: ParseConfiguration) -> Result<Table, ParseError> {
    Scanner::new(text, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(text: &str, config: ParseConfiguration) -> Vec<Vec<String>> {
        scan(text, config)
            .unwrap()
            .into_rows()
            .into_iter()
            .map(Row::into_fields)
            .collect()
    }

    fn default_rows(text: &str) -> Vec<Vec<String>> {
        rows(text, ParseConfiguration::default())
    }

    fn err(text: &str, config: ParseConfiguration) -> ParseError {
        scan(text, config).unwrap_err()
    }

    #[test]
    fn test_simple_split() {
        assert_eq!(
            default_rows("a,b,c\n1,2,3"),
            vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]
        );
    }

    #[test]
    fn test_empty_input_has_no_rows() {
        assert!(default_rows("").is_empty());
    }

    #[test]
    fn test_trailing_newline_adds_no_row() {
        assert_eq!(default_rows("a,b\n"), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_all_terminators_break_rows() {
        assert_eq!(
            default_rows("a\nb\r\nc\rd"),
            vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"]]
        );
    }

    #[test]
    fn test_blank_line_is_single_empty_field() {
        assert_eq!(default_rows("a\n\nb"), vec![vec!["a"], vec![""], vec!["b"]]);
        assert_eq!(default_rows("\r\n"), vec![vec![""]]);
    }

    #[test]
    fn test_missing_trailing_field_is_empty() {
        assert_eq!(default_rows("a,\n,b"), vec![vec!["a", ""], vec!["", "b"]]);
    }

    #[test]
    fn test_rows_keep_their_width() {
        assert_eq!(
            default_rows("a,b,c\nd\ne,f"),
            vec![vec!["a", "b", "c"], vec!["d"], vec!["e", "f"]]
        );
    }

    #[test]
    fn test_quoted_field_with_delimiter() {
        assert_eq!(default_rows("a,\"b,c\",d"), vec![vec!["a", "b,c", "d"]]);
    }

    #[test]
    fn test_quoted_field_with_newlines() {
        assert_eq!(
            default_rows("\"line1\nline2\",x\r\ny"),
            vec![vec!["line1\nline2", "x"], vec!["y"]]
        );
    }

    #[test]
    fn test_doubled_quote_kept_without_sanitize() {
        assert_eq!(default_rows("a,\"b\"\"c\",d"), vec![vec!["a", "b\"\"c", "d"]]);
    }

    #[test]
    fn test_doubled_quote_collapsed_with_sanitize() {
        let config = ParseConfiguration::default().with_sanitize_fields(true);
        assert_eq!(rows("a,\"b\"\"c\",d", config), vec![vec!["a", "b\"c", "d"]]);
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        assert_eq!(default_rows("ab\"c,d"), vec![vec!["ab\"c", "d"]]);
    }

    #[test]
    fn test_custom_delimiter() {
        let config = ParseConfiguration::default().with_delimiter('\t');
        assert_eq!(rows("a\tb, c\n", config), vec![vec!["a", "b, c"]]);
    }

    #[test]
    fn test_unicode_delimiter_and_content() {
        let config = ParseConfiguration::default().with_delimiter('¦');
        assert_eq!(rows("é¦ü\"x\"", config), vec![vec!["é", "ü\"x\""]]);
    }

    #[test]
    fn test_trim_whitespace() {
        let config = ParseConfiguration::default().with_trim_whitespace(true);
        assert_eq!(rows("  a , b\t,c  \n", config), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn test_trim_allows_whitespace_before_quote() {
        let config = ParseConfiguration::default().with_trim_whitespace(true);
        assert_eq!(rows("a,  \" b,c \" ,d", config), vec![vec!["a", "b,c", "d"]]);
    }

    #[test]
    fn test_trim_with_tab_delimiter_keeps_empty_fields() {
        let config = ParseConfiguration::default()
            .with_delimiter('\t')
            .with_trim_whitespace(true);
        assert_eq!(rows("a\t\t b ", config), vec![vec!["a", "", "b"]]);
    }

    #[test]
    fn test_whitespace_after_closing_quote_discarded() {
        assert_eq!(default_rows("\"a\"  ,b"), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_garbage_after_closing_quote_is_error() {
        let e = err("x,\"a\"b,c", ParseConfiguration::default());
        assert_eq!(e.kind, ParseErrorKind::UnexpectedAfterQuote('b'));
        assert_eq!(e.position, Position { line: 1, column: 6, offset: 5 });
    }

    #[test]
    fn test_unterminated_quote_reports_opening_position() {
        let e = err("a,b\nc,\"d,e", ParseConfiguration::default());
        assert_eq!(e.kind, ParseErrorKind::UnterminatedQuote);
        assert_eq!(e.position, Position { line: 2, column: 3, offset: 6 });
    }

    #[test]
    fn test_backslash_escapes_in_unquoted_field() {
        let config = ParseConfiguration::default().with_backslash_escapes(true);
        assert_eq!(
            rows("a\\,b,c\\\\d,e\\\nf", config),
            vec![vec!["a,b", "c\\d", "e\nf"]]
        );
    }

    #[test]
    fn test_backslash_before_ordinary_char_is_kept() {
        let config = ParseConfiguration::default().with_backslash_escapes(true);
        assert_eq!(rows("a\\tb,c\\", config), vec![vec!["a\\tb", "c\\"]]);
    }

    #[test]
    fn test_backslashes_literal_when_disabled() {
        assert_eq!(default_rows("a\\,b"), vec![vec!["a\\", "b"]]);
    }

    #[test]
    fn test_backslash_escaped_quote_in_quoted_field() {
        let config = ParseConfiguration::default().with_backslash_escapes(true);
        assert_eq!(rows("\"say \\\"hi\\\"\",x", config), vec![vec!["say \"hi\"", "x"]]);
    }

    #[test]
    fn test_escaped_crlf_kept_whole() {
        let config = ParseConfiguration::default().with_backslash_escapes(true);
        assert_eq!(rows("a\\\r\nb,c", config), vec![vec!["a\r\nb", "c"]]);
    }

    #[test]
    fn test_backslash_takes_precedence_over_doubled_quote() {
        let config = ParseConfiguration::default()
            .with_backslash_escapes(true)
            .with_sanitize_fields(true);
        // `\"` is an escaped quote, the next `"` closes the field.
        assert_eq!(rows("\"a\\\"\",b", config), vec![vec!["a\"", "b"]]);
    }

    #[test]
    fn test_comment_line_produces_no_row() {
        let config = ParseConfiguration::default().with_comments(true);
        assert_eq!(
            rows("#this is a comment\na,b,c", config),
            vec![vec!["a", "b", "c"]]
        );
    }

    #[test]
    fn test_comment_after_fields_ends_row() {
        let config = ParseConfiguration::default().with_comments(true);
        assert_eq!(
            rows("a,b,# note, more\nc\n#tail", config),
            vec![vec!["a", "b"], vec!["c"]]
        );
    }

    #[test]
    fn test_comment_with_escaped_newline_continues() {
        let config = ParseConfiguration::default()
            .with_comments(true)
            .with_backslash_escapes(true);
        assert_eq!(rows("#one\\\ntwo\na", config), vec![vec!["a"]]);
    }

    #[test]
    fn test_hash_is_literal_without_comments_or_mid_field() {
        assert_eq!(default_rows("#a,b"), vec![vec!["#a", "b"]]);
        let config = ParseConfiguration::default().with_comments(true);
        assert_eq!(rows("a#b,\"#c\"", config), vec![vec!["a#b", "#c"]]);
    }

    #[test]
    fn test_leading_equal_sign() {
        let config = ParseConfiguration::default()
            .with_leading_equal_sign(true)
            .with_sanitize_fields(true);
        assert_eq!(rows("=\"123\",=\"0042\"", config), vec![vec!["123", "0042"]]);
    }

    #[test]
    fn test_trim_allows_whitespace_before_leading_equal() {
        let config = ParseConfiguration::default()
            .with_trim_whitespace(true)
            .with_leading_equal_sign(true)
            .with_sanitize_fields(true);
        assert_eq!(rows("a,  =\"007\" ,b", config), vec![vec!["a", "007", "b"]]);
    }

    #[test]
    fn test_leading_equal_sign_disabled_is_literal() {
        assert_eq!(default_rows("=\"123\""), vec![vec!["=\"123\""]]);
    }

    #[test]
    fn test_equal_sign_without_quote_is_content() {
        let config = ParseConfiguration::default().with_leading_equal_sign(true);
        assert_eq!(rows("=1+2,x", config), vec![vec!["=1+2", "x"]]);
    }

    #[test]
    fn test_delimiter_wins_over_comment_marker() {
        let config = ParseConfiguration::default()
            .with_delimiter('#')
            .with_comments(true);
        assert_eq!(rows("a#b", config), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_position_counts_crlf_as_one_line() {
        let e = err("a\r\nb\r\n\"x\"y", ParseConfiguration::default());
        assert_eq!(e.position.line, 3);
        assert_eq!(e.position.column, 4);
    }
}
