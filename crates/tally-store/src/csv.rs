//! Minimal delimited-record codec for the backup ledger.
//!
//! Field values containing the delimiter or quote character are quoted with
//! doubled-quote escaping. The parser accepts both quoted and unquoted
//! fields; a quote inside an unquoted field is taken literally.

use thiserror::Error;

/// Record-level parse failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CsvError {
    /// A quoted field was still open at end of line.
    #[error("unterminated quoted field on line {line}")]
    UnterminatedQuote { line: usize },
}

/// Formats one record, quoting fields that need it.
#[must_use]
pub fn format_record(fields: &[&str]) -> String {
    let mut out = String::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            out.push('"');
            for ch in field.chars() {
                if ch == '"' {
                    out.push('"');
                }
                out.push(ch);
            }
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out
}

/// Splits one line into fields.
///
/// `line_no` is 1-based and only used for error reporting.
pub fn parse_record(line: &str, line_no: usize) -> Result<Vec<String>, CsvError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
        } else {
            match ch {
                ',' => fields.push(std::mem::take(&mut field)),
                '"' if field.is_empty() => in_quotes = true,
                _ => field.push(ch),
            }
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: line_no });
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_stay_unquoted() {
        assert_eq!(format_record(&["1", "write", "0", "100"]), "1,write,0,100");
    }

    #[test]
    fn delimiter_and_quote_trigger_quoting() {
        assert_eq!(format_record(&["a,b"]), "\"a,b\"");
        assert_eq!(format_record(&["say \"hi\""]), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn parse_unquoted() {
        assert_eq!(
            parse_record("1,write,0,100", 1).unwrap(),
            vec!["1", "write", "0", "100"]
        );
    }

    #[test]
    fn parse_quoted_with_escapes() {
        assert_eq!(
            parse_record("\"a,b\",\"say \"\"hi\"\"\",plain", 1).unwrap(),
            vec!["a,b", "say \"hi\"", "plain"]
        );
    }

    #[test]
    fn parse_mixed_quoted_and_unquoted() {
        assert_eq!(
            parse_record("1,\"two, three\",4", 1).unwrap(),
            vec!["1", "two, three", "4"]
        );
    }

    #[test]
    fn empty_fields_survive() {
        assert_eq!(parse_record("a,,c", 1).unwrap(), vec!["a", "", "c"]);
        assert_eq!(parse_record(",", 1).unwrap(), vec!["", ""]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(
            parse_record("\"open", 7),
            Err(CsvError::UnterminatedQuote { line: 7 })
        );
    }

    #[test]
    fn round_trip_preserves_awkward_values() {
        let fields = ["quote\"inside", "comma,inside", "plain"];
        let line = format_record(&fields);
        let parsed = parse_record(&line, 1).unwrap();
        assert_eq!(parsed, fields);
    }
}
