//! Quote-aware splitting of delimited text into records.
//!
//! Sheet exports quote every field and may carry commas, doubled quotes
//! and line breaks inside a quoted field.

/// Split `text` into records of raw (unparsed) fields. Never fails: an
/// unterminated quote swallows the remainder of the input into one field.
pub fn parse_records(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut row_started = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => {
                in_quotes = true;
                row_started = true;
            }
            ',' if !in_quotes => {
                record.push(std::mem::take(&mut field));
                row_started = true;
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                row_started = false;
            }
            _ => {
                field.push(c);
                row_started = true;
            }
        }
    }

    if row_started {
        record.push(field);
        records.push(record);
    }
    records
}
