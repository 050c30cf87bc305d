use std::io::{self, Write};
use std::mem::take;

// ── Parsing ──

/// Minimal CSV parser: quoted fields, doubled quotes and CRLF line ends.
/// Blank lines are dropped.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                if row.len() == 1 && row[0].is_empty() {
                    row.clear();
                } else {
                    rows.push(take(&mut row));
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

// ── Writing ──

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}

pub fn write_row<W: Write, S: AsRef<str>>(w: &mut W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_line_endings() {
        let rows = parse_rows("a,\"b,c\",\"say \"\"hi\"\"\"\r\n\r\nd,e,f\n");
        assert_eq!(rows, vec![vec!["a", "b,c", "say \"hi\""], vec!["d", "e", "f"]]);
    }

    #[test]
    fn trailing_row_without_newline() {
        assert_eq!(parse_rows("x,y"), vec![vec!["x", "y"]]);
        assert_eq!(parse_rows("x,"), vec![vec!["x", ""]]);
    }

    #[test]
    fn quoted_newline_survives() {
        let mut buf = Vec::new();
        write_row(&mut buf, &["φ67×59mm", "two\nlines", "plain"]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "φ67×59mm,\"two\nlines\",plain\n");
        assert_eq!(parse_rows(&text), vec![vec!["φ67×59mm", "two\nlines", "plain"]]);
    }
}
