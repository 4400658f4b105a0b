//! CSV projection of the tabular mirror, for exports the inspector opens in
//! a spreadsheet and for sheets downloaded as CSV.

use super::{Cell, Row};

pub fn rows_to_csv(rows: &[Row]) -> String {
    let mut out = String::new();
    for row in rows {
        let line = row
            .iter()
            .map(|c| csv_quote(&c.as_text()))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push_str("\r\n");
    }
    out
}

/// Every field comes back as a text cell. Quoted fields may span lines.
/// Blank lines between records are skipped.
pub fn csv_to_rows(text: &str) -> Vec<Row> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows: Vec<Row> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    buf.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                buf.push(ch);
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut buf)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut buf));
                push_record(&mut rows, std::mem::take(&mut record));
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() || !record.is_empty() {
        record.push(buf);
        push_record(&mut rows, record);
    }
    rows
}

fn push_record(rows: &mut Vec<Row>, record: Vec<String>) {
    if record.len() == 1 && record[0].is_empty() {
        return;
    }
    rows.push(record.into_iter().map(Cell::Text).collect());
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_survives_commas_quotes_and_newlines() {
        let rows = vec![
            vec![Cell::text("Name"), Cell::text("General assessment")],
            vec![
                Cell::text("Benali, Amina"),
                Cell::text("Good \"launch\"\nweak closure"),
            ],
            vec![Cell::text("Said"), Cell::Number(12.5)],
        ];
        let csv = rows_to_csv(&rows);
        let back = csv_to_rows(&csv);
        assert_eq!(back.len(), 3);
        assert_eq!(back[1][0], Cell::text("Benali, Amina"));
        assert_eq!(back[1][1], Cell::text("Good \"launch\"\nweak closure"));
        assert_eq!(back[2][1], Cell::text("12.5"));
    }

    #[test]
    fn tolerates_bom_crlf_and_blank_lines() {
        let rows = csv_to_rows("\u{feff}a,b\r\n\r\n1,\r\n2,x");
        assert_eq!(
            rows,
            vec![
                vec![Cell::text("a"), Cell::text("b")],
                vec![Cell::text("1"), Cell::text("")],
                vec![Cell::text("2"), Cell::text("x")],
            ]
        );
    }
}
