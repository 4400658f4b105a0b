use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// One scalar cell of the tabular mirror. Remote sheets hand back numbers,
/// strings, booleans and nulls interchangeably, so the parser never assumes a
/// cell's JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
}

pub type Row = Vec<Cell>;

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Numeric value, or an empty text cell when absent. Never the literal "null".
    pub fn number_or_blank(v: Option<f64>) -> Self {
        match v {
            Some(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(String::new()),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(format_number(*n)),
            Cell::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Cell::Empty => Cow::Borrowed(""),
        }
    }

    pub fn trimmed(&self) -> String {
        self.as_text().trim().to_string()
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Empty => true,
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(7.0).as_text(), "7");
        assert_eq!(Cell::Number(12.5).as_text(), "12.5");
    }

    #[test]
    fn missing_numbers_become_empty_text() {
        assert_eq!(Cell::number_or_blank(None), Cell::text(""));
        assert_eq!(Cell::number_or_blank(Some(f64::NAN)), Cell::text(""));
    }

    #[test]
    fn json_cells_keep_their_scalar_kind() {
        let row: Row = serde_json::from_str(r#"["a", 2, null, true]"#).expect("parse row");
        assert_eq!(
            row,
            vec![
                Cell::text("a"),
                Cell::Number(2.0),
                Cell::Empty,
                Cell::Bool(true)
            ]
        );
    }
}
