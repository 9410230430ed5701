//! JSON rendering of result rows.
//!
//! Rows render as objects whose keys keep the engine's column order, so a
//! step's output reads the way its query selected it.
//!
//! ```
//! use sift_chain::{Row, Value};
//! use sift_chain::output::rows_to_json;
//!
//! let row = Row::new()
//!     .with("EMPLOYER_NAME", Value::String("Acme".to_string()))
//!     .with("cnt", Value::Integer(2));
//! assert_eq!(rows_to_json(&[row]), r#"[{"EMPLOYER_NAME":"Acme","cnt":2}]"#);
//! ```

use crate::value::{Row, Value};

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    pub fn print_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::BigInt(n) => n.to_string(),
            // JSON has no NaN or infinity
            Value::Float(n) if !n.is_finite() => "null".to_string(),
            Value::Float(n) => n.to_string(),
            Value::String(s) => format!("\"{}\"", self.escape_string(s)),
        }
    }

    pub fn print_row(&self, row: &Row) -> String {
        self.row_at(row, 0)
    }

    pub fn print_rows(&self, rows: &[Row]) -> String {
        if rows.is_empty() {
            return "[]".to_string();
        }

        if self.pretty {
            let items: Vec<String> = rows
                .iter()
                .map(|row| format!("{}{}", self.indent(1), self.row_at(row, 1)))
                .collect();
            format!("[\n{}\n]", items.join(",\n"))
        } else {
            let items: Vec<String> = rows.iter().map(|row| self.row_at(row, 0)).collect();
            format!("[{}]", items.join(","))
        }
    }

    fn row_at(&self, row: &Row, indent: usize) -> String {
        if row.is_empty() {
            return "{}".to_string();
        }

        if self.pretty {
            let items: Vec<String> = row
                .iter()
                .map(|(name, value)| {
                    format!(
                        "{}\"{}\": {}",
                        self.indent(indent + 1),
                        self.escape_string(name),
                        self.print_value(value)
                    )
                })
                .collect();
            format!("{{\n{}\n{}}}", items.join(",\n"), self.indent(indent))
        } else {
            let items: Vec<String> = row
                .iter()
                .map(|(name, value)| format!("\"{}\":{}", self.escape_string(name), self.print_value(value)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }

    fn escape_string(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        }
        out
    }
}

/// Compact JSON array of row objects.
pub fn rows_to_json(rows: &[Row]) -> String {
    JsonPrinter::new(false).print_rows(rows)
}

/// Two-space indented JSON array of row objects.
pub fn rows_to_json_pretty(rows: &[Row]) -> String {
    JsonPrinter::new(true).print_rows(rows)
}

pub fn value_to_json(value: &Value) -> String {
    JsonPrinter::new(false).print_value(value)
}
