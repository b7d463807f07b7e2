//! Output formatting for command results.
//!
//! Commands build a [`Rows`] set of named columns holding JSON values, so the
//! same result renders as a table, CSV, or JSON lines with types preserved.

use std::io::Write;

use clap::ValueEnum;
use serde_json::Value;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table (default)
    Table,
    /// Comma-separated values
    Csv,
    /// JSON Lines (one JSON object per row)
    Json,
}

/// A result set: column names plus rows of values.
#[derive(Debug, Clone, Default)]
pub struct Rows {
    columns: Vec<&'static str>,
    rows: Vec<Vec<Value>>,
}

impl Rows {
    pub fn new(columns: &[&'static str]) -> Self {
        Self {
            columns: columns.to_vec(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Missing trailing cells render as null.
    pub fn push(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Formats result sets for output.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new formatter with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format `rows` and write to the given writer.
    pub fn write<W: Write>(&self, rows: &Rows, writer: &mut W) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Table => self.write_table(rows, writer),
            OutputFormat::Csv => self.write_csv(rows, writer),
            OutputFormat::Json => self.write_json(rows, writer),
        }
    }

    /// Text form of a cell: strings unquoted, null empty.
    fn format_value(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn write_table<W: Write>(&self, rows: &Rows, writer: &mut W) -> std::io::Result<()> {
        use comfy_table::{Cell, Table};

        let mut table = Table::new();
        table.set_header(rows.columns.iter().map(|c| Cell::new(c)).collect::<Vec<_>>());

        for row in &rows.rows {
            table.add_row(
                row.iter()
                    .map(|v| Cell::new(Self::format_value(v)))
                    .collect::<Vec<_>>(),
            );
        }

        writeln!(writer, "{table}")
    }

    fn write_csv<W: Write>(&self, rows: &Rows, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{}", rows.columns.join(","))?;

        for row in &rows.rows {
            let values: Vec<String> = row
                .iter()
                .map(|v| {
                    let value = Self::format_value(v);
                    // Escape commas and quotes
                    if value.contains(',') || value.contains('"') || value.contains('\n') {
                        format!("\"{}\"", value.replace('"', "\"\""))
                    } else {
                        value
                    }
                })
                .collect();
            writeln!(writer, "{}", values.join(","))?;
        }

        Ok(())
    }

    fn write_json<W: Write>(&self, rows: &Rows, writer: &mut W) -> std::io::Result<()> {
        for row in &rows.rows {
            let obj: serde_json::Map<String, Value> = rows
                .columns
                .iter()
                .zip(row)
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            writeln!(writer, "{}", Value::Object(obj))?;
        }
        Ok(())
    }
}
