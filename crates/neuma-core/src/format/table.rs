use std::fmt;

use crate::constants::format::{TABLE_CELL_SEPARATOR, TABLE_RULE};

/// Rows as the model wrote them; cell counts are not checked against the header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn split_cells(line: &str) -> Vec<String> {
    line.split(TABLE_CELL_SEPARATOR).map(str::to_string).collect()
}

impl Table {
    /// Best-effort parse of a pipe-separated table.
    ///
    /// Lines before the one holding the first `|` are dropped, as are empty
    /// lines and rule lines containing `---`. Returns `None` when no line is
    /// left for the header.
    pub fn parse(text: &str) -> Option<Self> {
        let body = match text.find(TABLE_CELL_SEPARATOR) {
            Some(idx) => {
                let line_start = text[..idx].rfind('\n').map(|i| i + 1).unwrap_or(0);
                &text[line_start..]
            }
            None => text,
        };

        let mut lines = body
            .split('\n')
            .filter(|line| !line.is_empty() && !line.contains(TABLE_RULE));

        let header = split_cells(lines.next()?);
        let rows = lines.map(split_cells).collect();
        Some(Self { header, rows })
    }

    pub fn is_ragged(&self) -> bool {
        self.rows.iter().any(|row| row.len() != self.header.len())
    }

    fn column_widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0);
        (0..columns)
            .map(|col| {
                std::iter::once(&self.header)
                    .chain(self.rows.iter())
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.trim().chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, row: &[String], widths: &[usize]) -> fmt::Result {
    let cells: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(col, width)| {
            let cell = row.get(col).map(|c| c.trim()).unwrap_or("");
            format!("{:<width$}", cell, width = width)
        })
        .collect();
    writeln!(f, "| {} |", cells.join(" | "))
}

/// Renders with aligned columns; short rows are padded with empty cells.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();
        write_row(f, &self.header, &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(1))).collect();
        writeln!(f, "|-{}-|", rule.join("-|-"))?;
        for row in &self.rows {
            write_row(f, row, &widths)?;
        }
        Ok(())
    }
}
