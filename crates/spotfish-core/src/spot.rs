//! Column-preserving spot tables.
//!
//! Detection output is tabular: one row per spot with a handful of well-known
//! columns (`img`, `channel`, `x`/`y`/`z`, `intensity`) plus arbitrary
//! metadata appended by earlier stages. Every stage must pass unknown columns
//! through untouched, so the table keeps raw string cells and parses numeric
//! columns on demand.

use ndarray::Array2;

use crate::error::{Result, SpotfishError};

/// An ordered table of detected spots. Cells are stored as strings;
/// numeric columns are parsed on access.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpotTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SpotTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| SpotfishError::MissingColumn(name.to_string()))
    }

    pub fn value(&self, row: usize, col: usize) -> &str {
        &self.rows[row][col]
    }

    /// Append a row. Panics if the cell count does not match the header.
    pub fn push_row(&mut self, row: Vec<String>) {
        assert_eq!(row.len(), self.columns.len(), "row width mismatch");
        self.rows.push(row);
    }

    /// Parse a full column as f64, failing on the first non-numeric cell.
    pub fn f64_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.require_column(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                cells[idx]
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| SpotfishError::InvalidValue {
                        column: name.to_string(),
                        row,
                        value: cells[idx].clone(),
                    })
            })
            .collect()
    }

    /// Gather three coordinate columns into an N×3 matrix (column order as given).
    pub fn coords(&self, names: &[String; 3]) -> Result<Array2<f64>> {
        let cols = [
            self.f64_column(&names[0])?,
            self.f64_column(&names[1])?,
            self.f64_column(&names[2])?,
        ];
        let mut out = Array2::zeros((self.len(), 3));
        for (i, col) in cols.iter().enumerate() {
            for (row, &v) in col.iter().enumerate() {
                out[[row, i]] = v;
            }
        }
        Ok(out)
    }

    /// Replace an existing column's values, or append a new column.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        assert_eq!(values.len(), self.len(), "column length mismatch");
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Insert a new column at `index`. Panics if a column of that name exists.
    pub fn insert_column(&mut self, index: usize, name: &str, values: Vec<String>) {
        assert!(self.column_index(name).is_none(), "duplicate column");
        assert_eq!(values.len(), self.len(), "column length mismatch");
        self.columns.insert(index, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(index, value);
        }
    }

    /// Drop the named column if present.
    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
    }

    /// New table containing the given rows, in order.
    pub fn subset(&self, indices: &[usize]) -> SpotTable {
        SpotTable {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Group row indices by the value of a column, keys in first-appearance order.
    pub fn group_by(&self, col: usize) -> Vec<(String, Vec<usize>)> {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let key = &row[col];
            match groups.iter_mut().find(|(k, _)| k == key) {
                Some((_, indices)) => indices.push(i),
                None => groups.push((key.clone(), vec![i])),
            }
        }
        groups
    }

    /// Append another table's rows. Column sets must match exactly.
    pub fn append(&mut self, other: SpotTable) -> Result<()> {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.columns != other.columns {
            return Err(SpotfishError::Config(format!(
                "cannot append table with columns {:?} to table with columns {:?}",
                other.columns, self.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Keep only rows for which the predicate holds.
    pub fn retain_rows<F: FnMut(&[String]) -> bool>(&mut self, mut pred: F) {
        self.rows.retain(|row| pred(row));
    }
}

/// Format a float the way the tables store numbers: shortest round-trip form.
pub fn format_float(v: f64) -> String {
    format!("{}", v)
}
