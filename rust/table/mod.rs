//! In-memory table model
//!
//! A `Table` is an ordered list of uniquely named columns plus row-major cell
//! storage. Cells are loosely typed (`Value`); each pipeline stage applies its
//! own coercion instead of fixing a column type at load time.

pub mod frame;
pub mod value;

pub use value::{natural_cmp, CellKind, Number, Value};

use crate::error::{EngineError, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Inferred kind of a column: the majority shape of its non-missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Empty,
    Boolean,
    Integer,
    Float,
    Timestamp,
    Text,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, checking that column names are unique and every row has
    /// exactly one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(EngineError::InvalidTable(format!("duplicate column '{}'", name)));
            }
        }
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(EngineError::InvalidTable(format!(
                "row {} has {} values, expected {}",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Same columns, no rows.
    pub fn empty_like(&self) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Majority shape of the column's non-missing cells. Integers and floats
    /// count together as numeric; ties go to the more general kind.
    pub fn column_kind(&self, idx: usize) -> ColumnKind {
        let mut counts: HashMap<CellKind, usize> = HashMap::new();
        for kind in self.column(idx).filter_map(Value::kind) {
            *counts.entry(kind).or_insert(0) += 1;
        }
        let get = |k: CellKind| counts.get(&k).copied().unwrap_or(0);

        let floats = get(CellKind::Float);
        let numeric = get(CellKind::Integer) + floats;
        let candidates = [
            (get(CellKind::Boolean), ColumnKind::Boolean),
            (get(CellKind::Timestamp), ColumnKind::Timestamp),
            (numeric, if floats > 0 { ColumnKind::Float } else { ColumnKind::Integer }),
            (get(CellKind::Text), ColumnKind::Text),
        ];

        // `max_by_key` keeps the last maximum, so later (more general) kinds win ties.
        match candidates.iter().max_by_key(|(count, _)| *count) {
            Some((count, kind)) if *count > 0 => *kind,
            _ => ColumnKind::Empty,
        }
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    /// Stable sort of the rows.
    pub fn sort_rows_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&[Value], &[Value]) -> Ordering,
    {
        self.rows.sort_by(|a, b| compare(a, b));
    }
}
