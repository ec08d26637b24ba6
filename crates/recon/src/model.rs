use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single cell scalar. `Null` is a legitimate value in every non-key
/// column; business-key columns must never hold it.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Calendar date of this value. `DateTime` truncates to its date part.
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Text(_) => 4,
            Value::Date(_) => 5,
            Value::DateTime(_) => 6,
        }
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    /// Total order so composite keys can drive B-tree joins and sorts:
    /// `Null` first, then by type rank, then by natural value order.
    /// Floats use IEEE total ordering.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    /// Canonical text form, shared by the CSV encoding and the CLI table
    /// renderer. Floats print with 2 decimals; `Null` prints empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:.2}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// A tabular dataset: a fixed, ordered column set over an ordered sequence
/// of rows. Row width always equals the column count.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Relation {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ReconError> {
        if row.len() != self.columns.len() {
            return Err(ReconError::RowWidth {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Column index, or a `MissingColumn` fault naming the relation.
    pub fn require_column(&self, relation: &str, name: &str) -> Result<usize, ReconError> {
        self.column_index(name).ok_or_else(|| ReconError::MissingColumn {
            relation: relation.to_string(),
            column: name.to_string(),
        })
    }

    pub fn get(&self, row: usize, col: usize) -> &Value {
        &self.rows[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: Value) {
        self.rows[row][col] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn null_sorts_first() {
        let mut vals = vec![Value::Float(1.5), Value::Null, Value::Float(-2.0)];
        vals.sort();
        assert!(vals[0].is_null());
        assert_eq!(vals[1], Value::Float(-2.0));
    }

    #[test]
    fn composite_keys_order_lexicographically() {
        let a = vec![Value::from("Oslo"), Value::from("Norway")];
        let b = vec![Value::from("Oslo"), Value::from("Sweden")];
        let c = vec![Value::from("Paris"), Value::from("France")];
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(12.3456).to_string(), "12.35");
        assert_eq!(Value::Bool(true).to_string(), "true");
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(Value::Date(d).to_string(), "2024-01-02");
        let dt = d.and_hms_opt(23, 50, 0).unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2024-01-02T23:50:00");
    }

    #[test]
    fn datetime_truncates_to_date() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(23, 50, 0)
            .unwrap();
        assert_eq!(
            Value::DateTime(dt).to_date(),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(Value::Float(1.0).to_date(), None);
    }

    #[test]
    fn push_row_rejects_wrong_width() {
        let mut rel = Relation::new(vec!["a".into(), "b".into()]);
        assert!(rel.push_row(vec![Value::Int(1)]).is_err());
        assert!(rel.push_row(vec![Value::Int(1), Value::Int(2)]).is_ok());
        assert_eq!(rel.len(), 1);
    }
}
