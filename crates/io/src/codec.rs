//! Schema-driven CSV encoding of relations.
//!
//! Encoding uses each value's canonical text form (floats at 2 decimals,
//! nulls as empty cells, ISO dates). Decoding is typed: every cell is parsed
//! against its column's declared kind, so a relation loaded from storage
//! carries the same types as a freshly derived one, which is the
//! precondition the reconciliation engine states for its inputs.

use chrono::{NaiveDate, NaiveDateTime};
use stratus_recon::schema::{ColumnKind, RelationSchema};
use stratus_recon::{Relation, Value};

use crate::error::CodecError;

/// Datetime forms accepted on decode; the first one is what encode writes.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Render a relation as CSV with a header row.
pub fn encode(relation: &Relation) -> Result<String, CodecError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(relation.columns())?;
    for row in relation.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Parse CSV text into a typed relation. The header must match the schema's
/// column names exactly; every cell decodes per its column kind, with the
/// empty string as null.
pub fn decode(schema: &RelationSchema, data: &str) -> Result<Relation, CodecError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data.as_bytes());

    let expected = schema.column_names();
    let found: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if found != expected {
        return Err(CodecError::Header { expected, found });
    }

    let columns: Vec<_> = schema.columns().copied().collect();
    let mut relation = schema.empty_relation();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let mut row = Vec::with_capacity(columns.len());
        for (col_idx, column) in columns.iter().enumerate() {
            let raw = record.get(col_idx).unwrap_or("");
            let value = parse_value(column.kind, raw).ok_or_else(|| CodecError::Value {
                row: row_idx + 1,
                column: column.name.to_string(),
                value: raw.to_string(),
                kind: column.kind,
            })?;
            row.push(value);
        }
        relation.push_row(row)?;
    }
    Ok(relation)
}

fn parse_value(kind: ColumnKind, raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return Some(Value::Null);
    }
    match kind {
        ColumnKind::Text => Some(Value::Text(raw.to_string())),
        ColumnKind::Int => raw.parse::<i64>().ok().map(Value::Int),
        ColumnKind::Float => raw.parse::<f64>().ok().map(Value::Float),
        ColumnKind::Bool => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ColumnKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(Value::Date),
        ColumnKind::DateTime => DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(Value::DateTime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stratus_recon::schema;

    fn location_rel() -> Relation {
        let mut rel = schema::LOCATION.empty_relation();
        rel.push_row(vec![
            Value::from("Oslo"),
            Value::from("Oslo"),
            Value::from("Norway"),
            Value::Float(59.913),
            Value::Float(10.75),
            Value::from("Europe/Oslo"),
            Value::Int(1704124800),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(16, 0, 0)
                    .unwrap(),
            ),
        ])
        .unwrap();
        rel
    }

    #[test]
    fn round_trip_preserves_types() {
        let rel = location_rel();
        let csv_text = encode(&rel).unwrap();
        let back = decode(&schema::LOCATION, &csv_text).unwrap();
        assert_eq!(back.len(), 1);

        let lat = back.column_index("lat").unwrap();
        let localtime = back.column_index("localtime").unwrap();
        // Floats re-enter at the persisted 2-decimal precision.
        assert_eq!(back.get(0, lat), &Value::Float(59.91));
        assert!(matches!(back.get(0, localtime), Value::DateTime(_)));
    }

    #[test]
    fn floats_encode_with_two_decimals() {
        let csv_text = encode(&location_rel()).unwrap();
        assert!(csv_text.contains("59.91,10.75"));
    }

    #[test]
    fn null_encodes_as_empty_and_decodes_back() {
        let mut rel = schema::STATS.empty_relation();
        rel.push_row(vec![
            Value::from("Oslo"),
            Value::from("Oslo"),
            Value::from("Norway"),
            Value::Null,
            Value::Float(-8.1),
            Value::Float(-2.0),
            Value::Float(-5.0),
            Value::Null,
            Value::Float(-8.1),
            Value::Float(-2.0),
        ])
        .unwrap();

        let csv_text = encode(&rel).unwrap();
        let back = decode(&schema::STATS, &csv_text).unwrap();
        let current = back.column_index("current_temp_c").unwrap();
        let highest = back.column_index("highest_temp_date").unwrap();
        assert!(back.get(0, current).is_null());
        assert!(back.get(0, highest).is_null());
    }

    #[test]
    fn header_mismatch_is_rejected() {
        let data = "name,region\nOslo,Oslo\n";
        let err = decode(&schema::LOCATION, data).unwrap_err();
        assert!(matches!(err, CodecError::Header { .. }));
    }

    #[test]
    fn bad_cell_names_row_and_column() {
        let rel = location_rel();
        let csv_text = encode(&rel).unwrap().replace("59.91", "north");
        let err = decode(&schema::LOCATION, &csv_text).unwrap_err();
        match err {
            CodecError::Value { row, column, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, "lat");
            }
            other => panic!("expected Value fault, got {other}"),
        }
    }

    #[test]
    fn empty_relation_round_trips_as_present() {
        let rel = schema::MERGED.empty_relation();
        let csv_text = encode(&rel).unwrap();
        let back = decode(&schema::MERGED, &csv_text).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.columns().len(), schema::MERGED.width());
    }
}
