//! Reconciliation engine: merge a freshly derived relation into previously
//! persisted state with the insert-overwrite policy.
//!
//! One algorithmic skeleton serves all five relations, parameterized by a
//! merge policy: the business key and value columns come from the relation
//! schema, plus an optional post-merge recompute step. A key observed again
//! gets its values refreshed from the new batch; a key absent from the batch
//! keeps its historical values; no row is ever deleted.

use std::collections::BTreeMap;

use crate::derive::round2;
use crate::error::ReconError;
use crate::model::{Relation, Value};
use crate::schema::{self, RelationSchema};

pub type Recompute = fn(&mut Relation) -> Result<(), ReconError>;

/// Per-relation reconciliation binding. The five instances below are fixed
/// at design time; there is no dynamic schema discovery.
pub struct MergePolicy {
    pub schema: &'static RelationSchema,
    pub recompute: Option<Recompute>,
}

pub const LOCATION: MergePolicy = MergePolicy {
    schema: &schema::LOCATION,
    recompute: None,
};

pub const CURRENT_TEMP: MergePolicy = MergePolicy {
    schema: &schema::CURRENT_TEMP,
    recompute: None,
};

pub const FORECAST_TEMP: MergePolicy = MergePolicy {
    schema: &schema::FORECAST_TEMP,
    recompute: None,
};

pub const MERGED: MergePolicy = MergePolicy {
    schema: &schema::MERGED,
    recompute: Some(recompute_merged),
};

pub const STATS: MergePolicy = MergePolicy {
    schema: &schema::STATS,
    recompute: None,
};

/// Merge `incoming` into `existing` under the policy's insert-overwrite
/// rules.
///
/// - `existing = None` (no prior persisted state): `incoming` is returned
///   unchanged (the first run is a pure insert). An empty-but-present
///   relation still takes the join path.
/// - Otherwise the two sides full-outer-join on the business key: one output
///   row per key present in either side, values resolved per column by
///   coalesce (incoming wins when non-null, existing survives otherwise),
///   output sorted ascending by the composite key.
///
/// Both inputs must already carry the schema's columns with the schema's
/// types; type normalization is the persistence layer's job and a
/// precondition here.
pub fn reconcile(
    existing: Option<Relation>,
    incoming: Relation,
    policy: &MergePolicy,
) -> Result<Relation, ReconError> {
    let schema = policy.schema;

    let Some(existing) = existing else {
        return Ok(incoming);
    };

    let key_in_existing = column_indices(&existing, schema, schema.key)?;
    let key_in_incoming = column_indices(&incoming, schema, schema.key)?;
    let values_in_existing = column_indices(&existing, schema, schema.values)?;
    let values_in_incoming = column_indices(&incoming, schema, schema.values)?;

    // Full outer join: one entry per key seen on either side. The B-tree
    // doubles as the deterministic output sort.
    let mut joined: BTreeMap<Vec<Value>, (Option<usize>, Option<usize>)> = BTreeMap::new();
    for idx in 0..existing.len() {
        let key = key_of(&existing, idx, &key_in_existing, schema)?;
        joined.entry(key).or_insert((None, None)).0 = Some(idx);
    }
    for idx in 0..incoming.len() {
        let key = key_of(&incoming, idx, &key_in_incoming, schema)?;
        joined.entry(key).or_insert((None, None)).1 = Some(idx);
    }

    let mut next = schema.empty_relation();
    for (key, (old_idx, new_idx)) in joined {
        let mut row = key;
        for (vi, _) in schema.values.iter().enumerate() {
            let new_val = new_idx.map(|r| incoming.get(r, values_in_incoming[vi]));
            let old_val = old_idx.map(|r| existing.get(r, values_in_existing[vi]));
            let resolved = match new_val {
                Some(v) if !v.is_null() => v.clone(),
                _ => old_val.cloned().unwrap_or(Value::Null),
            };
            row.push(resolved);
        }
        next.push_row(row)?;
    }

    if let Some(recompute) = policy.recompute {
        recompute(&mut next)?;
    }
    Ok(next)
}

fn column_indices(
    relation: &Relation,
    schema: &RelationSchema,
    cols: &[schema::ColumnDef],
) -> Result<Vec<usize>, ReconError> {
    cols.iter()
        .map(|c| relation.require_column(schema.name, c.name))
        .collect()
}

fn key_of(
    relation: &Relation,
    row: usize,
    key_cols: &[usize],
    schema: &RelationSchema,
) -> Result<Vec<Value>, ReconError> {
    let mut key = Vec::with_capacity(key_cols.len());
    for (ki, &col) in key_cols.iter().enumerate() {
        let value = relation.get(row, col);
        if value.is_null() {
            return Err(ReconError::NullKey {
                relation: schema.name.to_string(),
                column: schema.key[ki].name.to_string(),
            });
        }
        key.push(value.clone());
    }
    Ok(key)
}

/// Re-establish the derived-column invariant on the reconciled `merged`
/// relation: a coalesce can pair an existing `current_temp_c` with an
/// incoming `forecast_avgtemp_c` (or vice versa), so `day_diff` and
/// `forecast_current_temp_diff` are recomputed from the resolved columns
/// rather than taken from either side.
fn recompute_merged(relation: &mut Relation) -> Result<(), ReconError> {
    let name = schema::MERGED.name;
    let created_local = relation.require_column(name, "created_date_local")?;
    let forecast_date = relation.require_column(name, "forecast_date")?;
    let current_temp = relation.require_column(name, "current_temp_c")?;
    let avgtemp = relation.require_column(name, "forecast_avgtemp_c")?;
    let day_diff = relation.require_column(name, "day_diff")?;
    let temp_diff = relation.require_column(name, "forecast_current_temp_diff")?;

    for row in 0..relation.len() {
        let obs = relation
            .get(row, created_local)
            .to_date()
            .ok_or_else(|| ReconError::NullKey {
                relation: name.to_string(),
                column: "created_date_local".to_string(),
            })?;
        let fc = relation
            .get(row, forecast_date)
            .to_date()
            .ok_or_else(|| ReconError::NullKey {
                relation: name.to_string(),
                column: "forecast_date".to_string(),
            })?;

        let days = (fc - obs).num_days();
        let diff = if days == 0 {
            match (
                relation.get(row, current_temp).as_f64(),
                relation.get(row, avgtemp).as_f64(),
            ) {
                (Some(t), Some(avg)) => Value::Float(round2(t - avg)),
                _ => Value::Null,
            }
        } else {
            Value::Null
        };

        relation.set(row, day_diff, Value::Int(days));
        relation.set(row, temp_diff, diff);
    }
    Ok(())
}
