//! Batch pipeline: one snapshot document in, the next state of the five
//! relations out.
//!
//! Prior state arrives as an explicit argument and the next state leaves as
//! an explicit result; the engine holds no ambient state between runs.

use crate::derive::{derive_merged, derive_stats};
use crate::error::ReconError;
use crate::model::Relation;
use crate::reconcile::{self, reconcile};
use crate::schema::{self, RelationSchema};
use crate::snapshot::{flatten, parse_document};

/// Previously persisted state, per relation. `None` means no prior state
/// exists (first run, pure insert); an empty-but-present relation still
/// takes the reconciliation join path.
#[derive(Debug, Default)]
pub struct PriorState {
    pub location: Option<Relation>,
    pub current_temp: Option<Relation>,
    pub forecast_temp: Option<Relation>,
    pub merged: Option<Relation>,
    pub stats: Option<Relation>,
}

/// The five reconciled relations of one completed run.
#[derive(Debug)]
pub struct BatchOutput {
    pub location: Relation,
    pub current_temp: Relation,
    pub forecast_temp: Relation,
    pub merged: Relation,
    pub stats: Relation,
}

impl BatchOutput {
    /// The relations paired with their schemas, in pipeline order.
    pub fn relations(&self) -> [(&'static RelationSchema, &Relation); 5] {
        [
            (&schema::LOCATION, &self.location),
            (&schema::CURRENT_TEMP, &self.current_temp),
            (&schema::FORECAST_TEMP, &self.forecast_temp),
            (&schema::MERGED, &self.merged),
            (&schema::STATS, &self.stats),
        ]
    }
}

/// Process one snapshot document against the prior persisted state:
/// parse + validate, flatten, derive `merged`/`stats`, then reconcile the
/// five relations in dependency order. Any fault aborts the whole run;
/// there is no partial output.
pub fn run_batch(document: &str, prior: PriorState) -> Result<BatchOutput, ReconError> {
    let records = parse_document(document)?;
    let batch = flatten(&records)?;

    let merged = derive_merged(&batch.current, &batch.forecast)?;
    let stats = derive_stats(&merged)?;

    Ok(BatchOutput {
        location: reconcile(prior.location, batch.location, &reconcile::LOCATION)?,
        current_temp: reconcile(prior.current_temp, batch.current, &reconcile::CURRENT_TEMP)?,
        forecast_temp: reconcile(prior.forecast_temp, batch.forecast, &reconcile::FORECAST_TEMP)?,
        merged: reconcile(prior.merged, merged, &reconcile::MERGED)?,
        stats: reconcile(prior.stats, stats, &reconcile::STATS)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;
    use crate::snapshot::tests::SAMPLE;
    use chrono::NaiveDate;

    fn get(rel: &Relation, row: usize, col: &str) -> Value {
        rel.get(row, rel.column_index(col).unwrap()).clone()
    }

    fn find_row(rel: &Relation, name: &str, extra: Option<(&str, &Value)>) -> usize {
        let name_idx = rel.column_index("name").unwrap();
        (0..rel.len())
            .find(|&i| {
                rel.get(i, name_idx) == &Value::from(name)
                    && extra.map_or(true, |(col, want)| {
                        rel.get(i, rel.column_index(col).unwrap()) == want
                    })
            })
            .unwrap()
    }

    #[test]
    fn first_run_produces_all_five_relations() {
        let out = run_batch(SAMPLE, PriorState::default()).unwrap();
        assert_eq!(out.location.len(), 2);
        assert_eq!(out.current_temp.len(), 2);
        assert_eq!(out.forecast_temp.len(), 3);
        assert_eq!(out.merged.len(), 3);
        assert_eq!(out.stats.len(), 2);
    }

    #[test]
    fn first_run_same_day_delta() {
        let out = run_batch(SAMPLE, PriorState::default()).unwrap();
        let jan1 = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let row = find_row(&out.merged, "Singapore", Some(("forecast_date", &jan1)));
        assert_eq!(get(&out.merged, row, "day_diff"), Value::Int(0));
        // 30.1 observed vs 28.3 forecast average.
        assert_eq!(
            get(&out.merged, row, "forecast_current_temp_diff"),
            Value::Float(1.8)
        );
    }

    #[test]
    fn first_run_stats_aggregates() {
        let out = run_batch(SAMPLE, PriorState::default()).unwrap();

        let sg = find_row(&out.stats, "Singapore", None);
        assert_eq!(get(&out.stats, sg, "current_temp_c"), Value::Float(30.1));
        assert_eq!(get(&out.stats, sg, "min_forecast"), Value::Float(24.6));
        assert_eq!(get(&out.stats, sg, "max_forecast"), Value::Float(31.2));
        assert_eq!(get(&out.stats, sg, "mean_forecast"), Value::Float(27.95));
        assert_eq!(get(&out.stats, sg, "min_temp"), Value::Float(24.6));
        assert_eq!(get(&out.stats, sg, "max_temp"), Value::Float(31.2));

        let oslo = find_row(&out.stats, "Oslo", None);
        assert_eq!(get(&out.stats, oslo, "min_temp"), Value::Float(-8.1));
        assert_eq!(get(&out.stats, oslo, "max_temp"), Value::Float(-2.0));
    }

    #[test]
    fn second_run_revises_in_place() {
        let first = run_batch(SAMPLE, PriorState::default()).unwrap();
        let prior = PriorState {
            location: Some(first.location),
            current_temp: Some(first.current_temp),
            forecast_temp: Some(first.forecast_temp),
            merged: Some(first.merged),
            stats: Some(first.stats),
        };

        // Same observation run, revised current reading for Singapore.
        let revised = SAMPLE.replace(r#""temp_c": 30.1"#, r#""temp_c": 31.5"#);
        let out = run_batch(&revised, prior).unwrap();

        // Same keys: no growth anywhere.
        assert_eq!(out.current_temp.len(), 2);
        assert_eq!(out.forecast_temp.len(), 3);
        assert_eq!(out.merged.len(), 3);
        assert_eq!(out.stats.len(), 2);

        let row = find_row(&out.current_temp, "Singapore", None);
        assert_eq!(get(&out.current_temp, row, "temp_c"), Value::Float(31.5));

        // Merged delta recomputed from the revised reading: 31.5 - 28.3.
        let jan1 = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let row = find_row(&out.merged, "Singapore", Some(("forecast_date", &jan1)));
        assert_eq!(
            get(&out.merged, row, "forecast_current_temp_diff"),
            Value::Float(3.2)
        );

        // 31.5 now tops the forecast range: stats pick it up.
        let sg = find_row(&out.stats, "Singapore", None);
        assert_eq!(get(&out.stats, sg, "max_temp"), Value::Float(31.5));
        assert_eq!(get(&out.stats, sg, "highest_temp_date"), jan1);
    }

    #[test]
    fn reconciled_output_is_key_sorted() {
        let first = run_batch(SAMPLE, PriorState::default()).unwrap();
        let prior = PriorState {
            location: Some(first.location),
            current_temp: Some(first.current_temp),
            forecast_temp: Some(first.forecast_temp),
            merged: Some(first.merged),
            stats: Some(first.stats),
        };
        let out = run_batch(SAMPLE, prior).unwrap();

        let name = out.stats.column_index("name").unwrap();
        assert_eq!(out.stats.get(0, name), &Value::from("Oslo"));
        assert_eq!(out.stats.get(1, name), &Value::from("Singapore"));
    }
}
