//! Derivation engine: joins one batch's current conditions against its
//! forecasts to produce the `merged` relation (per-forecast-day accuracy
//! deltas) and the `stats` relation (per-location aggregates).

use std::collections::BTreeMap;

use crate::error::ReconError;
use crate::model::{Relation, Value};
use crate::schema;

/// Round to 2 decimals, the precision every derived temperature delta and
/// mean carries.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Merged
// ---------------------------------------------------------------------------

/// Left (forecast-preserving) join of the batch's forecast rows against its
/// current-conditions rows.
///
/// The join matches the forecast's observation date (`created_date_local`
/// truncated to a date) to the current observation's `last_updated` date.
/// Every forecast day is retained; an unmatched current side null-fills
/// `current_temp_last_updated` and `current_temp_c`, which then propagates
/// into the derived delta.
pub fn derive_merged(current: &Relation, forecast: &Relation) -> Result<Relation, ReconError> {
    let cur = |name: &str| current.require_column(schema::CURRENT_TEMP.name, name);
    let fc = |name: &str| forecast.require_column(schema::FORECAST_TEMP.name, name);

    let c_name = cur("name")?;
    let c_region = cur("region")?;
    let c_country = cur("country")?;
    let c_last_updated = cur("last_updated")?;
    let c_temp_c = cur("temp_c")?;

    let f_name = fc("name")?;
    let f_region = fc("region")?;
    let f_country = fc("country")?;
    let f_created_local = fc("created_date_local")?;
    let f_created_utc = fc("created_date_utc")?;
    let f_date = fc("date")?;
    let f_avgtemp = fc("avgtemp_c")?;
    let f_maxtemp = fc("maxtemp_c")?;
    let f_mintemp = fc("mintemp_c")?;
    let f_rain = fc("daily_chance_of_rain")?;
    let f_snow = fc("daily_chance_of_snow")?;
    let f_maxwind = fc("maxwind_kph")?;
    let f_uv = fc("uv")?;

    // Current rows keyed by (identity, observation date); first row wins on
    // duplicates so the join stays deterministic in batch order.
    let mut current_by_key: BTreeMap<Vec<Value>, usize> = BTreeMap::new();
    for (idx, row) in current.rows().iter().enumerate() {
        let Some(obs_date) = row[c_last_updated].to_date() else {
            continue;
        };
        let key = vec![
            row[c_name].clone(),
            row[c_region].clone(),
            row[c_country].clone(),
            Value::Date(obs_date),
        ];
        current_by_key.entry(key).or_insert(idx);
    }

    let mut merged = schema::MERGED.empty_relation();
    for row in forecast.rows() {
        let obs_date = row[f_created_local]
            .to_date()
            .ok_or_else(|| ReconError::NullKey {
                relation: schema::FORECAST_TEMP.name.to_string(),
                column: "created_date_local".to_string(),
            })?;
        let fc_date = row[f_date].to_date().ok_or_else(|| ReconError::NullKey {
            relation: schema::FORECAST_TEMP.name.to_string(),
            column: "date".to_string(),
        })?;

        let key = vec![
            row[f_name].clone(),
            row[f_region].clone(),
            row[f_country].clone(),
            Value::Date(obs_date),
        ];
        let matched = current_by_key.get(&key).map(|&i| &current.rows()[i]);

        let current_last_updated = matched
            .map(|r| r[c_last_updated].clone())
            .unwrap_or(Value::Null);
        let current_temp_c = matched.map(|r| r[c_temp_c].clone()).unwrap_or(Value::Null);

        let day_diff = (fc_date - obs_date).num_days();
        let temp_diff = if day_diff == 0 {
            match (current_temp_c.as_f64(), row[f_avgtemp].as_f64()) {
                (Some(t), Some(avg)) => Value::Float(round2(t - avg)),
                _ => Value::Null,
            }
        } else {
            Value::Null
        };

        merged.push_row(vec![
            row[f_name].clone(),
            row[f_region].clone(),
            row[f_country].clone(),
            Value::Date(obs_date),
            Value::Date(fc_date),
            row[f_created_utc].clone(),
            current_last_updated,
            current_temp_c,
            row[f_uv].clone(),
            row[f_avgtemp].clone(),
            row[f_maxtemp].clone(),
            row[f_mintemp].clone(),
            Value::Int(day_diff),
            temp_diff,
            row[f_rain].clone(),
            row[f_snow].clone(),
            row[f_maxwind].clone(),
        ])?;
    }

    Ok(merged)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LocationAcc {
    key: Vec<Value>,
    // First-row values, null included: batch-order semantics of the source
    // data are preserved, not re-tie-broken.
    first_current: Value,
    first_obs_date: Value,
    min_forecast: Option<f64>,
    max_forecast: Option<f64>,
    max_forecast_date: Value,
    avg_sum: f64,
    avg_count: usize,
}

/// Aggregate the batch's `merged` relation by location. Groups are emitted
/// in first-encounter order; aggregates are null-aware (nulls from an
/// unmatched join side are skipped, not zeroed).
pub fn derive_stats(merged: &Relation) -> Result<Relation, ReconError> {
    let col = |name: &str| merged.require_column(schema::MERGED.name, name);

    let m_name = col("name")?;
    let m_region = col("region")?;
    let m_country = col("country")?;
    let m_created_local = col("created_date_local")?;
    let m_forecast_date = col("forecast_date")?;
    let m_current = col("current_temp_c")?;
    let m_avgtemp = col("forecast_avgtemp_c")?;
    let m_maxtemp = col("forecast_maxtemp_c")?;
    let m_mintemp = col("forecast_mintemp_c")?;

    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: BTreeMap<Vec<Value>, LocationAcc> = BTreeMap::new();

    for row in merged.rows() {
        let key = vec![
            row[m_name].clone(),
            row[m_region].clone(),
            row[m_country].clone(),
        ];
        let acc = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            LocationAcc {
                key,
                first_current: row[m_current].clone(),
                first_obs_date: row[m_created_local].clone(),
                min_forecast: None,
                max_forecast: None,
                max_forecast_date: Value::Null,
                avg_sum: 0.0,
                avg_count: 0,
            }
        });

        if let Some(min) = row[m_mintemp].as_f64() {
            acc.min_forecast = Some(acc.min_forecast.map_or(min, |m| m.min(min)));
        }
        if let Some(max) = row[m_maxtemp].as_f64() {
            // Strictly-greater keeps the first forecast day on ties.
            if acc.max_forecast.map_or(true, |m| max > m) {
                acc.max_forecast = Some(max);
                acc.max_forecast_date = row[m_forecast_date].clone();
            }
        }
        if let Some(avg) = row[m_avgtemp].as_f64() {
            acc.avg_sum += avg;
            acc.avg_count += 1;
        }
    }

    let mut stats = schema::STATS.empty_relation();
    for key in order {
        let acc = &groups[&key];

        let mean_forecast = if acc.avg_count > 0 {
            Value::Float(round2(acc.avg_sum / acc.avg_count as f64))
        } else {
            Value::Null
        };

        // Observation date when the current reading tops the whole forecast
        // range, else the first forecast day achieving the maximum.
        let highest_temp_date = match (acc.first_current.as_f64(), acc.max_forecast) {
            (Some(t), Some(m)) if t >= m => acc.first_obs_date.clone(),
            (_, Some(_)) => acc.max_forecast_date.clone(),
            (_, None) => Value::Null,
        };

        let current = acc.first_current.as_f64();
        let min_temp = match (acc.min_forecast, current) {
            (Some(a), Some(b)) => Value::Float(a.min(b)),
            (Some(a), None) => Value::Float(a),
            (None, Some(b)) => Value::Float(b),
            (None, None) => Value::Null,
        };
        let max_temp = match (acc.max_forecast, current) {
            (Some(a), Some(b)) => Value::Float(a.max(b)),
            (Some(a), None) => Value::Float(a),
            (None, Some(b)) => Value::Float(b),
            (None, None) => Value::Null,
        };

        let mut row = acc.key.clone();
        row.extend([
            acc.first_current.clone(),
            acc.min_forecast.map_or(Value::Null, Value::Float),
            acc.max_forecast.map_or(Value::Null, Value::Float),
            mean_forecast,
            highest_temp_date,
            min_temp,
            max_temp,
        ]);
        stats.push_row(row)?;
    }

    Ok(stats)
}
