//! Snapshot parsing, validation, and flattening.
//!
//! The input document is a JSON object keyed by an opaque record id; each
//! value must match the typed record layout below. Validation is an explicit
//! parse-and-typecheck pass: a record either deserializes fully or fails the
//! whole run with no partial output.
//!
//! Flattening turns each validated record into one location row, one
//! current-conditions row, and N forecast-day rows, with location identity
//! and the observation timestamps denormalized into every row.

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{Relation, Value};
use crate::schema;

// ---------------------------------------------------------------------------
// Typed records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LocationRecord {
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub tz_id: String,
    pub localtime_epoch: i64,
    #[serde(with = "api_datetime")]
    pub localtime: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub text: String,
    pub code: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentRecord {
    #[serde(with = "api_datetime")]
    pub last_updated: NaiveDateTime,
    pub temp_c: f64,
    pub temp_f: f64,
    pub is_day: i64,
    pub condition: Condition,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastDetail {
    pub maxtemp_c: f64,
    pub maxtemp_f: f64,
    pub mintemp_c: f64,
    pub mintemp_f: f64,
    pub avgtemp_c: f64,
    pub avgtemp_f: f64,
    pub maxwind_mph: f64,
    pub maxwind_kph: f64,
    pub totalprecip_mm: f64,
    pub totalprecip_in: f64,
    pub totalsnow_cm: f64,
    pub avgvis_km: f64,
    pub avgvis_miles: f64,
    pub avghumidity: f64,
    #[serde(deserialize_with = "bool_or_int")]
    pub daily_will_it_rain: bool,
    pub daily_chance_of_rain: i64,
    #[serde(deserialize_with = "bool_or_int")]
    pub daily_will_it_snow: bool,
    pub daily_chance_of_snow: i64,
    pub condition: Condition,
    pub uv: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub date_epoch: i64,
    pub day: ForecastDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastBlock {
    pub forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRecord {
    pub location: LocationRecord,
    pub current: CurrentRecord,
    pub forecast: ForecastBlock,
}

/// The upstream API writes local timestamps as `2024-01-01 17:50`; accept
/// that plus second-precision and `T`-separated variants.
mod api_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};

    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime '{raw}'")))
    }
}

/// The API reports `daily_will_it_rain`/`daily_will_it_snow` as 0/1.
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(i) => Ok(i != 0),
    }
}

// ---------------------------------------------------------------------------
// Parse + validate
// ---------------------------------------------------------------------------

/// Parse the id-keyed document, validating every record. Record order is
/// preserved from the document.
pub fn parse_document(json: &str) -> Result<Vec<(String, SnapshotRecord)>, ReconError> {
    let root: serde_json::Value = serde_json::from_str(json)?;
    let map = match root {
        serde_json::Value::Object(map) => map,
        _ => return Err(ReconError::DocumentShape),
    };

    let mut records = Vec::with_capacity(map.len());
    for (id, raw) in map {
        let record: SnapshotRecord =
            serde_json::from_value(raw).map_err(|e| ReconError::Record {
                record: id.clone(),
                message: e.to_string(),
            })?;
        records.push((id, record));
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Flatten
// ---------------------------------------------------------------------------

/// One batch's flat relations, pre-derivation.
#[derive(Debug)]
pub struct FlattenedBatch {
    pub location: Relation,
    pub current: Relation,
    pub forecast: Relation,
}

/// Convert a local observation time to naive UTC through its IANA zone.
/// Ambiguous times (DST fold) resolve to the earlier instant; nonexistent
/// times are a validation fault.
fn local_to_utc(
    record: &str,
    local: NaiveDateTime,
    tz_id: &str,
) -> Result<NaiveDateTime, ReconError> {
    let tz: Tz = tz_id.parse().map_err(|_| ReconError::UnknownTimezone {
        record: record.to_string(),
        tz_id: tz_id.to_string(),
    })?;
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| ReconError::InvalidLocalTime {
            record: record.to_string(),
            tz_id: tz_id.to_string(),
            timestamp: local.to_string(),
        })
}

/// Flatten validated records into the location, current-conditions, and
/// forecast relations. Pure and stateless: no recomputation happens here.
pub fn flatten(records: &[(String, SnapshotRecord)]) -> Result<FlattenedBatch, ReconError> {
    let mut location = schema::LOCATION.empty_relation();
    let mut current = schema::CURRENT_TEMP.empty_relation();
    let mut forecast = schema::FORECAST_TEMP.empty_relation();

    for (id, record) in records {
        let loc = &record.location;
        let created_date_local = loc.localtime;
        let created_date_utc = local_to_utc(id, created_date_local, &loc.tz_id)?;

        location.push_row(vec![
            Value::from(loc.name.as_str()),
            Value::from(loc.region.as_str()),
            Value::from(loc.country.as_str()),
            Value::from(loc.lat),
            Value::from(loc.lon),
            Value::from(loc.tz_id.as_str()),
            Value::from(loc.localtime_epoch),
            Value::from(loc.localtime),
        ])?;

        let cur = &record.current;
        current.push_row(vec![
            Value::from(loc.name.as_str()),
            Value::from(loc.region.as_str()),
            Value::from(loc.country.as_str()),
            Value::from(created_date_local),
            Value::from(created_date_utc),
            Value::from(cur.last_updated),
            Value::from(cur.temp_c),
            Value::from(cur.temp_f),
            Value::from(cur.is_day),
            Value::from(cur.condition.text.as_str()),
            Value::from(cur.condition.code),
        ])?;

        for fc_day in &record.forecast.forecastday {
            let day = &fc_day.day;
            forecast.push_row(vec![
                Value::from(loc.name.as_str()),
                Value::from(loc.region.as_str()),
                Value::from(loc.country.as_str()),
                Value::from(created_date_local),
                Value::from(fc_day.date),
                Value::from(created_date_utc),
                Value::from(fc_day.date_epoch),
                Value::from(day.maxtemp_c),
                Value::from(day.maxtemp_f),
                Value::from(day.mintemp_c),
                Value::from(day.mintemp_f),
                Value::from(day.avgtemp_c),
                Value::from(day.avgtemp_f),
                Value::from(day.maxwind_mph),
                Value::from(day.maxwind_kph),
                Value::from(day.totalprecip_mm),
                Value::from(day.totalprecip_in),
                Value::from(day.totalsnow_cm),
                Value::from(day.avgvis_km),
                Value::from(day.avgvis_miles),
                Value::from(day.avghumidity),
                Value::Bool(day.daily_will_it_rain),
                Value::from(day.daily_chance_of_rain),
                Value::Bool(day.daily_will_it_snow),
                Value::from(day.daily_chance_of_snow),
                Value::from(day.condition.text.as_str()),
                Value::from(day.condition.code),
                Value::from(day.uv),
            ])?;
        }
    }

    Ok(FlattenedBatch {
        location,
        current,
        forecast,
    })
}
