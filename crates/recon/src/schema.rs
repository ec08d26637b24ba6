//! Fixed schemas for the five persisted relations.
//!
//! Key sets, column sets, and types are known at design time; there is no
//! dynamic schema discovery. The merge policies and the CSV codec both key
//! off these tables, so column names and order here are the storage contract.

use std::fmt;

use crate::model::Relation;

/// Declared type of a column; drives typed CSV decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Float,
    Bool,
    Date,
    DateTime,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::DateTime => "datetime",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind }
}

/// One relation's layout: business-key columns first, value columns after.
/// The key uniquely identifies a row across historical batches.
#[derive(Debug)]
pub struct RelationSchema {
    pub name: &'static str,
    pub key: &'static [ColumnDef],
    pub values: &'static [ColumnDef],
}

impl RelationSchema {
    /// All columns in storage order (key columns first).
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.key.iter().chain(self.values.iter())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().map(|c| c.name.to_string()).collect()
    }

    pub fn width(&self) -> usize {
        self.key.len() + self.values.len()
    }

    /// An empty relation with this schema's column layout.
    pub fn empty_relation(&self) -> Relation {
        Relation::new(self.column_names())
    }
}

use ColumnKind::*;

pub static LOCATION: RelationSchema = RelationSchema {
    name: "location",
    key: &[
        col("name", Text),
        col("region", Text),
        col("country", Text),
    ],
    values: &[
        col("lat", Float),
        col("lon", Float),
        col("tz_id", Text),
        col("localtime_epoch", Int),
        col("localtime", DateTime),
    ],
};

pub static CURRENT_TEMP: RelationSchema = RelationSchema {
    name: "current_temp",
    key: &[
        col("name", Text),
        col("region", Text),
        col("country", Text),
        col("created_date_local", DateTime),
    ],
    values: &[
        col("created_date_utc", DateTime),
        col("last_updated", DateTime),
        col("temp_c", Float),
        col("temp_f", Float),
        col("is_day", Int),
        col("text", Text),
        col("code", Int),
    ],
};

pub static FORECAST_TEMP: RelationSchema = RelationSchema {
    name: "forecast_temp",
    key: &[
        col("name", Text),
        col("region", Text),
        col("country", Text),
        col("created_date_local", DateTime),
        col("date", Date),
    ],
    values: &[
        col("created_date_utc", DateTime),
        col("date_epoch", Int),
        col("maxtemp_c", Float),
        col("maxtemp_f", Float),
        col("mintemp_c", Float),
        col("mintemp_f", Float),
        col("avgtemp_c", Float),
        col("avgtemp_f", Float),
        col("maxwind_mph", Float),
        col("maxwind_kph", Float),
        col("totalprecip_mm", Float),
        col("totalprecip_in", Float),
        col("totalsnow_cm", Float),
        col("avgvis_km", Float),
        col("avgvis_miles", Float),
        col("avghumidity", Float),
        col("daily_will_it_rain", Bool),
        col("daily_chance_of_rain", Int),
        col("daily_will_it_snow", Bool),
        col("daily_chance_of_snow", Int),
        col("text", Text),
        col("code", Int),
        col("uv", Float),
    ],
};

pub static MERGED: RelationSchema = RelationSchema {
    name: "merged",
    key: &[
        col("name", Text),
        col("region", Text),
        col("country", Text),
        col("created_date_local", Date),
        col("forecast_date", Date),
    ],
    values: &[
        col("created_date_utc", DateTime),
        col("current_temp_last_updated", DateTime),
        col("current_temp_c", Float),
        col("uv", Float),
        col("forecast_avgtemp_c", Float),
        col("forecast_maxtemp_c", Float),
        col("forecast_mintemp_c", Float),
        col("day_diff", Int),
        col("forecast_current_temp_diff", Float),
        col("daily_chance_of_rain", Int),
        col("daily_chance_of_snow", Int),
        col("forecast_maxwind_kph", Float),
    ],
};

pub static STATS: RelationSchema = RelationSchema {
    name: "stats",
    key: &[
        col("name", Text),
        col("region", Text),
        col("country", Text),
    ],
    values: &[
        col("current_temp_c", Float),
        col("min_forecast", Float),
        col("max_forecast", Float),
        col("mean_forecast", Float),
        col("highest_temp_date", Date),
        col("min_temp", Float),
        col("max_temp", Float),
    ],
};

/// The five relations in pipeline dependency order.
pub static ALL: [&RelationSchema; 5] = [
    &LOCATION,
    &CURRENT_TEMP,
    &FORECAST_TEMP,
    &MERGED,
    &STATS,
];

/// Look up a schema by relation name.
pub fn by_name(name: &str) -> Option<&'static RelationSchema> {
    ALL.iter().copied().find(|s| s.name == name)
}
