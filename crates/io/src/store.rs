//! Relation store: durable CSV state for the five relations.
//!
//! Prior state is loaded per relation before a run and the next state is
//! written after; the engine never touches storage itself. Absence of a
//! relation's file is the normal first-run condition and is reported as
//! `None`, distinct from an empty-but-present relation, which decodes to a
//! zero-row relation and still takes the reconciliation join path.

use std::fs;
use std::path::{Path, PathBuf};

use stratus_recon::schema::RelationSchema;
use stratus_recon::Relation;
use tracing::{debug, info};

use crate::codec;
use crate::error::StoreError;

pub trait RelationStore {
    /// Prior persisted state for one relation, `None` when absent.
    fn load(&self, schema: &RelationSchema) -> Result<Option<Relation>, StoreError>;

    /// Persist the given relations. Either all of them become visible or
    /// none do (short of a crash between the final renames).
    fn save(&self, relations: &[(&RelationSchema, &Relation)]) -> Result<(), StoreError>;
}

/// One `<relation>.csv` per relation under a single directory.
///
/// Saving is staged: every relation is first written to `<name>.csv.tmp`,
/// and the temp files are renamed into place only after all writes
/// succeeded. A fault before the first rename leaves prior state untouched.
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, schema: &RelationSchema) -> PathBuf {
        self.dir.join(format!("{}.csv", schema.name))
    }
}

impl RelationStore for CsvStore {
    fn load(&self, schema: &RelationSchema) -> Result<Option<Relation>, StoreError> {
        let path = self.path_for(schema);
        if !path.exists() {
            debug!(relation = schema.name, "no prior state");
            return Ok(None);
        }
        let data = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let relation =
            codec::decode(schema, &data).map_err(|source| StoreError::Decode { path, source })?;
        debug!(relation = schema.name, rows = relation.len(), "loaded prior state");
        Ok(Some(relation))
    }

    fn save(&self, relations: &[(&RelationSchema, &Relation)]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;

        // Stage every file first; discard the lot on any fault.
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
        for (schema, relation) in relations {
            let path = self.path_for(schema);
            let tmp = path.with_extension("csv.tmp");
            if let Err(err) = stage(schema, relation, &path, &tmp) {
                discard(&staged);
                let _ = fs::remove_file(&tmp);
                return Err(err);
            }
            staged.push((tmp, path));
        }

        for (tmp, path) in &staged {
            fs::rename(tmp, path).map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        }

        info!(relations = relations.len(), dir = %self.dir.display(), "saved");
        Ok(())
    }
}

fn stage(
    schema: &RelationSchema,
    relation: &Relation,
    path: &Path,
    tmp: &Path,
) -> Result<(), StoreError> {
    let data = codec::encode(relation).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(tmp, data).map_err(|source| StoreError::Write {
        path: tmp.to_path_buf(),
        source,
    })?;
    debug!(relation = schema.name, rows = relation.len(), "staged");
    Ok(())
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_recon::{schema, Value};
    use tempfile::tempdir;

    fn stats_rel(rows: &[(&str, f64)]) -> Relation {
        let mut rel = schema::STATS.empty_relation();
        for (name, temp) in rows {
            rel.push_row(vec![
                Value::from(*name),
                Value::from("R"),
                Value::from("C"),
                Value::Float(*temp),
                Value::Float(temp - 5.0),
                Value::Float(temp + 5.0),
                Value::Float(*temp),
                Value::Null,
                Value::Float(temp - 5.0),
                Value::Float(temp + 5.0),
            ])
            .unwrap();
        }
        rel
    }

    #[test]
    fn absent_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        assert!(store.load(&schema::STATS).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let rel = stats_rel(&[("Oslo", -3.5), ("Singapore", 30.1)]);

        store.save(&[(&schema::STATS, &rel)]).unwrap();
        let back = store.load(&schema::STATS).unwrap().unwrap();
        assert_eq!(back, rel);
    }

    #[test]
    fn empty_relation_is_present_not_absent() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let rel = schema::STATS.empty_relation();

        store.save(&[(&schema::STATS, &rel)]).unwrap();
        let back = store.load(&schema::STATS).unwrap();
        assert!(matches!(back, Some(r) if r.is_empty()));
    }

    #[test]
    fn save_leaves_no_staging_files() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        let rel = stats_rel(&[("Oslo", -3.5)]);
        store.save(&[(&schema::STATS, &rel)]).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "staging files left behind: {leftovers:?}");
    }

    #[test]
    fn corrupt_prior_state_is_fatal() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path());
        fs::write(store.path_for(&schema::STATS), "name,oops\nx,1\n").unwrap();
        let err = store.load(&schema::STATS).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[test]
    fn save_creates_output_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("output");
        let store = CsvStore::new(&nested);
        store
            .save(&[(&schema::STATS, &stats_rel(&[("Oslo", -3.5)]))])
            .unwrap();
        assert!(nested.join("stats.csv").exists());
    }
}
