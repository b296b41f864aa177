//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::records::{
    DrugRecommendation, GeneHaplotypeVariant, GenotypePhenotype, GenotypeSource, Record,
    RecordKind, UnusedGenotypeData,
};
use crate::stages::StageWarning;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RequestLogEntry, RequestOutcome, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

/// Writes one record through any connection (plain or transaction)
fn insert_record_on(conn: &Connection, run_id: i64, record: &Record) -> StorageResult<()> {
    match record {
        Record::GeneHaplotypeVariant(r) => {
            conn.execute(
                "INSERT INTO gene_haplotype_variants (run_id, gene_name, haplotype_name, snp_id, allele)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, r.gene_name, r.haplotype_name, r.snp_id, r.allele],
            )?;
        }
        Record::GenotypePhenotype(r) => {
            conn.execute(
                "INSERT INTO genotype_phenotypes (run_id, gene_name, haplotype_name1, haplotype_name2, phenotype_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run_id,
                    r.gene_name,
                    r.haplotype_name1,
                    r.haplotype_name2,
                    r.phenotype_name
                ],
            )?;
        }
        Record::DrugRecommendation(r) => {
            conn.execute(
                "INSERT INTO drug_recommendations (run_id, gene_name, haplotype_name1, haplotype_name2,
                 annotation_id, classification, recommendation, implications)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    run_id,
                    r.gene_name,
                    r.haplotype_name1,
                    r.haplotype_name2,
                    r.annotation_id,
                    r.classification,
                    r.recommendation,
                    r.implications
                ],
            )?;
        }
        Record::UnusedGenotypeData(r) => {
            let values_json = serde_json::to_string(&r.values)?;
            conn.execute(
                "INSERT INTO unused_genotype_data (run_id, gene_name, annotation_id, haplotype_id1,
                 haplotype_id2, values_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run_id,
                    r.source.gene_name,
                    r.source.annotation_id,
                    r.source.haplotype_id1,
                    r.source.haplotype_id2,
                    values_json
                ],
            )?;
        }
    }
    Ok(())
}

impl RecordKind {
    fn table_name(&self) -> &'static str {
        match self {
            Self::GeneHaplotypeVariant => "gene_haplotype_variants",
            Self::GenotypePhenotype => "genotype_phenotypes",
            Self::DrugRecommendation => "drug_recommendations",
            Self::UnusedGenotypeData => "unused_genotype_data",
        }
    }
}

impl SqliteStorage {
    fn load_variants(&self, run_id: i64, records: &mut Vec<Record>) -> StorageResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT gene_name, haplotype_name, snp_id, allele
             FROM gene_haplotype_variants WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(GeneHaplotypeVariant {
                gene_name: row.get(0)?,
                haplotype_name: row.get(1)?,
                snp_id: row.get(2)?,
                allele: row.get(3)?,
            })
        })?;
        for row in rows {
            records.push(Record::GeneHaplotypeVariant(row?));
        }
        Ok(())
    }

    fn load_phenotypes(&self, run_id: i64, records: &mut Vec<Record>) -> StorageResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT gene_name, haplotype_name1, haplotype_name2, phenotype_name
             FROM genotype_phenotypes WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(GenotypePhenotype {
                gene_name: row.get(0)?,
                haplotype_name1: row.get(1)?,
                haplotype_name2: row.get(2)?,
                phenotype_name: row.get(3)?,
            })
        })?;
        for row in rows {
            records.push(Record::GenotypePhenotype(row?));
        }
        Ok(())
    }

    fn load_recommendations(&self, run_id: i64, records: &mut Vec<Record>) -> StorageResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT gene_name, haplotype_name1, haplotype_name2, annotation_id,
             classification, recommendation, implications
             FROM drug_recommendations WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(DrugRecommendation {
                gene_name: row.get(0)?,
                haplotype_name1: row.get(1)?,
                haplotype_name2: row.get(2)?,
                annotation_id: row.get(3)?,
                classification: row.get(4)?,
                recommendation: row.get(5)?,
                implications: row.get(6)?,
            })
        })?;
        for row in rows {
            records.push(Record::DrugRecommendation(row?));
        }
        Ok(())
    }

    fn load_unused(&self, run_id: i64, records: &mut Vec<Record>) -> StorageResult<()> {
        let mut stmt = self.conn.prepare(
            "SELECT gene_name, annotation_id, haplotype_id1, haplotype_id2, values_json
             FROM unused_genotype_data WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            let source = GenotypeSource {
                gene_name: row.get(0)?,
                annotation_id: row.get(1)?,
                haplotype_id1: row.get(2)?,
                haplotype_id2: row.get(3)?,
            };
            Ok((source, row.get::<_, String>(4)?))
        })?;
        for row in rows {
            let (source, values_json) = row?;
            let values: BTreeMap<String, String> = serde_json::from_str(&values_json)?;
            records.push(Record::UnusedGenotypeData(UnusedGenotypeData { values, source }));
        }
        Ok(())
    }

    fn count_grouped(&self, sql: &str, run_id: i64) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (key, count) = row?;
            counts.push((key, count as u64));
        }
        Ok(counts)
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let finished_at = match status {
            RunStatus::Running => None,
            RunStatus::Completed | RunStatus::Failed => Some(Utc::now().to_rfc3339()),
        };
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), finished_at, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Records =====

    fn insert_record(&mut self, run_id: i64, record: &Record) -> StorageResult<()> {
        insert_record_on(&self.conn, run_id, record)
    }

    fn insert_records(&mut self, run_id: i64, records: &[Record]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        for record in records {
            insert_record_on(&tx, run_id, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_records(&self, run_id: i64) -> StorageResult<Vec<Record>> {
        let mut records = Vec::new();
        self.load_variants(run_id, &mut records)?;
        self.load_phenotypes(run_id, &mut records)?;
        self.load_recommendations(run_id, &mut records)?;
        self.load_unused(run_id, &mut records)?;
        Ok(records)
    }

    fn count_records(&self, run_id: i64, kind: RecordKind) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE run_id = ?1",
                kind.table_name()
            ),
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Request Log =====

    fn log_request(&mut self, run_id: i64, entry: &RequestLogEntry) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO requests (run_id, url, stage, outcome, status_code, error_message,
             record_count, follow_up_count, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                entry.url,
                entry.stage,
                entry.outcome.to_db_string(),
                entry.status_code,
                entry.error_message,
                entry.record_count,
                entry.follow_up_count,
                now
            ],
        )?;
        Ok(())
    }

    fn count_requests_by_outcome(
        &self,
        run_id: i64,
    ) -> StorageResult<HashMap<RequestOutcome, u64>> {
        let counts = self.count_grouped(
            "SELECT outcome, COUNT(*) FROM requests WHERE run_id = ?1 GROUP BY outcome",
            run_id,
        )?;

        let mut summary = HashMap::new();
        for (outcome, count) in counts {
            match RequestOutcome::from_db_string(&outcome) {
                Some(outcome) => {
                    summary.insert(outcome, count);
                }
                None => tracing::warn!("Unknown request outcome in database: {}", outcome),
            }
        }
        Ok(summary)
    }

    fn count_requests_by_stage(&self, run_id: i64) -> StorageResult<HashMap<String, u64>> {
        Ok(self
            .count_grouped(
                "SELECT stage, COUNT(*) FROM requests WHERE run_id = ?1 GROUP BY stage",
                run_id,
            )?
            .into_iter()
            .collect())
    }

    // ===== Warnings =====

    fn record_warning(
        &mut self,
        run_id: i64,
        url: &str,
        warning: &StageWarning,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO warnings (run_id, url, kind, message, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, url, warning.kind(), warning.to_string(), now],
        )?;
        Ok(())
    }

    fn count_warnings_by_kind(&self, run_id: i64) -> StorageResult<HashMap<String, u64>> {
        Ok(self
            .count_grouped(
                "SELECT kind, COUNT(*) FROM warnings WHERE run_id = ?1 GROUP BY kind",
                run_id,
            )?
            .into_iter()
            .collect())
    }
}
