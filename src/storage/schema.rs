//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One allele of one haplotype at one SNP
CREATE TABLE IF NOT EXISTS gene_haplotype_variants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    gene_name TEXT NOT NULL,
    haplotype_name TEXT NOT NULL,
    snp_id TEXT NOT NULL,
    allele TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_variants_gene ON gene_haplotype_variants(gene_name);

-- Phenotype per genotype
CREATE TABLE IF NOT EXISTS genotype_phenotypes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    gene_name TEXT NOT NULL,
    haplotype_name1 TEXT NOT NULL,
    haplotype_name2 TEXT NOT NULL,
    phenotype_name TEXT
);

CREATE INDEX IF NOT EXISTS idx_phenotypes_gene ON genotype_phenotypes(gene_name);

-- Dosing guidance per genotype
CREATE TABLE IF NOT EXISTS drug_recommendations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    gene_name TEXT NOT NULL,
    haplotype_name1 TEXT NOT NULL,
    haplotype_name2 TEXT NOT NULL,
    annotation_id TEXT NOT NULL,
    classification TEXT,
    recommendation TEXT,
    implications TEXT
);

CREATE INDEX IF NOT EXISTS idx_recommendations_annotation ON drug_recommendations(annotation_id);

-- Labels no classification rule claimed
CREATE TABLE IF NOT EXISTS unused_genotype_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    gene_name TEXT NOT NULL,
    annotation_id TEXT NOT NULL,
    haplotype_id1 TEXT NOT NULL,
    haplotype_id2 TEXT NOT NULL,
    values_json TEXT NOT NULL
);

-- Every request the host issued
CREATE TABLE IF NOT EXISTS requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    stage TEXT NOT NULL,
    outcome TEXT NOT NULL,
    status_code INTEGER,
    error_message TEXT,
    record_count INTEGER NOT NULL DEFAULT 0,
    follow_up_count INTEGER NOT NULL DEFAULT 0,
    logged_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_run ON requests(run_id);

-- Data problems reported by stages
CREATE TABLE IF NOT EXISTS warnings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    kind TEXT NOT NULL,
    message TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
