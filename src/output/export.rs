//! JSON lines export of harvested records

use crate::storage::Storage;
use crate::HarvestError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes every record of a run to `path`, one JSON object per line
///
/// Each line carries a `kind` field naming the record type. The file is
/// replaced if it exists.
///
/// # Returns
///
/// The number of records written
pub fn export_records_jsonl(
    storage: &dyn Storage,
    run_id: i64,
    path: &Path,
) -> Result<usize, HarvestError> {
    let records = storage.load_records(run_id)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for record in &records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{GenotypePhenotype, Record};
    use crate::storage::SqliteStorage;
    use tempfile::TempDir;

    #[test]
    fn test_export_writes_one_line_per_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::new(&temp_dir.path().join("export.db")).unwrap();
        let run_id = storage.create_run("hash").unwrap();

        let records: Vec<Record> = ["*1", "*2"]
            .iter()
            .map(|second| {
                Record::GenotypePhenotype(GenotypePhenotype {
                    gene_name: "CYP2C19".to_string(),
                    haplotype_name1: "*1".to_string(),
                    haplotype_name2: second.to_string(),
                    phenotype_name: None,
                })
            })
            .collect();
        storage.insert_records(run_id, &records).unwrap();

        let path = temp_dir.path().join("out").join("records.jsonl");
        let written = export_records_jsonl(&storage, run_id, &path).unwrap();
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: Record = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, records[1]);
        assert!(lines[0].contains("\"kind\":\"genotype_phenotype\""));
    }

    #[test]
    fn test_export_empty_run() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::new(&temp_dir.path().join("export.db")).unwrap();
        let run_id = storage.create_run("hash").unwrap();

        let path = temp_dir.path().join("records.jsonl");
        assert_eq!(export_records_jsonl(&storage, run_id, &path).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
