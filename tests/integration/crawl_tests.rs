//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the PharmGKB site and drive the
//! full gene -> picker -> genotype cycle end-to-end.

use pharmgkb_harvest::config::{
    default_phenotype_exceptions, Config, CrawlerConfig, GeneEntry, OutputConfig, OverflowPolicy,
    UserAgentConfig,
};
use pharmgkb_harvest::crawler::Coordinator;
use pharmgkb_harvest::records::{Record, RecordKind};
use pharmgkb_harvest::storage::{RequestOutcome, RunStatus, SqliteStorage, Storage};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENE_PAGE: &str = r#"<html>
<head><title>TPMT [PharmGKB]</title></head>
<body>
  <div id="tabHaplotypes">
    <article class="HaplotypeSet">
      <div class="tableWrapper">
        <table>
          <tr><th>Haplotype</th><th>rs1800460</th><th>rs1142345</th></tr>
          <tr><td><a href="/haplotype/PA1">*1</a></td><td>C</td><td>T</td></tr>
          <tr><td><a href="/haplotype/PA3">*3A</a></td><td>T</td><td>C</td></tr>
        </table>
      </div>
    </article>
  </div>
  <script type="text/javascript">
    $(function() { popPickers('#edg166104791','166104791'); });
  </script>
</body>
</html>"#;

const PICKER_DATA: &str = r#"{"results": [{"gene": "TPMT", "haps": [
    {"name": "*3A", "value": "PA3"},
    {"name": "*1", "value": "PA1"},
    {"name": "*2", "value": "PA2"}
]}]}"#;

const GENOTYPE_PAGE: &str = r#"<html><body>
<dl>
  <dt>Phenotype (Genotype)</dt><dd>Intermediate metabolizer</dd>
  <dt>Implications</dt><dd>Moderate to high concentrations of TGN metabolites</dd>
  <dt>Recommendations (Strength: Strong)</dt><dd>Start with reduced doses</dd>
  <dt>Dosing Information</dt><dd>See guideline</dd>
</dl>
</body></html>"#;

/// Creates a test configuration crawling one gene page on the mock server
fn create_test_config(gene_url: String, db_path: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_genotype_requests: 100,
            overflow_policy: OverflowPolicy::Skip,
            minimum_request_interval: 0,
            max_total_requests: None,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().to_string(),
            export_path: None,
        },
        genes: vec![GeneEntry { url: gene_url }],
        phenotype_exceptions: default_phenotype_exceptions(),
    }
}

/// Mounts the gene page, the picker endpoint and the genotype endpoint
async fn mount_site(mock_server: &MockServer, picker_status: u16) {
    Mock::given(method("GET"))
        .and(path("/gene/PA356"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(GENE_PAGE)
                .insert_header("content-type", "text/html"),
        )
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/views/ajaxGuidelinePickerData.action"))
        .and(body_string_contains("annotationId=166104791"))
        .respond_with(
            ResponseTemplate::new(picker_status)
                .set_body_string(PICKER_DATA)
                .insert_header("content-type", "application/json"),
        )
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/views/alleleGuidelines.action"))
        .and(body_string_contains("location=TPMT"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(GENOTYPE_PAGE)
                .insert_header("content-type", "text/html"),
        )
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_gene() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, 200).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let config = create_test_config(format!("{}/gene/PA356", mock_server.uri()), &db_path);

    let coordinator = Coordinator::new(config, "test-hash").unwrap();
    let summary = coordinator.run().await.unwrap();

    // gene page, picker data, three haplotype pairs
    assert_eq!(summary.requests_issued, 5);
    assert_eq!(summary.fetch_failures, 0);
    assert_eq!(summary.warnings, 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");

    let count = |kind| storage.count_records(summary.run_id, kind).unwrap();
    assert_eq!(count(RecordKind::GeneHaplotypeVariant), 4);
    assert_eq!(count(RecordKind::GenotypePhenotype), 3);
    assert_eq!(count(RecordKind::DrugRecommendation), 3);
    assert_eq!(count(RecordKind::UnusedGenotypeData), 3);
    assert_eq!(summary.records_stored, 13);

    let records = storage.load_records(summary.run_id).unwrap();
    let mut pairs: Vec<(String, String)> = records
        .iter()
        .filter_map(|record| match record {
            Record::DrugRecommendation(r) => {
                assert_eq!(r.classification.as_deref(), Some("Strong"));
                assert_eq!(r.recommendation.as_deref(), Some("Start with reduced doses"));
                assert_eq!(r.annotation_id, "166104791");
                Some((r.haplotype_name1.clone(), r.haplotype_name2.clone()))
            }
            _ => None,
        })
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("*1".to_string(), "*2".to_string()),
            ("*1".to_string(), "*3A".to_string()),
            ("*2".to_string(), "*3A".to_string()),
        ]
    );

    for record in &records {
        if let Record::GenotypePhenotype(p) = record {
            assert_eq!(p.phenotype_name.as_deref(), Some("Intermediate metabolizer"));
        }
    }

    let by_stage = storage.count_requests_by_stage(summary.run_id).unwrap();
    assert_eq!(by_stage.get("gene"), Some(&1));
    assert_eq!(by_stage.get("haplotype_phenotype"), Some(&1));
    assert_eq!(by_stage.get("genotype"), Some(&3));

    let by_outcome = storage.count_requests_by_outcome(summary.run_id).unwrap();
    assert_eq!(by_outcome.get(&RequestOutcome::Processed), Some(&5));
}

#[tokio::test]
async fn test_picker_http_error_is_logged_and_run_completes() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, 500).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let config = create_test_config(format!("{}/gene/PA356", mock_server.uri()), &db_path);

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.fetch_failures, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(
        storage.get_run(summary.run_id).unwrap().status,
        RunStatus::Completed
    );
    let by_outcome = storage.count_requests_by_outcome(summary.run_id).unwrap();
    assert_eq!(by_outcome.get(&RequestOutcome::HttpError), Some(&1));
    assert_eq!(
        storage
            .count_records(summary.run_id, RecordKind::GeneHaplotypeVariant)
            .unwrap(),
        4
    );
    assert_eq!(
        storage
            .count_records(summary.run_id, RecordKind::DrugRecommendation)
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_fan_out_overflow_skips_annotation() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, 200).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let mut config = create_test_config(format!("{}/gene/PA356", mock_server.uri()), &db_path);
    // At most two haplotypes fit under a cap of 2
    config.crawler.max_genotype_requests = 2;

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.warnings, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let warnings = storage.count_warnings_by_kind(summary.run_id).unwrap();
    assert_eq!(warnings.get("fan_out_overflow"), Some(&1));
    assert_eq!(
        storage
            .count_records(summary.run_id, RecordKind::GenotypePhenotype)
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_truncate_policy_pairs_leading_haplotypes() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, 200).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let mut config = create_test_config(format!("{}/gene/PA356", mock_server.uri()), &db_path);
    config.crawler.max_genotype_requests = 2;
    config.crawler.overflow_policy = OverflowPolicy::Truncate;

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run()
        .await
        .unwrap();

    // one pair from the first two haplotypes
    assert_eq!(summary.requests_issued, 3);
    assert_eq!(summary.warnings, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(
        storage
            .count_records(summary.run_id, RecordKind::DrugRecommendation)
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_request_budget_skips_remaining_frontier() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, 200).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let mut config = create_test_config(format!("{}/gene/PA356", mock_server.uri()), &db_path);
    config.crawler.max_total_requests = Some(2);

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.skipped, 3);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let by_outcome = storage.count_requests_by_outcome(summary.run_id).unwrap();
    assert_eq!(by_outcome.get(&RequestOutcome::Processed), Some(&2));
    assert_eq!(by_outcome.get(&RequestOutcome::Skipped), Some(&3));
}

#[tokio::test]
async fn test_export_after_crawl() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, 200).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let export_path = temp_dir.path().join("records.jsonl");
    let mut config = create_test_config(format!("{}/gene/PA356", mock_server.uri()), &db_path);
    config.output.export_path = Some(export_path.to_string_lossy().to_string());

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run()
        .await
        .unwrap();

    let content = std::fs::read_to_string(&export_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len() as u64, summary.records_stored);

    for line in lines {
        let record: Record = serde_json::from_str(line).unwrap();
        assert!(RecordKind::ALL.contains(&record.kind()));
    }
}
