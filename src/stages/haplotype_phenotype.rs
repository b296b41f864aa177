//! Guideline picker stage
//!
//! The picker endpoint returns, for one annotation, the haplotypes a user can
//! choose from. Every unordered pair of them is a genotype with its own
//! recommendation page, so the number of follow-up requests grows
//! quadratically with the catalog. [`max_haplotypes`] bounds it.

use crate::config::OverflowPolicy;
use crate::stages::{CrawlRequest, GenotypePairRequest, PipelineSettings, StageOutput, StageWarning};
use serde::Deserialize;

/// Picker payload: `{"results": [{"gene"?: ..., "haps"?: [...]}, ...]}`
#[derive(Debug, Deserialize)]
struct PickerPayload {
    #[serde(default)]
    results: Vec<PickerResult>,
}

#[derive(Debug, Deserialize)]
struct PickerResult {
    gene: Option<String>,
    #[serde(default)]
    haps: Vec<PickerHaplotype>,
}

#[derive(Debug, Deserialize)]
struct PickerHaplotype {
    name: String,
    value: String,
}

/// One haplotype offered by the picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaplotypeCatalogEntry {
    pub haplotype_name: String,
    pub haplotype_id: String,
}

/// Haplotypes of one annotation, in the order the payload lists them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaplotypeCatalog {
    pub gene_name: String,
    pub entries: Vec<HaplotypeCatalogEntry>,
}

/// Largest `n` such that pairing `n` haplotypes stays strictly under `cap` requests
///
/// That is the largest `n` with `n(n-1)/2 < cap`, the floored positive root of
/// `n^2 - n - 2cap = 0`. The float estimate is corrected with integer
/// arithmetic so that exact roots (e.g. `cap = 105`, `n = 15`) stay exclusive.
///
/// # Examples
///
/// ```
/// use pharmgkb_harvest::stages::haplotype_phenotype::max_haplotypes;
///
/// assert_eq!(max_haplotypes(100), 14);
/// ```
pub fn max_haplotypes(cap: u32) -> usize {
    let cap = u64::from(cap);
    let pairs = |n: u64| n * n.saturating_sub(1) / 2;

    let estimate = (1.0 + (1.0 + 8.0 * cap as f64).sqrt()) / 2.0;
    let mut n = estimate.floor() as u64;

    while n > 0 && pairs(n) >= cap {
        n -= 1;
    }
    while pairs(n + 1) < cap {
        n += 1;
    }

    n as usize
}

/// Parses the picker payload into a catalog
///
/// Returns `None` for an empty or malformed body. A `gene` field overrides the
/// running gene name, which starts as `fallback_gene`.
pub fn parse_catalog(body: &str, fallback_gene: &str) -> Option<HaplotypeCatalog> {
    let payload: PickerPayload = serde_json::from_str(body).ok()?;

    let mut gene_name = fallback_gene.to_string();
    let mut entries = Vec::new();

    for result in payload.results {
        if let Some(gene) = result.gene {
            gene_name = gene;
        }
        entries.extend(result.haps.into_iter().map(|hap| HaplotypeCatalogEntry {
            haplotype_name: hap.name,
            haplotype_id: hap.value,
        }));
    }

    Some(HaplotypeCatalog { gene_name, entries })
}

/// All unordered pairs of catalog positions, each ordered by haplotype name
///
/// Pairs are formed from distinct positions, so a haplotype is only paired
/// with itself when the catalog lists it twice.
pub fn pair_haplotypes(
    entries: &[HaplotypeCatalogEntry],
) -> Vec<(&HaplotypeCatalogEntry, &HaplotypeCatalogEntry)> {
    let mut pairs = Vec::with_capacity(entries.len() * entries.len().saturating_sub(1) / 2);

    for (i, first) in entries.iter().enumerate() {
        for second in &entries[i + 1..] {
            if second.haplotype_name < first.haplotype_name {
                pairs.push((second, first));
            } else {
                pairs.push((first, second));
            }
        }
    }

    pairs
}

/// Parses the picker payload for one annotation and issues genotype requests
pub fn parse_picker_data(
    body: &str,
    base_url: &str,
    annotation_id: &str,
    gene_name: &str,
    settings: &PipelineSettings,
) -> StageOutput {
    let Some(catalog) = parse_catalog(body, gene_name) else {
        tracing::debug!("Annotation {} returned no picker data", annotation_id);
        return StageOutput::empty();
    };

    let mut output = StageOutput::empty();
    let limit = max_haplotypes(settings.max_genotype_requests);

    let entries = if catalog.entries.len() <= limit {
        &catalog.entries[..]
    } else {
        output.warnings.push(StageWarning::FanOutOverflow {
            gene_name: catalog.gene_name.clone(),
            annotation_id: annotation_id.to_string(),
            haplotypes: catalog.entries.len(),
            max_haplotypes: limit,
            policy: settings.overflow_policy,
        });

        match settings.overflow_policy {
            OverflowPolicy::Skip => return output,
            OverflowPolicy::Truncate => &catalog.entries[..limit],
        }
    };

    for (first, second) in pair_haplotypes(entries) {
        output.requests.push(CrawlRequest::genotype(
            base_url,
            GenotypePairRequest {
                haplotype_name1: first.haplotype_name.clone(),
                haplotype_name2: second.haplotype_name.clone(),
                haplotype_id1: first.haplotype_id.clone(),
                haplotype_id2: second.haplotype_id.clone(),
                gene_name: catalog.gene_name.clone(),
                annotation_id: annotation_id.to_string(),
            },
        ));
    }

    tracing::debug!(
        "Annotation {} ({}): {} haplotypes, {} genotype requests",
        annotation_id,
        catalog.gene_name,
        entries.len(),
        output.requests.len()
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Continuation;
    use std::collections::HashSet;

    const BASE_URL: &str = "https://www.pharmgkb.org";

    fn payload(gene: &str, haplotypes: &[(&str, &str)]) -> String {
        let haps: Vec<_> = haplotypes
            .iter()
            .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
            .collect();
        serde_json::json!({
            "results": [
                { "gene": gene },
                { "haps": haps }
            ]
        })
        .to_string()
    }

    fn numbered(count: usize) -> Vec<(String, String)> {
        (1..=count)
            .map(|i| (format!("*{:02}", i), format!("PA{}", 1000 + i)))
            .collect()
    }

    fn pairs_of(output: &StageOutput) -> Vec<GenotypePairRequest> {
        output
            .requests
            .iter()
            .map(|request| match &request.continuation {
                Continuation::Genotype(pair) => pair.clone(),
                other => panic!("unexpected continuation {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_max_haplotypes_for_default_cap() {
        assert_eq!(max_haplotypes(100), 14);
        assert!(14 * 13 / 2 < 100);
        assert!(15 * 14 / 2 >= 100);
    }

    #[test]
    fn test_max_haplotypes_bounds() {
        for cap in 1..=500u32 {
            let n = max_haplotypes(cap) as u64;
            let cap = u64::from(cap);
            assert!(n * n.saturating_sub(1) / 2 < cap, "cap {} n {}", cap, n);
            assert!((n + 1) * n / 2 >= cap, "cap {} n {}", cap, n);
        }
    }

    #[test]
    fn test_max_haplotypes_exact_root_is_exclusive() {
        // 15 haplotypes make exactly 105 pairs
        assert_eq!(max_haplotypes(105), 14);
        assert_eq!(max_haplotypes(106), 15);
        assert_eq!(max_haplotypes(1), 1);
    }

    #[test]
    fn test_parse_catalog_gene_override_and_order() {
        let body = r#"{"results": [
            {"gene": "CYP2C19", "haps": [{"name": "*2", "value": "PA2"}]},
            {"haps": [{"name": "*1", "value": "PA1"}]}
        ]}"#;
        let catalog = parse_catalog(body, "unknown").unwrap();

        assert_eq!(catalog.gene_name, "CYP2C19");
        assert_eq!(
            catalog
                .entries
                .iter()
                .map(|e| e.haplotype_name.as_str())
                .collect::<Vec<_>>(),
            vec!["*2", "*1"]
        );
    }

    #[test]
    fn test_parse_catalog_keeps_fallback_gene() {
        let body = r#"{"results": [{"haps": [{"name": "*1", "value": "PA1"}]}]}"#;
        let catalog = parse_catalog(body, "TPMT").unwrap();
        assert_eq!(catalog.gene_name, "TPMT");
    }

    #[test]
    fn test_empty_or_invalid_body_yields_nothing() {
        let settings = PipelineSettings::default();
        for body in ["", "   ", "<html>error</html>", "{\"results\": 7}"] {
            let output = parse_picker_data(body, BASE_URL, "1", "TPMT", &settings);
            assert!(output.is_empty(), "body {:?}", body);
        }
    }

    #[test]
    fn test_all_pairs_within_cap() {
        let haplotypes = numbered(5);
        let refs: Vec<_> = haplotypes
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        let body = payload("CYP2D6", &refs);

        let output = parse_picker_data(&body, BASE_URL, "981483939", "", &PipelineSettings::default());
        let pairs = pairs_of(&output);

        assert_eq!(pairs.len(), 5 * 4 / 2);
        assert!(output.warnings.is_empty());

        let mut seen = HashSet::new();
        for pair in &pairs {
            assert_ne!(pair.haplotype_id1, pair.haplotype_id2);
            assert!(pair.haplotype_name1 <= pair.haplotype_name2);
            assert!(seen.insert((pair.haplotype_id1.clone(), pair.haplotype_id2.clone())));
            assert_eq!(pair.gene_name, "CYP2D6");
            assert_eq!(pair.annotation_id, "981483939");
        }
    }

    #[test]
    fn test_pairs_are_sorted_by_name() {
        let body = payload("CYP2C19", &[("*17", "PA17"), ("*1", "PA1")]);
        let output = parse_picker_data(&body, BASE_URL, "42", "", &PipelineSettings::default());

        let request = &output.requests[0];
        assert_eq!(
            request.url,
            "https://www.pharmgkb.org/views/alleleGuidelines.action"
        );
        assert_eq!(request.form_value("allele1"), Some("PA1"));
        assert_eq!(request.form_value("allele2"), Some("PA17"));
        assert_eq!(request.form_value("location"), Some("CYP2C19"));
    }

    #[test]
    fn test_duplicate_catalog_entries_pair_with_themselves() {
        let body = payload("TPMT", &[("*3A", "PA3"), ("*3A", "PA3")]);
        let output = parse_picker_data(&body, BASE_URL, "7", "", &PipelineSettings::default());
        let pairs = pairs_of(&output);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].haplotype_id1, pairs[0].haplotype_id2);
    }

    #[test]
    fn test_catalog_at_limit_is_fully_paired() {
        let haplotypes = numbered(14);
        let refs: Vec<_> = haplotypes
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        let body = payload("CYP2D6", &refs);

        let output = parse_picker_data(&body, BASE_URL, "1", "", &PipelineSettings::default());
        assert_eq!(output.requests.len(), 91);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_overflow_skip_policy() {
        let haplotypes = numbered(15);
        let refs: Vec<_> = haplotypes
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        let body = payload("CYP2D6", &refs);

        let output = parse_picker_data(&body, BASE_URL, "1", "", &PipelineSettings::default());
        assert!(output.requests.is_empty());
        assert_eq!(
            output.warnings,
            vec![StageWarning::FanOutOverflow {
                gene_name: "CYP2D6".to_string(),
                annotation_id: "1".to_string(),
                haplotypes: 15,
                max_haplotypes: 14,
                policy: OverflowPolicy::Skip,
            }]
        );
    }

    #[test]
    fn test_overflow_truncate_policy() {
        let haplotypes = numbered(20);
        let refs: Vec<_> = haplotypes
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        let body = payload("CYP2D6", &refs);
        let settings = PipelineSettings {
            overflow_policy: OverflowPolicy::Truncate,
            ..PipelineSettings::default()
        };

        let output = parse_picker_data(&body, BASE_URL, "1", "", &settings);
        assert_eq!(output.requests.len(), 91);
        assert_eq!(output.warnings.len(), 1);

        // Only the first 14 haplotypes in payload order take part
        for pair in pairs_of(&output) {
            assert!(pair.haplotype_name2.as_str() <= "*14");
        }
    }

    #[test]
    fn test_smaller_cap_from_settings() {
        let body = payload("TPMT", &[("*1", "PA1"), ("*2", "PA2"), ("*3", "PA3")]);
        let settings = PipelineSettings {
            max_genotype_requests: 2,
            ..PipelineSettings::default()
        };

        // max_haplotypes(2) == 2, three haplotypes overflow
        let output = parse_picker_data(&body, BASE_URL, "1", "", &settings);
        assert!(output.requests.is_empty());
        assert_eq!(output.warnings.len(), 1);
    }
}
