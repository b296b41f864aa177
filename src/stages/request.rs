//! Follow-up request descriptors
//!
//! A stage never calls the next stage directly. It returns a [`CrawlRequest`]
//! whose [`Continuation`] names the stage that must handle the response and
//! carries every parameter that stage needs.

use crate::url::{allele_guidelines_url, picker_data_url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One unordered pair of haplotypes to query together
///
/// `haplotype_name1` sorts before (or equal to) `haplotype_name2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenotypePairRequest {
    pub haplotype_name1: String,
    pub haplotype_name2: String,
    pub haplotype_id1: String,
    pub haplotype_id2: String,
    pub gene_name: String,
    pub annotation_id: String,
}

/// Stage identifier plus the parameters bound to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Continuation {
    /// Gene detail page
    Gene,

    /// Guideline picker JSON for one annotation
    HaplotypePhenotype {
        base_url: String,
        annotation_id: String,
        /// Gene name seen on the gene page; the JSON payload may override it
        gene_name: String,
    },

    /// Recommendation page for one haplotype pair
    Genotype(GenotypePairRequest),
}

impl Continuation {
    pub fn stage_name(&self) -> &'static str {
        match self {
            Self::Gene => "gene",
            Self::HaplotypePhenotype { .. } => "haplotype_phenotype",
            Self::Genotype(_) => "genotype",
        }
    }
}

/// A request for the host to fetch, bound to the stage that parses it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    /// Form fields; an empty form means a plain GET
    pub form: Vec<(String, String)>,
    pub continuation: Continuation,
}

impl CrawlRequest {
    /// GET request for a gene detail page
    pub fn gene_page(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            form: Vec::new(),
            continuation: Continuation::Gene,
        }
    }

    /// POST to the guideline picker endpoint for one annotation
    pub fn picker_data(base_url: &str, annotation_id: &str, gene_name: &str) -> Self {
        Self {
            url: picker_data_url(base_url),
            form: vec![("annotationId".to_string(), annotation_id.to_string())],
            continuation: Continuation::HaplotypePhenotype {
                base_url: base_url.to_string(),
                annotation_id: annotation_id.to_string(),
                gene_name: gene_name.to_string(),
            },
        }
    }

    /// POST to the recommendation endpoint for one haplotype pair
    pub fn genotype(base_url: &str, pair: GenotypePairRequest) -> Self {
        Self {
            url: allele_guidelines_url(base_url),
            form: vec![
                ("annotationId".to_string(), pair.annotation_id.clone()),
                ("allele1".to_string(), pair.haplotype_id1.clone()),
                ("allele2".to_string(), pair.haplotype_id2.clone()),
                ("location".to_string(), pair.gene_name.clone()),
            ],
            continuation: Continuation::Genotype(pair),
        }
    }

    pub fn is_form_post(&self) -> bool {
        !self.form.is_empty()
    }

    /// Looks up a form field by name
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Identity of the request on the wire
    ///
    /// Two requests with the same method, URL and form fields (in any order)
    /// share a fingerprint. The continuation does not take part.
    pub fn fingerprint(&self) -> String {
        let mut fields: Vec<_> = self.form.iter().collect();
        fields.sort();

        let mut hasher = Sha256::new();
        hasher.update(if self.is_form_post() { "POST" } else { "GET" });
        hasher.update([0u8]);
        hasher.update(self.url.as_bytes());
        for (key, value) in fields {
            hasher.update([0u8]);
            hasher.update(key.as_bytes());
            hasher.update([b'=']);
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
