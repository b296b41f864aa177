//! Output records produced by the extraction stages
//!
//! Each record is a flat set of named fields. [`Record`] wraps them so the
//! host can persist and export a mixed stream without knowing which stage
//! produced what.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One allele of one haplotype at one SNP position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneHaplotypeVariant {
    pub gene_name: String,
    pub haplotype_name: String,
    pub snp_id: String,
    pub allele: String,
}

/// Phenotype implied by a genotype (a pair of haplotypes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenotypePhenotype {
    pub gene_name: String,
    pub haplotype_name1: String,
    pub haplotype_name2: String,
    /// Unset when the recommendation page carried no phenotype label
    pub phenotype_name: Option<String>,
}

/// Dosing guidance tied to a genotype
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugRecommendation {
    pub gene_name: String,
    pub haplotype_name1: String,
    pub haplotype_name2: String,
    pub annotation_id: String,

    /// Recommendation strength, e.g. "Strong" or "Moderate"
    pub classification: Option<String>,
    pub recommendation: Option<String>,
    pub implications: Option<String>,
}

/// Keys identifying the genotype request an [`UnusedGenotypeData`] came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenotypeSource {
    pub gene_name: String,
    pub annotation_id: String,
    pub haplotype_id1: String,
    pub haplotype_id2: String,
}

/// Label/value pairs from a recommendation page that no rule claimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedGenotypeData {
    pub values: BTreeMap<String, String>,
    pub source: GenotypeSource,
}

impl UnusedGenotypeData {
    pub fn new(source: GenotypeSource) -> Self {
        Self {
            values: BTreeMap::new(),
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Any record emitted by a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    GeneHaplotypeVariant(GeneHaplotypeVariant),
    GenotypePhenotype(GenotypePhenotype),
    DrugRecommendation(DrugRecommendation),
    UnusedGenotypeData(UnusedGenotypeData),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::GeneHaplotypeVariant(_) => RecordKind::GeneHaplotypeVariant,
            Self::GenotypePhenotype(_) => RecordKind::GenotypePhenotype,
            Self::DrugRecommendation(_) => RecordKind::DrugRecommendation,
            Self::UnusedGenotypeData(_) => RecordKind::UnusedGenotypeData,
        }
    }
}

/// Discriminant of [`Record`], used for counting and table selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    GeneHaplotypeVariant,
    GenotypePhenotype,
    DrugRecommendation,
    UnusedGenotypeData,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        Self::GeneHaplotypeVariant,
        Self::GenotypePhenotype,
        Self::DrugRecommendation,
        Self::UnusedGenotypeData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneHaplotypeVariant => "gene_haplotype_variant",
            Self::GenotypePhenotype => "genotype_phenotype",
            Self::DrugRecommendation => "drug_recommendation",
            Self::UnusedGenotypeData => "unused_genotype_data",
        }
    }
}
