//! Genotype recommendation stage
//!
//! A recommendation page is a definition list of label/value pairs. Labels are
//! free-form, so classification is rule based: a handful of known labels fill
//! the phenotype and recommendation records, and everything else is kept as
//! [`UnusedGenotypeData`] rather than dropped.

use crate::records::{
    DrugRecommendation, GenotypePhenotype, GenotypeSource, Record, UnusedGenotypeData,
};
use crate::stages::{GenotypePairRequest, PipelineSettings, StageOutput};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static STRENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Recommendations\s*\(Strength:\s*([^)]*)\)").expect("strength regex")
});

static DL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("dl").expect("dl selector"));

static DEFINITION_ITEM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("dt, dd").expect("definition item selector"));

const PHENOTYPE_LABEL: &str = "Phenotype (Genotype)";
const IMPLICATIONS_LABEL: &str = "Implications";

/// Label of a definition term
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Title {
    /// Any label, whitespace collapsed
    Plain(String),
    /// `Recommendations (Strength: X)`, holding `X`
    Strength(String),
}

impl Title {
    pub fn parse(raw: &str) -> Self {
        let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        match STRENGTH_RE.captures(&text) {
            Some(caps) => Self::Strength(caps[1].trim().to_string()),
            None => Self::Plain(text),
        }
    }

    /// Text used when the title ends up in [`UnusedGenotypeData`]
    pub fn label(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Strength(strength) => format!("Recommendations (Strength: {})", strength),
        }
    }
}

/// Records built from one recommendation page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub phenotype: GenotypePhenotype,
    pub recommendation: DrugRecommendation,
    pub unused: UnusedGenotypeData,
}

/// Parses the recommendation page for one haplotype pair
///
/// Always emits a [`GenotypePhenotype`] and a [`DrugRecommendation`], even if
/// the page filled none of their fields. [`UnusedGenotypeData`] is emitted only
/// when some label went unclaimed.
pub fn parse_genotype_page(
    html: &str,
    pair: &GenotypePairRequest,
    settings: &PipelineSettings,
) -> StageOutput {
    let document = Html::parse_document(html);
    let definitions = extract_definitions(&document);
    let classified = classify(definitions, pair, &settings.phenotype_exceptions);

    tracing::debug!(
        "Genotype {} {}/{}: phenotype {:?}, {} unused labels",
        pair.gene_name,
        pair.haplotype_name1,
        pair.haplotype_name2,
        classified.phenotype.phenotype_name,
        classified.unused.values.len()
    );

    let mut output = StageOutput::empty();
    output
        .records
        .push(Record::GenotypePhenotype(classified.phenotype));
    output
        .records
        .push(Record::DrugRecommendation(classified.recommendation));
    if !classified.unused.is_empty() {
        output
            .records
            .push(Record::UnusedGenotypeData(classified.unused));
    }
    output
}

/// Collects `dt`/`dd` pairs from every definition list on the page
///
/// Pairs come back in document order. A `dt` pairs with the next `dd` of the
/// same list, including items wrapped in `<div>` groups; items of a nested
/// list belong to that list only. When a title repeats, the later value
/// replaces the earlier one in place.
pub fn extract_definitions(document: &Html) -> Vec<(Title, String)> {
    let mut definitions: Vec<(Title, String)> = Vec::new();

    for list in document.select(&DL_SELECTOR) {
        let mut pending: Option<Title> = None;

        for item in list
            .select(&DEFINITION_ITEM_SELECTOR)
            .filter(|item| owning_list(*item) == Some(list))
        {
            match item.value().name() {
                "dt" => pending = Some(Title::parse(&item.text().collect::<String>())),
                "dd" => {
                    if let Some(title) = pending.take() {
                        let value = definition_value(item);
                        match definitions.iter_mut().find(|(seen, _)| *seen == title) {
                            Some(entry) => entry.1 = value,
                            None => definitions.push((title, value)),
                        }
                    }
                }
                _ => {}
            }
        }
    }

    definitions
}

/// Nearest enclosing `dl` of a definition item
fn owning_list(item: ElementRef<'_>) -> Option<ElementRef<'_>> {
    item.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "dl")
}

/// Non-empty text fragments of a `dd`, joined by single spaces
fn definition_value(dd: ElementRef<'_>) -> String {
    dd.text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classifies label/value pairs into records
///
/// Rules, first match wins:
/// 1. `Recommendations (Strength: X)`: classification and recommendation;
///    with several strengths the alphabetically first one wins
/// 2. `Phenotype (Genotype)` for genes without an exception: phenotype
/// 3. `Implications`: implications
/// 4. the gene's exception label: phenotype
/// 5. anything else: unused data
///
/// Pairs are keyed by title first (a later duplicate replaces an earlier one)
/// and visited in title order. Rules 2 and 4 exclude each other by gene, and
/// the other strengths fall through to unused data, so the result does not
/// depend on the order of `definitions`.
pub fn classify<I>(
    definitions: I,
    pair: &GenotypePairRequest,
    exceptions: &BTreeMap<String, String>,
) -> Classified
where
    I: IntoIterator<Item = (Title, String)>,
{
    let exception_label = exceptions.get(&pair.gene_name);

    let mut phenotype = GenotypePhenotype {
        gene_name: pair.gene_name.clone(),
        haplotype_name1: pair.haplotype_name1.clone(),
        haplotype_name2: pair.haplotype_name2.clone(),
        phenotype_name: None,
    };
    let mut recommendation = DrugRecommendation {
        gene_name: pair.gene_name.clone(),
        haplotype_name1: pair.haplotype_name1.clone(),
        haplotype_name2: pair.haplotype_name2.clone(),
        annotation_id: pair.annotation_id.clone(),
        ..DrugRecommendation::default()
    };
    let mut unused = UnusedGenotypeData::new(GenotypeSource {
        gene_name: pair.gene_name.clone(),
        annotation_id: pair.annotation_id.clone(),
        haplotype_id1: pair.haplotype_id1.clone(),
        haplotype_id2: pair.haplotype_id2.clone(),
    });

    let definitions: BTreeMap<Title, String> = definitions.into_iter().collect();

    for (title, value) in definitions {
        match &title {
            Title::Strength(strength) if recommendation.classification.is_none() => {
                recommendation.classification = Some(strength.clone());
                recommendation.recommendation = Some(value);
            }
            Title::Plain(label) if label == PHENOTYPE_LABEL && exception_label.is_none() => {
                phenotype.phenotype_name = Some(value);
            }
            Title::Plain(label) if label == IMPLICATIONS_LABEL => {
                recommendation.implications = Some(value);
            }
            Title::Plain(label) if exception_label == Some(label) => {
                phenotype.phenotype_name = Some(value);
            }
            Title::Strength(_) | Title::Plain(_) => {
                unused.values.insert(title.label(), value);
            }
        }
    }

    Classified {
        phenotype,
        recommendation,
        unused,
    }
}
