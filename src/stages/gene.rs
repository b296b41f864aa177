//! Gene page stage
//!
//! A gene page carries a haplotype table (one row per haplotype, one column per
//! SNP) and inline scripts that wire up guideline pickers, one per clinical
//! annotation. The table becomes [`GeneHaplotypeVariant`] records; each picker
//! becomes a follow-up request for the annotation's haplotype catalog.

use crate::records::{GeneHaplotypeVariant, Record};
use crate::stages::{CrawlRequest, StageOutput, StageWarning};
use crate::url::derive_base_url;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.*)\s*\[PharmGKB\]$").expect("title regex"));

static POP_PICKERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"popPickers\('#edg(\d+)',\s*'\d+'\);").expect("popPickers regex")
});

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));

static HAPLOTYPE_TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div#tabHaplotypes > article.HaplotypeSet > * > table")
        .expect("haplotype table selector")
});

static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("row selector"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("link selector"));

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("script selector"));

/// A haplotype table split into its header and data rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaplotypeTable {
    /// SNP identifiers from the header row, first column excluded
    pub snp_ids: Vec<String>,
    pub rows: Vec<HaplotypeRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaplotypeRow {
    pub haplotype_name: String,
    /// Allele per SNP column, in column order
    pub alleles: Vec<String>,
}

/// Parses a gene detail page
///
/// Returns no output at all when the page has no recognizable title or no
/// haplotype table; such genes simply have no haplotype data.
pub fn parse_gene_page(html: &str, url: &str) -> StageOutput {
    let document = Html::parse_document(html);

    let Some(gene_name) = extract_gene_name(&document) else {
        tracing::debug!("No gene title on {}, skipping", url);
        return StageOutput::empty();
    };

    let Some(table) = document.select(&HAPLOTYPE_TABLE_SELECTOR).next() else {
        tracing::debug!("Gene {} has no haplotype table, skipping", gene_name);
        return StageOutput::empty();
    };

    let mut output = StageOutput::empty();
    let table = parse_haplotype_table(table);

    for row in table.rows {
        if row.alleles.len() != table.snp_ids.len() {
            output.warnings.push(StageWarning::ColumnMismatch {
                gene_name: gene_name.clone(),
                haplotype_name: row.haplotype_name,
                expected: table.snp_ids.len(),
                found: row.alleles.len(),
            });
            continue;
        }

        for (snp_id, allele) in table.snp_ids.iter().zip(row.alleles) {
            output
                .records
                .push(Record::GeneHaplotypeVariant(GeneHaplotypeVariant {
                    gene_name: gene_name.clone(),
                    haplotype_name: row.haplotype_name.clone(),
                    snp_id: snp_id.clone(),
                    allele,
                }));
        }
    }

    let annotation_ids = extract_annotation_ids(&document);
    match derive_base_url(url) {
        Some(base_url) => {
            for annotation_id in &annotation_ids {
                output.requests.push(CrawlRequest::picker_data(
                    &base_url,
                    annotation_id,
                    &gene_name,
                ));
            }
        }
        None if !annotation_ids.is_empty() => {
            output.warnings.push(StageWarning::MissingBaseUrl {
                url: url.to_string(),
            });
        }
        None => {}
    }

    tracing::debug!(
        "Gene {}: {} variants, {} annotations",
        gene_name,
        output.records.len(),
        output.requests.len()
    );

    output
}

/// Extracts the gene name from a `<title>` of the form `NAME [PharmGKB]`
pub fn extract_gene_name(document: &Html) -> Option<String> {
    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>())?;

    TITLE_RE
        .captures(title.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end().to_string())
}

/// Splits a haplotype `<table>` into header SNP ids and haplotype rows
///
/// Rows whose first cell has no haplotype name are ignored.
pub fn parse_haplotype_table(table: ElementRef<'_>) -> HaplotypeTable {
    let mut rows = table.select(&ROW_SELECTOR).map(cells);

    let snp_ids = rows
        .next()
        .map(|header| header.iter().skip(1).map(|cell| cell_text(*cell)).collect())
        .unwrap_or_default();

    let rows = rows
        .filter_map(|cells| {
            let (first, rest) = cells.split_first()?;
            let haplotype_name = haplotype_name(*first)?;
            Some(HaplotypeRow {
                haplotype_name,
                alleles: rest.iter().map(|cell| cell_text(*cell)).collect(),
            })
        })
        .collect();

    HaplotypeTable { snp_ids, rows }
}

/// Collects annotation ids from `popPickers('#edg<id>', ...)` calls in scripts
pub fn extract_annotation_ids(document: &Html) -> Vec<String> {
    document
        .select(&SCRIPT_SELECTOR)
        .filter(|script| {
            script
                .value()
                .attr("type")
                .is_some_and(|kind| kind.contains("javascript"))
        })
        .map(|script| script.text().collect::<String>())
        .filter(|text| text.contains("popPickers"))
        .flat_map(|text| {
            POP_PICKERS_RE
                .captures_iter(&text)
                .map(|caps| caps[1].to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Direct `th`/`td` children of a row
fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| matches!(child.value().name(), "th" | "td"))
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Haplotype names are links; fall back to plain cell text
fn haplotype_name(cell: ElementRef<'_>) -> Option<String> {
    let name = match cell.select(&LINK_SELECTOR).next() {
        Some(link) => cell_text(link),
        None => cell_text(cell),
    };
    (!name.is_empty()).then_some(name)
}
