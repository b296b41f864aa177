//! URL handling for PharmGKB endpoints
//!
//! Every follow-up request is built from the base URL of the gene page that
//! started the chain, so this module owns the base URL derivation and the two
//! fixed AJAX endpoints hung off it.

use crate::{UrlError, UrlResult};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Relative path of the guideline picker JSON endpoint
pub const PICKER_DATA_PATH: &str = "/views/ajaxGuidelinePickerData.action";

/// Relative path of the per-genotype recommendation endpoint
pub const ALLELE_GUIDELINES_PATH: &str = "/views/alleleGuidelines.action";

static GENE_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*)/gene/[^/]*").expect("gene segment regex"));

/// Derives the site base URL from a gene page URL
///
/// Strips the trailing `/gene/<id>` segment (and anything after it). Returns
/// `None` when the URL has no `/gene/` segment.
///
/// # Examples
///
/// ```
/// use pharmgkb_harvest::url::derive_base_url;
///
/// assert_eq!(
///     derive_base_url("https://www.pharmgkb.org/gene/PA128"),
///     Some("https://www.pharmgkb.org".to_string())
/// );
/// assert_eq!(derive_base_url("https://www.pharmgkb.org/drug/PA1"), None);
/// ```
pub fn derive_base_url(origin: &str) -> Option<String> {
    GENE_SEGMENT_RE
        .captures(origin)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// URL of the guideline picker endpoint for a base URL
pub fn picker_data_url(base_url: &str) -> String {
    format!("{}{}", base_url, PICKER_DATA_PATH)
}

/// URL of the genotype recommendation endpoint for a base URL
pub fn allele_guidelines_url(base_url: &str) -> String {
    format!("{}{}", base_url, ALLELE_GUIDELINES_PATH)
}

/// Validates that a URL can seed a crawl
///
/// The URL must parse, use HTTP or HTTPS, and carry a `/gene/<id>` segment so
/// that a base URL can be derived from it.
pub fn validate_gene_url(raw: &str) -> UrlResult<Url> {
    let url = Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if derive_base_url(url.as_str()).is_none() {
        return Err(UrlError::MissingGeneSegment(raw.to_string()));
    }

    Ok(url)
}
