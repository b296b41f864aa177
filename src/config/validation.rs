use crate::config::types::{Config, CrawlerConfig, GeneEntry, OutputConfig, UserAgentConfig};
use crate::url::validate_gene_url;
use crate::ConfigError;
use std::collections::BTreeMap;
use url::Url;

/// Longest allowed pause between requests (one minute)
const MAX_REQUEST_INTERVAL_MS: u64 = 60_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_genes(&config.genes)?;
    validate_phenotype_exceptions(&config.phenotype_exceptions)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_genotype_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "max_genotype_requests must be >= 1, got {}",
            config.max_genotype_requests
        )));
    }

    if config.minimum_request_interval > MAX_REQUEST_INTERVAL_MS {
        return Err(ConfigError::Validation(format!(
            "minimum_request_interval must be <= {}ms, got {}ms",
            MAX_REQUEST_INTERVAL_MS, config.minimum_request_interval
        )));
    }

    if config.max_total_requests == Some(0) {
        return Err(ConfigError::Validation(
            "max_total_requests must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the identity sent in the User-Agent header
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    let name = &config.crawler_name;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "user-agent.crawler-name must be non-empty ASCII letters, digits or hyphens, got '{}'",
            name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent.crawler-version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("user-agent.contact-url '{}': {}", config.contact_url, e))
    })?;

    validate_email(&config.contact_email)
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if matches!(config.export_path.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "export_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates gene seed URLs
fn validate_genes(genes: &[GeneEntry]) -> Result<(), ConfigError> {
    for entry in genes {
        validate_gene_url(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid gene URL '{}': {}", entry.url, e))
        })?;
    }
    Ok(())
}

/// Validates the gene to alternate-label table
fn validate_phenotype_exceptions(exceptions: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for (gene, label) in exceptions {
        if gene.trim().is_empty() {
            return Err(ConfigError::Validation(
                "phenotype exception gene name cannot be empty".to_string(),
            ));
        }
        if label.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "phenotype exception label for '{}' cannot be empty",
                gene
            )));
        }
    }
    Ok(())
}

/// Checks that an address has the shape `local@domain.tld`
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "user-agent.contact-email is not an email address: '{}'",
            email
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@example.com").is_err());
        assert!(validate_email("user@.example.com").is_err());
    }

    #[test]
    fn test_validate_user_agent_config() {
        let mut config = UserAgentConfig {
            crawler_name: "Pharmgkb-Harvest".to_string(),
            crawler_version: "0.1".to_string(),
            contact_url: "https://example.org/about".to_string(),
            contact_email: "ops@example.org".to_string(),
        };
        assert!(validate_user_agent_config(&config).is_ok());

        config.crawler_name = "Harvest Bot".to_string();
        assert!(validate_user_agent_config(&config).is_err());

        config.crawler_name = "HarvestBot".to_string();
        config.contact_url = "not a url".to_string();
        assert!(matches!(
            validate_user_agent_config(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_crawler_config() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.max_genotype_requests = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.max_genotype_requests = 100;
        config.minimum_request_interval = 120_000;
        assert!(validate_crawler_config(&config).is_err());

        config.minimum_request_interval = 500;
        config.max_total_requests = Some(0);
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_validate_genes() {
        let good = vec![GeneEntry {
            url: "https://www.pharmgkb.org/gene/PA128".to_string(),
        }];
        assert!(validate_genes(&good).is_ok());

        let bad = vec![GeneEntry {
            url: "https://www.pharmgkb.org/drug/PA449053".to_string(),
        }];
        assert!(matches!(
            validate_genes(&bad),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_phenotype_exceptions() {
        let mut exceptions = BTreeMap::new();
        exceptions.insert("CYP2D6".to_string(), "Metabolizer Status".to_string());
        assert!(validate_phenotype_exceptions(&exceptions).is_ok());

        exceptions.insert("TPMT".to_string(), "  ".to_string());
        assert!(validate_phenotype_exceptions(&exceptions).is_err());
    }
}
