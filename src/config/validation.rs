use crate::config::types::{
    Config, CrawlerConfig, GovernorConfig, OutputConfig, PipelineConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_governor_config(&config.governor)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_endpoint("search endpoint", &config.search.endpoint)?;
    validate_endpoint("verifier endpoint", &config.verifier.endpoint)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_depth < 1 {
        return Err(ConfigError::Validation(
            "max_depth must be >= 1 (the seed is depth 1)".to_string(),
        ));
    }

    if config.page_timeout == 0 {
        return Err(ConfigError::Validation(
            "page_timeout must be >= 1 second".to_string(),
        ));
    }

    if config.robots_timeout == 0 {
        return Err(ConfigError::Validation(
            "robots_timeout must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // The name doubles as the robots.txt product token, so keep it to [A-Za-z0-9-]
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates quota and rate limits
fn validate_governor_config(config: &GovernorConfig) -> Result<(), ConfigError> {
    if config.daily_limit == 0 {
        return Err(ConfigError::Validation(
            "daily_limit must be >= 1".to_string(),
        ));
    }

    if config.rate_limit_per_second == 0 || config.rate_limit_per_minute == 0 {
        return Err(ConfigError::Validation(
            "rate limits must be >= 1".to_string(),
        ));
    }

    if config.rate_limit_per_second > config.rate_limit_per_minute {
        return Err(ConfigError::Validation(format!(
            "rate_limit_per_second ({}) cannot exceed rate_limit_per_minute ({})",
            config.rate_limit_per_second, config.rate_limit_per_minute
        )));
    }

    if config.warning_threshold == 0 || config.warning_threshold > 100 {
        return Err(ConfigError::Validation(format!(
            "warning_threshold must be between 1 and 100, got {}",
            config.warning_threshold
        )));
    }

    Ok(())
}

/// Validates the verification run settings
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.max_queries == 0 || config.results_per_query == 0 {
        return Err(ConfigError::Validation(
            "max_queries and results_per_query must be >= 1".to_string(),
        ));
    }

    if config.unit_timeout == 0 {
        return Err(ConfigError::Validation(
            "unit_timeout must be >= 1 second".to_string(),
        ));
    }

    if config.poll_interval == 0 {
        return Err(ConfigError::Validation(
            "poll_interval must be >= 1ms".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.score_threshold) {
        return Err(ConfigError::Validation(format!(
            "score_threshold must be within [0, 1], got {}",
            config.score_threshold
        )));
    }

    if config.max_concurrent_units < 1 || config.max_concurrent_units > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_units must be between 1 and 32, got {}",
            config.max_concurrent_units
        )));
    }

    Ok(())
}

fn validate_endpoint(name: &str, endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, endpoint, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name,
            url.scheme()
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, path) in [
        ("database_path", &config.database_path),
        ("report_path", &config.report_path),
        ("summary_path", &config.summary_path),
    ] {
        if path.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
