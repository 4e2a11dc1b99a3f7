use crate::config::types::Config;
use crate::ConfigError;
use url::Url;

/// The resolved crawl target: a URL plus the slug that names its artifact directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: Url,
    pub slug: String,
}

impl Config {
    /// Resolves the crawl target, preferring command-line values over the config file
    ///
    /// When no slug is given anywhere it is derived from the URL host.
    pub fn resolve_target(
        &self,
        url_override: Option<&str>,
        slug_override: Option<&str>,
    ) -> Result<Target, ConfigError> {
        let raw_url = url_override
            .or(self.target.url.as_deref())
            .ok_or_else(|| {
                ConfigError::Validation(
                    "no target URL: set [target] url or pass --url".to_string(),
                )
            })?;

        let url = Url::parse(raw_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", raw_url, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Target URL '{}' must use http or https",
                raw_url
            )));
        }

        let slug = match slug_override.or(self.target.slug.as_deref()) {
            Some(slug) => slug.to_string(),
            None => derive_slug(&url)?,
        };
        validate_slug(&slug)?;

        Ok(Target { url, slug })
    }
}

/// Derives a slug from the URL host: lowercase, `www.` stripped, dots replaced by hyphens
pub fn derive_slug(url: &Url) -> Result<String, ConfigError> {
    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUrl(format!("URL '{}' has no host", url)))?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    Ok(host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect())
}

/// Slugs name directories, so they are restricted to `[a-z0-9][a-z0-9_-]*`
pub fn validate_slug(slug: &str) -> Result<(), ConfigError> {
    let mut chars = slug.chars();
    let valid_first = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if valid_first && valid_rest {
        Ok(())
    } else {
        Err(ConfigError::InvalidSlug(format!(
            "'{}' must match [a-z0-9][a-z0-9_-]*",
            slug
        )))
    }
}
