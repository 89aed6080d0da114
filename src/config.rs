// Config loader: reads the YAML file holding the API token, the browser
// session used for the private endpoints, and the optional build constants.

use crate::retry::RetryConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top level of `config.yml`. Only `surveymonkey` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub surveymonkey: Credentials,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub collector: CollectorOptions,
    #[serde(default)]
    pub link_preview: LinkPreview,
    #[serde(default)]
    pub search: SearchOptions,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Public API token plus the cookie/referer pair scraped from a logged-in
/// browser session, needed by the private admin endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub auth_token: String,
    pub admin_ui_cookie: String,
    pub admin_ui_referer: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub api_url: String,
    pub link_url: String,
    pub collector_options_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_url: "https://api.surveymonkey.com/v3/surveys".into(),
            link_url: "https://www.surveymonkey.com/collect/update_link".into(),
            collector_options_url: "https://www.surveymonkey.com/collect/update_collector_options"
                .into(),
        }
    }
}

/// Fixed options for every created web-link collector.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorOptions {
    pub thank_you_message: String,
    pub disqualification_url: String,
    pub redirect_url: String,
    pub redirect_type: String,
    pub domain: String,
    pub domain_type: String,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            thank_you_message: "Thank you for voting!\n- Your Tech Team".into(),
            disqualification_url: "http://www.somecompany.com/".into(),
            redirect_url: "http://www.somecompany.com/".into(),
            redirect_type: "url".into(),
            domain: "www.surveymonkey.com".into(),
            domain_type: "surveymonkey".into(),
        }
    }
}

/// Social card shown when a collector link is shared.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkPreview {
    pub description: String,
    pub image_url: String,
}

impl Default for LinkPreview {
    fn default() -> Self {
        Self {
            description:
                "Please take this survey about the Company 2021 session you recently attended."
                    .into(),
            image_url: "https://www.yourserver.com/thumbnail.png".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchOptions {
    /// Largest result count the selector accepts; searches are never paginated.
    pub per_page: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { per_page: 10 }
    }
}

impl Settings {
    /// `~/Personal-Local/config.yml`, falling back to the current directory
    /// when no home directory is known.
    pub fn default_path() -> PathBuf {
        let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.join("Personal-Local").join("config.yml")
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(text).context("Parsing config yaml")?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        log::debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }
}
