// Error taxonomy for the bulk adder. API and build errors are per-call and
// per-row; selection errors are always fatal before any survey is built.

use std::fmt;
use thiserror::Error;

/// Failure of a single API call after the retry policy has run its course.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API call still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("API call encountered error:\n{status}: {body}")]
    Status { status: u16, body: String },

    #[error("API response was not valid JSON: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("API request could not be sent: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// 401/403: the token or the browser session has expired, so every
    /// following call will fail the same way.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}

/// Template search and menu selection failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No surveys found, check query string.")]
    NoResults,

    #[error(
        "Too many surveys returned ({total} > {limit}), \
         raise search.per_page in config or use a better query"
    )]
    TooManyResults { total: u64, limit: u32 },

    #[error("Invalid menu selection '{input}', expected a number from 1 to {max}")]
    InvalidSelection { input: String, max: usize },
}

/// The step of the per-row build sequence an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Clone,
    FetchPages,
    PatchPage,
    CreateCollector,
    SetSlug,
    SetMetadata,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Clone => "clone template",
            Step::FetchPages => "fetch pages",
            Step::PatchPage => "patch page description",
            Step::CreateCollector => "create collector",
            Step::SetSlug => "set collector slug",
            Step::SetMetadata => "set link preview metadata",
        };
        f.write_str(name)
    }
}

/// Failure while building one survey from one roster row.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{step} failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: ApiError,
    },

    #[error("{step} returned an unexpected body: {source}")]
    Shape {
        step: Step,
        #[source]
        source: serde_json::Error,
    },

    #[error("survey {survey_id} has no pages")]
    NoPages { survey_id: String },

    #[error("collector id '{id}' is not numeric")]
    InvalidCollectorId { id: String },
}

impl BuildError {
    pub fn is_auth(&self) -> bool {
        matches!(self, BuildError::Step { source, .. } if source.is_auth())
    }
}

/// A row that failed, with the id of the survey it left behind when the
/// failure came after the clone.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RowError {
    pub survey_id: Option<String>,
    pub error: BuildError,
}

impl RowError {
    pub fn before_clone(error: BuildError) -> Self {
        RowError { survey_id: None, error }
    }

    pub fn after_clone(survey_id: &str, error: BuildError) -> Self {
        RowError { survey_id: Some(survey_id.to_string()), error }
    }

    pub fn is_auth(&self) -> bool {
        self.error.is_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_carries_code_and_body() {
        let err = ApiError::Status { status: 400, body: "{\"error\":\"bad\"}".into() };
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("{\"error\":\"bad\"}"));
    }

    #[test]
    fn auth_statuses_are_flagged() {
        assert!(ApiError::Status { status: 401, body: String::new() }.is_auth());
        assert!(ApiError::Status { status: 403, body: String::new() }.is_auth());
        assert!(!ApiError::Status { status: 404, body: String::new() }.is_auth());
        assert!(!ApiError::RateLimited { attempts: 3 }.is_auth());

        let build = BuildError::Step {
            step: Step::SetSlug,
            source: ApiError::Status { status: 401, body: String::new() },
        };
        assert!(build.is_auth());
        assert!(build.to_string().starts_with("set collector slug failed"));

        let row = RowError::after_clone("S1", build);
        assert!(row.is_auth());
        assert_eq!(row.survey_id.as_deref(), Some("S1"));
        assert!(row.to_string().starts_with("set collector slug failed"));
    }
}
