// Template selector: finds candidate template surveys by title and maps the
// user's menu choice back to a survey id.

use crate::api::{ApiClient, Endpoint, Method, Payload, Transport};
use crate::error::SelectionError;
use anyhow::Result;
use serde::Deserialize;

/// One entry of the survey list, as offered in the menu.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateCandidate {
    pub id: String,
    pub title: String,
}

/// `GET /surveys` response; other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyList {
    pub total: u64,
    #[serde(default)]
    pub data: Vec<TemplateCandidate>,
}

/// Check a search result against the page size. Searches are never
/// paginated, so a result larger than one page is refused.
pub fn check_results(
    list: SurveyList,
    per_page: u32,
) -> Result<Vec<TemplateCandidate>, SelectionError> {
    if list.total == 0 || list.data.is_empty() {
        return Err(SelectionError::NoResults);
    }
    if list.total > u64::from(per_page) {
        return Err(SelectionError::TooManyResults { total: list.total, limit: per_page });
    }
    Ok(list.data)
}

pub fn search_templates<T: Transport>(
    api: &ApiClient<T>,
    surveys: &Endpoint,
    query: &str,
    per_page: u32,
) -> Result<Vec<TemplateCandidate>> {
    let params = vec![
        ("title".to_string(), query.to_string()),
        ("per_page".to_string(), per_page.to_string()),
    ];
    let list: SurveyList = api.call_as(surveys, Method::GET, Payload::Query(params))?;
    log::debug!("search '{}' returned {} surveys", query, list.total);
    Ok(check_results(list, per_page)?)
}

/// `"1: Title"` lines, ordinals starting at one.
pub fn menu_lines(candidates: &[TemplateCandidate]) -> Vec<String> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}: {}", i + 1, c.title))
        .collect()
}

/// Resolve a typed ordinal to its candidate.
pub fn resolve_selection<'a>(
    candidates: &'a [TemplateCandidate],
    input: &str,
) -> Result<&'a TemplateCandidate, SelectionError> {
    let invalid = || SelectionError::InvalidSelection {
        input: input.trim().to_string(),
        max: candidates.len(),
    };
    let ordinal: usize = input.trim().parse().map_err(|_| invalid())?;
    if ordinal == 0 {
        return Err(invalid());
    }
    candidates.get(ordinal - 1).ok_or_else(invalid)
}
