// Library root
// -----------
// Bulk-creates SurveyMonkey surveys from a CSV roster by cloning a template
// survey. The binary (`main.rs`) parses flags and hands off to `ui::run`.
//
// Module responsibilities:
// - `config`: YAML config with credentials and build constants.
// - `roster`: reads the input CSV and writes the per-row result CSV.
// - `api`: the call primitive shared by the public and private endpoints.
// - `retry`: bounded backoff for rate-limited calls.
// - `selector`: template search and menu selection.
// - `builder`: the per-row clone/patch/collector sequence.
// - `ui`: prompts, progress and the overall run.
pub mod api;
pub mod builder;
pub mod config;
pub mod error;
pub mod retry;
pub mod roster;
pub mod selector;
pub mod ui;
