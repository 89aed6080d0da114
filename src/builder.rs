// Survey builder: turns one roster row into a cloned survey with a branded
// collector link. Every row runs the same six calls in order; rows are
// independent of each other.

use crate::api::{ApiClient, Endpoint, Method, Payload, Transport};
use crate::config::{CollectorOptions, LinkPreview, Settings};
use crate::error::{BuildError, RowError, Step};
use crate::roster::{BuiltSurvey, ResultWriter, RosterRow, RowOutcome};
use anyhow::Result;
use log::{error, info, warn};
use serde::de::{DeserializeOwned, Error as _, IgnoredAny};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::io::Write;

/// Page description prefix, matching the roster's presenter column.
const PRESENTER_LABEL: &str = "Presented By";

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct PageList {
    data: Vec<Created>,
}

// Ids come back as strings from the v3 API, but accept numbers too.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected an id, got {}", other))),
    }
}

/// Summary of a batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub built: usize,
    pub failed: usize,
    /// Set when an authorization failure stopped the batch early.
    pub aborted: Option<String>,
}

pub struct SurveyBuilder<'a, T: Transport> {
    api: &'a ApiClient<T>,
    surveys: Endpoint,
    link: Endpoint,
    collector_options: Endpoint,
    collector: &'a CollectorOptions,
    preview: &'a LinkPreview,
    template_id: String,
}

impl<'a, T: Transport> SurveyBuilder<'a, T> {
    pub fn new(
        api: &'a ApiClient<T>,
        settings: &'a Settings,
        template_id: impl Into<String>,
    ) -> Self {
        SurveyBuilder {
            api,
            surveys: Endpoint::public(settings.endpoints.api_url.as_str()),
            link: Endpoint::private(settings.endpoints.link_url.as_str()),
            collector_options: Endpoint::private(settings.endpoints.collector_options_url.as_str()),
            collector: &settings.collector,
            preview: &settings.link_preview,
            template_id: template_id.into(),
        }
    }

    fn step<D: DeserializeOwned>(
        &self,
        step: Step,
        endpoint: &Endpoint,
        method: Method,
        payload: Payload,
    ) -> Result<D, BuildError> {
        let value = self
            .api
            .call(endpoint, method, payload)
            .map_err(|source| BuildError::Step { step, source })?;
        serde_json::from_value(value).map_err(|source| BuildError::Shape { step, source })
    }

    /// Clone the template for `row`, label its first page, and publish a
    /// collector under the row's slug with link-preview metadata. Failures
    /// after the clone carry the new survey's id.
    pub fn build_survey(&self, row: &RosterRow) -> Result<BuiltSurvey, RowError> {
        let survey: Created = self
            .step(
                Step::Clone,
                &self.surveys,
                Method::POST,
                Payload::Json(json!({ "title": row.title, "from_survey_id": self.template_id })),
            )
            .map_err(RowError::before_clone)?;

        self.finish_survey(row, &survey.id)
            .map_err(|error| RowError::after_clone(&survey.id, error))?;

        Ok(BuiltSurvey {
            title: row.title.clone(),
            presenter: row.presenter.clone(),
            slug: row.slug.clone(),
            id: survey.id,
        })
    }

    fn finish_survey(&self, row: &RosterRow, survey_id: &str) -> Result<(), BuildError> {
        let survey_path = format!("/{}", survey_id);

        // only the first page is labelled
        let pages: PageList = self.step(
            Step::FetchPages,
            &self.surveys.join(&format!("{}/pages", survey_path)),
            Method::GET,
            Payload::Empty,
        )?;
        let first_page = pages
            .data
            .first()
            .ok_or_else(|| BuildError::NoPages { survey_id: survey_id.to_string() })?;

        let description = format!("{} - {}", PRESENTER_LABEL, row.presenter);
        self.step::<IgnoredAny>(
            Step::PatchPage,
            &self.surveys.join(&format!("{}/pages/{}", survey_path, first_page.id)),
            Method::PATCH,
            Payload::Json(json!({ "description": description })),
        )?;

        let collector: Created = self.step(
            Step::CreateCollector,
            &self.surveys.join(&format!("{}/collectors", survey_path)),
            Method::POST,
            Payload::Json(json!({
                "type": "weblink",
                "thank_you_message": self.collector.thank_you_message,
                "disqualification_url": self.collector.disqualification_url,
                "redirect_url": self.collector.redirect_url,
                "redirect_type": self.collector.redirect_type,
                "name": row.slug,
            })),
        )?;
        let collector_num: i64 = collector
            .id
            .parse()
            .map_err(|_| BuildError::InvalidCollectorId { id: collector.id.clone() })?;

        self.step::<IgnoredAny>(
            Step::SetSlug,
            &self.link,
            Method::POST,
            Payload::Form(vec![
                ("collector_id".into(), collector.id.clone()),
                ("slug".into(), row.slug.clone()),
                ("type".into(), "weblink".into()),
                ("domain".into(), self.collector.domain.clone()),
                ("domain_type".into(), self.collector.domain_type.clone()),
            ]),
        )?;

        self.step::<IgnoredAny>(
            Step::SetMetadata,
            &self.collector_options,
            Method::POST,
            Payload::Json(json!({
                "collector_id": collector_num,
                "custom_meta_info": {
                    "title": row.title,
                    "description": self.preview.description,
                    "image_url": self.preview.image_url,
                },
            })),
        )?;
        Ok(())
    }

    /// Build every row, writing each outcome as soon as it is known. A failed
    /// row does not stop the batch; a 401/403 does.
    pub fn build_all<W, F>(
        &self,
        rows: &[RosterRow],
        writer: &mut ResultWriter<W>,
        mut progress: F,
    ) -> Result<BuildReport>
    where
        W: Write,
        F: FnMut(usize, usize, &RosterRow),
    {
        let total = rows.len();
        let mut report = BuildReport::default();

        for (index, row) in rows.iter().enumerate() {
            progress(index + 1, total, row);

            match self.build_survey(row) {
                Ok(survey) => {
                    info!("built survey {} for '{}' ({})", survey.id, survey.title, survey.slug);
                    writer.record(&RowOutcome::Built(survey))?;
                    report.built += 1;
                }
                Err(err) => {
                    let message = err.to_string().replace('\n', " ");
                    warn!("row {} '{}' failed: {}", index + 1, row.title, message);
                    if let Some(id) = &err.survey_id {
                        warn!("survey {} was created for '{}' but is incomplete", id, row.title);
                    }
                    writer.record(&RowOutcome::Failed {
                        row: row.clone(),
                        survey_id: err.survey_id.clone(),
                        error: message.clone(),
                    })?;
                    report.failed += 1;

                    if err.is_auth() {
                        error!(
                            "authorization refused, stopping after row {} of {}",
                            index + 1,
                            total
                        );
                        let reason = format!("row {} '{}': {}", index + 1, row.title, message);
                        report.aborted = Some(reason);
                        break;
                    }
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{client, ScriptedTransport};
    use crate::api::Surface;
    use crate::error::ApiError;

    fn settings() -> Settings {
        Settings::from_yaml(
            "surveymonkey:\n  auth_token: t\n  admin_ui_cookie: c\n  admin_ui_referer: r\n\
             endpoints:\n  api_url: https://api.test/v3/surveys\n  link_url: https://www.test/collect/update_link\n  \
             collector_options_url: https://www.test/collect/update_collector_options\n",
        )
        .unwrap()
    }

    fn keynote() -> RosterRow {
        RosterRow {
            title: "Keynote".into(),
            presenter: "J. Smith".into(),
            slug: "keynote2021".into(),
        }
    }

    fn script_success(t: &ScriptedTransport, survey_id: &str, collector_id: &str) {
        t.push(201, json!({"id": survey_id, "title": "Keynote"}))
            .push(200, json!({"data": [{"id": "P1"}, {"id": "P2"}], "total": 2}))
            .push(200, json!({"id": "P1", "description": "Presented By - J. Smith"}))
            .push(201, json!({"id": collector_id, "type": "weblink"}))
            .push(200, json!({"status": "ok"}))
            .push(200, json!({"status": "ok"}));
    }

    #[test]
    fn clone_payload_uses_row_title_and_template() {
        let settings = settings();
        let api = client(1);
        script_success(api.transport(), "S1", "900");

        let built = SurveyBuilder::new(&api, &settings, "T1").build_survey(&keynote()).unwrap();
        assert_eq!(
            built,
            BuiltSurvey {
                title: "Keynote".into(),
                presenter: "J. Smith".into(),
                slug: "keynote2021".into(),
                id: "S1".into(),
            }
        );

        let requests = api.transport().requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].endpoint.url, "https://api.test/v3/surveys");
        assert_eq!(
            requests[0].payload,
            Payload::Json(json!({"title": "Keynote", "from_survey_id": "T1"}))
        );
    }

    #[test]
    fn runs_the_six_steps_in_order() {
        let settings = settings();
        let api = client(1);
        script_success(api.transport(), "S1", "900");

        SurveyBuilder::new(&api, &settings, "T1").build_survey(&keynote()).unwrap();
        let requests = api.transport().requests();
        assert_eq!(requests.len(), 6);

        assert_eq!(requests[1].method, Method::GET);
        assert_eq!(requests[1].endpoint.url, "https://api.test/v3/surveys/S1/pages");

        assert_eq!(requests[2].method, Method::PATCH);
        assert_eq!(requests[2].endpoint.url, "https://api.test/v3/surveys/S1/pages/P1");
        assert_eq!(
            requests[2].payload,
            Payload::Json(json!({"description": "Presented By - J. Smith"}))
        );

        assert_eq!(requests[3].endpoint.url, "https://api.test/v3/surveys/S1/collectors");
        match &requests[3].payload {
            Payload::Json(body) => {
                assert_eq!(body["type"], "weblink");
                assert_eq!(body["name"], "keynote2021");
                assert_eq!(body["redirect_type"], "url");
            }
            other => panic!("unexpected payload {other:?}"),
        }

        assert_eq!(requests[4].endpoint, Endpoint::private("https://www.test/collect/update_link"));
        assert_eq!(
            requests[4].payload,
            Payload::Form(vec![
                ("collector_id".into(), "900".into()),
                ("slug".into(), "keynote2021".into()),
                ("type".into(), "weblink".into()),
                ("domain".into(), "www.surveymonkey.com".into()),
                ("domain_type".into(), "surveymonkey".into()),
            ])
        );

        assert_eq!(requests[5].endpoint.surface, Surface::Private);
        assert_eq!(
            requests[5].endpoint.url,
            "https://www.test/collect/update_collector_options"
        );
        match &requests[5].payload {
            Payload::Json(body) => {
                assert_eq!(body["collector_id"], 900);
                assert_eq!(body["custom_meta_info"]["title"], "Keynote");
                assert_eq!(
                    body["custom_meta_info"]["image_url"],
                    "https://www.yourserver.com/thumbnail.png"
                );
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn survey_without_pages_fails_the_row() {
        let settings = settings();
        let api = client(1);
        api.transport()
            .push(201, json!({"id": "S1"}))
            .push(200, json!({"data": []}));

        let err = SurveyBuilder::new(&api, &settings, "T1").build_survey(&keynote()).unwrap_err();
        assert_eq!(err.survey_id.as_deref(), Some("S1"));
        assert!(matches!(err.error, BuildError::NoPages { ref survey_id } if survey_id == "S1"));
    }

    #[test]
    fn api_failure_names_the_step() {
        let settings = settings();
        let api = client(1);
        api.transport()
            .push(201, json!({"id": "S1"}))
            .push(200, json!({"data": [{"id": "P1"}]}))
            .push(200, json!({}))
            .push_raw(400, "{\"error\":\"name taken\"}");

        let err = SurveyBuilder::new(&api, &settings, "T1").build_survey(&keynote()).unwrap_err();
        assert_eq!(err.survey_id.as_deref(), Some("S1"));
        match err.error {
            BuildError::Step { step, source: ApiError::Status { status, .. } } => {
                assert_eq!(step, Step::CreateCollector);
                assert_eq!(status, 400);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn clone_failure_has_no_survey_id() {
        let settings = settings();
        let api = client(1);
        api.transport().push_raw(404, "template not found");

        let err = SurveyBuilder::new(&api, &settings, "T1").build_survey(&keynote()).unwrap_err();
        assert_eq!(err.survey_id, None);
        assert!(matches!(err.error, BuildError::Step { step: Step::Clone, .. }));
    }

    #[test]
    fn taken_slug_keeps_created_survey_id_in_output() {
        let settings = settings();
        let api = client(1);
        api.transport()
            .push(201, json!({"id": "S77"}))
            .push(200, json!({"data": [{"id": "P1"}]}))
            .push(200, json!({}))
            .push(201, json!({"id": "900"}))
            .push_raw(400, "slug taken");

        let rows = vec![RosterRow {
            title: "Keynote".into(),
            presenter: "J".into(),
            slug: "keynote".into(),
        }];
        let mut writer = ResultWriter::new(Vec::new()).unwrap();
        let report = SurveyBuilder::new(&api, &settings, "T1")
            .build_all(&rows, &mut writer, |_, _, _| {})
            .unwrap();
        assert_eq!(report, BuildReport { built: 0, failed: 1, aborted: None });

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[1],
            "Keynote,J,keynote,S77,failed,set collector slug failed: API call encountered error: 400: slug taken"
        );
    }

    #[test]
    fn failed_row_does_not_stop_the_batch() {
        let settings = settings();
        let api = client(1);
        let t = api.transport();
        // row 1 fails at clone, row 2 succeeds
        t.push_raw(500, "oops");
        script_success(t, "S2", "901");

        let rows = vec![
            RosterRow { title: "Broken".into(), presenter: "X".into(), slug: "broken".into() },
            keynote(),
        ];
        let mut writer = ResultWriter::new(Vec::new()).unwrap();
        let mut seen = Vec::new();
        let report = SurveyBuilder::new(&api, &settings, "T1")
            .build_all(&rows, &mut writer, |n, total, row| seen.push((n, total, row.slug.clone())))
            .unwrap();

        assert_eq!(report, BuildReport { built: 1, failed: 1, aborted: None });
        assert_eq!(seen, vec![(1, 2, "broken".to_string()), (2, 2, "keynote2021".to_string())]);

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Broken,X,broken,,failed,clone template failed"));
        assert_eq!(lines[2], "Keynote,J. Smith,keynote2021,S2,built,");
    }

    #[test]
    fn auth_failure_aborts_but_keeps_finished_rows() {
        let settings = settings();
        let api = client(1);
        let t = api.transport();
        script_success(t, "S1", "900");
        t.push(201, json!({"id": "S2"}))
            .push(200, json!({"data": [{"id": "P1"}]}))
            .push(200, json!({}))
            .push(201, json!({"id": "901"}))
            .push_raw(401, "session expired");

        let rows = vec![
            keynote(),
            RosterRow { title: "Panel".into(), presenter: "B".into(), slug: "panel".into() },
            RosterRow { title: "Closing".into(), presenter: "C".into(), slug: "closing".into() },
        ];
        let mut writer = ResultWriter::new(Vec::new()).unwrap();
        let report = SurveyBuilder::new(&api, &settings, "T1")
            .build_all(&rows, &mut writer, |_, _, _| {})
            .unwrap();

        assert_eq!(report.built, 1);
        assert_eq!(report.failed, 1);
        assert!(report.aborted.as_deref().unwrap_or_default().contains("Panel"));
        assert_eq!(writer.written(), 2);
        // nothing was sent for the third row
        assert_eq!(api.transport().requests().len(), 11);
    }
}
