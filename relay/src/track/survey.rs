use indexmap::IndexMap;

use super::{DEFAULT_SURVEY_TYPE, RequestContext, TrackParams, Tracker};
use crate::errors::{RelayError, Result};
use crate::payload::{AnalyticsEvent, ProfileUpdate, Properties, PropValue};

const DEFAULT_QUESTION: &str = "Cadillac is a Brand for Me";

/// `/track/survey` — survey answer submissions.
///
/// Requires `answer` and `email_domain`; the email-like value doubles
/// as the profile distinct id, so survey events always identify the
/// caller.
pub struct SurveyTracker;

impl Tracker for SurveyTracker {
    fn event_name(&self) -> &'static str {
        "Survey Submitted"
    }

    fn response_message(&self) -> &'static str {
        "Survey data processed"
    }

    fn build_event(&self, params: &TrackParams, ctx: &RequestContext) -> Result<AnalyticsEvent> {
        let answer = params.required("answer")?;
        let email_domain = params.required("email_domain")?;

        let scale_position = match params.get("scale_position") {
            Some(raw) => {
                let parsed: i64 = raw.parse().map_err(|_| RelayError::InvalidParameter {
                    name: "scale_position".to_string(),
                    value: raw.to_string(),
                })?;
                PropValue::Int(parsed)
            }
            None => PropValue::Null,
        };

        let mut properties = Properties::new();
        properties.insert("answer".to_string(), answer.into());
        properties.insert(
            "answer_text".to_string(),
            params.get("answer_text").into(),
        );
        properties.insert("email_domain".to_string(), email_domain.into());
        properties.insert(
            "question".to_string(),
            params.optional_or("question", DEFAULT_QUESTION).into(),
        );
        properties.insert(
            "survey_type".to_string(),
            params
                .optional_or("survey_type", DEFAULT_SURVEY_TYPE)
                .into(),
        );
        properties.insert("scale_position".to_string(), scale_position);
        properties.insert("user_agent".to_string(), ctx.user_agent.clone().into());
        properties.insert("ip_address".to_string(), ctx.remote_addr.clone().into());
        properties.insert("timestamp".to_string(), ctx.timestamp.clone().into());

        Ok(AnalyticsEvent::new(self.event_name(), properties))
    }

    fn profile_update(&self, params: &TrackParams, _ctx: &RequestContext) -> Option<ProfileUpdate> {
        let email_domain = params.get("email_domain")?;
        let answer = params.get("answer")?;

        let mut set = Properties::new();
        set.insert("$email".to_string(), email_domain.into());
        set.insert("latest_survey_answer".to_string(), answer.into());
        set.insert(
            "latest_survey_answer_text".to_string(),
            params.get("answer_text").into(),
        );
        set.insert("survey_completion_count".to_string(), PropValue::Int(1));

        let mut add = IndexMap::new();
        add.insert("survey_completion_count".to_string(), 1);

        Some(ProfileUpdate {
            distinct_id: email_domain.to_string(),
            set,
            add,
        })
    }
}
