use indexmap::IndexMap;

use super::{DEFAULT_SURVEY_TYPE, RequestContext, TrackParams, Tracker};
use crate::errors::Result;
use crate::payload::{AnalyticsEvent, ProfileUpdate, Properties, PropValue};

const DEFAULT_PAGE: &str = "photo_gallery";

/// `/track/social` — social-share button clicks.
///
/// Only `platform` is required; the email is optional, so the profile
/// update is skipped for anonymous clicks.
pub struct SocialTracker;

impl Tracker for SocialTracker {
    fn event_name(&self) -> &'static str {
        "Share Completed"
    }

    fn response_message(&self) -> &'static str {
        "Social click data processed"
    }

    fn build_event(&self, params: &TrackParams, ctx: &RequestContext) -> Result<AnalyticsEvent> {
        let platform = params.required("platform")?;

        let mut properties = Properties::new();
        properties.insert("platform".to_string(), platform.into());
        properties.insert("button_id".to_string(), params.get("button_id").into());
        properties.insert(
            "page".to_string(),
            params.optional_or("page", DEFAULT_PAGE).into(),
        );
        properties.insert(
            "survey_type".to_string(),
            params
                .optional_or("survey_type", DEFAULT_SURVEY_TYPE)
                .into(),
        );
        properties.insert("timestamp".to_string(), ctx.timestamp.clone().into());
        if let Some(email_domain) = params.get("email_domain") {
            properties.insert("email_domain".to_string(), email_domain.into());
        }

        Ok(AnalyticsEvent::new(self.event_name(), properties))
    }

    fn profile_update(&self, params: &TrackParams, ctx: &RequestContext) -> Option<ProfileUpdate> {
        let email_domain = params.get("email_domain")?;
        let platform = params.get("platform")?;
        let platform_counter = format!("{platform}_clicks");

        let mut set = Properties::new();
        set.insert("$email".to_string(), email_domain.into());
        set.insert("$last_seen".to_string(), ctx.timestamp.clone().into());
        set.insert(platform_counter.clone(), PropValue::Int(1));
        set.insert("total_social_clicks".to_string(), PropValue::Int(1));

        let mut add = IndexMap::new();
        add.insert(platform_counter, 1);
        add.insert("total_social_clicks".to_string(), 1);

        Some(ProfileUpdate {
            distinct_id: email_domain.to_string(),
            set,
            add,
        })
    }
}
