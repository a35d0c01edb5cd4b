use indexmap::IndexMap;

use super::{DEFAULT_SURVEY_TYPE, RequestContext, TrackParams, Tracker};
use crate::errors::Result;
use crate::payload::{AnalyticsEvent, ProfileUpdate, Properties, PropValue};

/// `/track/pageview` — page view pixels.
///
/// The screen and viewport dimensions are mirrored into the event as
/// opaque strings; the relay never interprets them.
pub struct PageviewTracker;

const DIMENSION_FIELDS: [&str; 4] = [
    "screen_width",
    "screen_height",
    "viewport_width",
    "viewport_height",
];

impl Tracker for PageviewTracker {
    fn event_name(&self) -> &'static str {
        "Page View"
    }

    fn response_message(&self) -> &'static str {
        "Page view data processed"
    }

    fn build_event(&self, params: &TrackParams, ctx: &RequestContext) -> Result<AnalyticsEvent> {
        let page = params.required("page")?;
        let email_domain = params.get("email_domain");

        let mut properties = Properties::new();
        properties.insert("page".to_string(), page.into());
        properties.insert(
            "survey_type".to_string(),
            params
                .optional_or("survey_type", DEFAULT_SURVEY_TYPE)
                .into(),
        );
        properties.insert("page_type".to_string(), page.into());
        properties.insert("user_agent".to_string(), ctx.user_agent.clone().into());
        for field in DIMENSION_FIELDS {
            properties.insert(field.to_string(), params.get(field).into());
        }
        properties.insert(
            "has_email".to_string(),
            if email_domain.is_some() { "yes" } else { "no" }.into(),
        );
        properties.insert("ip_address".to_string(), ctx.remote_addr.clone().into());
        properties.insert("timestamp".to_string(), ctx.timestamp.clone().into());
        if let Some(email_domain) = email_domain {
            properties.insert("email_domain".to_string(), email_domain.into());
        }

        Ok(AnalyticsEvent::new(self.event_name(), properties))
    }

    fn profile_update(&self, params: &TrackParams, _ctx: &RequestContext) -> Option<ProfileUpdate> {
        let email_domain = params.get("email_domain")?;
        let page = params.get("page")?;
        let page_counter = format!("{page}_page_views");

        let mut set = Properties::new();
        set.insert("$email".to_string(), email_domain.into());
        set.insert(page_counter.clone(), PropValue::Int(1));
        set.insert("total_page_views".to_string(), PropValue::Int(1));

        let mut add = IndexMap::new();
        add.insert(page_counter, 1);
        add.insert("total_page_views".to_string(), 1);

        Some(ProfileUpdate {
            distinct_id: email_domain.to_string(),
            set,
            add,
        })
    }
}
