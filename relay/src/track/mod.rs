//! Tracking endpoint kinds and their orchestration.
//!
//! Each kind validates its own query parameters, shapes the analytics
//! event, and derives the optional profile mutation. The orchestration
//! is shared: validate, forward the event, and only when the vendor
//! accepted it apply the profile update for identified callers.

mod pageview;
mod social;
mod survey;

pub use pageview::PageviewTracker;
pub use social::SocialTracker;
pub use survey::SurveyTracker;

use serde::Serialize;
use std::collections::HashMap;

use crate::client::AnalyticsSink;
use crate::errors::{RelayError, Result};
use crate::payload::{AnalyticsEvent, ProfileUpdate};

/// Query parameters of one tracking call.
///
/// Empty values count as absent, matching how browser pixels serialize
/// unset fields.
#[derive(Debug, Default)]
pub struct TrackParams(HashMap<String, String>);

impl TrackParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| RelayError::MissingParameter(name.to_string()))
    }

    pub fn optional_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }
}

impl FromIterator<(String, String)> for TrackParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        TrackParams(iter.into_iter().collect())
    }
}

/// Request-scoped context captured by the HTTP layer.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub user_agent: String,
    pub remote_addr: String,
    /// ISO-8601 timestamp taken when the request arrived.
    pub timestamp: String,
}

/// Outcome returned to the original caller.
///
/// Reflects only the primary event send; the profile update never shows
/// up here.
#[derive(Debug, Serialize)]
pub struct RelayResult {
    pub success: bool,
    pub message: &'static str,
    pub event: &'static str,
}

/// One tracking endpoint kind.
pub trait Tracker: Send + Sync {
    fn event_name(&self) -> &'static str;

    fn response_message(&self) -> &'static str;

    /// Validate the parameters and assemble the event properties.
    /// Missing or malformed required fields surface as client errors.
    fn build_event(&self, params: &TrackParams, ctx: &RequestContext) -> Result<AnalyticsEvent>;

    /// Profile mutation to apply once the event is accepted. `None`
    /// when the request carries no identifying field.
    fn profile_update(&self, params: &TrackParams, ctx: &RequestContext) -> Option<ProfileUpdate>;
}

/// Validate, forward, and on success apply the profile update.
pub async fn handle_track<S: AnalyticsSink + ?Sized>(
    tracker: &dyn Tracker,
    sink: &S,
    params: &TrackParams,
    ctx: &RequestContext,
) -> Result<RelayResult> {
    let event = tracker.build_event(params, ctx)?;
    let success = sink.send_event(event).await;

    if success {
        if let Some(update) = tracker.profile_update(params, ctx) {
            // Best effort. The sink logs and counts its own failures;
            // the caller's result is already decided.
            sink.send_profile_update(update).await;
        }
    }

    Ok(RelayResult {
        success,
        message: tracker.response_message(),
        event: tracker.event_name(),
    })
}

pub(crate) const DEFAULT_SURVEY_TYPE: &str = "cadillac_brand_perception";
