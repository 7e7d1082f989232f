use chrono::{SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::cloudevent::EventContext;

/// `type` of every outcome envelope reported back to the engine.
pub const HISTORY_EVENT_TYPE: &str = "com.redhat.console.notifications.history";
/// CloudEvents version stamped on outcome envelopes.
pub const CE_SPEC_VERSION: &str = "1.0";

#[derive(Debug, Serialize)]
pub struct OutcomeDetails {
    /// The cleaned target URL, when one was known.
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub outcome: String,
}

#[derive(Debug, Serialize)]
pub struct OutcomeData {
    pub successful: bool,
    /// Milliseconds between intake and the outcome being built.
    pub duration: u64,
    pub details: OutcomeDetails,
}

/// The envelope reported back to the engine after a delivery attempt. `data`
/// goes over the wire as a JSON-encoded string, not an object: the engine's
/// history consumer expects the doubly-encoded form.
#[derive(Debug, Serialize)]
pub struct HistoryEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub specversion: &'static str,
    pub source: String,
    pub id: Option<String>,
    pub time: String,
    #[serde(serialize_with = "as_json_string")]
    pub data: OutcomeData,
}

fn as_json_string<S>(data: &OutcomeData, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let text = serde_json::to_string(data).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&text)
}

/// Builds the outcome envelope for an event and scrubs the promoted `Ce-`
/// headers from its context, so none of them travel back to the engine.
pub fn encode(
    context: &mut EventContext,
    source: &str,
    successful: bool,
    outcome: String,
) -> HistoryEvent {
    let details = OutcomeDetails {
        target: context.target_url.clone(),
        kind: context.event_type().map(str::to_owned),
        outcome,
    };

    let event = HistoryEvent {
        kind: HISTORY_EVENT_TYPE,
        specversion: CE_SPEC_VERSION,
        source: source.to_owned(),
        id: context.event_id().map(str::to_owned),
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        data: OutcomeData {
            successful,
            duration: context.received_at.elapsed().as_millis() as u64,
            details,
        },
    };

    context.remove_ce_headers();

    event
}
