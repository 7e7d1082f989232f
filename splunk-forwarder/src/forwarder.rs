use std::collections::HashMap;

use common_kafka::kafka_producer::{send_json_to_kafka, KafkaProduceError};
use tracing::{debug, error, info};

use crate::app_context::AppContext;
use crate::cloudevent::{decode, EventContext};
use crate::error::{DeliveryError, EventError};
use crate::hec::clean_target_url;
use crate::metrics_consts::{
    DECODE_FAILURES, DELIVERIES, DELIVERY_TIME, EMPTY_EVENT_BATCHES, EVENTS_PER_ENVELOPE,
    SKIPPED_EVENT_TYPES,
};
use crate::outcome::{encode, HistoryEvent};
use crate::splitter::{split, SplitOutcome};

/// Kafka header the eventing engine stamps on records meant for the
/// next-generation connector. Those are not ours to touch.
pub const PROCESSOR_HEADER: &str = "kafkaProcessor";
const PROCESSOR_CONNECTOR: &str = "connector";

/// True when the engine marked this record for the connector processor.
pub fn claimed_by_connector(headers: &HashMap<String, String>) -> bool {
    headers.get(PROCESSOR_HEADER).map(String::as_str) == Some(PROCESSOR_CONNECTOR)
}

/// What handling one message amounted to.
#[derive(Debug)]
pub enum Disposition {
    /// Not ours: a foreign event type.
    Skipped,
    /// A present-but-empty events array: nothing delivered, nothing reported.
    NoEvents,
    /// Fatal envelope problem: nothing delivered, nothing reported.
    Rejected(EventError),
    /// The pipeline ran to the end; the outcome envelope says whether the
    /// delivery itself succeeded.
    Completed(HistoryEvent),
}

/// Runs one raw message through the whole pipeline: decode, type check, URL
/// cleanup, split, delivery, outcome. `accepted_type` is only enforced when
/// given; the internal test endpoint forwards whatever it is handed.
pub async fn process_event(
    app: &AppContext,
    payload: &[u8],
    accepted_type: Option<&str>,
) -> Disposition {
    let (mut event, action) = match decode(payload) {
        Ok(parts) => parts,
        Err(err) => {
            metrics::counter!(DECODE_FAILURES).increment(1);
            return Disposition::Rejected(err);
        }
    };

    if let Some(accepted) = accepted_type {
        if event.event_type() != Some(accepted) {
            debug!("Ignoring event of type {:?}", event.event_type());
            metrics::counter!(SKIPPED_EVENT_TYPES).increment(1);
            return Disposition::Skipped;
        }
    }

    // Normalized once, here, so delivery and the outcome report agree on the
    // target
    event.target_url = event
        .metadata
        .url
        .as_deref()
        .map(|url| clean_target_url(url).to_owned());

    let outcome = split(action);
    if let SplitOutcome::Wrapped(wrapped) = &outcome {
        if wrapped.is_empty() {
            debug!(
                "Event {} has an empty events array, nothing to deliver",
                event.event_id().unwrap_or("-")
            );
            metrics::counter!(EMPTY_EVENT_BATCHES).increment(1);
            return Disposition::NoEvents;
        }
    }
    metrics::histogram!(EVENTS_PER_ENVELOPE).record(outcome.event_count() as f64);

    let (successful, outcome_text) = match deliver(app, &event, outcome).await {
        Ok(()) => {
            info!(
                "Delivered event {} (orgId {} account {}) to {}",
                event.event_id().unwrap_or("-"),
                event.org_id.as_deref().unwrap_or("-"),
                event.account_id.as_deref().unwrap_or("-"),
                event.target_url.as_deref().unwrap_or("-"),
            );
            metrics::counter!(DELIVERIES, &[("outcome", "success")]).increment(1);
            (
                true,
                format!("Event {} sent successfully", event.event_id().unwrap_or("-")),
            )
        }
        Err(err) => {
            error!(
                "Delivery of event {} (orgId {} account {}) to {} failed: {}",
                event.event_id().unwrap_or("-"),
                event.org_id.as_deref().unwrap_or("-"),
                event.account_id.as_deref().unwrap_or("-"),
                event.target_url.as_deref().unwrap_or("-"),
                err
            );
            metrics::counter!(DELIVERIES, &[("outcome", "failure")]).increment(1);
            (false, err.to_string())
        }
    };

    let history = encode(
        &mut event,
        &app.config.component_name,
        successful,
        outcome_text,
    );
    Disposition::Completed(history)
}

async fn deliver(
    app: &AppContext,
    event: &EventContext,
    outcome: SplitOutcome,
) -> Result<(), DeliveryError> {
    let target = event.target_url.as_deref().ok_or(DeliveryError::MissingUrl)?;

    // Empty batches were intercepted before delivery
    let Some(body) = outcome.into_body()? else {
        return Ok(());
    };

    let timing = common_metrics::timing_guard(DELIVERY_TIME, &[]);
    let result = app
        .hec
        .deliver(
            target,
            event.metadata.token.as_deref(),
            event.metadata.trust_all,
            body,
        )
        .await;
    timing
        .label(
            "outcome",
            if result.is_ok() { "success" } else { "failure" },
        )
        .fin();
    result
}

/// Reports an outcome envelope on the return topic.
pub async fn report_outcome(
    app: &AppContext,
    history: &HistoryEvent,
) -> Result<(), KafkaProduceError> {
    send_json_to_kafka(
        &app.kafka_producer,
        &app.config.return_topic,
        None,
        history,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_marked_records_are_recognized() {
        let mut headers = HashMap::new();
        assert!(!claimed_by_connector(&headers));

        headers.insert(PROCESSOR_HEADER.to_string(), "camel".to_string());
        assert!(!claimed_by_connector(&headers));

        headers.insert(PROCESSOR_HEADER.to_string(), "connector".to_string());
        assert!(claimed_by_connector(&headers));
    }
}
