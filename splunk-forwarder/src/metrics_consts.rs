pub const MESSAGES_RECEIVED: &str = "splunk_fwd_messages_received";
pub const EMPTY_PAYLOADS: &str = "splunk_fwd_empty_payloads";
pub const DECODE_FAILURES: &str = "splunk_fwd_decode_failures";
pub const SKIPPED_CONNECTOR_MESSAGES: &str = "splunk_fwd_skipped_connector_messages";
pub const SKIPPED_EVENT_TYPES: &str = "splunk_fwd_skipped_event_types";
pub const EMPTY_EVENT_BATCHES: &str = "splunk_fwd_empty_event_batches";
pub const EVENTS_PER_ENVELOPE: &str = "splunk_fwd_events_per_envelope";
pub const DELIVERIES: &str = "splunk_fwd_deliveries";
pub const DELIVERY_TIME: &str = "splunk_fwd_delivery_time_ms";
pub const OUTCOMES_PRODUCED: &str = "splunk_fwd_outcomes_produced";
pub const OUTCOME_PRODUCE_FAILURES: &str = "splunk_fwd_outcome_produce_failures";
