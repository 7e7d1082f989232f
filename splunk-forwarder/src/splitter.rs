use serde::Serialize;
use serde_json::Value;

use crate::cloudevent::Action;

/// `source` stamped on every wrapped payload.
pub const EVENT_SOURCE: &str = "eventing";
/// `sourcetype` stamped on every wrapped payload.
pub const EVENT_SOURCE_TYPE: &str = "Insights event";

/// One event wrapped for the collector: the whole action with `events`
/// narrowed to a single element, under the fixed source labels.
#[derive(Debug, Serialize)]
pub struct WrappedEvent {
    pub source: &'static str,
    pub sourcetype: &'static str,
    pub event: Action,
}

/// What the splitter decided to send.
#[derive(Debug)]
pub enum SplitOutcome {
    /// No `events` array: the action is forwarded untouched.
    Passthrough(Action),
    /// One wrapped payload per event, in input order. Empty when the array
    /// was present but empty, in which case nothing is sent at all.
    Wrapped(Vec<WrappedEvent>),
}

pub fn split(mut action: Action) -> SplitOutcome {
    let events = match action.remove("events") {
        None => return SplitOutcome::Passthrough(action),
        Some(Value::Array(events)) => events,
        Some(other) => {
            // Not an array: put it back and forward as-is rather than guess
            action.insert("events".to_string(), other);
            return SplitOutcome::Passthrough(action);
        }
    };

    let mut wrapped = Vec::with_capacity(events.len());
    for event in events {
        let mut single = action.clone();
        single.insert("events".to_string(), Value::Array(vec![event]));
        wrapped.push(WrappedEvent {
            source: EVENT_SOURCE,
            sourcetype: EVENT_SOURCE_TYPE,
            event: single,
        });
    }
    SplitOutcome::Wrapped(wrapped)
}

impl SplitOutcome {
    /// How many collector payloads this amounts to.
    pub fn event_count(&self) -> usize {
        match self {
            SplitOutcome::Passthrough(_) => 1,
            SplitOutcome::Wrapped(events) => events.len(),
        }
    }

    /// The HTTP body to send: wrapped payloads serialized back-to-back with
    /// no separator, or the untouched action. `None` when there is nothing
    /// to send.
    pub fn into_body(self) -> Result<Option<String>, serde_json::Error> {
        match self {
            SplitOutcome::Passthrough(action) => {
                Ok(Some(serde_json::to_string(&Value::Object(action))?))
            }
            SplitOutcome::Wrapped(events) if events.is_empty() => Ok(None),
            SplitOutcome::Wrapped(events) => {
                let mut body = String::new();
                for event in &events {
                    body.push_str(&serde_json::to_string(event)?);
                }
                Ok(Some(body))
            }
        }
    }
}
