use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use time::{Duration, OffsetDateTime};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Default, Debug)]
pub struct HealthStatus {
    /// True only if every registered component is currently healthy
    pub healthy: bool,
    /// Last known status per component, for the probe body
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    /// 200 when healthy, 500 otherwise, with the component map in the body
    /// so a failing probe can be diagnosed from kubectl output alone.
    fn into_response(self) -> Response {
        let body = format!("{self:?}");
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ComponentStatus {
    /// Registered but has not reported yet
    Starting,
    /// Healthy as long as the deadline has not passed
    HealthyUntil(OffsetDateTime),
    /// Explicitly reported unhealthy
    Unhealthy,
    /// Deadline passed without a new report
    Stalled,
}

impl ComponentStatus {
    pub fn is_healthy(&self) -> bool {
        match self {
            ComponentStatus::HealthyUntil(until) => *until > OffsetDateTime::now_utc(),
            _ => false,
        }
    }
}

struct StatusUpdate {
    component: String,
    status: ComponentStatus,
}

#[derive(Clone)]
pub struct HealthHandle {
    component: String,
    deadline: Duration,
    sender: mpsc::Sender<StatusUpdate>,
}

impl HealthHandle {
    /// Report healthy, async. Must be called more often than the deadline.
    pub async fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(
            OffsetDateTime::now_utc() + self.deadline,
        ))
        .await
    }

    /// Report an explicit status, async. Returns once the update is queued.
    pub async fn report_status(&self, status: ComponentStatus) {
        let update = StatusUpdate {
            component: self.component.clone(),
            status,
        };
        if let Err(err) = self.sender.send(update).await {
            warn!("failed to report health status: {}", err)
        }
    }

    /// Report healthy from non-async code, e.g. rdkafka callbacks.
    pub fn report_healthy_blocking(&self) {
        self.report_status_blocking(ComponentStatus::HealthyUntil(
            OffsetDateTime::now_utc() + self.deadline,
        ))
    }

    /// Report an explicit status from non-async code. If we happen to be on a
    /// runtime thread, spawn instead of blocking it.
    pub fn report_status_blocking(&self, status: ComponentStatus) {
        let update = StatusUpdate {
            component: self.component.clone(),
            status,
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let this = self.clone();
            handle.spawn(async move { this.report_status(update.status).await });
        } else if let Err(err) = self.sender.blocking_send(update) {
            warn!("failed to report health status: {}", err)
        }
    }
}

/// Liveness reporting for the long-running pieces of a service.
///
/// A service is only trustworthy while its consumer loop and its producer
/// callbacks are actually running, so each of them registers here and has to
/// report healthy again before its deadline passes. The registry combines the
/// individual reports:
///   - every registered component must currently be healthy,
///   - a component that missed its deadline counts as stalled,
///   - a component that never reported counts as still starting.
///
/// Keep separate registries for separate probes (liveness vs readiness),
/// since the two k8s concepts answer different questions.
#[derive(Clone)]
pub struct HealthRegistry {
    name: String,
    components: Arc<RwLock<HashMap<String, ComponentStatus>>>,
    sender: mpsc::Sender<StatusUpdate>,
}

impl HealthRegistry {
    pub fn new(name: &str) -> Self {
        let (tx, mut rx) = mpsc::channel::<StatusUpdate>(16);
        let registry = Self {
            name: name.to_owned(),
            components: Default::default(),
            sender: tx,
        };

        let components = registry.components.clone();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                if let Ok(mut map) = components.write() {
                    _ = map.insert(update.component, update.status);
                } else {
                    // Poisoned lock: the probes will fail and the pod restart
                    warn!("poisoned HealthRegistry lock")
                }
            }
        });

        registry
    }

    /// Registers a component and returns the handle it should report through.
    /// The component counts as unhealthy until its first report.
    pub async fn register(&self, component: &str, deadline: Duration) -> HealthHandle {
        let handle = HealthHandle {
            component: component.to_owned(),
            deadline,
            sender: self.sender.clone(),
        };
        handle.report_status(ComponentStatus::Starting).await;
        handle
    }

    /// Computes the overall status from the latest component reports. Usable
    /// directly as an axum handler body.
    pub fn get_status(&self) -> HealthStatus {
        let components = self
            .components
            .read()
            .expect("poisoned HealthRegistry lock");

        // An empty registry is unhealthy: nothing has registered yet, so
        // nothing can vouch for the process.
        let mut result = HealthStatus {
            healthy: !components.is_empty(),
            components: HashMap::with_capacity(components.len()),
        };
        let now = OffsetDateTime::now_utc();

        for (name, status) in components.iter() {
            match status {
                ComponentStatus::HealthyUntil(until) if *until > now => {
                    _ = result.components.insert(name.clone(), status.clone());
                }
                ComponentStatus::HealthyUntil(_) => {
                    result.healthy = false;
                    _ = result
                        .components
                        .insert(name.clone(), ComponentStatus::Stalled);
                }
                _ => {
                    result.healthy = false;
                    _ = result.components.insert(name.clone(), status.clone());
                }
            }
        }

        match result.healthy {
            true => info!("{} health check ok", self.name),
            false => warn!("{} health check failed: {:?}", self.name, result.components),
        }
        result
    }
}
