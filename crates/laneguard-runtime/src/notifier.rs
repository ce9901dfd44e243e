//! Outbound notification to the cooperating incident system
//!
//! A confirmed incident is reported as
//! `{accidentId, occurredAt, location: {lat, lng}}`. Delivery is best
//! effort: callers log the outcome and never roll back the decision.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use laneguard_core::{Coordinates, Incident, IncidentId, LaneguardError, LaneguardResult};

/// Boxed future returned by [`NotifySink::notify`]
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = LaneguardResult<()>> + Send + 'a>>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundNotification {
    pub accident_id: IncidentId,
    /// ISO-8601
    pub occurred_at: String,
    pub location: Coordinates,
}

impl OutboundNotification {
    pub fn for_incident(incident: &Incident) -> Self {
        OutboundNotification {
            accident_id: incident.id.clone(),
            occurred_at: incident.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            location: incident.coordinates,
        }
    }

    /// Checked before anything goes on the wire
    pub fn validate(&self) -> LaneguardResult<()> {
        if self.accident_id.is_empty() {
            return Err(LaneguardError::validation("accidentId is required"));
        }
        DateTime::parse_from_rfc3339(&self.occurred_at).map_err(|e| {
            LaneguardError::validation(format!("occurredAt {:?}: {}", self.occurred_at, e))
        })?;
        self.location.validate()
    }
}

/// Destination for outbound notifications
pub trait NotifySink: Send + Sync {
    fn notify<'a>(&'a self, notification: &'a OutboundNotification) -> NotifyFuture<'a>;
}

/// Used when no endpoint is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledNotifier;

impl NotifySink for DisabledNotifier {
    fn notify<'a>(&'a self, notification: &'a OutboundNotification) -> NotifyFuture<'a> {
        Box::pin(async move {
            notification.validate()?;
            debug!(accident_id = %notification.accident_id, "notify endpoint not configured; skipped");
            Ok(())
        })
    }
}

/// JSON POST to the cooperating system
#[derive(Clone, Debug)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> LaneguardResult<Self> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint).map_err(|e| {
            LaneguardError::Configuration(format!("notify endpoint {:?}: {}", endpoint, e))
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LaneguardError::Configuration(format!("http client: {}", e)))?;
        Ok(HttpNotifier { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, notification: &OutboundNotification) -> LaneguardResult<()> {
        notification.validate()?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LaneguardError::Timeout(notification.accident_id.clone())
                } else {
                    LaneguardError::ExternalNotify(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LaneguardError::ExternalNotify(format!(
                "{} answered {}",
                self.endpoint, status
            )));
        }
        Ok(())
    }
}

impl NotifySink for HttpNotifier {
    fn notify<'a>(&'a self, notification: &'a OutboundNotification) -> NotifyFuture<'a> {
        Box::pin(self.post(notification))
    }
}
