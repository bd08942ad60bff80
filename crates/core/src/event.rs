//! Raw event types as they travel through the ingestion queue.
//!
//! A `RawEvent` is created at the HTTP edge, lives in the queue until a
//! flush drains it, and is destroyed once persisted (or requeued whole on
//! flush failure). The payload is an internally tagged enum so the
//! resolver's dispatch is exhaustive; an `event_type` outside the known set
//! is rejected when the wire JSON is parsed and never enters the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};

fn unknown() -> String {
    "unknown".to_string()
}

/// Device and browser attributes, resolved upstream of the pipeline.
///
/// User-agent parsing is an external collaborator; the wire event carries
/// the already-parsed fields (or "unknown").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default = "unknown")]
    pub device_type: String,
    #[serde(default = "unknown")]
    pub browser_name: String,
    #[serde(default = "unknown")]
    pub browser_version: String,
    #[serde(default = "unknown")]
    pub os_name: String,
    #[serde(default = "unknown")]
    pub os_version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_type: unknown(),
            browser_name: unknown(),
            browser_version: unknown(),
            os_name: unknown(),
            os_version: unknown(),
        }
    }
}

/// Geographic attributes, resolved upstream (IP geolocation collaborator).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl GeoInfo {
    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.region.is_none() && self.city.is_none()
    }
}

/// Client context attached to an event by the ingestion edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ClientInfo {
    #[validate(length(max = 512))]
    pub user_agent: Option<String>,
    #[validate(length(max = 45))]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub device: DeviceInfo,
    #[serde(default)]
    pub location: GeoInfo,
}

/// Pageview event fields.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PageviewData {
    #[validate(length(min = 1, max = 2048))]
    pub page_url: String,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub page_title: String,
    #[validate(length(max = 2048))]
    pub referrer_url: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    /// Seconds spent on the previous page, if the SDK reports it.
    pub time_on_page: Option<u32>,
}

/// Custom event fields.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomData {
    #[validate(length(min = 1, max = 255))]
    pub event_name: String,
    #[validate(length(max = 100))]
    pub event_category: Option<String>,
    #[validate(length(max = 100))]
    pub event_action: Option<String>,
    #[validate(length(max = 255))]
    pub event_label: Option<String>,
    pub event_value: Option<f64>,
    /// Arbitrary SDK-supplied properties, forwarded opaquely.
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Event payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "lowercase")]
pub enum EventPayload {
    Pageview(PageviewData),
    Custom(CustomData),
}

impl EventPayload {
    /// Returns the event type as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Pageview(_) => "pageview",
            Self::Custom(_) => "custom",
        }
    }
}

/// A single tracking event in its in-queue representation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawEvent {
    /// Opaque tenant token (the site's tracking id).
    #[validate(length(min = 1, max = 64))]
    pub tracking_id: String,
    /// Caller-supplied pseudonymous visitor identifier.
    #[validate(length(max = 255))]
    pub visitor_id: String,
    /// Caller-supplied session identifier.
    #[validate(length(max = 255))]
    pub session_id: String,
    /// Client-side event time, taken from the payload.
    pub timestamp: DateTime<Utc>,
    /// Server receipt time. Queuing metadata only, never stored on facts.
    #[serde(default = "Utc::now")]
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub client: ClientInfo,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl RawEvent {
    /// Parses a wire event, rejecting unknown event types up front.
    ///
    /// The tag check runs before full deserialization so an unrecognized
    /// `event_type` surfaces as `InvalidEventType` rather than an opaque
    /// serde message. Field limits are enforced after deserialization;
    /// an event failing them never enters the queue.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value.get("event_type").and_then(|v| v.as_str()) {
            Some("pageview") | Some("custom") => {}
            Some(other) => return Err(Error::InvalidEventType(other.to_string())),
            None => return Err(Error::missing_field("event_type")),
        }
        let event: RawEvent = serde_json::from_value(value)?;
        event.check_limits()?;
        Ok(event)
    }

    /// Enforces the declared field limits on the event and its payload.
    fn check_limits(&self) -> Result<()> {
        self.validate()
            .and_then(|_| self.client.validate())
            .and_then(|_| match &self.payload {
                EventPayload::Pageview(data) => data.validate(),
                EventPayload::Custom(data) => data.validate(),
            })
            .map_err(|e| Error::validation(e.to_string()))
    }

    /// True when both per-visitor identifiers are present.
    ///
    /// Events failing this are dropped at resolver entry, never erroring
    /// the batch.
    pub fn has_identifiers(&self) -> bool {
        !self.visitor_id.trim().is_empty() && !self.session_id.trim().is_empty()
    }
}
