//! Request/response layer over the selector and the observation store.
//!
//! Mirrors the JSON shapes of a small web API (location echo, visible
//! constellation, observation history) without binding to any HTTP server.
//! [`ConstellationService::respond_visible`] maps outcomes to status codes so a
//! transport only has to forward `status` and `body`.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Result, SkyguideError};
use crate::observations::{CallerId, ObservationRecord, ObservationStore};
use crate::position::ApparentPositionProvider;
use crate::selector::{Selection, SelectionStrategy, VisibilityResult, VisibilitySelector};
use crate::ObserverQuery;

pub const LOCATION_RECEIVED: &str = "Location and time received";
pub const VISIBLE_MESSAGE: &str = "Visible constellations";
pub const NONE_VISIBLE_MESSAGE: &str = "No constellations visible";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRequest {
    pub latitude: f64,
    /// East-positive degrees.
    pub longitude: f64,
    pub timestamp: String,
    /// Overrides the service's configured strategy for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<SelectionStrategy>,
}

impl LocationRequest {
    pub fn new(latitude: f64, longitude: f64, timestamp: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: timestamp.into(),
            strategy: None,
        }
    }

    fn query(&self) -> Result<ObserverQuery> {
        ObserverQuery::parse(self.latitude, self.longitude, &self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAck {
    pub message: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: String,
}

/// Echo a location without computing anything.
pub fn acknowledge_location(request: &LocationRequest) -> LocationAck {
    debug!(
        "Received coordinates: lat {}, lon {}, time {}",
        request.latitude, request.longitude, request.timestamp
    );
    LocationAck {
        message: LOCATION_RECEIVED.to_string(),
        latitude: request.latitude,
        longitude: request.longitude,
        timestamp: request.timestamp.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleResponse {
    pub message: String,
    pub constellation: String,
    /// Magnitude of the guide star.
    pub magnitude: f32,
    pub alt: f64,
    pub az: f64,
    /// The request's timestamp, echoed verbatim.
    pub timestamp: String,
}

impl VisibleResponse {
    fn from_result(result: &VisibilityResult, timestamp: &str) -> Self {
        Self {
            message: VISIBLE_MESSAGE.to_string(),
            constellation: result.constellation.clone(),
            magnitude: result.guide_star.mag,
            alt: result.position.altitude_deg,
            az: result.position.azimuth_deg,
            timestamp: timestamp.to_string(),
        }
    }
}

/// Outcome of a `visible` request.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibleOutcome {
    Visible(VisibleResponse),
    NoneVisible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationView {
    pub constellation: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: String,
    pub created_at: String,
}

impl From<ObservationRecord> for ObservationView {
    fn from(record: ObservationRecord) -> Self {
        Self {
            constellation: record.constellation,
            latitude: record.latitude,
            longitude: record.longitude,
            timestamp: record.timestamp.to_rfc3339(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Status code and JSON body for a transport to send back.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    fn message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    fn from_error(err: &SkyguideError) -> Self {
        match err {
            SkyguideError::InvalidInput(_) => Self::message(400, err.to_string()),
            SkyguideError::CatalogUnavailable(_) | SkyguideError::Store(_) => {
                warn!("Request failed: {err}");
                Self::message(500, err.to_string())
            }
        }
    }
}

pub struct ConstellationService<P> {
    selector: VisibilitySelector<P>,
    store: Arc<dyn ObservationStore>,
}

impl<P: ApparentPositionProvider> ConstellationService<P> {
    pub fn new(selector: VisibilitySelector<P>, store: Arc<dyn ObservationStore>) -> Self {
        Self { selector, store }
    }

    pub fn selector(&self) -> &VisibilitySelector<P> {
        &self.selector
    }

    /// Select a constellation for `caller` and record it.
    ///
    /// Nothing is recorded when the request is invalid or nothing is visible.
    pub fn visible(&self, caller: &CallerId, request: &LocationRequest) -> Result<VisibleOutcome> {
        let query = request.query()?;
        let strategy = request
            .strategy
            .as_ref()
            .unwrap_or(&self.selector.config().strategy);

        let result = match self.selector.select_with(&query, strategy)? {
            Selection::Visible(result) => result,
            Selection::NoneVisible => return Ok(VisibleOutcome::NoneVisible),
        };

        self.store.append(ObservationRecord {
            caller: caller.clone(),
            constellation: result.constellation.clone(),
            latitude: request.latitude,
            longitude: request.longitude,
            timestamp: query.time,
            created_at: Utc::now(),
        })?;

        Ok(VisibleOutcome::Visible(VisibleResponse::from_result(
            &result,
            &request.timestamp,
        )))
    }

    /// Every visible constellation with its guide star. Not recorded.
    pub fn survey(&self, request: &LocationRequest) -> Result<Vec<VisibleResponse>> {
        let query = request.query()?;
        Ok(self
            .selector
            .survey(&query)?
            .iter()
            .map(|r| VisibleResponse::from_result(r, &request.timestamp))
            .collect())
    }

    pub fn history(&self, caller: &CallerId) -> Result<Vec<ObservationView>> {
        Ok(self
            .store
            .history(caller)?
            .into_iter()
            .map(ObservationView::from)
            .collect())
    }

    /// Handle a raw JSON `visible` request body.
    pub fn respond_visible(&self, caller: &CallerId, body: &str) -> ApiReply {
        let request: LocationRequest = match serde_json::from_str(body) {
            Ok(r) => r,
            Err(e) => return ApiReply::message(400, format!("malformed request: {e}")),
        };

        match self.visible(caller, &request) {
            Ok(VisibleOutcome::Visible(response)) => match serde_json::to_value(&response) {
                Ok(body) => ApiReply { status: 200, body },
                Err(e) => ApiReply::message(500, format!("cannot encode response: {e}")),
            },
            Ok(VisibleOutcome::NoneVisible) => ApiReply::message(404, NONE_VISIBLE_MESSAGE),
            Err(e) => ApiReply::from_error(&e),
        }
    }
}
