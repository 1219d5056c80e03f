//! Timing-optimization service facade.
//!
//! Recommends when to carry out a field activity, and lists the planting
//! windows known for a crop.

use agrilink_http_client::{ClientError, RequestOptions, ResilientClient, ServiceConfig};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    DirectProvider, IntegrationAdapter, IntegrationConfig, Operation, Result, ServiceFacade,
};

/// Path of the optimization endpoint.
pub const OPTIMIZE_PATH: &str = "/api/v1/timing/optimize";

/// Path of the planting-window listing.
pub const WINDOWS_PATH: &str = "/api/v1/timing/windows";

/// Field work a recommendation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldActivity {
    Planting,
    Fertilizing,
    Spraying,
    Irrigation,
    Harvesting,
}

/// Request for a timing recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingRequest {
    pub field_id: String,
    pub crop: String,
    pub activity: FieldActivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Earliest acceptable date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest: Option<NaiveDate>,
    /// Latest acceptable date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<NaiveDate>,
}

impl TimingRequest {
    /// Create a request for a field, crop and activity.
    pub fn new(field_id: impl Into<String>, crop: impl Into<String>, activity: FieldActivity) -> Self {
        Self {
            field_id: field_id.into(),
            crop: crop.into(),
            activity,
            region: None,
            earliest: None,
            latest: None,
        }
    }

    /// Set the region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Constrain the recommendation to a date range.
    pub fn between(mut self, earliest: NaiveDate, latest: NaiveDate) -> Self {
        self.earliest = Some(earliest);
        self.latest = Some(latest);
        self
    }
}

/// A date range and how well it suits the activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Suitability score in `[0, 1]`.
    #[serde(default)]
    pub suitability: f64,
}

impl TimingWindow {
    /// Whether `date` falls inside the window, inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Length of the window in days, inclusive.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// The service's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecommendation {
    pub recommended_date: NaiveDate,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub window: Option<TimingWindow>,
    #[serde(default)]
    pub rationale: Vec<String>,
}

/// Facade over the remote timing-optimization service.
#[derive(Debug, Clone)]
pub struct TimingService {
    client: Arc<ResilientClient>,
}

impl TimingService {
    /// Create a facade with its own client.
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_client(Arc::new(ResilientClient::new(config)))
    }

    /// Create a facade over an existing client.
    pub fn with_client(client: Arc<ResilientClient>) -> Self {
        Self { client }
    }

    /// Ask the service when to carry out an activity.
    pub async fn optimize_timing(
        &self,
        request: &TimingRequest,
    ) -> agrilink_http_client::Result<TimingRecommendation> {
        self.client
            .post(OPTIMIZE_PATH, request, RequestOptions::new())
            .await
    }

    /// List planting windows for a crop, optionally narrowed to a region.
    pub async fn planting_windows(
        &self,
        crop: &str,
        region: Option<&str>,
    ) -> agrilink_http_client::Result<Vec<TimingWindow>> {
        let mut options = RequestOptions::new().query("crop", crop);
        if let Some(region) = region {
            options = options.query("region", region);
        }
        self.client.get(WINDOWS_PATH, options).await
    }

    /// Probe the service.
    pub async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    /// Release the client's connection pool.
    pub fn close(&self) -> bool {
        self.client.close()
    }
}

#[async_trait]
impl Operation<TimingRequest, TimingRecommendation> for TimingService {
    type Error = ClientError;

    async fn call(&self, request: &TimingRequest) -> agrilink_http_client::Result<TimingRecommendation> {
        self.optimize_timing(request).await
    }
}

impl ServiceFacade<TimingRequest, TimingRecommendation> for TimingService {
    fn client(&self) -> &ResilientClient {
        &self.client
    }
}

/// Timing optimization through a configurable integration mode.
pub type TimingAdapter = IntegrationAdapter<TimingRequest, TimingRecommendation>;

/// Build a timing adapter from configuration and an in-process provider.
pub fn timing_adapter(
    config: IntegrationConfig,
    direct: DirectProvider<TimingRequest, TimingRecommendation>,
) -> Result<TimingAdapter> {
    IntegrationAdapter::from_config(config, TimingService::new, direct)
}
