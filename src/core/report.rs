use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::error::CoreError;
use crate::core::inventory::ResourceInventory;
use crate::core::store::{RequestFilter, RequestStore};
use crate::db::models::request::RequestStatus;
use crate::db::models::resource::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl ReportPeriod {
    fn window(&self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Weekly => Duration::days(7),
            Self::Monthly => Duration::days(30),
        }
    }
}

/// Aggregated counts over a period window plus the inventory snapshot.
/// Field names are camelCase because that is what the web client reads.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub period: ReportPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_requests: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub location_counts: BTreeMap<String, usize>,
    pub connection_type_counts: BTreeMap<String, usize>,
    pub resources: Vec<ResourceType>,
}

/// Read-only reporting over the request store and the inventory. Works on
/// copied rows and a counter snapshot; never mutates core state.
pub struct ReportView {
    store: Arc<RequestStore>,
    inventory: Arc<ResourceInventory>,
}

impl ReportView {
    pub fn new(store: Arc<RequestStore>, inventory: Arc<ResourceInventory>) -> Self {
        Self { store, inventory }
    }

    pub fn generate(
        &self,
        period: ReportPeriod,
        status: Option<RequestStatus>,
    ) -> Result<ReportSummary, CoreError> {
        let end_date = Utc::now();
        let start_date = end_date - period.window();
        self.generate_window(period, start_date, end_date, status)
    }

    fn generate_window(
        &self,
        period: ReportPeriod,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: Option<RequestStatus>,
    ) -> Result<ReportSummary, CoreError> {
        let requests = self.store.list(&RequestFilter {
            status,
            user_id: None,
            from: Some(start_date),
            to: Some(end_date),
        })?;

        // Statuses are zero-filled so the breakdown is stable even for an
        // empty window; locations and connection types list only what
        // actually occurred.
        let mut status_counts: BTreeMap<String, usize> = [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ]
        .iter()
        .map(|s| (s.to_string(), 0))
        .collect();
        let mut location_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut connection_type_counts: BTreeMap<String, usize> = BTreeMap::new();

        for request in &requests {
            *status_counts.entry(request.status.to_string()).or_insert(0) += 1;
            *location_counts.entry(request.area_name.clone()).or_insert(0) += 1;
            *connection_type_counts
                .entry(request.connection_type.to_string())
                .or_insert(0) += 1;
        }

        Ok(ReportSummary {
            period,
            start_date,
            end_date,
            total_requests: requests.len(),
            status_counts,
            location_counts,
            connection_type_counts,
            resources: self.inventory.snapshot(),
        })
    }
}
