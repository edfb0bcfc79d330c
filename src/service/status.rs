//! Line status queries built on the resilient TfL client.

use std::sync::Arc;

use crate::service::mapper::{to_response, LineStatusResponse, UnplannedDisruptionsResponse};
use crate::tfl::{DateRange, TflClient, TflResult};

/// Keywords that mark a disruption reason as planned work.
const PLANNED_MARKERS: [&str; 3] = ["planned", "engineering work", "scheduled"];

/// Answers status questions about tube lines.
#[derive(Debug, Clone)]
pub struct TubeStatusService {
    client: Arc<TflClient>,
}

impl TubeStatusService {
    pub fn new(client: Arc<TflClient>) -> Self {
        Self { client }
    }

    /// Status of one line. A range makes the answer a planned-works view.
    pub async fn get_line_status(
        &self,
        line_id: &str,
        range: Option<DateRange>,
    ) -> TflResult<LineStatusResponse> {
        let source_url = self.line_source_url(line_id, range);
        let planned = range.is_some();
        let lines = self.client.get_line_status(line_id, range).await?;

        Ok(match lines.first() {
            Some(line) => to_response(line, &source_url, planned),
            None => {
                tracing::debug!(line_id, "TfL returned no lines");
                LineStatusResponse::unknown(line_id, planned, source_url)
            }
        })
    }

    /// Tube lines currently disrupted for reasons that do not look planned.
    pub async fn get_all_unplanned_disruptions(&self) -> TflResult<UnplannedDisruptionsResponse> {
        let source_url = format!("{}/Line/Mode/tube/Status", self.client.base_url());
        let lines = self.client.get_all_tube_line_status().await?;

        let unplanned: Vec<_> = lines
            .iter()
            .map(|line| to_response(line, &source_url, false))
            .filter(|r| r.disrupted && !looks_planned(&r.reasons))
            .collect();

        tracing::debug!(total = lines.len(), unplanned = unplanned.len(), "Filtered tube lines");
        Ok(unplanned.into())
    }

    fn line_source_url(&self, line_id: &str, range: Option<DateRange>) -> String {
        let base = self.client.base_url();
        match range {
            Some(DateRange { from, to }) => format!(
                "{base}/Line/{line_id}/Status/{}/to/{}",
                from.format("%Y-%m-%d"),
                to.format("%Y-%m-%d")
            ),
            None => format!("{base}/Line/{line_id}/Status"),
        }
    }
}

/// Case-insensitive keyword match over every reason.
pub fn looks_planned(reasons: &[String]) -> bool {
    reasons.iter().any(|reason| {
        let reason = reason.to_lowercase();
        PLANNED_MARKERS.iter().any(|marker| reason.contains(marker))
    })
}
