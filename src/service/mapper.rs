//! Response shapes served to API clients.

use serde::Serialize;

use crate::tfl::Line;

/// Status shown when TfL reports no status entries for a line.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// One line's status, flattened for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStatusResponse {
    pub line_id: String,
    pub line_name: String,
    pub status: String,
    pub disrupted: bool,
    pub planned: bool,
    pub reasons: Vec<String>,
    pub source_url: String,
}

impl LineStatusResponse {
    /// Placeholder for a line TfL returned nothing for.
    pub fn unknown(line_id: &str, planned: bool, source_url: impl Into<String>) -> Self {
        Self {
            line_id: line_id.to_owned(),
            line_name: line_id.to_owned(),
            status: UNKNOWN_STATUS.to_owned(),
            disrupted: false,
            planned,
            reasons: Vec::new(),
            source_url: source_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnplannedDisruptionsResponse {
    pub count: usize,
    pub lines: Vec<LineStatusResponse>,
}

impl From<Vec<LineStatusResponse>> for UnplannedDisruptionsResponse {
    fn from(lines: Vec<LineStatusResponse>) -> Self {
        Self {
            count: lines.len(),
            lines,
        }
    }
}

/// Reshape a TfL line.
///
/// The status text comes from the first status entry. A line is disrupted
/// when that entry carries a reason or any disruption has a description
/// (falling back to its additional info); each such text becomes a reason.
pub fn to_response(line: &Line, source_url: &str, planned: bool) -> LineStatusResponse {
    let mut disrupted = false;
    let mut reasons = Vec::new();

    let first = line.line_statuses.first();
    let status = first
        .and_then(|s| s.status_severity_description.clone())
        .unwrap_or_else(|| UNKNOWN_STATUS.to_owned());

    if let Some(reason) = first.and_then(|s| non_blank(s.reason.as_deref())) {
        disrupted = true;
        reasons.push(reason.to_owned());
    }

    for disruption in &line.disruptions {
        let text = non_blank(disruption.description.as_deref())
            .or_else(|| non_blank(disruption.additional_info.as_deref()));
        if let Some(text) = text {
            disrupted = true;
            reasons.push(text.to_owned());
        }
    }

    LineStatusResponse {
        line_id: line.id.clone(),
        line_name: line.name.clone(),
        status,
        disrupted,
        planned,
        reasons,
        source_url: source_url.to_owned(),
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|s| !s.trim().is_empty())
}
