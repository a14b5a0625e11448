use serde::Serialize;

use crate::dto::format_epoch_millis;

/// Whether the service can reach its document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Courts randomised matches are currently spread over.
    pub court_count: u32,
    /// Day streams currently open.
    pub open_views: usize,
    /// Server time in RFC 3339.
    pub server_time: String,
}

impl HealthResponse {
    pub fn new(status: HealthStatus, court_count: u32, open_views: usize, now_ms: i64) -> Self {
        Self {
            status,
            court_count,
            open_views,
            server_time: format_epoch_millis(now_ms),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == HealthStatus::Degraded
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serialises_lowercase_status() {
        let response = HealthResponse::new(HealthStatus::Degraded, 4, 2, 0);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], json!("degraded"));
        assert_eq!(value["courtCount"], json!(4));
        assert_eq!(value["openViews"], json!(2));
        assert_eq!(value["serverTime"], json!("1970-01-01T00:00:00Z"));
    }
}
