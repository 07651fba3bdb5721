//! Control-plane message protocol.
//!
//! Request/reply over a message channel provided by the hosting page. Wire
//! format is JSON with a SCREAMING_SNAKE `type` discriminator on requests;
//! replies are bare payload objects.

use serde::{Deserialize, Serialize};

use crate::metrics::StatsSnapshot;

/// Requests the hosting page can send to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlRequest {
    /// Force immediate activation of a waiting worker. No reply.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,

    /// Query the current versioned cache-name string.
    #[serde(rename = "GET_VERSION")]
    GetVersion,

    /// Delete all named caches.
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,

    /// Query performance counters plus derived hit rate.
    #[serde(rename = "GET_PERFORMANCE_STATS")]
    GetPerformanceStats,

    /// Re-run the size-eviction pass on demand.
    #[serde(rename = "OPTIMIZE_CACHES")]
    OptimizeCaches,
}

/// Replies sent back over the message channel. Serialization only: replies
/// are outbound.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
    Version {
        version: String,
    },
    Cleared {
        success: bool,
    },
    Stats {
        stats: StatsSnapshot,
    },
    Optimized {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let parsed: ControlRequest =
            serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(parsed, ControlRequest::SkipWaiting);

        let parsed: ControlRequest =
            serde_json::from_str(r#"{"type":"GET_PERFORMANCE_STATS"}"#).unwrap();
        assert_eq!(parsed, ControlRequest::GetPerformanceStats);

        assert_eq!(
            serde_json::to_string(&ControlRequest::ClearCache).unwrap(),
            r#"{"type":"CLEAR_CACHE"}"#
        );
    }

    #[test]
    fn test_unknown_request_rejected() {
        let parsed: Result<ControlRequest, _> =
            serde_json::from_str(r#"{"type":"SELF_DESTRUCT"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_version_reply_shape() {
        let reply = ControlReply::Version {
            version: "muscle-rotation-v1.0.0".to_string(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["version"], "muscle-rotation-v1.0.0");
    }

    #[test]
    fn test_optimize_reply_skips_empty_fields() {
        let reply = ControlReply::Optimized {
            success: true,
            message: Some("Evicted 4 entries".to_string()),
            error: None,
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Evicted 4 entries");
        assert!(json.get("error").is_none());
    }
}
