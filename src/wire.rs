//! Encoded wire format (C8, spec §4.8): serde-derived JSON envelopes for
//! the exchanges the core cares about, plus the size-discipline and
//! version-handshake helpers that govern how much goes on the wire.
//! Grounded on the teacher's `api/models/requests.rs`/`responses.rs` —
//! typed request/response structs with `#[serde(rename = "...")]` for the
//! wire's space-containing keys, not raw `serde_json::Value` poking.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProxyExchangeConfig;
use crate::time::Timestamp;

/// A `(clock, ns)` pair as spec §4.8 splits timestamps on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireClock {
    pub clock: i64,
    pub ns: u32,
}

impl From<Timestamp> for WireClock {
    fn from(t: Timestamp) -> Self {
        Self { clock: t.secs, ns: t.nanos }
    }
}

impl From<WireClock> for Timestamp {
    fn from(w: WireClock) -> Self {
        Timestamp::new(w.clock, w.ns)
    }
}

/// Envelope shared by every request the core decodes (spec §4.8's
/// `request`/`host`/`session`/`version`/`clock`/`ns` top-level keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub clock: i64,
    pub ns: u32,
    #[serde(flatten)]
    pub payload: std::collections::BTreeMap<String, Value>,
}

/// Response status (spec §4.8: `response ∈ {success, failed}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Envelope for every response the core produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub response: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Backpressure hint: `1` asks the sender to pause.
    pub upload: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "tasks")]
    pub tasks: Option<Vec<Value>>,
}

impl ResponseEnvelope {
    pub fn success() -> Self {
        Self { response: ResponseStatus::Success, info: None, upload: 0, tasks: None }
    }

    pub fn failed(info: impl Into<String>) -> Self {
        Self { response: ResponseStatus::Failed, info: Some(info.into()), upload: 0, tasks: None }
    }

    pub fn with_backpressure(mut self) -> Self {
        self.upload = 1;
        self
    }
}

/// Known exchange request tags (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    ProxyData,
    ProxyConfig,
    AgentData,
    SenderData,
}

impl RequestKind {
    pub fn as_tag(self) -> &'static str {
        match self {
            RequestKind::ProxyData => "proxy data",
            RequestKind::ProxyConfig => "proxy config",
            RequestKind::AgentData => "agent data",
            RequestKind::SenderData => "sender data",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "proxy data" => Some(RequestKind::ProxyData),
            "proxy config" => Some(RequestKind::ProxyConfig),
            "agent data" => Some(RequestKind::AgentData),
            "sender data" => Some(RequestKind::SenderData),
            _ => None,
        }
    }
}

/// Byte budget for a single record kind sharing an exchange (spec §4.8:
/// `(MAX_RECV - JSON_RESERVED) / 2` per kind in batch mode).
pub fn batch_kind_budget(cfg: &ProxyExchangeConfig) -> usize {
    cfg.batch_kind_budget()
}

/// The rate-limited version mismatch check (spec §4.8): refuses data only
/// when the proxy's version is strictly greater than the server's
/// (forward-incompatible); equal or lower is accepted.
pub fn version_compatible(proxy_version: &str, server_version: &str) -> bool {
    parse_version(proxy_version) <= parse_version(server_version)
}

fn parse_version(v: &str) -> (u32, u32) {
    let mut parts = v.trim_start_matches("ZABBIX_").splitn(2, '.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor)
}

/// Tracks the last time a version-mismatch warning was logged, enforcing
/// the five-minute rate limit spec §4.8 requires.
#[derive(Debug, Default)]
pub struct VersionWarningLimiter {
    last_warned: Option<Timestamp>,
}

impl VersionWarningLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a warning should be logged now, and records `now`
    /// as the last-warned time if so.
    pub fn should_warn(&mut self, now: Timestamp, cfg: &ProxyExchangeConfig) -> bool {
        let due = match self.last_warned {
            None => true,
            Some(last) => now.secs - last.secs >= cfg.version_warning_rate_limit.as_secs() as i64,
        };
        if due {
            self.last_warned = Some(now);
        }
        due
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn request_kind_round_trips_through_tag() {
        for kind in [
            RequestKind::ProxyData,
            RequestKind::ProxyConfig,
            RequestKind::AgentData,
            RequestKind::SenderData,
        ] {
            assert_eq!(RequestKind::from_tag(kind.as_tag()), Some(kind));
        }
    }

    #[test]
    fn unknown_tag_is_none() {
        assert_eq!(RequestKind::from_tag("bogus"), None);
    }

    #[test]
    fn response_serializes_lowercase_status() {
        let resp = ResponseEnvelope::success();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["response"], "success");
        assert_eq!(json["upload"], 0);
    }

    #[test]
    fn version_accepts_equal_or_lower() {
        assert!(version_compatible("ZABBIX_6.0", "ZABBIX_6.0"));
        assert!(version_compatible("ZABBIX_5.4", "ZABBIX_6.0"));
        assert!(!version_compatible("ZABBIX_6.2", "ZABBIX_6.0"));
    }

    #[test]
    fn warning_limiter_rate_limits_to_five_minutes() {
        let cfg = ProxyExchangeConfig::default();
        let mut limiter = VersionWarningLimiter::new();
        assert!(limiter.should_warn(Timestamp::from_secs(0), &cfg));
        assert!(!limiter.should_warn(Timestamp::from_secs(10), &cfg));
        assert!(limiter.should_warn(Timestamp::from_secs(301), &cfg));
    }

    #[test]
    fn request_envelope_round_trips() {
        let mut payload = std::collections::BTreeMap::new();
        payload.insert("data".to_string(), serde_json::json!([1, 2, 3]));
        let env = RequestEnvelope {
            request: "proxy data".to_string(),
            host: Some("proxy-1".to_string()),
            session: None,
            version: Some("ZABBIX_6.0".to_string()),
            clock: 1_700_000_000,
            ns: 0,
            payload,
        };
        let json = serde_json::to_string(&env).unwrap();
        let back: RequestEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request, "proxy data");
        assert_eq!(back.payload["data"], serde_json::json!([1, 2, 3]));
    }
}
