//! Connection admission (C7, spec §4.7): the gate every incoming connection
//! passes before its payload is parsed. Grounded on the teacher's
//! `services/admission.rs` closure-chain `AdmissionGate` and
//! `security/guards.rs` `GuardValidator`, generalized from a single
//! `Fn(&Value) -> Result<_, String>` chain into the fixed five-step
//! sequence spec §4.7 actually specifies (peer allowlist, TLS mode,
//! issuer, subject, PSK identity).

use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::CoreError;

/// Security mode presented by an incoming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSecurity {
    Unencrypted,
    TlsCert,
    TlsPsk,
}

bitflags::bitflags! {
    /// Which [`ConnectionSecurity`] modes a caller accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TlsAcceptMask: u8 {
        const UNENCRYPTED = 0b001;
        const CERT        = 0b010;
        const PSK         = 0b100;
    }
}

impl ConnectionSecurity {
    fn mask_bit(self) -> TlsAcceptMask {
        match self {
            ConnectionSecurity::Unencrypted => TlsAcceptMask::UNENCRYPTED,
            ConnectionSecurity::TlsCert => TlsAcceptMask::CERT,
            ConnectionSecurity::TlsPsk => TlsAcceptMask::PSK,
        }
    }
}

/// What the peer actually presented on the wire.
#[derive(Debug, Clone, Default)]
pub struct PeerCredentials {
    pub tls_issuer: Option<String>,
    pub tls_subject: Option<String>,
    pub psk_identity: Option<String>,
}

/// The caller's admission policy (spec §4.7: a host, proxy, or anonymous
/// sender's configured expectations).
#[derive(Debug, Clone, Default)]
pub struct CallerPolicy {
    pub peer_allowlist: Vec<AllowedPeer>,
    pub tls_accept_mask: TlsAcceptMask,
    pub tls_issuer: Option<String>,
    pub tls_subject: Option<String>,
    pub tls_psk_identity: Option<String>,
}

/// One entry in a peer allowlist: a single address, a dotted range
/// `a.b.c.x-y`, or a CIDR block (spec §4.7 point 1).
#[derive(Debug, Clone)]
pub enum AllowedPeer {
    Single(IpAddr),
    Cidr(IpNet),
    Range { base: [u8; 4], lo: u8, hi: u8 },
}

impl AllowedPeer {
    fn matches(&self, addr: IpAddr) -> bool {
        match self {
            AllowedPeer::Single(ip) => *ip == addr,
            AllowedPeer::Cidr(net) => net.contains(&addr),
            AllowedPeer::Range { base, lo, hi } => match addr {
                IpAddr::V4(v4) => {
                    let octets = v4.octets();
                    octets[..3] == base[..3] && (*lo..=*hi).contains(&octets[3])
                }
                IpAddr::V6(_) => false,
            },
        }
    }
}

/// Attributes of one connection being admitted.
#[derive(Debug, Clone)]
pub struct ConnectionAttrs {
    pub peer_addr: IpAddr,
    pub security: ConnectionSecurity,
    pub credentials: PeerCredentials,
}

/// Runs the five-step admission sequence from spec §4.7, stopping at the
/// first failure. Rejection reasons are deliberately coarse categories —
/// never which byte mismatched — per spec §4.7's side-channel note.
pub fn admit(policy: &CallerPolicy, conn: &ConnectionAttrs) -> Result<(), CoreError> {
    if !policy.peer_allowlist.is_empty()
        && !policy.peer_allowlist.iter().any(|p| p.matches(conn.peer_addr))
    {
        return Err(CoreError::Admission { reason: "not allowed from this address" });
    }

    if !policy.tls_accept_mask.contains(conn.security.mask_bit()) {
        return Err(CoreError::Admission { reason: "connection-type-not-allowed" });
    }

    if conn.security == ConnectionSecurity::TlsCert {
        if let Some(expected_issuer) = &policy.tls_issuer {
            if !expected_issuer.is_empty() && conn.credentials.tls_issuer.as_deref() != Some(expected_issuer.as_str())
            {
                return Err(CoreError::Admission { reason: "cert issuer mismatch" });
            }
        }
        if let Some(expected_subject) = &policy.tls_subject {
            if !expected_subject.is_empty()
                && conn.credentials.tls_subject.as_deref() != Some(expected_subject.as_str())
            {
                return Err(CoreError::Admission { reason: "cert subject mismatch" });
            }
        }
    }

    if conn.security == ConnectionSecurity::TlsPsk {
        if let Some(expected_identity) = &policy.tls_psk_identity {
            if !expected_identity.is_empty() {
                let presented = conn.credentials.psk_identity.as_deref().unwrap_or("");
                if presented.len() != expected_identity.len() || presented != expected_identity {
                    return Err(CoreError::Admission { reason: "PSK identity mismatch" });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn conn(security: ConnectionSecurity) -> ConnectionAttrs {
        ConnectionAttrs {
            peer_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            security,
            credentials: PeerCredentials::default(),
        }
    }

    #[test]
    fn empty_allowlist_permits_any_peer() {
        let policy = CallerPolicy {
            tls_accept_mask: TlsAcceptMask::UNENCRYPTED,
            ..Default::default()
        };
        assert!(admit(&policy, &conn(ConnectionSecurity::Unencrypted)).is_ok());
    }

    #[test]
    fn rejects_peer_outside_allowlist() {
        let policy = CallerPolicy {
            peer_allowlist: vec![AllowedPeer::Single(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)))],
            tls_accept_mask: TlsAcceptMask::UNENCRYPTED,
            ..Default::default()
        };
        let err = admit(&policy, &conn(ConnectionSecurity::Unencrypted)).unwrap_err();
        assert!(matches!(err, CoreError::Admission { reason: "not allowed from this address" }));
    }

    #[test]
    fn accepts_peer_inside_cidr() {
        let policy = CallerPolicy {
            peer_allowlist: vec![AllowedPeer::Cidr(IpNet::from_str("10.0.0.0/24").unwrap())],
            tls_accept_mask: TlsAcceptMask::UNENCRYPTED,
            ..Default::default()
        };
        assert!(admit(&policy, &conn(ConnectionSecurity::Unencrypted)).is_ok());
    }

    #[test]
    fn accepts_peer_inside_dotted_range() {
        let policy = CallerPolicy {
            peer_allowlist: vec![AllowedPeer::Range { base: [10, 0, 0, 0], lo: 1, hi: 10 }],
            tls_accept_mask: TlsAcceptMask::UNENCRYPTED,
            ..Default::default()
        };
        assert!(admit(&policy, &conn(ConnectionSecurity::Unencrypted)).is_ok());
    }

    #[test]
    fn rejects_wrong_security_mode() {
        let policy = CallerPolicy {
            tls_accept_mask: TlsAcceptMask::CERT,
            ..Default::default()
        };
        let err = admit(&policy, &conn(ConnectionSecurity::Unencrypted)).unwrap_err();
        assert!(matches!(err, CoreError::Admission { reason: "connection-type-not-allowed" }));
    }

    #[test]
    fn rejects_issuer_mismatch() {
        let policy = CallerPolicy {
            tls_accept_mask: TlsAcceptMask::CERT,
            tls_issuer: Some("CN=trusted-ca".to_string()),
            ..Default::default()
        };
        let mut c = conn(ConnectionSecurity::TlsCert);
        c.credentials.tls_issuer = Some("CN=other".to_string());
        let err = admit(&policy, &c).unwrap_err();
        assert!(matches!(err, CoreError::Admission { reason: "cert issuer mismatch" }));
    }

    #[test]
    fn rejects_psk_identity_mismatch() {
        let policy = CallerPolicy {
            tls_accept_mask: TlsAcceptMask::PSK,
            tls_psk_identity: Some("proxy-1".to_string()),
            ..Default::default()
        };
        let mut c = conn(ConnectionSecurity::TlsPsk);
        c.credentials.psk_identity = Some("proxy-2".to_string());
        let err = admit(&policy, &c).unwrap_err();
        assert!(matches!(err, CoreError::Admission { reason: "PSK identity mismatch" }));
    }

    #[test]
    fn accepts_matching_psk_identity() {
        let policy = CallerPolicy {
            tls_accept_mask: TlsAcceptMask::PSK,
            tls_psk_identity: Some("proxy-1".to_string()),
            ..Default::default()
        };
        let mut c = conn(ConnectionSecurity::TlsPsk);
        c.credentials.psk_identity = Some("proxy-1".to_string());
        assert!(admit(&policy, &c).is_ok());
    }
}
