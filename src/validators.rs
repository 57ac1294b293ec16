//! Validators (C10, spec §4.10): three per-caller acceptance policies
//! composed over an item, plus the one-slot per-host TLS decision cache
//! that lets a batch of items from the same host pay the admission cost
//! once. Grounded on the teacher's `guards/invariant_checker.rs` style of
//! small composable `fn(&Ctx) -> Result<(), Reason>` checks.

use crate::admission::{self, CallerPolicy, ConnectionAttrs};
use crate::error::CoreError;

/// Item type families relevant to validator acceptance (a subset of
/// [`crate::scheduler::ItemType`] plus the two server-computed kinds
/// validators must reject).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatedItemType {
    ZabbixActive,
    Trapper,
    Aggregate,
    Calculated,
    Other,
}

#[derive(Debug, Clone)]
pub struct ItemHost {
    pub host_id: u64,
    pub proxy_id: u64,
}

#[derive(Debug, Clone)]
pub struct ValidatedItem {
    pub item_type: ValidatedItemType,
    pub host: ItemHost,
    pub trapper_hosts: Vec<std::net::IpAddr>,
}

/// Accepts items belonging to hosts owned by this proxy, excluding the two
/// kinds computed server-side (spec §4.10).
pub fn proxy_item_validator(self_proxy_id: u64, item: &ValidatedItem) -> Result<(), CoreError> {
    if item.host.proxy_id != self_proxy_id {
        return Err(CoreError::Validation {
            item_id: item.host.host_id,
            reason: "item's host is not owned by this proxy".to_string(),
        });
    }
    if matches!(item.item_type, ValidatedItemType::Aggregate | ValidatedItemType::Calculated) {
        return Err(CoreError::Validation {
            item_id: item.host.host_id,
            reason: "item type is computed server-side".to_string(),
        });
    }
    Ok(())
}

/// Accepts active-agent items from hosts with no proxy assigned, provided
/// the connection satisfies that host's TLS policy.
pub fn agent_item_validator(
    item: &ValidatedItem,
    policy: &CallerPolicy,
    conn: &ConnectionAttrs,
) -> Result<(), CoreError> {
    if item.host.proxy_id != 0 {
        return Err(CoreError::Validation {
            item_id: item.host.host_id,
            reason: "host is proxy-monitored".to_string(),
        });
    }
    if item.item_type != ValidatedItemType::ZabbixActive {
        return Err(CoreError::Validation {
            item_id: item.host.host_id,
            reason: "item type is not zabbix_active".to_string(),
        });
    }
    admission::admit(policy, conn)
}

/// Accepts trapper items whose sender address is allowlisted on the item.
pub fn sender_item_validator(
    item: &ValidatedItem,
    sender_addr: std::net::IpAddr,
    policy: &CallerPolicy,
    conn: &ConnectionAttrs,
) -> Result<(), CoreError> {
    if item.item_type != ValidatedItemType::Trapper {
        return Err(CoreError::Validation {
            item_id: item.host.host_id,
            reason: "item type is not trapper".to_string(),
        });
    }
    if !item.trapper_hosts.is_empty() && !item.trapper_hosts.contains(&sender_addr) {
        return Err(CoreError::Validation {
            item_id: item.host.host_id,
            reason: "sender address not in trapper_hosts".to_string(),
        });
    }
    admission::admit(policy, conn)
}

/// One-slot `(host_id, outcome)` cache so repeated items from the same host
/// in a batch pay the TLS-policy check once (spec §4.10).
#[derive(Debug, Default)]
pub struct HostTlsCache {
    slot: Option<(u64, Result<(), &'static str>)>,
}

impl HostTlsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached outcome for `host_id` if the slot holds it,
    /// otherwise runs `check`, caches, and returns the fresh outcome.
    pub fn get_or_check(
        &mut self,
        host_id: u64,
        check: impl FnOnce() -> Result<(), CoreError>,
    ) -> Result<(), CoreError> {
        if let Some((cached_host, outcome)) = &self.slot {
            if *cached_host == host_id {
                return outcome.map_err(|reason| CoreError::Admission { reason });
            }
        }
        let outcome = check();
        let cached = outcome.as_ref().map(|_| ()).map_err(|e| match e {
            CoreError::Admission { reason } => *reason,
            _ => "tls policy check failed",
        });
        self.slot = Some((host_id, cached));
        outcome
    }
}
