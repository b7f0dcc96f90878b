use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::event::{AuditEvent, EventOutcome, EventSeverity, EventType};

/// Canonical hashing payload. Field order is fixed by the struct definition
/// and metadata is re-keyed through a BTreeMap, so serialization is stable
/// for identical event content.
#[derive(Serialize)]
struct CanonicalEvent<'a> {
    id: &'a str,
    event_type: &'a EventType,
    severity: EventSeverity,
    timestamp: String,
    correlation_id: Option<&'a str>,
    tenant_id: Option<&'a str>,
    actor_id: Option<&'a str>,
    resource_type: Option<&'a str>,
    resource_id: Option<&'a str>,
    description: &'a str,
    metadata: BTreeMap<&'a str, &'a serde_json::Value>,
    outcome: EventOutcome,
}

fn canonical_payload(event: &AuditEvent) -> String {
    let canonical = CanonicalEvent {
        id: &event.id,
        event_type: &event.event_type,
        severity: event.severity,
        timestamp: event.timestamp.to_rfc3339(),
        correlation_id: event.correlation_id.as_deref(),
        tenant_id: event.tenant_id.as_deref(),
        actor_id: event.actor_id.as_deref(),
        resource_type: event.resource_type.as_deref(),
        resource_id: event.resource_id.as_deref(),
        description: &event.description,
        metadata: event
            .metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect(),
        outcome: event.outcome,
    };
    // Serialization of a fixed-shape struct cannot fail.
    serde_json::to_string(&canonical).expect("canonical audit payload")
}

/// Compute the chain hash for an event given the previous event's hash.
pub fn chain_hash(prev_hash: Option<&str>, event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(canonical_payload(event).as_bytes());
    hex::encode(hasher.finalize())
}

/// Location of a chain verification failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    /// Index of the first event whose hash does not verify
    pub index: usize,
    pub event_id: String,
}

/// Walk a tenant's event stream in append order and verify every link.
/// Returns the first break found, if any.
pub fn verify_chain(events: &[AuditEvent]) -> Result<(), ChainBreak> {
    let mut prev: Option<&str> = None;
    for (index, event) in events.iter().enumerate() {
        if event.prev_hash.as_deref() != prev {
            return Err(ChainBreak {
                index,
                event_id: event.id.clone(),
            });
        }
        let expected = chain_hash(prev, event);
        match event.hash.as_deref() {
            Some(hash) if hash == expected => {}
            _ => {
                return Err(ChainBreak {
                    index,
                    event_id: event.id.clone(),
                });
            }
        }
        prev = event.hash.as_deref();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::EventType;

    fn chained(events: &mut [AuditEvent]) {
        let mut prev: Option<String> = None;
        for event in events.iter_mut() {
            event.prev_hash = prev.clone();
            let hash = chain_hash(prev.as_deref(), event);
            event.hash = Some(hash.clone());
            prev = Some(hash);
        }
    }

    fn sample(description: &str) -> AuditEvent {
        AuditEvent::builder(EventType::SarTransition, description)
            .tenant_id("tenant-1")
            .build()
    }

    #[test]
    fn intact_chain_verifies() {
        let mut events = vec![sample("search -> assess"), sample("assess -> refine")];
        chained(&mut events);
        assert!(verify_chain(&events).is_ok());
    }

    #[test]
    fn tampered_description_breaks_chain() {
        let mut events = vec![sample("search -> assess"), sample("assess -> refine")];
        chained(&mut events);
        events[0].description = "tampered".to_string();

        let err = verify_chain(&events).unwrap_err();
        assert_eq!(err.index, 0);
    }

    #[test]
    fn dropped_event_breaks_chain() {
        let mut events = vec![sample("a"), sample("b"), sample("c")];
        chained(&mut events);
        events.remove(1);

        let err = verify_chain(&events).unwrap_err();
        assert_eq!(err.index, 1);
    }

    #[test]
    fn hash_is_deterministic() {
        let event = sample("search -> assess");
        assert_eq!(chain_hash(None, &event), chain_hash(None, &event));
    }
}
