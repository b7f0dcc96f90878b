use serde::{Deserialize, Serialize};

use screening_core::types::EntityId;

use crate::knowledge::ConnectionKind;

/// Risk contribution of one connected entity, derived from its own profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRisk {
    pub entity_id: EntityId,
    pub kind: ConnectionKind,
    /// The connected entity's own risk score in [0, 100]
    pub risk_score: f64,
}

/// Cap on the network adjustment so a noisy graph cannot dominate the
/// subject's own record.
const MAX_NETWORK_ADJUSTMENT: f64 = 15.0;

fn connection_weight(kind: ConnectionKind) -> f64 {
    match kind {
        ConnectionKind::FinancialPartner => 1.0,
        ConnectionKind::Employer => 0.7,
        ConnectionKind::Associate => 0.5,
        ConnectionKind::Address => 0.2,
    }
}

/// Score network risk from connected entities' findings and connection
/// types. Each connection contributes proportionally to its own risk and
/// the strength of the tie; the total is capped.
pub fn network_adjustment(connections: &[ConnectionRisk]) -> f64 {
    let raw: f64 = connections
        .iter()
        .map(|c| (c.risk_score / 100.0) * connection_weight(c.kind) * 5.0)
        .sum();
    raw.min(MAX_NETWORK_ADJUSTMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(kind: ConnectionKind, risk_score: f64) -> ConnectionRisk {
        ConnectionRisk {
            entity_id: EntityId::new(),
            kind,
            risk_score,
        }
    }

    #[test]
    fn financial_partners_weigh_more_than_addresses() {
        let partner = network_adjustment(&[connection(ConnectionKind::FinancialPartner, 80.0)]);
        let address = network_adjustment(&[connection(ConnectionKind::Address, 80.0)]);
        assert!(partner > address);
    }

    #[test]
    fn adjustment_is_capped() {
        let connections: Vec<ConnectionRisk> = (0..20)
            .map(|_| connection(ConnectionKind::FinancialPartner, 100.0))
            .collect();
        assert_eq!(network_adjustment(&connections), MAX_NETWORK_ADJUSTMENT);
    }

    #[test]
    fn clean_network_contributes_nothing() {
        let connections = vec![connection(ConnectionKind::Employer, 0.0)];
        assert_eq!(network_adjustment(&connections), 0.0);
    }
}
