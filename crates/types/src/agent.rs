use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Basis points in one whole
pub const BIPS: u32 = 10_000;

/// An agent currently accepting mints. Refreshed on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Agent vault address
    pub address: String,

    /// Free collateral capacity in lots
    pub max_lots: u64,

    /// Minting fee as a fraction of the minted value
    pub fee: Decimal,
}

impl AgentInfo {
    pub fn new(address: impl Into<String>, max_lots: u64, fee: Decimal) -> Self {
        Self {
            address: address.into(),
            max_lots,
            fee,
        }
    }

    /// Build from the on-chain representation with the fee in basis points
    pub fn from_bips(address: impl Into<String>, max_lots: u64, fee_bips: u32) -> Self {
        Self::new(address, max_lots, bips_to_fraction(fee_bips))
    }

    pub fn has_capacity(&self) -> bool {
        self.max_lots >= 1
    }
}

pub fn bips_to_fraction(bips: u32) -> Decimal {
    Decimal::from(bips) / Decimal::from(BIPS)
}

/// Largest free-lot capacity among the agents, zero if there are none
pub fn max_lots_available(agents: &[AgentInfo]) -> u64 {
    agents.iter().map(|agent| agent.max_lots).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_from_bips() {
        let agent = AgentInfo::from_bips("0xagent", 20, 100);
        assert_eq!(agent.fee, Decimal::new(1, 2));
        assert_eq!(bips_to_fraction(2000), Decimal::new(2, 1));
    }

    #[test]
    fn test_max_lots_available() {
        assert_eq!(max_lots_available(&[]), 0);
        let agents = vec![
            AgentInfo::from_bips("a", 3, 10),
            AgentInfo::from_bips("b", 12, 50),
        ];
        assert_eq!(max_lots_available(&agents), 12);
    }
}
