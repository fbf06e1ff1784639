use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Request identifier assigned by the asset manager (collateral reservation
/// id for mints, redemption request id for redemptions)
pub type RequestId = u64;

/// Lifecycle bucket of a stored mint request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MintState {
    /// Underlying payment still provable, minting can be executed
    Pending,
    /// Payment fell out of the indexer window
    Expired,
}

/// Mint requests of one identity grouped by state.
///
/// Sets, so equality ignores ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintStatus {
    pub pending: BTreeSet<RequestId>,
    pub expired: BTreeSet<RequestId>,
}

impl MintStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: MintState, id: RequestId) {
        match state {
            MintState::Pending => self.pending.insert(id),
            MintState::Expired => self.expired.insert(id),
        };
    }

    pub fn all_ids(&self) -> BTreeSet<RequestId> {
        self.pending.union(&self.expired).copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.expired.is_empty()
    }
}

impl fmt::Display for MintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MintStatus(pending={:?}, expired={:?})",
            self.pending, self.expired
        )
    }
}

/// Lifecycle bucket of a stored redemption request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionState {
    /// Agent may still pay
    Pending,
    /// Agent paid
    Success,
    /// Payment window passed without payment; default can be claimed
    Default,
    /// Closed or no longer provable
    Expired,
}

/// Redemption requests of one identity grouped by state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionStatus {
    pub pending: BTreeSet<RequestId>,
    pub success: BTreeSet<RequestId>,
    pub default: BTreeSet<RequestId>,
    pub expired: BTreeSet<RequestId>,
}

impl RedemptionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: RedemptionState, id: RequestId) {
        self.set_mut(state).insert(id);
    }

    pub fn extend(&mut self, state: RedemptionState, ids: impl IntoIterator<Item = RequestId>) {
        self.set_mut(state).extend(ids);
    }

    pub fn ids(&self, state: RedemptionState) -> &BTreeSet<RequestId> {
        match state {
            RedemptionState::Pending => &self.pending,
            RedemptionState::Success => &self.success,
            RedemptionState::Default => &self.default,
            RedemptionState::Expired => &self.expired,
        }
    }

    fn set_mut(&mut self, state: RedemptionState) -> &mut BTreeSet<RequestId> {
        match state {
            RedemptionState::Pending => &mut self.pending,
            RedemptionState::Success => &mut self.success,
            RedemptionState::Default => &mut self.default,
            RedemptionState::Expired => &mut self.expired,
        }
    }

    pub fn all_ids(&self) -> BTreeSet<RequestId> {
        self.pending
            .iter()
            .chain(&self.success)
            .chain(&self.default)
            .chain(&self.expired)
            .copied()
            .collect()
    }

    /// Ids no longer worth keeping records for
    pub fn inactive_ids(&self) -> BTreeSet<RequestId> {
        self.success.union(&self.expired).copied().collect()
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RedemptionStatus(pending={:?}, success={:?}, default={:?}, expired={:?})",
            self.pending, self.success, self.default, self.expired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_status_equality_ignores_order() {
        let mut a = MintStatus::new();
        a.insert(MintState::Pending, 3);
        a.insert(MintState::Pending, 1);
        a.insert(MintState::Expired, 7);

        let mut b = MintStatus::new();
        b.insert(MintState::Expired, 7);
        b.insert(MintState::Pending, 1);
        b.insert(MintState::Pending, 3);

        assert_eq!(a, b);
        assert_eq!(a.all_ids(), BTreeSet::from([1, 3, 7]));
    }

    #[test]
    fn test_redemption_status_sets() {
        let mut status = RedemptionStatus::new();
        status.extend(RedemptionState::Pending, [5, 2]);
        status.insert(RedemptionState::Default, 9);
        status.insert(RedemptionState::Success, 11);
        status.insert(RedemptionState::Expired, 12);

        let mut permuted = RedemptionStatus::new();
        permuted.extend(RedemptionState::Pending, [2, 5]);
        permuted.insert(RedemptionState::Expired, 12);
        permuted.insert(RedemptionState::Success, 11);
        permuted.insert(RedemptionState::Default, 9);

        assert_eq!(status, permuted);
        assert_eq!(status.all_ids().len(), 5);
        assert_eq!(status.inactive_ids(), BTreeSet::from([11, 12]));
        assert!(status.ids(RedemptionState::Default).contains(&9));
    }

    #[test]
    fn test_different_bucket_is_unequal() {
        let mut a = RedemptionStatus::new();
        a.insert(RedemptionState::Pending, 1);
        let mut b = RedemptionStatus::new();
        b.insert(RedemptionState::Default, 1);
        assert_ne!(a, b);
    }
}
