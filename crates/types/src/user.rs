use serde::{Deserialize, Serialize};
use std::fmt;

/// A simulated user identity. Key material lives with the signing layer;
/// the flow only needs addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Index of the user bot
    pub num: u32,

    /// Partner identities mirror a user bot and receive pool tokens from it
    #[serde(default)]
    pub partner: bool,

    /// Address on the native chain
    pub native_address: String,

    /// Address on the underlying chain
    pub underlying_address: String,
}

impl UserIdentity {
    pub fn new(
        num: u32,
        partner: bool,
        native_address: impl Into<String>,
        underlying_address: impl Into<String>,
    ) -> Self {
        Self {
            num,
            partner,
            native_address: native_address.into(),
            underlying_address: underlying_address.into(),
        }
    }

    /// Name used in logs and record storage paths
    pub fn name(&self) -> String {
        if self.partner {
            format!("user_partner_{}", self.num)
        } else {
            format!("user_{}", self.num)
        }
    }

    /// True when `other` is this identity's counterpart
    pub fn is_partner_of(&self, other: &UserIdentity) -> bool {
        self.num == other.num && self.partner != other.partner
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_pairing() {
        let user = UserIdentity::new(2, false, "0xuser", "rUser");
        let partner = UserIdentity::new(2, true, "0xpartner", "rPartner");
        let other = UserIdentity::new(3, true, "0xother", "rOther");

        assert!(user.is_partner_of(&partner));
        assert!(partner.is_partner_of(&user));
        assert!(!user.is_partner_of(&other));
        assert_eq!(user.name(), "user_2");
        assert_eq!(partner.name(), "user_partner_2");
    }
}
