//! Token identities and smallest-unit (UBA) conversion
//!
//! Three token families take part in a flow:
//! - the native gas/collateral token of the FAsset chain (e.g. C2FLR)
//! - the underlying asset on the external chain (e.g. testXRP)
//! - the FAsset minted against the underlying (e.g. FTestXRP)
//!
//! Each carries its own decimal precision and the tolerance used when
//! predicted and observed balances are compared.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::TypesError;

/// Token family tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Native,
    Underlying,
    FAsset,
}

impl TokenKind {
    /// Decimal places subtracted from the precision to obtain the comparison tolerance.
    ///
    /// Native balances drift by gas dust, underlying balances by network fees
    /// rounding, fasset balances are exact.
    fn tolerance_offset(&self) -> i64 {
        match self {
            TokenKind::Native => 6,
            TokenKind::Underlying => 1,
            TokenKind::FAsset => 0,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Native => write!(f, "native"),
            TokenKind::Underlying => write!(f, "underlying"),
            TokenKind::FAsset => write!(f, "fasset"),
        }
    }
}

/// A token taking part in a flow.
///
/// Identity (equality, ordering, hashing) is by kind and name only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    kind: TokenKind,
    name: String,
    decimals: u32,
}

impl Token {
    pub fn new(kind: TokenKind, name: impl Into<String>, decimals: u32) -> Self {
        Self {
            kind,
            name: name.into(),
            decimals,
        }
    }

    pub fn native(name: impl Into<String>, decimals: u32) -> Self {
        Self::new(TokenKind::Native, name, decimals)
    }

    pub fn underlying(name: impl Into<String>, decimals: u32) -> Self {
        Self::new(TokenKind::Underlying, name, decimals)
    }

    /// FAsset tokens share the precision of their underlying.
    pub fn fasset(name: impl Into<String>, underlying: &Token) -> Self {
        Self::new(TokenKind::FAsset, name, underlying.decimals)
    }

    /// Coston2 native token
    pub fn c2flr() -> Self {
        Self::native("C2FLR", 18)
    }

    /// XRP ledger testnet asset
    pub fn test_xrp() -> Self {
        Self::underlying("testXRP", 6)
    }

    /// FAsset backed by testXRP
    pub fn ftest_xrp() -> Self {
        Self::fasset("FTestXRP", &Self::test_xrp())
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_native(&self) -> bool {
        self.kind == TokenKind::Native
    }

    pub fn is_underlying(&self) -> bool {
        self.kind == TokenKind::Underlying
    }

    pub fn is_fasset(&self) -> bool {
        self.kind == TokenKind::FAsset
    }

    /// Maximum absolute difference at which two amounts still compare equal
    pub fn tolerance(&self) -> Decimal {
        pow10(self.kind.tolerance_offset() - self.decimals as i64)
    }

    /// Number of fractional digits needed to display an amount at tolerance resolution
    pub fn display_scale(&self) -> u32 {
        (self.decimals as i64 - self.kind.tolerance_offset()).max(0) as u32
    }

    /// Convert a decimal amount into smallest units, truncating extra precision.
    pub fn to_uba(&self, amount: Decimal) -> Result<u128, TypesError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(TypesError::NegativeAmount {
                token: self.name.clone(),
                amount: amount.to_string(),
            });
        }
        let scaled = amount
            .checked_mul(pow10(self.decimals as i64))
            .ok_or_else(|| TypesError::AmountOverflow {
                token: self.name.clone(),
                amount: amount.to_string(),
            })?;
        scaled.trunc().to_u128().ok_or_else(|| TypesError::AmountOverflow {
            token: self.name.clone(),
            amount: amount.to_string(),
        })
    }

    /// Convert smallest units into a decimal amount.
    pub fn from_uba(&self, uba: u128) -> Result<Decimal, TypesError> {
        let signed = i128::try_from(uba).map_err(|_| TypesError::AmountOverflow {
            token: self.name.clone(),
            amount: uba.to_string(),
        })?;
        Decimal::try_from_i128_with_scale(signed, self.decimals).map_err(|_| {
            TypesError::AmountOverflow {
                token: self.name.clone(),
                amount: uba.to_string(),
            }
        })
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The three tokens a single flow works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub native: Token,
    pub underlying: Token,
    pub fasset: Token,
}

impl TokenSet {
    pub fn new(native: Token, underlying: Token, fasset: Token) -> Self {
        Self {
            native,
            underlying,
            fasset,
        }
    }

    /// Coston2 / testXRP / FTestXRP
    pub fn coston2_test_xrp() -> Self {
        Self::new(Token::c2flr(), Token::test_xrp(), Token::ftest_xrp())
    }
}

impl Default for TokenSet {
    fn default() -> Self {
        Self::coston2_test_xrp()
    }
}

/// 10^exp as a decimal, for exp within decimal range
pub(crate) fn pow10(exp: i64) -> Decimal {
    if exp >= 0 {
        let mut value = Decimal::ONE;
        for _ in 0..exp.min(28) {
            value *= Decimal::TEN;
        }
        value
    } else {
        Decimal::new(1, (-exp).min(28) as u32)
    }
}
