use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::ledger::{AccessLists, Address, Amount, LedgerError, BURN_ADDRESS, RESERVE_ADDRESS};

pub const REWARD_WALLET_COUNT: usize = 5;

/// Whole-number percentage in 0..=100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const FULL: Percent = Percent(100);

    pub fn new(value: u64) -> Result<Self, LedgerError> {
        if value > 100 {
            return Err(LedgerError::InvalidPercentage { value });
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// `floor(amount * self / 100)` without overflowing on large amounts.
    pub fn of(self, amount: Amount) -> Amount {
        let p = self.0 as Amount;
        (amount / 100) * p + (amount % 100) * p / 100
    }
}

impl TryFrom<u64> for Percent {
    type Error = LedgerError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percent> for u64 {
    fn from(p: Percent) -> Self {
        p.0 as u64
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Which of the three policy rates a mutation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxField {
    Total,
    Burn,
    Wallet,
}

impl fmt::Display for TaxField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaxField::Total => "total",
            TaxField::Burn => "burn",
            TaxField::Wallet => "wallet",
        };
        f.write_str(name)
    }
}

/// `total` is withheld from the gross amount; `burn` and `wallet` are
/// fractions of the withheld tax, not of the gross amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub total: Percent,
    pub burn: Percent,
    pub wallet: Percent,
}

impl TaxPolicy {
    pub fn new(total: u64, burn: u64, wallet: u64) -> Result<Self, LedgerError> {
        Ok(Self {
            total: Percent::new(total)?,
            burn: Percent::new(burn)?,
            wallet: Percent::new(wallet)?,
        })
    }

    pub fn get(&self, field: TaxField) -> Percent {
        match field {
            TaxField::Total => self.total,
            TaxField::Burn => self.burn,
            TaxField::Wallet => self.wallet,
        }
    }

    /// Overwrites one rate and returns the previous value.
    pub fn set(&mut self, field: TaxField, value: Percent) -> Percent {
        let slot = match field {
            TaxField::Total => &mut self.total,
            TaxField::Burn => &mut self.burn,
            TaxField::Wallet => &mut self.wallet,
        };
        std::mem::replace(slot, value)
    }
}

/// The five reward wallets, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Address>", into = "Vec<Address>")]
pub struct RewardWallets([Address; REWARD_WALLET_COUNT]);

impl RewardWallets {
    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    /// Equal shares; the division remainder goes to the first wallet.
    pub fn split(&self, amount: Amount) -> [Amount; REWARD_WALLET_COUNT] {
        let count = REWARD_WALLET_COUNT as Amount;
        let mut shares = [amount / count; REWARD_WALLET_COUNT];
        shares[0] += amount % count;
        shares
    }
}

impl TryFrom<Vec<Address>> for RewardWallets {
    type Error = LedgerError;

    fn try_from(wallets: Vec<Address>) -> Result<Self, Self::Error> {
        if wallets.len() != REWARD_WALLET_COUNT {
            return Err(LedgerError::InvalidConfiguration(format!(
                "expected {REWARD_WALLET_COUNT} reward wallets, got {}",
                wallets.len()
            )));
        }
        for (idx, wallet) in wallets.iter().enumerate() {
            if wallets[..idx].contains(wallet) {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "reward wallet {wallet} listed twice"
                )));
            }
            if *wallet == BURN_ADDRESS || *wallet == RESERVE_ADDRESS {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "reward wallet {wallet} is a sink account"
                )));
            }
        }
        let mut out = [Address::ZERO; REWARD_WALLET_COUNT];
        out.copy_from_slice(&wallets);
        Ok(Self(out))
    }
}

impl From<RewardWallets> for Vec<Address> {
    fn from(wallets: RewardWallets) -> Self {
        wallets.0.to_vec()
    }
}

/// How one transfer's gross amount is divided.
/// `net + burn + wallet + retained == gross` always holds.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    #[serde_as(as = "DisplayFromStr")]
    pub gross: Amount,
    #[serde_as(as = "DisplayFromStr")]
    pub net: Amount,
    #[serde_as(as = "DisplayFromStr")]
    pub tax: Amount,
    #[serde_as(as = "DisplayFromStr")]
    pub burn: Amount,
    #[serde_as(as = "DisplayFromStr")]
    pub wallet: Amount,
    #[serde_as(as = "DisplayFromStr")]
    pub retained: Amount,
    pub exempt: bool,
    #[serde_as(as = "[DisplayFromStr; REWARD_WALLET_COUNT]")]
    pub wallet_shares: [Amount; REWARD_WALLET_COUNT],
}

impl TaxBreakdown {
    fn untaxed(amount: Amount) -> Self {
        Self {
            gross: amount,
            net: amount,
            tax: 0,
            burn: 0,
            wallet: 0,
            retained: 0,
            exempt: true,
            wallet_shares: [0; REWARD_WALLET_COUNT],
        }
    }
}

pub struct TaxEngine<'a> {
    policy: &'a TaxPolicy,
    wallets: &'a RewardWallets,
    access: &'a AccessLists,
}

impl<'a> TaxEngine<'a> {
    pub fn new(policy: &'a TaxPolicy, wallets: &'a RewardWallets, access: &'a AccessLists) -> Self {
        Self {
            policy,
            wallets,
            access,
        }
    }

    /// Allowlisted senders moving at most their cap pay nothing.
    pub fn is_exempt(&self, sender: &Address, amount: Amount) -> bool {
        matches!(self.access.max_transaction_amount(sender), Some(cap) if amount <= cap)
    }

    pub fn assess(&self, sender: &Address, amount: Amount) -> TaxBreakdown {
        if self.is_exempt(sender, amount) {
            return TaxBreakdown::untaxed(amount);
        }
        let tax = self.policy.total.of(amount);
        let burn = self.policy.burn.of(tax);
        // burn + wallet may not exceed the withheld tax when both rates are high
        let wallet = self.policy.wallet.of(tax).min(tax - burn);
        TaxBreakdown {
            gross: amount,
            net: amount - tax,
            tax,
            burn,
            wallet,
            retained: tax - burn - wallet,
            exempt: false,
            wallet_shares: self.wallets.split(wallet),
        }
    }
}
