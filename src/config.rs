use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::ledger::{Address, Amount, LedgerResult, TaxedLedger, UNIT};

pub const DEFAULT_TOTAL_TAX_PERCENT: u64 = 7;
pub const DEFAULT_BURN_TAX_PERCENT: u64 = 2;
pub const DEFAULT_WALLET_TAX_PERCENT: u64 = 1;
pub const DEFAULT_INITIAL_SUPPLY: Amount = 1_000_000_000 * UNIT;

/// Reward wallets of the reference deployment.
pub const DEFAULT_REWARD_WALLETS: [&str; 5] = [
    "0x99c50a67C6B59d6b89a2FE8fd1cd43Cb604883b8",
    "0x9B7A0bD3d17D75287423ddC14a1fA5A47B8eEA2c",
    "0x177aE3E7534F05608F1921eC9EfD1f022E2773D5",
    "0x677C93dDDe4fb76375aB91a84Cad3b914C423ac8",
    "0x077459a20210855048FcFB68361a0A35838E30a8",
];

/// Deployment parameters. Everything but `owner` has a default.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployConfig {
    pub owner: Address,
    #[serde(default = "default_total")]
    pub total_tax_percent: u64,
    #[serde(default = "default_burn")]
    pub burn_tax_percent: u64,
    #[serde(default = "default_wallet")]
    pub wallet_tax_percent: u64,
    #[serde(default = "default_reward_wallets")]
    pub reward_wallets: Vec<Address>,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_supply")]
    pub initial_supply: Amount,
}

fn default_total() -> u64 {
    DEFAULT_TOTAL_TAX_PERCENT
}

fn default_burn() -> u64 {
    DEFAULT_BURN_TAX_PERCENT
}

fn default_wallet() -> u64 {
    DEFAULT_WALLET_TAX_PERCENT
}

fn default_supply() -> Amount {
    DEFAULT_INITIAL_SUPPLY
}

pub fn default_reward_wallets() -> Vec<Address> {
    DEFAULT_REWARD_WALLETS
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}

impl DeployConfig {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            total_tax_percent: DEFAULT_TOTAL_TAX_PERCENT,
            burn_tax_percent: DEFAULT_BURN_TAX_PERCENT,
            wallet_tax_percent: DEFAULT_WALLET_TAX_PERCENT,
            reward_wallets: default_reward_wallets(),
            initial_supply: DEFAULT_INITIAL_SUPPLY,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
    }

    pub fn deploy(&self) -> LedgerResult<TaxedLedger> {
        TaxedLedger::new(
            self.owner,
            self.total_tax_percent,
            self.burn_tax_percent,
            self.wallet_tax_percent,
            self.reward_wallets.clone(),
            self.initial_supply,
        )
    }
}
