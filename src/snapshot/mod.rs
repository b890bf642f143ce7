//! Persisted form of a [`TaxedLedger`].
//!
//! A snapshot carries every table plus a SHA-256 state root over balances,
//! allowances, access lists, policy and wallets. The root is recomputed on
//! restore, so a hand-edited state file is rejected instead of loaded.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::ledger::{
    AccessLists, Address, Amount, EventRecord, LedgerError, LedgerParts, LedgerResult,
    TaxedLedger, DECIMALS, TOKEN_NAME, TOKEN_SYMBOL,
};
use crate::tax::{RewardWallets, TaxPolicy};

pub const SNAPSHOT_VERSION: u8 = 1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotMetadata {
    pub version: u8,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Number of audit log entries at snapshot time.
    pub height: u64,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllowanceEntry {
    pub owner: Address,
    pub spender: Address,
    #[serde_as(as = "DisplayFromStr")]
    pub amount: Amount,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub owner: Address,
    pub policy: TaxPolicy,
    pub reward_wallets: RewardWallets,
    #[serde_as(as = "DisplayFromStr")]
    pub total_supply: Amount,
    #[serde_as(as = "BTreeMap<_, DisplayFromStr>")]
    pub balances: BTreeMap<Address, Amount>,
    pub allowances: Vec<AllowanceEntry>,
    #[serde_as(as = "BTreeMap<_, DisplayFromStr>")]
    pub whitelist: BTreeMap<Address, Amount>,
    pub blacklist: BTreeSet<Address>,
    pub events: Vec<EventRecord>,
    #[serde(with = "hex_root")]
    pub state_root: [u8; 32],
}

impl LedgerSnapshot {
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }

    /// Writes the snapshot as pretty JSON, creating parent directories.
    /// The file is written beside `path` and renamed over it.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_vec_pretty(self).context("encode ledger snapshot")?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("rename onto {}", path.display()))?;
        debug!(path = %path.display(), root = %self.state_root_hex(), "snapshot saved");
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
    }
}

impl TaxedLedger {
    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(
            &self.owner(),
            &self.policy(),
            self.reward_wallets(),
            self.total_supply(),
            self.events().len() as u64,
            self.balances(),
            self.allowances(),
            self.access(),
        )
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: SnapshotMetadata {
                version: SNAPSHOT_VERSION,
                name: TOKEN_NAME.to_string(),
                symbol: TOKEN_SYMBOL.to_string(),
                decimals: DECIMALS,
                height: self.events().len() as u64,
            },
            owner: self.owner(),
            policy: self.policy(),
            reward_wallets: self.wallets().clone(),
            total_supply: self.total_supply(),
            balances: self.balances().clone(),
            allowances: self
                .allowances()
                .iter()
                .map(|((owner, spender), amount)| AllowanceEntry {
                    owner: *owner,
                    spender: *spender,
                    amount: *amount,
                })
                .collect(),
            whitelist: self.access().allowlist().clone(),
            blacklist: self.access().denylist().clone(),
            events: self.events().to_vec(),
            state_root: self.state_root(),
        }
    }

    /// Rebuilds a ledger, rejecting snapshots whose recorded root or supply
    /// does not match their tables.
    pub fn restore(snapshot: LedgerSnapshot) -> LedgerResult<Self> {
        if snapshot.meta.version != SNAPSHOT_VERSION {
            return Err(LedgerError::InvalidConfiguration(format!(
                "unsupported snapshot version {}",
                snapshot.meta.version
            )));
        }
        if snapshot.meta.height != snapshot.events.len() as u64 {
            return Err(LedgerError::InvalidConfiguration(format!(
                "snapshot height {} does not match {} events",
                snapshot.meta.height,
                snapshot.events.len()
            )));
        }
        let recorded = snapshot.state_root;
        let ledger = TaxedLedger::from_parts(LedgerParts {
            owner: snapshot.owner,
            policy: snapshot.policy,
            wallets: snapshot.reward_wallets,
            total_supply: snapshot.total_supply,
            balances: snapshot.balances,
            allowances: snapshot
                .allowances
                .into_iter()
                .map(|e| ((e.owner, e.spender), e.amount))
                .collect(),
            access: AccessLists::from_parts(snapshot.whitelist, snapshot.blacklist),
            events: snapshot.events,
        });
        let computed = ledger.state_root();
        if computed != recorded {
            return Err(LedgerError::CorruptSnapshot {
                recorded: hex::encode(recorded),
                computed: hex::encode(computed),
            });
        }
        ledger.verify()?;
        info!(root = %hex::encode(computed), height = ledger.events().len(), "ledger restored");
        Ok(ledger)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.snapshot().save(path)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let snapshot = LedgerSnapshot::load(path)?;
        Ok(TaxedLedger::restore(snapshot)?)
    }
}

#[allow(clippy::too_many_arguments)]
fn compute_state_root(
    owner: &Address,
    policy: &TaxPolicy,
    wallets: &[Address],
    total_supply: Amount,
    height: u64,
    balances: &BTreeMap<Address, Amount>,
    allowances: &BTreeMap<(Address, Address), Amount>,
    access: &AccessLists,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();

    let mut hasher = Sha256::new();
    hasher.update(b"meta");
    hasher.update(owner.as_bytes());
    hasher.update(total_supply.to_le_bytes());
    hasher.update(height.to_le_bytes());
    hasher.update([policy.total.value(), policy.burn.value(), policy.wallet.value()]);
    for wallet in wallets {
        hasher.update(wallet.as_bytes());
    }
    leaves.push(hasher.finalize().into());

    for (account, amount) in balances {
        let mut hasher = Sha256::new();
        hasher.update(b"bal");
        hasher.update(account.as_bytes());
        hasher.update(amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for ((owner, spender), amount) in allowances {
        let mut hasher = Sha256::new();
        hasher.update(b"allow");
        hasher.update(owner.as_bytes());
        hasher.update(spender.as_bytes());
        hasher.update(amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (account, cap) in access.allowlist() {
        let mut hasher = Sha256::new();
        hasher.update(b"white");
        hasher.update(account.as_bytes());
        hasher.update(cap.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for account in access.denylist() {
        let mut hasher = Sha256::new();
        hasher.update(b"black");
        hasher.update(account.as_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"comb-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            // odd node pairs with itself
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| D::Error::custom(format!("expected 32 bytes, got {}", b.len())))
    }
}
