use std::collections::{BTreeMap, BTreeSet};

use super::{Address, Amount};

/// Allowlist (tax exemption up to a per-address cap) and denylist.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessLists {
    allowlist: BTreeMap<Address, Amount>,
    denylist: BTreeSet<Address>,
}

impl AccessLists {
    pub fn from_parts(allowlist: BTreeMap<Address, Amount>, denylist: BTreeSet<Address>) -> Self {
        Self {
            allowlist,
            denylist,
        }
    }

    /// Inserts or overwrites the cap. Returns the previous cap, if any.
    pub fn allow(&mut self, account: Address, cap: Amount) -> Option<Amount> {
        self.allowlist.insert(account, cap)
    }

    pub fn disallow(&mut self, account: &Address) -> Option<Amount> {
        self.allowlist.remove(account)
    }

    pub fn max_transaction_amount(&self, account: &Address) -> Option<Amount> {
        self.allowlist.get(account).copied()
    }

    pub fn is_allowed(&self, account: &Address) -> bool {
        self.allowlist.contains_key(account)
    }

    /// Returns `true` if the account was not already denied.
    pub fn deny(&mut self, account: Address) -> bool {
        self.denylist.insert(account)
    }

    pub fn undeny(&mut self, account: &Address) -> bool {
        self.denylist.remove(account)
    }

    pub fn is_denied(&self, account: &Address) -> bool {
        self.denylist.contains(account)
    }

    pub fn allowlist(&self) -> &BTreeMap<Address, Amount> {
        &self.allowlist
    }

    pub fn denylist(&self) -> &BTreeSet<Address> {
        &self.denylist
    }
}
