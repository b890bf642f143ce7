use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::tax::{Percent, RewardWallets, TaxBreakdown, TaxEngine, TaxField, TaxPolicy};

mod access;
mod address;
mod error;
mod events;

pub use access::AccessLists;
pub use address::{Address, BURN_ADDRESS, RESERVE_ADDRESS};
pub use error::{LedgerError, LedgerResult};
pub use events::{EventRecord, LedgerEvent};

pub type Amount = u128;

pub const TOKEN_NAME: &str = "Combined Token";
pub const TOKEN_SYMBOL: &str = "COMB";
pub const DECIMALS: u8 = 18;
/// One whole token in base units.
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Balances, allowances, tax policy and access lists of a single token.
///
/// Every mutating method checks all of its guards before touching any
/// table, so an `Err` return means nothing changed.
#[derive(Clone, Debug)]
pub struct TaxedLedger {
    owner: Address,
    policy: TaxPolicy,
    wallets: RewardWallets,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
    access: AccessLists,
    events: Vec<EventRecord>,
}

/// Raw tables a ledger is rebuilt from (see `snapshot`).
pub(crate) struct LedgerParts {
    pub owner: Address,
    pub policy: TaxPolicy,
    pub wallets: RewardWallets,
    pub total_supply: Amount,
    pub balances: BTreeMap<Address, Amount>,
    pub allowances: BTreeMap<(Address, Address), Amount>,
    pub access: AccessLists,
    pub events: Vec<EventRecord>,
}

impl TaxedLedger {
    /// Deploys a ledger and mints `initial_supply` to `owner`.
    pub fn new(
        owner: Address,
        total_tax_percent: u64,
        burn_tax_percent: u64,
        wallet_tax_percent: u64,
        reward_wallets: Vec<Address>,
        initial_supply: Amount,
    ) -> LedgerResult<Self> {
        let wallets = RewardWallets::try_from(reward_wallets)?;
        let policy = TaxPolicy::new(total_tax_percent, burn_tax_percent, wallet_tax_percent)?;
        if owner.is_sink() {
            return Err(LedgerError::InvalidConfiguration(format!(
                "owner {owner} is a sink account"
            )));
        }

        let mut ledger = Self {
            owner,
            policy,
            wallets,
            total_supply: initial_supply,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            access: AccessLists::default(),
            events: Vec::new(),
        };
        ledger.credit_account(owner, initial_supply);
        ledger.record(LedgerEvent::Minted {
            to: owner,
            amount: initial_supply,
        });
        info!(
            %owner,
            supply = %initial_supply,
            total = %policy.total,
            burn = %policy.burn,
            wallet = %policy.wallet,
            "ledger deployed"
        );
        Ok(ledger)
    }

    pub(crate) fn from_parts(parts: LedgerParts) -> Self {
        Self {
            owner: parts.owner,
            policy: parts.policy,
            wallets: parts.wallets,
            total_supply: parts.total_supply,
            balances: parts.balances,
            allowances: parts.allowances,
            access: parts.access,
            events: parts.events,
        }
    }

    // ---- token metadata and reads ----

    pub fn name(&self) -> &'static str {
        TOKEN_NAME
    }

    pub fn symbol(&self) -> &'static str {
        TOKEN_SYMBOL
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Tokens parked at the burn address.
    pub fn burned_supply(&self) -> Amount {
        self.balance_of(&BURN_ADDRESS)
    }

    pub fn circulating_supply(&self) -> Amount {
        self.total_supply - self.burned_supply()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn policy(&self) -> TaxPolicy {
        self.policy
    }

    pub fn total_tax_percent(&self) -> Percent {
        self.policy.total
    }

    pub fn burn_tax_percent(&self) -> Percent {
        self.policy.burn
    }

    pub fn wallet_tax_percent(&self) -> Percent {
        self.policy.wallet
    }

    pub fn reward_wallets(&self) -> &[Address] {
        self.wallets.as_slice()
    }

    pub(crate) fn wallets(&self) -> &RewardWallets {
        &self.wallets
    }

    pub fn is_whitelisted(&self, account: &Address) -> bool {
        self.access.is_allowed(account)
    }

    /// Zero for accounts that are not allowlisted.
    pub fn max_transaction_amount(&self, account: &Address) -> Amount {
        self.access.max_transaction_amount(account).unwrap_or(0)
    }

    pub fn is_blacklisted(&self, account: &Address) -> bool {
        self.access.is_denied(account)
    }

    pub fn balances(&self) -> &BTreeMap<Address, Amount> {
        &self.balances
    }

    pub fn allowances(&self) -> &BTreeMap<(Address, Address), Amount> {
        &self.allowances
    }

    pub fn access(&self) -> &AccessLists {
        &self.access
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// What a transfer of `amount` from `sender` would pay, without the
    /// balance and denylist guards.
    pub fn quote(&self, sender: &Address, amount: Amount) -> TaxBreakdown {
        TaxEngine::new(&self.policy, &self.wallets, &self.access).assess(sender, amount)
    }

    /// Checks that balances sum to the minted supply and that the owner is
    /// not a sink. Wallet rules are enforced by [`RewardWallets`] itself.
    pub fn verify(&self) -> LedgerResult<()> {
        if self.owner.is_sink() {
            return Err(LedgerError::InvalidConfiguration(format!(
                "owner {} is a sink account",
                self.owner
            )));
        }
        let actual = self
            .balances
            .values()
            .try_fold(0 as Amount, |acc, v| acc.checked_add(*v))
            .unwrap_or(Amount::MAX);
        if actual != self.total_supply {
            return Err(LedgerError::ConservationViolated {
                expected: self.total_supply,
                actual,
            });
        }
        Ok(())
    }

    // ---- transfers ----

    pub fn transfer(
        &mut self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> LedgerResult<TaxBreakdown> {
        let breakdown = self.prepare_transfer(&sender, &recipient, amount)?;
        self.settle(sender, recipient, &breakdown)?;
        Ok(breakdown)
    }

    /// Moves `amount` out of `owner` on behalf of `spender`, taxed exactly like
    /// `transfer`. The allowance drops by the gross amount.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: Amount,
    ) -> LedgerResult<TaxBreakdown> {
        let approved = self.allowance(&owner, &spender);
        if approved < amount {
            debug!(%owner, %spender, approved = %approved, requested = %amount, "allowance exceeded");
            return Err(LedgerError::AllowanceExceeded {
                owner,
                spender,
                approved,
                requested: amount,
            });
        }
        let breakdown = self.prepare_transfer(&owner, &recipient, amount)?;
        self.settle(owner, recipient, &breakdown)?;
        self.allowances.insert((owner, spender), approved - amount);
        Ok(breakdown)
    }

    /// Sets the allowance unconditionally.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        self.allowances.insert((owner, spender), amount);
        self.record(LedgerEvent::Approval {
            owner,
            spender,
            amount,
        });
        debug!(%owner, %spender, amount = %amount, "allowance set");
    }

    fn ensure_can_transfer(&self, from: &Address, to: &Address) -> LedgerResult<()> {
        for party in [from, to] {
            if self.access.is_denied(party) {
                debug!(address = %party, "transfer party is denylisted");
                return Err(LedgerError::AddressDenied { address: *party });
            }
        }
        if from.is_sink() {
            debug!(address = %from, "sink account cannot send");
            return Err(LedgerError::AddressDenied { address: *from });
        }
        Ok(())
    }

    fn prepare_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> LedgerResult<TaxBreakdown> {
        self.ensure_can_transfer(from, to)?;
        let available = self.balance_of(from);
        if available < amount {
            debug!(account = %from, available = %available, required = %amount, "insufficient balance");
            return Err(LedgerError::InsufficientBalance {
                account: *from,
                available,
                required: amount,
            });
        }
        Ok(self.quote(from, amount))
    }

    /// The denylist binds the two transfer parties only. Burn, reward wallets
    /// and reserve are credited their shares regardless.
    fn settle(&mut self, from: Address, to: Address, breakdown: &TaxBreakdown) -> LedgerResult<()> {
        self.debit_account(&from, breakdown.gross)?;
        self.credit_account(to, breakdown.net);
        self.credit_account(BURN_ADDRESS, breakdown.burn);
        let shares: Vec<(Address, Amount)> = self
            .wallets
            .as_slice()
            .iter()
            .copied()
            .zip(breakdown.wallet_shares)
            .collect();
        for (wallet, share) in shares {
            self.credit_account(wallet, share);
        }
        self.credit_account(RESERVE_ADDRESS, breakdown.retained);

        self.record(LedgerEvent::TransferWithTax {
            from,
            to,
            amount: breakdown.gross,
            net: breakdown.net,
            tax: breakdown.tax,
            burn: breakdown.burn,
            wallet: breakdown.wallet,
            retained: breakdown.retained,
            exempt: breakdown.exempt,
        });
        info!(
            %from,
            %to,
            amount = %breakdown.gross,
            net = %breakdown.net,
            tax = %breakdown.tax,
            exempt = breakdown.exempt,
            "transfer settled"
        );
        Ok(())
    }

    fn credit_account(&mut self, account: Address, amount: Amount) {
        if amount == 0 {
            return;
        }
        *self.balances.entry(account).or_insert(0) += amount;
    }

    fn debit_account(&mut self, account: &Address, amount: Amount) -> LedgerResult<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *account,
                available,
                required: amount,
            });
        }
        if amount > 0 {
            self.balances.insert(*account, available - amount);
        }
        Ok(())
    }

    // ---- owner-only administration ----

    fn ensure_owner(&self, caller: &Address) -> LedgerResult<()> {
        if *caller != self.owner {
            debug!(%caller, "rejected owner-only call");
            return Err(LedgerError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    pub fn add_to_whitelist(
        &mut self,
        caller: Address,
        account: Address,
        max_transaction_amount: Amount,
    ) -> LedgerResult<()> {
        self.ensure_owner(&caller)?;
        self.access.allow(account, max_transaction_amount);
        self.record(LedgerEvent::WhitelistUpdated {
            account,
            max_transaction_amount: Some(max_transaction_amount),
        });
        info!(%account, cap = %max_transaction_amount, "allowlisted");
        Ok(())
    }

    pub fn remove_from_whitelist(&mut self, caller: Address, account: Address) -> LedgerResult<()> {
        self.ensure_owner(&caller)?;
        self.access.disallow(&account);
        self.record(LedgerEvent::WhitelistUpdated {
            account,
            max_transaction_amount: None,
        });
        info!(%account, "removed from allowlist");
        Ok(())
    }

    pub fn add_to_blacklist(&mut self, caller: Address, account: Address) -> LedgerResult<()> {
        self.ensure_owner(&caller)?;
        self.access.deny(account);
        self.record(LedgerEvent::BlacklistUpdated {
            account,
            denied: true,
        });
        info!(%account, "denylisted");
        Ok(())
    }

    pub fn remove_from_blacklist(&mut self, caller: Address, account: Address) -> LedgerResult<()> {
        self.ensure_owner(&caller)?;
        self.access.undeny(&account);
        self.record(LedgerEvent::BlacklistUpdated {
            account,
            denied: false,
        });
        info!(%account, "removed from denylist");
        Ok(())
    }

    pub fn set_tax_percent(
        &mut self,
        caller: Address,
        field: TaxField,
        value: u64,
    ) -> LedgerResult<()> {
        self.ensure_owner(&caller)?;
        let new = Percent::new(value).inspect_err(|_| {
            debug!(%field, value, "rejected tax percentage");
        })?;
        let old = self.policy.set(field, new);
        self.record(LedgerEvent::TaxPolicyUpdated { field, old, new });
        info!(%field, %old, %new, "tax rate updated");
        Ok(())
    }

    pub fn set_total_tax_percent(&mut self, caller: Address, value: u64) -> LedgerResult<()> {
        self.set_tax_percent(caller, TaxField::Total, value)
    }

    pub fn set_burn_tax_percent(&mut self, caller: Address, value: u64) -> LedgerResult<()> {
        self.set_tax_percent(caller, TaxField::Burn, value)
    }

    pub fn set_wallet_tax_percent(&mut self, caller: Address, value: u64) -> LedgerResult<()> {
        self.set_tax_percent(caller, TaxField::Wallet, value)
    }

    fn record(&mut self, event: LedgerEvent) {
        let sequence = self.events.len() as u64;
        self.events.push(EventRecord { sequence, event });
    }
}
