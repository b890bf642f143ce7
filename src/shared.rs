//! Thread-safe handle around a [`TaxedLedger`].
//!
//! One writer at a time. Single operations run directly under the write lock:
//! every `TaxedLedger` method checks its guards before mutating, so a
//! rejected call leaves nothing behind. A multi-step transaction works on a
//! staged copy while holding the write lock; commit swaps the copy in,
//! rollback (or dropping the transaction) discards it. Readers never see a
//! half-applied batch.

use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::ledger::{Address, Amount, LedgerResult, TaxedLedger};
use crate::snapshot::LedgerSnapshot;
use crate::tax::{TaxBreakdown, TaxField};

#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<TaxedLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: TaxedLedger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Runs `f` against a consistent view of the ledger.
    pub fn read<R>(&self, f: impl FnOnce(&TaxedLedger) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.read(TaxedLedger::snapshot)
    }

    pub fn begin(&self) -> Transaction<'_> {
        let guard = self.inner.write();
        let staged = guard.clone();
        Transaction { guard, staged }
    }

    /// Applies `f` atomically: every change it makes is kept on `Ok` and
    /// discarded on `Err`. Clones the ledger, so keep it for batches.
    pub fn transaction<R, E>(
        &self,
        f: impl FnOnce(&mut TaxedLedger) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut tx = self.begin();
        match f(&mut tx) {
            Ok(value) => {
                tx.commit();
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }

    pub fn transfer(
        &self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> LedgerResult<TaxBreakdown> {
        self.inner.write().transfer(sender, recipient, amount)
    }

    pub fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: Amount,
    ) -> LedgerResult<TaxBreakdown> {
        self.inner.write().transfer_from(spender, owner, recipient, amount)
    }

    pub fn approve(&self, owner: Address, spender: Address, amount: Amount) {
        self.inner.write().approve(owner, spender, amount);
    }

    pub fn add_to_whitelist(
        &self,
        caller: Address,
        account: Address,
        max_transaction_amount: Amount,
    ) -> LedgerResult<()> {
        self.inner
            .write()
            .add_to_whitelist(caller, account, max_transaction_amount)
    }

    pub fn remove_from_whitelist(&self, caller: Address, account: Address) -> LedgerResult<()> {
        self.inner.write().remove_from_whitelist(caller, account)
    }

    pub fn add_to_blacklist(&self, caller: Address, account: Address) -> LedgerResult<()> {
        self.inner.write().add_to_blacklist(caller, account)
    }

    pub fn remove_from_blacklist(&self, caller: Address, account: Address) -> LedgerResult<()> {
        self.inner.write().remove_from_blacklist(caller, account)
    }

    pub fn set_tax_percent(&self, caller: Address, field: TaxField, value: u64) -> LedgerResult<()> {
        self.inner.write().set_tax_percent(caller, field, value)
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.read(|l| l.balance_of(account))
    }
}

/// Open transaction. Dereferences to the staged ledger.
pub struct Transaction<'a> {
    guard: RwLockWriteGuard<'a, TaxedLedger>,
    staged: TaxedLedger,
}

impl Transaction<'_> {
    pub fn commit(mut self) {
        std::mem::swap(&mut *self.guard, &mut self.staged);
        debug!(height = self.guard.events().len(), "transaction committed");
    }

    pub fn rollback(self) {
        debug!("transaction rolled back");
    }
}

impl Deref for Transaction<'_> {
    type Target = TaxedLedger;

    fn deref(&self) -> &TaxedLedger {
        &self.staged
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut TaxedLedger {
        &mut self.staged
    }
}
