//! Off-chain ledger for the Combined Token (COMB).
//!
//! * [`ledger`]: balances, allowances, allow/deny lists, audit log.
//! * [`tax`]: tax policy and the split of a transfer into net, burn,
//!   reward-wallet and retained parts.
//! * [`snapshot`]: JSON persistence with a SHA-256 state root.
//! * [`shared`]: single-writer transactional handle for multi-threaded use.
//! * [`config`]: deployment parameters.

pub mod config;
pub mod ledger;
pub mod shared;
pub mod snapshot;
pub mod tax;

pub use config::DeployConfig;
pub use ledger::{Address, Amount, LedgerError, LedgerEvent, TaxedLedger, BURN_ADDRESS, RESERVE_ADDRESS};
pub use shared::SharedLedger;
pub use snapshot::LedgerSnapshot;
pub use tax::{Percent, TaxBreakdown, TaxField, TaxPolicy};
