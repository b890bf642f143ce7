use thiserror::Error;

use super::{Address, Amount};

/// Every way a ledger operation can be rejected. A rejected call leaves the
/// ledger untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Constructor arguments that can never produce a valid ledger.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Tax percentage outside 0..=100.
    #[error("invalid percentage {value}: must be within 0..=100")]
    InvalidPercentage { value: u64 },

    /// Owner-only operation attempted by someone else.
    #[error("{caller} is not the ledger owner")]
    Unauthorized { caller: Address },

    /// Denylisted party, or a sink account trying to send.
    #[error("address {address} is denied")]
    AddressDenied { address: Address },

    #[error("insufficient balance in {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        required: Amount,
    },

    #[error("allowance exceeded: {spender} may move {approved} from {owner}, requested {requested}")]
    AllowanceExceeded {
        owner: Address,
        spender: Address,
        approved: Amount,
        requested: Amount,
    },

    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("snapshot state root mismatch: recorded {recorded}, computed {computed}")]
    CorruptSnapshot { recorded: String, computed: String },

    #[error("conservation violated: balances sum to {actual}, minted supply is {expected}")]
    ConservationViolated { expected: Amount, actual: Amount },
}

pub type LedgerResult<T> = Result<T, LedgerError>;
