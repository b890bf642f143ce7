use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use super::{Address, Amount};
use crate::tax::{Percent, TaxField};

/// Audit log entry. The log is append-only; `sequence` starts at 0 and
/// increases by one per entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub sequence: u64,
    pub event: LedgerEvent,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Minted {
        to: Address,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
    },
    TransferWithTax {
        from: Address,
        to: Address,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
        #[serde_as(as = "DisplayFromStr")]
        net: Amount,
        #[serde_as(as = "DisplayFromStr")]
        tax: Amount,
        #[serde_as(as = "DisplayFromStr")]
        burn: Amount,
        #[serde_as(as = "DisplayFromStr")]
        wallet: Amount,
        #[serde_as(as = "DisplayFromStr")]
        retained: Amount,
        exempt: bool,
    },
    Approval {
        owner: Address,
        spender: Address,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
    },
    WhitelistUpdated {
        account: Address,
        /// `None` when the entry was removed.
        #[serde_as(as = "Option<DisplayFromStr>")]
        max_transaction_amount: Option<Amount>,
    },
    BlacklistUpdated {
        account: Address,
        denied: bool,
    },
    TaxPolicyUpdated {
        field: TaxField,
        old: Percent,
        new: Percent,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_event_encodes_amounts_as_strings() {
        let record = EventRecord {
            sequence: 3,
            event: LedgerEvent::TransferWithTax {
                from: Address::repeat_byte(1),
                to: Address::repeat_byte(2),
                amount: u128::MAX,
                net: 93,
                tax: 7,
                burn: 0,
                wallet: 0,
                retained: 7,
                exempt: false,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"]["type"], "transfer_with_tax");
        assert_eq!(json["event"]["amount"], u128::MAX.to_string());
        let back: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
