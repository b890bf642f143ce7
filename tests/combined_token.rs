use comb_ledger::{
    config::DeployConfig,
    ledger::{Amount, UNIT},
    Address, LedgerError, LedgerEvent, SharedLedger, TaxField, TaxedLedger, BURN_ADDRESS,
    RESERVE_ADDRESS,
};
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn owner() -> Address {
    "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap()
}

fn addr1() -> Address {
    "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap()
}

fn addr2() -> Address {
    "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc".parse().unwrap()
}

fn deploy() -> TaxedLedger {
    DeployConfig::new(owner()).deploy().unwrap()
}

#[test]
fn deploys_with_reference_metadata() {
    let ledger = deploy();
    assert_eq!(ledger.name(), "Combined Token");
    assert_eq!(ledger.symbol(), "COMB");
    assert_eq!(ledger.decimals(), 18);
    assert_eq!(ledger.total_supply(), 1_000_000_000 * UNIT);
    assert_eq!(ledger.balance_of(&owner()), ledger.total_supply());
    assert_eq!(ledger.total_tax_percent().value(), 7);
    assert_eq!(ledger.burn_tax_percent().value(), 2);
    assert_eq!(ledger.wallet_tax_percent().value(), 1);
    assert_eq!(ledger.reward_wallets().len(), 5);
}

#[test]
fn whitelist_add_and_remove() {
    let mut ledger = deploy();
    ledger.add_to_whitelist(owner(), addr1(), 100).unwrap();
    assert!(ledger.is_whitelisted(&addr1()));
    assert_eq!(ledger.max_transaction_amount(&addr1()), 100);

    ledger.remove_from_whitelist(owner(), addr1()).unwrap();
    assert!(!ledger.is_whitelisted(&addr1()));
    assert_eq!(ledger.max_transaction_amount(&addr1()), 0);
}

#[test]
fn blacklist_add_and_remove() {
    let mut ledger = deploy();
    ledger.add_to_blacklist(owner(), addr1()).unwrap();
    assert!(ledger.is_blacklisted(&addr1()));
    ledger.remove_from_blacklist(owner(), addr1()).unwrap();
    assert!(!ledger.is_blacklisted(&addr1()));
}

#[test]
fn owner_sets_tax_percentages() {
    let mut ledger = deploy();
    ledger.set_total_tax_percent(owner(), 10).unwrap();
    ledger.set_burn_tax_percent(owner(), 3).unwrap();
    ledger.set_wallet_tax_percent(owner(), 2).unwrap();
    assert_eq!(ledger.total_tax_percent().value(), 10);
    assert_eq!(ledger.burn_tax_percent().value(), 3);
    assert_eq!(ledger.wallet_tax_percent().value(), 2);

    let policy_events = ledger
        .events()
        .iter()
        .filter(|r| matches!(r.event, LedgerEvent::TaxPolicyUpdated { .. }))
        .count();
    assert_eq!(policy_events, 3);
}

#[test]
fn non_owner_cannot_administer() {
    let mut ledger = deploy();
    let before = ledger.state_root();
    let denied = LedgerError::Unauthorized { caller: addr1() };
    assert_eq!(ledger.add_to_whitelist(addr1(), addr1(), 1), Err(denied.clone()));
    assert_eq!(ledger.add_to_blacklist(addr1(), addr2()), Err(denied.clone()));
    assert_eq!(
        ledger.set_tax_percent(addr1(), TaxField::Burn, 5),
        Err(denied)
    );
    assert_eq!(ledger.state_root(), before);
}

#[test]
fn rejects_percentages_above_one_hundred() {
    let mut ledger = deploy();
    assert_eq!(
        ledger.set_total_tax_percent(owner(), 101),
        Err(LedgerError::InvalidPercentage { value: 101 })
    );
    assert_eq!(ledger.total_tax_percent().value(), 7);
    ledger.set_total_tax_percent(owner(), 100).unwrap();
}

#[test]
fn transfer_of_one_hundred_pays_seven_percent() {
    let mut ledger = deploy();
    let breakdown = ledger.transfer(owner(), addr1(), 100).unwrap();
    assert_eq!(ledger.balance_of(&addr1()), 93);
    assert_eq!(breakdown.tax, 7);

    // 2% and 1% of a 7-unit tax both floor to zero
    assert_eq!(ledger.balance_of(&BURN_ADDRESS), 0);
    let wallet_total: Amount = ledger
        .reward_wallets()
        .iter()
        .map(|w| ledger.balance_of(w))
        .sum();
    assert_eq!(wallet_total, 0);
    assert_eq!(ledger.balance_of(&RESERVE_ADDRESS), 7);
    ledger.verify().unwrap();
}

#[test]
fn transfer_from_spends_allowance_and_is_taxed() {
    let mut ledger = deploy();
    ledger.approve(owner(), addr1(), 1_000);
    let breakdown = ledger.transfer_from(addr1(), owner(), addr2(), 600).unwrap();
    assert_eq!(breakdown.net, 558);
    assert_eq!(ledger.balance_of(&addr2()), 558);
    assert_eq!(ledger.allowance(&owner(), &addr1()), 400);

    let err = ledger
        .transfer_from(addr1(), owner(), addr2(), 401)
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::AllowanceExceeded {
            owner: owner(),
            spender: addr1(),
            approved: 400,
            requested: 401,
        }
    );
}

#[test]
fn denylisted_recipient_blocks_transfer() {
    let mut ledger = deploy();
    ledger.add_to_blacklist(owner(), addr2()).unwrap();
    assert_eq!(
        ledger.transfer(owner(), addr2(), 1),
        Err(LedgerError::AddressDenied { address: addr2() })
    );
}

#[test]
fn state_file_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("comb-state.json");

    let mut ledger = deploy();
    ledger.transfer(owner(), addr1(), 10 * UNIT).unwrap();
    ledger.add_to_whitelist(owner(), addr1(), UNIT).unwrap();
    ledger.save(&path).unwrap();

    let mut reloaded = TaxedLedger::load(&path).unwrap();
    assert_eq!(reloaded.state_root(), ledger.state_root());
    // exempt under the cap
    let b = reloaded.transfer(addr1(), addr2(), UNIT).unwrap();
    assert!(b.exempt);
    assert_eq!(reloaded.balance_of(&addr2()), UNIT);
}

#[test]
fn seeded_random_workload_through_shared_handle() {
    let ledger = SharedLedger::new(deploy());
    let accounts: Vec<Address> = (1..=6u8).map(|b| Address::repeat_byte(0x50 + b)).collect();
    for a in &accounts {
        ledger.transfer(owner(), *a, 1_000 * UNIT).unwrap();
    }
    let mut rng = StdRng::seed_from_u64(7);
    let mut settled = 0;
    for _ in 0..500 {
        let from = accounts[rng.gen_range(0..accounts.len())];
        let to = accounts[rng.gen_range(0..accounts.len())];
        let amount = rng.gen_range(0..10 * UNIT);
        match ledger.transfer(from, to, amount) {
            Ok(b) => {
                assert_eq!(b.gross, amount);
                settled += 1;
            }
            Err(LedgerError::InsufficientBalance { account, .. }) => assert_eq!(account, from),
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }
    // each account starts with 930 tokens and moves at most 10 at a time
    assert!(settled >= 450, "only {settled} transfers settled");
    ledger.read(|l| l.verify()).unwrap();
}

#[derive(Clone, Debug)]
enum Op {
    Transfer { from: usize, to: usize, amount: Amount },
    TransferFrom { spender: usize, from: usize, to: usize, amount: Amount },
    Approve { owner: usize, spender: usize, amount: Amount },
    Whitelist { account: usize, cap: Amount },
    Unwhitelist { account: usize },
    Blacklist { account: usize },
    Unblacklist { account: usize },
    SetTax { field: u8, value: u64 },
}

// index 0 is the owner
const ACCOUNTS: usize = 5;

fn account(idx: usize) -> Address {
    if idx == 0 {
        owner()
    } else {
        Address::repeat_byte(0x60 + idx as u8)
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let idx = 0..ACCOUNTS;
    let amount = 0..5_000u128;
    prop_oneof![
        4 => (idx.clone(), idx.clone(), amount.clone())
            .prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
        2 => (idx.clone(), idx.clone(), idx.clone(), amount.clone())
            .prop_map(|(spender, from, to, amount)| Op::TransferFrom { spender, from, to, amount }),
        2 => (idx.clone(), idx.clone(), amount.clone())
            .prop_map(|(owner, spender, amount)| Op::Approve { owner, spender, amount }),
        1 => (idx.clone(), amount).prop_map(|(account, cap)| Op::Whitelist { account, cap }),
        1 => idx.clone().prop_map(|account| Op::Unwhitelist { account }),
        1 => idx.clone().prop_map(|account| Op::Blacklist { account }),
        1 => idx.prop_map(|account| Op::Unblacklist { account }),
        1 => (0..3u8, 0..=110u64).prop_map(|(field, value)| Op::SetTax { field, value }),
    ]
}

fn apply(ledger: &mut TaxedLedger, op: &Op) -> Result<(), LedgerError> {
    let admin = owner();
    match *op {
        Op::Transfer { from, to, amount } => {
            ledger.transfer(account(from), account(to), amount).map(drop)
        }
        Op::TransferFrom {
            spender,
            from,
            to,
            amount,
        } => ledger
            .transfer_from(account(spender), account(from), account(to), amount)
            .map(drop),
        Op::Approve {
            owner,
            spender,
            amount,
        } => {
            ledger.approve(account(owner), account(spender), amount);
            Ok(())
        }
        Op::Whitelist { account: a, cap } => ledger.add_to_whitelist(admin, account(a), cap),
        Op::Unwhitelist { account: a } => ledger.remove_from_whitelist(admin, account(a)),
        Op::Blacklist { account: a } => ledger.add_to_blacklist(admin, account(a)),
        Op::Unblacklist { account: a } => ledger.remove_from_blacklist(admin, account(a)),
        Op::SetTax { field, value } => {
            let field = match field {
                0 => TaxField::Total,
                1 => TaxField::Burn,
                _ => TaxField::Wallet,
            };
            ledger.set_tax_percent(admin, field, value)
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn supply_is_conserved_and_failures_change_nothing(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut ledger = TaxedLedger::new(
            owner(),
            7,
            2,
            1,
            (1..=5u8).map(Address::repeat_byte).collect(),
            1_000_000,
        )
        .unwrap();

        for op in &ops {
            let before = ledger.state_root();
            let events_before = ledger.events().len();
            match apply(&mut ledger, op) {
                Ok(()) => {
                    prop_assert_eq!(ledger.events().len(), events_before + 1);
                }
                Err(_) => {
                    prop_assert_eq!(ledger.state_root(), before);
                    prop_assert_eq!(ledger.events().len(), events_before);
                }
            }
            prop_assert!(ledger.verify().is_ok());
            prop_assert_eq!(ledger.balances().values().sum::<Amount>(), 1_000_000);
        }
    }

    #[test]
    fn quote_parts_add_up(amount in 0..u128::MAX / 2, total in 0..=100u64, burn in 0..=100u64, wallet in 0..=100u64) {
        let ledger = TaxedLedger::new(
            owner(),
            total,
            burn,
            wallet,
            (1..=5u8).map(Address::repeat_byte).collect(),
            0,
        )
        .unwrap();
        let b = ledger.quote(&addr1(), amount);
        prop_assert_eq!(b.net + b.tax, amount);
        prop_assert_eq!(b.burn + b.wallet + b.retained, b.tax);
        prop_assert_eq!(b.wallet_shares.iter().sum::<Amount>(), b.wallet);
        prop_assert!(b.burn + b.wallet <= b.tax);
    }
}
