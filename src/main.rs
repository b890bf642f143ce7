use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use comb_ledger::{
    config::DeployConfig,
    ledger::{Address, Amount, LedgerError, TaxedLedger, UNIT},
    tax::TaxField,
};

//==================== CLI definition ====================//

#[derive(Parser)]
#[command(
    name = "comb",
    version,
    about = "Combined Token (COMB) ledger: deploy, transfer and administer a JSON state file"
)]
struct Cli {
    /// Ledger state file.
    #[arg(long, global = true, default_value = "comb-state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new ledger and mint the supply to the owner.
    Deploy {
        /// JSON deploy config; flags below override its fields.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        owner: Option<Address>,
        #[arg(long)]
        total_tax: Option<u64>,
        #[arg(long)]
        burn_tax: Option<u64>,
        #[arg(long)]
        wallet_tax: Option<u64>,
        /// Reward wallet; pass exactly five times to override the defaults.
        #[arg(long = "wallet")]
        wallets: Vec<Address>,
        /// Initial supply in base units.
        #[arg(long)]
        supply: Option<Amount>,
        /// Overwrite an existing state file.
        #[arg(long)]
        force: bool,
    },
    /// Token metadata, policy and supply figures.
    Info,
    Balance {
        account: Address,
    },
    Allowance {
        owner: Address,
        spender: Address,
    },
    Transfer {
        #[arg(long = "as")]
        sender: Address,
        to: Address,
        amount: Amount,
    },
    TransferFrom {
        #[arg(long = "as")]
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    },
    Approve {
        #[arg(long = "as")]
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    /// Tax-exempt allowlist with per-address caps.
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },
    /// Denylist of addresses that may neither send nor receive.
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },
    SetTax {
        #[arg(long = "as")]
        caller: Address,
        field: TaxFieldArg,
        percent: u64,
    },
    /// Preview the tax split of a transfer without applying it.
    Quote {
        sender: Address,
        amount: Amount,
    },
    /// Print the audit log as JSON.
    Events {
        /// Only the most recent N entries.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Recompute the state root and check conservation.
    Verify,
}

#[derive(Subcommand)]
enum WhitelistAction {
    Add {
        #[arg(long = "as")]
        caller: Address,
        account: Address,
        max_transaction_amount: Amount,
    },
    Remove {
        #[arg(long = "as")]
        caller: Address,
        account: Address,
    },
    Show {
        account: Address,
    },
}

#[derive(Subcommand)]
enum BlacklistAction {
    Add {
        #[arg(long = "as")]
        caller: Address,
        account: Address,
    },
    Remove {
        #[arg(long = "as")]
        caller: Address,
        account: Address,
    },
    Show {
        account: Address,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TaxFieldArg {
    Total,
    Burn,
    Wallet,
}

impl From<TaxFieldArg> for TaxField {
    fn from(arg: TaxFieldArg) -> Self {
        match arg {
            TaxFieldArg::Total => TaxField::Total,
            TaxFieldArg::Burn => TaxField::Burn,
            TaxFieldArg::Wallet => TaxField::Wallet,
        }
    }
}

//==================== helpers ====================//

/// Base units rendered as whole tokens, e.g. `1.5` for 1.5e18.
fn format_units(amount: Amount) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:018}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

fn print_amount(label: &str, amount: Amount) {
    println!("{label}: {amount} ({} COMB)", format_units(amount));
}

fn load(state: &Path) -> anyhow::Result<TaxedLedger> {
    if !state.exists() {
        bail!(
            "state file {} not found (run `comb deploy` first)",
            state.display()
        );
    }
    TaxedLedger::load(state)
}

/// Load, apply one operation, save. Nothing is written when `f` fails.
fn mutate<R>(
    state: &Path,
    f: impl FnOnce(&mut TaxedLedger) -> Result<R, LedgerError>,
) -> anyhow::Result<R> {
    let mut ledger = load(state)?;
    let out = f(&mut ledger)?;
    ledger.save(state)?;
    Ok(out)
}

//==================== commands ====================//

#[allow(clippy::too_many_arguments)]
fn deploy_cmd(
    state: &Path,
    config: Option<PathBuf>,
    owner: Option<Address>,
    total_tax: Option<u64>,
    burn_tax: Option<u64>,
    wallet_tax: Option<u64>,
    wallets: Vec<Address>,
    supply: Option<Amount>,
    force: bool,
) -> anyhow::Result<()> {
    if state.exists() && !force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            state.display()
        );
    }
    let mut cfg = match (config, owner) {
        (Some(path), _) => DeployConfig::load(&path)?,
        (None, Some(owner)) => DeployConfig::new(owner),
        (None, None) => bail!("either --config or --owner is required"),
    };
    if let Some(owner) = owner {
        cfg.owner = owner;
    }
    if let Some(v) = total_tax {
        cfg.total_tax_percent = v;
    }
    if let Some(v) = burn_tax {
        cfg.burn_tax_percent = v;
    }
    if let Some(v) = wallet_tax {
        cfg.wallet_tax_percent = v;
    }
    if !wallets.is_empty() {
        cfg.reward_wallets = wallets;
    }
    if let Some(v) = supply {
        cfg.initial_supply = v;
    }

    let ledger = cfg.deploy()?;
    ledger
        .save(state)
        .with_context(|| format!("save {}", state.display()))?;
    println!("Deployed {} → {}", ledger.symbol(), state.display());
    println!("owner: {}", ledger.owner());
    print_amount("supply", ledger.total_supply());
    Ok(())
}

fn info_cmd(state: &Path) -> anyhow::Result<()> {
    let ledger = load(state)?;
    let policy = ledger.policy();
    println!(
        "{} ({}), {} decimals",
        ledger.name(),
        ledger.symbol(),
        ledger.decimals()
    );
    println!("owner: {}", ledger.owner());
    println!(
        "tax: total={} burn={} wallet={}",
        policy.total, policy.burn, policy.wallet
    );
    for (idx, wallet) in ledger.reward_wallets().iter().enumerate() {
        println!("reward wallet {}: {}", idx + 1, wallet);
    }
    print_amount("total supply", ledger.total_supply());
    print_amount("burned", ledger.burned_supply());
    print_amount("circulating", ledger.circulating_supply());
    println!("events: {}", ledger.events().len());
    println!("state root: {}", hex::encode(ledger.state_root()));
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let state = cli.state.as_path();
    match cli.command {
        Command::Deploy {
            config,
            owner,
            total_tax,
            burn_tax,
            wallet_tax,
            wallets,
            supply,
            force,
        } => deploy_cmd(
            state, config, owner, total_tax, burn_tax, wallet_tax, wallets, supply, force,
        )?,
        Command::Info => info_cmd(state)?,
        Command::Balance { account } => {
            print_amount(&account.to_string(), load(state)?.balance_of(&account));
        }
        Command::Allowance { owner, spender } => {
            print_amount(
                &format!("{owner} → {spender}"),
                load(state)?.allowance(&owner, &spender),
            );
        }
        Command::Transfer { sender, to, amount } => {
            let b = mutate(state, |l| l.transfer(sender, to, amount))?;
            println!("{}", serde_json::to_string_pretty(&b)?);
        }
        Command::TransferFrom {
            spender,
            owner,
            to,
            amount,
        } => {
            let b = mutate(state, |l| l.transfer_from(spender, owner, to, amount))?;
            println!("{}", serde_json::to_string_pretty(&b)?);
        }
        Command::Approve {
            owner,
            spender,
            amount,
        } => {
            mutate(state, |l| {
                l.approve(owner, spender, amount);
                Ok(())
            })?;
            print_amount(&format!("approved {owner} → {spender}"), amount);
        }
        Command::Whitelist { action } => match action {
            WhitelistAction::Add {
                caller,
                account,
                max_transaction_amount,
            } => {
                mutate(state, |l| {
                    l.add_to_whitelist(caller, account, max_transaction_amount)
                })?;
                println!("allowlisted {account}");
            }
            WhitelistAction::Remove { caller, account } => {
                mutate(state, |l| l.remove_from_whitelist(caller, account))?;
                println!("removed {account} from allowlist");
            }
            WhitelistAction::Show { account } => {
                let ledger = load(state)?;
                println!("whitelisted: {}", ledger.is_whitelisted(&account));
                print_amount(
                    "max transaction amount",
                    ledger.max_transaction_amount(&account),
                );
            }
        },
        Command::Blacklist { action } => match action {
            BlacklistAction::Add { caller, account } => {
                mutate(state, |l| l.add_to_blacklist(caller, account))?;
                println!("denylisted {account}");
            }
            BlacklistAction::Remove { caller, account } => {
                mutate(state, |l| l.remove_from_blacklist(caller, account))?;
                println!("removed {account} from denylist");
            }
            BlacklistAction::Show { account } => {
                println!("blacklisted: {}", load(state)?.is_blacklisted(&account));
            }
        },
        Command::SetTax {
            caller,
            field,
            percent,
        } => {
            let field = TaxField::from(field);
            mutate(state, |l| l.set_tax_percent(caller, field, percent))?;
            println!("{field} tax set to {percent}%");
        }
        Command::Quote { sender, amount } => {
            let b = load(state)?.quote(&sender, amount);
            println!("{}", serde_json::to_string_pretty(&b)?);
        }
        Command::Events { limit } => {
            let ledger = load(state)?;
            let events = ledger.events();
            let skip = limit.map_or(0, |n| events.len().saturating_sub(n));
            println!("{}", serde_json::to_string_pretty(&events[skip..])?);
        }
        Command::Verify => {
            // load() already checks the root and conservation
            let ledger = load(state)?;
            println!(
                "verify: OK (state root {}, {} events)",
                hex::encode(ledger.state_root()),
                ledger.events().len()
            );
        }
    }
    Ok(())
}

//==================== main ====================//

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

const EXIT_LEDGER: u8 = 2;
const EXIT_FAILURE: u8 = 1;

/// `--help` and `--version` arrive as clap errors but are not failures.
fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        EXIT_FAILURE
    } else {
        0
    }
}

fn run_exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<LedgerError>().is_some() {
        EXIT_LEDGER
    } else {
        EXIT_FAILURE
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };
    init_tracing();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(run_exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn usage_errors_exit_with_one() {
        let err = Cli::try_parse_from(["comb", "--state", "p.json", "bogus"])
            .err()
            .unwrap();
        assert_eq!(usage_exit_code(&err), 1);

        let err = Cli::try_parse_from(["comb", "balance", "0x1234"])
            .err()
            .unwrap();
        assert_eq!(usage_exit_code(&err), 1);

        let err = Cli::try_parse_from(["comb", "--help"]).err().unwrap();
        assert_eq!(usage_exit_code(&err), 0);
    }

    #[test]
    fn ledger_errors_exit_with_two() {
        let ledger_err = anyhow::Error::new(LedgerError::Unauthorized {
            caller: Address::repeat_byte(1),
        })
        .context("set-tax");
        assert_eq!(run_exit_code(&ledger_err), 2);
        assert_eq!(run_exit_code(&anyhow::anyhow!("state file missing")), 1);
    }

    #[test]
    fn format_units_trims_fraction() {
        assert_eq!(format_units(0), "0");
        assert_eq!(format_units(3 * UNIT), "3");
        assert_eq!(format_units(UNIT + UNIT / 2), "1.5");
        assert_eq!(format_units(93), "0.000000000000000093");
    }

    #[test]
    fn parses_transfer_with_acting_identity() {
        let cli = Cli::try_parse_from([
            "comb",
            "--state",
            "s.json",
            "transfer",
            "--as",
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "0x1111111111111111111111111111111111111111",
            "100",
        ])
        .unwrap();
        match cli.command {
            Command::Transfer { sender, to, amount } => {
                assert_eq!(sender, Address::repeat_byte(0xaa));
                assert_eq!(to, Address::repeat_byte(0x11));
                assert_eq!(amount, 100);
            }
            _ => panic!("expected transfer"),
        }
    }

    #[test]
    fn deploy_then_transfer_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let owner = Address::repeat_byte(0xaa);
        let to = Address::repeat_byte(0x11);
        deploy_cmd(&state, None, Some(owner), None, None, None, vec![], Some(1_000), false)
            .unwrap();
        assert!(deploy_cmd(&state, None, Some(owner), None, None, None, vec![], None, false).is_err());

        let b = mutate(&state, |l| l.transfer(owner, to, 100)).unwrap();
        assert_eq!(b.net, 93);
        let ledger = load(&state).unwrap();
        assert_eq!(ledger.balance_of(&to), 93);
        assert_eq!(ledger.balance_of(&owner), 900);

        let err = mutate(&state, |l| l.set_total_tax_percent(to, 5)).unwrap_err();
        assert!(err.downcast_ref::<LedgerError>().is_some());
        assert_eq!(load(&state).unwrap().state_root(), ledger.state_root());
    }
}
