// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PAWN Node
//!
//! Entry point for the `pawn-node` binary. Every mutating subcommand
//! resumes the program from the latest snapshot, runs exactly one
//! operation, commits the next snapshot, and prints the result and the
//! committed events as JSON on stdout. A rejected operation commits
//! nothing and exits non-zero.

mod cli;
mod logging;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;

use pawn_contracts::{LoanState, LoanTerms, PawnEvent};
use pawn_protocol::config::{treasury_address, ProtocolConfig, PROTOCOL_VERSION};
use pawn_protocol::identity::Address;
use pawn_protocol::ledger::AssetKind;

use cli::{Commands, PawnNodeCli, TermsArgs};
use session::{Paths, Session};

fn main() -> Result<()> {
    let cli = PawnNodeCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);

    let paths = Paths::new(&cli.data_dir, cli.config.as_deref());
    let now = cli.now;

    match cli.command {
        Commands::Init(args) => init(&paths, args),
        Commands::RegisterAsset(args) => {
            let session = Session::open(&paths, now)?;
            let kind: AssetKind = args
                .kind
                .parse()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let id = session
                .program()
                .register_asset(&args.symbol, kind, args.decimals, args.issuer)?;
            commit_and_print(session, json!({ "asset": id }))
        }
        Commands::Mint(args) => {
            let session = Session::open(&paths, now)?;
            let asset = session.resolve_asset(&args.asset)?;
            let balance = session.program().mint(asset, args.to, args.amount)?;
            commit_and_print(session, json!({ "asset": asset, "to": args.to, "balance": balance }))
        }
        Commands::Request(args) => {
            let session = Session::open(&paths, now)?;
            let collateral = session.resolve_asset(&args.collateral)?;
            let terms = terms_from(&session, &args.terms)?;
            let loan = session.program().request(args.borrower, collateral, terms)?;
            commit_and_print(session, json!({ "loan": loan }))
        }
        Commands::Underwrite(args) => {
            let session = Session::open(&paths, now)?;
            let terms = terms_from(&session, &args.terms)?;
            let loan = session.program().underwrite(args.loan, args.lender, terms)?;
            commit_and_print(session, json!({ "loan": loan }))
        }
        Commands::Offer(args) => {
            let session = Session::open(&paths, now)?;
            let terms = terms_from(&session, &args.terms)?;
            let offer = session.program().open_offer(args.loan, args.lender, terms)?;
            commit_and_print(session, json!({ "offer": offer }))
        }
        Commands::Accept(args) => {
            let session = Session::open(&paths, now)?;
            let terms = terms_from(&session, &args.terms)?;
            let loan = session
                .program()
                .accept_offer(args.loan, args.offer, args.borrower, &terms)?;
            commit_and_print(session, json!({ "loan": loan }))
        }
        Commands::Cancel(args) => {
            let session = Session::open(&paths, now)?;
            let offer = session.program().cancel_offer(args.offer, args.lender)?;
            commit_and_print(session, json!({ "offer": offer }))
        }
        Commands::Repay(args) => {
            let session = Session::open(&paths, now)?;
            let settlement = session.program().repay(args.loan, args.caller)?;
            commit_and_print(session, json!({ "settlement": settlement }))
        }
        Commands::Seize(args) => {
            let session = Session::open(&paths, now)?;
            let loan = session.program().seize(args.loan, args.caller)?;
            commit_and_print(session, json!({ "loan": loan }))
        }
        Commands::ShowLoan(args) => {
            let session = Session::open(&paths, now)?;
            show_loan(&session, args.loan)
        }
        Commands::ShowOffers(args) => {
            let session = Session::open(&paths, now)?;
            print_json(&session.program().offers_for_loan(&args.loan))
        }
        Commands::Balance(args) => {
            let session = Session::open(&paths, now)?;
            balance(&session, args)
        }
        Commands::Address(args) => address(&paths, now, args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Writes the config and commits genesis.
fn init(paths: &Paths, args: cli::InitArgs) -> Result<()> {
    let program_id = Address::from_label(&args.program_label);
    let config = ProtocolConfig {
        program_id,
        protocol_fee_bps: args.fee_bps,
        treasury: treasury_address(&program_id),
        rent_per_byte: args.rent_per_byte,
    };
    let slot = session::initialize(paths, config.clone())?;

    print_json(&json!({
        "slot": slot,
        "data_dir": paths.data_dir.display().to_string(),
        "config_path": paths.config.display().to_string(),
        "config": config,
    }))
}

fn terms_from(session: &Session, args: &TermsArgs) -> Result<LoanTerms> {
    let settlement = session
        .resolve_asset(&args.settlement)
        .context("settlement asset")?;
    Ok(LoanTerms::new(
        args.principal,
        settlement,
        args.rate_bps,
        args.duration,
    ))
}

fn commit_and_print(session: Session, result: serde_json::Value) -> Result<()> {
    let (slot, events): (u64, Vec<PawnEvent>) = session.commit()?;
    print_json(&json!({
        "slot": slot,
        "result": result,
        "events": events,
    }))
}

fn show_loan(session: &Session, id: Address) -> Result<()> {
    let program = session.program();
    if let Some(loan) = program.loan(&id) {
        let quote = if loan.state == LoanState::Active {
            Some(program.quote_repayment(&id)?)
        } else {
            None
        };
        let due_at_utc = quote
            .as_ref()
            .and_then(|q| chrono::DateTime::from_timestamp(q.due_at, 0))
            .map(|dt| dt.to_rfc3339());
        return print_json(&json!({
            "loan": loan,
            "quote": quote,
            "due_at_utc": due_at_utc,
            "open_offers": program
                .offers_for_loan(&id)
                .iter()
                .filter(|offer| offer.loan_request_seq == loan.request_seq)
                .count(),
            "now": program.now(),
        }));
    }
    match program.archived_loan(&id) {
        Some(loan) => print_json(&json!({ "loan": loan, "archived": true })),
        None => anyhow::bail!("no loan at {}", id),
    }
}

fn balance(session: &Session, args: cli::BalanceArgs) -> Result<()> {
    let program = session.program();
    let rows: Vec<_> = match args.asset {
        Some(asset) => {
            let asset = session.resolve_asset(&asset)?;
            vec![(asset, program.balance_of(&args.owner, &asset))]
        }
        None => program.balances(&args.owner),
    };

    let balances: Vec<_> = rows
        .into_iter()
        .map(|(asset, amount)| {
            let symbol = program.asset(&asset).map(|info| info.symbol);
            json!({ "asset": asset, "symbol": symbol, "amount": amount })
        })
        .collect();
    print_json(&json!({ "owner": args.owner, "balances": balances }))
}

fn address(paths: &Paths, now: Option<i64>, args: cli::AddressArgs) -> Result<()> {
    if let Some(collateral) = args.collateral {
        let session = Session::open(paths, now)?;
        let asset = session.resolve_asset(&collateral)?;
        let loan = session.program().loan_address(&args.identity, &asset);
        return print_json(&json!({ "borrower": args.identity, "loan": loan }));
    }
    if let Some(loan) = args.loan {
        let session = Session::open(paths, now)?;
        let offer = session
            .program()
            .offer_address(&loan, &args.identity)
            .ok_or_else(|| anyhow::anyhow!("no live loan at {}", loan))?;
        return print_json(&json!({ "lender": args.identity, "loan": loan, "offer": offer }));
    }
    print_json(&json!({ "address": args.identity }))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("pawn-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", PROTOCOL_VERSION);
}
