//! # CLI Interface
//!
//! Command-line structure for `pawn-node`, built with `clap` derive.
//!
//! Participants are given as 64-character hex addresses or as `@label`,
//! which derives a stable address from the label. Assets are given as a
//! hex id or a registered symbol.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use pawn_protocol::identity::Address;

use crate::logging::LogFormat;

/// PAWN lending node.
///
/// Runs one program operation per invocation against a local snapshot
/// store, then prints the result and the committed events as JSON.
#[derive(Parser, Debug)]
#[command(
    name = "pawn-node",
    about = "PAWN peer-to-peer pawn loan node",
    version,
    propagate_version = true
)]
pub struct PawnNodeCli {
    /// Directory holding the snapshot database and the config file.
    #[arg(long, short = 'd', env = "PAWN_DATA_DIR", default_value = ".pawn", global = true)]
    pub data_dir: PathBuf,

    /// Path to the protocol config (JSON). Defaults to `<data-dir>/config.json`.
    #[arg(long, short = 'c', env = "PAWN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, env = "PAWN_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Use this unix timestamp instead of the system clock.
    #[arg(long, env = "PAWN_NOW", global = true)]
    pub now: Option<i64>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, write the config, and commit genesis.
    Init(InitArgs),
    /// Register a fungible or unique asset.
    RegisterAsset(RegisterAssetArgs),
    /// Mint an asset to an account.
    Mint(MintArgs),
    /// Pawn a unique asset and request a loan.
    Request(RequestArgs),
    /// Fund a requested loan at exactly its desired terms.
    Underwrite(FundArgs),
    /// Escrow a competing offer on a requested loan.
    Offer(FundArgs),
    /// Accept an open offer as the borrower.
    Accept(AcceptArgs),
    /// Cancel an open offer as its lender.
    Cancel(CancelArgs),
    /// Repay an active loan as the borrower.
    Repay(CloseArgs),
    /// Seize the collateral of an overdue loan as the lender.
    Seize(CloseArgs),
    /// Show a loan, live or archived.
    ShowLoan(ShowLoanArgs),
    /// List the open offers on a loan.
    ShowOffers(ShowLoanArgs),
    /// Show balances of an account.
    Balance(BalanceArgs),
    /// Resolve an identity, or the loan address for a borrower and asset.
    Address(AddressArgs),
    /// Print version information and exit.
    Version,
}

/// Parses `@label` or a hex address.
pub fn parse_identity(s: &str) -> Result<Address, String> {
    match s.strip_prefix('@') {
        Some("") => Err("empty label".to_string()),
        Some(label) => Ok(Address::from_label(label)),
        None => Address::from_hex(s).map_err(|e| e.to_string()),
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Label the program id is derived from.
    #[arg(long, default_value = pawn_protocol::config::DEFAULT_PROGRAM_LABEL)]
    pub program_label: String,

    /// Protocol share of interest, in basis points.
    #[arg(long, default_value_t = pawn_protocol::config::DEFAULT_PROTOCOL_FEE_BPS)]
    pub fee_bps: u32,

    /// Rent per byte of record space, in native base units.
    #[arg(long, default_value_t = pawn_protocol::config::DEFAULT_RENT_PER_BYTE)]
    pub rent_per_byte: u64,
}

#[derive(Args, Debug)]
pub struct RegisterAssetArgs {
    /// Ticker symbol.
    pub symbol: String,

    /// `fungible` or `unique`.
    #[arg(long, default_value = "fungible")]
    pub kind: String,

    #[arg(long, default_value_t = 0)]
    pub decimals: u8,

    /// Issuer identity.
    #[arg(long, value_parser = parse_identity)]
    pub issuer: Address,
}

#[derive(Args, Debug)]
pub struct MintArgs {
    /// Asset id or symbol. `PAWN` is the native asset.
    pub asset: String,

    #[arg(long, value_parser = parse_identity)]
    pub to: Address,

    #[arg(long)]
    pub amount: u64,
}

/// Loan terms, shared by every command that names them.
#[derive(Args, Debug)]
pub struct TermsArgs {
    /// Principal in base units of the settlement asset.
    #[arg(long)]
    pub principal: u64,

    /// Settlement asset id or symbol.
    #[arg(long)]
    pub settlement: String,

    /// Interest for the whole term, in basis points.
    #[arg(long)]
    pub rate_bps: u32,

    /// Seconds from activation to the due date.
    #[arg(long)]
    pub duration: u64,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    #[arg(long, value_parser = parse_identity)]
    pub borrower: Address,

    /// Collateral asset id or symbol.
    #[arg(long)]
    pub collateral: String,

    #[command(flatten)]
    pub terms: TermsArgs,
}

#[derive(Args, Debug)]
pub struct FundArgs {
    #[arg(long, value_parser = parse_identity)]
    pub loan: Address,

    #[arg(long, value_parser = parse_identity)]
    pub lender: Address,

    #[command(flatten)]
    pub terms: TermsArgs,
}

#[derive(Args, Debug)]
pub struct AcceptArgs {
    #[arg(long, value_parser = parse_identity)]
    pub loan: Address,

    #[arg(long, value_parser = parse_identity)]
    pub offer: Address,

    #[arg(long, value_parser = parse_identity)]
    pub borrower: Address,

    /// The terms the borrower expects the offer to carry.
    #[command(flatten)]
    pub terms: TermsArgs,
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    #[arg(long, value_parser = parse_identity)]
    pub offer: Address,

    #[arg(long, value_parser = parse_identity)]
    pub lender: Address,
}

#[derive(Args, Debug)]
pub struct CloseArgs {
    #[arg(long, value_parser = parse_identity)]
    pub loan: Address,

    /// Borrower for `repay`, lender for `seize`.
    #[arg(long, value_parser = parse_identity)]
    pub caller: Address,
}

#[derive(Args, Debug)]
pub struct ShowLoanArgs {
    #[arg(long, value_parser = parse_identity)]
    pub loan: Address,
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    #[arg(value_parser = parse_identity)]
    pub owner: Address,

    /// Only this asset (id or symbol).
    #[arg(long)]
    pub asset: Option<String>,
}

#[derive(Args, Debug)]
pub struct AddressArgs {
    #[arg(value_parser = parse_identity)]
    pub identity: Address,

    /// Print the loan address for this borrower and collateral instead.
    #[arg(long)]
    pub collateral: Option<String>,

    /// Print the offer address for `--loan` and this lender instead.
    #[arg(long, value_parser = parse_identity, conflicts_with = "collateral")]
    pub loan: Option<Address>,
}
