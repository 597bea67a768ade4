//! # Custody Vault
//!
//! Holds one unit of a unique collateral asset per loan, in an account
//! derived from `(borrower, asset)` under the program id. Nothing outside
//! this crate can move funds out of a holding account: [`release`] is
//! crate-private and only the loan state machine's terminal transitions
//! call it.

use pawn_protocol::config::CUSTODY_SEED;
use pawn_protocol::identity::Address;
use pawn_protocol::ledger::{AssetId, Ledger};
use pawn_protocol::oracle::AuthenticityOracle;

use crate::error::PawnError;

/// The holding account for `asset` pawned by `borrower`.
pub fn holding_account(program_id: &Address, borrower: &Address, asset: &AssetId) -> Address {
    Address::derive(
        program_id,
        &[CUSTODY_SEED, borrower.as_bytes(), asset.as_bytes()],
    )
}

/// `true` if `account` holds exactly one unit of `asset`.
pub fn is_in_custody(ledger: &Ledger, account: &Address, asset: &AssetId) -> bool {
    ledger.balance_of(account, asset) == 1
}

/// Moves the single unit of `asset` from `from` into its holding account.
///
/// # Errors
///
/// - [`PawnError::InvalidAsset`] if the oracle rejects `asset`.
/// - [`PawnError::AlreadyInCustody`] if `from` does not hold the unit
///   (typically because it is already pawned).
pub(crate) fn deposit(
    ledger: &mut Ledger,
    oracle: &dyn AuthenticityOracle,
    program_id: &Address,
    asset: AssetId,
    from: Address,
) -> Result<Address, PawnError> {
    if !oracle.is_unique_authentic(ledger, &asset) {
        return Err(PawnError::InvalidAsset(asset));
    }
    if ledger.balance_of(&from, &asset) != 1 {
        return Err(PawnError::AlreadyInCustody { asset, owner: from });
    }

    let account = holding_account(program_id, &from, &asset);
    ledger.transfer(asset, from, account, 1)?;
    tracing::debug!(asset = %asset.short(), account = %account.short(), "collateral deposited");
    Ok(account)
}

/// Moves the held unit out of `account` to `to`. All or nothing.
///
/// # Errors
///
/// [`PawnError::NotInCustody`] if the account is empty.
pub(crate) fn release(
    ledger: &mut Ledger,
    account: Address,
    asset: AssetId,
    to: Address,
) -> Result<(), PawnError> {
    if !is_in_custody(ledger, &account, &asset) {
        return Err(PawnError::NotInCustody { account, asset });
    }
    ledger.transfer(asset, account, to, 1)?;
    tracing::debug!(asset = %asset.short(), to = %to.short(), "collateral released");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawn_protocol::ledger::AssetKind;
    use pawn_protocol::oracle::{AllowListOracle, SupplyOracle};

    struct Fixture {
        ledger: Ledger,
        program: Address,
        alice: Address,
        art: AssetId,
    }

    fn fixture() -> Fixture {
        let mut ledger = Ledger::new();
        let alice = Address::from_label("alice");
        let art = ledger
            .register_asset("ART", AssetKind::Unique, 0, Address::from_label("gallery"))
            .unwrap();
        ledger.mint(art, alice, 1).unwrap();
        Fixture {
            ledger,
            program: Address::from_label("program"),
            alice,
            art,
        }
    }

    #[test]
    fn deposit_moves_unit_into_holding_account() {
        let mut f = fixture();
        let account = deposit(&mut f.ledger, &SupplyOracle, &f.program, f.art, f.alice).unwrap();

        assert_eq!(account, holding_account(&f.program, &f.alice, &f.art));
        assert!(is_in_custody(&f.ledger, &account, &f.art));
        assert_eq!(f.ledger.balance_of(&f.alice, &f.art), 0);
    }

    #[test]
    fn second_deposit_reports_already_in_custody() {
        let mut f = fixture();
        deposit(&mut f.ledger, &SupplyOracle, &f.program, f.art, f.alice).unwrap();
        let err = deposit(&mut f.ledger, &SupplyOracle, &f.program, f.art, f.alice).unwrap_err();
        assert_eq!(
            err,
            PawnError::AlreadyInCustody {
                asset: f.art,
                owner: f.alice
            }
        );
    }

    #[test]
    fn unverified_asset_rejected() {
        let mut f = fixture();
        let oracle = AllowListOracle::new();
        let err = deposit(&mut f.ledger, &oracle, &f.program, f.art, f.alice).unwrap_err();
        assert_eq!(err, PawnError::InvalidAsset(f.art));
        assert_eq!(f.ledger.balance_of(&f.alice, &f.art), 1);
    }

    #[test]
    fn fungible_asset_rejected() {
        let mut f = fixture();
        let usdc = f
            .ledger
            .register_asset("USDC", AssetKind::Fungible, 6, Address::from_label("circle"))
            .unwrap();
        f.ledger.mint(usdc, f.alice, 1).unwrap();
        let err = deposit(&mut f.ledger, &SupplyOracle, &f.program, usdc, f.alice).unwrap_err();
        assert_eq!(err, PawnError::InvalidAsset(usdc));
    }

    #[test]
    fn release_empties_account() {
        let mut f = fixture();
        let bob = Address::from_label("bob");
        let account = deposit(&mut f.ledger, &SupplyOracle, &f.program, f.art, f.alice).unwrap();

        release(&mut f.ledger, account, f.art, bob).unwrap();
        assert_eq!(f.ledger.holder_of(&f.art), Some(bob));

        let err = release(&mut f.ledger, account, f.art, bob).unwrap_err();
        assert_eq!(
            err,
            PawnError::NotInCustody {
                account,
                asset: f.art
            }
        );
    }
}
