use crate::error::EngineError;
use crate::types::{AccountId, Amount, Token};
use std::collections::HashMap;
use thiserror::Error;

/// A transfer the backing asset ledger refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("asset transfer failed")]
pub struct TransferError;

/// AssetLedger is the interface to one fungible-asset ledger.
///
/// The exchange drives two instances, one per asset of the pair. The
/// engine account holds escrowed funds, so `transfer` always spends from
/// it, while `transfer_from` spends from an arbitrary account.
pub trait AssetLedger {
    /// Current balance of `account`.
    fn balance_of(&self, account: AccountId) -> Amount;
    /// Moves `amount` from `from` to `to`.
    fn transfer_from(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError>;
    /// Moves `amount` from the engine account to `to`.
    fn transfer(&mut self, to: AccountId, amount: Amount) -> Result<(), TransferError>;
}

/// What a ledger leg pays for. Determines the error a public call aborts
/// with when the leg cannot be covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LegPurpose {
    /// A maker escrowing the selling amount of a freshly rested order.
    EscrowDeposit,
    /// A taker paying the maker and taker fees.
    FeeCollection,
    /// A taker paying a maker for a fill.
    MakerPayment,
    /// Escrow releasing filled inventory to a taker.
    EscrowRelease,
    /// Escrow returning the unsold remainder of a cancelled order.
    EscrowRefund,
}

impl LegPurpose {
    pub(crate) fn failure(self) -> EngineError {
        match self {
            LegPurpose::EscrowDeposit => EngineError::TransferToEscrowError,
            LegPurpose::FeeCollection => EngineError::LackingFundsForFees,
            LegPurpose::MakerPayment => EngineError::LackingFundsForTransaction,
            LegPurpose::EscrowRelease | LegPurpose::EscrowRefund => {
                EngineError::EscrowToBuyerError
            }
        }
    }
}

/// The source of a ledger leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LegSource {
    /// Spend from an ordinary account.
    Account(AccountId),
    /// Spend from the engine escrow account.
    Escrow,
}

/// One pending ledger movement of a public call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransferLeg {
    pub token: Token,
    pub source: LegSource,
    pub to: AccountId,
    pub amount: Amount,
    pub purpose: LegPurpose,
}

/// The buffered ledger movements of one public call.
///
/// Legs accumulate while the call mutates engine state and are settled
/// in one shot at commit time: the batch is first simulated against the
/// current balances, and only a fully covered batch is executed. An
/// uncovered leg aborts the call with the error of its purpose before
/// any ledger state changes.
#[derive(Debug, Default)]
pub(crate) struct TransferBatch {
    legs: Vec<TransferLeg>,
}

impl TransferBatch {
    /// Queues a movement; zero amounts are dropped.
    pub(crate) fn push(
        &mut self,
        token: Token,
        source: LegSource,
        to: AccountId,
        amount: Amount,
        purpose: LegPurpose,
    ) {
        if amount > 0 {
            self.legs.push(TransferLeg {
                token,
                source,
                to,
                amount,
                purpose,
            });
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Simulates every leg over the starting balances and reports the
    /// first one that cannot be covered.
    pub(crate) fn validate(
        &self,
        ledger_a: &dyn AssetLedger,
        ledger_b: &dyn AssetLedger,
        escrow: AccountId,
    ) -> Result<(), EngineError> {
        let mut balances: HashMap<(Token, AccountId), Amount> = HashMap::new();
        for leg in &self.legs {
            let ledger = match leg.token {
                Token::A => ledger_a,
                Token::B => ledger_b,
            };
            let from = match leg.source {
                LegSource::Account(account) => account,
                LegSource::Escrow => escrow,
            };
            let available = *balances
                .entry((leg.token, from))
                .or_insert_with(|| ledger.balance_of(from));
            if available < leg.amount {
                return Err(leg.purpose.failure());
            }
            balances.insert((leg.token, from), available - leg.amount);
            let credited = balances
                .entry((leg.token, leg.to))
                .or_insert_with(|| ledger.balance_of(leg.to));
            *credited = credited.saturating_add(leg.amount);
        }
        Ok(())
    }

    /// Executes every leg in order.
    pub(crate) fn execute<'a>(
        &self,
        ledger_a: &'a mut dyn AssetLedger,
        ledger_b: &'a mut dyn AssetLedger,
    ) -> Result<(), EngineError> {
        for leg in &self.legs {
            let ledger = match leg.token {
                Token::A => &mut *ledger_a,
                Token::B => &mut *ledger_b,
            };
            let moved = match leg.source {
                LegSource::Account(from) => ledger.transfer_from(from, leg.to, leg.amount),
                LegSource::Escrow => ledger.transfer(leg.to, leg.amount),
            };
            moved.map_err(|_| leg.purpose.failure())?;
        }
        Ok(())
    }
}

/// In-memory asset ledger backed by a balances map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<AccountId, Amount>,
    engine: AccountId,
}

impl InMemoryLedger {
    /// Creates a ledger whose `transfer` spends from `engine`.
    pub fn new(engine: AccountId) -> Self {
        Self {
            balances: HashMap::new(),
            engine,
        }
    }

    /// Mints `amount` into `account`.
    pub fn credit(&mut self, account: AccountId, amount: Amount) {
        *self.balances.entry(account).or_insert(0) += amount;
    }
}

impl AssetLedger for InMemoryLedger {
    fn balance_of(&self, account: AccountId) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn transfer_from(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError);
        }
        self.balances.insert(from, available - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn transfer(&mut self, to: AccountId, amount: Amount) -> Result<(), TransferError> {
        self.transfer_from(self.engine, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESCROW: AccountId = 100;

    #[test]
    fn test_validate_tracks_balances_across_legs() {
        let mut ledger_a = InMemoryLedger::new(ESCROW);
        let ledger_b = InMemoryLedger::new(ESCROW);
        ledger_a.credit(1, 10);

        let mut batch = TransferBatch::default();
        batch.push(Token::A, LegSource::Account(1), 2, 10, LegPurpose::MakerPayment);
        // Account 2 can pay forward what the first leg delivered.
        batch.push(Token::A, LegSource::Account(2), 3, 10, LegPurpose::MakerPayment);
        assert_eq!(batch.validate(&ledger_a, &ledger_b, ESCROW), Ok(()));

        // One unit more than the chain can carry fails.
        batch.push(Token::A, LegSource::Account(3), 4, 11, LegPurpose::MakerPayment);
        assert_eq!(
            batch.validate(&ledger_a, &ledger_b, ESCROW),
            Err(EngineError::LackingFundsForTransaction)
        );
    }

    #[test]
    fn test_validate_maps_purpose_to_error() {
        let ledger_a = InMemoryLedger::new(ESCROW);
        let ledger_b = InMemoryLedger::new(ESCROW);

        let mut batch = TransferBatch::default();
        batch.push(Token::B, LegSource::Account(1), 2, 5, LegPurpose::FeeCollection);
        assert_eq!(
            batch.validate(&ledger_a, &ledger_b, ESCROW),
            Err(EngineError::LackingFundsForFees)
        );

        let mut batch = TransferBatch::default();
        batch.push(Token::A, LegSource::Escrow, 2, 5, LegPurpose::EscrowRelease);
        assert_eq!(
            batch.validate(&ledger_a, &ledger_b, ESCROW),
            Err(EngineError::EscrowToBuyerError)
        );
    }

    #[test]
    fn test_execute_moves_funds() {
        let mut ledger_a = InMemoryLedger::new(ESCROW);
        let mut ledger_b = InMemoryLedger::new(ESCROW);
        ledger_a.credit(1, 10);
        ledger_b.credit(ESCROW, 4);

        let mut batch = TransferBatch::default();
        batch.push(Token::A, LegSource::Account(1), 2, 7, LegPurpose::MakerPayment);
        batch.push(Token::B, LegSource::Escrow, 1, 4, LegPurpose::EscrowRelease);
        batch.execute(&mut ledger_a, &mut ledger_b).unwrap();

        assert_eq!(ledger_a.balance_of(1), 3);
        assert_eq!(ledger_a.balance_of(2), 7);
        assert_eq!(ledger_b.balance_of(1), 4);
        assert_eq!(ledger_b.balance_of(ESCROW), 0);
    }

    #[test]
    fn test_zero_amount_legs_are_dropped() {
        let mut batch = TransferBatch::default();
        batch.push(Token::A, LegSource::Escrow, 2, 0, LegPurpose::EscrowRefund);
        assert!(batch.is_empty());
    }
}
