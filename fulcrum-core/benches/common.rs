use fulcrum_core::prelude::*;
use std::sync::Arc;

pub const MAKER: AccountId = 1;
pub const TAKER: AccountId = 2;
pub const ESCROW: AccountId = 900;

/// Builds a fee-free exchange with two richly funded accounts.
pub fn funded_exchange() -> Exchange {
    let mut ledger_a = InMemoryLedger::new(ESCROW);
    let mut ledger_b = InMemoryLedger::new(ESCROW);
    for account in [MAKER, TAKER] {
        ledger_a.credit(account, Amount::MAX / 4);
        ledger_b.credit(account, Amount::MAX / 4);
    }

    let config = ExchangeConfig {
        escrow_account: ESCROW,
        ..ExchangeConfig::default()
    };
    Exchange::new(
        config,
        Box::new(ledger_a),
        Box::new(ledger_b),
        Arc::new(NullEventSink),
    )
    .unwrap()
}
