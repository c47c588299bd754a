#![allow(dead_code)]

use fulcrum_core::prelude::*;
use std::sync::{Arc, Mutex};

pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CAROL: AccountId = 3;
pub const ADMIN: AccountId = 900;
pub const FEE_SINK: AccountId = 901;
pub const ESCROW: AccountId = 902;

pub const STARTING_BALANCE: Amount = 1_000_000_000;

/// EventSink that records everything published, for assertions.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingEventSink {
    /// Drains the recorded events.
    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub struct Harness {
    pub exchange: Exchange,
    pub sink: Arc<RecordingEventSink>,
}

/// Builds an exchange with the given fees and three funded accounts.
pub fn exchange_with_fees(taker_bps: u16, maker_bps: u16) -> Harness {
    let mut ledger_a = InMemoryLedger::new(ESCROW);
    let mut ledger_b = InMemoryLedger::new(ESCROW);
    for account in [ALICE, BOB, CAROL] {
        ledger_a.credit(account, STARTING_BALANCE);
        ledger_b.credit(account, STARTING_BALANCE);
    }

    let config = ExchangeConfig {
        taker_fee_bps: taker_bps,
        maker_fee_bps: maker_bps,
        fee_admin: ADMIN,
        fee_recipient: FEE_SINK,
        escrow_account: ESCROW,
    };
    let sink = Arc::new(RecordingEventSink::default());
    let exchange = Exchange::new(
        config,
        Box::new(ledger_a),
        Box::new(ledger_b),
        sink.clone(),
    )
    .unwrap();
    Harness { exchange, sink }
}

/// Builds a fee-free exchange with three funded accounts.
pub fn funded_exchange() -> Harness {
    exchange_with_fees(0, 0)
}

/// The `(id, selling_amt)` pairs of a side, best first.
pub fn book_state(exchange: &Exchange, side: Side) -> Vec<(OrderId, Amount)> {
    exchange
        .depth(side)
        .into_iter()
        .map(|id| (id, exchange.order(id).unwrap().selling_amt))
        .collect()
}

/// Asserts the escrow balance of each asset equals the sum of the
/// matching resting amounts.
pub fn assert_conservation(exchange: &Exchange) {
    let asks: Amount = exchange
        .depth(Side::Ask)
        .iter()
        .map(|&id| exchange.order(id).unwrap().selling_amt)
        .sum();
    let bids: Amount = exchange
        .depth(Side::Bid)
        .iter()
        .map(|&id| exchange.order(id).unwrap().selling_amt)
        .sum();
    assert_eq!(
        exchange.ledger(Token::A).balance_of(ESCROW),
        asks,
        "escrowed A diverged from resting ask inventory"
    );
    assert_eq!(
        exchange.ledger(Token::B).balance_of(ESCROW),
        bids,
        "escrowed B diverged from resting bid inventory"
    );
}

/// Asserts each side is sorted best-first under the quote order, with no
/// order sorting strictly ahead of one in front of it.
pub fn assert_book_sorted(exchange: &Exchange) {
    for side in [Side::Bid, Side::Ask] {
        let depth = exchange.depth(side);
        for pair in depth.windows(2) {
            let front = exchange.order(pair[0]).unwrap();
            let behind = exchange.order(pair[1]).unwrap();
            assert!(
                !better_on(side, &behind.price, &front.price),
                "book order violated on {side:?}: {} sorts ahead of {}",
                pair[1],
                pair[0]
            );
        }
    }
}
