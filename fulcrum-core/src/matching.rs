use crate::book::Book;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::ledger::TransferBatch;
use crate::settlement::{self, Fees};
use crate::store::OrderStore;
use crate::types::{
    AccountId, Amount, RatioPrice, SENTINEL, Side, Token, at_least_as_good_on, mul_div_amounts,
};
use log::debug;

/// An incoming order while it consumes resting liquidity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Intent {
    pub selling: Token,
    pub price: RatioPrice,
    pub a_rem: Amount,
    pub b_rem: Amount,
}

impl Intent {
    pub(crate) fn new(selling: Token, price: RatioPrice, a_amt: Amount, b_amt: Amount) -> Self {
        Self {
            selling,
            price,
            a_rem: a_amt,
            b_rem: b_amt,
        }
    }

    /// Remaining amount on the selling side.
    pub(crate) fn selling_rem(&self) -> Amount {
        match self.selling {
            Token::A => self.a_rem,
            Token::B => self.b_rem,
        }
    }

    /// Books one fill: the selling side drops by what was paid, the
    /// buying side by what was received. A fill at a better price than
    /// the intent's own quote can deliver more than the intent asked
    /// for, so the buying side saturates.
    fn apply_fill(&mut self, cost: Amount, received: Amount) {
        match self.selling {
            Token::A => {
                self.a_rem -= cost;
                self.b_rem = self.b_rem.saturating_sub(received);
            }
            Token::B => {
                self.b_rem -= cost;
                self.a_rem = self.a_rem.saturating_sub(received);
            }
        }
    }
}

/// The largest fill of a resting order the remaining budget can pay for
/// without exceeding it, derived from the order's own amounts.
fn affordable(budget: Amount, r_selling_amt: Amount, r_buying_amt: Amount) -> Amount {
    if budget >= r_buying_amt {
        r_selling_amt
    } else {
        mul_div_amounts(budget, r_selling_amt, r_buying_amt).unwrap_or(0)
    }
}

/// Walks the opposite book and fills every crossing order until the
/// intent's selling side is exhausted or no crossing order remains.
///
/// A resting order crosses while the intent's quote is at least as good
/// as the resting quote in the resting book's own order. Fills happen at
/// the resting order's price. Fully consumed orders are unlinked and
/// removed here, after settlement deactivates them.
pub(crate) fn match_crossing(
    store: &mut OrderStore,
    book: &mut Book,
    fees: &Fees,
    batch: &mut TransferBatch,
    events: &mut Vec<EngineEvent>,
    taker: AccountId,
    intent: &mut Intent,
) -> Result<(), EngineError> {
    let walk_side = Side::of_selling(intent.selling).opposite();
    let mut cursor = book.front(walk_side);

    while cursor != SENTINEL && intent.selling_rem() > 0 {
        let resting = store.get(cursor)?;
        if !at_least_as_good_on(walk_side, &intent.price, &resting.price) {
            break;
        }
        let r_price = resting.price;
        let r_buying_token = resting.buying();
        let r_selling_amt = resting.selling_amt;
        let r_buying_amt = resting.buying_amt;

        let rem = intent.selling_rem();
        let want = r_price
            .convert(r_buying_token, rem)
            .unwrap_or(Amount::MAX);
        let qty = want
            .min(affordable(rem, r_selling_amt, r_buying_amt))
            .min(r_selling_amt);
        if qty == 0 {
            // Truncation dust; the admission path repairs the remainder.
            break;
        }

        let next = book.next_of(cursor, walk_side);
        let outcome = settlement::fill(store, fees, batch, events, taker, cursor, qty)?;
        if outcome.retired {
            book.unlink(cursor, walk_side);
            store.remove(cursor);
        }
        intent.apply_fill(outcome.cost, qty);
        debug!(
            "crossed order {cursor}: qty {qty}, remaining {}",
            intent.selling_rem()
        );
        cursor = next;
    }

    Ok(())
}

/// Walks the opposite book with no price test, spending up to `amt` of
/// `spending` against each resting order in turn. Returns the unspent
/// remainder.
pub(crate) fn take_walk(
    store: &mut OrderStore,
    book: &mut Book,
    fees: &Fees,
    batch: &mut TransferBatch,
    events: &mut Vec<EngineEvent>,
    taker: AccountId,
    spending: Token,
    amt: Amount,
) -> Result<Amount, EngineError> {
    let walk_side = Side::of_selling(spending).opposite();
    let mut remaining = amt;
    let mut cursor = book.front(walk_side);

    while cursor != SENTINEL && remaining > 0 {
        let resting = store.get(cursor)?;
        let qty = affordable(remaining, resting.selling_amt, resting.buying_amt);
        if qty == 0 {
            break;
        }

        let next = book.next_of(cursor, walk_side);
        let outcome = settlement::fill(store, fees, batch, events, taker, cursor, qty)?;
        if outcome.retired {
            book.unlink(cursor, walk_side);
            store.remove(cursor);
        }
        remaining -= outcome.cost;
        cursor = next;
    }

    Ok(remaining)
}
