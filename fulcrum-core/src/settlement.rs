use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::ledger::{LegPurpose, LegSource, TransferBatch};
use crate::store::OrderStore;
use crate::types::{AccountId, Amount, FEE_BPS_DENOM, OrderId, mul_div_amounts};
use log::debug;

/// The fee parameters a fill settles under.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fees {
    pub taker_bps: u16,
    pub maker_bps: u16,
    pub recipient: AccountId,
}

/// The accounting result of one fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FillOutcome {
    /// What the taker paid, in the resting order's buying asset.
    pub cost: Amount,
    /// True when the resting order was fully consumed and deactivated.
    /// The caller unlinks it from the book.
    pub retired: bool,
}

/// Fills `qty` units of the resting order's selling asset.
///
/// Computes the cost pro rata over the order's remaining amounts,
/// deducts both fees from the taker's payment, queues the three ledger
/// legs and decrements the order. A fully consumed order is deactivated
/// here; unlinking stays with the caller.
pub(crate) fn fill(
    store: &mut OrderStore,
    fees: &Fees,
    batch: &mut TransferBatch,
    events: &mut Vec<EngineEvent>,
    taker: AccountId,
    rid: OrderId,
    qty: Amount,
) -> Result<FillOutcome, EngineError> {
    let resting = store.get(rid)?;
    if qty == 0 {
        return Err(EngineError::ZeroBuyQuantity);
    }
    if qty > resting.selling_amt {
        return Err(EngineError::QuantityExceedsOrderAmount);
    }

    let owner = resting.owner;
    let pay_token = resting.buying();
    let receive_token = resting.selling;
    let cost = mul_div_amounts(resting.buying_amt, qty, resting.selling_amt)
        .expect("cost is bounded by the order's buying amount");
    let taker_fee = mul_div_amounts(cost, fees.taker_bps as Amount, FEE_BPS_DENOM)
        .expect("fee is bounded by the cost");
    let maker_fee = mul_div_amounts(cost, fees.maker_bps as Amount, FEE_BPS_DENOM)
        .expect("fee is bounded by the cost");

    batch.push(
        pay_token,
        LegSource::Account(taker),
        fees.recipient,
        taker_fee + maker_fee,
        LegPurpose::FeeCollection,
    );
    batch.push(
        pay_token,
        LegSource::Account(taker),
        owner,
        cost - maker_fee,
        LegPurpose::MakerPayment,
    );
    batch.push(
        receive_token,
        LegSource::Escrow,
        taker,
        qty,
        LegPurpose::EscrowRelease,
    );

    let resting = store.get_mut(rid)?;
    resting.selling_amt -= qty;
    resting.buying_amt -= cost;
    let retired = resting.selling_amt == 0;
    let (selling_amt, buying_amt) = (resting.selling_amt, resting.buying_amt);

    events.push(EngineEvent::OfferTake {
        id: rid,
        qty,
        cost,
    });
    if retired {
        store.set_active(rid, false)?;
        events.push(EngineEvent::DeleteOffer { id: rid });
    } else {
        events.push(EngineEvent::OfferUpdate {
            id: rid,
            selling_amt,
            buying_amt,
        });
    }
    if taker_fee > 0 {
        events.push(EngineEvent::TakerFeePaid {
            payer: taker,
            amount: taker_fee,
        });
    }
    if maker_fee > 0 {
        events.push(EngineEvent::MakerFeePaid {
            maker: owner,
            amount: maker_fee,
        });
    }

    debug!("filled order {rid}: qty {qty} for cost {cost}, retired {retired}");
    Ok(FillOutcome { cost, retired })
}
