//! The public surface of the pair exchange.
//!
//! Every entry point runs to completion on `&mut self`, so calls are
//! serialized by ownership and a ledger adapter can never re-enter the
//! exchange while a call is in flight. Each call is transactional: state
//! mutates eagerly against a snapshot, ledger movements queue in a
//! [`TransferBatch`], and only a call that validates and executes its
//! batch publishes events. Any error restores the snapshot and leaves no
//! observable effect.

use crate::book::Book;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink};
use crate::ledger::{AssetLedger, LegPurpose, LegSource, TransferBatch};
use crate::matching::{self, Intent};
use crate::settlement::Fees;
use crate::store::OrderStore;
use crate::types::{
    AccountId, Amount, FRONT_HINT, MAX_FEE_BPS, Order, OrderId, RatioPrice, SENTINEL, Side, Token,
};
use log::{debug, info, warn};
use std::sync::Arc;

/// Static parameters of an exchange instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeConfig {
    /// Fee charged to takers, in basis points of the fill cost.
    pub taker_fee_bps: u16,
    /// Fee withheld from makers, in basis points of the fill cost.
    pub maker_fee_bps: u16,
    /// The only account allowed to change the fees.
    pub fee_admin: AccountId,
    /// Where collected fees go.
    pub fee_recipient: AccountId,
    /// The ledger account holding escrowed maker inventory.
    pub escrow_account: AccountId,
}

/// The buffered effects of one public call.
#[derive(Default)]
struct CallContext {
    batch: TransferBatch,
    events: Vec<EngineEvent>,
}

/// Exchange matches incoming orders against the resting book and settles
/// fills through the two asset ledgers.
pub struct Exchange {
    config: ExchangeConfig,
    store: OrderStore,
    book: Book,
    ledger_a: Box<dyn AssetLedger>,
    ledger_b: Box<dyn AssetLedger>,
    events: Arc<dyn EventSink>,
}

/// Decodes a selling/spending flag into the token it names.
fn token_from_flag(flag: u8) -> Result<Token, EngineError> {
    match flag {
        1 => Ok(Token::A),
        0 => Ok(Token::B),
        _ => Err(EngineError::SellingTokenNotBool),
    }
}

impl Exchange {
    /// Creates an exchange over the two asset ledgers.
    pub fn new(
        config: ExchangeConfig,
        ledger_a: Box<dyn AssetLedger>,
        ledger_b: Box<dyn AssetLedger>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, EngineError> {
        if config.taker_fee_bps > MAX_FEE_BPS || config.maker_fee_bps > MAX_FEE_BPS {
            return Err(EngineError::InvalidFeeValue);
        }
        Ok(Self {
            config,
            store: OrderStore::new(),
            book: Book::new(),
            ledger_a,
            ledger_b,
            events,
        })
    }

    /// Submits a limit order trading `a_amt` of `A` against `b_amt` of
    /// `B`, selling `A` when `selling_a` is 1 and `B` when it is 0.
    ///
    /// The order first crosses the opposite book as a taker; any
    /// remainder is repriced to the original quote, escrowed and rested
    /// at the position named by `position_hint` (an order id, 1 for the
    /// front, 0 for the back; a wrong hint is repaired by scanning).
    /// Returns the rested order id, or `None` when nothing rested.
    pub fn make_order(
        &mut self,
        owner: AccountId,
        a_amt: Amount,
        b_amt: Amount,
        selling_a: u8,
        position_hint: OrderId,
    ) -> Result<Option<OrderId>, EngineError> {
        let selling = token_from_flag(selling_a)?;
        if a_amt == 0 || b_amt == 0 {
            return Err(EngineError::ZeroTokenAmount);
        }
        let price =
            RatioPrice::from_amounts(a_amt, b_amt).ok_or(EngineError::ZeroTokenAmount)?;
        debug!("make_order: {a_amt} A / {b_amt} B, selling {selling:?}");

        self.transactional(|ex, ctx| {
            let fees = ex.fees();
            let mut intent = Intent::new(selling, price, a_amt, b_amt);
            matching::match_crossing(
                &mut ex.store,
                &mut ex.book,
                &fees,
                &mut ctx.batch,
                &mut ctx.events,
                owner,
                &mut intent,
            )?;

            let selling_rem = intent.selling_rem();
            if selling_rem == 0 {
                return Ok(None);
            }
            // Reprice the remainder from the original quote; the walk's
            // truncation can leave the other side off by one.
            let Some(buying_rem) = price.convert(selling, selling_rem).filter(|amt| *amt > 0)
            else {
                debug!("remainder {selling_rem} is unpriceable dust, nothing rests");
                return Ok(None);
            };

            let id = ex.store.allocate_id();
            ctx.batch.push(
                selling,
                LegSource::Account(owner),
                ex.config.escrow_account,
                selling_rem,
                LegPurpose::EscrowDeposit,
            );
            ex.store.put(Order {
                id,
                owner,
                selling,
                selling_amt: selling_rem,
                buying_amt: buying_rem,
                price,
                active: true,
            });

            let side = Side::of_selling(selling);
            let old_front = ex.book.front(side);
            let pivot = ex.book.verify_hint(&ex.store, side, &price, position_hint);
            ex.book.insert_before(id, pivot, side);
            let position = if pivot == SENTINEL {
                SENTINEL
            } else if pivot == old_front {
                FRONT_HINT
            } else {
                pivot
            };

            ctx.events.push(EngineEvent::OfferCreate {
                id,
                owner,
                selling,
                selling_amt: selling_rem,
                buying_amt: buying_rem,
            });
            ctx.events
                .push(EngineEvent::MakerOrderCreated { id, position });
            info!("rested order {id}: {selling_rem} {selling:?} for {buying_rem}");
            Ok(Some(id))
        })
    }

    /// Spends up to `amt` of the named token against the opposite book
    /// with no price limit. Returns the unspent remainder.
    pub fn take(
        &mut self,
        caller: AccountId,
        amt: Amount,
        spending_a: u8,
    ) -> Result<Amount, EngineError> {
        let spending = token_from_flag(spending_a)?;
        debug!("take: {amt} of {spending:?}");

        self.transactional(|ex, ctx| {
            let fees = ex.fees();
            let remaining = matching::take_walk(
                &mut ex.store,
                &mut ex.book,
                &fees,
                &mut ctx.batch,
                &mut ctx.events,
                caller,
                spending,
                amt,
            )?;
            ctx.events.push(EngineEvent::TakerOrder {
                remaining,
                spending,
            });
            Ok(remaining)
        })
    }

    /// Crosses the opposite book like [`Self::make_order`] but never
    /// rests a remainder. Returns the `(a_used, b_used)` amounts.
    pub fn immediate_or_cancel(
        &mut self,
        caller: AccountId,
        a_amt: Amount,
        b_amt: Amount,
        selling_a: u8,
    ) -> Result<(Amount, Amount), EngineError> {
        let selling = token_from_flag(selling_a)?;
        if a_amt == 0 || b_amt == 0 {
            return Err(EngineError::ZeroTokenAmount);
        }
        let price =
            RatioPrice::from_amounts(a_amt, b_amt).ok_or(EngineError::ZeroTokenAmount)?;

        self.transactional(|ex, ctx| {
            let mut intent = Intent::new(selling, price, a_amt, b_amt);
            let fees = ex.fees();
            matching::match_crossing(
                &mut ex.store,
                &mut ex.book,
                &fees,
                &mut ctx.batch,
                &mut ctx.events,
                caller,
                &mut intent,
            )?;
            let used = (a_amt - intent.a_rem, b_amt - intent.b_rem);
            ctx.events.push(EngineEvent::IoCOrder {
                a_used: used.0,
                b_used: used.1,
                selling,
            });
            Ok(used)
        })
    }

    /// Like [`Self::immediate_or_cancel`], but aborts the whole call
    /// unless the selling side is fully consumed.
    pub fn fill_or_kill(
        &mut self,
        caller: AccountId,
        a_amt: Amount,
        b_amt: Amount,
        selling_a: u8,
    ) -> Result<(Amount, Amount), EngineError> {
        let selling = token_from_flag(selling_a)?;
        if a_amt == 0 || b_amt == 0 {
            return Err(EngineError::ZeroTokenAmount);
        }
        let price =
            RatioPrice::from_amounts(a_amt, b_amt).ok_or(EngineError::ZeroTokenAmount)?;

        self.transactional(|ex, ctx| {
            let mut intent = Intent::new(selling, price, a_amt, b_amt);
            let fees = ex.fees();
            matching::match_crossing(
                &mut ex.store,
                &mut ex.book,
                &fees,
                &mut ctx.batch,
                &mut ctx.events,
                caller,
                &mut intent,
            )?;
            if intent.selling_rem() > 0 {
                return Err(EngineError::FillOrKillNotFilled);
            }
            let used = (a_amt - intent.a_rem, b_amt - intent.b_rem);
            ctx.events.push(EngineEvent::FoKOrder {
                a_used: used.0,
                b_used: used.1,
                selling,
            });
            Ok(used)
        })
    }

    /// Cancels a resting order, refunding the unsold remainder from
    /// escrow. Only the owner may cancel.
    pub fn cancel(&mut self, caller: AccountId, id: OrderId) -> Result<(), EngineError> {
        self.transactional(|ex, ctx| {
            let order = ex.store.get(id)?.clone();
            if order.owner != caller {
                return Err(EngineError::NonOwnerCantCancelOrder);
            }

            ctx.batch.push(
                order.selling,
                LegSource::Escrow,
                order.owner,
                order.selling_amt,
                LegPurpose::EscrowRefund,
            );
            ex.store.set_active(id, false)?;
            ex.book.unlink(id, order.side());
            ex.store.remove(id);

            ctx.events.push(EngineEvent::OrderCancelled {
                id,
                owner: order.owner,
            });
            ctx.events.push(EngineEvent::DeleteOffer { id });
            info!("cancelled order {id}, refunding {}", order.selling_amt);
            Ok(())
        })
    }

    /// Sets the taker fee. Restricted to the fee admin.
    pub fn set_taker_fee(&mut self, caller: AccountId, bps: u16) -> Result<(), EngineError> {
        if caller != self.config.fee_admin {
            return Err(EngineError::NotFeeAdmin);
        }
        if bps > MAX_FEE_BPS {
            return Err(EngineError::InvalidFeeValue);
        }
        self.config.taker_fee_bps = bps;
        info!("taker fee set to {bps} bps");
        Ok(())
    }

    /// Sets the maker fee. Restricted to the fee admin.
    pub fn set_maker_fee(&mut self, caller: AccountId, bps: u16) -> Result<(), EngineError> {
        if caller != self.config.fee_admin {
            return Err(EngineError::NotFeeAdmin);
        }
        if bps > MAX_FEE_BPS {
            return Err(EngineError::InvalidFeeValue);
        }
        self.config.maker_fee_bps = bps;
        info!("maker fee set to {bps} bps");
        Ok(())
    }

    /// Current taker fee in basis points.
    pub fn taker_fee_bps(&self) -> u16 {
        self.config.taker_fee_bps
    }

    /// Current maker fee in basis points.
    pub fn maker_fee_bps(&self) -> u16 {
        self.config.maker_fee_bps
    }

    /// The account escrowed funds are held under.
    pub fn escrow_account(&self) -> AccountId {
        self.config.escrow_account
    }

    /// An active resting order.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.store.get(id).ok()
    }

    /// The best resting order of a side, or [`SENTINEL`] when empty.
    pub fn best(&self, side: Side) -> OrderId {
        self.book.front(side)
    }

    /// All resting order ids of a side, best first.
    pub fn depth(&self, side: Side) -> Vec<OrderId> {
        self.book.side(side).iter().collect()
    }

    /// Read access to one of the backing ledgers.
    pub fn ledger(&self, token: Token) -> &dyn AssetLedger {
        match token {
            Token::A => self.ledger_a.as_ref(),
            Token::B => self.ledger_b.as_ref(),
        }
    }

    fn fees(&self) -> Fees {
        Fees {
            taker_bps: self.config.taker_fee_bps,
            maker_bps: self.config.maker_fee_bps,
            recipient: self.config.fee_recipient,
        }
    }

    /// Runs `op` against a snapshot of the engine state, settles its
    /// ledger batch and publishes its events on success, and restores
    /// the snapshot on any error.
    fn transactional<T>(
        &mut self,
        op: impl FnOnce(&mut Self, &mut CallContext) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let store_snapshot = self.store.clone();
        let book_snapshot = self.book.clone();
        let mut ctx = CallContext::default();

        let result = op(self, &mut ctx).and_then(|value| {
            self.settle_batch(&ctx.batch)?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                for event in &ctx.events {
                    self.events.publish(event);
                }
                Ok(value)
            }
            Err(err) => {
                self.store = store_snapshot;
                self.book = book_snapshot;
                warn!("call aborted: {err}");
                Err(err)
            }
        }
    }

    /// Validates the whole batch against current balances, then executes
    /// it. Nothing moves unless every leg is covered.
    fn settle_batch(&mut self, batch: &TransferBatch) -> Result<(), EngineError> {
        if batch.is_empty() {
            return Ok(());
        }
        batch.validate(
            self.ledger_a.as_ref(),
            self.ledger_b.as_ref(),
            self.config.escrow_account,
        )?;
        batch.execute(self.ledger_a.as_mut(), self.ledger_b.as_mut())
    }
}
