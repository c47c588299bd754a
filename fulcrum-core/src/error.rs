use crate::types::OrderId;
use thiserror::Error;

/// Represents every failure a public exchange call can abort with.
///
/// Any error rolls the whole call back; callers observe either the
/// success event stream or exactly one of these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// A token amount of an incoming order was zero.
    #[error("token amounts must be positive")]
    ZeroTokenAmount,
    /// The selling/spending token flag was neither 0 nor 1.
    #[error("selling token flag must be 0 or 1")]
    SellingTokenNotBool,
    /// A fill was requested for a zero quantity.
    #[error("buy quantity must be positive")]
    ZeroBuyQuantity,
    /// A fill was requested for more than the resting order holds.
    #[error("buy quantity exceeds the order amount")]
    QuantityExceedsOrderAmount,
    /// A fee above [`crate::types::MAX_FEE_BPS`] was requested.
    #[error("fee exceeds the allowed maximum")]
    InvalidFeeValue,
    /// The order is unknown or no longer active.
    #[error("order {0} is not active")]
    InactiveOrder(OrderId),
    /// Someone other than the owner tried to cancel an order.
    #[error("only the order owner may cancel it")]
    NonOwnerCantCancelOrder,
    /// Someone other than the fee admin tried to change a fee.
    #[error("only the fee admin may change fees")]
    NotFeeAdmin,
    /// Escrowing the maker's selling amount failed.
    #[error("transfer to escrow failed")]
    TransferToEscrowError,
    /// The taker cannot cover the fees of a fill.
    #[error("insufficient funds for fees")]
    LackingFundsForFees,
    /// The taker cannot cover the cost of a fill.
    #[error("insufficient funds for the transaction")]
    LackingFundsForTransaction,
    /// Paying out of escrow failed.
    #[error("transfer out of escrow failed")]
    EscrowToBuyerError,
    /// A fill-or-kill order could not be fully filled.
    #[error("fill-or-kill order was not fully filled")]
    FillOrKillNotFilled,
}
