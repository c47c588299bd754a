use crypto_bigint::{CheckedMul, NonZero, U256, U512};
use mimalloc::MiMalloc;
use std::cmp::Ordering;

/// Global allocator
/// Requires the `mimalloc` feature to be enabled in the `Cargo.toml` file.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// OrderId is the type used for order ids.
///
/// Ids 0 and 1 are reserved: 0 is the book sentinel ("back of list" as a
/// position hint) and 1 means "front of list" as a position hint. Real
/// orders are numbered from [`FIRST_ORDER_ID`] upward.
pub type OrderId = u64;

/// AccountId is the opaque identifier of an order owner or fee recipient.
pub type AccountId = u64;

/// Amount is the type used for token quantities.
pub type Amount = u128;

/// Ratio is the type used for the scaled price ratio of an order.
/// This is a 256-bit unsigned integer.
pub type Ratio = U256;

/// The sentinel order id shared by both book lists.
pub const SENTINEL: OrderId = 0;

/// Position hint meaning "insert at the front of the list".
pub const FRONT_HINT: OrderId = 1;

/// The first id handed out by the order store.
pub const FIRST_ORDER_ID: OrderId = 2;

/// Fixed-point scale of every price ratio.
pub const SCALE: Amount = 1_000_000_000_000_000;

/// [`SCALE`] as a ratio, for comparisons and conversions.
pub const RATIO_SCALE: Ratio = U256::from_u64(1_000_000_000_000_000);

/// Denominator of the fee basis points.
pub const FEE_BPS_DENOM: Amount = 10_000;

/// Maximum fee either side can be charged, in basis points (50%).
pub const MAX_FEE_BPS: u16 = 5_000;

/// Token identifies one of the two fungible assets of the pair.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum Token {
    /// The `A` asset of the pair.
    A,
    /// The `B` asset of the pair.
    B,
}

impl Token {
    /// The opposite asset of the pair.
    #[inline(always)]
    pub fn other(self) -> Token {
        match self {
            Token::A => Token::B,
            Token::B => Token::A,
        }
    }
}

/// Side indicates which book list an order rests in.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Side {
    /// Bid orders sell `B` and buy `A`.
    Bid,
    /// Ask orders sell `A` and buy `B`.
    Ask,
}

impl Side {
    /// The book list an order selling `token` belongs to.
    #[inline(always)]
    pub fn of_selling(token: Token) -> Side {
        match token {
            Token::A => Side::Ask,
            Token::B => Side::Bid,
        }
    }

    /// The opposing book list.
    #[inline(always)]
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// RatioPrice is the direction-agnostic quote of an order.
///
/// `ratio` equals `max(a_amt, b_amt) * SCALE / min(a_amt, b_amt)` and
/// `bigger` names the asset with the numerically larger amount, so the
/// pair encodes both sides of the price without fractions. A plain ratio
/// would conflate "5 A for 1 B" with "1 A for 5 B".
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct RatioPrice {
    pub ratio: Ratio,
    pub bigger: Token,
}

impl RatioPrice {
    /// Computes the quote of an order trading `a_amt` of `A` against
    /// `b_amt` of `B`. Returns `None` when either amount is zero.
    ///
    /// Equal amounts quote with `bigger = B`, so a `bigger = A` quote
    /// always has `ratio > SCALE`.
    pub fn from_amounts(a_amt: Amount, b_amt: Amount) -> Option<RatioPrice> {
        if a_amt == 0 || b_amt == 0 {
            return None;
        }
        let (bigger, max, min) = if a_amt > b_amt {
            (Token::A, a_amt, b_amt)
        } else {
            (Token::B, b_amt, a_amt)
        };
        let wide = wide_from_amount(max).checked_mul(&wide_from_amount(SCALE));
        let wide = Option::<U512>::from(wide)?;
        let divisor = Option::<NonZero<U512>>::from(NonZero::new(wide_from_amount(min)))?;
        let (quotient, _) = wide.div_rem(&divisor);
        narrow_to_ratio(&quotient).map(|ratio| RatioPrice { ratio, bigger })
    }

    /// Converts `amt` denominated in `from` into the equivalent amount of
    /// the other asset at this quote, truncating toward zero. Returns
    /// `None` when the result does not fit an [`Amount`].
    pub fn convert(&self, from: Token, amt: Amount) -> Option<Amount> {
        if self.bigger == from {
            mul_div(amt, RATIO_SCALE, self.ratio)
        } else {
            mul_div(amt, self.ratio, RATIO_SCALE)
        }
    }
}

/// Returns true when quote `x` sorts strictly ahead of quote `y` in the
/// book list for `side`.
///
/// Asks: a `bigger = B` quote sorts ahead of any `bigger = A` quote;
/// between `bigger = A` quotes the larger ratio wins, between
/// `bigger = B` quotes the smaller ratio wins. Bids mirror every rule.
pub fn better_on(side: Side, x: &RatioPrice, y: &RatioPrice) -> bool {
    let ask_order = match (x.bigger, y.bigger) {
        (Token::B, Token::A) => Ordering::Less,
        (Token::A, Token::B) => Ordering::Greater,
        (Token::A, Token::A) => y.ratio.cmp(&x.ratio),
        (Token::B, Token::B) => x.ratio.cmp(&y.ratio),
    };
    match side {
        Side::Ask => ask_order == Ordering::Less,
        Side::Bid => ask_order == Ordering::Greater,
    }
}

/// Returns true when quote `x` is at least as good as quote `y` on
/// `side`, i.e. `y` does not sort strictly ahead of `x`.
#[inline(always)]
pub fn at_least_as_good_on(side: Side, x: &RatioPrice, y: &RatioPrice) -> bool {
    !better_on(side, y, x)
}

/// Order represents a single resting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub owner: AccountId,
    /// The asset the maker sells; the escrowed side.
    pub selling: Token,
    /// Remaining amount of the sold asset still held in escrow.
    pub selling_amt: Amount,
    /// Remaining amount of the other asset the maker expects to receive.
    pub buying_amt: Amount,
    pub price: RatioPrice,
    /// True iff the record is linked into a book list.
    pub active: bool,
}

impl Order {
    /// The asset the maker receives.
    #[inline(always)]
    pub fn buying(&self) -> Token {
        self.selling.other()
    }

    /// The book list this order rests in.
    #[inline(always)]
    pub fn side(&self) -> Side {
        Side::of_selling(self.selling)
    }
}

/// Computes `value * numerator / denominator` with the product widened to
/// 512 bits, truncating toward zero. Returns `None` when the quotient
/// does not fit an [`Amount`] or the denominator is zero.
pub(crate) fn mul_div(value: Amount, numerator: Ratio, denominator: Ratio) -> Option<Amount> {
    let wide = wide_from_amount(value).checked_mul(&widen_ratio(&numerator));
    let wide = Option::<U512>::from(wide)?;
    let divisor = Option::<NonZero<U512>>::from(NonZero::new(widen_ratio(&denominator)))?;
    let (quotient, _) = wide.div_rem(&divisor);
    narrow_to_amount(&quotient)
}

/// Computes `value * numerator / denominator` over plain amounts, with
/// the product widened to 512 bits.
pub(crate) fn mul_div_amounts(
    value: Amount,
    numerator: Amount,
    denominator: Amount,
) -> Option<Amount> {
    let wide = wide_from_amount(value).checked_mul(&wide_from_amount(numerator));
    let wide = Option::<U512>::from(wide)?;
    let divisor = Option::<NonZero<U512>>::from(NonZero::new(wide_from_amount(denominator)))?;
    let (quotient, _) = wide.div_rem(&divisor);
    narrow_to_amount(&quotient)
}

/// Widens an amount into the 512-bit working width.
pub(crate) fn wide_from_amount(value: Amount) -> U512 {
    let mut words = [0u64; U512::LIMBS];
    words[0] = value as u64;
    words[1] = (value >> 64) as u64;
    U512::from_words(words)
}

/// Widens a ratio into the 512-bit working width.
pub(crate) fn widen_ratio(value: &Ratio) -> U512 {
    let mut words = [0u64; U512::LIMBS];
    words[..U256::LIMBS].copy_from_slice(value.as_words());
    U512::from_words(words)
}

/// Narrows a 512-bit quotient back into an [`Amount`].
pub(crate) fn narrow_to_amount(value: &U512) -> Option<Amount> {
    let words = value.as_words();
    if words[2..].iter().any(|&w| w != 0) {
        return None;
    }
    Some(((words[1] as u128) << 64) | words[0] as u128)
}

/// Narrows a 512-bit quotient back into a [`Ratio`].
pub(crate) fn narrow_to_ratio(value: &U512) -> Option<Ratio> {
    let words = value.as_words();
    if words[U256::LIMBS..].iter().any(|&w| w != 0) {
        return None;
    }
    let mut low = [0u64; U256::LIMBS];
    low.copy_from_slice(&words[..U256::LIMBS]);
    Some(U256::from_words(low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn ratio_of(a: Amount, b: Amount) -> Ratio {
        RatioPrice::from_amounts(a, b).unwrap().ratio
    }

    fn ratio_to_biguint(r: &Ratio) -> BigUint {
        let mut out = BigUint::from(0u8);
        for &word in r.as_words().iter().rev() {
            out = (out << 64) | BigUint::from(word);
        }
        out
    }

    #[test]
    fn test_ratio_matches_biguint_oracle() {
        let cases: &[(Amount, Amount)] = &[
            (5, 1),
            (1, 5),
            (7, 3),
            (u128::MAX, 1),
            (u128::MAX, u128::MAX - 1),
            (1_000_000_007, 998_244_353),
        ];
        for &(a, b) in cases {
            let price = RatioPrice::from_amounts(a, b).unwrap();
            let (max, min) = if a > b { (a, b) } else { (b, a) };
            let expected = BigUint::from(max) * BigUint::from(SCALE) / BigUint::from(min);
            assert_eq!(
                ratio_to_biguint(&price.ratio),
                expected,
                "ratio mismatch for {a}:{b}"
            );
        }
    }

    #[test]
    fn test_mul_div_matches_biguint_oracle() {
        let cases: &[(Amount, Amount, Amount)] = &[
            (10, 3, 7),
            (u128::MAX, u128::MAX, u128::MAX),
            (u128::MAX / 2, 6, 3),
            (1, SCALE, SCALE),
        ];
        for &(v, n, d) in cases {
            let expected = BigUint::from(v) * BigUint::from(n) / BigUint::from(d);
            let got = mul_div_amounts(v, n, d).map(BigUint::from);
            assert_eq!(got, Some(expected), "mul_div mismatch for {v}*{n}/{d}");
        }
    }

    #[test]
    fn test_mul_div_detects_narrowing_overflow() {
        assert_eq!(mul_div_amounts(u128::MAX, u128::MAX, 1), None);
        assert_eq!(mul_div_amounts(u128::MAX, 2, 1), None);
    }

    #[test]
    fn test_from_amounts_rejects_zero() {
        assert_eq!(RatioPrice::from_amounts(0, 5), None);
        assert_eq!(RatioPrice::from_amounts(5, 0), None);
    }

    #[test]
    fn test_equal_amounts_quote_as_bigger_b() {
        let price = RatioPrice::from_amounts(9, 9).unwrap();
        assert_eq!(price.bigger, Token::B);
        assert_eq!(price.ratio, RATIO_SCALE);
    }

    #[test]
    fn test_convert_round_trips_exact_quotes() {
        let price = RatioPrice::from_amounts(20, 4).unwrap();
        assert_eq!(price.convert(Token::A, 20), Some(4));
        assert_eq!(price.convert(Token::B, 4), Some(20));
    }

    #[test]
    fn test_ask_ordering() {
        // Between bigger-A asks the larger ratio sorts first.
        let generous = RatioPrice {
            ratio: ratio_of(5, 1),
            bigger: Token::A,
        };
        let stingy = RatioPrice {
            ratio: ratio_of(2, 1),
            bigger: Token::A,
        };
        assert!(better_on(Side::Ask, &generous, &stingy));
        assert!(!better_on(Side::Ask, &stingy, &generous));

        // Between bigger-B asks the smaller ratio sorts first.
        let cheap = RatioPrice {
            ratio: ratio_of(1, 2),
            bigger: Token::B,
        };
        let dear = RatioPrice {
            ratio: ratio_of(1, 7),
            bigger: Token::B,
        };
        assert!(better_on(Side::Ask, &cheap, &dear));

        // A bigger-B ask sorts ahead of any bigger-A ask.
        assert!(better_on(Side::Ask, &dear, &generous));
        assert!(!better_on(Side::Ask, &generous, &dear));
    }

    #[test]
    fn test_bid_ordering_mirrors_ask_ordering() {
        let x = RatioPrice {
            ratio: ratio_of(5, 1),
            bigger: Token::A,
        };
        let y = RatioPrice {
            ratio: ratio_of(2, 1),
            bigger: Token::A,
        };
        assert!(better_on(Side::Ask, &x, &y));
        assert!(better_on(Side::Bid, &y, &x));

        let z = RatioPrice {
            ratio: ratio_of(1, 3),
            bigger: Token::B,
        };
        assert!(better_on(Side::Ask, &z, &x));
        assert!(better_on(Side::Bid, &x, &z));
    }

    #[test]
    fn test_at_least_as_good_holds_on_equal_quotes() {
        let q = RatioPrice {
            ratio: ratio_of(5, 1),
            bigger: Token::A,
        };
        assert!(at_least_as_good_on(Side::Ask, &q, &q));
        assert!(at_least_as_good_on(Side::Bid, &q, &q));
    }

    #[test]
    fn test_ordering_is_transitive_per_side() {
        let quotes = [
            RatioPrice {
                ratio: ratio_of(9, 1),
                bigger: Token::A,
            },
            RatioPrice {
                ratio: ratio_of(3, 1),
                bigger: Token::A,
            },
            RatioPrice {
                ratio: ratio_of(1, 2),
                bigger: Token::B,
            },
            RatioPrice {
                ratio: ratio_of(1, 6),
                bigger: Token::B,
            },
        ];
        for side in [Side::Ask, Side::Bid] {
            for x in &quotes {
                for y in &quotes {
                    for z in &quotes {
                        if better_on(side, x, y) && better_on(side, y, z) {
                            assert!(better_on(side, x, z), "transitivity violated on {side:?}");
                        }
                    }
                }
            }
        }
    }
}
