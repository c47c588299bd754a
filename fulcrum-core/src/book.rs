use crate::store::OrderStore;
use crate::types::{FRONT_HINT, OrderId, RatioPrice, SENTINEL, Side, better_on};
use std::collections::HashMap;

/// A single link of the book list. `prev` and `next` are order ids, with
/// [`SENTINEL`] closing the list into a circle.
#[derive(Debug, Clone, Copy)]
struct Node {
    prev: OrderId,
    next: OrderId,
}

/// One price-time ordered list of resting orders.
///
/// The list is doubly linked through order ids only; the record data
/// lives in the [`OrderStore`]. A sentinel node at key 0 makes the list
/// circular: `sentinel.next` is the best order and `sentinel.prev` the
/// worst.
#[derive(Debug, Clone)]
pub struct BookSide {
    nodes: HashMap<OrderId, Node>,
}

impl BookSide {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            SENTINEL,
            Node {
                prev: SENTINEL,
                next: SENTINEL,
            },
        );
        Self { nodes }
    }

    fn node(&self, id: OrderId) -> Node {
        *self.nodes.get(&id).expect("linked book node")
    }

    fn node_mut(&mut self, id: OrderId) -> &mut Node {
        self.nodes.get_mut(&id).expect("linked book node")
    }

    /// The best order, or [`SENTINEL`] when empty.
    pub fn front(&self) -> OrderId {
        self.node(SENTINEL).next
    }

    /// The worst order, or [`SENTINEL`] when empty.
    pub fn back(&self) -> OrderId {
        self.node(SENTINEL).prev
    }

    /// The order after `id`, or [`SENTINEL`] at the end of the list.
    pub fn next_of(&self, id: OrderId) -> OrderId {
        self.node(id).next
    }

    /// The order before `id`, or [`SENTINEL`] at the front of the list.
    pub fn prev_of(&self, id: OrderId) -> OrderId {
        self.node(id).prev
    }

    /// Whether `id` is linked into this list.
    pub fn contains(&self, id: OrderId) -> bool {
        id != SENTINEL && self.nodes.contains_key(&id)
    }

    /// Number of linked orders.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether the list holds no orders.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Links `id` immediately before `pivot`. A [`SENTINEL`] pivot links
    /// at the back of the list.
    pub fn insert_before(&mut self, id: OrderId, pivot: OrderId) {
        let prev = self.node(pivot).prev;
        self.nodes.insert(id, Node { prev, next: pivot });
        self.node_mut(prev).next = id;
        self.node_mut(pivot).prev = id;
    }

    /// Links `id` at the front of the list.
    pub fn insert_first(&mut self, id: OrderId) {
        let front = self.front();
        self.insert_before(id, front);
    }

    /// Unlinks `id`, joining its neighbours.
    pub fn unlink(&mut self, id: OrderId) {
        let Node { prev, next } = self.node(id);
        self.nodes.remove(&id);
        self.node_mut(prev).next = next;
        self.node_mut(next).prev = prev;
    }

    /// Walks the list front to back.
    pub fn iter(&self) -> BookSideIter<'_> {
        BookSideIter {
            list: self,
            cursor: self.front(),
        }
    }
}

/// Front-to-back iterator over a book list.
pub struct BookSideIter<'a> {
    list: &'a BookSide,
    cursor: OrderId,
}

impl Iterator for BookSideIter<'_> {
    type Item = OrderId;

    fn next(&mut self) -> Option<OrderId> {
        if self.cursor == SENTINEL {
            return None;
        }
        let id = self.cursor;
        self.cursor = self.list.next_of(id);
        Some(id)
    }
}

/// Book holds the two price-time priority lists.
#[derive(Debug, Clone)]
pub struct Book {
    bids: BookSide,
    asks: BookSide,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self {
            bids: BookSide::new(),
            asks: BookSide::new(),
        }
    }

    /// The list for `side`.
    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// The mutable list for `side`.
    pub fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Links `id` at the front of `side`.
    pub fn insert_first(&mut self, id: OrderId, side: Side) {
        self.side_mut(side).insert_first(id);
    }

    /// Links `id` before `pivot` on `side`; pivot [`SENTINEL`] links at
    /// the back.
    pub fn insert_before(&mut self, id: OrderId, pivot: OrderId, side: Side) {
        self.side_mut(side).insert_before(id, pivot);
    }

    /// Unlinks `id` from `side`.
    pub fn unlink(&mut self, id: OrderId, side: Side) {
        self.side_mut(side).unlink(id);
    }

    /// The best order on `side`, or [`SENTINEL`].
    pub fn front(&self, side: Side) -> OrderId {
        self.side(side).front()
    }

    /// The worst order on `side`, or [`SENTINEL`].
    pub fn back(&self, side: Side) -> OrderId {
        self.side(side).back()
    }

    /// The order after `id` on `side`.
    pub fn next_of(&self, id: OrderId, side: Side) -> OrderId {
        self.side(side).next_of(id)
    }

    /// The order before `id` on `side`.
    pub fn prev_of(&self, id: OrderId, side: Side) -> OrderId {
        self.side(side).prev_of(id)
    }

    /// Finds the first order on `side` the new quote sorts strictly
    /// ahead of, or [`SENTINEL`] to append at the back. Equal quotes keep
    /// the older order in front.
    pub fn find_insert_position(
        &self,
        store: &OrderStore,
        side: Side,
        price: &RatioPrice,
    ) -> OrderId {
        let list = self.side(side);
        let mut cursor = list.front();
        while cursor != SENTINEL {
            let Some(resting) = store.quote(cursor) else {
                break;
            };
            if better_on(side, price, &resting) {
                return cursor;
            }
            cursor = list.next_of(cursor);
        }
        SENTINEL
    }

    /// Resolves a client position hint into the pivot to insert before.
    ///
    /// The hint is an order id, [`FRONT_HINT`] for "front of list" or
    /// [`SENTINEL`] for "back of list". A hint is accepted only when the
    /// new quote sorts strictly ahead of the pivot and not ahead of the
    /// pivot's predecessor, which is exactly the position
    /// [`Self::find_insert_position`] would pick; any violation falls
    /// back to the full scan.
    pub fn verify_hint(
        &self,
        store: &OrderStore,
        side: Side,
        price: &RatioPrice,
        hint: OrderId,
    ) -> OrderId {
        let list = self.side(side);
        let pivot = match hint {
            SENTINEL => SENTINEL,
            FRONT_HINT => list.front(),
            id if list.contains(id) => id,
            _ => return self.find_insert_position(store, side, price),
        };

        if pivot != SENTINEL {
            let Some(resting) = store.quote(pivot) else {
                return self.find_insert_position(store, side, price);
            };
            if !better_on(side, price, &resting) {
                return self.find_insert_position(store, side, price);
            }
        }

        let prev = list.prev_of(pivot);
        if prev != SENTINEL {
            let Some(resting) = store.quote(prev) else {
                return self.find_insert_position(store, side, price);
            };
            if better_on(side, price, &resting) {
                return self.find_insert_position(store, side, price);
            }
        }

        pivot
    }
}
