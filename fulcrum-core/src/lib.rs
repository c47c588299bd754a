pub mod book;
pub mod error;
pub mod events;
pub mod exchange;
pub mod ledger;
pub mod store;
pub mod types;

pub(crate) mod matching;
pub(crate) mod settlement;

pub mod prelude {
    pub use super::book::*;
    pub use super::error::*;
    pub use super::events::*;
    pub use super::exchange::*;
    pub use super::ledger::*;
    pub use super::store::*;
    pub use super::types::*;
}
