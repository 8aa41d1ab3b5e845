// crates/tally-core/src/lib.rs
//
// tally-core: fixed-point amounts, hash-chained ledger events, and the traits
// shared by the Tally treasury engine.
//
// This is the leaf crate of the workspace. All monetary values are `Amount`s
// (six fractional digits, checked arithmetic, no floating point).

pub mod amount;
pub mod crypto;
pub mod error;
pub mod event;
pub mod identity;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
pub use amount::{Amount, DecimalText, DECIMALS, MICROS_PER_UNIT};
pub use error::{ArithmeticError, EventError, ParseAmountError, ParseAmountErrorKind};
pub use event::{
    AllocationInputs, ContentInputs, ContentOutcome, EventBuilder, EventHash, EventPayload,
    InteractionInputs, LedgerEvent, PolicyVersion, RawFields, CONTENT_CREATED, GENESIS_HASH,
    INTERACTION_CREATED, REWARD_ALLOCATED,
};
pub use identity::ActorId;
pub use traits::EventGate;
