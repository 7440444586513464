//! # Hub Storage
//!
//! The delta-graph CRDT family and its supporting state:
//! - a generic two-phase set with per-store conflict keys, winner ladders,
//!   capacity bounds, TTL pruning, and a journal that makes evictions
//!   permanent
//! - the five concrete sets (signer, user data, cast, reaction,
//!   verification)
//! - the fid ownership registry fed by on-chain events
//! - the revocation cascade that ties them together
//!
//! Persistence flows through the atomic-batch [`db::HubDb`] interface; one
//! cause, one batch.

pub mod cascade;
pub mod cast_store;
pub mod db;
pub mod id_registry;
pub mod reaction_store;
pub mod signer_store;
pub mod store;
pub mod stores;
pub mod two_phase;
pub mod user_data_store;
pub mod verification_store;

pub use cast_store::CastStore;
pub use db::{Batch, HubDb, MemoryDb};
pub use id_registry::{CustodyChange, IdRegistry, IdRegistryEvent, IdRegistryEventType};
pub use reaction_store::ReactionStore;
pub use signer_store::SignerStore;
pub use store::Store;
pub use stores::{StoreLimits, Stores};
pub use two_phase::{MergeOutcome, SetKind, StorePolicy, TwoPhaseSet, Winner};
pub use user_data_store::UserDataStore;
pub use verification_store::VerificationStore;
