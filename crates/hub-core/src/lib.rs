//! # Hub Core
//!
//! The message model shared by every hub subsystem:
//! - canonical protobuf wire types (`Message`, `MessageData`, typed bodies)
//! - the 20-byte digest identity and its total order
//! - epoch time conversions
//! - the admission validator
//! - the four-class error taxonomy
//!
//! Everything above this crate (stores, sync trie, node wiring) speaks in
//! these types; nothing here touches shared mutable state except through the
//! [`validation::SignerAuthority`] seam.

pub mod error;
pub mod factory;
pub mod message;
pub mod time;
pub mod types;
pub mod validation;

pub use error::{ErrorClass, HubError, Result};
pub use message::{Body, FarcasterNetwork, Message, MessageData, MessageType};
pub use types::{Fid, MessageHash};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{ErrorClass, HubError, Result};
    pub use crate::message::{
        Body, CastId, FarcasterNetwork, HashScheme, Message, MessageData, MessageType,
        ReactionType, SignatureScheme, UserDataType,
    };
    pub use crate::types::{Fid, MessageHash, constants};
    pub use crate::validation::{SignerAuthority, ValidationContext, validate_message};
}
