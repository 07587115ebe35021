//! # ctxscope Prelude
//!
//! Commonly used types of the ctxscope library, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ctxscope operations
pub use crate::Error;

/// The result type used throughout ctxscope
pub use crate::Result;

// ================================================================================================
// Addresses
// ================================================================================================

/// Address spaces and their registry
pub use crate::address::{AddrSpace, AddrSpaceRc, SpaceManager};

/// Addresses and storage locations
pub use crate::address::{Address, VarnodeData};

// ================================================================================================
// Context
// ================================================================================================

/// Session database and its stores
pub use crate::context::{ContextDatabase, ContextStore, TrackedValueStore};

/// Context variable layout and values
pub use crate::context::{BitField, ContextBlob, ContextRange, Word};

/// Tracked register values
pub use crate::context::{TrackedSet, TrackedValue};

/// Decoder-side context access
pub use crate::context::ContextLookup;

// ================================================================================================
// Decode Cache
// ================================================================================================

/// Decode state pool and its configuration
pub use crate::cache::{CacheConfig, DecodeContextCache, SlotId};

/// Decode state records
pub use crate::cache::{DecodeState, ParsePhase, ParserState};

// ================================================================================================
// Persistence
// ================================================================================================

/// Element tree and wire format selection
pub use crate::encoding::{AttributeId, Element, ElementId, StreamFormat};
