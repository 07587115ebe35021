// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # ctxscope
//!
//! Disassembly context management for specification-driven decoders.
//!
//! Processors with modes (ARM/Thumb, x86 operand sizes, banked MCUs) cannot be decoded from
//! instruction bytes alone: the decoder also needs the mode in effect at each address. `ctxscope`
//! tracks that state per address and keeps the per-instruction decode state a disassembler
//! revisits while following flow.
//!
//! ## Features
//!
//! - **Context variables** - Named bit fields packed into a word array, painted over address
//!   ranges with "run forward until an independent decision" semantics
//! - **Tracked registers** - Register values known to be constant over address ranges, with
//!   endian-aware extraction of sub-registers
//! - **Decode cache** - Fixed pool of per-address decode records with stable identities for
//!   recently requested addresses
//! - **Persistence** - Store and reload the whole session as XML or a compact binary stream
//!
//! ## Quick Start
//!
//! ```rust
//! use ctxscope::prelude::*;
//!
//! let mut spaces = SpaceManager::new();
//! let ram = spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
//! let at = |offset| Address::new(&ram, offset);
//!
//! let mut db = ContextDatabase::new();
//! db.context_mut().register_variable("mode", 0, 0)?;
//! db.context_mut().set_value("mode", &at(0x1000)?, 1)?;
//! db.context_mut().set_value("mode", &at(0x2000)?, 0)?;
//!
//! assert_eq!(db.context().get_value("mode", &at(0x0500)?)?, 0);
//! assert_eq!(db.context().get_value("mode", &at(0x1500)?)?, 1);
//! assert_eq!(db.context().get_value("mode", &at(0x2500)?)?, 0);
//!
//! // decode loop
//! let mut cache: DecodeContextCache<ParserState> = DecodeContextCache::new(&CacheConfig::default())?;
//! let mut lookup = db.lookup();
//! let (_, state) = cache.get_parser_context(&at(0x1004)?);
//! state.load_context(&mut lookup);
//! assert_eq!(state.context()[0], 0x8000_0000);
//! # Ok::<(), ctxscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`address`] - Address spaces, addresses and storage locations
//! - [`context`] - Context variables, tracked registers and the session database
//! - [`cache`] - The per-address decode state pool
//! - [`encoding`] - The element tree and its XML and packed wire forms
//! - [`prelude`] - Re-exports of the commonly used types
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger. Registration, reloads
//! and cache construction are logged at `debug`, individual paints and cache lookups at `trace`.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use ctxscope::prelude::*;
///
/// let mut store = ContextStore::new();
/// store.register_variable("thumb", 0, 0)?;
/// assert_eq!(store.context_size(), 1);
/// # Ok::<(), ctxscope::Error>(())
/// ```
pub mod prelude;

/// Address spaces, addresses and storage locations.
///
/// An [`address::Address`] is an ordered `(space, offset)` pair. Spaces are registered with an
/// [`address::SpaceManager`], which decoders use to resolve space names found in streams.
pub mod address;

/// Per-address decode state records and the pool recycling them.
pub mod cache;

/// Context variables and tracked register values over the address line.
///
/// # Key Types
///
/// - [`context::ContextStore`] - Context variables painted over address ranges
/// - [`context::TrackedValueStore`] - Known register values per address range
/// - [`context::ContextDatabase`] - Both stores of a session, with persistence
pub mod context;

/// Element tree and wire forms used to persist context state.
pub mod encoding;

/// `ctxscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `ctxscope` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use ctxscope::{context::ContextStore, Error};
///
/// let store = ContextStore::new();
/// match store.get_variable_default("mode") {
///     Ok(value) => println!("mode defaults to {}", value),
///     Err(Error::UnknownVariable(name)) => println!("'{}' is not registered", name),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;
