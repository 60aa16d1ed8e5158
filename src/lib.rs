//! nftkit - typed nftables rulesets
//!
//! Decodes the JSON emitted by `nft -j list ruleset` into a typed model,
//! encodes it back byte-compatibly and renders it as native rule text.
//!
//! # Architecture
//!
//! - [`core`] - Ruleset model, JSON codec and the `nft` process boundary
//! - [`audit`] - Audit log of operations that change the running ruleset
//! - [`config`] - Configuration persistence
//! - [`utils`] - Utility functions (XDG directories, etc.)
//!
//! # Example
//!
//! ```
//! let json = br#"{"nftables": [
//!     {"table": {"family": "ip", "name": "FirstTable", "handle": 1}},
//!     {"chain": {"family": "ip", "table": "FirstTable", "name": "c1", "handle": 1}},
//!     {"rule": {"family": "ip", "table": "FirstTable", "chain": "c1", "handle": 2,
//!               "expr": [{"limit": {"rate": 20, "per": "second", "inv": true}}]}}
//! ]}"#;
//!
//! let ruleset = nftkit::decode(json)?;
//! assert_eq!(ruleset.rules[0].to_string(), "limit rate over 20/second");
//! assert_eq!(nftkit::decode(&nftkit::encode_json(&ruleset)?)?, ruleset);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use core::decode::decode;
pub use core::encode::{encode_json, encode_value};
pub use core::error::{DecodeError, EncodeError, Error, Result};
pub use core::ruleset::{Chain, MetaInfo, Rule, Ruleset, Set, Table};
