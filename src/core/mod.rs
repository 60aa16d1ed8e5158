//! Ruleset model and nftables JSON codec
//!
//! - [`catalog`], [`fields`]: closed wire vocabularies
//! - [`expression`], [`statement`]: rule building blocks
//! - [`ruleset`]: tables, chains, sets, rules and the [`ruleset::Ruleset`] root
//! - [`registry`]: name resolution during one decode
//! - [`decode`], [`encode`]: wire JSON in and out, native text out
//! - [`nft_json`]: the `nft` process boundary and snapshot files
//! - [`verify`]: `nft --check` verification
//! - [`error`]: error types

pub mod catalog;
pub mod decode;
pub mod encode;
pub mod error;
pub mod expression;
pub mod fields;
pub mod nft_json;
pub mod registry;
pub mod ruleset;
pub mod statement;
pub mod verify;

#[cfg(test)]
pub mod test_helpers;
