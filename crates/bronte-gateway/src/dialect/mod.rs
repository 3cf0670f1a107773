//! Wire types for the three dialects the gateway translates between.
//!
//! Each dialect module defines the request/response envelopes and the typed
//! content blocks its protocol carries. Tagged enums end in an untagged
//! `Other(serde_json::Value)` variant so unrecognized block kinds survive a
//! round trip where the target dialect accepts them.

pub mod anthropic;
pub mod chat;
pub mod responses;
