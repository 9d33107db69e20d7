#![forbid(unsafe_code)]

//! Block and transaction validation pipeline.
//!
//! Validation runs in two phases. [`validator::check_block_sanity`] is
//! context-free: proof of work, timestamps, size limits, coinbase
//! uniqueness, duplicate resources, per-transaction shape and the merkle
//! root. [`validator::check_block_context`] then checks the block against
//! chain state: required difficulty, the timestamp median, transaction
//! finalization, the sponsor-record rule, arbiter-layer placement rules,
//! per-transaction policy and finally the coinbase reward equations.
//!
//! Both phases are pure functions over the block and injected read-only
//! views; a rejected block mutates nothing.

pub mod node;
pub mod reward;
pub mod rules;
pub mod validator;

pub use node::BlockNode;
pub use validator::{ChainContext, Validator};
