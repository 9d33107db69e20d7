//! Error types used across the workspace.
//!
//! Every rejection carries a symbolic kind and a human-readable reason. An
//! invalid block is rejected atomically: no listener observes it and no state
//! is mutated.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// A consensus-rule violation detected while validating a block or
/// transaction.
#[derive(Debug, Error)]
pub enum RuleError {
    /// Context-free block shape violation: size, coinbase uniqueness,
    /// duplicate resources, merkle mismatch, PoW self-consistency.
    #[error("block sanity: {0}")]
    BlockSanity(String),

    /// Contextual block violation against chain state: timestamp median,
    /// finalization, sponsor rule.
    #[error("block context: {0}")]
    BlockContext(String),

    /// The header's compact target does not match the required difficulty.
    #[error("difficulty: {0}")]
    Difficulty(String),

    /// Wrong payload variant, invalid key encoding, signature failure or
    /// version gating.
    #[error("tx payload: {0}")]
    TxPayload(String),

    /// A fee or reward equation does not balance.
    #[error("tx balance: {0}")]
    TxBalance(String),

    /// Duplicate input or reuse of a spent vote output.
    #[error("tx double spend: {0}")]
    TxDoubleSpend(String),

    /// Violation of an arbiter-layer rule: illegal evidence, next-turn,
    /// appropriation.
    #[error("consensus rule: {0}")]
    ConsensusRule(String),

    /// A wire encoding could not be produced or parsed.
    #[error("serialization: {0}")]
    Serialization(String),
}

impl ErrorCode for RuleError {
    fn code(&self) -> &'static str {
        match self {
            Self::BlockSanity(_) => "BLOCK_SANITY",
            Self::BlockContext(_) => "BLOCK_CONTEXT",
            Self::Difficulty(_) => "BLOCK_DIFFICULTY",
            Self::TxPayload(_) => "TX_PAYLOAD",
            Self::TxBalance(_) => "TX_BALANCE",
            Self::TxDoubleSpend(_) => "TX_DOUBLE_SPEND",
            Self::ConsensusRule(_) => "CONSENSUS_RULE",
            Self::Serialization(_) => "SERIALIZATION",
        }
    }
}

impl From<std::io::Error> for RuleError {
    fn from(e: std::io::Error) -> Self {
        RuleError::Serialization(e.to_string())
    }
}

/// Errors surfaced by the checkpoint manager and its file workers.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Snapshot file I/O failed.
    #[error("checkpoint io: {0}")]
    Io(#[from] std::io::Error),

    /// No checkpoint is registered under the requested key.
    #[error("unknown checkpoint key: {0}")]
    UnknownKey(String),

    /// A snapshot file exists but does not decode.
    #[error("checkpoint decode: {0}")]
    Decode(String),

    /// The background file worker is gone.
    #[error("checkpoint file channel closed")]
    ChannelClosed,

    /// Height-file retention could not be enforced.
    #[error("checkpoint retention: {0}")]
    Retention(String),

    /// A listener failed while rewinding its history.
    #[error("rollback: {0}")]
    Rollback(String),
}

impl ErrorCode for CheckpointError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CHECKPOINT_IO",
            Self::UnknownKey(_) => "CHECKPOINT_UNKNOWN_KEY",
            Self::Decode(_) => "CHECKPOINT_DECODE",
            Self::ChannelClosed => "CHECKPOINT_CHANNEL_CLOSED",
            Self::Retention(_) => "CHECKPOINT_RETENTION",
            Self::Rollback(_) => "CHECKPOINT_ROLLBACK",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(RuleError::BlockSanity("x".into()).code(), "BLOCK_SANITY");
        assert_eq!(
            CheckpointError::UnknownKey("cp".into()).code(),
            "CHECKPOINT_UNKNOWN_KEY"
        );
    }

    #[test]
    fn display_includes_reason() {
        let err = RuleError::TxBalance("reward amount in coinbase not correct".into());
        assert!(err.to_string().contains("reward amount"));
    }
}
