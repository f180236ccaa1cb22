//! Test helpers shared by the ringq tests and benches.

pub mod verify;

pub use verify::{
    fingerprint, FifoVerifier, SequenceChecker, SequenceStats, SequenceStatus, VerifyResult,
    VerifyStats,
};
