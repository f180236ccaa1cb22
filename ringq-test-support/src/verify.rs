//! Ordering and integrity checks for queue tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Checks that values leave a queue in exactly the order they went in.
///
/// The producer registers each value with `expect` before adding it; the
/// consumer calls `verify` on everything it dequeues.
pub struct FifoVerifier {
    /// Registered but not yet verified, oldest first
    pending: Mutex<VecDeque<u64>>,
    verified: AtomicU64,
    mismatches: AtomicU64,
    unexpected: AtomicU64,
}

impl Default for FifoVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FifoVerifier {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            verified: AtomicU64::new(0),
            mismatches: AtomicU64::new(0),
            unexpected: AtomicU64::new(0),
        }
    }

    /// Register the next value going in
    pub fn expect(&self, value: u64) {
        self.pending.lock().unwrap().push_back(value);
    }

    /// Register a byte payload by its fingerprint
    pub fn expect_bytes(&self, data: &[u8]) {
        self.expect(fingerprint(data));
    }

    /// Check the next value coming out
    pub fn verify(&self, actual: u64) -> VerifyResult {
        let expected = self.pending.lock().unwrap().pop_front();
        match expected {
            Some(expected) if expected == actual => {
                self.verified.fetch_add(1, Ordering::Relaxed);
                VerifyResult::Ok
            }
            Some(expected) => {
                self.mismatches.fetch_add(1, Ordering::Relaxed);
                VerifyResult::Mismatch { expected, actual }
            }
            None => {
                self.unexpected.fetch_add(1, Ordering::Relaxed);
                VerifyResult::Unexpected { actual }
            }
        }
    }

    pub fn verify_bytes(&self, data: &[u8]) -> VerifyResult {
        self.verify(fingerprint(data))
    }

    pub fn stats(&self) -> VerifyStats {
        VerifyStats {
            verified: self.verified.load(Ordering::Relaxed),
            pending: self.pending.lock().unwrap().len() as u64,
            mismatches: self.mismatches.load(Ordering::Relaxed),
            unexpected: self.unexpected.load(Ordering::Relaxed),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.mismatches.load(Ordering::Relaxed) > 0 || self.unexpected.load(Ordering::Relaxed) > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Ok,
    Mismatch { expected: u64, actual: u64 },
    /// Dequeued with nothing registered
    Unexpected { actual: u64 },
}

#[derive(Debug, Clone)]
pub struct VerifyStats {
    pub verified: u64,
    pub pending: u64,
    pub mismatches: u64,
    pub unexpected: u64,
}

impl VerifyStats {
    /// Everything registered came out, in order.
    pub fn is_complete(&self) -> bool {
        self.pending == 0 && self.mismatches == 0 && self.unexpected == 0
    }
}

/// FNV-1a over `data`
pub fn fingerprint(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Checks that sequence numbers arrive contiguously, counting gaps and late
/// arrivals.
#[derive(Default)]
pub struct SequenceChecker {
    next_expected: AtomicU64,
    seen: AtomicU64,
    gap_count: AtomicU64,
    missing: AtomicU64,
    out_of_order: AtomicU64,
}

impl SequenceChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, seq: u64) -> SequenceStatus {
        self.seen.fetch_add(1, Ordering::Relaxed);

        let expected = self.next_expected.load(Ordering::Relaxed);
        if seq < expected {
            // Late arrival or duplicate
            self.out_of_order.fetch_add(1, Ordering::Relaxed);
            return SequenceStatus::OutOfOrder;
        }

        self.next_expected.store(seq + 1, Ordering::Relaxed);
        if seq == expected {
            return SequenceStatus::InOrder;
        }
        self.gap_count.fetch_add(1, Ordering::Relaxed);
        self.missing.fetch_add(seq - expected, Ordering::Relaxed);
        SequenceStatus::Gap {
            start: expected,
            end: seq - 1,
        }
    }

    /// Next sequence the checker is waiting for
    pub fn next_expected(&self) -> u64 {
        self.next_expected.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> SequenceStats {
        SequenceStats {
            seen: self.seen.load(Ordering::Relaxed),
            gap_count: self.gap_count.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceStatus {
    InOrder,
    OutOfOrder,
    Gap { start: u64, end: u64 },
}

#[derive(Debug, Clone)]
pub struct SequenceStats {
    pub seen: u64,
    pub gap_count: u64,
    pub missing: u64,
    pub out_of_order: u64,
}

impl SequenceStats {
    pub fn is_perfect(&self) -> bool {
        self.gap_count == 0 && self.out_of_order == 0
    }
}
