//! Byte-exact response verification

use crate::baseline::Baseline;
use gauge_http::{FetchError, FetchResult};
use serde::Serialize;
use std::fmt;

/// Why a candidate response was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchReason {
    /// The fetch itself failed; there are no bytes to compare
    Fetch { error: FetchError },

    /// First differing byte. When one body is a prefix of the other the offset
    /// is the length of the shorter one.
    ByteMismatch {
        offset: usize,
        expected_len: usize,
        actual_len: usize,
    },
}

impl MismatchReason {
    pub fn offset(&self) -> Option<usize> {
        match self {
            MismatchReason::ByteMismatch { offset, .. } => Some(*offset),
            MismatchReason::Fetch { .. } => None,
        }
    }

    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            MismatchReason::Fetch { error } => Some(error),
            MismatchReason::ByteMismatch { .. } => None,
        }
    }
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::Fetch { error } => write!(f, "{}", error),
            MismatchReason::ByteMismatch {
                offset,
                expected_len,
                actual_len,
            } => write!(
                f,
                "byte mismatch at offset {} (expected {} bytes, got {})",
                offset, expected_len, actual_len
            ),
        }
    }
}

/// Verdict for one fetch within a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    /// Launch ordinal within the round
    pub index: usize,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<MismatchReason>,
}

impl VerificationOutcome {
    pub fn pass(index: usize) -> Self {
        Self {
            index,
            passed: true,
            reason: None,
        }
    }

    pub fn fail(index: usize, reason: MismatchReason) -> Self {
        Self {
            index,
            passed: false,
            reason: Some(reason),
        }
    }
}

/// Offset of the first differing byte, `None` when the slices are identical
pub fn first_divergence(expected: &[u8], actual: &[u8]) -> Option<usize> {
    let shared = expected.len().min(actual.len());
    expected[..shared]
        .iter()
        .zip(&actual[..shared])
        .position(|(a, b)| a != b)
        .or_else(|| (expected.len() != actual.len()).then_some(shared))
}

/// Compare a candidate against the round's baseline.
///
/// Passes only when the fetch succeeded and its body is byte-identical to the
/// baseline. Pure; safe to call from many tasks at once.
pub fn verify(index: usize, candidate: &FetchResult, baseline: &Baseline) -> VerificationOutcome {
    if let Some(ref error) = candidate.error {
        return VerificationOutcome::fail(
            index,
            MismatchReason::Fetch {
                error: error.clone(),
            },
        );
    }

    let expected = baseline.bytes();
    match first_divergence(expected, &candidate.bytes) {
        None => VerificationOutcome::pass(index),
        Some(offset) => VerificationOutcome::fail(
            index,
            MismatchReason::ByteMismatch {
                offset,
                expected_len: expected.len(),
                actual_len: candidate.bytes.len(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use gauge_http::Route;
    use std::time::Duration;

    fn candidate(body: &'static [u8]) -> FetchResult {
        FetchResult::success(Route::Proxied, 200, Bytes::from_static(body), Duration::ZERO)
    }

    #[test]
    fn test_identical_body_passes() {
        let baseline = Baseline::from_bytes("hello");
        let outcome = verify(0, &candidate(b"hello"), &baseline);
        assert!(outcome.passed);
        assert_eq!(outcome.reason, None);
    }

    #[test]
    fn test_baseline_verifies_against_itself() {
        for body in [&b""[..], b"x", b"hello", &[0u8, 255, 13, 10, 0][..]] {
            let baseline = Baseline::from_bytes(Bytes::copy_from_slice(body));
            assert!(verify(3, &baseline.as_fetch_result(), &baseline).passed);
        }
    }

    #[test]
    fn test_reports_first_differing_offset() {
        let baseline = Baseline::from_bytes("hello");
        let outcome = verify(7, &candidate(b"hell0"), &baseline);
        assert!(!outcome.passed);
        assert_eq!(outcome.index, 7);
        assert_eq!(outcome.reason.as_ref().and_then(|r| r.offset()), Some(4));
        assert_eq!(
            outcome.reason.unwrap().to_string(),
            "byte mismatch at offset 4 (expected 5 bytes, got 5)"
        );
    }

    #[test]
    fn test_offset_matches_every_divergence_point() {
        let expected: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        for k in [0usize, 1, 255, 256, 2048, 4095] {
            let mut actual = expected.clone();
            actual[k] ^= 0x01;
            assert_eq!(first_divergence(&expected, &actual), Some(k));
        }
    }

    #[test]
    fn test_length_mismatch_points_at_end_of_shorter_body() {
        assert_eq!(first_divergence(b"hello", b"hell"), Some(4));
        assert_eq!(first_divergence(b"hell", b"hello"), Some(4));
        assert_eq!(first_divergence(b"", b"a"), Some(0));

        let baseline = Baseline::from_bytes("hello world");
        let outcome = verify(0, &candidate(b"hello"), &baseline);
        assert_eq!(
            outcome.reason,
            Some(MismatchReason::ByteMismatch {
                offset: 5,
                expected_len: 11,
                actual_len: 5,
            })
        );
    }

    #[test]
    fn test_fetch_error_is_a_failure() {
        let baseline = Baseline::from_bytes("hello");
        let failed = FetchResult::failure(
            Route::Proxied,
            FetchError::timeout(Duration::from_secs(30)),
            Duration::from_secs(30),
        );

        let outcome = verify(2, &failed, &baseline);
        assert!(!outcome.passed);
        let reason = outcome.reason.unwrap();
        assert!(matches!(reason.fetch_error(), Some(FetchError::Timeout { .. })));
        assert_eq!(reason.offset(), None);
    }

    #[test]
    fn test_empty_body_against_empty_baseline_passes() {
        let baseline = Baseline::from_bytes(Bytes::new());
        assert!(verify(0, &candidate(b""), &baseline).passed);
    }
}
