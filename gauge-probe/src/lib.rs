//! Capacity probing and response verification for forward proxies
//!
//! The pieces, leaves first:
//!
//! - [`verify`]: byte-exact comparison of a proxied response against a baseline
//! - [`BaselineOracle`]: one direct fetch per round, the ground truth
//! - [`ConcurrencyProber`]: one round of N simultaneous proxied fetches
//! - [`CapacityRamp`]: linear ramp over concurrency levels until a round fails
//! - [`LatencySampler`]: sequential direct vs proxied timing and throughput
//! - [`ConformanceSuite`]: text, binary and cache fidelity checks
//! - [`Harness`]: runs the above and assembles a [`BenchmarkReport`]
//!
//! Nothing here formats text for humans; presentation belongs to the caller.

pub mod baseline;
pub mod conformance;
pub mod error;
pub mod prober;
pub mod ramp;
pub mod report;
pub mod sampler;
pub mod throughput;
pub mod verify;

mod serde_secs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use baseline::{Baseline, BaselineOracle};
pub use conformance::{
    ConformanceCheck, ConformanceFailure, ConformanceResult, ConformanceSuite, ConformanceTimings,
};
pub use error::{HarnessError, ProbeError};
pub use prober::{ConcurrencyProber, RoundResult};
pub use ramp::{
    AbortReason, CapacityMeasurement, CapacityRamp, CapacityReport, RampPolicy, RampState,
    RoundSummary,
};
pub use report::{BenchmarkReport, ConformancePlan, Harness, HarnessPlan, HarnessSteps};
pub use sampler::{percent_overhead, LatencyMeasurement, LatencySampler, SampleStats};
pub use throughput::{Throughput, ThroughputUnit};
pub use verify::{first_divergence, verify, MismatchReason, VerificationOutcome};
