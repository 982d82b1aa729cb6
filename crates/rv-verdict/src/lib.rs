// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # rv-verdict
//!
//! Differential verdicts over a chat-completion proxy.
//!
//! A comparison walks five steps and holds no state across comparisons:
//!
//! 1. **Dispatch**: resolve the rule(s) a test needs. Failure ⇒ `inconclusive`.
//! 2. **Execute**: one proxy call per path, issued concurrently. Any failed
//!    call ⇒ `fail` with the per-path errors and no score.
//! 3. **Normalize**: each body read in the dialect it was requested in.
//! 4. **Score**: content similarity per pair.
//! 5. **Judge**: see [`scoring`] for the rules per comparison type.
//!
//! [`SuiteRunner`] runs a [`SuitePlan`] with a per-test fault boundary and
//! folds the results into a [`SuiteResult`]; [`SuiteReport`] is the
//! serializable document written at the end of a run.

mod engine;
mod model;
mod report;
pub mod scoring;
mod suite;
mod threshold;

pub use engine::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DifferentialEngine};
pub use model::{
    ComparisonType, Difference, DifferenceKind, DifferentialResult, PathRecord, SuiteResult, Verdict,
};
pub use report::{SuiteReport, Totals};
pub use suite::{CancellationFlag, DEFAULT_CONCURRENCY, SUITE_NAMES, SuitePlan, SuiteRunner, TestCase};
pub use threshold::{ThresholdKey, ThresholdTable};
