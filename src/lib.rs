// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # relay-verify
//!
//! Differential verification of a chat-completion relay proxy across API
//! dialects. This crate re-exports the workspace crates under short names
//! and lifts the handful of types most callers need to the top level.
//!
//! ```no_run
//! use relay_verify::{DifferentialEngine, SuitePlan, SuiteReport, SuiteRunner};
//! use relay_verify::client::{ClientConfig, ProxyClient};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(relay_verify::config::load_config(None)?);
//! let client = ProxyClient::new(ClientConfig::from_settings(&config.settings))?;
//! let engine = Arc::new(DifferentialEngine::new(Arc::new(client), config));
//! let suites = SuiteRunner::new(engine).run_all(&SuitePlan::defaults(None)).await;
//! let report = SuiteReport::new("http://localhost:12580", suites);
//! println!("{:.1}% passed", report.success_rate);
//! # Ok(())
//! # }
//! ```

pub use rv_client as client;
pub use rv_config as config;
pub use rv_dialect as dialect;
pub use rv_error as error;
pub use rv_normalize as normalize;
pub use rv_similarity as similarity;
pub use rv_validate as validate;
pub use rv_verdict as verdict;

pub use rv_dialect::ApiStyle;
pub use rv_error::{ErrorCode, RvError};
pub use rv_verdict::{
    CancellationFlag, DifferentialEngine, DifferentialResult, SuitePlan, SuiteReport, SuiteResult,
    SuiteRunner, ThresholdTable, Verdict,
};
