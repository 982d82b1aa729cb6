// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Library half of the `rv` binary: command implementations and output
//! formatting.

pub mod commands;
pub mod format;
