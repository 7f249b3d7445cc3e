// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish finished-test events to an HTTP endpoint and a result directory tree.
//!
//! The core functionality lives in [`testpub_runner`]; this crate is the command-line front end.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod events;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
