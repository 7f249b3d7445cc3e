// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for testpub: publishing the results of finished tests.
//!
//! A test runner hands each finished test to a [`SessionCollector`](collector::SessionCollector),
//! which normalizes it into a [`TestResult`](record::TestResult) and sends it to up to two sinks:
//!
//! * an HTTP endpoint, on a best-effort basis ([`publish`]).
//! * a result directory tree shared by all worker processes, where each test gets its own
//!   numbered history of results ([`pubdir`]).

pub mod collector;
pub mod config;
pub mod errors;
pub mod identity;
pub mod pubdir;
pub mod publish;
pub mod record;
