// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod classifier;
pub mod executor;
pub mod router;
pub mod streaming;

pub use executor::{Executor, QueryOutcome, QueryRequest};
pub use router::Router;
pub use streaming::StreamingChannel;
