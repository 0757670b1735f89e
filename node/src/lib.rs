// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! ledger-node: the async sealing service in front of the consensus store.

pub mod api;
pub mod config;
pub mod errors;
pub mod reader;
pub mod sealing;
pub mod server;
pub mod store;
pub mod telemetry;
