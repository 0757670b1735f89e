// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ledger data model.

pub mod digest;
pub mod encoding;
pub mod event;
