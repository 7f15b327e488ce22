// SPDX-License-Identifier: PMPL-1.0-or-later
//! HTTP ingestion surface for relayed gateway events

pub mod events;

pub use events::{event_router, AppState};
