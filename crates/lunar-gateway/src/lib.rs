// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP/WebSocket ingress gateway composing the agent, tool router, memory
//! indexer and channel connectors behind a single listening port.

pub mod gateway;
pub mod http;

pub use gateway::{build, run};
pub use http::AppState;
