// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DocChat Gatekeeper - request admission for the document/chat backend
//!
//! Every inbound request is checked, in order, for an operational bypass,
//! a valid credential (session token or API key), remaining quota, and a
//! sufficient role.
//!
//! ## Modules
//!
//! - `auth` - Bypass, credential verification, quotas and roles
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment configuration
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;
