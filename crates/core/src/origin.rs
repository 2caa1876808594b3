// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Identity of the origin server a response body is read from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the upstream origin behind a producer.
///
/// Carried by timeout causes and log diagnostics so a stalled body can be
/// traced back to the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Application-level identifier, e.g. `"landing-app-01"`.
    pub id: String,
    /// Host and port the connection was opened to, e.g. `"origin.example.com:8080"`.
    pub host: String,
}

impl Origin {
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        Self { id: id.into(), host: host.into() }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.host)
    }
}
