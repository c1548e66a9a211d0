// Copyright 2026 Deploycat Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Shared data types for the deploycat service: the App request and view
//! shapes exposed over HTTP, and the certificate rule configuration.

pub mod app;
pub mod certs;

pub use app::{App, AppCondition, AppPhase, AppRequest};
pub use certs::{CertEntry, CertRef, CertificateConfig};
