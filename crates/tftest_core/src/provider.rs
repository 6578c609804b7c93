//! Renderer for the per-job provider file.
//!
//! The rendered file pins state to a local backend inside the job directory and points every target service at
//! the job's mock endpoint, with the validation a real account would need switched off.

use std::fmt::Write;

use crate::artifacts::{STATE_FILE, endpoint_url};
use crate::services;

const PROVIDER_FLAGS: &[&str] = &[
    "s3_force_path_style         = true",
    "skip_credentials_validation = true",
    "skip_metadata_api_check     = true",
    "skip_requesting_account_id  = true",
];

/// Render the provider file for a mock service listening on `port`.
///
/// ## Parameters
/// - `services`: endpoint keys to override; empty means [`services::DEFAULT_SERVICES`].
/// - `port`: the job's mock-service port.
///
/// ## Returns
/// - (`String`): the file contents, newline terminated.
pub fn render_provider(services: &[String], port: u16) -> String {
    let endpoint = endpoint_url(port);
    let mut out = String::new();

    out.push_str("terraform {\n");
    out.push_str("  backend \"local\" {\n");
    let _ = writeln!(out, "    path = \"{STATE_FILE}\"");
    out.push_str("  }\n");
    out.push_str("}\n\n");

    out.push_str("provider \"aws\" {\n");
    for flag in PROVIDER_FLAGS {
        let _ = writeln!(out, "  {flag}");
    }
    out.push_str("  endpoints {\n");
    for service in services::resolve(services) {
        let _ = writeln!(out, "    {service} = \"{endpoint}\"");
    }
    out.push_str("  }\n");
    out.push_str("}\n");
    out
}
