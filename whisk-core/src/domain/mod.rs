//! Core domain types
//!
//! These types describe what gets deployed on the serverless platform and what
//! comes back from it. They are shared between the HTTP client (which moves them
//! over the wire) and the runner (which makes lifecycle decisions on them).

pub mod action;
pub mod activation;
pub mod datastore;
