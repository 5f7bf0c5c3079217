//! Data Transfer Objects for the platform REST API
//!
//! Bodies sent to and received from the action/activation endpoints. Field
//! names follow the platform's JSON contract.

pub mod action;
pub mod activation;
pub mod invocation;
