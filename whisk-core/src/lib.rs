//! Whisk Core
//!
//! Core types shared by the Whisk remote-execution adapter.
//!
//! This crate contains:
//! - Domain types: actions, activations, code packages and datastores
//! - DTOs: request/response bodies exchanged with the serverless platform

pub mod domain;
pub mod dto;
