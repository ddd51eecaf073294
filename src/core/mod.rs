//! Core building blocks: identifiers, routing, crypto, persistence and access

pub mod access;
pub mod actions;
pub mod codes;
pub mod config;
pub mod crypto;
pub mod id;
pub mod orm;
pub mod params;
pub mod query;
pub mod registry;
pub mod roles;
pub mod router;
pub mod session;
pub mod state;
pub mod validation;
