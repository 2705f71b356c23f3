//! A loopback-only control server that lets AI agents read, search, and edit a
//! markdown notes vault without escaping it.
//!
//! Every request passes through the same chokepoints, in order:
//!
//! | Stage | Module | Failure |
//! |-------|--------|---------|
//! | Rate limit | [`server::rate_limit`] | `429` with `Retry-After` |
//! | Bearer token | [`server::gate`] | `401` |
//! | Path validation | [`security`] | `isError` result, nothing touched |
//! | User approval | [`guard`] | `isError` result, fail-closed on timeout |
//! | Audit | [`audit`] | never fails a request |
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`security`]: lexical path validation
//! - [`guard`]: approval registry for mutating tools
//! - [`consent`]: surfaces that ask the user to approve an operation
//! - [`audit`]: bounded in-memory audit trail
//! - [`store`], [`tasks`], [`search`]: collaborators behind narrow traits
//! - [`tools`]: the tool catalogue and dispatcher
//! - [`server`]: the HTTP server and its lifecycle

pub mod audit;
pub mod config;
pub mod consent;
pub mod error;
pub mod guard;
pub mod search;
pub mod security;
pub mod server;
pub mod store;
pub mod tasks;
pub mod tools;
