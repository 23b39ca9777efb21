//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Access token validation (JWT, mock)
//! - `crypto` - Credential encryption
//! - `http` - Axum routes and middleware
//! - `memory` - In-process repositories
//! - `postgres` - sqlx repositories
//! - `stripe` - Billing provider client

pub mod auth;
pub mod crypto;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
