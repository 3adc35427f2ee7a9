//! idcard-hub - employee identity card management backend
//!
//! This crate provides the REST API behind the HR dashboard: departments,
//! employees, users and role permissions, ID card templates, card issuance
//! with QR verification, and an audit trail of every change.

pub mod auth;
pub mod bootstrap;
pub mod card;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod permission;
pub mod routes;
pub mod state;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
