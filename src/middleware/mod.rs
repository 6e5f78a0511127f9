//! Middleware module
//!
//! Token authentication and request logging

pub mod auth;
pub mod logging;
