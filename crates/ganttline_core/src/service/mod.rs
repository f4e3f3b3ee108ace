//! Core use-case services.
//!
//! # Responsibility
//! - Resolve activity dependencies against the store before any write.
//! - Keep callers decoupled from storage details.

pub mod activity_service;
pub mod dependency_service;
