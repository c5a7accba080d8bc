//! API Routes
//!
//! Route handlers organized by functionality.

pub mod health;
pub mod map;
pub mod panels;
pub mod preferences;
