//! Kiteform Core
//!
//! Core library for a declarative CI pipeline management tool that treats side
//! effects as values

pub mod differ;
pub mod effect;
pub mod plan;
pub mod provider;
pub mod resource;
