//! restless - ReSTful JSON APIs generated from data model definitions
//!
//! Clients describe searches as JSON (`filters`, `order_by`, `limit`,
//! `offset`); the filter compiler checks them against the registered model
//! descriptors and the processor runs them against a storage backend,
//! returning shaped JSON.

pub mod api;
pub mod cli;
pub mod config;
pub mod model;
pub mod processor;
pub mod query;
pub mod shape;
pub mod storage;
