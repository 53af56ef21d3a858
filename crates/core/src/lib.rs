//! ES4C Core: configuration, account model, synchronization jobs, validation, and the database layer.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod normalize;
pub mod tokens;
pub mod validation;
