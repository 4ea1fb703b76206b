//! Core domain types and logic.

pub mod bar_table;
pub mod condition;
pub mod condition_eval;
pub mod condition_parser;
pub mod strategy;
pub mod trade;
pub mod risk_profile;
pub mod exits;
pub mod engine;
pub mod aggregator;
pub mod registry;
pub mod batch;
pub mod config_validation;
pub mod error;
