//! Data models for expenses, card transactions, and configuration.

pub mod card;
pub mod config;
pub mod expense;
