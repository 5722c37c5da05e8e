//! DCABot Core: indicators, signals, and the per-symbol position state machine.
//!
//! This crate holds everything that decides, and nothing that talks to the
//! network:
//! - Domain types (bars, price window, positions, actions, fills)
//! - RSI, MACD and Alligator over a rolling window
//! - Entry/exit signal evaluation
//! - The DCA / take-profit / trailing-stop state machine
//! - Typed configuration and the strategy context
//! - Collaborator traits for prices and orders, plus a paper gateway
//! - The JSON position book

pub mod config;
pub mod data;
pub mod domain;
pub mod execution;
pub mod indicators;
pub mod persistence;
pub mod position_management;
pub mod signals;
