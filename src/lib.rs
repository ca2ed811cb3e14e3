//! Funds ledger: account balances, and the orchestration of deposits,
//! withdrawals and transfers over them.

pub mod actors;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod models;
pub mod storage;
pub mod types;
