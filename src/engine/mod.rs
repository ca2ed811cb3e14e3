//! Funds Movement Orchestrator
//!
//! Executes deposits, withdrawals and transfers as short sagas over the
//! ledger, records their outcome, and feeds batches of commands through them.

mod batch;
mod config;
mod errors;
mod orchestrator;
mod saga;

pub use batch::{BatchEngine, BatchReport, CommandRecord, CommandType};
pub use config::OrchestratorConfig;
pub use errors::OrchestratorError;
pub use orchestrator::{FundsOrchestrator, TransactionLookup};
