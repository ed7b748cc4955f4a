pub mod actions;
pub mod backend;
pub mod cli;
pub mod config;
pub mod doctor;
pub mod error;
pub mod log;
pub mod pacman_conf;
pub mod privilege;
pub mod process;
pub mod query;
pub mod system;
pub mod terminal;
pub mod transaction;

pub use crate::error::{PkgError, Result};
pub use crate::process::{CommandOutput, CommandSession, Language, ProcessEvent};
pub use crate::query::Query;
pub use crate::transaction::{CommandExecuting, Transaction};
