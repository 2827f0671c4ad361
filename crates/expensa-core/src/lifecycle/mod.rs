//! Expense lifecycle: the state machine and advisory policy checks.

mod machine;
pub mod policy;

pub use machine::{apply_transition, authorize_delete, ExpenseEvent, StateMachine};
