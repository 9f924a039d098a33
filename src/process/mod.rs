//! External renderer process supervision.

mod supervisor;

pub use supervisor::{Outcome, ProcessId, Supervisor};
