pub mod cancel;
pub mod error;
pub mod exec;
pub mod gate;
pub mod runner;
pub mod substitute;
pub mod terminal;

pub use cancel::{sleep_with_cancel, CancelToken};
pub use error::EngineError;
pub use exec::{ExecClient, ExecOutcome};
pub use runner::{
    ExecutionState, RunEnd, RunOutcome, RunnerConfig, RunnerEvent, StepRunner,
};
pub use substitute::substitute_variables;
pub use terminal::{EntryStatus, TerminalEntry, TerminalLog};
