#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("select a project before running")]
    NoProjectSelected,
    #[error("select a methodology before running")]
    NoMethodologySelected,
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error("methodology validation failed: {0}")]
    InvalidMethodology(String),
}
