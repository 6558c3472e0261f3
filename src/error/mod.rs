#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation Error: {0} should be {1}")]
    Validation(String, String),

    #[error("Workspace Error: {0} exceeds the scratch capacity of {1}")]
    WorkspaceOverflow(String, String),
}
