use thiserror::Error;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("System error: {0}")]
    SystemError(String),
}
