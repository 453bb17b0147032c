use thiserror::Error;

pub type AqResult<T> = Result<T, AqError>;

#[derive(Error, Debug)]
pub enum AqError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Error raised while building or running a network model, with its code.
    #[error("Model error {code}: {message}")]
    Model { code: u16, message: String },
}
