use thiserror::Error;

pub type VfResult<T> = Result<T, VfError>;

#[derive(Error, Debug)]
pub enum VfError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Attribute error: {what}")]
    Attribute { what: String },

    #[error("Invariant violated: {what}")]
    Invariant { what: String },
}
