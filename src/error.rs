use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindleError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Build failed with {0} error(s)")]
  BuildFailed(usize),

  #[error("Internal error: {0} (this is a bug in bindle, please report it with a reproduction)")]
  Internal(String),
}

pub type Result<T> = std::result::Result<T, BindleError>;
