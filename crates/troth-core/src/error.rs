//! Error types for `troth-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A status column or wire field held a token outside its vocabulary.
  #[error("unknown status token: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
