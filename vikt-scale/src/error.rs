//! The failure classes that can surface while talking to the HX711 or while
//! reducing its samples to a weight.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A bounded wait expired before the device produced data. Raised by the
    /// consumer wait in `get_value` and by a transaction that never saw the
    /// device become ready.
    #[error("timed out after {0:?} waiting on the HX711")]
    Timeout(Duration),

    /// A caller-supplied value violates a documented constraint and is never
    /// retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A requested quantity falls outside its admissible range.
    #[error("out of range: {0}")]
    Range(&'static str),

    /// The GPIO chip or one of its lines could not be accessed. Fatal during
    /// initialization.
    #[error("hardware access failure: {0}")]
    Hardware(#[from] rppal::gpio::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
