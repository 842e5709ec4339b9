//! Relays calibrated readings to an output sink. Each reading is written as
//! one JSON document per line to the given writer [`Write`], which typically
//! will be a file or stdout.

use std::error::Error;
use std::io::Write;

use chrono::{DateTime, Utc};

use crate::mass::Mass;

/// One reading as it appears on the sink.
#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Sample {
    /// Time of sample creation.
    pub datetime: DateTime<Utc>,

    /// Calibrated weight at the given sample time.
    pub weight: Mass,
}

/// Serializes one reading onto `writer`.
pub fn write_sample(weight: Mass, writer: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let sample = Sample {
        datetime: Utc::now(),
        weight,
    };

    let data = format!("{}\n", serde_json::to_string(&sample)?);

    writer.write_all(data.as_bytes())?;

    Ok(())
}
