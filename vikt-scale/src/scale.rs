//! Calibration layer turning batches of noisy raw conversions into a
//! physical weight. The layer is generic over where the samples come from,
//! so it runs against the real device and against synthetic sources alike.

use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::gpio::Port;
use crate::hx711::{Hx711, Value};
use crate::mass::{Mass, Unit};

/// Capability to produce a batch of raw samples.
pub trait ValueSource {
    /// Produces exactly `n` raw samples.
    fn get_values(&self, n: usize) -> Result<Vec<Value>>;
}

impl<S: ValueSource + ?Sized> ValueSource for &S {
    fn get_values(&self, n: usize) -> Result<Vec<Value>> {
        (**self).get_values(n)
    }
}

impl<S: ValueSource + ?Sized> ValueSource for Arc<S> {
    fn get_values(&self, n: usize) -> Result<Vec<Value>> {
        (**self).get_values(n)
    }
}

impl<P: Port> ValueSource for Hx711<P> {
    fn get_values(&self, n: usize) -> Result<Vec<Value>> {
        (0..n).map(|_| self.get_value()).collect()
    }
}

/// How a batch of samples collapses into a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadType {
    /// Middle sample of the sorted batch; an even batch averages the two
    /// middle samples.
    Median,
    /// Arithmetic mean of the batch.
    Average,
}

/// A calibrated scale over any [`ValueSource`]. The calibration is the pair
/// (offset, reference unit): a reading normalizes as
/// `(value - offset) / reference_unit`. The scale references its source, it
/// never owns the device behind it.
pub struct Scale<S> {
    source: S,
    unit: Unit,
    reference_unit: f64,
    offset: Value,
}

impl<S: ValueSource> Scale<S> {
    /// A fresh scale with reference unit 1 and no tare offset.
    pub fn new(source: S, unit: Unit) -> Self {
        Self {
            source,
            unit,
            reference_unit: 1.0,
            offset: 0,
        }
    }

    /// Restores a previously established calibration.
    pub fn with_calibration(
        source: S,
        unit: Unit,
        reference_unit: f64,
        offset: Value,
    ) -> Result<Self> {
        if reference_unit == 0.0 {
            return Err(Error::InvalidArgument("reference unit cannot be 0"));
        }
        Ok(Self {
            source,
            unit,
            reference_unit,
            offset,
        })
    }

    fn normalize(&self, value: f64) -> f64 {
        (value - self.offset as f64) / self.reference_unit
    }

    /// Collapses `samples` fresh raw readings into one normalized value.
    pub fn read(&self, read_type: ReadType, samples: usize) -> Result<f64> {
        if samples == 0 {
            return Err(Error::Range("samples must be at least 1"));
        }
        let values = self.source.get_values(samples)?;
        let reduced = match read_type {
            ReadType::Median => median(&values),
            ReadType::Average => average(&values),
        };
        Ok(self.normalize(reduced))
    }

    /// Makes the current load the new zero point (tare). The reference unit
    /// is restored whether the underlying read succeeds or not.
    pub fn zero(&mut self, read_type: ReadType, samples: usize) -> Result<()> {
        let backup = self.reference_unit;
        self.reference_unit = 1.0;
        let raw = self.read(read_type, samples);
        self.reference_unit = backup;
        self.offset = raw?.round() as Value;
        debug!("tared, new offset {}", self.offset);
        Ok(())
    }

    /// A normalized reading tagged with the configured unit.
    pub fn weight(&self, read_type: ReadType, samples: usize) -> Result<Mass> {
        Ok(Mass::new(self.read(read_type, samples)?, self.unit))
    }

    pub fn set_reference_unit(&mut self, reference_unit: f64) -> Result<()> {
        if reference_unit == 0.0 {
            return Err(Error::InvalidArgument("reference unit cannot be 0"));
        }
        self.reference_unit = reference_unit;
        Ok(())
    }

    pub fn reference_unit(&self) -> f64 {
        self.reference_unit
    }

    pub fn set_offset(&mut self, offset: Value) {
        self.offset = offset;
    }

    pub fn offset(&self) -> Value {
        self.offset
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }
}

/// Median of the batch. An even batch averages the two middle samples.
fn median(values: &[Value]) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    }
}

fn average(values: &[Value]) -> f64 {
    debug_assert!(!values.is_empty());
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}
