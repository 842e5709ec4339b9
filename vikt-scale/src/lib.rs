//! These are the internal components that are used in the `vikt-scale`
//! binary to read digital output from the HX711 module and turn it into a
//! calibrated weight. See the binary crate for setup & settings.
pub mod error;
pub mod gpio;
pub mod hx711;
pub mod mass;
pub mod output_writer;
pub mod scale;
