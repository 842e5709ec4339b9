//! The vikt-scale is used to read values from load cells (in conjunction
//! with the HX711 module). This binary has only been tested on the
//! raspberry pi zero (w).
//!
//! ## Calibrate
//! This command tares the empty scale, then samples a known reference
//! weight and outputs the values to put into the settings file.
//!
//! ```bash
//! vikt-scale --calibrate
//! ```
//!
//! ## Run
//! Start a long lived process, readings are pushed to stdout or file (based
//! on given settings).
//!
//! ```bash
//! vikt-scale # Reads settings from `~/.config/vikt/settings.toml` by default.
//!
//! vikt-scale --help
//! ```
//!
//! ## Example config
//! ```toml
//! # ~/.config/vikt/settings.toml
//! dout = 23
//! pd_sck = 24
//! offset = 521703
//! reference_unit = 402.5
//! unit = "Grams"
//! samples = 7
//! interval = 3
//! ```

use clap::Parser;
use log::{error, info};
use simple_logger::SimpleLogger;
use std::error::Error;
use std::fs::File;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

mod cli_config;
mod init;

use crate::cli_config::Args;
use crate::init::bootstrap;
use vikt_lib::output_writer::write_sample;
use vikt_lib::scale::{ReadType, Scale, ValueSource};

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    SimpleLogger::new()
        .with_level(match args.verbose {
            true => log::LevelFilter::Debug,
            false => log::LevelFilter::Warn,
        })
        .init()
        .unwrap();

    let (settings, device) = bootstrap(&args)?;
    info!("Starting vikt-scale, gpio claimed & HX711 watcher running");

    let mut scale = Scale::with_calibration(
        &device,
        settings.unit,
        settings.reference_unit,
        settings.offset,
    )?;

    if args.calibrate {
        calibrate(&mut scale, settings.samples)?;
        return Ok(());
    }

    let mut sink: Box<dyn Write> = match &settings.output_file {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };

    loop {
        match scale.weight(ReadType::Median, settings.samples) {
            Ok(weight) => {
                if let Err(e) = write_sample(weight, &mut sink) {
                    error!("Failed to write scale reading {}", e);
                }
            }
            Err(e) => error!("Failed to update scale reading {}", e),
        }

        thread::sleep(Duration::from_secs(settings.interval));
    }
}

/// Guided calibration: tares the empty scale, then measures a known
/// reference weight so the settings file can be filled in.
fn calibrate<S: ValueSource>(scale: &mut Scale<S>, samples: usize) -> Result<(), Box<dyn Error>> {
    info!("Calibrating, remove any weight from the scale");
    thread::sleep(Duration::from_secs(10));
    scale.zero(ReadType::Median, samples)?;

    info!("Place a known reference weight on the scale");
    thread::sleep(Duration::from_secs(10));
    scale.set_reference_unit(1.0)?;
    let counts = scale.read(ReadType::Median, samples)?;

    info!(
        "\roffset={}\ncounts={counts} (reference_unit = counts / reference weight)",
        scale.offset()
    );

    Ok(())
}
