use clap::Parser;

use vikt_lib::mass::Unit;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct ServiceConfig {
    /// Data out pin (23)
    pub dout: u8,

    /// Clock pin (24)
    pub pd_sck: u8,

    /// This should be set to the sensor value when the scale is under no
    /// pressure. Use `--calibrate` to find it.
    pub offset: i32,

    /// Raw sensor counts per one unit of weight. `--calibrate` reports the
    /// counts to divide by your reference mass.
    pub reference_unit: f64,

    /// Unit readings are reported in.
    #[serde(default)]
    pub unit: Unit,

    /// Number of raw samples reduced into one reported reading.
    pub samples: usize,

    /// Sets the read interval for the scale in seconds. Hence, how often a
    /// calibrated value will be written to the output sink.
    pub interval: u64,

    /// This is the output file which the scale will stream sensor data to,
    /// stdout will be used if this setting is unset.
    pub output_file: Option<String>,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Determines if the process should run calibrate or read -mode
    #[arg(short, long, default_value_t = false)]
    pub calibrate: bool,

    /// Target configuration file, tries to read `~/.config/vikt/settings.toml` by default
    #[arg(short, long)]
    pub settings_path: Option<String>,

    /// Toggles verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
