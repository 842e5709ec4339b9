use std::{env, io, path::PathBuf};

use config::Config;
use log::debug;

use vikt_lib::gpio::RppalPort;
use vikt_lib::hx711::Hx711;

use crate::cli_config::{Args, ServiceConfig};

/// Reads settings from given config path or default to
/// `~/.config/vikt/settings.toml`. Then claims the two GPIO lines and brings
/// the device up: power cycle, default configuration commit, watcher start.
pub fn bootstrap(
    args: &Args,
) -> Result<(ServiceConfig, Hx711<RppalPort>), Box<dyn std::error::Error>> {
    let settings_file = PathBuf::from(match args.settings_path.clone() {
        Some(file_path) => file_path,
        None => format!(
            "{}/.config/vikt/settings.toml",
            env::var("HOME").expect("Failed to read home dir env (HOME)")
        ),
    })
    .canonicalize()?;

    let settings = settings_file.to_str().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Could not find settings file")
    })?;

    debug!("Trying to read settings from {}", settings);

    let settings = Config::builder()
        .add_source(config::File::with_name(settings))
        .build()?
        .try_deserialize::<ServiceConfig>()?;

    let port = RppalPort::open()?;
    let device = Hx711::new(port, settings.dout, settings.pd_sck)?;

    Ok((settings, device))
}
