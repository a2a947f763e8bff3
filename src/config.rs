use std::path::PathBuf;

use argh::FromArgs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(FromArgs, Serialize, Deserialize, Debug)]
/// Translate the binary HIPPO GPS protocol from a serial port (or file)
/// into NMEA 0183 sentences on standard output.
pub struct BridgeCfg {
    /// serial device, or a file path with --from-file ("-" reads stdin)
    #[argh(positional)]
    pub source: Option<String>,
    /// baud rate of the receiver
    #[argh(option, default = "38400")]
    pub baud_rate: u32,
    /// serial read timeout in milliseconds
    #[argh(option, default = "100")]
    pub timeout: u64,
    /// treat the source as a file instead of a serial port
    #[argh(switch)]
    pub from_file: bool,
    /// persist these settings as the defaults for bare invocations
    #[argh(switch)]
    #[serde(skip)]
    pub store_config: bool,
}

impl BridgeCfg {
    /// Parses the command line, falling back to the stored configuration
    /// when no arguments are given.
    pub fn acquire() -> Self {
        if std::env::args().len() <= 1 {
            if let Ok(cfg) = Self::load_default() {
                return cfg;
            }
        }
        argh::from_env()
    }

    /// Store the configuration in the default location
    pub fn store_default(&self) -> Result<(), std::io::Error> {
        let mut path = get_default_path();
        std::fs::create_dir_all(&path)?;
        path.push("config.json");
        std::fs::write(
            path,
            serde_json::to_string(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
        )
    }

    /// Load the configuration from the default location
    pub fn load_default() -> Result<Self, std::io::Error> {
        let mut path = get_default_path();
        path.push("config.json");
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

fn get_default_path() -> PathBuf {
    if let Some(path) = ProjectDirs::from("", "", "hippo_nmea") {
        path.config_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}
