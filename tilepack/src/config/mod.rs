//! Configuration of a generation run: command line arguments and the YAML config file.

mod args;
pub use args::Args;

mod error;
pub use error::{ConfigFileError, ConfigFileResult};

mod file;
pub use file::{Config, UnrecognizedValues, parse_config, read_config};
