use std::path::PathBuf;

pub type ConfigFileResult<T> = Result<T, ConfigFileError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigFileError {
    #[error("Unable to load config file {1}: {0}")]
    ConfigLoadError(#[source] std::io::Error, PathBuf),

    #[error("Unable to parse config file {1}: {0}")]
    ConfigParseError(#[source] subst::yaml::Error, PathBuf),

    #[error("Unable to serialize the configuration: {0}")]
    ConfigSerializeError(#[source] serde_yaml::Error),

    #[error("Unable to write config file {1}: {0}")]
    ConfigWriteError(#[source] std::io::Error, PathBuf),
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_messages_name_the_file() {
        let err = ConfigFileError::ConfigLoadError(
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
            PathBuf::from("cfg/tilepack.yaml"),
        );
        assert_eq!(
            err.to_string(),
            "Unable to load config file cfg/tilepack.yaml: no such file"
        );

        let err = ConfigFileError::ConfigWriteError(
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            PathBuf::from("out.yaml"),
        );
        assert_eq!(err.to_string(), "Unable to write config file out.yaml: denied");
    }
}
