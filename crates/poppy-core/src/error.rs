use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoppyError {
    #[error("{method} {url}: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
    },

    #[error("unable to discover robot: {0}")]
    Discovery(String),

    #[error("motor not found: {0}")]
    MotorNotFound(String),

    #[error("register '{register}' of motor '{motor}' is unavailable")]
    MissingRegister { motor: String, register: String },

    #[error("register '{register}' holds a non-numeric value: {value}")]
    InvalidRegisterValue { register: String, value: String },

    #[error("{values} values provided for {motors} motors")]
    LengthMismatch { motors: usize, values: usize },

    #[error("invalid led color '{0}': expected off, red, green, blue, yellow, cyan, pink or white")]
    InvalidLed(String),

    #[error("invalid motor selection: {0}")]
    InvalidSelector(String),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PoppyError {
    pub(crate) fn transport(
        method: impl Into<String>,
        url: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Self::Transport {
            method: method.into(),
            url: url.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PoppyError>;
