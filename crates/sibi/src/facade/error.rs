use sibi_gateway::{GatewayError, UnknownChannel};

/// Why a facade request failed.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// The line was not a request object.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No such method.
    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    /// The params did not fit the method.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    UnknownChannel(#[from] UnknownChannel),

    /// The gateway rejected or failed the call.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl FacadeError {
    /// Stable tag for the `kind` field of an error reply.
    pub fn kind(&self) -> &'static str {
        match self {
            FacadeError::InvalidRequest(_) => "invalid_request",
            FacadeError::UnknownMethod(_) => "unknown_method",
            FacadeError::InvalidParams(_) | FacadeError::UnknownChannel(_) => "invalid_params",
            FacadeError::Gateway(err) => err.kind(),
        }
    }
}

impl From<serde_json::Error> for FacadeError {
    fn from(err: serde_json::Error) -> Self {
        FacadeError::InvalidParams(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FacadeError>;
