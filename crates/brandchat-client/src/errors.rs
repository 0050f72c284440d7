/// Text shown when a stream completes without producing any content.
pub const EMPTY_RESPONSE_FALLBACK: &str = "Lo siento, no pude generar una respuesta.";

const AUTHENTICATION_FALLBACK: &str =
    "Tu sesión ha expirado. Por favor, inicia sesión de nuevo para continuar.";
const NOT_FOUND_FALLBACK: &str =
    "No se encontró la conversación. Es posible que haya sido eliminada.";
const SERVER_FALLBACK: &str =
    "El servidor tuvo un problema al procesar tu mensaje. Inténtalo de nuevo más tarde.";
const CONNECTIVITY_FALLBACK: &str =
    "No se pudo conectar con el servidor. Verifica tu conexión a internet.";

/// Errors raised while preparing or reading an exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input.
    #[error("validation error: {0}")]
    Validation(String),
    /// No active session is available to authenticate the request.
    #[error("no active session")]
    Unauthenticated,
    /// Backend answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    /// Network or stream I/O failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// User-facing classification of a failed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Credentials missing, expired, or rejected. The user must sign in again.
    Authentication,
    /// The target conversation no longer exists.
    NotFound,
    /// Backend-side failure; retrying later may help.
    Server,
    /// Anything else, reported as a connectivity problem.
    Connectivity,
}

impl FailureCategory {
    /// Classifies a client error.
    pub fn of(err: &ClientError) -> Self {
        match err {
            ClientError::Unauthenticated => Self::Authentication,
            ClientError::Status { status, .. } => match *status {
                401 | 403 => Self::Authentication,
                404 => Self::NotFound,
                500..=599 => Self::Server,
                _ => Self::Connectivity,
            },
            ClientError::Config(_) | ClientError::Validation(_) | ClientError::Transport(_) => {
                Self::Connectivity
            }
        }
    }

    /// Fixed text substituted for the assistant message when this failure ends an
    /// exchange before any content arrived.
    pub fn fallback_text(self) -> &'static str {
        match self {
            Self::Authentication => AUTHENTICATION_FALLBACK,
            Self::NotFound => NOT_FOUND_FALLBACK,
            Self::Server => SERVER_FALLBACK,
            Self::Connectivity => CONNECTIVITY_FALLBACK,
        }
    }
}
