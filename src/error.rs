use thiserror::Error;

/// Structured error hierarchy for `vigilia`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum VigiliaError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    #[error("memory: {0}")]
    Memory(#[from] MemoryError),

    // Generic fallthrough (wraps anyhow for interop)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} authentication failed")]
    Auth { provider: String },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Tool-call arguments that are neither a JSON object nor JSON text of
    /// one. Kept distinct from I/O failures so callers never mistake a
    /// garbled model reply for a broken store.
    #[error("malformed tool-call arguments: {0}")]
    MalformedArguments(String),

    #[error("store: {0}")]
    Store(String),
}

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, VigiliaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_correctly() {
        let err = VigiliaError::Config(ConfigError::Load("bad toml".into()));
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn llm_auth_displays_provider() {
        let err = VigiliaError::Llm(LlmError::Auth {
            provider: "openai".into(),
        });
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn malformed_arguments_displays_detail() {
        let err = VigiliaError::Memory(MemoryError::MalformedArguments(
            "arguments are a number".into(),
        ));
        assert!(err.to_string().contains("malformed tool-call arguments"));
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let err: VigiliaError = anyhow_err.into();
        assert!(err.to_string().contains("something went wrong"));
    }
}
