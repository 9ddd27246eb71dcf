pub(crate) mod constants;
pub(crate) mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Gemini => write!(f, "Gemini"),
        }
    }
}

impl Provider {
    /// Get the default environment variable name for this provider's API key
    pub fn default_api_key_env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => constants::gemini::API_KEY_ENV_VAR,
        }
    }

    /// Get the default API base URL for this provider
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => constants::gemini::API_BASE,
        }
    }
}
