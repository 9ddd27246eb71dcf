pub mod gemini {
    pub const DEFAULT_MODEL: &str = "gemini-pro";
    pub const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";
    pub const API_KEY_HEADER: &str = "x-goog-api-key";
    pub const GENERATE_CONTENT_METHOD: &str = "generateContent";
    pub const MODEL_NAME_PREFIX: &str = "models/";
    pub const LIST_MODELS_PAGE_SIZE: &str = "1000";
    pub const LIST_MODELS_MAX_PAGES: usize = 50;
}
