/// System instruction used when the caller does not supply one.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// Returned in place of an empty completion.
pub const EMPTY_RESPONSE_FALLBACK: &str = "I couldn't generate a response. Please try again.";

/// A user message together with the system instruction it is sent under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt<'a> {
    pub user_message: &'a str,
    pub system_message: &'a str,
}

impl<'a> Prompt<'a> {
    pub fn new(user_message: &'a str) -> Self {
        Self {
            user_message,
            system_message: DEFAULT_SYSTEM_MESSAGE,
        }
    }

    pub fn with_system(mut self, system_message: &'a str) -> Self {
        self.system_message = system_message;
        self
    }

    /// Render the single-turn prompt sent upstream.
    ///
    /// The system instruction is prepended rather than sent as a separate
    /// field, since not every model version accepts one.
    pub fn render(&self) -> String {
        format!("{}\n\nUser: {}", self.system_message, self.user_message)
    }
}
