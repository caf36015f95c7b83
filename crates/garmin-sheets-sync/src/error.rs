use thiserror::Error;

/// Main error type for garmin-sheets-sync
#[derive(Error, Debug)]
pub enum GarminError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authentication required. Set GARMIN_SESSION_BASE64 or GARMIN_EMAIL/GARMIN_PASSWORD.")]
    NotAuthenticated,

    #[error("MFA required")]
    MfaRequired,

    #[error("Rate limited. Please wait before retrying.")]
    RateLimited,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid date format: {0}. Expected YYYY-MM-DD")]
    InvalidDateFormat(String),
}

pub type Result<T> = std::result::Result<T, GarminError>;

impl GarminError {
    /// Create an authentication error from a message
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid response error from a message
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a session error from a message
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create a store error from a message
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether the failure came from the network or the remote service
    /// and may succeed if the same request is sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Render an error for the terminal, adding a hint where one helps.
pub fn format_user_error(err: &GarminError) -> String {
    match err {
        GarminError::Authentication(_) | GarminError::NotAuthenticated => format!(
            "{}\nHint: refresh GARMIN_SESSION_BASE64 with 'garmin-sheets auth export-session' or check your credentials.",
            err
        ),
        GarminError::MfaRequired => format!(
            "{}\nHint: run 'garmin-sheets auth login' to enter the MFA code, then 'garmin-sheets auth export-session' for GARMIN_SESSION_BASE64.",
            err
        ),
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GarminError::Authentication("Invalid credentials".to_string());
        assert_eq!(err.to_string(), "Authentication error: Invalid credentials");
    }

    #[test]
    fn test_not_authenticated_error() {
        let err = GarminError::NotAuthenticated;
        assert!(err.to_string().contains("GARMIN_SESSION_BASE64"));
    }

    #[test]
    fn test_invalid_date_format_error() {
        let err = GarminError::InvalidDateFormat("not-a-date".to_string());
        assert!(err.to_string().contains("not-a-date"));
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(GarminError::auth("x"), GarminError::Authentication(_)));
        assert!(matches!(GarminError::config("x"), GarminError::Config(_)));
        assert!(matches!(GarminError::invalid_response("x"), GarminError::InvalidResponse(_)));
        assert!(matches!(GarminError::session("x"), GarminError::Session(_)));
        assert!(matches!(GarminError::store("x"), GarminError::Store(_)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(GarminError::RateLimited.is_transient());
        assert!(GarminError::Api { status: 503, message: String::new() }.is_transient());
        assert!(!GarminError::Api { status: 404, message: String::new() }.is_transient());
        assert!(!GarminError::auth("expired").is_transient());
    }

    #[test]
    fn test_user_error_adds_hint_for_auth() {
        let msg = format_user_error(&GarminError::auth("both methods failed"));
        assert!(msg.contains("export-session"));
        assert_eq!(format_user_error(&GarminError::store("boom")), "Store error: boom");
    }

    #[test]
    fn test_mfa_hint_points_at_interactive_login() {
        let msg = format_user_error(&GarminError::MfaRequired);
        assert!(msg.contains("auth login"));
        assert!(msg.contains("export-session"));
    }
}
