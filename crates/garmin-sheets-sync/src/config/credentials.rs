use crate::client::{OAuth1Token, OAuth2Token, SessionTokens};
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

const OAUTH1_FILENAME: &str = "oauth1_token.json";
const OAUTH2_FILENAME: &str = "oauth2_token.json";

/// File-backed token cache for one profile.
///
/// Holds the token pair of the last successful login so later runs can
/// resume without a session blob or credentials.
pub struct CredentialStore {
    profile: String,
    base_dir: PathBuf,
}

impl CredentialStore {
    /// Create a new credential store for the given profile
    pub fn new(profile: Option<String>) -> Result<Self> {
        Self::with_dir(
            profile.unwrap_or_else(|| "default".to_string()),
            super::data_dir()?,
        )
    }

    /// Create a credential store with a custom base directory (for testing)
    pub fn with_dir(profile: impl Into<String>, base_dir: PathBuf) -> Result<Self> {
        let profile = profile.into();
        let dir = base_dir.join(&profile);
        super::ensure_dir(&dir)?;

        Ok(Self {
            profile,
            base_dir: dir,
        })
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn dir(&self) -> &Path {
        &self.base_dir
    }

    /// Persist both tokens of a session
    pub fn save_session(&self, session: &SessionTokens) -> Result<()> {
        write_private(&self.base_dir.join(OAUTH1_FILENAME), &session.oauth1)?;
        write_private(&self.base_dir.join(OAUTH2_FILENAME), &session.oauth2)?;
        Ok(())
    }

    /// Load the cached session, `None` if either token is missing
    pub fn load_session(&self) -> Result<Option<SessionTokens>> {
        let oauth1: Option<OAuth1Token> = read_json(&self.base_dir.join(OAUTH1_FILENAME))?;
        let oauth2: Option<OAuth2Token> = read_json(&self.base_dir.join(OAUTH2_FILENAME))?;

        Ok(match (oauth1, oauth2) {
            (Some(oauth1), Some(oauth2)) => Some(SessionTokens { oauth1, oauth2 }),
            _ => None,
        })
    }

    pub fn has_session(&self) -> bool {
        self.base_dir.join(OAUTH1_FILENAME).exists() && self.base_dir.join(OAUTH2_FILENAME).exists()
    }

    /// Remove all cached tokens
    pub fn clear(&self) -> Result<()> {
        for name in [OAUTH1_FILENAME, OAUTH2_FILENAME] {
            let path = self.base_dir.join(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn write_private<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}
