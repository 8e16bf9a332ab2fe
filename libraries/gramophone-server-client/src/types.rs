//! Types for the media server client.

/// Configuration for connecting to a media server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the server (e.g., "https://media.example.com")
    pub url: String,
    /// Access token sent with every report
    pub access_token: Option<String>,
    /// User that played items are attributed to
    pub user_id: Option<String>,
    /// Device name shown in the server's session list
    pub device_name: String,
}

impl ServerConfig {
    /// Create a new server config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
            user_id: None,
            device_name: default_device_name(),
        }
    }

    /// Create a config for a signed-in user.
    pub fn with_credentials(
        url: impl Into<String>,
        access_token: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            access_token: Some(access_token.into()),
            user_id: Some(user_id.into()),
            device_name: default_device_name(),
        }
    }

    /// Override the device name.
    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }
}

fn default_device_name() -> String {
    "gramophoned".to_string()
}
