use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub watch_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://voltaplus.azurewebsites.net".to_string(),
            request_timeout: Duration::from_secs(10),
            watch_interval: Duration::from_secs(60),
        }
    }
}
