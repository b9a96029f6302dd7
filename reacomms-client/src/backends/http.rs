use reacomms_core::{Error, PollRequest, Result};

/// Talks to the web interface of a running session.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    origin: String,
}

impl HttpBackend {
    pub fn new(host: &str, port: u16) -> HttpBackend {
        HttpBackend {
            client: reqwest::Client::new(),
            origin: format!("http://{}:{}", host, port),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn url(&self, request: &PollRequest) -> String {
        format!("{}{}", self.origin, request.path())
    }

    pub async fn fetch(&self, request: &PollRequest) -> Result<String> {
        let response = self
            .client
            .get(self.url(request))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|err| Error::Transport(err.to_string()))?;
        response
            .text()
            .await
            .map_err(|err| Error::Transport(err.to_string()))
    }
}
