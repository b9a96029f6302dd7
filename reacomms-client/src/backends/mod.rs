use reacomms_core::{PollRequest, Result};

pub mod dummy;
pub mod http;

#[derive(Clone, Debug)]
pub enum Backend {
    Http(http::HttpBackend),
    Dummy(dummy::DummyBackend),
}

impl Backend {
    pub fn new(kind: BackendKind, host: &str, port: u16) -> Backend {
        match kind {
            BackendKind::Http => Backend::Http(http::HttpBackend::new(host, port)),
            BackendKind::Dummy => Backend::Dummy(dummy::DummyBackend::new()),
        }
    }

    pub async fn fetch(&self, request: &PollRequest) -> Result<String> {
        match self {
            Backend::Http(backend) => backend.fetch(request).await,
            Backend::Dummy(backend) => Ok(backend.fetch(request.commands())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Backend::Http(backend) => backend.origin().to_string(),
            Backend::Dummy(_) => "the dummy session".to_string(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Http,
    Dummy,
}

impl std::str::FromStr for BackendKind {
    type Err = Box<dyn std::error::Error>;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "http" => Ok(BackendKind::Http),
            "dummy" => Ok(BackendKind::Dummy),
            _ => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid backend",
            ))),
        }
    }
}
