use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request never produced a response.
    Network { url: String, reason: String },
    /// The server answered with a non-success status.
    Status { url: String, status: u16 },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network { url, reason } => write!(f, "fetch {url} failed: {reason}"),
            FetchError::Status { url, status } => write!(f, "fetch {url} returned HTTP {status}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Byte source for models and the decoder module.
///
/// Hosts are single-threaded, so the returned futures need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait AssetFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<T: AssetFetcher> AssetFetcher for std::rc::Rc<T> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(url).await
    }
}
