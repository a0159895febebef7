mod stripe;

pub use stripe::*;

use thiserror::Error;

/// Failure from an outbound call to the payment provider.
///
/// Always recovered locally into a user-facing message plus an order note;
/// never escalated into a process fault. Display strings carry no
/// credentials.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx API response; message is the provider's error body
    #[error("provider rejected the request: {0}")]
    Api(String),

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}
