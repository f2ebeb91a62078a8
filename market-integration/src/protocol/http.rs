//! `reqwest`-backed REST client with a fixed per-request deadline and a retry helper shared by
//! every exchange's historical-data and snapshot endpoints.

use crate::error::SocketError;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// Deadline applied to every request issued through [`RestClient::get`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Delay between the two extra attempts made by [`retry_twice_with_delay`].
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Thin wrapper over a shared [`reqwest::Client`], used for REST calls that complement a
/// provider's WebSocket stream (historical klines, REST snapshots, order-book refetch).
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
}

impl RestClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Issues a GET request to `url`, deserialising the JSON body as `T`. Fails with
    /// [`SocketError::Timeout`] if the response has not arrived within [`REQUEST_TIMEOUT`].
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, SocketError> {
        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.client.get(url).send())
            .await
            .map_err(|_elapsed| SocketError::Timeout)?
            .map_err(|error| SocketError::ParseError(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SocketError::HttpError(status));
        }

        response
            .json::<T>()
            .await
            .map_err(|error| SocketError::ParseError(error.to_string()))
    }

    /// Issues a GET request to `url`, returning the raw response body. Used by callers that
    /// parse an exchange-specific JSON shape themselves rather than via `serde`'s derive.
    pub async fn get_text(&self, url: &str) -> Result<String, SocketError> {
        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.client.get(url).send())
            .await
            .map_err(|_elapsed| SocketError::Timeout)?
            .map_err(|error| SocketError::ParseError(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SocketError::HttpError(status));
        }

        response
            .text()
            .await
            .map_err(|error| SocketError::ParseError(error.to_string()))
    }
}

impl Default for RestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `attempt` up to three times total (the original call plus two retries), sleeping
/// [`RETRY_DELAY`] between each failed attempt. Used for REST calls a provider makes during
/// reconnect recovery, where a transient network blip should not abort the resync.
pub async fn retry_twice_with_delay<F, Fut, T>(mut attempt: F) -> Result<T, SocketError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SocketError>>,
{
    let mut last_error = None;
    for _ in 0..3 {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(error) => last_error = Some(error),
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
    Err(last_error.unwrap_or(SocketError::Closed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, SocketError> = retry_twice_with_delay(|| async {
            let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if count < 2 {
                Err(SocketError::Closed)
            } else {
                Ok(count)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, SocketError> = retry_twice_with_delay(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(SocketError::Closed)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
