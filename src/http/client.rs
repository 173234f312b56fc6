//! Single-attempt signed-URL transport over reqwest's blocking client.

use log::debug;
use reqwest::blocking::Client;
use serde_json::{Map, Value};

use super::{Method, classify_status};
use crate::error::{Error, Result};

/// Sends already-signed URLs and decodes the JSON envelope.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Wraps the given reqwest blocking client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with the crate's user agent.
    pub fn with_defaults() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("businessru/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(client))
    }

    /// Returns a reference to the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Performs one request and returns the response object.
    ///
    /// Non-200 statuses are mapped by [`classify_status`]. A 200 body that is
    /// JSON but not an object cannot carry a signature and is rejected.
    #[tracing::instrument(skip(self))]
    pub fn fetch_envelope(&self, method: Method, url: &str) -> Result<Map<String, Value>> {
        let response = self.client.request(method.into(), url).send()?;
        let status = response.status();
        debug!("{} {} -> {}", method, url, status);
        classify_status(method, url, status)?;

        let body = response.bytes()?;
        match serde_json::from_slice::<Value>(&body)? {
            Value::Object(envelope) => Ok(envelope),
            _ => Err(Error::ResponseNotValidated {
                method: method.to_string(),
                url: url.to_string(),
            }),
        }
    }
}
