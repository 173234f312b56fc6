//! The signed business.ru client.
//!
//! Every call signs its query with the current session token, checks the
//! signature of the answer and adopts the fresh token it carries. Rate
//! limiting and rejected tokens are absorbed by [`RetryPolicy::run`]; every
//! other failure reaches the caller.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::http::{
    DEFAULT_MAX_RETRY, HttpClient, Method, RATE_LIMIT_DELAY, RetryPolicy, Sleeper, ThreadSleeper,
};
use crate::params::Params;
use crate::signing::{SecretMaterial, Validation, build_signed_url, validate_response};

/// Business fields of a validated response, in the order the server sent them.
pub type Payload = Map<String, Value>;

/// Resource that issues a session token against the shared secret alone.
pub const REPAIR_RESOURCE: &str = "repair";

/// Authenticated client for one business.ru account.
///
/// The session token sits behind a mutex held for a whole signed exchange,
/// so a shared client serializes its exchanges.
pub struct BusinessruClient {
    credentials: Credentials,
    base_url: String,
    token: Mutex<String>,
    http: HttpClient,
    retry: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl BusinessruClient {
    /// Connects with the default retry settings and obtains a session token.
    pub fn new(
        account: impl Into<String>,
        app_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self> {
        Self::builder(account, app_id, secret).build()
    }

    pub fn builder(
        account: impl Into<String>,
        app_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> ClientBuilder {
        ClientBuilder::new(Credentials::new(account, app_id, secret))
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Base URL resources are resolved against, always ending in `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Snapshot of the current session token.
    pub fn token(&self) -> String {
        self.lock_token().clone()
    }

    /// `{base_url}{resource}.json`
    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}{}.json", self.base_url, resource)
    }

    /// Performs a signed call with the verb given by name.
    ///
    /// Only GET, POST and PUT are accepted (case-insensitively); anything
    /// else fails with [`Error::UnknownHttpMethod`] before any I/O.
    #[tracing::instrument(skip(self, params))]
    pub fn request(&self, method: &str, resource: &str, params: &Params) -> Result<Payload> {
        let method: Method = method.parse()?;
        self.dispatch(method, resource, params)
    }

    #[tracing::instrument(skip(self, params))]
    pub fn get(&self, resource: &str, params: &Params) -> Result<Payload> {
        self.dispatch(Method::Get, resource, params)
    }

    #[tracing::instrument(skip(self, params))]
    pub fn post(&self, resource: &str, params: &Params) -> Result<Payload> {
        self.dispatch(Method::Post, resource, params)
    }

    #[tracing::instrument(skip(self, params))]
    pub fn put(&self, resource: &str, params: &Params) -> Result<Payload> {
        self.dispatch(Method::Put, resource, params)
    }

    /// Replaces the session token through the `repair` resource.
    ///
    /// Signed with the shared secret only. Not retried here.
    #[tracing::instrument(skip(self))]
    pub fn repair_token(&self) -> Result<()> {
        let url = self.resource_url(REPAIR_RESOURCE);
        let material = SecretMaterial::Tokenless {
            secret: self.credentials.secret(),
        };
        let signed_url = build_signed_url(&url, &Params::new(), self.credentials.app_id(), material);

        let mut token = self.lock_token();
        debug!("Repairing session token via {}...", signed_url);
        let envelope = self.http.fetch_envelope(Method::Get, &signed_url)?;
        let validation = validate_response(envelope, material)?;
        adopt(validation, &mut token, Method::Get, &signed_url)?;
        Ok(())
    }

    fn dispatch(&self, method: Method, resource: &str, params: &Params) -> Result<Payload> {
        let url = self.resource_url(resource);
        let operation_name = format!("{} {}", method, resource);

        self.retry.run(
            self.sleeper.as_ref(),
            &operation_name,
            || self.exchange(method, &url, params),
            || self.repair_token(),
        )
    }

    /// One signed round trip. The token stays locked from signing until
    /// the fresh token is stored.
    fn exchange(&self, method: Method, url: &str, params: &Params) -> Result<Payload> {
        let mut token = self.lock_token();
        let signed_url = build_signed_url(
            url,
            params,
            self.credentials.app_id(),
            SecretMaterial::WithToken {
                token: token.as_str(),
                secret: self.credentials.secret(),
            },
        );

        info!("try {} {}", method, signed_url);
        let envelope = self.http.fetch_envelope(method, &signed_url)?;
        let validation = validate_response(
            envelope,
            SecretMaterial::WithToken {
                token: token.as_str(),
                secret: self.credentials.secret(),
            },
        )?;
        let payload = adopt(validation, &mut token, method, &signed_url)?;
        drop(token);

        if payload.get("status").and_then(Value::as_str) == Some("error") {
            return Err(Error::Api {
                error_code: field_text(&payload, "error_code"),
                error_text: field_text(&payload, "error_text"),
            });
        }
        Ok(payload)
    }

    fn lock_token(&self) -> MutexGuard<'_, String> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for BusinessruClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusinessruClient")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Stores the fresh token of a valid response and hands back its payload.
fn adopt(validation: Validation, token: &mut String, method: Method, url: &str) -> Result<Payload> {
    match validation {
        Validation::Valid {
            token: fresh,
            payload,
        } => {
            *token = fresh;
            Ok(payload)
        }
        rejected => {
            warn!("{} {} response rejected: {:?}", method, url, rejected);
            Err(Error::ResponseNotValidated {
                method: method.to_string(),
                url: url.to_string(),
            })
        }
    }
}

fn field_text(payload: &Payload, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Configures a [`BusinessruClient`]. [`ClientBuilder::build`] performs the
/// bootstrap token repair.
pub struct ClientBuilder {
    credentials: Credentials,
    max_retry: usize,
    retry_delay: Duration,
    base_url: Option<String>,
    sleeper: Option<Box<dyn Sleeper>>,
    http_client: Option<reqwest::blocking::Client>,
}

impl ClientBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            max_retry: DEFAULT_MAX_RETRY,
            retry_delay: RATE_LIMIT_DELAY,
            base_url: None,
            sleeper: None,
            http_client: None,
        }
    }

    /// Attempts per call, counting transient failures. Defaults to 10.
    pub fn max_retry(mut self, max_retry: usize) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Pause after a rate-limited response. Defaults to 20 seconds.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Overrides `https://{account}.business.ru/api/rest/`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Some(Box::new(sleeper));
        self
    }

    pub fn http_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Creates the client and obtains its first session token.
    ///
    /// A failed bootstrap is reported as [`Error::Initialization`].
    pub fn build(self) -> Result<BusinessruClient> {
        let http = match self.http_client {
            Some(client) => HttpClient::new(client),
            None => HttpClient::with_defaults()?,
        };

        let mut base_url = self
            .base_url
            .unwrap_or_else(|| self.credentials.default_base_url());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = BusinessruClient {
            credentials: self.credentials,
            base_url,
            token: Mutex::new(String::new()),
            http,
            retry: RetryPolicy::new(self.max_retry, self.retry_delay),
            sleeper: self.sleeper.unwrap_or_else(|| Box::new(ThreadSleeper)),
        };

        client
            .repair_token()
            .map_err(|e| Error::Initialization {
                source: Box::new(e),
            })?;
        info!(
            "Connected to {} as app {}",
            client.base_url,
            client.credentials.app_id()
        );
        Ok(client)
    }
}
