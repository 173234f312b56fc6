//! Client for the business.ru REST API.
//!
//! Requests are signed with the account's shared secret and the current
//! session token, responses are checked against the same scheme, and the
//! token is rotated on every exchange.
//!
//! ```no_run
//! use businessru::{BusinessruClient, Params};
//!
//! let client = BusinessruClient::new("myshop", "123456", "secret")?;
//! let goods = client.get("goods", &Params::new().with("limit", 10))?;
//! println!("{}", goods["result"]);
//! # Ok::<(), businessru::Error>(())
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod http;
pub mod params;
pub mod signing;

pub use client::{BusinessruClient, ClientBuilder, Payload, REPAIR_RESOURCE};
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use http::{Method, RetryPolicy, Sleeper};
pub use params::{ParamValue, Params, Scalar};
