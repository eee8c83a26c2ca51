//! Synchronous client for the lettermail direct-mail REST service.
//!
//! # Overview
//! Three entities model the service's resources: [`Config`] (print/format
//! configuration), [`Batch`] (a group of mailings sharing one config and
//! template) and [`Mailing`] (one addressed piece of mail). All three are
//! lazily created: constructed locally, freely editable, and materialized on
//! the server only when first required — by the `id` accessor or an explicit
//! `create`/`mail` call. Once created, write-once fields reject further
//! edits.
//!
//! # Design
//! - No ambient client singleton: every remote operation takes an explicit
//!   [`Transport`]. [`authenticate`] builds the real [`HttpClient`];
//!   [`NullTransport`] is the sentinel that fails every call.
//! - All argument and lifecycle validation happens locally, before any
//!   request is issued.
//! - One blocking request per operation; no retries, no caching.
//!
//! # Example
//! ```no_run
//! use lettermail_core::{authenticate, mail};
//!
//! fn main() -> Result<(), lettermail_core::Error> {
//!     let client = authenticate("user", "pass")?;
//!     mail(
//!         &client,
//!         "1 Return Rd",
//!         "2 Delivery Dr",
//!         "<html><body><p>Hello world!</p></body></html>",
//!     )?;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod mailing;
pub mod transport;
pub mod types;

pub use batch::Batch;
pub use config::Config;
pub use error::Error;
pub use mailing::{Format, Mailing, MailingData};
pub use transport::{HttpClient, NullTransport, Transport};
pub use types::{BatchStatus, MailingStatus, Output, Size, Style, Turnaround};

/// Build an authenticated client and verify connectivity with a ping.
///
/// The returned client is passed explicitly to every entity operation.
pub fn authenticate(username: &str, password: &str) -> Result<HttpClient, Error> {
    let client = HttpClient::new(username, password)?;
    client.ping()?;
    Ok(client)
}

/// Send one piece of HTML or PDF mail in its own brand-new batch and default
/// config.
///
/// `body` is anything convertible to [`MailingData`]: a string for HTML,
/// bytes for PDF, a `serde_json::Map` for mail merge. For an existing batch
/// or config, build a [`Mailing`] directly.
pub fn mail(
    transport: &dyn Transport,
    return_address: &str,
    address: &str,
    body: impl Into<MailingData>,
) -> Result<Mailing, Error> {
    if return_address.is_empty() {
        return Err(Error::InvalidValue(
            "return_address must be a non-empty string".to_string(),
        ));
    }
    if address.is_empty() {
        return Err(Error::InvalidValue(
            "address must be a non-empty string".to_string(),
        ));
    }

    let mut mailing = Mailing::new();
    mailing.set_address(Some(address.to_string()))?;
    mailing.set_return_address(Some(return_address.to_string()))?;
    mailing.set_data(body)?;
    mailing.mail(transport)?;
    Ok(mailing)
}
