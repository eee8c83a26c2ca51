//! Mailing entity: one addressed piece of mail within a batch.

use base64::prelude::*;
use chrono::NaiveDateTime;
use md5::{Digest, Md5};
use serde::Deserialize;
use serde_json::Value;

use crate::batch::Batch;
use crate::error::Error;
use crate::transport::{check_id, fetch_all_pages, id_field, iso8601, single_record, Transport};
use crate::types::MailingStatus;

const PDF_SIGNATURE: &[u8] = b"%PDF";

/// Content of a mailing. The variant decides the wire format: merge
/// key/values go as "json", bytes with a PDF signature as "pdf", any other
/// text or bytes as "html", and `None` sends no payload at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MailingData {
    #[default]
    None,
    Html(String),
    Bytes(Vec<u8>),
    Merge(serde_json::Map<String, Value>),
}

/// Wire format computed from [`MailingData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Pdf,
    Html,
    None,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Pdf => "pdf",
            Format::Html => "html",
            Format::None => "none",
        }
    }
}

impl MailingData {
    /// Wire format of this data.
    pub fn format(&self) -> Format {
        match self {
            MailingData::Merge(_) => Format::Json,
            MailingData::Bytes(bytes) if bytes.starts_with(PDF_SIGNATURE) => Format::Pdf,
            MailingData::Bytes(_) | MailingData::Html(_) => Format::Html,
            MailingData::None => Format::None,
        }
    }

    /// Raw payload bytes to send, or `None` when there is no data.
    fn payload(&self) -> Result<Option<Vec<u8>>, Error> {
        match self {
            MailingData::Merge(map) => {
                let json = serde_json::to_string(map).map_err(|e| Error::Decode(e.to_string()))?;
                Ok(Some(json.into_bytes()))
            }
            MailingData::Html(text) => Ok(Some(text.clone().into_bytes())),
            MailingData::Bytes(bytes) => Ok(Some(bytes.clone())),
            MailingData::None => Ok(None),
        }
    }
}

impl From<&str> for MailingData {
    fn from(text: &str) -> Self {
        MailingData::Html(text.to_string())
    }
}

impl From<String> for MailingData {
    fn from(text: String) -> Self {
        MailingData::Html(text)
    }
}

impl From<Vec<u8>> for MailingData {
    fn from(bytes: Vec<u8>) -> Self {
        MailingData::Bytes(bytes)
    }
}

impl From<&[u8]> for MailingData {
    fn from(bytes: &[u8]) -> Self {
        MailingData::Bytes(bytes.to_vec())
    }
}

impl From<serde_json::Map<String, Value>> for MailingData {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        MailingData::Merge(map)
    }
}

/// Dynamic seam for callers holding a `serde_json::Value`: objects become
/// merge data, strings become HTML, null becomes no data. Numbers, booleans
/// and arrays have no wire format and are rejected up front.
impl TryFrom<Value> for MailingData {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(MailingData::None),
            Value::String(text) => Ok(MailingData::Html(text)),
            Value::Object(map) => Ok(MailingData::Merge(map)),
            other => Err(Error::InvalidType(format!(
                "no mailing format for data: {other}"
            ))),
        }
    }
}

/// The batch a mailing belongs to: the id of one that already exists on the
/// server, or a locally-owned [`Batch`] materialized when the mailing is
/// sent.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BatchRef {
    Id(i32),
    Owned(Box<Batch>),
}

/// A single piece of mail.
///
/// Creation is the [`mail`](Mailing::mail) call: until then the mailing is
/// local-only and freely editable. Afterwards `address`, `return_address`
/// and `data` are read-only, and `status` tracks the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailing {
    batch: BatchRef,
    address: Option<String>,
    return_address: Option<String>,
    data: MailingData,
    status: Option<MailingStatus>,
    id: Option<i32>,
}

/// Wire shape of a mailing record. The service spells the return address
/// `returnaddress` and ships `data` base64-encoded with an md5 digest.
#[derive(Debug, Deserialize)]
struct MailingRecord {
    mailing_id: i32,
    batch_id: i32,
    #[serde(default)]
    address: Option<String>,
    #[serde(default, rename = "returnaddress")]
    return_address: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    md5: Option<String>,
    #[serde(default)]
    status: Option<MailingStatus>,
}

impl Default for Mailing {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailing {
    /// A mailing with a brand-new owned [`Batch`] (which in turn owns a
    /// brand-new default config), both created when the mailing is sent.
    pub fn new() -> Self {
        Self::with_batch(Batch::new())
    }

    /// A mailing inside `batch`. An uncreated batch is materialized when the
    /// mailing is sent.
    pub fn with_batch(batch: Batch) -> Self {
        Mailing {
            batch: BatchRef::Owned(Box::new(batch)),
            address: None,
            return_address: None,
            data: MailingData::None,
            status: None,
            id: None,
        }
    }

    /// A mailing inside a batch that already exists on the server.
    pub fn with_batch_id(batch_id: i32) -> Self {
        Mailing {
            batch: BatchRef::Id(batch_id),
            address: None,
            return_address: None,
            data: MailingData::None,
            status: None,
            id: None,
        }
    }

    /// Whether the mailing has already been sent to the server.
    pub fn is_created(&self) -> bool {
        self.id.is_some()
    }

    /// Id of the batch this mailing belongs to, `None` while an owned batch
    /// is still local-only.
    pub fn batch_id(&self) -> Option<i32> {
        match &self.batch {
            BatchRef::Id(id) => Some(*id),
            BatchRef::Owned(batch) => batch.created_id(),
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn set_address(&mut self, value: Option<String>) -> Result<(), Error> {
        self.ensure_uncreated("address")?;
        self.address = value;
        Ok(())
    }

    pub fn return_address(&self) -> Option<&str> {
        self.return_address.as_deref()
    }

    pub fn set_return_address(&mut self, value: Option<String>) -> Result<(), Error> {
        self.ensure_uncreated("return_address")?;
        self.return_address = value;
        Ok(())
    }

    pub fn data(&self) -> &MailingData {
        &self.data
    }

    pub fn set_data(&mut self, value: impl Into<MailingData>) -> Result<(), Error> {
        self.ensure_uncreated("data")?;
        self.data = value.into();
        Ok(())
    }

    /// Set data from a dynamic JSON value; numbers, booleans and arrays are
    /// rejected with a type error before anything is stored.
    pub fn set_data_value(&mut self, value: Value) -> Result<(), Error> {
        self.ensure_uncreated("data")?;
        self.data = MailingData::try_from(value)?;
        Ok(())
    }

    /// Wire format of the current data.
    pub fn format(&self) -> Format {
        self.data.format()
    }

    /// Delivery status: `None` until mailed, `Received` right after, then
    /// whatever [`sync`](Mailing::sync) last fetched.
    pub fn status(&self) -> Option<MailingStatus> {
        self.status
    }

    /// The server id, mailing first when required.
    pub fn id(&mut self, transport: &dyn Transport) -> Result<i32, Error> {
        if !self.is_created() {
            self.mail(transport)?;
        }
        // Set by mail above.
        Ok(self.id.unwrap())
    }

    /// Send the mailing.
    ///
    /// Requires both addresses; fails if the mailing was already sent. An
    /// owned batch (and, transitively, its config) is created first. Data is
    /// shipped base64-encoded together with the md5 hex digest of the
    /// encoded payload.
    pub fn mail(&mut self, transport: &dyn Transport) -> Result<(), Error> {
        if self.is_created() {
            return Err(Error::Api("already mailed".to_string()));
        }
        let address = self
            .address
            .clone()
            .ok_or_else(|| Error::Api("address required before mailing".to_string()))?;
        let return_address = self
            .return_address
            .clone()
            .ok_or_else(|| Error::Api("return_address required before mailing".to_string()))?;

        let batch_id = match &mut self.batch {
            BatchRef::Id(id) => *id,
            BatchRef::Owned(batch) => batch.id(transport)?,
        };

        let mut form = vec![
            ("batch_id", batch_id.to_string()),
            ("address", address),
            ("returnaddress", return_address),
            ("format", self.format().as_str().to_string()),
        ];

        if let Some(payload) = self.data.payload()? {
            let encoded = BASE64_STANDARD.encode(&payload);
            let digest = md5_hex(encoded.as_bytes());
            form.push(("data", encoded));
            form.push(("md5", digest));
        }

        let result = transport.post("mailings", &form)?;
        self.id = Some(id_field(&result, "mailing_id")?);
        self.status = Some(MailingStatus::Received);
        Ok(())
    }

    /// Delete the mailing on the server.
    pub fn delete(&mut self, transport: &dyn Transport) -> Result<(), Error> {
        let id = self
            .id
            .take()
            .ok_or_else(|| Error::Api("can't delete() before mail()".to_string()))?;
        self.status = None;
        transport.delete(&format!("mailings/{id}"))?;
        Ok(())
    }

    /// Refetch the remote record and overwrite the local status. Nothing
    /// else is touched.
    pub fn sync(&mut self, transport: &dyn Transport) -> Result<(), Error> {
        let id = self
            .id
            .ok_or_else(|| Error::Api("can't sync() before mail()".to_string()))?;

        let result = transport.get(&format!("mailings/{id}"))?;
        let record = single_record(result, "mailing", id)?;
        let record: MailingRecord =
            serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
        self.status = record.status;
        Ok(())
    }

    /// Fetch the mailing with a specific id.
    pub fn get(transport: &dyn Transport, id: i32) -> Result<Mailing, Error> {
        check_id(id, "mailing")?;

        let result = transport.get(&format!("mailings/{id}"))?;
        let record = single_record(result, "mailing", id)?;
        let record: MailingRecord =
            serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
        Mailing::from_record(record)
    }

    /// Mailings created between `start` and `finish`, optionally restricted
    /// to one status and/or one batch, fetched page by page.
    pub fn browse(
        transport: &dyn Transport,
        start: NaiveDateTime,
        finish: NaiveDateTime,
        status: Option<MailingStatus>,
        batch_id: Option<i32>,
    ) -> Result<Vec<Mailing>, Error> {
        let start = iso8601(start);
        let finish = iso8601(finish);
        let base = match (batch_id, status) {
            (Some(batch), Some(status)) => {
                format!("batches/{batch}/with/{status}/{start}/{finish}")
            }
            (Some(batch), None) => format!("batches/{batch}/browse/{start}/{finish}"),
            (None, Some(status)) => format!("mailings/with/{status}/{start}/{finish}"),
            (None, None) => format!("mailings/browse/{start}/{finish}"),
        };

        fetch_all_pages(transport, &base)?
            .into_iter()
            .map(|record| {
                let record: MailingRecord =
                    serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
                Mailing::from_record(record)
            })
            .collect()
    }

    /// Build a mailing from a server record, verifying and decoding any
    /// payload. The digest covers the payload as shipped, i.e. still
    /// base64-encoded.
    fn from_record(record: MailingRecord) -> Result<Mailing, Error> {
        let data = match record.data {
            Some(encoded) => {
                if let Some(expected) = &record.md5 {
                    let actual = md5_hex(encoded.as_bytes());
                    if actual != *expected {
                        return Err(Error::InvalidValue(
                            "MD5 digest does not match data".to_string(),
                        ));
                    }
                }
                let decoded = BASE64_STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| Error::Decode(e.to_string()))?;
                MailingData::Bytes(decoded)
            }
            None => MailingData::None,
        };

        Ok(Mailing {
            batch: BatchRef::Id(record.batch_id),
            address: record.address,
            return_address: record.return_address,
            data,
            status: record.status,
            id: Some(record.mailing_id),
        })
    }

    fn ensure_uncreated(&self, field: &'static str) -> Result<(), Error> {
        if self.is_created() {
            return Err(Error::ReadOnly(field));
        }
        Ok(())
    }
}

/// Hex md5 digest, as the service expects it.
pub(crate) fn md5_hex(data: &[u8]) -> String {
    use std::fmt::Write;

    let digest = Md5::digest(data);
    let mut out = String::with_capacity(32);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
