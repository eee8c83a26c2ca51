//! Printing configuration entity.

use serde::Deserialize;

use crate::error::Error;
use crate::transport::{check_id, fetch_all_pages, id_field, single_record, Transport};
use crate::types::{Output, Size, Style, Turnaround};

/// Print/format configuration reusable across batches.
///
/// Born local-only. [`create`](Config::create) — or the lazy
/// [`id`](Config::id) accessor — materializes it on the server, after which
/// every field is permanently immutable: the service exposes no config
/// update endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    size: Size,
    turnaround: Turnaround,
    style: Style,
    output: Output,
    return_envelope: bool,
    id: Option<i32>,
}

/// Wire shape of a config record. The service spells the envelope flag
/// `returnenvelope`.
#[derive(Debug, Deserialize)]
struct ConfigRecord {
    config_id: i32,
    size: Size,
    turnaround: Turnaround,
    style: Style,
    output: Output,
    #[serde(rename = "returnenvelope")]
    return_envelope: bool,
}

impl From<ConfigRecord> for Config {
    fn from(record: ConfigRecord) -> Self {
        Config {
            size: record.size,
            turnaround: record.turnaround,
            style: record.style,
            output: record.output,
            return_envelope: record.return_envelope,
            id: Some(record.config_id),
        }
    }
}

impl Config {
    /// A default configuration: standard size, three-day turnaround, color,
    /// single output, no return envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the config already exists on the server.
    pub fn is_created(&self) -> bool {
        self.id.is_some()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn turnaround(&self) -> Turnaround {
        self.turnaround
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn output(&self) -> Output {
        self.output
    }

    pub fn return_envelope(&self) -> bool {
        self.return_envelope
    }

    pub fn set_size(&mut self, value: Size) -> Result<(), Error> {
        self.ensure_uncreated("size")?;
        self.size = value;
        Ok(())
    }

    pub fn set_turnaround(&mut self, value: Turnaround) -> Result<(), Error> {
        self.ensure_uncreated("turnaround")?;
        self.turnaround = value;
        Ok(())
    }

    pub fn set_style(&mut self, value: Style) -> Result<(), Error> {
        self.ensure_uncreated("style")?;
        self.style = value;
        Ok(())
    }

    pub fn set_output(&mut self, value: Output) -> Result<(), Error> {
        self.ensure_uncreated("output")?;
        self.output = value;
        Ok(())
    }

    pub fn set_return_envelope(&mut self, value: bool) -> Result<(), Error> {
        self.ensure_uncreated("return_envelope")?;
        self.return_envelope = value;
        Ok(())
    }

    /// The server id when the config has been created, without forcing
    /// creation.
    pub fn created_id(&self) -> Option<i32> {
        self.id
    }

    /// The server id, creating the config first when required.
    pub fn id(&mut self, transport: &dyn Transport) -> Result<i32, Error> {
        self.create(transport)?;
        // Set by create above.
        Ok(self.id.unwrap())
    }

    /// Create the config on the server. No-op when it already exists.
    pub fn create(&mut self, transport: &dyn Transport) -> Result<(), Error> {
        if self.is_created() {
            return Ok(());
        }

        let result = transport.post(
            "configs",
            &[
                ("size", self.size.as_str().to_string()),
                ("turnaround", self.turnaround.as_str().to_string()),
                ("style", self.style.as_str().to_string()),
                ("output", self.output.as_str().to_string()),
                ("returnenvelope", self.return_envelope.to_string()),
            ],
        )?;

        self.id = Some(id_field(&result, "config_id")?);
        Ok(())
    }

    /// Fetch the config with a specific id.
    pub fn get(transport: &dyn Transport, id: i32) -> Result<Config, Error> {
        check_id(id, "config")?;

        let result = transport.get(&format!("configs/{id}"))?;
        let record = single_record(result, "config", id)?;
        let record: ConfigRecord =
            serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(record.into())
    }

    /// Every config defined in the account, fetched page by page.
    pub fn all(transport: &dyn Transport) -> Result<Vec<Config>, Error> {
        fetch_all_pages(transport, "configs/all")?
            .into_iter()
            .map(|record| {
                let record: ConfigRecord =
                    serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
                Ok(record.into())
            })
            .collect()
    }

    fn ensure_uncreated(&self, field: &'static str) -> Result<(), Error> {
        if self.is_created() {
            return Err(Error::ReadOnly(field));
        }
        Ok(())
    }
}
