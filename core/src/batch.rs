//! Batch entity: a group of mailings sharing one config and template.

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::config::Config;
use crate::error::Error;
use crate::mailing::Mailing;
use crate::transport::{check_id, fetch_all_pages, id_field, iso8601, single_record, Transport};
use crate::types::BatchStatus;

/// The config a batch prints with: either the id of one that already exists
/// on the server, or a locally-owned [`Config`] materialized when the batch
/// is created.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigRef {
    Id(i32),
    Owned(Config),
}

/// A batch of mailings.
///
/// Lazily created like [`Config`]: local until [`create`](Batch::create) or
/// the [`id`](Batch::id) accessor runs. `template` is write-once after
/// creation; `status` is the one field the server allows updating afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    config: ConfigRef,
    template: Option<String>,
    status: BatchStatus,
    id: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct BatchRecord {
    batch_id: i32,
    config_id: i32,
    #[serde(default)]
    template: Option<String>,
    status: BatchStatus,
}

impl From<BatchRecord> for Batch {
    fn from(record: BatchRecord) -> Self {
        Batch {
            config: ConfigRef::Id(record.config_id),
            template: record.template,
            status: record.status,
            id: Some(record.batch_id),
        }
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    /// A batch that owns a brand-new default [`Config`], created together
    /// with the batch.
    pub fn new() -> Self {
        Self::with_config(Config::new())
    }

    /// A batch printing with `config`. An uncreated config is materialized
    /// when the batch is.
    pub fn with_config(config: Config) -> Self {
        Batch {
            config: ConfigRef::Owned(config),
            template: None,
            status: BatchStatus::Processing,
            id: None,
        }
    }

    /// A batch printing with a config that already exists on the server.
    pub fn with_config_id(config_id: i32) -> Self {
        Batch {
            config: ConfigRef::Id(config_id),
            template: None,
            status: BatchStatus::Processing,
            id: None,
        }
    }

    /// Whether the batch already exists on the server.
    pub fn is_created(&self) -> bool {
        self.id.is_some()
    }

    /// The server id when the batch has been created, without forcing
    /// creation.
    pub fn created_id(&self) -> Option<i32> {
        self.id
    }

    /// Id of the associated config, `None` while an owned config is still
    /// local-only.
    pub fn config_id(&self) -> Option<i32> {
        match &self.config {
            ConfigRef::Id(id) => Some(*id),
            ConfigRef::Owned(config) => config.created_id(),
        }
    }

    /// Mail-merge template, if any.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn set_template(&mut self, value: Option<String>) -> Result<(), Error> {
        if self.is_created() {
            return Err(Error::ReadOnly("template"));
        }
        self.template = value;
        Ok(())
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// Change the batch status.
    ///
    /// On a created batch a differing value is pushed to the server
    /// immediately; the same value is a no-op. Before creation the value is
    /// only stored locally and sent with the create call.
    pub fn set_status(&mut self, transport: &dyn Transport, value: BatchStatus) -> Result<(), Error> {
        if let Some(id) = self.id {
            if value != self.status {
                transport.post(
                    &format!("batches/{id}"),
                    &[("status", value.as_str().to_string())],
                )?;
            }
        }
        self.status = value;
        Ok(())
    }

    /// The server id, creating the batch first when required.
    pub fn id(&mut self, transport: &dyn Transport) -> Result<i32, Error> {
        self.create(transport)?;
        // Set by create above.
        Ok(self.id.unwrap())
    }

    /// Create the batch on the server, materializing an owned config first.
    /// No-op when the batch already exists.
    pub fn create(&mut self, transport: &dyn Transport) -> Result<(), Error> {
        if self.is_created() {
            return Ok(());
        }

        let config_id = match &mut self.config {
            ConfigRef::Id(id) => *id,
            ConfigRef::Owned(config) => config.id(transport)?,
        };

        let mut form = vec![
            ("config_id", config_id.to_string()),
            ("status", self.status.as_str().to_string()),
        ];
        if let Some(template) = &self.template {
            form.push(("template", template.clone()));
        }

        let result = transport.post("batches", &form)?;
        self.id = Some(id_field(&result, "batch_id")?);
        Ok(())
    }

    /// Delete the batch on the server. The server refuses while mailings
    /// still reference the batch; that is not checked locally.
    pub fn delete(&mut self, transport: &dyn Transport) -> Result<(), Error> {
        let id = self
            .id
            .take()
            .ok_or_else(|| Error::Api("can't delete() before create()".to_string()))?;
        transport.delete(&format!("batches/{id}"))?;
        Ok(())
    }

    /// A new [`Mailing`] bound to this batch, creating the batch first when
    /// required.
    pub fn mailing(&mut self, transport: &dyn Transport) -> Result<Mailing, Error> {
        let id = self.id(transport)?;
        Ok(Mailing::with_batch_id(id))
    }

    /// Fetch the batch with a specific id.
    pub fn get(transport: &dyn Transport, id: i32) -> Result<Batch, Error> {
        check_id(id, "batch")?;

        let result = transport.get(&format!("batches/{id}"))?;
        let record = single_record(result, "batch", id)?;
        let record: BatchRecord =
            serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(record.into())
    }

    /// Batches created between `start` and `finish`, optionally restricted
    /// to one status, fetched page by page.
    pub fn browse(
        transport: &dyn Transport,
        start: NaiveDateTime,
        finish: NaiveDateTime,
        status: Option<BatchStatus>,
    ) -> Result<Vec<Batch>, Error> {
        let start = iso8601(start);
        let finish = iso8601(finish);
        let base = match status {
            Some(status) => format!("batches/with/{status}/{start}/{finish}"),
            None => format!("batches/browse/{start}/{finish}"),
        };

        fetch_all_pages(transport, &base)?
            .into_iter()
            .map(|record| {
                let record: BatchRecord =
                    serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string()))?;
                Ok(record.into())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::transport::testing::MockTransport;

    fn created_batch(mock: &MockTransport) -> Batch {
        mock.push(json!({"batch_id": 2}));
        let mut batch = Batch::with_config_id(7);
        batch.create(mock).unwrap();
        batch
    }

    fn range() -> (NaiveDateTime, NaiveDateTime) {
        let start = NaiveDate::from_ymd_opt(1900, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let finish = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (start, finish)
    }

    fn record(id: i32) -> serde_json::Value {
        json!({"batch_id": id, "config_id": 7, "status": "processing"})
    }

    #[test]
    fn create_posts_config_id_and_status() {
        let mock = MockTransport::new();
        let batch = created_batch(&mock);

        assert!(batch.is_created());
        assert_eq!(batch.config_id(), Some(7));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.request(0), "POST batches");
        assert_eq!(mock.form_field(0, "config_id").as_deref(), Some("7"));
        assert_eq!(mock.form_field(0, "status").as_deref(), Some("processing"));
        assert_eq!(mock.form_field(0, "template"), None);
    }

    #[test]
    fn create_sends_template_when_present() {
        let mock = MockTransport::new();
        mock.push(json!({"batch_id": 2}));

        let mut batch = Batch::with_config_id(7);
        batch.set_template(Some("Dear {{name}}".to_string())).unwrap();
        batch.create(&mock).unwrap();

        assert_eq!(
            mock.form_field(0, "template").as_deref(),
            Some("Dear {{name}}")
        );
    }

    #[test]
    fn create_materializes_an_owned_config_first() {
        let mock = MockTransport::new();
        mock.push(json!({"config_id": 7}));
        mock.push(json!({"batch_id": 2}));

        let mut batch = Batch::new();
        assert_eq!(batch.config_id(), None);

        assert_eq!(batch.id(&mock).unwrap(), 2);
        assert_eq!(batch.config_id(), Some(7));
        assert_eq!(mock.request(0), "POST configs");
        assert_eq!(mock.request(1), "POST batches");
        assert_eq!(mock.form_field(1, "config_id").as_deref(), Some("7"));
    }

    #[test]
    fn create_twice_issues_one_request() {
        let mock = MockTransport::new();
        let mut batch = created_batch(&mock);
        batch.create(&mock).unwrap();
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn status_change_on_created_batch_updates_remotely() {
        let mock = MockTransport::new();
        let mut batch = created_batch(&mock);

        mock.push(json!({}));
        batch.set_status(&mock, BatchStatus::Hold).unwrap();

        assert_eq!(batch.status(), BatchStatus::Hold);
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.request(1), "POST batches/2");
        assert_eq!(mock.form_field(1, "status").as_deref(), Some("hold"));
    }

    #[test]
    fn setting_the_same_status_is_a_no_op() {
        let mock = MockTransport::new();
        let mut batch = created_batch(&mock);

        batch.set_status(&mock, BatchStatus::Processing).unwrap();
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn status_set_before_create_is_sent_at_create_time() {
        let mock = MockTransport::new();

        let mut batch = Batch::with_config_id(7);
        batch.set_status(&mock, BatchStatus::Hold).unwrap();
        assert_eq!(mock.call_count(), 0);

        mock.push(json!({"batch_id": 2}));
        batch.create(&mock).unwrap();
        assert_eq!(mock.form_field(0, "status").as_deref(), Some("hold"));
    }

    #[test]
    fn template_is_read_only_after_creation() {
        let mock = MockTransport::new();
        let mut batch = created_batch(&mock);
        assert!(matches!(
            batch.set_template(Some("x".to_string())),
            Err(Error::ReadOnly("template"))
        ));
    }

    #[test]
    fn delete_before_create_is_an_api_error() {
        let mock = MockTransport::new();
        let mut batch = Batch::with_config_id(7);
        assert!(matches!(batch.delete(&mock), Err(Error::Api(_))));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn delete_clears_the_id() {
        let mock = MockTransport::new();
        let mut batch = created_batch(&mock);

        mock.push(json!({}));
        batch.delete(&mock).unwrap();

        assert!(!batch.is_created());
        assert_eq!(mock.request(1), "DELETE batches/2");
    }

    #[test]
    fn mailing_binds_the_batch_id() {
        let mock = MockTransport::new();
        let mut batch = created_batch(&mock);

        let mailing = batch.mailing(&mock).unwrap();
        assert_eq!(mailing.batch_id(), Some(2));
        // Batch was already created, so no extra request.
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn get_fetches_one_batch() {
        let mock = MockTransport::new();
        mock.push(json!([{
            "batch_id": 4,
            "config_id": 9,
            "template": "hello",
            "status": "hold"
        }]));

        let batch = Batch::get(&mock, 4).unwrap();
        assert_eq!(mock.request(0), "GET batches/4");
        assert!(batch.is_created());
        assert_eq!(batch.config_id(), Some(9));
        assert_eq!(batch.template(), Some("hello"));
        assert_eq!(batch.status(), BatchStatus::Hold);
    }

    #[test]
    fn get_rejects_non_positive_id() {
        let mock = MockTransport::new();
        assert!(matches!(Batch::get(&mock, -1), Err(Error::InvalidValue(_))));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn browse_without_status_uses_the_browse_path() {
        let mock = MockTransport::new();
        mock.push(json!([record(1), record(2)]));
        mock.push(json!([]));

        let (start, finish) = range();
        let batches = Batch::browse(&mock, start, finish, None).unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(
            mock.request(0),
            "GET batches/browse/1900-01-01T00:00:00/2000-01-01T00:00:00/0"
        );
        assert_eq!(
            mock.request(1),
            "GET batches/browse/1900-01-01T00:00:00/2000-01-01T00:00:00/1"
        );
    }

    #[test]
    fn browse_with_status_uses_the_with_path() {
        let mock = MockTransport::new();
        mock.push(json!([]));

        let (start, finish) = range();
        let batches = Batch::browse(&mock, start, finish, Some(BatchStatus::Hold)).unwrap();

        assert!(batches.is_empty());
        assert_eq!(
            mock.request(0),
            "GET batches/with/hold/1900-01-01T00:00:00/2000-01-01T00:00:00/0"
        );
    }
}
