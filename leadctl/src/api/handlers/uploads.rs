//! Multipart forms carrying one optional file next to plain text fields.
//!
//! Text fields are collected by name and deserialized into the module's create
//! model, so a multipart body accepts the same camelCase keys as a JSON one.
//! The file, under the field name `file`, is streamed straight to the
//! [`UploadStore`].

use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    errors::{Error, Result},
    storage::{StoredFile, UploadArea, UploadStore},
};

const FILE_FIELD: &str = "file";

#[derive(Debug, Default)]
pub struct UploadForm {
    fields: Map<String, Value>,
    pub file: Option<StoredFile>,
}

impl UploadForm {
    /// Drain `multipart`, saving the file into `area`.
    ///
    /// On any error a file that was already written is removed again.
    pub async fn read(store: &UploadStore, area: UploadArea, mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();
        let result = form.read_fields(store, area, &mut multipart).await;
        if let Err(e) = result {
            form.discard(store);
            return Err(e);
        }
        Ok(form)
    }

    async fn read_fields(&mut self, store: &UploadStore, area: UploadArea, multipart: &mut Multipart) -> Result<()> {
        while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {e}"),
        })? {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                if self.file.is_some() {
                    return Err(Error::BadRequest {
                        message: "Only one file may be uploaded".to_string(),
                    });
                }
                let file_name = field.file_name().unwrap_or(FILE_FIELD).to_string();
                self.file = Some(store.save(area, &file_name, field).await?);
                continue;
            }

            let text = field.text().await.map_err(|e| Error::BadRequest {
                message: format!("Failed to read field '{name}': {e}"),
            })?;
            if !text.is_empty() {
                self.fields.insert(name, Value::String(text));
            }
        }
        Ok(())
    }

    /// Deserialize the text fields. Fails with 400 on a missing or malformed field.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| Error::BadRequest {
            message: format!("Invalid form: {e}"),
        })
    }

    /// Pass `result` through, removing the uploaded file when it is an error.
    pub fn settle<T>(&mut self, store: &UploadStore, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.discard(store);
        }
        result
    }

    pub fn document_path(&self) -> Option<String> {
        self.file.as_ref().map(|f| f.relative_path.clone())
    }

    /// Remove the uploaded file, if any. Used when the owning row could not be written.
    pub fn discard(&mut self, store: &UploadStore) {
        if let Some(file) = self.file.take() {
            debug!(path = %file.relative_path, "Discarding upload");
            store.remove_in_background(file.relative_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::tickets::TicketCreate;
    use crate::db::models::tickets::TicketPriority;

    fn form(pairs: &[(&str, &str)]) -> UploadForm {
        UploadForm {
            fields: pairs.iter().map(|(k, v)| (k.to_string(), Value::String(v.to_string()))).collect(),
            file: None,
        }
    }

    #[test]
    fn text_fields_deserialize_into_create_models() {
        let profile_id = uuid::Uuid::new_v4();
        let ticket: TicketCreate = form(&[
            ("profileId", &profile_id.to_string()),
            ("subject", "Import stuck"),
            ("priority", "HIGH"),
        ])
        .parse()
        .unwrap();
        assert_eq!(ticket.profile_id, profile_id);
        assert_eq!(ticket.priority, Some(TicketPriority::High));
        assert!(ticket.description.is_none());
    }

    #[test]
    fn missing_required_field_is_bad_request() {
        let err = form(&[("subject", "No profile")]).parse::<TicketCreate>().unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[tokio::test]
    async fn discard_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(&crate::config::UploadsConfig {
            root: dir.path().to_path_buf(),
            max_file_size: 1024,
        });
        let stored = store
            .save(
                UploadArea::Tickets,
                "log.txt",
                futures::stream::iter([Ok::<_, std::io::Error>(b"data".as_slice())]),
            )
            .await
            .unwrap();
        let path = store.resolve(&stored.relative_path);

        let mut form = UploadForm {
            fields: Map::new(),
            file: Some(stored),
        };
        let result: Result<()> = form.settle(
            &store,
            Err(Error::Conflict {
                message: "duplicate".to_string(),
            }),
        );
        assert!(result.is_err());
        assert!(form.file.is_none());

        crate::test_utils::assert_removed_eventually(&path).await;
    }
}
