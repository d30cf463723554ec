//! Attachment lifecycle coordinator
//!
//! Hooks into the host's record lifecycle. Staging runs before the record
//! is persisted and only inspects data; commits run afterwards and touch the
//! filesystem:
//!
//! - save: `stage_for_save` then `commit_for_save(created)`
//! - delete: `stage_for_delete` then `commit_for_delete`
//!
//! All per-request state lives in the caller's [`UploadTransaction`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use uploader_core::{
    AttachmentRegistry, AttachmentSettings, FieldValue, Id, Record, UploadError, UploadResult,
    ValidationErrors, ORIGINAL_STYLE,
};
use uploader_imaging::{DerivativeGenerator, DerivativeJob, ResizeOptions};
use uploader_interpolation::{InterpolationContext, PathResolver};

use crate::fetch::{is_remote_url, RemoteFetcher};
use crate::reader::RecordReader;
use crate::staging::{PendingDelete, PendingWrite, UploadTransaction};
use crate::storage::Storage;

/// What a save commit did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Field -> whether its primary file was written
    pub written: BTreeMap<String, bool>,
    /// Files removed while replacing previous uploads
    pub deleted: usize,
    /// Derivatives that were produced
    pub derivatives: Vec<DerivativeJob>,
    /// `field/style` pairs that were skipped
    pub skipped: Vec<String>,
}

/// Coordinates staging and committing attachment files for records
#[derive(Clone)]
pub struct AttachmentCoordinator {
    resolver: PathResolver,
    generator: DerivativeGenerator,
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for AttachmentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentCoordinator")
            .field("resolver", &self.resolver)
            .field("generator", &self.generator)
            .field("storage", &self.storage.name())
            .finish()
    }
}

impl AttachmentCoordinator {
    pub fn new(resolver: PathResolver, generator: DerivativeGenerator, storage: Arc<dyn Storage>) -> Self {
        Self {
            resolver,
            generator,
            storage,
        }
    }

    pub fn registry(&self) -> &AttachmentRegistry {
        self.resolver.registry()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Clear staged state; call before validation runs
    pub fn reset(&self, tx: &mut UploadTransaction) {
        tx.reset();
        debug!("Upload transaction reset");
    }

    /// Replace URL-valued attachment fields with downloaded files.
    ///
    /// A field holding an `http(s)` URL is fetched. A blank field falls back
    /// to its `url_field` sibling. Failed downloads become validation errors
    /// on the field.
    #[instrument(skip_all, fields(model = %record.model))]
    pub fn prepare_remote(
        &self,
        record: &mut Record,
        fetcher: &dyn RemoteFetcher,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (field, settings) in self.registry().fields(&record.model) {
            let Some(url) = remote_source(record, field, settings) else {
                continue;
            };

            match fetcher.fetch(&url) {
                Ok(file) => {
                    debug!(field = field, url = %url, tmp = ?file.tmp_path, "Remote file fetched");
                    record.data.insert(field, file);
                }
                Err(err) => {
                    warn!(field = field, url = %url, error = %err, "Remote fetch failed");
                    errors.add(field, format!("could not be fetched from {}", url));
                }
            }
        }

        errors.into_result()
    }

    /// Stage uploads of a record about to be saved.
    ///
    /// Valid uploads are staged as writes, their sanitized name and metadata
    /// replace the field value, and on updates the previously stored file is
    /// staged for deletion. Attachment fields without a valid upload are
    /// dropped from the record data so stored values are left alone.
    #[instrument(skip_all, fields(model = %record.model, id = ?record.id))]
    pub fn stage_for_save(
        &self,
        tx: &mut UploadTransaction,
        record: &mut Record,
        reader: &dyn RecordReader,
    ) -> UploadResult<()> {
        let registry = self.resolver.registry();

        for (field, settings) in registry.fields(&record.model) {
            let upload = match record.data.get(field).and_then(FieldValue::as_upload) {
                Some(upload) if upload.exists() => upload.clone(),
                _ => {
                    record.data.remove(field);
                    continue;
                }
            };

            if record.id.is_some() {
                self.stage_deletes(tx, record, reader, &[field.to_string()], true)?;
            }

            let write = PendingWrite::from_upload(field, &upload);
            record.data.insert(field, write.filename.clone());
            record
                .data
                .insert(settings.meta.filesize.clone(), serde_json::Value::from(write.size));
            record
                .data
                .insert(settings.meta.content_type.clone(), write.content_type.clone());

            debug!(field = field, filename = %write.filename, size = write.size, "Upload staged");
            tx.stage_write(write);
        }

        tx.mark_staged();
        Ok(())
    }

    /// Write staged uploads after the record was persisted.
    ///
    /// On updates (`created == false`) staged deletions run first. Each
    /// written field then gets its primary file, an optional downscale and
    /// one derivative per style. Unsupported geometries and unwritable style
    /// directories are skipped; any other failure aborts the commit.
    #[instrument(skip_all, fields(model = %record.model, id = ?record.id, created = created))]
    pub fn commit_for_save(
        &self,
        tx: &mut UploadTransaction,
        record: &Record,
        created: bool,
    ) -> UploadResult<CommitReport> {
        let result = self.commit_save(tx, record, created);
        match &result {
            Ok(report) => {
                tx.mark_committed();
                info!(
                    written = report.written.len(),
                    deleted = report.deleted,
                    derivatives = report.derivatives.len(),
                    "Uploads committed"
                );
            }
            Err(err) => {
                tx.mark_failed();
                error!(error = %err, code = err.error_code(), "Upload commit failed");
            }
        }
        result
    }

    /// Stage removal of every stored attachment of a record about to be
    /// deleted. Resets the transaction first.
    ///
    /// Values are re-read from the store when `force_read` is set or when the
    /// in-memory record lacks an attachment field.
    #[instrument(skip_all, fields(model = %record.model, id = ?record.id))]
    pub fn stage_for_delete(
        &self,
        tx: &mut UploadTransaction,
        record: &Record,
        reader: &dyn RecordReader,
        force_read: bool,
    ) -> UploadResult<()> {
        tx.reset();
        let fields = self.registry().field_names(&record.model);
        self.stage_deletes(tx, record, reader, &fields, force_read)?;
        tx.mark_staged();
        Ok(())
    }

    /// Remove the files staged by [`stage_for_delete`](Self::stage_for_delete)
    /// after the record row is gone. Returns the number of files removed.
    #[instrument(skip_all, fields(model = %record.model, id = ?record.id))]
    pub fn commit_for_delete(&self, tx: &mut UploadTransaction, record: &Record) -> UploadResult<usize> {
        match self.execute_deletes(tx, &record.model) {
            Ok(removed) => {
                tx.mark_committed();
                info!(removed = removed, "Attachment files deleted");
                Ok(removed)
            }
            Err(err) => {
                tx.mark_failed();
                error!(error = %err, code = err.error_code(), "Attachment delete failed");
                Err(err)
            }
        }
    }

    /// Stage and immediately commit deletion
    pub fn stage_and_commit_for_delete(
        &self,
        tx: &mut UploadTransaction,
        record: &Record,
        reader: &dyn RecordReader,
    ) -> UploadResult<usize> {
        self.stage_for_delete(tx, record, reader, false)?;
        self.commit_for_delete(tx, record)
    }

    fn stage_deletes(
        &self,
        tx: &mut UploadTransaction,
        record: &Record,
        reader: &dyn RecordReader,
        fields: &[String],
        force_read: bool,
    ) -> UploadResult<()> {
        let Some(id) = record.id else {
            debug!("Record has no id, nothing stored to delete");
            return Ok(());
        };

        let must_read = force_read
            || record.data.is_empty()
            || fields.iter().any(|field| !record.data.contains(field));

        let stored;
        let data = if must_read {
            stored = reader.read_fields(&record.model, id, fields)?;
            &stored
        } else {
            &record.data
        };

        for field in fields {
            if let Some(filename) = data.get(field).and_then(FieldValue::stored_filename) {
                debug!(field = %field, filename = filename, "Stored file staged for deletion");
                tx.stage_delete(PendingDelete {
                    field: field.clone(),
                    filename: filename.to_string(),
                    id,
                });
            }
        }
        Ok(())
    }

    fn execute_deletes(&self, tx: &UploadTransaction, model: &str) -> UploadResult<usize> {
        let registry = self.resolver.registry();
        let mut removed = 0;

        for delete in tx.pending_deletes() {
            let settings = registry.get(model, &delete.field)?;
            for style in settings.style_names() {
                let path = self.path_for(
                    settings,
                    model,
                    Some(delete.id),
                    &delete.field,
                    &delete.filename,
                    style,
                );
                if self.storage.remove(&path)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn commit_save(
        &self,
        tx: &UploadTransaction,
        record: &Record,
        created: bool,
    ) -> UploadResult<CommitReport> {
        let mut report = CommitReport::default();
        if !created {
            report.deleted = self.execute_deletes(tx, &record.model)?;
        }

        if record.id.is_none() && tx.pending_writes().next().is_some() {
            warn!("Writing uploads for a record without id");
        }

        for write in tx.pending_writes() {
            self.write_field(tx, record, write, &mut report)?;
            report.written.insert(write.field.clone(), true);
        }
        Ok(report)
    }

    fn write_field(
        &self,
        tx: &UploadTransaction,
        record: &Record,
        write: &PendingWrite,
        report: &mut CommitReport,
    ) -> UploadResult<()> {
        let model = record.model.as_str();
        let field = write.field.as_str();
        let settings = self.registry().get(model, field)?;

        let primary = self.path_for(settings, model, record.id, field, &write.filename, ORIGINAL_STYLE);
        self.storage.ensure_dir(&primary)?;
        if write.remote {
            self.storage.rename_remote(&write.tmp_path, &primary)?;
        } else {
            self.storage.move_upload(&write.tmp_path, &primary)?;
        }
        debug!(field = field, path = ?primary, "Primary file written");

        if let Some(max_width) = tx.downscale_for(field) {
            match self
                .generator
                .downscale_to_width(primary.clone(), max_width, settings.engine, settings.quality)
            {
                Ok(job) => debug!(field = field, target = %job.target(), "Primary file downscaled"),
                Err(UploadError::UnsupportedGeometry(geometry)) => {
                    warn!(field = field, geometry = %geometry, "Skipping downscale");
                }
                Err(err) => return Err(err),
            }
        }

        for (style, geometry) in &settings.styles {
            let destination = self.path_for(settings, model, record.id, field, &write.filename, style);
            if let Err(err) = self.storage.ensure_dir(&destination) {
                warn!(field = field, style = %style, error = %err, "Skipping style, directory unwritable");
                report.skipped.push(format!("{}/{}", field, style));
                continue;
            }

            let options = ResizeOptions {
                source: primary.clone(),
                destination,
                geometry: geometry.clone(),
                engine: settings.engine,
                quality: settings.quality,
            };
            match self.generator.resize(style, &options) {
                Ok(job) => report.derivatives.push(job),
                Err(UploadError::UnsupportedGeometry(geometry)) => {
                    warn!(field = field, style = %style, geometry = %geometry, "Skipping style, unsupported geometry");
                    report.skipped.push(format!("{}/{}", field, style));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    fn path_for(
        &self,
        settings: &AttachmentSettings,
        model: &str,
        id: Option<Id>,
        field: &str,
        filename: &str,
        style: &str,
    ) -> PathBuf {
        let paths = self.resolver.resolve_settings(
            settings,
            model,
            id,
            field,
            filename,
            style,
            &InterpolationContext::new(),
        );
        PathBuf::from(paths.path.unwrap_or_default())
    }
}

/// The URL to fetch for `field`, if any
fn remote_source(record: &Record, field: &str, settings: &AttachmentSettings) -> Option<String> {
    let value = record.data.get(field)?;

    let candidate = if value.is_blank() {
        let url_field = settings.url_field.as_deref()?;
        record.data.get(url_field)?.as_str()?
    } else {
        value.as_str()?
    };

    is_remote_url(candidate).then(|| candidate.to_string())
}
