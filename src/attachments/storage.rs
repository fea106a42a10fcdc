use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::AttachmentStore;
use crate::error::{Error, Result};
use crate::types::FileAttachment;

/// Content-addressed attachment files on the local filesystem.
///
/// Bytes live once under `objects/<aa>/<bb>/<sha256>`; every attachment of a
/// document attribute is a small JSON reference under
/// `refs/<collection>/<document>/<hex(attribute)>/<sha256>.json`. An object is
/// deleted when its last reference goes.
pub struct FsAttachmentStore {
    base_path: PathBuf,
}

impl FsAttachmentStore {
    pub fn new(base_path: &Path) -> Self {
        Self {
            base_path: base_path.to_path_buf(),
        }
    }

    fn object_path(&self, content_id: &str) -> PathBuf {
        self.base_path
            .join("objects")
            .join(&content_id[0..2])
            .join(&content_id[2..4])
            .join(content_id)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join("tmp")
            .join(Uuid::new_v4().to_string())
    }

    fn refs_root(&self) -> PathBuf {
        self.base_path.join("refs")
    }

    fn attribute_dir(
        &self,
        collection_id: &str,
        document_id: &str,
        attribute_id: &str,
    ) -> Result<PathBuf> {
        validate_segment(collection_id)?;
        validate_segment(document_id)?;
        Ok(self
            .refs_root()
            .join(collection_id)
            .join(document_id)
            .join(hex::encode(attribute_id)))
    }

    /// Stores `data` and references it from the given document attribute.
    pub fn put(
        &self,
        collection_id: &str,
        document_id: &str,
        attribute_id: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<FileAttachment> {
        let dir = self.attribute_dir(collection_id, document_id, attribute_id)?;

        let mut hasher = Sha256::new();
        hasher.update(data);
        let content_id = hex::encode(hasher.finalize());

        let object = self.object_path(&content_id);
        if !object.exists() {
            let temp_path = self.temp_path();
            if let Some(parent) = temp_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut temp_file = File::create(&temp_path)?;
            temp_file.write_all(data)?;
            temp_file.sync_all()?;

            if let Some(parent) = object.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&temp_path, &object)?;
        }

        let attachment = FileAttachment {
            collection_id: collection_id.to_string(),
            document_id: document_id.to_string(),
            attribute_id: attribute_id.to_string(),
            content_id,
            file_name: file_name.to_string(),
            size: data.len() as u64,
        };
        fs::create_dir_all(&dir)?;
        fs::write(
            dir.join(format!("{}.json", attachment.content_id)),
            serde_json::to_vec(&attachment)?,
        )?;

        Ok(attachment)
    }

    /// Bytes of an attachment, or `None` when the object is gone.
    pub fn get(&self, attachment: &FileAttachment) -> Result<Option<Vec<u8>>> {
        validate_content_id(&attachment.content_id)?;
        match fs::read(self.object_path(&attachment.content_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn list(
        &self,
        collection_id: &str,
        document_id: &str,
        attribute_id: &str,
    ) -> Result<Vec<FileAttachment>> {
        let dir = self.attribute_dir(collection_id, document_id, attribute_id)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut attachments = Vec::new();
        for entry in entries {
            let raw = fs::read(entry?.path())?;
            attachments.push(serde_json::from_slice::<FileAttachment>(&raw)?);
        }
        attachments.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(attachments)
    }

    pub fn delete(&self, attachment: &FileAttachment) -> Result<bool> {
        validate_content_id(&attachment.content_id)?;
        let dir = self.attribute_dir(
            &attachment.collection_id,
            &attachment.document_id,
            &attachment.attribute_id,
        )?;

        let removed = match fs::remove_file(dir.join(format!("{}.json", attachment.content_id))) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(Error::Io(e)),
        };
        if removed {
            self.prune_object(&attachment.content_id)?;
        }
        Ok(removed)
    }

    /// Deletes the object once no reference points at it anymore.
    fn prune_object(&self, content_id: &str) -> Result<()> {
        if has_reference(&self.refs_root(), &format!("{content_id}.json"))? {
            return Ok(());
        }
        match fs::remove_file(self.object_path(content_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn has_reference(dir: &Path, file_name: &str) -> Result<bool> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if has_reference(&entry.path(), file_name)? {
                return Ok(true);
            }
        } else if entry.file_name() == file_name {
            return Ok(true);
        }
    }
    Ok(false)
}

impl AttachmentStore for FsAttachmentStore {
    fn remove_all(
        &self,
        collection_id: &str,
        document_id: &str,
        attribute_id: &str,
    ) -> Result<usize> {
        let attachments = self.list(collection_id, document_id, attribute_id)?;
        let mut removed = 0;
        for attachment in &attachments {
            if self.delete(attachment)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn duplicate(
        &self,
        collection_id: &str,
        attribute_ids: &[String],
        id_map: &BTreeMap<String, String>,
    ) -> Result<usize> {
        let mut copied = 0;
        for (original, clone) in id_map {
            for attribute_id in attribute_ids {
                for attachment in self.list(collection_id, original, attribute_id)? {
                    let copy = FileAttachment {
                        document_id: clone.clone(),
                        ..attachment
                    };
                    let dir = self.attribute_dir(collection_id, clone, attribute_id)?;
                    fs::create_dir_all(&dir)?;
                    fs::write(
                        dir.join(format!("{}.json", copy.content_id)),
                        serde_json::to_vec(&copy)?,
                    )?;
                    copied += 1;
                }
            }
        }
        Ok(copied)
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::BadRequest(format!("invalid attachment owner id '{segment}'")));
    }
    Ok(())
}

fn validate_content_id(content_id: &str) -> Result<()> {
    if content_id.len() != 64 {
        return Err(Error::BadRequest("invalid content id".to_string()));
    }

    if !content_id
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_uppercase())
    {
        return Err(Error::BadRequest("invalid content id".to_string()));
    }

    Ok(())
}

#[must_use]
pub fn is_valid_content_id(content_id: &str) -> bool {
    validate_content_id(content_id).is_ok()
}
