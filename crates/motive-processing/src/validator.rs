use motive_core::constants::{DEFAULT_ALLOWED_CONTENT_TYPES, MAX_FILE_SIZE_BYTES};
use motive_core::models::SourceFile;
use motive_core::{UploaderConfig, ValidationError};
use std::path::Path;

/// Per-file admission checks
///
/// Pure and deterministic: looks only at the declared media type and the byte
/// size, never at the network or at the batch the file is headed for.
#[derive(Debug, Clone)]
pub struct ItemValidator {
    max_file_size: usize,
    allowed_content_types: Vec<String>,
}

impl Default for ItemValidator {
    fn default() -> Self {
        Self::new(
            MAX_FILE_SIZE_BYTES,
            DEFAULT_ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl ItemValidator {
    pub fn new(max_file_size: usize, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| ct.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.allowed_content_types.clone(),
        )
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, file_name: &str, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile {
                file_name: file_name.to_string(),
            });
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                file_name: file_name.to_string(),
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate the declared media type. Parameters such as `; charset=` are ignored.
    pub fn validate_content_type(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let normalized = normalize_content_type(content_type);

        if !self.allowed_content_types.iter().any(|ct| *ct == normalized) {
            return Err(ValidationError::UnsupportedMediaType {
                file_name: file_name.to_string(),
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate all aspects of a file
    pub fn validate(&self, file: &SourceFile) -> Result<(), ValidationError> {
        self.validate_content_type(&file.file_name, &file.content_type)?;
        self.validate_file_size(&file.file_name, file.size())?;
        Ok(())
    }
}

/// Batch-level admission on top of [`ItemValidator`].
///
/// Incoming sets are all-or-nothing: one bad file, or a set that would push
/// the batch past its limit, rejects every file in the set.
#[derive(Debug, Clone, Default)]
pub struct BatchAdmission {
    validator: ItemValidator,
    max_batch_size: Option<usize>,
}

impl BatchAdmission {
    pub fn new(validator: ItemValidator, max_batch_size: Option<usize>) -> Self {
        Self {
            validator,
            max_batch_size,
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        Self::new(ItemValidator::from_config(config), config.max_batch_size)
    }

    pub fn validator(&self) -> &ItemValidator {
        &self.validator
    }

    /// Admit `incoming` on top of `already_accepted` items.
    pub fn admit(
        &self,
        already_accepted: usize,
        incoming: Vec<SourceFile>,
    ) -> Result<Vec<SourceFile>, ValidationError> {
        for file in &incoming {
            if let Err(e) = self.validator.validate(file) {
                tracing::debug!(
                    file_name = %file.file_name,
                    incoming = incoming.len(),
                    error = %e,
                    "Rejecting incoming file set"
                );
                return Err(e);
            }
        }

        if let Some(max) = self.max_batch_size {
            if already_accepted + incoming.len() > max {
                tracing::debug!(
                    accepted = already_accepted,
                    incoming = incoming.len(),
                    max,
                    "Rejecting incoming file set over batch limit"
                );
                return Err(ValidationError::BatchLimitExceeded {
                    accepted: already_accepted,
                    incoming: incoming.len(),
                    max,
                });
            }
        }

        Ok(incoming)
    }
}

fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Media type for a still-image file extension.
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" | "jfif" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "tif" | "tiff" => Some("image/tiff"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Media type declared for a local path, `application/octet-stream` when unknown.
pub fn content_type_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(content_type_for_extension)
        .unwrap_or("application/octet-stream")
}
