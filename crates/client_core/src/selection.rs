use std::{path::Path, sync::Arc};

use shared::domain::{ImageId, TestImage};

/// A user supplied image held in memory until it is sent for inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
}

impl UploadedFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The current inference input. Whichever choice the user made last wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Unselected,
    CatalogImage(ImageId),
    Upload(UploadedFile),
}

impl Selection {
    pub fn choose_catalog_image(&mut self, image_id: impl Into<ImageId>) {
        *self = Self::CatalogImage(image_id.into());
    }

    /// `None` mirrors clearing a file input: it drops an upload selection and
    /// leaves a catalog selection alone.
    pub fn choose_uploaded_file(&mut self, file: Option<UploadedFile>) {
        match file {
            Some(file) => *self = Self::Upload(file),
            None => {
                if matches!(self, Self::Upload(_)) {
                    *self = Self::Unselected;
                }
            }
        }
    }

    pub fn catalog_id(&self) -> Option<&ImageId> {
        match self {
            Self::CatalogImage(image_id) => Some(image_id),
            _ => None,
        }
    }

    pub fn uploaded_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::Upload(file) => Some(file),
            _ => None,
        }
    }

    pub fn selected_catalog_image<'a>(&self, catalog: &'a [TestImage]) -> Option<&'a TestImage> {
        let image_id = self.catalog_id()?;
        catalog.iter().find(|image| &image.id == image_id)
    }

    pub fn selected_upload_name(&self) -> Option<&str> {
        self.uploaded_file().map(|file| file.file_name.as_str())
    }

    pub fn display_name<'a>(&'a self, catalog: &'a [TestImage]) -> Option<&'a str> {
        self.selected_catalog_image(catalog)
            .map(|image| image.name.as_str())
            .or_else(|| self.selected_upload_name())
    }
}
