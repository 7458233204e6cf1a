use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{ServiceError, ServiceResult};

const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Lowercased extension of an uploaded photo, if it is a supported image type.
pub fn photo_extension(filename: &str) -> ServiceResult<String> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_lowercase())
        .ok_or(ServiceError::BadRequest("Invalid file type"))?;

    if SUPPORTED_EXTENSIONS.iter().any(|e| *e == extension) {
        Ok(extension)
    } else {
        Err(ServiceError::BadRequest("Invalid file type"))
    }
}

/// Stored file name of an employee photo.
pub fn photo_filename(employee_id: u64, extension: &str) -> String {
    format!("employee_{employee_id}.{extension}")
}

/// Mime type to store when the upload did not declare one.
pub fn guess_mime_type(extension: &str) -> String {
    mime_guess::from_ext(extension)
        .first_or_octet_stream()
        .to_string()
}

/// Blob storage for employee photos below `<root>/employee_photos`.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    directory: PathBuf,
}

impl PhotoStore {
    pub async fn open(root: impl Into<PathBuf>) -> ServiceResult<Self> {
        let directory = root.into().join("employee_photos");
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Self { directory })
    }

    /// Write an upload next to its final name, returns the staged name.
    ///
    /// The blob under `filename` stays untouched until `publish`.
    pub async fn stage(&self, filename: &str, data: &[u8]) -> ServiceResult<String> {
        let staged = format!("{filename}.upload");
        tokio::fs::write(self.directory.join(&staged), data).await?;
        Ok(staged)
    }

    /// Replace the blob under `filename` with a staged upload.
    pub async fn publish(&self, staged: &str, filename: &str) -> ServiceResult<()> {
        tokio::fs::rename(self.directory.join(staged), self.directory.join(filename)).await?;
        Ok(())
    }

    /// Returns `None` if the blob does not exist.
    pub async fn load(&self, filename: &str) -> ServiceResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.directory.join(filename)).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Removing a missing blob is not an error.
    pub async fn remove(&self, filename: &str) -> ServiceResult<()> {
        match tokio::fs::remove_file(self.directory.join(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_images_are_accepted() {
        assert_eq!(photo_extension("me.png").unwrap(), "png");
        assert_eq!(photo_extension("ME.JPG").unwrap(), "jpg");
        assert_eq!(photo_extension("archive.tar.jpeg").unwrap(), "jpeg");
        assert_eq!(photo_extension("anim.gif").unwrap(), "gif");

        assert!(matches!(
            photo_extension("resume.pdf"),
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            photo_extension("no_extension"),
            Err(ServiceError::BadRequest(_))
        ));
        assert!(photo_extension("image.webp").is_err());
    }

    #[test]
    fn filenames_are_keyed_by_employee() {
        assert_eq!(photo_filename(12, "png"), "employee_12.png");
    }

    #[test]
    fn mime_type_is_guessed_from_extension() {
        assert_eq!(guess_mime_type("png"), "image/png");
        assert_eq!(guess_mime_type("jpg"), "image/jpeg");
        assert_eq!(guess_mime_type("gif"), "image/gif");
    }

    #[tokio::test]
    async fn stage_publish_remove() {
        let root = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(root.path()).await.unwrap();

        assert_eq!(store.load("employee_1.png").await.unwrap(), None);

        let staged = store.stage("employee_1.png", &[1, 2, 3]).await.unwrap();
        assert_eq!(store.load("employee_1.png").await.unwrap(), None);
        store.publish(&staged, "employee_1.png").await.unwrap();
        assert_eq!(
            store.load("employee_1.png").await.unwrap(),
            Some(vec![1, 2, 3])
        );

        store.remove("employee_1.png").await.unwrap();
        assert_eq!(store.load("employee_1.png").await.unwrap(), None);

        // removing twice is fine
        store.remove("employee_1.png").await.unwrap();
    }

    #[tokio::test]
    async fn discarded_upload_keeps_the_current_blob() {
        let root = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(root.path()).await.unwrap();

        let staged = store.stage("employee_1.png", &[1, 2, 3]).await.unwrap();
        store.publish(&staged, "employee_1.png").await.unwrap();

        let staged = store.stage("employee_1.png", &[4, 5]).await.unwrap();
        assert_eq!(
            store.load("employee_1.png").await.unwrap(),
            Some(vec![1, 2, 3])
        );

        store.remove(&staged).await.unwrap();
        assert_eq!(store.load(&staged).await.unwrap(), None);
        assert_eq!(
            store.load("employee_1.png").await.unwrap(),
            Some(vec![1, 2, 3])
        );

        let staged = store.stage("employee_1.png", &[4, 5]).await.unwrap();
        store.publish(&staged, "employee_1.png").await.unwrap();
        assert_eq!(store.load("employee_1.png").await.unwrap(), Some(vec![4, 5]));
    }
}
