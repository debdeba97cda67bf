//! S3 object storage through OpenDAL.

use super::naming;
use super::traits::FileStorage;
use super::types::{CONTRIBUTION_CONTENT_TYPE, ContributionUpload, ObjectStream, StorageError};
use crate::config::S3Settings;
use futures_util::StreamExt;
use opendal::Operator;

/// Object storage backend.
///
/// References are public object URLs; the key is recovered by stripping the
/// bucket URL prefix.
#[derive(Clone)]
pub struct S3Disk {
    operator: Operator,
    url_prefix: String,
}

impl S3Disk {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let mut builder = opendal::services::S3::default()
            .bucket(&settings.bucket)
            .region(&settings.region)
            .access_key_id(&settings.access_key_id)
            .secret_access_key(&settings.secret_access_key);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint(endpoint);
        }

        let operator = Operator::new(builder)?.finish();

        Ok(Self {
            operator,
            url_prefix: Self::url_prefix(settings),
        })
    }

    #[cfg(test)]
    fn from_operator(operator: Operator, url_prefix: &str) -> Self {
        Self {
            operator,
            url_prefix: url_prefix.to_owned(),
        }
    }

    /// `https://<bucket>.s3.<region>.amazonaws.com/`, or
    /// `<endpoint>/<bucket>/` for S3-compatible stores.
    pub fn url_prefix(settings: &S3Settings) -> String {
        match &settings.endpoint {
            Some(endpoint) => format!("{}/{}/", endpoint, settings.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/",
                settings.bucket, settings.region
            ),
        }
    }

    fn key_of<'a>(&self, reference: &'a str) -> Result<&'a str, StorageError> {
        reference
            .strip_prefix(&self.url_prefix)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StorageError::InvalidReference(reference.to_owned()))
    }
}

fn map_read_error(reference: &str, e: opendal::Error) -> StorageError {
    if e.kind() == opendal::ErrorKind::NotFound {
        StorageError::NotFound(reference.to_owned())
    } else {
        StorageError::Remote(e.to_string())
    }
}

impl FileStorage for S3Disk {
    type Error = StorageError;

    async fn put(&self, upload: ContributionUpload) -> Result<String, Self::Error> {
        let key = naming::remote_key(&upload);
        let size = upload.content.len();

        self.operator
            .write_with(&key, upload.content)
            .content_type(CONTRIBUTION_CONTENT_TYPE)
            .await?;

        tracing::debug!(key = %key, size, "Stored contribution in object storage");
        Ok(format!("{}{}", self.url_prefix, key))
    }

    async fn open_read_stream(&self, reference: &str) -> Result<ObjectStream, Self::Error> {
        let key = self.key_of(reference)?;

        self.operator
            .stat(key)
            .await
            .map_err(|e| map_read_error(reference, e))?;

        let stream = self
            .operator
            .reader(key)
            .await
            .map_err(|e| map_read_error(reference, e))?
            .into_bytes_stream(..)
            .await
            .map_err(|e| map_read_error(reference, e))?;

        Ok(stream.boxed())
    }

    fn derive_filename(&self, reference: &str) -> String {
        let key = self.key_of(reference).unwrap_or(reference);
        naming::last_segment(key).to_owned()
    }

    async fn delete(&self, reference: &str) -> Result<bool, Self::Error> {
        let key = self.key_of(reference)?;
        if !self.operator.exists(key).await? {
            return Ok(false);
        }
        self.operator.delete(key).await?;
        Ok(true)
    }

    async fn could_connected(&self) -> bool {
        self.operator.check().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    const PREFIX: &str = "https://collage.s3.eu-west-1.amazonaws.com/";

    fn memory_disk() -> S3Disk {
        let operator = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        S3Disk::from_operator(operator, PREFIX)
    }

    async fn read_all(disk: &S3Disk, reference: &str) -> Vec<u8> {
        disk.open_read_stream(reference)
            .await
            .unwrap()
            .map_ok(|chunk| chunk.to_vec())
            .try_concat()
            .await
            .unwrap()
    }

    fn settings(endpoint: Option<&str>) -> S3Settings {
        S3Settings {
            access_key_id: "key".to_owned(),
            secret_access_key: "secret".to_owned(),
            region: "eu-west-1".to_owned(),
            bucket: "collage".to_owned(),
            endpoint: endpoint.map(str::to_owned),
        }
    }

    #[test]
    fn aws_url_prefix() {
        assert_eq!(
            S3Disk::url_prefix(&settings(None)),
            "https://collage.s3.eu-west-1.amazonaws.com/"
        );
    }

    #[test]
    fn custom_endpoint_url_prefix() {
        assert_eq!(
            S3Disk::url_prefix(&settings(Some("http://localhost:9000"))),
            "http://localhost:9000/collage/"
        );
    }

    #[test]
    fn key_is_recovered_from_reference() {
        let disk = S3Disk::new(&settings(None)).unwrap();
        let reference = "https://collage.s3.eu-west-1.amazonaws.com/3/abc/17_deadbeef_canvas.png";

        assert_eq!(disk.key_of(reference).unwrap(), "3/abc/17_deadbeef_canvas.png");
        assert_eq!(disk.derive_filename(reference), "17_deadbeef_canvas.png");
    }

    #[test]
    fn foreign_reference_is_invalid() {
        let disk = S3Disk::new(&settings(None)).unwrap();

        assert!(matches!(
            disk.key_of("https://other.s3.eu-west-1.amazonaws.com/3/a.png"),
            Err(StorageError::InvalidReference(_))
        ));
        assert!(matches!(
            disk.key_of("uploads/3/a.png"),
            Err(StorageError::InvalidReference(_))
        ));
    }

    #[tokio::test]
    async fn put_read_delete_against_an_operator() {
        let disk = memory_disk();
        assert!(disk.could_connected().await);

        let reference = disk
            .put(ContributionUpload::new(3, 9, b"png bytes".to_vec()).with_original_name("cat.jpg"))
            .await
            .unwrap();
        assert!(reference.starts_with(&format!("{PREFIX}3/")), "{reference}");
        assert!(reference.ends_with("_cat.png"), "{reference}");

        assert_eq!(read_all(&disk, &reference).await, b"png bytes");

        assert!(disk.delete(&reference).await.unwrap());
        assert!(!disk.delete(&reference).await.unwrap());
    }

    #[tokio::test]
    async fn missing_object_maps_to_not_found() {
        let disk = memory_disk();

        assert!(matches!(
            disk.open_read_stream(&format!("{PREFIX}3/abc/1_deadbeef_gone.png"))
                .await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            disk.open_read_stream("https://elsewhere.example/3/a.png").await,
            Err(StorageError::InvalidReference(_))
        ));
    }

    #[tokio::test]
    async fn large_objects_stream_back_intact() {
        let disk = memory_disk();
        let content: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();

        let reference = disk
            .put(ContributionUpload::new(1, 1, content.clone()))
            .await
            .unwrap();
        assert_eq!(read_all(&disk, &reference).await, content);
    }
}
