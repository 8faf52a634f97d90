use async_trait::async_trait;
use opendal::{services::S3, Operator};

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::store::{list_root, relative_name, ObjectStore, StoredObject};
use crate::sync::fingerprint::normalize_tag;

/// S3 and S3-compatible storage using OpenDAL
pub struct S3Store {
    operator: Operator,
    bucket: String,
}

impl S3Store {
    /// Create a store with explicit credentials
    pub fn new(
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let mut builder = S3::default()
            .bucket(bucket)
            .region(region)
            .access_key_id(access_key)
            .secret_access_key(secret_key);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint(endpoint);
        }

        let operator = Operator::new(builder)?.finish();

        Ok(Self {
            operator,
            bucket: bucket.to_string(),
        })
    }

    /// Create a store using the standard AWS credential chain
    /// (environment, shared credentials file, instance or task role).
    /// OpenDAL resolves the credentials; the engine never reads them.
    pub fn new_with_iam(bucket: &str, region: &str, endpoint: Option<&str>) -> Result<Self> {
        let mut builder = S3::default().bucket(bucket).region(region);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint(endpoint);
        }

        let operator = Operator::new(builder)?.finish();

        Ok(Self {
            operator,
            bucket: bucket.to_string(),
        })
    }

    /// Build the store described by a mirror config.
    pub fn from_config(config: &MirrorConfig) -> Result<Self> {
        let endpoint = config.endpoint.as_deref();
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => {
                Self::new(&config.bucket_name, &config.region, key, secret, endpoint)
            }
            (None, None) => Self::new_with_iam(&config.bucket_name, &config.region, endpoint),
            _ => Err(MirrorError::Config(format!(
                "{}: access_key_id and secret_access_key must be set together",
                config.name
            ))),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let root = list_root(prefix);
        let entries = self.operator.list_with(&root).recursive(true).await?;

        let mut result = Vec::new();
        for entry in entries {
            if entry.metadata().mode().is_dir() {
                continue;
            }
            let Some(name) = relative_name(prefix, entry.path()) else {
                continue;
            };

            let mut identity_tag = entry.metadata().etag().map(normalize_tag);
            let mut size = entry.metadata().content_length();
            if identity_tag.is_none() {
                // Some S3-compatible providers omit ETags from listings
                let meta = self.operator.stat(entry.path()).await?;
                identity_tag = meta.etag().map(normalize_tag);
                size = meta.content_length();
            }

            result.push(StoredObject { name, identity_tag, size });
        }

        Ok(result)
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>) -> Result<Option<String>> {
        let key = key.trim_start_matches('/');

        let mut write = self.operator.write_with(key, data);
        if let Some(content_type) = content_type {
            write = write.content_type(content_type);
        }
        let meta = write.await?;
        Ok(meta.etag().map(normalize_tag))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let key = key.trim_start_matches('/');
        let content = self.operator.read(key).await?;
        Ok(content.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.trim_start_matches('/');
        // OpenDAL reports success for keys that are already gone
        self.operator.delete(key).await?;
        Ok(())
    }

    fn display_key(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key.trim_start_matches('/'))
    }
}
