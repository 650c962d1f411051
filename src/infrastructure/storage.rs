use crate::config::StorageConfig;
use crate::services::storage::S3ObjectStorage;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &StorageConfig) -> Arc<S3ObjectStorage> {
    info!(
        "☁️  Object storage: bucket={} region={} endpoint={}",
        config.bucket,
        config.region,
        config.endpoint.as_deref().unwrap_or("aws")
    );

    let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ));
    }

    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.force_path_style)
        .build();

    let client = aws_sdk_s3::Client::from_conf(s3_config);

    Arc::new(S3ObjectStorage::new(client, config))
}
