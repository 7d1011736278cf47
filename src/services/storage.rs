use std::path::Path;

use bytes::Bytes;
use tracing::info;

use crate::{
    context::AppContext,
    error::{AppError, Result},
};

pub struct StorageService;

impl StorageService {
    /// Upload `body` to `bucket/path`. The content type is guessed from `path`.
    pub async fn upload(ctx: &AppContext, bucket: &str, path: &str, body: Bytes) -> Result<String> {
        let path = object_path(path)?;
        ctx.require_user()?;
        let content_type: mime::Mime = mime_guess::from_path(path).first_or_octet_stream();
        let token = ctx.access_token();
        let key = ctx
            .backend()
            .upload(bucket, path, body, content_type.essence_str(), token.as_deref())
            .await?;
        info!(bucket, path, content_type = %content_type, "Object uploaded");
        Ok(key)
    }

    pub async fn upload_file(ctx: &AppContext, bucket: &str, path: &str, local: &Path) -> Result<String> {
        let body = tokio::fs::read(local).await?;
        Self::upload(ctx, bucket, path, Bytes::from(body)).await
    }

    pub async fn download(ctx: &AppContext, bucket: &str, path: &str) -> Result<Bytes> {
        let path = object_path(path)?;
        let token = ctx.access_token();
        ctx.backend().download(bucket, path, token.as_deref()).await
    }

    pub fn public_url(ctx: &AppContext, bucket: &str, path: &str) -> Result<String> {
        Ok(ctx.backend().public_url(bucket, object_path(path)?))
    }

    pub async fn remove(ctx: &AppContext, bucket: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        ctx.require_user()?;
        let token = ctx.access_token();
        ctx.backend().remove(bucket, paths, token.as_deref()).await?;
        info!(bucket, count = paths.len(), "Objects removed");
        Ok(())
    }
}

fn object_path(path: &str) -> Result<&str> {
    let path = path.trim().trim_start_matches('/');
    if path.is_empty() || path.split('/').any(|seg| seg == "..") {
        return Err(AppError::validation(format!("Chemin invalide : {path}")));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::people::tests::signed_in_context;

    #[tokio::test]
    async fn test_upload_download_remove() {
        let (ctx, _) = signed_in_context("files@example.org").await;
        let key = StorageService::upload(&ctx, "documents", "/actes/naissance.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(key, "documents/actes/naissance.pdf");

        let body = StorageService::download(&ctx, "documents", "actes/naissance.pdf").await.unwrap();
        assert_eq!(&body[..], b"%PDF");
        assert!(StorageService::public_url(&ctx, "documents", "actes/naissance.pdf")
            .unwrap()
            .ends_with("/object/public/documents/actes/naissance.pdf"));

        StorageService::remove(&ctx, "documents", &["actes/naissance.pdf".to_string()]).await.unwrap();
        let err = StorageService::download(&ctx, "documents", "actes/naissance.pdf").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_object_path_rejects_traversal() {
        assert!(object_path("../secret").is_err());
        assert!(object_path("  ").is_err());
        assert_eq!(object_path("/a/b.png").unwrap(), "a/b.png");
    }
}
