mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use helpers::{mp4, png, setup, MAX_TEST_UPLOAD_BYTES};
use marquee_core::models::{MediaAsset, MediaFilter, MediaKind, MediaLocator, PageRequest};
use marquee_core::AppError;
use marquee_services::{ImageOptimizer, IncomingFile, UploadIngestor};

struct HalvingOptimizer;

#[async_trait]
impl ImageOptimizer for HalvingOptimizer {
    async fn optimize(&self, data: &[u8], _extension: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(Some(data[..data.len() / 2].to_vec()))
    }
}

struct BrokenOptimizer;

#[async_trait]
impl ImageOptimizer for BrokenOptimizer {
    async fn optimize(&self, _data: &[u8], _extension: &str) -> anyhow::Result<Option<Vec<u8>>> {
        anyhow::bail!("optimizer crashed")
    }
}

#[tokio::test]
async fn test_upload_is_stored_and_registered() {
    let ctx = setup().await;

    let descriptor = ctx
        .ingestor
        .ingest(png("Poster Final.PNG"), MediaKind::Image)
        .await
        .unwrap();

    assert!(descriptor.stored_name.starts_with("PosterFinal-"));
    assert!(descriptor.stored_name.ends_with(".png"));
    assert_eq!(descriptor.url, format!("/uploads/images/{}", descriptor.stored_name));
    assert_eq!(descriptor.content_type, "image/png");
    assert_eq!(descriptor.original_name, "Poster Final.PNG");
    assert_eq!(ctx.stored_files(MediaKind::Image), vec![descriptor.stored_name.clone()]);

    let asset = ctx
        .registry
        .create_from_upload(descriptor.clone(), Some("  Poster  "))
        .await
        .unwrap();

    assert_eq!(asset.display_name, "Poster");
    assert_eq!(asset.kind, MediaKind::Image);
    assert_eq!(asset.file_size, Some(descriptor.file_size));
    assert_eq!(
        asset.locator,
        MediaLocator::Managed {
            stored_name: descriptor.stored_name,
            url: descriptor.url,
        }
    );
    assert_eq!(ctx.registry.get_by_id(asset.id).await.unwrap(), asset);
}

#[tokio::test]
async fn test_rejected_uploads_store_nothing() {
    let ctx = setup().await;

    let cases = [
        // video type declared as image
        (mp4("clip.mp4"), MediaKind::Image),
        // extension disagrees with content type
        (
            IncomingFile {
                content_type: "image/jpeg".to_string(),
                ..png("still.png")
            },
            MediaKind::Image,
        ),
        // no extension
        (png("still"), MediaKind::Image),
        // empty
        (
            IncomingFile {
                data: Vec::new(),
                ..mp4("clip.mp4")
            },
            MediaKind::Video,
        ),
    ];

    for (file, kind) in cases {
        let err = ctx.ingestor.ingest(file, kind).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);
    }

    let oversized = IncomingFile {
        data: vec![0u8; MAX_TEST_UPLOAD_BYTES + 1],
        ..mp4("clip.mp4")
    };
    let err = ctx
        .ingestor
        .ingest(oversized, MediaKind::Video)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PayloadTooLarge(_)));

    assert!(ctx.stored_files(MediaKind::Image).is_empty());
    assert!(ctx.stored_files(MediaKind::Video).is_empty());
}

#[tokio::test]
async fn test_failed_registration_removes_stored_file() {
    let ctx = setup().await;
    let descriptor = ctx
        .ingestor
        .ingest(mp4("clip.mp4"), MediaKind::Video)
        .await
        .unwrap();
    assert_eq!(ctx.stored_files(MediaKind::Video).len(), 1);

    ctx.media_repo.reject_inserts(true);
    let result = ctx.registry.create_from_upload(descriptor, None).await;

    assert!(result.is_err());
    assert!(ctx.stored_files(MediaKind::Video).is_empty());
}

#[tokio::test]
async fn test_link_shapes_register_one_canonical_url() {
    let ctx = setup().await;
    let urls = [
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42",
        "https://youtu.be/dQw4w9WgXcQ",
        "https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1",
    ];

    for url in urls {
        let asset = ctx
            .registry
            .create_from_external_link(url, Some("Reel"))
            .await
            .unwrap();
        assert_eq!(asset.kind, MediaKind::Video);
        assert!(!asset.is_managed());
        assert_eq!(
            asset.locator.url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}

#[tokio::test]
async fn test_unsupported_link_rejected() {
    let ctx = setup().await;

    for url in ["https://vimeo.com/12345", "https://youtu.be/short", ""] {
        let err = ctx
            .registry
            .create_from_external_link(url, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
    assert!(ctx.media_repo.is_empty().await);
}

#[tokio::test]
async fn test_link_display_name_defaults_to_video_id() {
    let ctx = setup().await;
    let asset = ctx
        .registry
        .create_from_external_link("youtu.be/dQw4w9WgXcQ", Some("   "))
        .await
        .unwrap();

    assert_eq!(asset.display_name, "YouTube video dQw4w9WgXcQ");
}

#[tokio::test]
async fn test_delete_managed_asset_removes_file() {
    let ctx = setup().await;
    let asset = ctx.upload(png("still.png"), MediaKind::Image).await;
    assert_eq!(ctx.stored_files(MediaKind::Image).len(), 1);

    let deleted = ctx.registry.delete(asset.id).await.unwrap();

    assert!(deleted.file_removed);
    assert_eq!(deleted.asset.id, asset.id);
    assert!(ctx.stored_files(MediaKind::Image).is_empty());
    assert!(matches!(
        ctx.registry.get_by_id(asset.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_survives_missing_file() {
    let ctx = setup().await;
    let asset = ctx.upload(mp4("clip.mp4"), MediaKind::Video).await;
    let stored_name = asset.locator.stored_name().unwrap().to_string();
    std::fs::remove_file(ctx.upload_tree.join("videos").join(stored_name)).unwrap();

    ctx.registry.delete(asset.id).await.unwrap();

    assert!(ctx.media_repo.is_empty().await);
}

#[tokio::test]
async fn test_delete_unknown_asset_is_not_found() {
    let ctx = setup().await;
    assert!(matches!(
        ctx.registry.delete(9).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_filters_by_kind_and_search() {
    let ctx = setup().await;
    ctx.upload(png("teaser-still.png"), MediaKind::Image).await;
    ctx.upload(mp4("teaser-cut.mp4"), MediaKind::Video).await;
    ctx.link("dQw4w9WgXcQ").await;

    let filter = MediaFilter {
        kind: Some(MediaKind::Video),
        search: Some("TEASER".to_string()),
    };
    let page = ctx.registry.list(&filter, PageRequest::default()).await.unwrap();

    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.items[0].display_name, "teaser-cut.mp4");

    let all = ctx
        .registry
        .list(&MediaFilter::default(), PageRequest::new(Some(1), Some(2)))
        .await
        .unwrap();
    assert_eq!(all.items.len(), 2);
    assert_eq!(all.pagination.total, 3);
    assert_eq!(all.pagination.total_pages, 2);
    // newest first
    assert!(all.items[0].id > all.items[1].id);
}

#[tokio::test]
async fn test_optimizer_output_is_stored() {
    let ctx = setup().await;
    let ingestor = UploadIngestor::new(ctx.storage.clone(), helpers::test_limits())
        .with_optimizer(Arc::new(HalvingOptimizer));
    let original = png("still.png");
    let original_len = original.data.len() as i64;

    let descriptor = ingestor.ingest(original, MediaKind::Image).await.unwrap();

    assert_eq!(descriptor.file_size, original_len / 2);
}

#[tokio::test]
async fn test_optimizer_failure_keeps_original() {
    let ctx = setup().await;
    let ingestor = UploadIngestor::new(ctx.storage.clone(), helpers::test_limits())
        .with_optimizer(Arc::new(BrokenOptimizer));
    let original = png("still.png");
    let original_len = original.data.len() as i64;

    let descriptor = ingestor.ingest(original, MediaKind::Image).await.unwrap();

    assert_eq!(descriptor.file_size, original_len);
    assert_eq!(ctx.stored_files(MediaKind::Image).len(), 1);
}

fn external_asset(id: i64, minutes: i64) -> MediaAsset {
    let stamp = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes);
    MediaAsset {
        id,
        display_name: format!("Reel {}", id),
        kind: MediaKind::Video,
        locator: MediaLocator::External {
            url: format!("https://www.youtube.com/watch?v=reel{:07}", id),
        },
        content_type: None,
        file_size: None,
        created_at: stamp,
        updated_at: stamp,
    }
}

#[tokio::test]
async fn test_media_pages_partition_with_timestamp_ties() {
    let ctx = setup().await;
    // Four assets share each timestamp, so order inside a group rests on id
    for id in 1..=23 {
        ctx.media_repo.seed(external_asset(id, id / 4)).await;
    }

    let mut listed = Vec::new();
    for page in 1..=5 {
        let result = ctx
            .registry
            .list(&MediaFilter::default(), PageRequest::new(Some(page), Some(5)))
            .await
            .unwrap();
        assert_eq!(result.pagination.total, 23);
        assert_eq!(result.pagination.total_pages, 5);
        assert_eq!(result.items.len(), if page == 5 { 3 } else { 5 });
        listed.extend(result.items.into_iter().map(|a| a.id));
    }

    let mut expected: Vec<i64> = (1..=23).collect();
    expected.sort_by(|a, b| (b / 4).cmp(&(a / 4)).then(b.cmp(a)));
    assert_eq!(listed, expected);
    assert_eq!(listed.iter().collect::<HashSet<_>>().len(), 23);

    let past_end = ctx
        .registry
        .list(&MediaFilter::default(), PageRequest::new(Some(6), Some(5)))
        .await
        .unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.pagination.total, 23);
}
