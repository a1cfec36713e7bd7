//! Postgres repository tests.
//!
//! Each test gets a fresh database from `#[sqlx::test]`. Run with
//! `DATABASE_URL=postgres://... cargo test -p marquee-db -- --ignored`.

use marquee_core::models::{
    ColumnSet, ColumnValue, MediaFilter, MediaGuard, MediaKind, MediaLocator, NewMediaAsset,
    PageRequest, ProjectColumn, ProjectFilter, ProjectStatus, ReferenceField,
};
use marquee_core::AppError;
use marquee_db::{
    InsertError, MediaRepository, MediaRepositoryTrait, ProjectRepository,
    ProjectRepositoryTrait,
};
use sqlx::PgPool;

fn titled(title: &str) -> ColumnSet {
    let mut columns = ColumnSet::new();
    columns.set(ProjectColumn::Title, ColumnValue::Text(Some(title.into())));
    columns
}

fn managed(name: &str, kind: MediaKind) -> NewMediaAsset {
    NewMediaAsset {
        display_name: name.to_string(),
        kind,
        locator: MediaLocator::Managed {
            stored_name: format!("{}-1.bin", name),
            url: format!("/uploads/{}/{}-1.bin", kind.folder(), name),
        },
        content_type: Some("application/octet-stream".to_string()),
        file_size: Some(3),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_insert_uses_column_defaults(pool: PgPool) {
    let repo = ProjectRepository::new(pool);

    let project = repo.insert(&ColumnSet::new(), None, &[]).await.unwrap();

    assert_eq!(project.title, "");
    assert_eq!(project.status, ProjectStatus::Draft);
    assert_eq!(project.sort_order, 0);
    assert_eq!(repo.get(project.id).await.unwrap(), Some(project));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_missing_identity_default_detected(pool: PgPool) {
    let repo = ProjectRepository::new(pool.clone());
    for title in ["a", "b", "c"] {
        repo.insert(&titled(title), None, &[]).await.unwrap();
    }

    sqlx::query("ALTER TABLE projects ALTER COLUMN id DROP IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    let err = repo.insert(&titled("d"), None, &[]).await.unwrap_err();
    assert!(matches!(err, InsertError::MissingIdentity { table: "projects" }));

    let next = repo.next_id().await.unwrap();
    assert_eq!(next, 4);
    let project = repo.insert(&titled("d"), Some(next), &[]).await.unwrap();
    assert_eq!(project.id, 4);
    assert_eq!(project.title, "d");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_guard_rejects_wrong_kind_without_writing(pool: PgPool) {
    let media = MediaRepository::new(pool.clone());
    let projects = ProjectRepository::new(pool);
    let video = media.insert(managed("clip", MediaKind::Video)).await.unwrap();

    let mut columns = titled("Reel");
    columns.set(
        ProjectColumn::ThumbnailMediaId,
        ColumnValue::BigInt(Some(video.id)),
    );
    let guard = MediaGuard {
        field: ReferenceField::ThumbnailMediaId,
        media_id: video.id,
    };

    let err = projects.insert(&columns, None, &[guard]).await.unwrap_err();
    assert!(matches!(err, InsertError::Other(AppError::Referential(_))));

    let (rows, total) = projects
        .list(&ProjectFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(total, 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_update_only_touches_given_columns(pool: PgPool) {
    let repo = ProjectRepository::new(pool);
    let mut columns = titled("Night Shift");
    columns.set(ProjectColumn::Client, ColumnValue::Text(Some("Acme".into())));
    columns.set(ProjectColumn::Year, ColumnValue::Int(Some(2021)));
    let created = repo.insert(&columns, None, &[]).await.unwrap();

    let mut change = ColumnSet::new();
    change.set(ProjectColumn::Client, ColumnValue::Text(None));
    change.set(ProjectColumn::Status, ColumnValue::Status(ProjectStatus::Published));
    let updated = repo
        .update(created.id, &change, &[])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "Night Shift");
    assert_eq!(updated.client, None);
    assert_eq!(updated.year, Some(2021));
    assert_eq!(updated.status, ProjectStatus::Published);

    assert!(repo.update(9999, &change, &[]).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_list_filters_and_pages(pool: PgPool) {
    let repo = ProjectRepository::new(pool);
    for i in 0..5 {
        let mut columns = titled(&format!("Spot {}", i));
        columns.set(ProjectColumn::Category, ColumnValue::Text(Some("ads".into())));
        repo.insert(&columns, None, &[]).await.unwrap();
    }
    repo.insert(&titled("100% cotton"), None, &[]).await.unwrap();

    let mut seen = Vec::new();
    for page in 1..=2 {
        let filter = ProjectFilter {
            category: Some("ads".to_string()),
            ..Default::default()
        };
        let (rows, total) = repo
            .list(&filter, PageRequest::new(Some(page), Some(3)))
            .await
            .unwrap();
        assert_eq!(total, 5);
        seen.extend(rows.into_iter().map(|p| p.id));
    }
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 5);

    // `%` is matched literally
    let filter = ProjectFilter {
        search: Some("0%".to_string()),
        ..Default::default()
    };
    let (rows, _) = repo.list(&filter, PageRequest::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "100% cotton");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_media_lookup_helpers(pool: PgPool) {
    let media = MediaRepository::new(pool.clone());
    let projects = ProjectRepository::new(pool);
    let still = media.insert(managed("still", MediaKind::Image)).await.unwrap();

    let mut columns = titled("a");
    columns.set(
        ProjectColumn::ThumbnailMediaId,
        ColumnValue::BigInt(Some(still.id)),
    );
    let project = projects.insert(&columns, None, &[]).await.unwrap();

    let refs = projects.media_references(Some(still.id)).await.unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].project_id, project.id);

    let known = media
        .known_stored_names(
            MediaKind::Image,
            &["still-1.bin".to_string(), "stray.bin".to_string()],
        )
        .await
        .unwrap();
    assert!(known.contains("still-1.bin"));
    assert!(!known.contains("stray.bin"));

    assert!(media.delete(still.id).await.unwrap());
    assert!(media.existing_ids(&[still.id]).await.unwrap().is_empty());

    let (rows, total) = media
        .list(&MediaFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(total, 0);
}
