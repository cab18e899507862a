//! Repository change flowing through sync, overlay and invalidation

use chrono::Duration;
use glossa_cache::{conditional, CachePolicy};
use glossa_core::SourceHash;
use glossa_overlay::{AuditAction, OverlayStatus, ReconcileStatus};
use glossa_service::{ProjectConfig, ServiceContext, Submission, TranslationService};
use glossa_test_utils::{json_file, manual_clock, seeded_repository, REPOSITORY};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn greeting(value: &str) -> Submission {
    Submission {
        language: "ja".into(),
        filename: "common.json".into(),
        key: "greeting".into(),
        value: value.into(),
        source_hash: None,
    }
}

#[tokio::test]
async fn source_change_invalidates_approved_edits() {
    let repo = seeded_repository(&[("greeting", "Hello")], &[("farewell", "さようなら")]);
    let clock = manual_clock();
    let ctx = ServiceContext::in_memory(clock.clone()).with_project(ProjectConfig::new("site", REPOSITORY), repo.clone());
    let service = TranslationService::new(Arc::new(ctx));
    let h1 = SourceHash::of("Hello");
    let h2 = SourceHash::of("Hello there");

    let first = service.sync_service().sync("site").await.unwrap();
    assert!(first.is_complete());
    let manifest = service.manifest("site").await.unwrap();
    assert!(manifest.find_entry("en", "common.json").is_some());
    assert!(manifest.find_entry("ja", "common.json").is_some());

    // pending edit against h1
    clock.advance(Duration::seconds(1));
    let pending = service.submit("site", greeting("こんにちは"), "u1").await.unwrap();
    assert_eq!(pending.source_hash_at_submission, h1);
    assert!(pending.is_valid);

    let views = service.reconciled("site", "ja", "common.json").await.unwrap().unwrap();
    let row = views.iter().find(|v| v.key == "greeting").unwrap();
    assert_eq!(row.status, ReconcileStatus::OverlayPending);
    assert_eq!(row.selected_overlay_entry_id.as_deref(), Some(pending.id.as_str()));

    // approved edit against h1
    clock.advance(Duration::seconds(1));
    let approved = service.submit("site", greeting("やあ"), "u2").await.unwrap();
    service.approve("site", &approved.id, "reviewer").await.unwrap();

    let views = service.reconciled("site", "ja", "common.json").await.unwrap().unwrap();
    let row = views.iter().find(|v| v.key == "greeting").unwrap();
    assert_eq!(row.status, ReconcileStatus::OverlayApproved);
    assert_eq!(row.overlay_value.as_deref(), Some("やあ"));

    // source changes h1 -> h2
    clock.advance(Duration::seconds(1));
    let en = json_file(&[("greeting", "Hello there")]);
    repo.commit_files(&[("locales/en/common.json", en.as_str())]);
    let second = service.sync_service().sync("site").await.unwrap();
    assert_eq!(second.invalidated, 1);
    assert_ne!(second.revision, first.revision);

    let entries = service
        .entries(&glossa_overlay::OverlayFilter::project("site").with_status(OverlayStatus::Approved))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].is_valid);

    let history = service.history("site", &approved.id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.action, AuditAction::Invalidated);
    assert_eq!(last.previous_hash, Some(h1));
    assert_eq!(last.new_hash, Some(h2));

    // a fresh edit against h2 is valid
    let fresh = service.submit("site", greeting("こんにちは！"), "u3").await.unwrap();
    assert_eq!(fresh.source_hash_at_submission, h2);
    assert!(fresh.is_valid);

    // nothing left to invalidate
    let third = service.sync_service().sync("site").await.unwrap();
    assert_eq!(third.invalidated, 0);
}

#[tokio::test]
async fn current_etag_revalidates_to_not_modified() {
    let repo = seeded_repository(&[("greeting", "Hello")], &[("greeting", "こんにちは")]);
    let clock = manual_clock();
    let ctx = ServiceContext::in_memory(clock.clone()).with_project(ProjectConfig::new("site", REPOSITORY), repo.clone());
    let service = TranslationService::new(Arc::new(ctx));
    service.sync_service().sync("site").await.unwrap();

    let etag = service.file_etag("site", "ja", "common.json").await.unwrap().unwrap();
    let payload = service.file("site", "ja", "common.json").await.unwrap().unwrap();
    let outcome = conditional(Some(etag.as_str()), Some(etag.clone()), CachePolicy::FilePayload, payload);
    assert!(outcome.is_not_modified());

    clock.advance(Duration::seconds(5));
    let ja = json_file(&[("greeting", "やあ")]);
    repo.commit_files(&[("locales/ja/common.json", ja.as_str())]);
    service.sync_service().sync("site").await.unwrap();

    let next = service.file_etag("site", "ja", "common.json").await.unwrap().unwrap();
    assert_ne!(etag, next);
    let payload = service.file("site", "ja", "common.json").await.unwrap().unwrap();
    assert_eq!(payload.key_values["greeting"], "やあ");
}
