mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use narration_pipeline::models::{ContentItem, ItemStatus, QuestionRecord, Stage};
use narration_pipeline::orchestrator::PAGE_SIZE;
use narration_pipeline::{App, BatchStats, Config, ContentStore, MemoryStore, WorkQueue};

use common::*;

async fn seed(store: &MemoryStore, prefix: &str, status: ItemStatus, count: usize, age_minutes: i64) {
    let now = Utc::now();
    for i in 0..count {
        let mut item = item_at(&format!("{}-{}", prefix, i), status);
        item.created_at = now - Duration::minutes(age_minutes + i as i64);
        store.insert_item(&item).await.unwrap();
    }
}

#[tokio::test]
async fn test_candidates_are_newest_first_and_capped() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "q", ItemStatus::ScriptReady, 12, 0).await;

    let queue = WorkQueue::new(store.clone());
    let items = queue.find_candidates(Stage::Audio).await.unwrap();

    assert_eq!(items.len(), PAGE_SIZE);
    assert!(items
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
    assert_eq!(items[0].source_question_id, "q-0");
}

#[tokio::test]
async fn test_candidates_follow_stage_preconditions() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, "created", ItemStatus::Created, 1, 0).await;
    seed(&store, "script", ItemStatus::ScriptReady, 2, 10).await;
    seed(&store, "audio", ItemStatus::AudioReady, 1, 20).await;
    seed(&store, "captions", ItemStatus::CaptionsReady, 1, 30).await;
    seed(&store, "pending", ItemStatus::RenderPending, 1, 40).await;
    seed(&store, "done", ItemStatus::VideoReady, 1, 50).await;

    let queue = WorkQueue::new(store.clone());

    let ids = |items: Vec<ContentItem>| {
        items
            .into_iter()
            .map(|item| item.source_question_id)
            .collect::<Vec<_>>()
    };

    assert_eq!(
        ids(queue.find_candidates(Stage::Script).await.unwrap()),
        vec!["created-0"]
    );
    assert_eq!(
        ids(queue.find_candidates(Stage::Audio).await.unwrap()),
        vec!["script-0", "script-1"]
    );
    assert_eq!(
        ids(queue.find_candidates(Stage::Captions).await.unwrap()),
        vec!["audio-0"]
    );
    assert_eq!(
        ids(queue.find_candidates(Stage::Video).await.unwrap()),
        vec!["captions-0", "pending-0"]
    );
}

#[tokio::test]
async fn test_inconsistent_rows_do_not_shorten_the_page() {
    let store = Arc::new(MemoryStore::new());
    // 最新的一页全是状态对、字段缺失的行
    let now = Utc::now();
    for i in 0..PAGE_SIZE {
        let mut item = ContentItem::new(format!("broken-{i}"), None);
        item.status = ItemStatus::ScriptReady;
        item.created_at = now - Duration::minutes(i as i64);
        store.insert_item(&item).await.unwrap();
    }
    seed(&store, "ok", ItemStatus::ScriptReady, 3, 60).await;

    let queue = WorkQueue::new(store.clone());
    let items = queue.find_candidates(Stage::Audio).await.unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.source_question_id.as_str()).collect();
    assert_eq!(ids, vec!["ok-0", "ok-1", "ok-2"]);
}

#[tokio::test]
async fn test_script_sources_cover_created_items_and_unused_questions() {
    let h = Harness::happy().await;
    h.store
        .add_question(QuestionRecord {
            used_in_video: Some("yes".to_string()),
            ..question("q-used")
        })
        .await;
    h.store
        .insert_item(&item_at("q-2", ItemStatus::Created))
        .await
        .unwrap();
    h.store
        .insert_item(&item_at("q-1", ItemStatus::ScriptReady))
        .await
        .unwrap();

    let queue = WorkQueue::new(h.store.clone());
    let sources = queue.find_script_sources().await.unwrap();

    assert_eq!(sources, vec!["q-2", "q-3"]);
}

#[tokio::test]
async fn test_script_sources_are_capped() {
    let store = Arc::new(MemoryStore::new());
    for i in 0..PAGE_SIZE + 3 {
        store.add_question(question(&format!("n-{i}"))).await;
    }

    let sources = WorkQueue::new(store.clone())
        .find_script_sources()
        .await
        .unwrap();

    assert_eq!(sources.len(), PAGE_SIZE);
    // 新登记的在前
    assert_eq!(sources[0], format!("n-{}", PAGE_SIZE + 2));
}

#[tokio::test]
async fn test_empty_queue_returns_nothing() {
    let queue = WorkQueue::new(Arc::new(MemoryStore::new()));
    for stage in Stage::ALL {
        assert!(queue.find_candidates(stage).await.unwrap().is_empty());
    }
}

fn app_for(h: &Harness) -> App {
    let config = Config {
        max_concurrent_items: 2,
        ..Config::default()
    };
    App::from_parts(config, h.flow())
}

#[tokio::test]
async fn test_batch_runs_every_candidate() {
    let h = Harness::happy().await;
    seed(&h.store, "q", ItemStatus::ScriptReady, 3, 0).await;

    let stats = app_for(&h).run_stage(Stage::Audio).await.unwrap();

    assert_eq!(
        stats,
        BatchStats {
            total: 3,
            success: 3,
            provisional: 0,
            failed: 0,
        }
    );
    assert_eq!(h.synthesizer.calls(), 3);
    let left = h
        .store
        .find_by_status(&[ItemStatus::ScriptReady], 10, 0)
        .await
        .unwrap();
    assert!(left.is_empty());
}

#[tokio::test]
async fn test_batch_counts_pending_renders_and_failures() {
    let h = Harness::new(
        FakeScriptGenerator::replying(SCRIPT),
        FakeSynthesizer::returning(vec![1]),
        FakeRenderer::placeholder_only(),
    )
    .await;
    seed(&h.store, "orphan", ItemStatus::CaptionsReady, 2, 0).await;

    let stats = app_for(&h).run_stage(Stage::Video).await.unwrap();
    // 题目未登记，渲染前取题目失败
    assert_eq!(stats.total, 2);
    assert_eq!(stats.failed, 2);

    let h = Harness::new(
        FakeScriptGenerator::replying(SCRIPT),
        FakeSynthesizer::returning(vec![1]),
        FakeRenderer::placeholder_only(),
    )
    .await;
    for id in ["q-1", "q-2"] {
        h.store
            .insert_item(&item_at(id, ItemStatus::CaptionsReady))
            .await
            .unwrap();
    }

    let stats = app_for(&h).run_stage(Stage::Video).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.provisional, 2);
    assert_eq!(stats.success, 0);
}

#[tokio::test]
async fn test_batch_script_picks_up_unused_questions() {
    let h = Harness::happy().await;
    let app = app_for(&h);

    let stats = app.run_stage(Stage::Script).await.unwrap();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.success, 3);
    assert_eq!(h.generator.calls(), 3);
    assert_eq!(h.store.item_count().await, 3);
    assert_eq!(app.candidates(Stage::Audio).await.unwrap().len(), 3);

    // 第二轮没有新题目
    assert_eq!(app.run_stage(Stage::Script).await.unwrap(), BatchStats::default());
    assert_eq!(h.generator.calls(), 3);
}

#[tokio::test]
async fn test_batch_with_no_candidates() {
    let h = Harness::happy().await;
    let stats = app_for(&h).run_stage(Stage::Captions).await.unwrap();
    assert_eq!(stats, BatchStats::default());
}

#[tokio::test]
async fn test_app_script_and_advance() {
    let h = Harness::happy().await;
    let app = app_for(&h);

    let report = app.script("q-3").await.unwrap();
    let reports = app.advance(report.item.id).await.unwrap();

    assert_eq!(reports.len(), 3);
    assert!(app.candidates(Stage::Video).await.unwrap().is_empty());
    assert_eq!(
        h.store.get_item(report.item.id).await.unwrap().status,
        ItemStatus::VideoReady
    );
}
