//! Full curation cycles over fixture feeds with scripted generation and a
//! recording outbound channel.

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use common::{good_draft, now, FixtureFeeds, StaticPages, REVIEW_OK};
use feed_curator::ai_adapter::ScriptedBackend;
use feed_curator::compose::lint::LintChecker;
use feed_curator::compose::review::ReviewGate;
use feed_curator::compose::Composer;
use feed_curator::config::{AppConfig, FeedConfig};
use feed_curator::ingest::types::{Category, ItemDetail};
use feed_curator::ingest::SourceClients;
use feed_curator::notify::{ChannelMux, MessageKind, Publisher, RecordingPublisher};
use feed_curator::{CursorStore, DraftRecord, DraftStore, Pipeline};

const ACME: &str = "https://acme.example/feed.xml";
const COMMUNITY: &str = "https://community.example/atom.xml";

fn config() -> AppConfig {
    AppConfig {
        feeds: vec![
            FeedConfig {
                url: ACME.into(),
                name: "Acme Blog".into(),
                priority_bonus: 1000,
                official: true,
                must_include: false,
            },
            FeedConfig {
                url: COMMUNITY.into(),
                name: "Community Digest".into(),
                priority_bonus: 0,
                official: false,
                must_include: false,
            },
        ],
        ..AppConfig::default()
    }
}

struct Harness {
    cfg: AppConfig,
    feeds: FixtureFeeds,
    pages: StaticPages,
    generation: Arc<ScriptedBackend>,
    review: Arc<ScriptedBackend>,
    channel: Arc<RecordingPublisher>,
}

impl Harness {
    fn new(drafts: Vec<String>, reviews: usize) -> Self {
        Self {
            cfg: config(),
            feeds: FixtureFeeds::default()
                .with(ACME, "acme_blog.xml")
                .with(COMMUNITY, "community_atom.xml"),
            pages: StaticPages::default(),
            generation: Arc::new(ScriptedBackend::texts(drafts)),
            review: Arc::new(ScriptedBackend::texts(vec![REVIEW_OK; reviews])),
            channel: Arc::new(RecordingPublisher::default()),
        }
    }

    fn composer(&self) -> Composer {
        Composer::new(
            &self.cfg.compose,
            self.generation.clone(),
            LintChecker::builtin(),
            ReviewGate::new(Some(self.review.clone()), true, true),
        )
    }

    fn mux(&self) -> ChannelMux {
        let channel: Arc<dyn Publisher> = self.channel.clone();
        ChannelMux::new(vec![channel], StdDuration::ZERO)
    }

    fn clients(&self) -> SourceClients<'_> {
        SourceClients {
            stream: None,
            feeds: &self.feeds,
            pages: &self.pages,
        }
    }
}

fn draft_for<'a>(drafts: &'a DraftStore, url: &str) -> Option<&'a DraftRecord> {
    drafts.all().iter().find(|d| d.item.canonical_url == url)
}

#[tokio::test]
async fn official_practical_release_scores_2200_and_becomes_a_draft() {
    let h = Harness::new(vec![good_draft("Acme API v2.0"), good_draft("Streaming latency")], 2);
    let (composer, mux) = (h.composer(), h.mux());
    let pipeline = Pipeline::new(&h.cfg, h.clients(), &composer, &mux);

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let mut cursors = CursorStore::load(&state_path).unwrap();
    let mut drafts = DraftStore::load(dir.path().join("drafts.json")).unwrap();

    let report = pipeline.run_cycle(&mut cursors, &mut drafts, now()).await.unwrap();

    // the roundup is older than the 24h cutoff
    assert_eq!(report.collected.feed_too_old, 1);
    assert_eq!(report.selected, 2);
    assert_eq!(report.drafts_created.len(), 2);

    let acme = draft_for(&drafts, "https://acme.example/blog/api-v2").expect("acme draft");
    assert_eq!(acme.item.raw_score, 1500);
    assert_eq!(acme.item.category, Category::Practical);
    assert_eq!(acme.item.score, 2200);
    assert!(matches!(&acme.item.detail, ItemDetail::Feed { feed_name, .. } if feed_name == "Acme Blog"));

    // the higher-priority feed is drafted first
    assert_eq!(drafts.all()[0].id, acme.id);

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.kind == MessageKind::Review));
    assert_eq!(h.review.call_count(), 2);

    // both documents hit the disk
    let reloaded = CursorStore::load(&state_path).unwrap();
    assert!(reloaded.has_feed_cursor(ACME));
    assert!(reloaded.is_recently_posted("https://acme.example/blog/api-v2"));
    assert_eq!(reloaded.last_run_at(), Some(now()));
    assert_eq!(DraftStore::load(dir.path().join("drafts.json")).unwrap().all().len(), 2);
}

#[tokio::test]
async fn second_cycle_only_drafts_the_new_feed_entry() {
    let h = Harness::new(
        vec![
            good_draft("Acme API v2.0"),
            good_draft("Streaming latency"),
            good_draft("Acme Slack integration"),
        ],
        3,
    );
    let (composer, mux) = (h.composer(), h.mux());
    let pipeline = Pipeline::new(&h.cfg, h.clients(), &composer, &mux);
    let mut cursors = CursorStore::in_memory();
    let mut drafts = DraftStore::in_memory();

    pipeline.run_cycle(&mut cursors, &mut drafts, now()).await.unwrap();
    h.feeds.set(ACME, "acme_blog_next.xml");
    let second = pipeline
        .run_cycle(&mut cursors, &mut drafts, now() + Duration::minutes(30))
        .await
        .unwrap();

    assert_eq!(second.collected.feed_already_seen, 3);
    assert_eq!(second.drafts_created.len(), 1);
    let newest = drafts.all().last().unwrap();
    assert_eq!(newest.item.canonical_url, "https://acme.example/blog/slack-integration");
    assert_eq!(h.generation.call_count(), 3);
}

#[tokio::test]
async fn drafts_inside_lookback_window_suppress_the_story() {
    let h = Harness::new(vec![good_draft("Streaming latency")], 1);
    let (composer, mux) = (h.composer(), h.mux());
    let pipeline = Pipeline::new(&h.cfg, h.clients(), &composer, &mux);

    // an earlier process drafted the same story two days ago; cursor state was lost
    let mut drafts = DraftStore::in_memory();
    let earlier = DraftRecord::new(
        feed_curator::ingest::types::CandidateItem {
            canonical_url: "http://www.acme.example/blog/api-v2/".into(),
            ..sample_item()
        },
        good_draft("Acme API v2.0"),
        now() - Duration::days(2),
    );
    drafts.append(earlier);
    let mut cursors = CursorStore::in_memory();

    let report = pipeline.run_cycle(&mut cursors, &mut drafts, now()).await.unwrap();
    assert_eq!(report.lookback_duplicates, 1);
    assert_eq!(report.drafts_created.len(), 1);
    assert_eq!(
        drafts.all().last().unwrap().item.canonical_url,
        "https://community.example/posts/streaming-latency"
    );
}

#[tokio::test]
async fn failing_feed_is_skipped_without_touching_its_cursor() {
    let h = Harness::new(vec![good_draft("Acme API v2.0")], 1);
    let feeds = FixtureFeeds::default().with(ACME, "acme_blog.xml");
    let (composer, mux) = (h.composer(), h.mux());
    let clients = SourceClients {
        stream: None,
        feeds: &feeds,
        pages: &h.pages,
    };
    let pipeline = Pipeline::new(&h.cfg, clients, &composer, &mux);
    let mut cursors = CursorStore::in_memory();
    let mut drafts = DraftStore::in_memory();

    let report = pipeline.run_cycle(&mut cursors, &mut drafts, now()).await.unwrap();
    assert_eq!(report.collected.source_errors, 1);
    assert!(cursors.has_feed_cursor(ACME));
    assert!(!cursors.has_feed_cursor(COMMUNITY));
    assert_eq!(report.drafts_created.len(), 1);
}

#[tokio::test]
async fn generation_failure_skips_candidate_and_run_continues() {
    // one scripted answer for two candidates: the second call runs dry
    let h = Harness::new(vec![good_draft("Acme API v2.0")], 1);
    let (composer, mux) = (h.composer(), h.mux());
    let pipeline = Pipeline::new(&h.cfg, h.clients(), &composer, &mux);
    let mut cursors = CursorStore::in_memory();
    let mut drafts = DraftStore::in_memory();

    let report = pipeline.run_cycle(&mut cursors, &mut drafts, now()).await.unwrap();
    assert_eq!(report.compose_errors, 1);
    assert_eq!(report.drafts_created.len(), 1);
    assert_eq!(cursors.last_run_at(), Some(now()));
}

#[tokio::test]
async fn cursor_write_failure_fails_the_run() {
    let h = Harness::new(vec![good_draft("Acme API v2.0"), good_draft("Streaming latency")], 2);
    let (composer, mux) = (h.composer(), h.mux());
    let pipeline = Pipeline::new(&h.cfg, h.clients(), &composer, &mux);

    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let mut cursors = CursorStore::load(&state_path).unwrap();
    // a directory where the document should go makes the final rename fail
    std::fs::create_dir(&state_path).unwrap();
    let mut drafts = DraftStore::in_memory();

    let err = pipeline
        .run_cycle(&mut cursors, &mut drafts, now())
        .await
        .expect_err("cursor save must fail");
    assert!(format!("{err:#}").contains("saving cursor state"));
}

fn sample_item() -> feed_curator::ingest::types::CandidateItem {
    use feed_curator::ingest::types::{CandidateItem, SourceKind};
    CandidateItem {
        source: SourceKind::Feed,
        title: "Acme releases API v2.0 with breaking changes".into(),
        canonical_url: String::new(),
        published_at: now(),
        raw_score: 1500,
        score: 2200,
        category: Category::Practical,
        detail: ItemDetail::Feed {
            feed_url: ACME.into(),
            feed_name: "Acme Blog".into(),
            summary: String::new(),
            official: true,
        },
    }
}
