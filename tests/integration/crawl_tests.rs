//! End-to-end crawl tests
//!
//! Each test serves a tiny archive site from a mock server: a start page
//! linking to two monthly archive pages, one of which no longer exists.

use crate::common::{archive_page, create_test_config, read_lines, ArticleFixture};
use archive_harvest::crawler::{crawl, Coordinator, CrawlPhase, Fetcher, StepOutcome};
use archive_harvest::extract::{Post, WordPressExtractor};
use archive_harvest::output::{CrawlStats, OutputError, OutputResult, PostSink, PostWriter};
use archive_harvest::state::{CrawlState, JsonStore, StateError, VisitedKey};
use archive_harvest::HarvestError;
use std::fs;
use std::io;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MARCH: ArticleFixture<'static> = ArticleFixture {
    id: "post-7",
    title: "Spring cleaning",
    published: "2019-03-01T09:30:00+00:00",
};

/// Mounts the start page, the March 2019 page, and a missing February 2018 page
///
/// With `march_failures > 0` the March page answers 503 that many times first.
async fn mount_site(mock_server: &MockServer, march_failures: u64) {
    Mock::given(method("GET"))
        .and(path("/blog/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(archive_page(&[], &["/?m=201903", "/?m=201802"]))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(mock_server)
        .await;

    if march_failures > 0 {
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("m", "201903"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(march_failures)
            .expect(march_failures)
            .mount(mock_server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("m", "201903"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(archive_page(
                    &[MARCH],
                    &["/blog/", "/?m=201802", "/?m=201903"],
                ))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("m", "201802"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_with_retries_and_not_found() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server, 4).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/blog/", base_url), dir.path());
    let output = config.output.clone();

    let mut coordinator = Coordinator::new(config, false).unwrap();
    let phase = coordinator.run().await.unwrap();
    assert_eq!(phase, CrawlPhase::Draining);

    let missing = format!("{}/?m=201802", base_url);

    let state = coordinator.state();
    assert!(state.pending().is_empty());
    assert_eq!(state.visited().len(), 2);
    assert!(state.is_visited(&VisitedKey::from("201903")));
    assert_eq!(state.failed_permanently(), &[missing.clone()]);
    assert!(state.abandoned().is_empty());

    let stats = coordinator.stats();
    assert_eq!(stats.total_count(), 1);
    assert_eq!(stats.counts_by_year().get("2019"), Some(&1));
    assert_eq!(stats.records()[0].title, "Spring cleaning");

    // What is on disk matches what is in memory
    let persisted = JsonStore::<CrawlState>::new(&output.state_path)
        .load()
        .unwrap();
    assert_eq!(&persisted, coordinator.state());
    let persisted = JsonStore::<CrawlStats>::new(&output.stats_path)
        .load()
        .unwrap();
    assert_eq!(&persisted, coordinator.stats());

    let report = read_lines(&output.report_path);
    assert_eq!(report[0], "2019, 1 posts");
    assert_eq!(report[1], "");
    assert_eq!(report[2], "2019-03-01 09:30 Spring cleaning");

    assert_eq!(read_lines(&output.errors_path), vec![missing]);
    assert!(read_lines(&output.abandoned_path).is_empty());

    let post_files: Vec<String> = fs::read_dir(&output.posts_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(post_files.len(), 2);
    assert!(post_files.contains(&"2019-03-01-post-7-Spring_cleaning.md".to_string()));
    assert!(post_files.contains(&"2019-03-01-post-7-Spring_cleaning.html".to_string()));
}

#[tokio::test]
async fn test_step_outcomes() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server, 0).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/blog/", base_url), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();

    assert_eq!(
        coordinator.step().await.unwrap(),
        StepOutcome::Processed {
            url: format!("{}/blog/", base_url),
            posts: 0,
            new_links: 2,
        }
    );

    // Links back to the start page, to itself, and to a pending page add nothing
    assert_eq!(
        coordinator.step().await.unwrap(),
        StepOutcome::Processed {
            url: format!("{}/?m=201903", base_url),
            posts: 1,
            new_links: 0,
        }
    );

    assert_eq!(
        coordinator.step().await.unwrap(),
        StepOutcome::NotFound {
            url: format!("{}/?m=201802", base_url),
        }
    );

    assert_eq!(coordinator.step().await.unwrap(), StepOutcome::Drained);
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_run() {
    // Uninterrupted reference run
    let reference_server = MockServer::start().await;
    mount_site(&reference_server, 0).await;
    let reference_dir = TempDir::new().unwrap();
    let reference_config = create_test_config(
        &format!("{}/blog/", reference_server.uri()),
        reference_dir.path(),
    );
    let mut reference = Coordinator::new(reference_config, false).unwrap();
    assert_eq!(reference.run().await.unwrap(), CrawlPhase::Draining);

    // One step per process; every page is still fetched exactly once
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, 0).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/blog/", mock_server.uri()), dir.path());

    let mut passes = 0;
    let resumed = loop {
        passes += 1;
        assert!(passes <= 10, "crawl did not converge");

        let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
        if coordinator.run_steps(1).await.unwrap() == CrawlPhase::Draining {
            break coordinator;
        }
    };

    assert_eq!(passes, 3);
    assert_eq!(resumed.stats(), reference.stats());
    assert_eq!(
        resumed.state().visited().len(),
        reference.state().visited().len()
    );
    assert_eq!(
        resumed.state().failed_permanently().len(),
        reference.state().failed_permanently().len()
    );
}

#[tokio::test]
async fn test_step_limit_suspends() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/blog/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(archive_page(&[], &["/?m=201903"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/blog/", base_url), dir.path());
    let output = config.output.clone();

    let mut coordinator = Coordinator::new(config, false).unwrap();
    assert_eq!(coordinator.phase(), CrawlPhase::Idle);
    assert_eq!(coordinator.run_steps(1).await.unwrap(), CrawlPhase::Suspended);
    assert_eq!(coordinator.phase(), CrawlPhase::Suspended);

    let persisted = JsonStore::<CrawlState>::new(&output.state_path)
        .load()
        .unwrap();
    let pending: Vec<&String> = persisted.pending().iter().collect();
    assert_eq!(pending, vec![&format!("{}/?m=201903", base_url)]);
}

#[tokio::test]
async fn test_corrupt_state_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("http://127.0.0.1:9/blog/", dir.path());
    let state_path = config.output.state_path.clone();

    fs::write(&state_path, "{\"urls_to_crawl\": [\"http://").unwrap();

    let result = Coordinator::new(config, false);
    assert!(matches!(
        result,
        Err(HarvestError::State(StateError::Corrupt { .. }))
    ));

    // The file is left for the operator to inspect
    assert_eq!(
        fs::read_to_string(&state_path).unwrap(),
        "{\"urls_to_crawl\": [\"http://"
    );
}

#[tokio::test]
async fn test_inconsistent_stats_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("http://127.0.0.1:9/blog/", dir.path());

    fs::write(
        &config.output.stats_path,
        r#"{"articles_per_year": {"2019": 2}, "total_articles": 5, "articles": []}"#,
    )
    .unwrap();

    let result = Coordinator::new(config, false);
    assert!(matches!(
        result,
        Err(HarvestError::State(StateError::Inconsistent { .. }))
    ));
}

#[tokio::test]
async fn test_requeue_ceiling_abandons_url() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/blog/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(archive_page(&[], &["/?m=201903"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Initial pass plus two re-queues
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("m", "201903"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&format!("{}/blog/", base_url), dir.path());
    config.retry.max_attempts = 1;
    config.crawler.max_requeues = 2;
    let output = config.output.clone();

    let mut coordinator = Coordinator::new(config, false).unwrap();

    let mut outcomes = Vec::new();
    loop {
        match coordinator.step().await.unwrap() {
            StepOutcome::Drained => break,
            outcome => outcomes.push(outcome),
        }
    }

    let stuck = format!("{}/?m=201903", base_url);
    assert_eq!(
        &outcomes[1..],
        &[
            StepOutcome::Requeued {
                url: stuck.clone(),
                requeues: 1
            },
            StepOutcome::Requeued {
                url: stuck.clone(),
                requeues: 2
            },
            StepOutcome::Abandoned { url: stuck.clone() },
        ]
    );

    assert_eq!(coordinator.state().abandoned(), &[stuck.clone()]);
    assert!(coordinator.state().pending().is_empty());
    assert_eq!(read_lines(&output.abandoned_path), vec![stuck]);
}

#[tokio::test]
async fn test_existing_state_file_resumes_and_skips_duplicates() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let march = format!("{}/?m=201903", base_url);
    let march_alias = format!("{}/?m=201903&utm_source=feed", base_url);

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("m", "201903"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(archive_page(&[MARCH], &["/?m=201903"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/blog/", base_url), dir.path());

    // A state file without the newer optional fields
    fs::write(
        &config.output.state_path,
        format!(
            r#"{{"urls_to_crawl": ["{}", "{}"], "crawled_urls": ["201812"], "errors_404": []}}"#,
            march, march_alias
        ),
    )
    .unwrap();

    let mut coordinator = Coordinator::new(config, false).unwrap();
    assert_eq!(coordinator.state().pending().len(), 2);

    assert!(matches!(
        coordinator.step().await.unwrap(),
        StepOutcome::Processed { posts: 1, new_links: 0, .. }
    ));
    assert_eq!(
        coordinator.step().await.unwrap(),
        StepOutcome::Skipped { url: march_alias }
    );
    assert_eq!(coordinator.step().await.unwrap(), StepOutcome::Drained);
    assert_eq!(coordinator.state().visited().len(), 2);
}

#[tokio::test]
async fn test_fresh_start_discards_previous_state() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server, 0).await;

    let dir = TempDir::new().unwrap();
    let start_url = format!("{}/blog/", base_url);
    let config = create_test_config(&start_url, dir.path());

    let phase = crawl(config.clone(), "abc123", false).await.unwrap();
    assert_eq!(phase, CrawlPhase::Draining);

    let persisted = JsonStore::<CrawlState>::new(&config.output.state_path)
        .load()
        .unwrap();
    assert_eq!(persisted.config_hash(), Some("abc123"));
    assert_eq!(persisted.visited().len(), 2);

    let coordinator = Coordinator::new(config, true).unwrap();
    let pending: Vec<&String> = coordinator.state().pending().iter().collect();
    assert_eq!(pending, vec![&start_url]);
    assert!(coordinator.state().visited().is_empty());
    assert_eq!(coordinator.stats().total_count(), 0);
}

#[tokio::test]
async fn test_drained_crawl_does_not_refetch() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, 0).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/blog/", mock_server.uri()), dir.path());

    let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
    assert_eq!(coordinator.run().await.unwrap(), CrawlPhase::Draining);
    assert_eq!(coordinator.run().await.unwrap(), CrawlPhase::Draining);

    // A new process over the finished state has nothing to do either
    let mut restarted = Coordinator::new(config, false).unwrap();
    assert_eq!(restarted.run().await.unwrap(), CrawlPhase::Draining);
    assert_eq!(restarted.stats().total_count(), 1);
}

/// Post writer that fails its first `failures` emissions
struct FailingSink {
    inner: PostWriter,
    failures: usize,
}

impl PostSink for FailingSink {
    fn emit(&mut self, post: &Post) -> OutputResult<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(OutputError::Write {
                path: "blog_posts".into(),
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.emit(post)
    }
}

/// Mounts the start page and the March 2019 page, expecting `march_fetches` requests for March
async fn mount_two_pages(mock_server: &MockServer, march_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/blog/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(archive_page(&[], &["/?m=201903"])),
        )
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("m", "201903"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(archive_page(&[MARCH], &[])),
        )
        .expect(march_fetches)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_failed_step_keeps_url_pending() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_two_pages(&mock_server, 2).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/blog/", base_url), dir.path());
    let output = config.output.clone();

    let fetcher = Fetcher::from_config(&config).unwrap();
    let extractor = WordPressExtractor::new(&config.extract).unwrap();
    let sink = FailingSink {
        inner: PostWriter::new(&config.output.posts_dir).unwrap(),
        failures: 1,
    };
    let mut coordinator =
        Coordinator::with_collaborators(config, fetcher, Box::new(extractor), Box::new(sink))
            .unwrap();

    assert!(matches!(
        coordinator.step().await.unwrap(),
        StepOutcome::Processed { posts: 0, .. }
    ));

    let march = format!("{}/?m=201903", base_url);
    let result = coordinator.step().await;
    assert!(matches!(result, Err(HarvestError::Output(_))));

    // Back at the head of the frontier, nothing counted
    assert_eq!(coordinator.state().pending().front(), Some(&march));
    assert_eq!(coordinator.stats().total_count(), 0);

    assert_eq!(
        coordinator.step().await.unwrap(),
        StepOutcome::Processed {
            url: march,
            posts: 1,
            new_links: 0,
        }
    );
    assert_eq!(coordinator.step().await.unwrap(), StepOutcome::Drained);

    let persisted = JsonStore::<CrawlState>::new(&output.state_path)
        .load()
        .unwrap();
    assert!(persisted.is_visited(&VisitedKey::from("201903")));
    assert_eq!(coordinator.stats().total_count(), 1);
}

#[tokio::test]
async fn test_page_replayed_after_partial_save_is_counted_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_two_pages(&mock_server, 2).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&format!("{}/blog/", base_url), dir.path());
    let output = config.output.clone();

    let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
    coordinator.step().await.unwrap();
    let state_before = fs::read_to_string(&output.state_path).unwrap();
    coordinator.step().await.unwrap();
    assert_eq!(coordinator.stats().total_count(), 1);
    drop(coordinator);

    // Stats were written but the state rename never happened
    fs::write(&output.state_path, state_before).unwrap();

    let mut resumed = Coordinator::new(config, false).unwrap();
    assert_eq!(resumed.state().pending().len(), 1);
    assert_eq!(resumed.run().await.unwrap(), CrawlPhase::Draining);

    assert_eq!(resumed.stats().total_count(), 1);
    assert_eq!(resumed.stats().counts_by_year().get("2019"), Some(&1));
    assert_eq!(resumed.stats().records().len(), 1);
    assert_eq!(read_lines(&output.report_path)[0], "2019, 1 posts");
}
