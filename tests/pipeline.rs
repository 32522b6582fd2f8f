use repstress::{
    keys::{KeyPool, Selection},
    report::CsvReporter,
    Executor, LookupOutcome, OutcomeSet, PoolExecutor, Report, Reporter, ReputationClient,
    RunResult, RunStatistics, Scenario, Termination,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{header, method, path_regex},
    Mock, MockServer, ResponseTemplate,
};

fn scenario(server: &MockServer) -> Scenario<ReputationClient> {
    let client = ReputationClient::new(
        format!("{}/domain/ranking/{{}}", server.uri()),
        "under_stress",
        None,
    )
    .unwrap();
    Scenario::builder()
        .name("pipeline")
        .lookup(client)
        .keys(Arc::new(KeyPool::generated(Selection::Sequential)))
        .build()
}

#[tokio::test]
async fn run_summarize_and_export() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/domain/ranking/example[0-4]\.com$"))
        .and(header("Authorization", "Token under_stress"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"rank\": 1}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let executor = PoolExecutor::builder()
        .concurrency(3)
        .samples(10)
        .deadline(Duration::from_secs(30))
        .build();
    let run: RunResult<OutcomeSet> = executor
        .exec(&scenario(&server), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.termination, Termination::Completed);
    assert_eq!(run.outcomes.len(), 10);
    assert!(run
        .outcomes
        .iter()
        .all(|o| matches!(o, LookupOutcome::Success { .. } | LookupOutcome::HttpError { code: 500, .. })));

    let stats = RunStatistics::summarize(&run.outcomes, run.elapsed);
    assert_eq!(stats.total, 10);
    assert_eq!(stats.error_count, 5);
    assert_eq!(stats.error_rate, 0.5);
    assert!(stats.max_latency >= stats.p90_latency);
    assert!(stats.max_latency >= stats.mean_latency);

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("stress_test_results.csv");
    CsvReporter::new(&output)
        .report(&run.outcomes, &stats)
        .await
        .unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "elapsed_time,error");
    assert_eq!(lines.len(), 11);
    assert_eq!(lines.iter().filter(|l| l.ends_with(",500")).count(), 5);
}

#[tokio::test]
async fn slow_endpoint_hits_the_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let executor = PoolExecutor::builder()
        .concurrency(2)
        .samples(10)
        .deadline(Duration::from_millis(300))
        .build();
    let run: RunResult<OutcomeSet> = executor
        .exec(&scenario(&server), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.termination, Termination::TimedOut);
    assert!(run.outcomes.is_empty());
    assert!(run.elapsed < Duration::from_secs(5));

    let stats = RunStatistics::summarize(&run.outcomes, run.elapsed);
    assert_eq!(stats.total, 0);
    assert_eq!(stats.error_rate, 0.0);
}
