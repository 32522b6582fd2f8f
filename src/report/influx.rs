//! Export to InfluxDB 2.x through its line protocol write API.

use reqwest::{header::AUTHORIZATION, Client, Url};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{Reporter, RunStatistics};
use crate::{
    aggregate::OutcomeSet,
    config::InfluxConfig,
    error::{ConfigError, ConfigResult, ReportError},
    metric::LookupOutcome,
};

pub const OUTCOME_MEASUREMENT: &str = "reputation_api_test";
pub const SUMMARY_MEASUREMENT: &str = "reputation_api_summary";
/// Bound on a single write unless overridden with [`InfluxReporter::with_timeout`].
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Writes every outcome as a point, plus one summary point, in a single request.
///
/// Outcomes have no timestamp of their own, so point `i` is stamped
/// `now + i` nanoseconds. Points sharing series and timestamp would otherwise
/// overwrite each other.
#[derive(Clone, Debug)]
pub struct InfluxReporter {
    http: Client,
    write_url: Url,
    token: String,
    timeout: Duration,
}

impl InfluxReporter {
    pub fn new(config: &InfluxConfig) -> ConfigResult<Self> {
        let mut write_url = Url::parse(&config.url)
            .map_err(|e| ConfigError::ValidationError(format!("influxdb.url: {e}")))?;
        // Appended, so a path prefix in front of the API survives.
        write_url
            .path_segments_mut()
            .map_err(|()| {
                ConfigError::ValidationError(format!("influxdb.url: {} is not a base URL", config.url))
            })?
            .pop_if_empty()
            .extend(["api", "v2", "write"]);
        write_url
            .query_pairs_mut()
            .append_pair("org", &config.org)
            .append_pair("bucket", &config.bucket)
            .append_pair("precision", "ns");

        Ok(Self {
            http: Client::builder().build()?,
            write_url,
            token: config.token.clone(),
            timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Render outcomes and summary as line protocol.
    pub fn line_protocol(outcomes: &OutcomeSet, stats: &RunStatistics, timestamp: u128) -> String {
        let points = outcomes.iter().zip(timestamp..).map(|(outcome, ts)| {
            format!(
                "{OUTCOME_MEASUREMENT},status={} elapsed_time={},error=\"{}\" {ts}\n",
                status_tag(outcome),
                outcome.latency().map(|l| l.as_secs_f64()).unwrap_or(0.0),
                escape_field(outcome.error().as_deref().unwrap_or("None")),
            )
        });
        let summary = format!(
            "{SUMMARY_MEASUREMENT} total={}i,errors={}i,error_rate={},mean_latency={},\
             max_latency={},p90_latency={},wall_clock={} {}\n",
            stats.total,
            stats.error_count,
            stats.error_rate,
            stats.mean_latency.as_secs_f64(),
            stats.max_latency.as_secs_f64(),
            stats.p90_latency.as_secs_f64(),
            stats.wall_clock.as_secs_f64(),
            timestamp + outcomes.len() as u128,
        );
        points.chain(std::iter::once(summary)).collect()
    }
}

fn status_tag(outcome: &LookupOutcome) -> &'static str {
    match outcome {
        LookupOutcome::Success { .. } => "success",
        LookupOutcome::HttpError { .. } => "http_error",
        LookupOutcome::TransportError { .. } => "transport_error",
    }
}

fn escape_field(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

impl Reporter<OutcomeSet, RunStatistics> for InfluxReporter {
    async fn report(&self, aggregate: &OutcomeSet, report: &RunStatistics) -> Result<(), ReportError> {
        let body = Self::line_protocol(aggregate, report, now_nanos());
        let response = self
            .http
            .post(self.write_url.clone())
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!("Wrote {} points to InfluxDB", aggregate.len() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Report;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_string_contains, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn config(url: String) -> InfluxConfig {
        InfluxConfig {
            url,
            token: "secret".to_string(),
            org: "acme".to_string(),
            bucket: "stress_test_bucket".to_string(),
        }
    }

    fn outcomes() -> OutcomeSet {
        [
            LookupOutcome::success(Duration::from_millis(250)),
            LookupOutcome::http_error(500, Duration::from_millis(500)),
            LookupOutcome::transport_error("bad \"gateway\""),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn renders_line_protocol() {
        let outcomes = outcomes();
        let stats = RunStatistics::summarize(&outcomes, Duration::from_secs(2));

        let body = InfluxReporter::line_protocol(&outcomes, &stats, 100);
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(
            lines,
            [
                "reputation_api_test,status=success elapsed_time=0.25,error=\"None\" 100",
                "reputation_api_test,status=http_error elapsed_time=0.5,error=\"500\" 101",
                "reputation_api_test,status=transport_error elapsed_time=0,error=\"bad \\\"gateway\\\"\" 102",
                "reputation_api_summary total=3i,errors=2i,error_rate=0.6666666666666666,\
                 mean_latency=0.375,max_latency=0.5,p90_latency=0.5,wall_clock=2 103",
            ]
        );
    }

    #[test]
    fn write_url_carries_org_and_bucket() {
        let reporter = InfluxReporter::new(&config("http://localhost:8086".into())).unwrap();
        assert_eq!(
            reporter.write_url.as_str(),
            "http://localhost:8086/api/v2/write?org=acme&bucket=stress_test_bucket&precision=ns"
        );
    }

    #[test]
    fn write_url_keeps_path_prefix() {
        for base in ["http://proxy:8080/influxdb", "http://proxy:8080/influxdb/"] {
            let reporter = InfluxReporter::new(&config(base.into())).unwrap();
            assert_eq!(
                reporter.write_url.as_str(),
                "http://proxy:8080/influxdb/api/v2/write?org=acme&bucket=stress_test_bucket&precision=ns"
            );
        }
    }

    #[tokio::test]
    async fn unresponsive_database_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let outcomes = outcomes();
        let stats = RunStatistics::summarize(&outcomes, Duration::from_secs(1));
        let err = InfluxReporter::new(&config(server.uri()))
            .unwrap()
            .with_timeout(Duration::from_millis(100))
            .report(&outcomes, &stats)
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Http(ref e) if e.is_timeout()), "{err}");
    }

    #[tokio::test]
    async fn posts_points_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/write"))
            .and(query_param("org", "acme"))
            .and(query_param("bucket", "stress_test_bucket"))
            .and(query_param("precision", "ns"))
            .and(header("Authorization", "Token secret"))
            .and(body_string_contains("reputation_api_summary total=3i"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let outcomes = outcomes();
        let stats = RunStatistics::summarize(&outcomes, Duration::from_secs(1));
        InfluxReporter::new(&config(server.uri()))
            .unwrap()
            .report(&outcomes, &stats)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_write_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized access"))
            .mount(&server)
            .await;

        let outcomes = outcomes();
        let stats = RunStatistics::summarize(&outcomes, Duration::from_secs(1));
        let err = InfluxReporter::new(&config(server.uri()))
            .unwrap()
            .report(&outcomes, &stats)
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Rejected { status: 401, .. }));
    }
}
