//! A web demo: rotates a cached web query through a set of URLs.
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use querycache_web::{HttpConfig, HttpMethod, HttpResponse, WebQuery};
use serde_json::Value;

/// The placeholder in URL templates that is replaced with the current id.
const ID_PLACEHOLDER: &str = "{id}";

/// Arguments of the `fetch` command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// The URL to fetch, with `{id}` replaced by each of the ids in turn.
    #[arg(default_value = "https://reqres.in/api/users/{id}")]
    pub url: String,

    /// The ids to rotate through.
    #[arg(long, value_delimiter = ',', default_value = "1,2,3")]
    pub ids: Vec<String>,

    /// The HTTP method to use.
    #[arg(long, default_value = "GET")]
    pub method: HttpMethod,

    /// The time between two requests.
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// The number of requests before exiting.
    #[arg(long, default_value_t = 9)]
    pub iterations: usize,
}

fn render_url(template: &str, id: &str) -> String {
    template.replace(ID_PLACEHOLDER, id)
}

pub async fn run(args: FetchArgs, http: &HttpConfig) -> Result<()> {
    fetch(http, &args, |uri, response, elapsed| {
        println!(
            "{} {uri} -> {} in {}",
            args.method,
            response.status_code,
            humantime::format_duration(elapsed)
        );
    })
    .await
}

/// Runs the demo, calling `report` with the time each request took.
pub async fn fetch<F>(http: &HttpConfig, args: &FetchArgs, mut report: F) -> Result<()>
where
    F: FnMut(&str, &HttpResponse<Value>, Duration),
{
    anyhow::ensure!(!args.ids.is_empty(), "at least one id is required");
    let client = http.client().context("failed to create the HTTP client")?;

    let first = render_url(&args.url, &args.ids[0]);
    let mut query = WebQuery::<(), Value>::with_client(
        client,
        first,
        args.method,
        None,
        &BTreeMap::new(),
    )?;

    let mut interval = tokio::time::interval(args.interval);
    for id in args.ids.iter().cycle().take(args.iterations) {
        interval.tick().await;
        query.uri = render_url(&args.url, id);

        let started = Instant::now();
        let response = query
            .get_result(false)
            .await
            .with_context(|| format!("failed to fetch {}", query.uri))?;
        report(&query.uri, &response, started.elapsed());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use querycache_test::{self as test, HitCounter};

    use super::*;

    #[test]
    fn test_render_url() {
        assert_eq!(
            render_url("https://example.com/users/{id}", "2"),
            "https://example.com/users/2"
        );
        assert_eq!(render_url("https://example.com/", "2"), "https://example.com/");
    }

    #[tokio::test]
    async fn test_rotating_ids_hit_the_cache() {
        test::setup();
        let server = HitCounter::new();

        let args = FetchArgs {
            url: server.url("/users/{id}"),
            ids: vec!["1".into(), "2".into(), "3".into()],
            method: HttpMethod::Get,
            interval: Duration::from_millis(1),
            iterations: 7,
        };

        let mut fetched = Vec::new();
        fetch(&HttpConfig::default(), &args, |_, response, _| {
            fetched.push(response.body["data"]["id"].as_u64().unwrap());
        })
        .await
        .unwrap();

        assert_eq!(fetched, [1, 2, 3, 1, 2, 3, 1]);
        assert_eq!(server.hits("/users/1"), 1);
        assert_eq!(server.hits("/users/2"), 1);
        assert_eq!(server.hits("/users/3"), 1);
    }

    #[tokio::test]
    async fn test_requires_ids() {
        let args = FetchArgs {
            url: "http://127.0.0.1:1/{id}".into(),
            ids: vec![],
            method: HttpMethod::Get,
            interval: Duration::from_millis(1),
            iterations: 1,
        };

        assert!(fetch(&HttpConfig::default(), &args, |_, _, _| {}).await.is_err());
    }
}
