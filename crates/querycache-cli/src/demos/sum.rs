//! A networkless demo: a query summing numbers that are replaced at random on an interval.
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use querycache::{Query, Store};

/// Arguments of the `sum` command.
#[derive(Debug, Args)]
pub struct SumArgs {
    /// How often the numbers are replaced.
    #[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
    pub refresh_every: Duration,

    /// How often the sum is fetched.
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    pub fetch_every: Duration,

    /// The number of fetches before exiting.
    #[arg(long, default_value_t = 50)]
    pub iterations: usize,
}

/// A summary of a demo run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SumStats {
    /// Calls to the resolver.
    pub resolutions: usize,
    /// Changes of the query body.
    pub refreshes: usize,
    /// Calls to `get_result`.
    pub fetches: usize,
}

fn random_numbers() -> Vec<f64> {
    (0..3).map(|_| rand::random::<f64>() * 100.0).collect()
}

/// Registers the `sum` query, counting its resolver invocations in `resolutions`.
fn sum_query(
    store: &Store,
    resolutions: Arc<AtomicUsize>,
) -> Result<Query<Vec<f64>, f64, Infallible>> {
    let query = store.create_query(
        "sum",
        move |numbers: Vec<f64>| {
            resolutions.fetch_add(1, Ordering::Relaxed);
            async move { Ok(numbers.iter().sum()) }
        },
        random_numbers(),
    )?;
    Ok(query)
}

pub async fn run(args: SumArgs) -> Result<()> {
    let stats = sum(&args, |value, stats| {
        println!(
            "sum = {value:>7.2}  (fetches: {}, resolutions: {}, refreshes: {})",
            stats.fetches, stats.resolutions, stats.refreshes
        );
    })
    .await?;

    tracing::info!(
        fetches = stats.fetches,
        resolutions = stats.resolutions,
        refreshes = stats.refreshes,
        "Finished"
    );
    Ok(())
}

/// Runs the demo, calling `report` after every fetch.
pub async fn sum<F>(args: &SumArgs, mut report: F) -> Result<SumStats>
where
    F: FnMut(f64, &SumStats),
{
    let store = Store::new();
    let resolutions = Arc::new(AtomicUsize::new(0));
    let refreshes = Arc::new(AtomicUsize::new(0));
    let query = sum_query(&store, Arc::clone(&resolutions))?;

    let refresher = tokio::spawn({
        let query = query.clone();
        let refreshes = Arc::clone(&refreshes);
        let mut interval = tokio::time::interval(args.refresh_every);
        async move {
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                query.set_body(random_numbers());
                refreshes.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    let mut stats = SumStats::default();
    let mut interval = tokio::time::interval(args.fetch_every);
    for _ in 0..args.iterations {
        interval.tick().await;
        let value = query.get_result(false).await?;

        stats.fetches += 1;
        stats.resolutions = resolutions.load(Ordering::Relaxed);
        stats.refreshes = refreshes.load(Ordering::Relaxed);
        report(value, &stats);
    }

    refresher.abort();
    Ok(stats)
}
