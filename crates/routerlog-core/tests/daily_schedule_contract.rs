//! Contract Test: Daily Task Schedule
//!
//! Verifies that a cycle always collects traffic and runs the daily tasks
//! only in the configured hour.
//!
//! Constraints verified:
//! - Lease URLs are not fetched outside the daily hour
//! - No sweep runs outside the daily hour
//! - In the daily hour, traffic is collected before leases

mod common;

use common::*;
use routerlog_core::store::MemoryUsageStore;
use routerlog_core::Collector;

fn collector(fetcher: &ScriptedFetcher, store: &MemoryUsageStore, hour: u32) -> Collector {
    let mut config = minimal_config(&[TRAFFIC_URL], &[LEASE_URL]);
    config.daily_run_hour = hour;

    Collector::new(Box::new(fetcher.clone()), Box::new(store.clone()), config)
        .expect("collector construction succeeds")
}

fn scripted() -> ScriptedFetcher {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(TRAFFIC_URL, "aa:bb:cc:dd:ee:ff 100 200")
        .respond(LEASE_URL, "0 aa:bb:cc:dd:ee:ff 192.168.1.5 myhost");
    fetcher
}

#[tokio::test]
async fn outside_daily_hour_only_traffic_runs() {
    let fetcher = scripted();
    let store = MemoryUsageStore::new();
    let collector = collector(&fetcher, &store, 3);

    for hour in [0, 1, 2, 4, 23] {
        let report = collector.run_cycle(at(1, hour)).await;
        assert!(!report.daily_tasks_ran);
        assert!(report.leases.is_empty());
        assert_eq!(report.sweep, None);
    }

    assert_eq!(fetcher.call_count(TRAFFIC_URL), 5);
    assert_eq!(fetcher.call_count(LEASE_URL), 0);
    assert_eq!(store.lease_count().await, 0);
    assert_eq!(store.sample_count().await, 5);
}

#[tokio::test]
async fn daily_hour_runs_leases_after_traffic() {
    let fetcher = scripted();
    let store = MemoryUsageStore::new();
    let collector = collector(&fetcher, &store, 3);

    let report = collector.run_cycle(at(1, 3)).await;

    assert!(report.daily_tasks_ran);
    assert_eq!(report.leases.len(), 1);
    assert!(report.sweep.is_some());
    assert_eq!(
        fetcher.call_order(),
        vec![TRAFFIC_URL.to_string(), LEASE_URL.to_string()]
    );
    assert_eq!(store.lease_count().await, 1);
}

#[tokio::test]
async fn minutes_within_the_hour_still_match() {
    let fetcher = scripted();
    let store = MemoryUsageStore::new();
    let collector = collector(&fetcher, &store, 3);

    let late = at(1, 3) + chrono::Duration::minutes(59);
    assert!(collector.is_daily_hour(late));
    assert!(!collector.is_daily_hour(late + chrono::Duration::minutes(1)));
}
