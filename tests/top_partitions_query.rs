// ==============================================
// TOP-PARTITIONS QUERY TESTS (integration)
// ==============================================
//
// End-to-end scatter/gather over a multi-shard runtime. These need real shard
// workers and an async executor, so they live outside the source files.

use std::time::Duration;

use toppartitions::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn runtime(shards: usize) -> ShardRuntime {
    ShardRuntime::new(RuntimeConfig::builder().shards(shards).build()).unwrap()
}

async fn runtime_with_tables(shards: usize, tables: &[&str]) -> ShardRuntime {
    let runtime = runtime(shards);
    for table in tables {
        runtime.create_table(TableName::new("ks", *table)).await.unwrap();
    }
    runtime
}

async fn installed_on(runtime: &ShardRuntime, id: ListenerId) -> Vec<bool> {
    runtime
        .invoke_on_all(move |db| db.listeners().exists(&id))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect()
}

// ==============================================
// Scenario: observers scoped by table
// ==============================================

#[tokio::test]
async fn observer_sees_only_its_table() {
    init_tracing();
    let runtime = runtime_with_tables(3, &["t1", "t2"]).await;
    let t1 = TableName::new("ks", "t1");
    let t2 = TableName::new("ks", "t2");

    let mut on_t1 = TopPartitionsQuery::new(&runtime, t1.clone(), TopPartitionsConfig::default());
    let mut on_t2 = TopPartitionsQuery::new(&runtime, t2.clone(), TopPartitionsConfig::default());
    on_t1.scatter().await.unwrap();
    on_t2.scatter().await.unwrap();

    for key in ["k1", "k2", "k3"] {
        runtime
            .apply(&t1, Mutation::new(key).with_row("c", "v"))
            .await
            .unwrap();
    }
    let scanned = runtime
        .query(&t1, PartitionRange::Full, PartitionSlice::full())
        .await
        .unwrap();
    assert_eq!(scanned.len(), 3);

    let t1_results = on_t1.gather(10).await.unwrap();
    assert_eq!(t1_results.write.len(), 3);
    assert_eq!(t1_results.read.len(), 3);
    assert!(t1_results.write.iter().all(|c| c.count == 1 && c.error == 0));
    assert!(t1_results.read.iter().all(|c| c.count == 1 && c.error == 0));

    let mut written: Vec<_> = t1_results
        .records()
        .write
        .iter()
        .map(|r| r.partition_key().unwrap())
        .collect();
    written.sort();
    assert_eq!(
        written,
        vec![PartitionKey::from("k1"), PartitionKey::from("k2"), PartitionKey::from("k3")]
    );

    let t2_results = on_t2.gather(10).await.unwrap();
    assert!(t2_results.read.is_empty());
    assert!(t2_results.write.is_empty());
}

#[tokio::test]
async fn reads_are_unchanged_by_observation() {
    let runtime = runtime_with_tables(2, &["t1"]).await;
    let t1 = TableName::new("ks", "t1");
    for key in ["a", "b", "c", "d"] {
        runtime
            .apply(&t1, Mutation::new(key).with_row("r1", "x").with_row("r2", "y"))
            .await
            .unwrap();
    }
    let range = PartitionRange::Between {
        start: Some(PartitionKey::from("b")),
        end: None,
    };
    let slice = PartitionSlice::with_row_limit(1);

    let before = runtime.query(&t1, range.clone(), slice).await.unwrap();

    let mut query = TopPartitionsQuery::new(&runtime, t1.clone(), TopPartitionsConfig::default());
    query.scatter().await.unwrap();
    let during = runtime.query(&t1, range, slice).await.unwrap();
    let results = query.gather(10).await.unwrap();

    assert_eq!(before, during);
    assert_eq!(results.read.len(), 3);
    assert!(results.write.is_empty());
}

// ==============================================
// Failure handling
// ==============================================

#[tokio::test]
async fn scatter_failure_rolls_back_every_shard() {
    init_tracing();
    let runtime = ShardRuntime::new(
        RuntimeConfig::builder()
            .shards(3)
            .max_listeners_per_shard(1)
            .build(),
    )
    .unwrap();
    let t1 = TableName::new("ks", "t1");
    runtime.create_table(t1.clone()).await.unwrap();

    // Occupy the only listener slot on shard 1.
    let squatter = ListenerId::new();
    let table = t1.clone();
    runtime
        .invoke_on(ShardId::new(1), move |db| {
            db.listeners_mut()
                .install(Box::new(PartitionObserver::new(squatter, table, 4)))
        })
        .await
        .unwrap()
        .unwrap();

    let mut query = TopPartitionsQuery::new(&runtime, t1, TopPartitionsConfig::default());
    let err = query.scatter().await.unwrap_err();
    assert_eq!(
        err,
        QueryError::Listener {
            shard: ShardId::new(1),
            source: ListenerError::LimitReached { limit: 1 },
        }
    );
    assert_eq!(query.state(), QueryState::Gathered);
    assert_eq!(installed_on(&runtime, query.id()).await, vec![false, false, false]);
    assert_eq!(installed_on(&runtime, squatter).await, vec![false, true, false]);
}

#[tokio::test]
async fn gather_failure_still_uninstalls_everywhere() {
    init_tracing();
    let runtime = runtime_with_tables(3, &["t1"]).await;
    let t1 = TableName::new("ks", "t1");

    let mut query = TopPartitionsQuery::new(&runtime, t1.clone(), TopPartitionsConfig::default());
    query.scatter().await.unwrap();
    runtime.apply(&t1, Mutation::new("k")).await.unwrap();

    let id = query.id();
    let removed = runtime
        .invoke_on(ShardId::new(2), move |db| db.listeners_mut().uninstall(&id))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let err = query.gather(10).await.unwrap_err();
    assert_eq!(err, QueryError::ListenerMissing { shard: ShardId::new(2) });
    assert_eq!(query.state(), QueryState::Gathered);
    assert_eq!(installed_on(&runtime, id).await, vec![false, false, false]);
}

#[tokio::test]
async fn gather_on_stopped_runtime_reports_shard_error() {
    let runtime = runtime_with_tables(2, &["t1"]).await;
    let mut query = TopPartitionsQuery::new(
        &runtime,
        TableName::new("ks", "t1"),
        TopPartitionsConfig::default(),
    );
    query.scatter().await.unwrap();
    runtime.shutdown();

    let err = query.gather(10).await.unwrap_err();
    assert_eq!(
        err,
        QueryError::Shard(ShardError::Unavailable { shard: ShardId::new(0) })
    );
}

// ==============================================
// run(): validate, scatter, wait, gather
// ==============================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_collects_traffic_during_the_window() {
    init_tracing();
    let runtime = runtime_with_tables(2, &["events"]).await;
    let events = TableName::new("ks", "events");
    let config = TopPartitionsConfig::builder().list_size(2).capacity(16).build();

    // Traffic starts once the observers are on every shard and has the rest
    // of a generous window to land.
    let traffic = async {
        let mut installed = 0;
        for _ in 0..200 {
            installed = runtime
                .map_reduce(|db| db.listeners().len(), 0, |acc, n| acc + n)
                .await
                .unwrap();
            if installed == runtime.shard_count() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(installed, runtime.shard_count(), "observers never installed");
        for (key, times) in [("hot", 6), ("warm", 3), ("cold", 1)] {
            for _ in 0..times {
                runtime.apply(&events, Mutation::new(key)).await.unwrap();
            }
        }
    };
    let window = parse_duration_ms("2000").unwrap();
    let (results, ()) = tokio::join!(
        TopPartitionsQuery::run(&runtime, "ks", "events", window, config),
        traffic
    );
    let results = results.unwrap();

    let writes: Vec<_> = results
        .records()
        .write
        .into_iter()
        .map(|r| (r.partition_key().unwrap(), r.count))
        .collect();
    assert_eq!(
        writes,
        vec![(PartitionKey::from("hot"), 6), (PartitionKey::from("warm"), 3)]
    );
    assert!(results.read.is_empty());

    let leftover = runtime
        .map_reduce(|db| db.listeners().len(), 0, |acc, n| acc + n)
        .await
        .unwrap();
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn results_serialize_for_rendering() {
    let runtime = runtime_with_tables(1, &["t1"]).await;
    let t1 = TableName::new("ks", "t1");
    let mut query = TopPartitionsQuery::new(&runtime, t1.clone(), TopPartitionsConfig::default());
    query.scatter().await.unwrap();
    runtime.apply(&t1, Mutation::new("k")).await.unwrap();
    let results = query.gather(10).await.unwrap();

    let json = serde_json::to_value(results.records()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "read": [],
            "write": [{ "partition": "6b", "count": 1, "error": 0 }],
        })
    );
}
