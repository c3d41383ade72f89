//! End-to-end runs against in-process echo replicas over real gRPC.

use std::net::SocketAddr;
use std::time::Duration;

use lbprobe_echo::{serve, EchoService, ReplicaInfo};
use lbprobe_loadtest::{
    ConnectionPool, EchoConnector, GrpcConnection, GrpcConnector, LoadTestConfig, LoadTestError,
    RunOrchestrator,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Replica {
    addr: SocketAddr,
    _stop: oneshot::Sender<()>,
}

async fn start_replica(name: &str, delay: Duration) -> Replica {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let service = EchoService::new(ReplicaInfo::new(name, name, addr.ip().to_string()))
        .with_delay(delay);

    tokio::spawn(async move {
        serve(listener, service, async {
            let _ = stopped.await;
        })
        .await
        .unwrap();
    });

    Replica { addr, _stop: stop }
}

fn config(target: SocketAddr, total: u64, concurrency: usize, connections: usize) -> LoadTestConfig {
    LoadTestConfig {
        target: target.to_string(),
        total,
        concurrency,
        connections,
        request_timeout: Duration::from_secs(5),
        dial_timeout: Duration::from_secs(5),
        ..LoadTestConfig::default()
    }
}

async fn orchestrator(config: LoadTestConfig) -> RunOrchestrator<GrpcConnection> {
    let pool = ConnectionPool::connect(
        &GrpcConnector,
        &config.target,
        config.connections,
        config.dial_timeout,
    )
    .await
    .unwrap();
    RunOrchestrator::new(pool, config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_replica_receives_all_requests() {
    let replica = start_replica("p1", Duration::ZERO).await;
    let runner = orchestrator(config(replica.addr, 10, 1, 1)).await;

    let report = runner.execute_once().await;

    assert_eq!(report.completed, 10);
    assert_eq!(report.errors, 0);
    assert_eq!(report.stats.unique_replicas(), 1);
    assert_eq!(report.stats.count_for("p1 (127.0.0.1)"), Some(10));
    assert!(report.to_string().contains("(100.0%) - p1 (127.0.0.1)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_workers_share_connections() {
    let replica = start_replica("p1", Duration::ZERO).await;
    let runner = orchestrator(config(replica.addr, 300, 20, 3)).await;

    let report = runner.execute_once().await;

    assert_eq!(report.completed + report.errors, 300);
    assert_eq!(report.stats.total(), report.completed);
    assert_eq!(report.completed, 300);
    assert_eq!(report.connections, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn zero_total_reports_no_responses() {
    let replica = start_replica("p1", Duration::ZERO).await;
    let runner = orchestrator(config(replica.addr, 0, 4, 2)).await;

    let report = runner.execute_once().await;

    assert_eq!(report.completed, 0);
    assert_eq!(report.errors, 0);
    assert!(report.to_string().contains("No responses received"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_target_fails_pool_construction() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let err = ConnectionPool::connect(
        &GrpcConnector,
        &addr.to_string(),
        3,
        Duration::from_millis(500),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        LoadTestError::Connection { index: 0, .. } | LoadTestError::ConnectTimeout { index: 0, .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_replica_turns_every_request_into_an_error() {
    let replica = start_replica("slow", Duration::from_millis(300)).await;
    let runner = orchestrator(LoadTestConfig {
        request_timeout: Duration::from_millis(50),
        ..config(replica.addr, 6, 3, 1)
    })
    .await;

    let report = runner.execute_once().await;

    assert_eq!(report.errors, 6);
    assert_eq!(report.completed, 0);
    assert!(report.stats.is_empty());
    assert!(report.requests_per_second() > 0.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn loop_cycles_report_independently() {
    let replica = start_replica("p1", Duration::ZERO).await;
    let runner = orchestrator(config(replica.addr, 8, 2, 1)).await;
    let mut counts = Vec::new();

    let cycles = runner
        .run_loop(
            Duration::from_millis(20),
            Some(2),
            std::future::pending(),
            |report| counts.push(report.stats.count_for("p1 (127.0.0.1)")),
        )
        .await;

    assert_eq!(cycles, 2);
    assert_eq!(counts, vec![Some(8), Some(8)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distribution_follows_connection_assignment() {
    let first = start_replica("echo-0", Duration::ZERO).await;
    let second = start_replica("echo-1", Duration::ZERO).await;

    // Two connections pinned to different replicas stand in for a balancer
    // that routes per connection.
    let connections = vec![
        GrpcConnector
            .connect(&first.addr.to_string(), 0, Duration::from_secs(5))
            .await
            .unwrap(),
        GrpcConnector
            .connect(&second.addr.to_string(), 1, Duration::from_secs(5))
            .await
            .unwrap(),
    ];
    let pool = ConnectionPool::from_connections("per-connection-lb", connections).unwrap();
    let runner = RunOrchestrator::new(
        pool,
        LoadTestConfig {
            target: "per-connection-lb".into(),
            total: 200,
            concurrency: 2,
            connections: 2,
            ..LoadTestConfig::default()
        },
    );

    let report = runner.execute_once().await;

    assert_eq!(report.completed, 200);
    assert_eq!(report.stats.unique_replicas(), 2);
    let shares: f64 = report.stats.percentages().iter().map(|(_, pct)| pct).sum();
    assert!((shares - 100.0).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn report_serializes_for_export() {
    let replica = start_replica("p1", Duration::ZERO).await;
    let runner = orchestrator(config(replica.addr, 4, 2, 1)).await;

    let report = runner.execute_once().await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["completed"], 4);
    assert_eq!(json["errors"], 0);
    assert_eq!(json["stats"]["entries"][0]["key"], "p1 (127.0.0.1)");
    assert_eq!(json["stats"]["entries"][0]["count"], 4);
}
