//! End-to-end runs with shell scripts standing in for the mock service, the infra tool and the test runner.
//!
//! The stand-in mock never answers HTTP, so every job also exercises the soft readiness timeout.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tftest::config::{CleanupConfig, ProbeConfig, RunConfig, Toolchain, normalize};
use tftest::orchestrator::{ConsoleReporter, ErrorCategory, MemorySink, Orchestrator, OutputSinks, RunReport};

const MOCK: &str = "#!/bin/sh\nexec sleep 30\n";

/// Leaves its pid in `$MOCK_PIDS` so tests can see which mocks are still alive.
const MOCK_RECORDING_PID: &str = "#!/bin/sh\n: > \"$MOCK_PIDS/$$\"\nexec sleep 30\n";

const COUNT_LIVE_MOCKS: &str = r#"n=0
for f in "$MOCK_PIDS"/*; do
  kill -0 "$(basename "$f")" 2>/dev/null && n=$((n + 1))
done
echo "LIVE_MOCKS=$n"
"#;

const INFRA: &str = r#"#!/bin/sh
case "$1" in
  init)
    echo "initialised"
    ;;
  apply)
    grep -q "http://localhost:$MOTO_PORT" provider.tf || { echo "provider.tf does not target the mock" >&2; exit 4; }
    touch terraform.tfstate .terraform.tfstate.lock.info
    mkdir -p .terraform/providers
    echo "applied against port $MOTO_PORT"
    ;;
  *)
    exit 2
    ;;
esac
"#;

const INFRA_UNREACHABLE: &str = r#"#!/bin/sh
case "$1" in
  init) exit 0 ;;
  *)
    echo "Error: dial tcp 127.0.0.1:$MOTO_PORT: connect: connection refused" >&2
    exit 1
    ;;
esac
"#;

struct Tools {
    _dir: TempDir,
    mock: PathBuf,
    infra: PathBuf,
}

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn tools(infra: &str) -> Tools {
    tools_with_mock(MOCK, infra)
}

fn tools_with_mock(mock: &str, infra: &str) -> Tools {
    let dir = tempfile::tempdir().unwrap();
    let mock = script(dir.path(), "mock.sh", mock);
    let infra = script(dir.path(), "infra.sh", infra);
    Tools { _dir: dir, mock, infra }
}

/// One job directory per `(name, test body)`.
fn jobs(specs: &[(&str, &str)]) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    for (name, body) in specs {
        let dir = root.path().join(name);
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("main.tf"), "resource \"aws_s3_bucket\" \"b\" {}\n").unwrap();
        std::fs::write(dir.join(format!("{name}_test.sh")), body).unwrap();
    }
    root
}

fn orchestrator(root: &Path, tools: &Tools, sink: &MemorySink) -> Orchestrator {
    orchestrator_with_env(root, tools, sink, BTreeMap::new())
}

fn orchestrator_with_env(root: &Path, tools: &Tools, sink: &MemorySink, env: BTreeMap<String, String>) -> Orchestrator {
    let config = normalize(Some(RunConfig {
        dir: root.to_path_buf(),
        env,
        services: vec!["s3".to_string(), "iam".to_string()],
        toolchain: Toolchain {
            mock_command: tools.mock.to_string_lossy().into_owned(),
            infra_command: tools.infra.to_string_lossy().into_owned(),
            test_command: "sh".to_string(),
            test_args: Vec::new(),
            test_pattern: "*_test.sh".to_string(),
        },
        probe: ProbeConfig::new(1, Duration::from_millis(10)),
        cleanup: CleanupConfig {
            attempts: 3,
            delay: Duration::from_millis(10),
            shutdown_grace: Duration::from_secs(5),
        },
        ..RunConfig::default()
    }))
    .unwrap();
    Orchestrator::new(config).with_sinks(OutputSinks::memory(sink))
}

fn assert_artifacts_removed(root: &Path, name: &str) {
    let dir = root.join(name);
    for artifact in ["provider.tf", "terraform.tfstate", ".terraform.tfstate.lock.info", ".terraform"] {
        assert!(!dir.join(artifact).exists(), "{name}/{artifact} left behind");
    }
    assert!(dir.join("main.tf").exists());
}

async fn run(orchestrator: Orchestrator) -> (RunReport, String) {
    let mut reporter = ConsoleReporter::new(Vec::new());
    let report = orchestrator.run(&mut reporter, std::future::pending()).await.unwrap();
    (report, String::from_utf8(reporter.into_inner()).unwrap())
}

#[tokio::test]
async fn scenario_a_all_jobs_succeed() {
    let tools = tools(INFRA);
    let body = "echo \"region=$AWS_REGION port=$MOTO_PORT\"\nexit 0\n";
    let root = jobs(&[("alpha", body), ("beta", body)]);
    let sink = MemorySink::new();

    let (report, table) = run(orchestrator(root.path(), &tools, &sink)).await;

    assert_eq!(report.passed(), 2);
    assert_eq!(report.exit_code(), 0);
    assert!(table.contains("alpha               SUCCESS"));
    assert!(table.contains("beta                SUCCESS"));

    assert!(sink.contains("[alpha]: initialised"));
    assert!(sink.contains("[beta]: applied against port"));
    assert!(sink.contains("[alpha]: region=us-east-1 port="));
    for name in ["alpha", "beta"] {
        assert_artifacts_removed(root.path(), name);
    }
}

#[tokio::test]
async fn scenario_b_one_test_fails() {
    let tools = tools(INFRA);
    let root = jobs(&[("good", "exit 0\n"), ("bad", "echo 'assertion failed' >&2\nexit 1\n")]);
    let sink = MemorySink::new();

    let (report, table) = run(orchestrator(root.path(), &tools, &sink)).await;

    assert_eq!(report.passed(), 1);
    assert_eq!(report.exit_code(), 1);
    let bad = report.get("bad").unwrap();
    assert_eq!(bad.category, Some(ErrorCategory::Test));
    let error = bad.error.as_deref().unwrap();
    assert!(error.starts_with("test "), "{error}");
    assert!(error.contains("bad_test.sh"), "{error}");
    assert!(error.ends_with("sh exited with status 1"), "{error}");

    assert!(table.contains("good                SUCCESS"));
    assert!(table.contains("bad                 FAILED         test "));
    assert!(sink.contains("[bad]: assertion failed"));
    assert_artifacts_removed(root.path(), "bad");
}

#[tokio::test]
async fn scenario_c_unreachable_mock_fails_at_apply() {
    let tools = tools(INFRA_UNREACHABLE);
    let root = jobs(&[("lonely", "exit 0\n")]);
    let sink = MemorySink::new();

    let (report, _) = run(orchestrator(root.path(), &tools, &sink)).await;

    let lonely = report.get("lonely").unwrap();
    assert_eq!(lonely.category, Some(ErrorCategory::Infrastructure));
    let error = lonely.error.as_deref().unwrap();
    assert!(error.starts_with("infra apply failed"), "{error}");
    assert!(!error.contains("ready"), "{error}");
    assert!(sink.contains("connection refused"));
    assert_eq!(report.exit_code(), 1);
    assert_artifacts_removed(root.path(), "lonely");
}

#[tokio::test]
async fn scenario_d_interrupt_stops_admission_and_cleans_running_jobs() {
    let tools = tools(INFRA);
    let names: Vec<String> = (0..10).map(|i| format!("job{i}")).collect();
    let specs: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "sleep 30\n")).collect();
    let root = jobs(&specs);
    let sink = MemorySink::new();

    let started = Instant::now();
    let mut reporter = ConsoleReporter::new(Vec::new());
    let report = orchestrator(root.path(), &tools, &sink)
        .with_capacity(5)
        .run(&mut reporter, tokio::time::sleep(Duration::from_secs(2)))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(20), "run waited for stragglers");
    assert_eq!(report.outcomes.len(), 10);
    assert_eq!(report.exit_code(), 1);
    for (i, outcome) in report.outcomes.iter().enumerate() {
        if i < 5 {
            assert_eq!(outcome.category, Some(ErrorCategory::Cancelled), "{}: {:?}", outcome.name, outcome.error);
        } else {
            assert_eq!(outcome.error.as_deref(), Some("job not executed"), "{}", outcome.name);
        }
        assert_artifacts_removed(root.path(), &outcome.name);
    }
}

#[tokio::test]
async fn mock_service_is_stopped_before_the_next_job_is_admitted() {
    let tools = tools_with_mock(MOCK_RECORDING_PID, INFRA);
    let pids = tempfile::tempdir().unwrap();
    let names = ["one", "two", "three", "four"];
    let specs: Vec<(&str, &str)> = names.iter().map(|n| (*n, COUNT_LIVE_MOCKS)).collect();
    let root = jobs(&specs);
    let sink = MemorySink::new();
    let env = BTreeMap::from([("MOCK_PIDS".to_string(), pids.path().to_string_lossy().into_owned())]);

    let (report, _) = run(orchestrator_with_env(root.path(), &tools, &sink, env).with_capacity(1)).await;

    assert_eq!(report.passed(), 4);
    for name in names {
        assert!(sink.contains(&format!("[{name}]: LIVE_MOCKS=1")), "{name} saw another job's mock");
    }
    assert_eq!(std::fs::read_dir(pids.path()).unwrap().count(), 4);
}
