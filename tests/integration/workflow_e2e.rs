//! End-to-end workflow execution tests.

use std::io::Write;
use std::time::Duration;

use serde_json::json;

use ensemble::agents::AgentType;
use ensemble::core::{TaskDefinition, TaskId, TaskKind, Workflow, WorkflowId};
use ensemble::orchestration::ExecutionMode;
use ensemble::state::{StateStore, LAST_RESULT_KEY, METRICS_KEY};

use crate::fixtures::{phased_task, Harness, ScriptedRuntime};

/// Test: Dependency chain
/// Given A -> B -> C
/// When the workflow runs
/// Then each task lands in its own phase and dispatch follows the chain
#[tokio::test(start_paused = true)]
async fn test_chain_runs_in_order() {
    let harness = Harness::new(ScriptedRuntime::new());
    let wf = Workflow::new("chain")
        .with_task(phased_task("A", TaskKind::Design))
        .with_task(phased_task("B", TaskKind::Refactoring).depends_on("A"))
        .with_task(phased_task("C", TaskKind::Testing).depends_on("B"));

    let plan = harness.coordinator.plan(&wf).unwrap();
    let phase_ids: Vec<Vec<&str>> = plan
        .phases
        .iter()
        .map(|p| p.iter().map(|t| t.id.as_str()).collect())
        .collect();
    assert_eq!(phase_ids, vec![vec!["A"], vec!["B"], vec!["C"]]);

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.mode, ExecutionMode::MultiAgent);
    assert_eq!(result.completed_tasks, 3);
    assert_eq!(harness.runtime.dispatched(), vec!["A", "B", "C"]);
    for (id, phase) in [("A", 0), ("B", 1), ("C", 2)] {
        assert_eq!(result.result_for(&TaskId::from(id)).unwrap().phase, phase);
    }
    assert_eq!(
        result.result_for(&TaskId::from("A")).unwrap().output,
        Some(json!({ "task": "A" }))
    );
    assert_eq!(
        result.coordination.agents_used,
        vec![
            AgentType::Architect,
            AgentType::Refactorer,
            AgentType::TestArchitect
        ]
    );
}

/// Test: Orchestrator-led mode
/// Given tasks declared near maximum complexity
/// When the workflow runs
/// Then it runs phased under the orchestrator-led strategy
#[tokio::test(start_paused = true)]
async fn test_orchestrator_led_workflow() {
    let harness = Harness::new(ScriptedRuntime::new());
    let wf = Workflow::new("platform")
        .with_task(TaskDefinition::new("arch", TaskKind::Architecture, "x").with_complexity(98))
        .with_task(
            TaskDefinition::new("coord", TaskKind::Orchestration, "y")
                .with_complexity(97)
                .depends_on("arch"),
        );

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert_eq!(result.mode, ExecutionMode::OrchestratorLed);
    assert!(result.success);
    let requests = harness.runtime.requests();
    assert_eq!(requests[0].agent, AgentType::Architect);
    assert_eq!(requests[1].agent, AgentType::Orchestrator);
    assert_eq!(requests[1].dependencies, vec!["arch".to_string()]);
}

/// Test: Single-agent mode
/// Given a low-complexity workflow
/// When the workflow runs
/// Then one dispatch covers every task and the shared output applies to all
#[tokio::test(start_paused = true)]
async fn test_single_agent_workflow() {
    let harness = Harness::new(ScriptedRuntime::new());
    let mut wf = Workflow::new("small")
        .with_task(TaskDefinition::new("lint", TaskKind::Validation, "lint it"))
        .with_task(TaskDefinition::new("fmt", TaskKind::General, "format it"));
    wf.dependencies.push(WorkflowId::new("bootstrap"));
    wf.context.project = Some("demo".to_string());

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert_eq!(result.mode, ExecutionMode::SingleAgent);
    assert!(result.success);
    assert_eq!(result.total_tasks, 2);
    assert_eq!(result.coordination.coordination_events, 1);
    assert_eq!(result.coordination.agents_used, vec![AgentType::Orchestrator]);

    let requests = harness.runtime.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].agent, AgentType::Orchestrator);
    assert_eq!(requests[0].dependencies, vec!["bootstrap".to_string()]);
    assert_eq!(requests[0].context.project.as_deref(), Some("demo"));
    assert!(result
        .results
        .iter()
        .all(|r| r.output == Some(json!({ "task": "lint" }))));
}

/// Test: Workflow file loading
/// Given a TOML workflow on disk
/// When it is loaded and executed
/// Then the declared tasks, types and dependencies are honored
#[tokio::test(start_paused = true)]
async fn test_load_toml_workflow_and_execute() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("release.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
name = "release"
timeout_secs = 600

[[tasks]]
id = "lint"
type = "validation"
description = "Lint sources"
complexity = 60

[[tasks]]
id = "review"
type = "code-review"
description = "Review the diff"
dependencies = ["lint"]
complexity = 55
"#
    )
    .unwrap();

    let wf = Workflow::load(&path).unwrap();
    assert_eq!(wf.timeout(), Some(Duration::from_secs(600)));

    let harness = Harness::new(ScriptedRuntime::new());
    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(harness.runtime.dispatched(), vec!["lint", "review"]);
    let requests = harness.runtime.requests();
    assert_eq!(requests[0].agent, AgentType::Enforcer);
    assert_eq!(requests[1].agent, AgentType::CodeReviewer);
}

/// Test: Metrics and state publishing
/// Given two finished runs
/// When metrics are read repeatedly
/// Then reads agree and the state store holds the latest figures
#[tokio::test(start_paused = true)]
async fn test_metrics_accumulate_and_publish() {
    let harness = Harness::new(ScriptedRuntime::new().fail("bad", "broken"));

    harness
        .coordinator
        .execute_orchestration_workflow(
            Workflow::new("good").with_task(phased_task("ok", TaskKind::Testing)),
            None,
        )
        .await
        .unwrap();
    harness
        .coordinator
        .execute_orchestration_workflow(
            Workflow::new("bad").with_task(phased_task("bad", TaskKind::Security)),
            None,
        )
        .await
        .unwrap();

    let first = harness.coordinator.get_coordination_metrics().await;
    let second = harness.coordinator.get_coordination_metrics().await;
    assert_eq!(first, second);
    assert_eq!(first.total_workflows, 2);
    assert_eq!(first.successful_workflows, 1);
    assert_eq!(first.failed_workflows, 1);
    assert_eq!(first.agent_utilization[&AgentType::TestArchitect], 1);
    assert_eq!(first.agent_utilization[&AgentType::SecurityAuditor], 1);
    assert!(first.average_duration_ms > 0.0);
    assert!(first.coordination_efficiency > 0.0);

    let published = harness.store.get(METRICS_KEY).unwrap().unwrap();
    assert_eq!(published["total_workflows"], json!(2));
    let last = harness.store.get(LAST_RESULT_KEY).unwrap().unwrap();
    assert_eq!(last["success"], json!(false));
    assert_eq!(last["failed_tasks"], json!(1));
}

/// Test: History retention
/// Given finished runs
/// When history is cleaned with a generous and then a zero age
/// Then only the zero age removes anything
#[tokio::test]
async fn test_history_retention_and_cleanup() {
    let harness = Harness::new(ScriptedRuntime::new().with_default_delay(Duration::ZERO));
    for name in ["one", "two"] {
        harness
            .coordinator
            .execute_orchestration_workflow(
                Workflow::new(name).with_task(phased_task("t", TaskKind::Testing)),
                None,
            )
            .await
            .unwrap();
    }

    let history = harness.coordinator.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].mode, ExecutionMode::MultiAgent);

    assert_eq!(
        harness
            .coordinator
            .cleanup_history(Duration::from_secs(3600))
            .await,
        0
    );
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(harness.coordinator.cleanup_history(Duration::ZERO).await, 2);
    assert!(harness.coordinator.history().await.is_empty());
}
