use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{watch, Notify};
use tokio::time::{timeout, Instant};

use transcript_compliance::clients::JobApi;
use transcript_compliance::config::Config;
use transcript_compliance::error::{AppError, ClientError, Operation};
use transcript_compliance::models::{EvaluationResult, Job, JobStatus, TranscriptFile};
use transcript_compliance::orchestrator::{App, DeliveryReceiver, Orchestrator};
use transcript_compliance::workflow::{Phase, PollPolicy, WorkflowState};

/// 按 doc_id 编排响应的远程接口
///
/// - doc_id 等于文件名
/// - 状态队列耗尽后一律返回 processing
/// - 设置了闸门的 doc_id 在状态查询时挂起，直到闸门放行
#[derive(Default)]
struct ScriptedApi {
    calls: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<String, VecDeque<Result<JobStatus, ClientError>>>>,
    upload_failures: Mutex<VecDeque<ClientError>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl ScriptedApi {
    fn script(&self, doc_id: &str, responses: Vec<Result<JobStatus, ClientError>>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(doc_id.to_string(), responses.into());
    }

    fn gate(&self, doc_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(doc_id.to_string(), Arc::clone(&gate));
        gate
    }

    fn fail_next_upload(&self, err: ClientError) {
        self.upload_failures.lock().unwrap().push_back(err);
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn completed(doc_id: &str) -> Result<JobStatus, ClientError> {
    Ok(JobStatus::Completed {
        result_url: format!("{}.json", doc_id),
    })
}

fn evaluation(label: &str) -> EvaluationResult {
    serde_json::from_value(json!({
        "processed": {
            "full_text": label,
            "sentences": [
                {"idx": 0, "text": "We guarantee you will earn $10k a month."},
                {"idx": 1, "text": "Thanks for joining the call."}
            ]
        },
        "regex_hits": [{
            "sentence_idx": 0,
            "text": "guarantee you will earn",
            "category": "earnings",
            "fault_level": "HIGH",
            "confidence_score": 0.95,
            "source": "regex"
        }],
        "llm_hits": [],
        "summary": {"earnings": 1}
    }))
    .unwrap()
}

#[async_trait]
impl JobApi for ScriptedApi {
    async fn upload(&self, file: &TranscriptFile) -> Result<Job, ClientError> {
        self.record(format!("upload:{}", file.name));
        if let Some(err) = self.upload_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(Job {
            doc_id: file.name.clone(),
            source_url: format!("s3://transcripts/{}", file.name),
        })
    }

    async fn submit(&self, job: &Job) -> Result<String, ClientError> {
        self.record(format!("submit:{}", job.doc_id));
        Ok(job.doc_id.clone())
    }

    async fn check_status(&self, doc_id: &str) -> Result<JobStatus, ClientError> {
        self.record(format!("status:{}", doc_id));
        let gate = self.gates.lock().unwrap().get(doc_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.statuses
            .lock()
            .unwrap()
            .get_mut(doc_id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(JobStatus::Processing))
    }

    async fn fetch_result(&self, result_url: &str) -> Result<EvaluationResult, ClientError> {
        self.record(format!("fetch:{}", result_url));
        Ok(evaluation(result_url))
    }
}

fn transcript(name: &str) -> TranscriptFile {
    TranscriptFile::new(name, b"We guarantee you will earn $10k a month.".to_vec())
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(10),
        max_attempts: None,
    }
}

fn setup(policy: PollPolicy) -> (Arc<ScriptedApi>, Orchestrator, DeliveryReceiver) {
    let api = Arc::new(ScriptedApi::default());
    let (orchestrator, deliveries) = Orchestrator::new(api.clone(), policy);
    (api, orchestrator, deliveries)
}

async fn wait_for_phase(rx: &mut watch::Receiver<WorkflowState>, phase: Phase) -> WorkflowState {
    timeout(Duration::from_secs(3600), rx.wait_for(|s| s.phase == phase))
        .await
        .expect("等待状态超时")
        .expect("状态通道已关闭")
        .clone()
}

#[tokio::test(start_paused = true)]
async fn test_happy_path_polls_until_completed_and_delivers_once() {
    let (api, orchestrator, mut deliveries) = setup(fast_policy());
    api.script(
        "call.txt",
        vec![
            Ok(JobStatus::Processing),
            Ok(JobStatus::Processing),
            completed("call.txt"),
        ],
    );

    let start = Instant::now();
    orchestrator.select_file(transcript("call.txt"));
    assert_eq!(orchestrator.snapshot().phase, Phase::Uploading);

    let delivery = timeout(Duration::from_secs(3600), deliveries.recv())
        .await
        .expect("等待结果超时")
        .expect("结果通道已关闭");

    assert_eq!(delivery.file_name, "call.txt");
    assert_eq!(delivery.result.processed.full_text, "call.txt.json");
    assert_eq!(api.count("upload:"), 1);
    assert_eq!(api.count("status:"), 3);
    assert_eq!(api.count("fetch:"), 1);

    // 两次 processing 之间各等待一个间隔
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(20), "elapsed = {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(30), "elapsed = {:?}", elapsed);

    let state = orchestrator.snapshot();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.file_name, "call.txt");
    assert!(state.error.is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(deliveries.try_recv().is_err(), "结果只能交付一次");
}

#[tokio::test(start_paused = true)]
async fn test_status_failure_enters_error_and_retry_reuses_file() {
    let (api, orchestrator, mut deliveries) = setup(fast_policy());
    api.script(
        "call.txt",
        vec![
            Err(ClientError::status(Operation::Status, 500, "internal error")),
            completed("call.txt"),
        ],
    );
    let mut rx = orchestrator.subscribe();

    orchestrator.select_file(transcript("call.txt"));
    let state = wait_for_phase(&mut rx, Phase::Error).await;

    let message = state.error.expect("错误状态必须带消息");
    assert!(message.contains("500"), "message = {}", message);
    assert!(message.contains("internal error"));
    assert_eq!(state.file_name, "call.txt");
    assert!(deliveries.try_recv().is_err());

    assert!(orchestrator.retry().is_some());
    assert_eq!(orchestrator.snapshot().phase, Phase::Uploading);

    let delivery = timeout(Duration::from_secs(3600), deliveries.recv())
        .await
        .expect("等待结果超时")
        .expect("结果通道已关闭");
    assert_eq!(delivery.file_name, "call.txt");
    assert_eq!(api.count("upload:call.txt"), 2);
    assert_eq!(orchestrator.snapshot().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_upload_failure_message_reaches_state() {
    let (api, orchestrator, _deliveries) = setup(fast_policy());
    api.fail_next_upload(ClientError::network(Operation::Upload, "connection refused"));
    let mut rx = orchestrator.subscribe();

    orchestrator.select_file(transcript("call.txt"));
    let state = wait_for_phase(&mut rx, Phase::Error).await;

    assert!(state.error.unwrap_or_default().contains("connection refused"));
    assert_eq!(api.count("submit:"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_file_supersedes_pending_sequence() {
    let (api, orchestrator, mut deliveries) = setup(fast_policy());
    let gate_a = api.gate("a.txt");
    api.script("a.txt", vec![completed("a.txt")]);
    api.script("b.txt", vec![completed("b.txt")]);
    let mut rx = orchestrator.subscribe();

    orchestrator.select_file(transcript("a.txt"));
    wait_for_phase(&mut rx, Phase::Processing).await;
    assert_eq!(api.count("status:a.txt"), 1);

    orchestrator.select_file(transcript("b.txt"));
    // a 的状态查询在 b 开始之后才返回 completed
    gate_a.notify_one();

    let delivery = timeout(Duration::from_secs(3600), deliveries.recv())
        .await
        .expect("等待结果超时")
        .expect("结果通道已关闭");
    assert_eq!(delivery.file_name, "b.txt");
    assert_eq!(delivery.result.processed.full_text, "b.txt.json");

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(deliveries.try_recv().is_err());
    assert_eq!(api.count("fetch:a.txt"), 0);

    let state = orchestrator.snapshot();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.file_name, "b.txt");
}

#[tokio::test(start_paused = true)]
async fn test_superseded_failure_does_not_reach_state() {
    let (api, orchestrator, _deliveries) = setup(fast_policy());
    let gate_a = api.gate("a.txt");
    api.script(
        "a.txt",
        vec![Err(ClientError::status(Operation::Status, 500, "boom"))],
    );
    let mut rx = orchestrator.subscribe();

    orchestrator.select_file(transcript("a.txt"));
    wait_for_phase(&mut rx, Phase::Processing).await;

    orchestrator.select_file(transcript("b.txt"));
    // a 的状态查询在 b 开始之后才以 500 结束
    gate_a.notify_one();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let state = orchestrator.snapshot();
    assert_eq!(state.phase, Phase::Processing);
    assert_eq!(state.file_name, "b.txt");
    assert_eq!(state.error, None);
    assert!(api.count("status:b.txt") >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_polling_without_transition() {
    let (api, orchestrator, mut deliveries) = setup(fast_policy());
    let mut rx = orchestrator.subscribe();

    orchestrator.select_file(transcript("call.txt"));
    wait_for_phase(&mut rx, Phase::Processing).await;
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(api.count("status:"), 2);

    orchestrator.cancel();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(api.count("status:"), 2);
    assert_eq!(orchestrator.snapshot().phase, Phase::Processing);
    assert!(deliveries.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_poll_limit_reports_error() {
    let policy = PollPolicy {
        interval: Duration::from_secs(10),
        max_attempts: Some(3),
    };
    let (api, orchestrator, _deliveries) = setup(policy);
    let mut rx = orchestrator.subscribe();

    orchestrator.select_file(transcript("call.txt"));
    let state = wait_for_phase(&mut rx, Phase::Error).await;

    assert_eq!(api.count("status:"), 3);
    assert!(state.error.unwrap_or_default().contains('3'));
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_error_returns_to_idle() {
    let (api, orchestrator, _deliveries) = setup(fast_policy());
    api.fail_next_upload(ClientError::status(Operation::Upload, 413, "too large"));
    let mut rx = orchestrator.subscribe();

    // Idle 下关闭错误没有效果
    orchestrator.dismiss_error();
    assert_eq!(orchestrator.snapshot(), WorkflowState::default());

    orchestrator.select_file(transcript("call.txt"));
    wait_for_phase(&mut rx, Phase::Error).await;

    orchestrator.dismiss_error();
    let state = orchestrator.snapshot();
    assert_eq!(state.phase, Phase::Idle);
    assert!(state.error.is_none());
    assert_eq!(orchestrator.last_file_name().as_deref(), Some("call.txt"));
}

#[tokio::test]
async fn test_retry_without_file_is_noop() {
    let (_api, orchestrator, _deliveries) = setup(fast_policy());
    assert!(orchestrator.retry().is_none());
    assert_eq!(orchestrator.snapshot().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_app_auto_retry_writes_report() {
    let api = Arc::new(ScriptedApi::default());
    api.fail_next_upload(ClientError::status(Operation::Upload, 502, "bad gateway"));
    api.script("call.txt", vec![completed("call.txt")]);

    let report_path = std::env::temp_dir().join(format!(
        "transcript_compliance_report_{}.txt",
        std::process::id()
    ));
    let config = Config {
        auto_retry: 1,
        report_file: report_path.display().to_string(),
        ..Config::default()
    };

    let mut app = App::with_api(config, api.clone());
    let report = app.analyze(transcript("call.txt")).await.unwrap();

    assert_eq!(api.count("upload:"), 2);
    assert_eq!(report.score, 50);
    assert_eq!(report.total_hits, 1);
    assert_eq!(report.flagged_sentences, 1);

    let written = std::fs::read_to_string(&report_path).unwrap();
    assert!(written.contains("call.txt"));
    let _ = std::fs::remove_file(&report_path);
}

#[tokio::test(start_paused = true)]
async fn test_app_gives_up_after_retries_exhausted() {
    let api = Arc::new(ScriptedApi::default());
    api.fail_next_upload(ClientError::status(Operation::Upload, 500, "boom"));

    let config = Config {
        auto_retry: 0,
        ..Config::default()
    };
    let mut app = App::with_api(config, api.clone());
    let err = app.analyze(transcript("call.txt")).await.unwrap_err();

    match err {
        AppError::Workflow { message } => assert!(message.contains("boom")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(api.count("upload:"), 1);
}
