use livedoc::api::{EventStream, MockChunk, MockTransport, StreamError, StreamHandle};
use livedoc::config::ViolationPolicy;
use livedoc::runtime::{
    drive, run_session, ChannelSink, CollectingSink, SessionController, SessionId, StreamUpdate,
};
use livedoc::state::audit::{AuditPatch, StepStatus, Verdict};
use livedoc::state::chat::{ChatReducer, Segment, ToolCallStatus};
use livedoc::state::report::{ReportReducer, SectionStatus};
use livedoc::state::{AuditReducer, Terminal};
use livedoc::types::{ReportProfile, WorkflowRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn frame(value: Value) -> String {
    format!("data: {value}")
}

fn audit_request() -> WorkflowRequest {
    WorkflowRequest::audit("商品名称：集成电路", "zh").expect("audit request")
}

fn chat_request() -> WorkflowRequest {
    WorkflowRequest::chat("what is 6 x 7?", "session-1", "en").expect("chat request")
}

fn report_request(profile: ReportProfile) -> WorkflowRequest {
    WorkflowRequest::report("context", "zh", profile).expect("report request")
}

async fn open(transport: &MockTransport, request: &WorkflowRequest) -> EventStream {
    EventStream::open(transport, request, StreamHandle::new())
        .await
        .expect("stream opens")
}

#[tokio::test]
async fn test_audit_scenario_reaches_risk_verdict() {
    let transport = MockTransport::new(vec![vec![
        frame(json!({"type": "init", "total_steps": 2, "steps_info": [
            {"id": 1, "title": "Basic info", "icon": "list-check"},
            {"id": 2, "title": "Sensitive goods", "icon": "ban"}
        ]})),
        frame(json!({"type": "step_start", "rule_id": 1, "loading_text": "checking"})),
        frame(json!({"type": "step_result", "rule_id": 1, "status": "pass", "message": "complete"})),
        frame(json!({"type": "step_start", "rule_id": 2, "loading_text": "checking"})),
        frame(json!({"type": "step_result", "rule_id": 2, "status": "risk", "message": "dual use"})),
        frame(json!({"type": "complete", "final_status": "risk", "summary": "review required"})),
    ]]);

    let stream = open(&transport, &audit_request()).await;
    let mut reducer = AuditReducer::new(ViolationPolicy::Ignore);
    let mut sink = CollectingSink::new();
    let terminal = drive(stream, &mut reducer, &mut sink).await;

    assert_eq!(terminal, Terminal::Success);
    assert_eq!(sink.terminals, vec![Terminal::Success]);
    let document = reducer.document();
    assert_eq!(document.card("1").expect("card 1").status, StepStatus::Pass);
    assert_eq!(document.card("2").expect("card 2").status, StepStatus::Risk);
    assert_eq!(
        document.verdict.as_ref().map(|v| v.verdict),
        Some(Verdict::Risk)
    );

    // every card update moves forward
    let mut seen: Vec<(String, StepStatus)> = Vec::new();
    for patch in &sink.patches {
        if let AuditPatch::CardUpdated { card, .. } = patch {
            seen.push((card.id.to_string(), card.status));
        }
    }
    assert_eq!(
        seen,
        vec![
            ("1".to_string(), StepStatus::Thinking),
            ("1".to_string(), StepStatus::Pass),
            ("2".to_string(), StepStatus::Thinking),
            ("2".to_string(), StepStatus::Risk),
        ]
    );
}

#[tokio::test]
async fn test_audit_without_complete_is_an_error() {
    let transport = MockTransport::new(vec![vec![frame(
        json!({"type": "init", "steps_info": [{"id": 1, "title": "Basic info"}]}),
    )]]);
    let stream = open(&transport, &audit_request()).await;
    let mut reducer = AuditReducer::default();
    let mut sink = CollectingSink::new();

    let terminal = drive(stream, &mut reducer, &mut sink).await;
    assert!(matches!(terminal, Terminal::Error(_)));
    assert_eq!(reducer.document().cards.len(), 1);
}

#[tokio::test]
async fn test_chat_scenario_orders_tool_segment_between_text() {
    let transport = MockTransport::new(vec![vec![
        frame(json!({"type": "answer", "content": "Hello "})),
        frame(json!({"type": "tool_start", "tool_name": "X"})),
        frame(json!({"type": "answer", "content": " world"})),
        frame(json!({"type": "tool_end", "tool_name": "X", "tool_result": "42"})),
    ]]);

    let mut reducer = ChatReducer::new();
    let mut sink = CollectingSink::new();
    sink.patches.push(reducer.begin_turn("what is 6 x 7?"));
    let stream = open(&transport, &chat_request()).await;
    let terminal = drive(stream, &mut reducer, &mut sink).await;

    assert_eq!(terminal, Terminal::Success);
    let turn = reducer.transcript().current_turn().expect("turn");
    assert_eq!(turn.outcome, Some(Terminal::Success));
    match turn.segments.as_slice() {
        [Segment::Text(first), Segment::ToolCall(call), Segment::Text(second)] => {
            assert_eq!(first.markdown, "Hello ");
            assert_eq!(call.name, "X");
            assert_eq!(call.status, ToolCallStatus::Done);
            assert_eq!(call.result, "42");
            assert_eq!(second.markdown, " world");
        }
        other => panic!("unexpected transcript: {other:?}"),
    }
}

#[tokio::test]
async fn test_report_scenario_leaves_last_section_active() {
    let transport = MockTransport::new(vec![vec![
        frame(json!({"type": "toc", "payload": ["A", "B"]})),
        frame(json!({"type": "step_start", "payload": {"index": 0, "title": "A"}})),
        frame(json!({"type": "report_chunk", "payload": "# A\n"})),
        frame(json!({"type": "report_chunk", "payload": "body"})),
        frame(json!({"type": "step_done", "payload": {"index": 0}})),
        frame(json!({"type": "step_start", "payload": {"index": 1, "title": "B"}})),
        frame(json!({"type": "report_chunk", "payload": "# B"})),
        frame(json!({"type": "done"})),
    ]]);

    let stream = open(&transport, &report_request(ReportProfile::Standard)).await;
    let mut reducer = ReportReducer::new(ReportProfile::Standard, ViolationPolicy::Fail);
    let mut sink = CollectingSink::new();
    let terminal = drive(stream, &mut reducer, &mut sink).await;

    assert_eq!(terminal, Terminal::Success);
    let sections = &reducer.document().sections;
    assert_eq!(sections[0].raw, "# A\nbody");
    assert_eq!(sections[0].status, SectionStatus::Done);
    assert_eq!(sections[1].raw, "# B");
    assert_eq!(sections[1].status, SectionStatus::Active);
    assert_eq!(sections[0].rendered(), "<h1>A</h1>\n<p>body</p>\n");
}

#[tokio::test]
async fn test_events_after_terminal_are_not_applied() {
    let transport = MockTransport::new(vec![vec![
        frame(json!({"type": "toc", "payload": ["A"]})),
        frame(json!({"type": "step_start", "payload": {"index": 0}})),
        frame(json!({"type": "error", "payload": "model overloaded"})),
        frame(json!({"type": "report_chunk", "payload": "late"})),
    ]]);

    let stream = open(&transport, &report_request(ReportProfile::Standard)).await;
    let mut reducer = ReportReducer::new(ReportProfile::Standard, ViolationPolicy::Ignore);
    let mut sink = CollectingSink::new();
    let terminal = drive(stream, &mut reducer, &mut sink).await;

    assert_eq!(terminal, Terminal::Error("model overloaded".to_string()));
    assert_eq!(reducer.document().sections[0].raw, "");
    assert_eq!(sink.terminals.len(), 1);
}

#[tokio::test]
async fn test_malformed_frame_does_not_block_neighbours() {
    let transport = MockTransport::default();
    transport.push_chunks(vec![
        MockChunk::text("data: {\"type\":\"answer\",\"content\":\"before\"}\n\ndata: {\"type\":\"ans"),
        MockChunk::text("wer\",\"content\":}\n\ndata: {\"type\":\"answer\",\"content\":\" after\"}\n\n"),
    ]);

    let mut reducer = ChatReducer::new();
    let mut sink = CollectingSink::new();
    let stream = open(&transport, &chat_request()).await;
    let terminal = drive(stream, &mut reducer, &mut sink).await;

    assert_eq!(terminal, Terminal::Success);
    let turn = reducer.transcript().current_turn().expect("turn");
    assert_eq!(turn.segments[0].as_text(), Some("before after"));
}

#[tokio::test]
async fn test_transport_failure_is_a_terminal_error() {
    let transport = MockTransport::default();
    transport.push_chunks(vec![
        MockChunk::text("data: {\"type\":\"toc\",\"payload\":[\"A\"]}\n\n"),
        MockChunk::Error(StreamError::Read {
            url: "mock://generate_report".to_string(),
            message: "connection reset".to_string(),
        }),
    ]);

    let stream = open(&transport, &report_request(ReportProfile::Standard)).await;
    let mut reducer = ReportReducer::default();
    let mut sink = CollectingSink::new();
    let terminal = drive(stream, &mut reducer, &mut sink).await;

    assert!(matches!(terminal, Terminal::Error(ref message) if message.contains("connection reset")));
    assert_eq!(reducer.document().sections.len(), 1);
}

#[tokio::test]
async fn test_cancel_mid_stream_is_interrupted_and_keeps_partial_state() {
    let transport = MockTransport::default();
    transport.push_hanging(vec![
        MockChunk::text("data: {\"type\":\"toc\",\"payload\":[\"A\",\"B\"]}\n\n"),
        MockChunk::text("data: {\"type\":\"step_start\",\"payload\":{\"index\":0}}\n\n"),
        MockChunk::text("data: {\"type\":\"report_chunk\",\"payload\":\"partial\"}\n\n"),
    ]);
    let controller = Arc::new(SessionController::new(Arc::new(transport)));
    let session = SessionId::from("report");

    let (mut sink, mut updates) = ChannelSink::channel();
    let canceller = {
        let controller = controller.clone();
        let session = session.clone();
        tokio::spawn(async move {
            // wait until the chunk has been applied before cancelling
            while let Some(update) = updates.recv().await {
                if matches!(update, StreamUpdate::Patch(ref p) if format!("{p:?}").contains("partial")) {
                    assert!(controller.cancel_session(&session));
                }
                if let StreamUpdate::Terminal(terminal) = update {
                    return terminal;
                }
            }
            panic!("channel closed without a terminal update");
        })
    };

    let mut reducer = ReportReducer::default();
    let terminal = run_session(
        &controller,
        &session,
        &report_request(ReportProfile::Standard),
        &mut reducer,
        &mut sink,
    )
    .await;
    drop(sink);

    assert_eq!(terminal, Terminal::Interrupted);
    assert_eq!(canceller.await.expect("joins"), Terminal::Interrupted);
    assert_eq!(reducer.document().sections[0].raw, "partial");
    assert!(!controller.is_active(&session));
}

#[tokio::test]
async fn test_new_turn_interrupts_the_previous_stream() {
    let transport = MockTransport::default();
    transport.push_hanging(vec![MockChunk::text(
        "data: {\"type\":\"answer\",\"content\":\"first\"}\n\n",
    )]);
    transport.push_chunks(vec![MockChunk::text(
        "data: {\"type\":\"answer\",\"content\":\"second\"}\n\n",
    )]);
    let controller = Arc::new(SessionController::new(Arc::new(transport.clone())));
    let session = SessionId::from("session-1");

    let first = controller
        .start(&session, &chat_request())
        .await
        .expect("first stream");
    let first_run = tokio::spawn(async move {
        let mut reducer = ChatReducer::new();
        let mut sink = CollectingSink::new();
        drive(first, &mut reducer, &mut sink).await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut reducer = ChatReducer::new();
    let mut sink = CollectingSink::new();
    let second = run_session(&controller, &session, &chat_request(), &mut reducer, &mut sink).await;

    assert_eq!(first_run.await.expect("joins"), Terminal::Interrupted);
    assert_eq!(second, Terminal::Success);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_ends_a_stalled_stream() {
    let transport = MockTransport::default();
    transport.push_hanging(vec![MockChunk::text(
        "data: {\"type\":\"toc\",\"payload\":[\"A\"]}\n\n",
    )]);
    let controller = SessionController::new(Arc::new(transport))
        .with_idle_timeout(Some(Duration::from_secs(30)));
    let session = SessionId::from("report");

    let mut reducer = ReportReducer::default();
    let mut sink = CollectingSink::new();
    let terminal = run_session(
        &controller,
        &session,
        &report_request(ReportProfile::Standard),
        &mut reducer,
        &mut sink,
    )
    .await;

    assert!(matches!(terminal, Terminal::Error(ref message) if message.contains("no data")));
    assert_eq!(reducer.document().sections.len(), 1);
}

#[tokio::test]
async fn test_open_failure_still_reports_one_terminal() {
    let controller = SessionController::new(Arc::new(MockTransport::default()));
    let mut reducer = AuditReducer::default();
    let mut sink = CollectingSink::new();

    let terminal = run_session(
        &controller,
        &SessionId::from("audit"),
        &audit_request(),
        &mut reducer,
        &mut sink,
    )
    .await;

    assert!(matches!(terminal, Terminal::Error(_)));
    assert_eq!(sink.terminals, vec![terminal]);
}
