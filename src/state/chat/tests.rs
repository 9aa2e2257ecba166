use super::*;
use serde_json::{json, Value};

fn feed(reducer: &mut ChatReducer, value: Value) -> (Vec<ChatPatch>, Option<Terminal>) {
    let event = RawEvent::from_value(value).expect("tagged");
    let mut patches = Vec::new();
    let terminal = reducer.apply(&event, &mut patches);
    (patches, terminal)
}

fn segments(reducer: &ChatReducer) -> &[Segment] {
    &reducer
        .transcript()
        .current_turn()
        .expect("a turn exists")
        .segments
}

#[test]
fn test_tool_segment_sits_between_surrounding_text() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("what is 6 x 7?");
    feed(&mut reducer, json!({"type": "answer", "content": "Hello "}));
    feed(&mut reducer, json!({"type": "tool_start", "tool_name": "X"}));
    feed(&mut reducer, json!({"type": "answer", "content": " world"}));
    let (patches, _) = feed(
        &mut reducer,
        json!({"type": "tool_end", "tool_name": "X", "tool_result": "42"}),
    );

    assert!(matches!(
        patches.as_slice(),
        [ChatPatch::ToolFinished { segment: 1, .. }]
    ));

    let segments = segments(&reducer);
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].as_text(), Some("Hello "));
    let call = segments[1].as_tool_call().expect("tool segment");
    assert_eq!(call.name, "X");
    assert_eq!(call.status, ToolCallStatus::Done);
    assert_eq!(call.result, "42");
    assert_eq!(segments[2].as_text(), Some(" world"));
    assert!(matches!(&segments[0], Segment::Text(text) if text.closed));
}

#[test]
fn test_reused_call_id_does_not_leak_across_turns() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("first");
    feed(
        &mut reducer,
        json!({"type": "tool_start", "tool_name": "search", "tool_call_id": "call-1"}),
    );

    reducer.begin_turn("second");
    feed(
        &mut reducer,
        json!({"type": "tool_start", "tool_name": "search", "tool_call_id": "call-1"}),
    );
    feed(
        &mut reducer,
        json!({"type": "tool_end", "tool_name": "search", "tool_call_id": "call-1", "tool_result": "new"}),
    );

    let turns = &reducer.transcript().turns;
    let old = turns[0].segments[0].as_tool_call().expect("old call");
    assert_eq!(old.status, ToolCallStatus::Calling);
    assert_eq!(old.result, "");
    let new = turns[1].segments[0].as_tool_call().expect("new call");
    assert_eq!(new.status, ToolCallStatus::Done);
    assert_eq!(new.result, "new");
    assert!(new.index > old.index);
}

#[test]
fn test_tool_end_without_pending_call_is_noop() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("q");
    feed(&mut reducer, json!({"type": "answer", "content": "text"}));
    let (patches, terminal) = feed(
        &mut reducer,
        json!({"type": "tool_end", "tool_name": "ghost", "tool_result": "x"}),
    );
    assert!(patches.is_empty());
    assert_eq!(terminal, None);
    assert_eq!(segments(&reducer).len(), 1);
}

#[test]
fn test_same_name_tool_end_resolves_first_registered() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("q");
    feed(&mut reducer, json!({"type": "tool_start", "tool_name": "rates"}));
    feed(&mut reducer, json!({"type": "tool_start", "tool_name": "rates"}));
    feed(
        &mut reducer,
        json!({"type": "tool_end", "tool_name": "rates", "tool_result": "first"}),
    );

    let segments = segments(&reducer);
    assert_eq!(segments[0].as_tool_call().expect("call").result, "first");
    assert_eq!(
        segments[1].as_tool_call().expect("call").status,
        ToolCallStatus::Calling
    );
}

#[test]
fn test_consecutive_answers_share_a_segment_and_thinking_is_ignored() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("q");
    let (patches, _) = feed(&mut reducer, json!({"type": "answer", "content": "a"}));
    assert_eq!(patches.len(), 2);
    let (patches, _) = feed(&mut reducer, json!({"type": "thinking", "content": "hmm"}));
    assert!(patches.is_empty());
    let (patches, _) = feed(&mut reducer, json!({"type": "answer", "content": "b"}));
    assert_eq!(
        patches,
        vec![ChatPatch::TextAppended {
            turn: 0,
            segment: 0,
            delta: "b".to_string()
        }]
    );
    assert_eq!(segments(&reducer)[0].as_text(), Some("ab"));
}

#[test]
fn test_overlay_is_dismissed_when_call_finishes() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("q");
    let (patches, _) = feed(
        &mut reducer,
        json!({"type": "tool_start", "tool_name": "deep_research",
               "display_config": {"title": "Researching", "show_progress": true}}),
    );
    let ChatPatch::ToolStarted { call, .. } = &patches[0] else {
        panic!("expected tool start");
    };
    let overlay = call.overlay.as_ref().expect("overlay");
    assert_eq!(overlay.title, "Researching");
    assert_eq!(overlay.animation, "fade");

    feed(&mut reducer, json!({"type": "tool_end", "tool_name": "deep_research"}));
    let call = segments(&reducer)[0].as_tool_call().expect("call");
    assert!(call.overlay.is_none());
    assert_eq!(call.result, "");
}

#[test]
fn test_export_result_attaches_download_link() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("export it");
    feed(&mut reducer, json!({"type": "tool_start", "tool_name": "export_document_file"}));
    feed(
        &mut reducer,
        json!({"type": "tool_end", "tool_name": "export_document_file",
               "tool_result": "Saved to /downloads/report_2024-01.docx"}),
    );

    let call = segments(&reducer)[0].as_tool_call().expect("call");
    assert_eq!(
        call.download,
        Some(DownloadLink {
            filename: "report_2024-01.docx".to_string(),
            url: "/downloads/report_2024-01.docx".to_string(),
        })
    );
}

#[test]
fn test_structured_tool_result_is_rendered_as_json() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("q");
    feed(&mut reducer, json!({"type": "tool_start", "tool_name": "rates"}));
    feed(
        &mut reducer,
        json!({"type": "tool_end", "tool_name": "rates", "tool_result": {"rate": 0.1}}),
    );
    let call = segments(&reducer)[0].as_tool_call().expect("call");
    assert_eq!(call.result, r#"{"rate":0.1}"#);
}

#[test]
fn test_filler_filter_suppresses_announcements_only() {
    let mut reducer = ChatReducer::new().with_filter(FillerFilter::new().expect("rules"));
    reducer.begin_turn("q");
    let (patches, _) = feed(&mut reducer, json!({"type": "answer", "content": "好的，我来查询"}));
    assert!(patches.is_empty());
    feed(&mut reducer, json!({"type": "answer", "content": "税率为 10%"}));
    assert_eq!(segments(&reducer)[0].as_text(), Some("税率为 10%"));
}

#[test]
fn test_events_before_begin_turn_open_an_implicit_turn() {
    let mut reducer = ChatReducer::new();
    let (patches, _) = feed(&mut reducer, json!({"type": "answer", "content": "hi"}));
    assert!(matches!(patches[0], ChatPatch::TurnStarted { turn: 0, .. }));
    assert_eq!(reducer.transcript().turns.len(), 1);
}

#[test]
fn test_error_is_terminal_and_recorded_on_turn() {
    let mut reducer = ChatReducer::new();
    reducer.begin_turn("q");
    feed(&mut reducer, json!({"type": "answer", "content": "partial"}));
    let (_, terminal) = feed(&mut reducer, json!({"type": "error", "content": "backend failed"}));
    let terminal = terminal.expect("terminal");
    reducer.finish(&terminal);

    let turn = reducer.transcript().current_turn().expect("turn");
    assert_eq!(turn.outcome, Some(Terminal::Error("backend failed".to_string())));
    assert_eq!(turn.segments[0].as_text(), Some("partial"));
    assert_eq!(reducer.end_of_stream(), Terminal::Success);
}
