use aho_corasick::{AhoCorasick, Anchored, Input, MatchKind, StartKind};
use regex::RegexSet;

/// Openers the chat backend uses to announce or acknowledge a tool call.
const FILLER_PREFIXES: &[&str] = &[
    "好的", "我来", "现在", "让我", "正在", "开始", "马上", "工具", "已", "完成", "完毕", "返回",
];

const FILLER_PATTERNS: &[&str] = &["报告.*生成", "文档.*导出", "深度.*研究"];

/// Suppresses answer chunks that only narrate tool activity. Decisions are per
/// chunk and never depend on earlier chunks.
#[derive(Debug, Clone)]
pub struct FillerFilter {
    prefixes: AhoCorasick,
    patterns: RegexSet,
}

impl FillerFilter {
    pub fn new() -> Result<Self, FilterBuildError> {
        Self::with_rules(FILLER_PREFIXES, FILLER_PATTERNS)
    }

    pub fn with_rules(prefixes: &[&str], patterns: &[&str]) -> Result<Self, FilterBuildError> {
        let prefixes = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .start_kind(StartKind::Anchored)
            .build(prefixes)
            .map_err(|e| FilterBuildError(e.to_string()))?;
        let patterns = RegexSet::new(patterns).map_err(|e| FilterBuildError(e.to_string()))?;
        Ok(Self { prefixes, patterns })
    }

    pub fn is_filler(&self, chunk: &str) -> bool {
        let text = chunk.trim();
        if text.is_empty() {
            return false;
        }
        let anchored = Input::new(text).anchored(Anchored::Yes);
        self.prefixes.find(anchored).is_some() || self.patterns.is_match(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid filler rule: {0}")]
pub struct FilterBuildError(String);
