//! Per-document output and the persistence seam.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::answers::AnswerReading;
use crate::identity::IdentityReading;
use crate::locate::RegionTier;

/// Flat, serializable outcome of one document. Always produced, also for
/// failed documents (`success = false`, `error` set, answers blank).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub student_id: String,
    pub test_id: String,
    /// `"A"`..`"D"`, `"MULTIPLE"`, or `""` per question.
    pub answers: Vec<String>,
    pub answer_confidences: Vec<f32>,
    pub student_id_confidence: f32,
    pub test_id_confidence: f32,
    pub page_markers_found: usize,
    pub block_markers_found: usize,
    pub answer_tier: Option<RegionTier>,
    pub identity_tier: Option<RegionTier>,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl ProcessResult {
    /// Result for a document that could not be processed.
    pub fn failed(questions: usize, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            student_id: String::new(),
            test_id: String::new(),
            answers: vec![String::new(); questions],
            answer_confidences: vec![0.0; questions],
            student_id_confidence: 0.0,
            test_id_confidence: 0.0,
            page_markers_found: 0,
            block_markers_found: 0,
            answer_tier: None,
            identity_tier: None,
            duration_ms,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Structured reading with decoder detail, before flattening.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetReading {
    pub identity: IdentityReading,
    pub answers: AnswerReading,
    pub page_markers_found: usize,
    pub block_markers_found: usize,
    /// The page was perspective-corrected from four corner marks.
    pub page_corrected: bool,
    pub answer_tier: RegionTier,
    pub identity_tier: RegionTier,
    pub duration_ms: u64,
}

impl SheetReading {
    pub fn to_result(&self) -> ProcessResult {
        ProcessResult {
            student_id: self.identity.student_id(),
            test_id: self.identity.test_id(),
            answers: self.answers.texts(),
            answer_confidences: self.answers.confidences.clone(),
            student_id_confidence: self.identity.student.confidence,
            test_id_confidence: self.identity.test.confidence,
            page_markers_found: self.page_markers_found,
            block_markers_found: self.block_markers_found,
            answer_tier: Some(self.answer_tier),
            identity_tier: Some(self.identity_tier),
            duration_ms: self.duration_ms,
            success: true,
            error: None,
        }
    }
}

impl From<SheetReading> for ProcessResult {
    fn from(r: SheetReading) -> Self {
        r.to_result()
    }
}

/// Externally supplied answer key, handed through to storage untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerKey {
    pub test_id: Option<String>,
    pub answers: Vec<String>,
}

/// Persistence collaborator. Nothing here grades.
pub trait ResultSink {
    type Error;

    fn store(&mut self, result: &ProcessResult, key: Option<&AnswerKey>) -> Result<(), Self::Error>;
}

/// One JSON object per line: `{"result": ..., "key": ...}`.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    out: W,
}

#[derive(Serialize)]
struct Record<'a> {
    result: &'a ProcessResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a AnswerKey>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for JsonLinesSink<W> {
    type Error = std::io::Error;

    fn store(&mut self, result: &ProcessResult, key: Option<&AnswerKey>) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, &Record { result, key })?;
        self.out.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_has_blank_answers() {
        let r = ProcessResult::failed(60, "empty image", 3);
        assert!(!r.success);
        assert_eq!(r.answers.len(), 60);
        assert!(r.answers.iter().all(String::is_empty));
        assert_eq!(r.error.as_deref(), Some("empty image"));
    }

    #[test]
    fn json_lines_sink_writes_one_line_per_result() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let key = AnswerKey {
            test_id: Some("0042".into()),
            answers: vec!["A".into(), "C".into()],
        };
        sink.store(&ProcessResult::failed(2, "x", 0), None).unwrap();
        sink.store(&ProcessResult::failed(2, "y", 0), Some(&key)).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["key"]["test_id"], "0042");
        assert_eq!(second["result"]["error"], "y");
        assert!(serde_json::from_str::<serde_json::Value>(lines[0]).unwrap()["key"].is_null());
    }
}
