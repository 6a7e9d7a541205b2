//! 测试用的探测器与消息通道

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{BeaconError, BeaconResult};
use crate::messaging::{MessageChannel, OutgoingMessage};
use crate::persistence::JobStatus;
use crate::sabnzbd::{ProbeProgress, ProbeReport, StatusProbe};

/// 探测脚本中的一步
#[derive(Debug, Clone)]
pub enum ProbeStep {
    Report(ProbeReport),
    Unavailable(String),
}

impl ProbeStep {
    pub fn status(status: JobStatus, progress: &str) -> Self {
        Self::Report(ProbeReport {
            status,
            progress: ProbeProgress::Marker(progress.to_string()),
        })
    }

    pub fn deleted() -> Self {
        Self::Report(ProbeReport::deleted())
    }
}

/// 按脚本返回结果的探测器，脚本用完后重复最后一步
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    steps: Mutex<VecDeque<ProbeStep>>,
    last: Mutex<Option<ProbeStep>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new(steps: Vec<ProbeStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    /// 每次调用时的下载队列 ID
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn probe(&self, external_id: &str) -> BeaconResult<ProbeReport> {
        self.calls.lock().push(external_id.to_string());

        let step = {
            let next = self.steps.lock().pop_front();
            let mut last = self.last.lock();
            if let Some(step) = next {
                *last = Some(step);
            }
            last.clone()
        };

        match step {
            Some(ProbeStep::Report(report)) => Ok(report),
            Some(ProbeStep::Unavailable(msg)) => Err(BeaconError::ProbeUnavailable(msg)),
            None => Err(BeaconError::ProbeUnavailable("empty script".to_string())),
        }
    }
}

/// 通道调用记录
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Send { chat_id: i64, message: OutgoingMessage },
    Edit { chat_id: i64, message_id: i64, text: String },
    Delete { chat_id: i64, message_id: i64 },
    Answer { callback_id: String, text: String },
}

/// 记录所有调用的消息通道
#[derive(Debug)]
pub struct RecordingChannel {
    calls: Mutex<Vec<RecordedCall>>,
    next_message_id: AtomicI64,
    fail_edits: AtomicBool,
    fail_sends: AtomicBool,
    fail_answers: AtomicBool,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1000),
            fail_edits: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            fail_answers: AtomicBool::new(false),
        }
    }
}

impl RecordingChannel {
    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_answers(&self, fail: bool) {
        self.fail_answers.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// 所有编辑过的文本（按顺序）
    pub fn edits(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Edit { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Send { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> BeaconResult<i64> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BeaconError::Delivery("send rejected".to_string()));
        }
        self.calls.lock().push(RecordedCall::Send {
            chat_id,
            message: message.clone(),
        });
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> BeaconResult<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(BeaconError::Delivery("edit rejected".to_string()));
        }
        self.calls.lock().push(RecordedCall::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> BeaconResult<()> {
        self.calls
            .lock()
            .push(RecordedCall::Delete { chat_id, message_id });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> BeaconResult<()> {
        if self.fail_answers.load(Ordering::SeqCst) {
            return Err(BeaconError::Delivery("answer rejected".to_string()));
        }
        self.calls.lock().push(RecordedCall::Answer {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
