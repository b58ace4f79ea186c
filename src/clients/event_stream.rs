//! 服务端推送 (text/event-stream) 解码
//!
//! 只关心 `data:` 行；空行表示一条事件结束，多行 data 以换行拼接

use std::collections::VecDeque;

use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::error::{AppError, AppResult};
use crate::models::StreamMessage;

/// 增量解码器
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一段字节，返回其中已经完整的事件数据
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = self.handle_line(line) {
                events.push(data);
            }
        }
        events
    }

    /// 流结束时取出尚未以空行结束的事件
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest).to_string();
            if let Some(data) = self.handle_line(rest.trim_end_matches('\r')) {
                return Some(data);
            }
        }
        self.dispatch()
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data_lines
                .push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data_lines).join("\n"))
    }
}

struct DecodeState {
    bytes: BoxStream<'static, AppResult<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// 把字节流解码为推送消息流
pub fn decode_event_stream(
    bytes: BoxStream<'static, AppResult<Vec<u8>>>,
) -> BoxStream<'static, AppResult<StreamMessage>> {
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                let message = serde_json::from_str::<StreamMessage>(&data).map_err(AppError::from);
                return Some((message, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    if let Some(data) = state.decoder.finish() {
                        state.pending.push_back(data);
                    }
                }
            }
        }
    })
    .boxed()
}
