//! Chat sources. The real transport is an external collaborator; what ships
//! here is a JSONL replay source for backtesting and demos, plus an
//! in-memory source used by tests.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use signal_core::{ChannelInfo, ChatSource, MessageEvent};

/// Replays `MessageEvent` JSON lines from a file, oldest first.
pub struct ReplaySource {
    events: VecDeque<MessageEvent>,
}

impl ReplaySource {
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut events: Vec<MessageEvent> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("Skipping malformed replay line: {}", e);
                    None
                }
            })
            .collect();

        // Historical exports arrive newest-first; replay oldest-first.
        events.sort_by_key(|e: &MessageEvent| e.timestamp);
        tracing::info!("Replay source loaded {} message(s) from {}", events.len(), path.display());
        Ok(Self {
            events: events.into(),
        })
    }
}

#[async_trait]
impl ChatSource for ReplaySource {
    async fn next_message(&mut self) -> Option<MessageEvent> {
        self.events.pop_front()
    }

    async fn is_channel_accessible(&self, _channel_id: i64) -> bool {
        true
    }

    async fn channel_info(&self, channel_id: i64) -> Option<ChannelInfo> {
        Some(ChannelInfo {
            id: channel_id,
            title: format!("replay-{}", channel_id),
            username: None,
            participants_count: None,
            is_broadcast: true,
        })
    }
}

/// In-memory source for tests.
pub struct StaticSource {
    events: VecDeque<MessageEvent>,
}

impl StaticSource {
    pub fn new(events: Vec<MessageEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

#[async_trait]
impl ChatSource for StaticSource {
    async fn next_message(&mut self) -> Option<MessageEvent> {
        self.events.pop_front()
    }

    async fn is_channel_accessible(&self, _channel_id: i64) -> bool {
        true
    }

    async fn channel_info(&self, _channel_id: i64) -> Option<ChannelInfo> {
        None
    }
}
