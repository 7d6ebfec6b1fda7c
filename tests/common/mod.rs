//! Shared test helpers and scripted fetcher.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use convosync::config::SyncConfig;
use convosync::engine::SyncEngine;
use convosync::error::SyncError;
use convosync::fetcher::SnapshotFetcher;
use convosync::render::RecordingRenderer;
use convosync::types::{Conversation, ConversationId, Message};

#[derive(Default)]
struct Script {
    conversations: Vec<Conversation>,
    histories: HashMap<ConversationId, Vec<Message>>,
    flags: HashMap<ConversationId, bool>,
    fail_list: bool,
    fail_flags: bool,
    fail_history: bool,
    fail_set_flag: bool,
    list_delay: Option<Duration>,
    history_delays: HashMap<ConversationId, Duration>,
}

/// In-memory backend whose snapshots and failures are set by the test.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<Script>,
    list_calls: AtomicUsize,
    flag_calls: AtomicUsize,
    history_calls: AtomicUsize,
    set_flag_calls: AtomicUsize,
}

pub fn id(s: &str) -> ConversationId {
    ConversationId::new(s)
}

pub fn history(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            let ts = 1_700_000_000 + i as i64;
            if i % 2 == 0 {
                Message::incoming(format!("inbound {i}"), ts)
            } else {
                Message::outgoing(format!("reply {i}"), ts)
            }
        })
        .collect()
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the list snapshot. Flags default to enabled; each row reports
    /// the scripted flag at fetch time.
    pub fn set_list(&self, ids: &[&str]) {
        let mut script = self.script.lock().unwrap();
        script.conversations = ids
            .iter()
            .map(|id| Conversation::new(*id, true).with_preview(format!("last from {id}")))
            .collect();
        for id in ids {
            script.flags.entry(ConversationId::new(*id)).or_insert(true);
        }
    }

    pub fn set_history(&self, conversation: &str, messages: Vec<Message>) {
        self.script
            .lock()
            .unwrap()
            .histories
            .insert(id(conversation), messages);
    }

    pub fn push_message(&self, conversation: &str, message: Message) {
        self.script
            .lock()
            .unwrap()
            .histories
            .entry(id(conversation))
            .or_default()
            .push(message);
    }

    pub fn set_flag_value(&self, conversation: &str, enabled: bool) {
        self.script
            .lock()
            .unwrap()
            .flags
            .insert(id(conversation), enabled);
    }

    pub fn backend_flag(&self, conversation: &str) -> Option<bool> {
        self.script.lock().unwrap().flags.get(&id(conversation)).copied()
    }

    pub fn backend_history(&self, conversation: &str) -> Vec<Message> {
        self.script
            .lock()
            .unwrap()
            .histories
            .get(&id(conversation))
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_list(&self, fail: bool) {
        self.script.lock().unwrap().fail_list = fail;
    }

    pub fn fail_flags(&self, fail: bool) {
        self.script.lock().unwrap().fail_flags = fail;
    }

    pub fn fail_history(&self, fail: bool) {
        self.script.lock().unwrap().fail_history = fail;
    }

    pub fn fail_set_flag(&self, fail: bool) {
        self.script.lock().unwrap().fail_set_flag = fail;
    }

    pub fn delay_list(&self, delay: Option<Duration>) {
        self.script.lock().unwrap().list_delay = delay;
    }

    pub fn delay_history(&self, conversation: &str, delay: Duration) {
        self.script
            .lock()
            .unwrap()
            .history_delays
            .insert(id(conversation), delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn flag_calls(&self) -> usize {
        self.flag_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn set_flag_calls(&self) -> usize {
        self.set_flag_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, SyncError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        // The snapshot is taken when the request arrives; a delay models a
        // slow response carrying that older state.
        let (result, delay) = {
            let script = self.script.lock().unwrap();
            let result = if script.fail_list {
                Err(SyncError::fetch("conversation list", "backend unavailable"))
            } else {
                Ok(script
                    .conversations
                    .iter()
                    .map(|c| Conversation {
                        enabled: script.flags.get(&c.id).copied().unwrap_or(true),
                        ..c.clone()
                    })
                    .collect())
            };
            (result, script.list_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn get_history(&self, conversation: &ConversationId) -> Result<Vec<Message>, SyncError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .script
            .lock()
            .unwrap()
            .history_delays
            .get(conversation)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let script = self.script.lock().unwrap();
        if script.fail_history {
            return Err(SyncError::fetch(
                format!("history of {conversation}"),
                "backend unavailable",
            ));
        }
        Ok(script.histories.get(conversation).cloned().unwrap_or_default())
    }

    async fn get_flag(&self, conversation: &ConversationId) -> Result<bool, SyncError> {
        self.flag_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        if script.fail_flags {
            return Err(SyncError::fetch(
                format!("flag of {conversation}"),
                "backend unavailable",
            ));
        }
        Ok(script.flags.get(conversation).copied().unwrap_or(true))
    }

    async fn set_flag(&self, conversation: &ConversationId, enabled: bool) -> Result<(), SyncError> {
        self.set_flag_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.fail_set_flag {
            return Err(SyncError::stale_write(conversation, "write rejected"));
        }
        script.flags.insert(conversation.clone(), enabled);
        Ok(())
    }

    async fn append_outbound(&self, conversation: &ConversationId, text: &str) -> Result<(), SyncError> {
        let mut script = self.script.lock().unwrap();
        let history = script.histories.entry(conversation.clone()).or_default();
        let ts = history.last().map(|m| m.timestamp + 1).unwrap_or(1_700_000_000);
        history.push(Message::outgoing(text, ts));
        Ok(())
    }

    async fn clear_history(&self, conversation: &ConversationId) -> Result<(), SyncError> {
        self.script.lock().unwrap().histories.remove(conversation);
        Ok(())
    }
}

pub fn engine_with(
    fetcher: &Arc<ScriptedFetcher>,
    config: SyncConfig,
) -> SyncEngine<RecordingRenderer> {
    SyncEngine::new(config, fetcher.clone(), RecordingRenderer::default())
}

pub fn engine(fetcher: &Arc<ScriptedFetcher>) -> SyncEngine<RecordingRenderer> {
    engine_with(fetcher, SyncConfig::default())
}
