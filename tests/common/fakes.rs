use std::sync::Mutex;

use async_trait::async_trait;
use session_orchestrator::ai_client::{AiClient, EliminationDecision};
use session_orchestrator::broadcaster::Broadcaster;
use session_orchestrator::domain::{EliminatedPlayer, LobbyId, SessionId};
use session_orchestrator::error::AiError;

/// A decision oracle double: returns a fixed topic or a fixed elimination
/// list, or fails, depending on how the test wires it up.
pub struct FakeAiClient {
    pub topic: Mutex<Option<String>>,
    pub eliminated: Mutex<Vec<EliminatedPlayer>>,
    pub fail_topic: bool,
    pub fail_eliminations: bool,
}

impl FakeAiClient {
    pub fn new() -> Self {
        Self {
            topic: Mutex::new(Some("Test topic".to_owned())),
            eliminated: Mutex::new(Vec::new()),
            fail_topic: false,
            fail_eliminations: false,
        }
    }

    pub fn failing_topic() -> Self {
        Self {
            fail_topic: true,
            ..Self::new()
        }
    }

    pub fn eliminating(wallet: &str) -> Self {
        let mut client = Self::new();
        client.eliminated = Mutex::new(vec![EliminatedPlayer {
            participant: wallet.to_owned(),
            reason: Some("test elimination".to_owned()),
        }]);
        client
    }
}

#[async_trait]
impl AiClient for FakeAiClient {
    async fn round_announcement(
        &self,
        _agent_id: &str,
        _round_number: u32,
    ) -> Result<String, AiError> {
        if self.fail_topic {
            return Err(AiError::Network("simulated failure".to_owned()));
        }
        Ok(self.topic.lock().unwrap().clone().unwrap_or_default())
    }

    async fn decide_eliminations(
        &self,
        _agent_id: &str,
        _session_id: SessionId,
        _lobby_id: LobbyId,
        _max_rounds: u32,
        _current_round: u32,
    ) -> Result<EliminationDecision, AiError> {
        if self.fail_eliminations {
            return Err(AiError::Network("simulated failure".to_owned()));
        }
        let eliminated = self.eliminated.lock().unwrap().clone();
        Ok(EliminationDecision {
            success: true,
            eliminated,
        })
    }
}

pub struct CapturedEvent {
    pub channel: String,
    pub event_name: String,
    pub payload: serde_json::Value,
}

/// Captures every published event instead of sending it anywhere, so tests
/// can assert on exactly what the worker announced.
pub struct FakeBroadcaster {
    pub events: Mutex<Vec<CapturedEvent>>,
}

impl FakeBroadcaster {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events_on(&self, channel: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.channel == channel)
            .map(|e| e.event_name.clone())
            .collect()
    }
}

#[async_trait]
impl Broadcaster for FakeBroadcaster {
    async fn publish(&self, channel: &str, event_name: &str, payload: serde_json::Value) {
        self.events.lock().unwrap().push(CapturedEvent {
            channel: channel.to_owned(),
            event_name: event_name.to_owned(),
            payload,
        });
    }
}
