//! Scripted delivery client shared by the unit and scheduler tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::client::{DeliveryClient, DeliveryError, DeliveryOutcome, DeliveryRequest};

#[derive(Debug, Clone)]
pub enum Reply {
    Accept(Option<&'static str>),
    Reject(u16),
    Malformed,
    /// Never answers within `Duration`.
    Hang(Duration),
}

/// Replies per destination in order; an exhausted script rejects with 500.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, to: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(to.to_string(), replies.into_iter().collect());
        self
    }

    pub fn calls_to(&self, to: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(dest, _)| dest == to)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DeliveryClient for ScriptedClient {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryOutcome, DeliveryError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.to.clone(), Instant::now()));

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.to)
            .and_then(|q| q.pop_front())
            .unwrap_or(Reply::Reject(500));

        match reply {
            Reply::Accept(id) => Ok(DeliveryOutcome::Accepted {
                message_id: id.map(str::to_string),
            }),
            Reply::Reject(status) => Ok(DeliveryOutcome::Rejected { status }),
            Reply::Malformed => Err(DeliveryError::MalformedBody("expected value".to_string())),
            Reply::Hang(d) => {
                tokio::time::sleep(d).await;
                Ok(DeliveryOutcome::Rejected { status: 504 })
            }
        }
    }
}
