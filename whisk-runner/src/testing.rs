//! In-memory collaborators for lifecycle tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;
use whisk_client::{ActionApi, ClientError};
use whisk_core::domain::action::ActionDetail;
use whisk_core::domain::activation::ActivationResult;
use whisk_core::dto::action::ActionDefinition;
use whisk_core::dto::activation::{ActivationDetail, ActivationResponse};
use whisk_core::dto::invocation::InvocationRequest;

use crate::logs::LogTailer;
use crate::wait::{EchoSink, Stream};

/// Activation body with the given process status and return code
pub fn activation(status: Option<&str>, return_code: Option<i32>) -> ActivationDetail {
    ActivationDetail {
        activation_id: Some("abc123".to_string()),
        response: ActivationResponse {
            status: Some("success".to_string()),
            success: Some(true),
            result: ActivationResult {
                process_status: status.map(str::to_string),
                return_code,
                ..Default::default()
            },
        },
    }
}

#[derive(Default)]
struct FakeState {
    actions: HashMap<(String, String), ActionDetail>,
    deploys: Vec<ActionDefinition>,
    triggers: Vec<InvocationRequest>,
    trigger_response: Option<String>,
    activations: VecDeque<Result<ActivationDetail, ClientError>>,
    activation_fetches: u32,
    deploy_error: Option<ClientError>,
    trigger_error: Option<ClientError>,
    action_detail_error: Option<ClientError>,
}

/// Platform fake: stores deployed actions, records triggers and replays
/// scripted activation replies, answering 404 once the script runs out
#[derive(Default)]
pub struct FakeActionApi {
    state: Mutex<FakeState>,
}

impl FakeActionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_trigger_response(&self, body: &str) {
        self.state.lock().unwrap().trigger_response = Some(body.to_string());
    }

    pub fn push_activation(&self, reply: Result<ActivationDetail, ClientError>) {
        self.state.lock().unwrap().activations.push_back(reply);
    }

    /// The next deploy fails with `error`
    pub fn fail_deploy(&self, error: ClientError) {
        self.state.lock().unwrap().deploy_error = Some(error);
    }

    /// The next trigger fails with `error`
    pub fn fail_trigger(&self, error: ClientError) {
        self.state.lock().unwrap().trigger_error = Some(error);
    }

    /// The next action lookup fails with `error`
    pub fn fail_action_detail(&self, error: ClientError) {
        self.state.lock().unwrap().action_detail_error = Some(error);
    }

    pub fn deploys(&self) -> Vec<ActionDefinition> {
        self.state.lock().unwrap().deploys.clone()
    }

    pub fn triggers(&self) -> Vec<InvocationRequest> {
        self.state.lock().unwrap().triggers.clone()
    }

    pub fn activation_fetches(&self) -> u32 {
        self.state.lock().unwrap().activation_fetches
    }
}

#[async_trait]
impl ActionApi for FakeActionApi {
    async fn deploy_action(&self, definition: &ActionDefinition) -> whisk_client::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.deploy_error.take() {
            return Err(error);
        }
        state.deploys.push(definition.clone());
        state.actions.insert(
            (definition.namespace.clone(), definition.name.clone()),
            ActionDetail {
                name: definition.name.clone(),
                namespace: definition.namespace.clone(),
                version: Some("0.0.1".to_string()),
                annotations: definition.annotations.clone(),
            },
        );
        Ok(())
    }

    async fn execute_action(&self, request: &InvocationRequest) -> whisk_client::Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.trigger_error.take() {
            return Err(error);
        }
        state.triggers.push(request.clone());
        Ok(state
            .trigger_response
            .clone()
            .unwrap_or_else(|| r#"{"activationId":"abc123"}"#.to_string()))
    }

    async fn get_action_detail(
        &self,
        namespace: &str,
        name: &str,
    ) -> whisk_client::Result<ActionDetail> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.action_detail_error.take() {
            return Err(error);
        }
        state
            .actions
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::api_error(404, "The requested resource does not exist."))
    }

    async fn get_activation_detail(
        &self,
        _namespace: &str,
        _activation_id: &str,
    ) -> whisk_client::Result<ActivationDetail> {
        let mut state = self.state.lock().unwrap();
        state.activation_fetches += 1;
        state
            .activations
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::api_error(404, "The requested resource does not exist.")))
    }
}

/// Echo sink that keeps every message
#[derive(Default)]
pub struct RecordingEcho {
    messages: Mutex<Vec<(String, Stream, String)>>,
}

impl RecordingEcho {
    pub fn messages(&self) -> Vec<(String, Stream, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl EchoSink for RecordingEcho {
    fn echo(&self, message: &str, stream: Stream, job_id: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), stream, job_id.to_string()));
    }
}

/// Tailer over a fixed set of lines, all returned by the first read
#[derive(Default)]
pub struct MemoryLogTailer {
    pending: Vec<String>,
}

impl MemoryLogTailer {
    pub fn new<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            pending: lines.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogTailer for MemoryLogTailer {
    async fn tail(&mut self) -> io::Result<Vec<String>> {
        Ok(std::mem::take(&mut self.pending))
    }
}
