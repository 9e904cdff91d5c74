//! Scripted collaborators for pipeline and launcher tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use xapp_core::llm::{CodeGenerator, GenerationRequest};
use xapp_core::sandbox::{SandboxHandle, SandboxProvider};
use xapp_core::{
    BuildEvent, BuildStage, GenerationError, ProvisioningError, ReleaseError, WriteError,
};

enum Reply {
    Text(String),
    Fail(fn() -> GenerationError),
    Panic,
}

pub(crate) struct FakeGenerator {
    reply: Reply,
    gate: Option<Arc<Notify>>,
}

impl FakeGenerator {
    pub(crate) fn reply(text: &str) -> Self {
        Self {
            reply: Reply::Text(text.to_string()),
            gate: None,
        }
    }

    pub(crate) fn fail(err: fn() -> GenerationError) -> Self {
        Self {
            reply: Reply::Fail(err),
            gate: None,
        }
    }

    pub(crate) fn panics() -> Self {
        Self {
            reply: Reply::Panic,
            gate: None,
        }
    }

    /// Hold every generate call until `gate` is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl CodeGenerator for FakeGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<String, GenerationError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(err) => Err(err()),
            Reply::Panic => panic!("generator exploded"),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SandboxFault {
    Acquire,
    Write,
    Release,
}

#[derive(Default)]
pub(crate) struct FakeSandboxProvider {
    fault: Option<SandboxFault>,
    releases: Arc<AtomicUsize>,
    writes: Arc<Mutex<Vec<String>>>,
}

impl FakeSandboxProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_fault(fault: SandboxFault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::default()
        }
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn written_paths(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxProvider for FakeSandboxProvider {
    async fn acquire(&self) -> Result<Box<dyn SandboxHandle>, ProvisioningError> {
        if self.fault == Some(SandboxFault::Acquire) {
            return Err(ProvisioningError::Unavailable("no capacity".into()));
        }
        Ok(Box::new(FakeSandbox {
            fault: self.fault,
            releases: Arc::clone(&self.releases),
            writes: Arc::clone(&self.writes),
        }))
    }
}

struct FakeSandbox {
    fault: Option<SandboxFault>,
    releases: Arc<AtomicUsize>,
    writes: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SandboxHandle for FakeSandbox {
    fn id(&self) -> &str {
        "fake-sandbox"
    }

    async fn write(&mut self, path: &Path, _contents: &str) -> Result<(), WriteError> {
        if self.fault == Some(SandboxFault::Write) {
            return Err(WriteError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        self.writes
            .lock()
            .unwrap()
            .push(path.to_string_lossy().into_owned());
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), ReleaseError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fault == Some(SandboxFault::Release) {
            return Err(ReleaseError::Other("teardown refused".into()));
        }
        Ok(())
    }
}

/// Drain every queued wire line and decode it.
pub(crate) fn collect_events(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<BuildEvent> {
    let mut events = Vec::new();
    while let Ok(line) = rx.try_recv() {
        assert!(line.ends_with('\n'), "wire lines are newline-terminated");
        events.push(serde_json::from_str(line.trim_end()).unwrap());
    }
    events
}

/// Stage markers of transition events, in emission order.
pub(crate) fn stages(events: &[BuildEvent]) -> Vec<BuildStage> {
    events
        .iter()
        .filter(|e| e.is_transition())
        .map(|e| e.stage)
        .collect()
}
