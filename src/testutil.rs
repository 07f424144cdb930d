//! Shared fakes and helpers for unit tests

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::host::{HostCommand, HostShell};
use crate::messages::{MessageBus, MessageSender, Request, Response};

/// Host shim fake that records every dispatched command.
#[derive(Default)]
pub(crate) struct RecordingHost {
    commands: Mutex<Vec<HostCommand>>,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn commands(&self) -> Vec<HostCommand> {
        self.commands.lock().await.clone()
    }
}

#[async_trait]
impl HostShell for RecordingHost {
    async fn dispatch(&self, command: HostCommand) -> anyhow::Result<()> {
        self.commands.lock().await.push(command);
        Ok(())
    }
}

type BusScript = dyn Fn(&Request) -> anyhow::Result<Response> + Send + Sync;

/// Message bus fake with a scripted response and a request log.
pub(crate) struct ScriptedBus {
    requests: Mutex<Vec<(Request, MessageSender)>>,
    script: Box<BusScript>,
}

impl ScriptedBus {
    pub(crate) fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Request) -> anyhow::Result<Response> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    /// Bus that acknowledges saves and reports the given auth state.
    pub(crate) fn authenticated(uid: Option<&str>) -> Arc<Self> {
        let uid = uid.map(str::to_string);
        Self::new(move |request| match request {
            Request::GetAuthStatus => Ok(Response::AuthStatus {
                is_authenticated: uid.is_some(),
                user: uid.clone().map(|uid| crate::messages::AuthUser { uid }),
            }),
            _ => Ok(Response::ack()),
        })
    }

    pub(crate) async fn requests(&self) -> Vec<(Request, MessageSender)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl MessageBus for ScriptedBus {
    async fn send(&self, request: Request, sender: MessageSender) -> anyhow::Result<Response> {
        let response = (self.script)(&request);
        self.requests.lock().await.push((request, sender));
        response
    }
}

/// Poll a condition until it holds, failing the test after a few seconds.
pub(crate) async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within timeout");
}
