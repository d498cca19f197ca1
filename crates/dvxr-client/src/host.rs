//! Frame driver and input queue.
//!
//! The [`Host`] owns the orchestrator and must stay on the task that runs
//! it. Everything else talks to it through a [`HostHandle`], which is `Send`
//! and cheap to clone.

use std::time::Duration;

use anyhow::Context;
use dvxr_common::config::AppConfig;
use dvxr_session::auth::HandshakeSlot;
use dvxr_session::{Orchestrator, Platform};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::action::Action;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostInput {
    Action(Action),
    Resize { width: u32, height: u32 },
    Shutdown,
}

#[derive(Clone)]
pub struct HostHandle {
    inputs: mpsc::UnboundedSender<HostInput>,
    handshake: HandshakeSlot,
}

impl HostHandle {
    /// Queue an action. Returns `false` once the host has stopped.
    pub fn dispatch(&self, action: Action) -> bool {
        self.inputs.send(HostInput::Action(action)).is_ok()
    }

    /// Queue the action behind a page button. Unknown ids are ignored.
    pub fn click(&self, element_id: &str) -> bool {
        match Action::from_element_id(element_id) {
            Some(action) => self.dispatch(action),
            None => {
                tracing::debug!(element_id, "Click on unknown element");
                false
            }
        }
    }

    pub fn resize(&self, width: u32, height: u32) -> bool {
        self.inputs.send(HostInput::Resize { width, height }).is_ok()
    }

    /// Hand a window message to the pending login handshake.
    pub fn post_message(&self, data: &Value) -> bool {
        self.handshake.deliver_json(data)
    }

    pub fn shutdown(&self) {
        let _ = self.inputs.send(HostInput::Shutdown);
    }
}

pub struct Host {
    orchestrator: Orchestrator,
    inputs: mpsc::UnboundedReceiver<HostInput>,
    frame_interval: Duration,
}

impl Host {
    pub fn new(config: AppConfig, platform: Platform) -> anyhow::Result<(Self, HostHandle)> {
        let frame_rate = config.render.frame_rate.max(1);
        let orchestrator =
            Orchestrator::new(config, platform).context("failed to set up orchestrator")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = HostHandle {
            inputs: tx,
            handshake: orchestrator.handshake(),
        };
        let host = Self {
            orchestrator,
            inputs: rx,
            frame_interval: Duration::from_secs(1) / frame_rate,
        };
        Ok((host, handle))
    }

    pub fn orchestrator(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    /// Render frames and apply inputs until shut down, then disconnect and
    /// hand the orchestrator back.
    pub async fn run(mut self) -> Orchestrator {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = self.frame_interval.as_millis() as u64, "Host running");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let time_ms = started.elapsed().as_secs_f64() * 1000.0;
                    self.orchestrator.frame(time_ms);
                }
                input = self.inputs.recv() => match input {
                    Some(HostInput::Action(action)) => self.perform(action),
                    Some(HostInput::Resize { width, height }) => self.orchestrator.resize(width, height),
                    Some(HostInput::Shutdown) | None => break,
                },
            }
        }

        self.orchestrator.disconnect();
        tracing::info!(frames = self.orchestrator.render_loop().frames(), "Host stopped");
        self.orchestrator
    }

    fn perform(&mut self, action: Action) {
        tracing::debug!(?action, "Performing action");
        if let Err(e) = action.apply(&mut self.orchestrator) {
            tracing::debug!(code = e.error_code(), "Action not performed: {e}");
        }
    }
}
