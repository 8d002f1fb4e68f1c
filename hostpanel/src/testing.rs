//! Scripted probes for driving pollers under paused time.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::liveness::Liveness;
use crate::ports::{LivenessProbe, ProbeFactory};

/// Returns queued results in order, repeating the last one once the queue drains
pub struct ScriptedProbe {
    target: String,
    script: Mutex<VecDeque<Liveness>>,
    last: Mutex<Liveness>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedProbe {
    pub fn new(script: &[Liveness]) -> Self {
        Self {
            target: "scripted".to_string(),
            script: Mutex::new(script.iter().copied().collect()),
            last: Mutex::new(Liveness::Unknown),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every check takes `delay` before answering
    pub fn slow(script: &[Liveness], delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(script)
        }
    }

    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LivenessProbe for ScriptedProbe {
    fn target(&self) -> &str {
        &self.target
    }

    async fn probe(&self) -> Liveness {
        self.calls.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(value) = next {
            *last = value;
        }
        *last
    }
}

/// Hands out one shared scripted probe and counts how many probes were built
pub struct CountingFactory {
    pub probe: Arc<ScriptedProbe>,
    built: AtomicUsize,
}

impl CountingFactory {
    pub fn new(probe: ScriptedProbe) -> Self {
        Self {
            probe: Arc::new(probe),
            built: AtomicUsize::new(0),
        }
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl ProbeFactory for CountingFactory {
    fn probe_for(&self, _url: &str) -> Arc<dyn LivenessProbe> {
        self.built.fetch_add(1, Ordering::SeqCst);
        self.probe.clone()
    }
}
