use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use wv_scale::{ReadError, WeightSource};
use wv_schemas::WeightReading;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Weight(f64),
    Fail(ReadError),
    /// Never answers; the controller's read timeout applies.
    Hang,
}

/// Weight source that plays a script, then repeats a fallback step forever.
#[derive(Debug)]
pub struct ScriptedScale {
    script: Mutex<VecDeque<ScriptStep>>,
    fallback: Mutex<ScriptStep>,
    reads: AtomicUsize,
}

impl ScriptedScale {
    /// Always reports `weight`.
    pub fn steady(weight: f64) -> Self {
        Self::scripted(Vec::new(), ScriptStep::Weight(weight))
    }

    /// Always fails with a connection error.
    pub fn unreachable() -> Self {
        Self::scripted(
            Vec::new(),
            ScriptStep::Fail(ReadError::Connection("connection refused".to_string())),
        )
    }

    pub fn scripted(steps: Vec<ScriptStep>, fallback: ScriptStep) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fallback: Mutex::new(fallback),
            reads: AtomicUsize::new(0),
        }
    }

    /// Replace what the scale reports once the script is exhausted.
    pub fn set_fallback(&self, step: ScriptStep) {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) = step;
    }

    pub fn push(&self, step: ScriptStep) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> ScriptStep {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| {
            self.fallback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }
}

#[async_trait::async_trait]
impl WeightSource for ScriptedScale {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn read(&self) -> Result<WeightReading, ReadError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            ScriptStep::Weight(w) => Ok(WeightReading::new(w, Utc::now())),
            ScriptStep::Fail(e) => Err(e),
            ScriptStep::Hang => std::future::pending().await,
        }
    }
}
