//! External stop signals checked between driver steps

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::Result;

/// Asked at every loop boundary whether a run should stop
#[async_trait]
pub trait SignalChecker: Send + Sync {
    async fn should_stop(&self, session_id: &str) -> Result<bool>;
}

/// Never stops anything
pub struct NoOpSignalChecker;

#[async_trait]
impl SignalChecker for NoOpSignalChecker {
    async fn should_stop(&self, _session_id: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Shared flag that stops every run watching it (tripped on Ctrl-C)
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl SignalChecker for CancelSignal {
    async fn should_stop(&self, _session_id: &str) -> Result<bool> {
        Ok(self.is_cancelled())
    }
}
