//! Shared wiring for controller scenarios: the real controller over the fakes.
#![allow(dead_code)]

use std::sync::Arc;

use wv_audit::AuditWriter;
use wv_config::StationConfig;
use wv_runtime::{print_gate, Collaborators, ReconciliationController, StationStatus};
use wv_schemas::Header;
use wv_testkit::{CallLog, MemoryLineStore, PrintMode, RecordingPrintSink, ScriptedScale, StaticHeaderStore};

pub struct Rig {
    pub ctl: ReconciliationController,
    pub scale: Arc<ScriptedScale>,
    pub store: Arc<MemoryLineStore>,
    pub headers: Arc<StaticHeaderStore>,
    pub sink: Arc<RecordingPrintSink>,
    pub log: CallLog,
}

impl Rig {
    pub fn new(scale: ScriptedScale, headers: Vec<Header>, mode: PrintMode) -> Self {
        Self::build(scale, headers, mode, StationConfig::default(), None)
    }

    pub fn build(
        scale: ScriptedScale,
        headers: Vec<Header>,
        mode: PrintMode,
        config: StationConfig,
        audit: Option<AuditWriter>,
    ) -> Self {
        let log = CallLog::new();
        let scale = Arc::new(scale);
        let store = Arc::new(MemoryLineStore::with_log(log.clone()));
        let headers = Arc::new(StaticHeaderStore::new(headers));
        let sink = Arc::new(RecordingPrintSink::with_log(mode, log.clone()));
        let printer = print_gate(sink.clone(), &config);

        let mut builder = ReconciliationController::builder(
            Collaborators {
                scale: scale.clone(),
                lines: store.clone(),
                headers: headers.clone(),
                printer,
            },
            config,
        );
        if let Some(writer) = audit {
            builder = builder.audit(writer);
        }
        let ctl = builder.build();

        Self {
            ctl,
            scale,
            store,
            headers,
            sink,
            log,
        }
    }

    /// Wait (in virtual time) until the published status satisfies `pred`.
    pub async fn wait_until(&self, pred: impl FnMut(&StationStatus) -> bool) -> StationStatus {
        let mut rx = self.ctl.subscribe();
        let status = rx.wait_for(pred).await.expect("status channel closed").clone();
        status
    }

    pub async fn wait_decided(&self) -> StationStatus {
        self.wait_until(|s| s.verdict.is_decided()).await
    }
}
