use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use wv_schemas::{Header, HeaderId, LineCorrection, NewLine, WeightLine};
use wv_store::{HeaderStore, LineHistory, LineStore, StoreError};

use crate::CallLog;

#[derive(Debug, Default)]
struct Lines {
    lines: Vec<WeightLine>,
    next_id: i64,
    next_index: HashMap<HeaderId, u32>,
}

/// Line store that assigns ids, serials and carton numbers the way a real
/// backend would: per header, monotonically, never reused.
///
/// Writes can be held open with [`MemoryLineStore::hold_writes`] so a test can
/// act while a create is in flight.
#[derive(Debug, Default)]
pub struct MemoryLineStore {
    state: Mutex<Lines>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    failures: Mutex<VecDeque<StoreError>>,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
    log: Option<CallLog>,
}

impl MemoryLineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Number of `create` calls received, including failed ones.
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn lines(&self) -> Vec<WeightLine> {
        self.lock().lines.clone()
    }

    /// The next write fails with `err` (queued; one per call).
    pub fn fail_next(&self, err: StoreError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(err);
    }

    /// Writes block after being counted until [`Self::release_one`].
    pub fn hold_writes(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_one(&self) {
        self.release.notify_one();
    }

    /// Resolves once a write has entered the store.
    pub async fn write_entered(&self) {
        self.entered.notified().await;
    }

    fn lock(&self) -> MutexGuard<'_, Lines> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn gate(&self) -> Result<(), StoreError> {
        self.entered.notify_one();
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        let injected = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match injected {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl LineStore for MemoryLineStore {
    async fn create(&self, header_id: HeaderId, line: NewLine) -> Result<WeightLine, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;

        if !(line.gross_weight.is_finite() && line.gross_weight >= 0.0) {
            return Err(StoreError::new(Some(422), "gross_weight must be >= 0"));
        }

        let created = {
            let mut st = self.lock();
            st.next_id += 1;
            let index = st.next_index.entry(header_id).or_insert(0);
            *index += 1;
            let index_no = *index;
            let created = WeightLine {
                id: st.next_id,
                header_id,
                serial: format!("WV{header_id:04}{index_no:05}"),
                gross_weight: line.gross_weight,
                recorded_at: line.recorded_at,
                status: line.status,
                remark: line.remark,
                index_no,
                corrected_weight: None,
                revision: 0,
            };
            st.lines.push(created.clone());
            created
        };
        if let Some(log) = &self.log {
            log.push(format!("create:{}", created.serial));
        }
        Ok(created)
    }

    async fn list_by_header(&self, header_id: HeaderId) -> Result<Vec<WeightLine>, StoreError> {
        let lines: Vec<WeightLine> = self
            .lock()
            .lines
            .iter()
            .filter(|l| l.header_id == header_id)
            .cloned()
            .collect();
        Ok(LineHistory::from_lines(lines).lines().to_vec())
    }

    async fn update(&self, correction: LineCorrection) -> Result<WeightLine, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;

        let updated = {
            let mut st = self.lock();
            let line = st
                .lines
                .iter_mut()
                .find(|l| l.id == correction.line_id)
                .ok_or_else(|| StoreError::not_found(format!("line {} not found", correction.line_id)))?;
            line.status = correction.status;
            line.corrected_weight = Some(correction.corrected_weight);
            line.remark = correction.remark;
            line.revision += 1;
            line.clone()
        };
        if let Some(log) = &self.log {
            log.push(format!("update:{}:{}", updated.serial, updated.revision));
        }
        Ok(updated)
    }
}

/// Fixed set of headers.
#[derive(Debug, Default)]
pub struct StaticHeaderStore {
    headers: Mutex<HashMap<HeaderId, Header>>,
}

impl StaticHeaderStore {
    pub fn new(headers: impl IntoIterator<Item = Header>) -> Self {
        Self {
            headers: Mutex::new(headers.into_iter().map(|h| (h.id, h)).collect()),
        }
    }

    pub fn insert(&self, header: Header) {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(header.id, header);
    }
}

#[async_trait::async_trait]
impl HeaderStore for StaticHeaderStore {
    async fn get(&self, header_id: HeaderId) -> Result<Header, StoreError> {
        self.headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&header_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("header {header_id} not found")))
    }
}
