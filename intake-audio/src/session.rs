use intake_core::types::SessionId;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingState {
    Idle,
    RequestingPermission,
    Recording,
    Stopping,
    Stopped,
}

impl RecordingState {
    /// Whether this session currently holds (or is acquiring) the microphone.
    pub fn holds_device(self) -> bool {
        matches!(
            self,
            RecordingState::RequestingPermission
                | RecordingState::Recording
                | RecordingState::Stopping
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::RequestingPermission => "requesting_permission",
            RecordingState::Recording => "recording",
            RecordingState::Stopping => "stopping",
            RecordingState::Stopped => "stopped",
        }
    }
}

/// State of one recording. A new session is created for every `start()`.
#[derive(Debug)]
pub struct RecordingSession {
    id: SessionId,
    state: RecordingState,
    started_at: Option<Instant>,
    elapsed_secs: u32,
    hard_cap_secs: u32,
    chunks: Vec<Vec<u8>>,
}

impl RecordingSession {
    pub fn new(hard_cap_secs: u32) -> Self {
        Self {
            id: SessionId::new(),
            state: RecordingState::Idle,
            started_at: None,
            elapsed_secs: 0,
            hard_cap_secs,
            chunks: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn hard_cap_secs(&self) -> u32 {
        self.hard_cap_secs
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn begin_permission(&mut self) {
        if self.state == RecordingState::Idle {
            self.state = RecordingState::RequestingPermission;
        }
    }

    pub fn begin_recording(&mut self) {
        if matches!(
            self.state,
            RecordingState::Idle | RecordingState::RequestingPermission
        ) {
            self.state = RecordingState::Recording;
            self.started_at = Some(Instant::now());
            self.elapsed_secs = 0;
            self.chunks.clear();
        }
    }

    /// Appends a fragment. Ignored outside Recording/Stopping and for empty fragments.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        if matches!(
            self.state,
            RecordingState::Recording | RecordingState::Stopping
        ) {
            self.chunks.push(chunk);
        }
    }

    /// One wall-clock second passed. Returns true once the hard cap is reached.
    pub fn tick(&mut self) -> bool {
        if self.state != RecordingState::Recording {
            return false;
        }
        self.elapsed_secs = self.elapsed_secs.saturating_add(1);
        self.hard_cap_secs > 0 && self.elapsed_secs >= self.hard_cap_secs
    }

    /// Returns false when the session was not recording (stop is a no-op then).
    pub fn begin_stopping(&mut self) -> bool {
        if self.state != RecordingState::Recording {
            return false;
        }
        self.state = RecordingState::Stopping;
        true
    }

    pub fn take_chunks(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.chunks)
    }

    pub fn finish(&mut self) {
        self.chunks.clear();
        self.state = RecordingState::Stopped;
    }

    /// Used when the permission prompt fails; the session never recorded.
    pub fn abandon(&mut self) {
        self.chunks.clear();
        self.state = if self.started_at.is_some() {
            RecordingState::Stopped
        } else {
            RecordingState::Idle
        };
    }
}
