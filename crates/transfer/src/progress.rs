use std::collections::HashMap;

use chunkup_protocol::{ChunkSequence, ProgressData};

/// Percentage of the current request that has been sent.
///
/// A request with nothing to send (an empty chunk) counts as complete.
pub fn local_percent(bytes_sent: u64, bytes_total: u64) -> u8 {
    if bytes_total == 0 {
        return 100;
    }
    let sent = bytes_sent.min(bytes_total) as f64;
    (sent * 100.0 / bytes_total as f64).round() as u8
}

/// Maps a per-request percentage onto the whole file.
///
/// Chunk `n` of `t` covers the band `[(n-1)*100/t, n*100/t]`. Without a
/// sequence the request is the whole file.
pub fn weighted_percent(local: u8, sequence: Option<ChunkSequence>) -> u8 {
    let local = local.min(100);
    let Some(seq) = sequence else {
        return local;
    };
    let total = f64::from(seq.total_chunks);
    let base = f64::from(seq.sequence.saturating_sub(1)) * (100.0 / total);
    (f64::from(local) / total + base).round().min(100.0) as u8
}

#[derive(Debug, Clone, Default)]
struct ProgressState {
    last_emitted: Option<u8>,
    sequence: Option<ChunkSequence>,
}

/// Result of acknowledging one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCompletion {
    /// Progress event to publish, if the percentage changed.
    pub progress: Option<ProgressData>,
    /// The acknowledged chunk was the file's last.
    pub file_complete: bool,
    /// Every file of the batch has completed.
    pub batch_complete: bool,
}

/// Folds per-request byte progress into one percentage per file of a batch.
///
/// State for a file exists from its first chunk until its last chunk is
/// acknowledged. The batch completes once every file has finished.
#[derive(Debug)]
pub struct ProgressAggregator {
    file_count: usize,
    remaining: usize,
    states: HashMap<usize, ProgressState>,
}

impl ProgressAggregator {
    pub fn new(file_count: usize) -> Self {
        Self {
            file_count,
            remaining: file_count,
            states: HashMap::new(),
        }
    }

    /// Marks the start of a request for `file_index`.
    pub fn begin_chunk(&mut self, file_index: usize, sequence: Option<ChunkSequence>) {
        self.states.entry(file_index).or_default().sequence = sequence;
    }

    /// Records a transport tick. Returns an event only when the file's
    /// percentage differs from the last one emitted.
    pub fn record(
        &mut self,
        file_index: usize,
        bytes_sent: u64,
        bytes_total: u64,
    ) -> Option<ProgressData> {
        let state = self.states.entry(file_index).or_default();
        let progress = weighted_percent(local_percent(bytes_sent, bytes_total), state.sequence);
        if state.last_emitted == Some(progress) {
            return None;
        }
        state.last_emitted = Some(progress);
        Some(ProgressData {
            progress,
            file_index: (self.file_count > 1).then_some(file_index),
        })
    }

    /// Acknowledges the current request of `file_index` as fully sent and
    /// answered.
    pub fn complete_chunk(&mut self, file_index: usize) -> ChunkCompletion {
        let progress = self.record(file_index, 1, 1);
        let file_complete = self
            .states
            .get(&file_index)
            .and_then(|s| s.sequence)
            .is_none_or(|s| s.is_last());

        if file_complete {
            self.states.remove(&file_index);
            self.remaining = self.remaining.saturating_sub(1);
        }

        ChunkCompletion {
            progress,
            file_complete,
            batch_complete: file_complete && self.remaining == 0,
        }
    }

    /// Files that have not yet completed their last chunk.
    pub fn remaining_files(&self) -> usize {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Returns `true` while `file_index` has a chunk sequence in progress.
    pub fn is_tracking(&self, file_index: usize) -> bool {
        self.states.contains_key(&file_index)
    }
}
