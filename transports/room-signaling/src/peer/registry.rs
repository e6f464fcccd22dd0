//! Participant connection registry

use super::engine::{ConnectionState, TransportEngine};
use crate::media::RemoteStream;
use crate::signaling::ParticipantId;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Information about a registered participant
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// Participant identifier
    pub participant_id: ParticipantId,

    /// Unique identifier of this connection instance
    pub connection_id: String,

    /// Connection state reported by the engine
    pub state: ConnectionState,

    /// Id of the remote stream received so far
    pub stream_id: Option<String>,

    /// Time since the entry was created
    pub age: Duration,
}

/// Connection bookkeeping for one remote participant
///
/// Exclusively owns its transport engine; dropping the entry from the
/// registry is followed by [`PeerEntry::close`].
pub struct PeerEntry {
    participant_id: ParticipantId,
    connection_id: String,
    generation: u64,
    engine: Arc<dyn TransportEngine>,
    remote_stream: Option<RemoteStream>,
    created_at: Instant,
}

impl PeerEntry {
    /// Wrap a freshly created engine
    pub fn new(participant_id: ParticipantId, generation: u64, engine: Arc<dyn TransportEngine>) -> Self {
        let connection_id = uuid::Uuid::new_v4().to_string();
        debug!(
            "New peer entry: participant={}, connection_id={}, generation={}",
            participant_id, connection_id, generation
        );

        Self {
            participant_id,
            connection_id,
            generation,
            engine,
            remote_stream: None,
            created_at: Instant::now(),
        }
    }

    /// Participant id
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Connection instance id
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Registry generation; stale engine notices carry an older one
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The transport engine
    pub fn engine(&self) -> &Arc<dyn TransportEngine> {
        &self.engine
    }

    /// True when the engine reports an established connection
    pub fn is_connected(&self) -> bool {
        self.engine.connection_state() == ConnectionState::Connected
    }

    /// Remote stream recorded for this participant
    pub fn remote_stream(&self) -> Option<&RemoteStream> {
        self.remote_stream.as_ref()
    }

    /// Record an incoming stream
    ///
    /// Returns false when the stream is the one already recorded. Its new
    /// tracks are then merged into the recorded handle.
    pub fn record_stream(&mut self, stream: RemoteStream) -> bool {
        if let Some(current) = &self.remote_stream {
            if current.is_same_stream(&stream) {
                let added = current.merge(&stream);
                if added > 0 {
                    debug!(
                        "Merged {} track(s) into stream {} of {}",
                        added,
                        current.id(),
                        self.participant_id
                    );
                }
                return false;
            }
        }
        self.remote_stream = Some(stream);
        true
    }

    /// Snapshot for reporting
    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            participant_id: self.participant_id.clone(),
            connection_id: self.connection_id.clone(),
            state: self.engine.connection_state(),
            stream_id: self.remote_stream.as_ref().map(|s| s.id().to_string()),
            age: self.created_at.elapsed(),
        }
    }

    /// Close the engine
    pub async fn close(self) {
        debug!("Closing connection for participant: {}", self.participant_id);
        if let Err(e) = self.engine.close().await {
            warn!(
                "Error closing connection for participant {}: {}",
                self.participant_id, e
            );
        }
    }
}

/// Owning registry of participant entries
///
/// Holds at most one entry per participant id.
pub struct PeerRegistry {
    entries: HashMap<ParticipantId, PeerEntry>,
    max_entries: usize,
    next_generation: u64,
}

impl PeerRegistry {
    /// Create a new registry
    ///
    /// # Arguments
    ///
    /// * `max_entries` - Maximum number of simultaneous participants (at least 1)
    pub fn new(max_entries: usize) -> Result<Self> {
        if max_entries == 0 {
            return Err(Error::InvalidConfig(
                "participant registry needs room for at least one entry".to_string(),
            ));
        }

        Ok(Self {
            entries: HashMap::new(),
            max_entries,
            next_generation: 1,
        })
    }

    /// Reserve a generation number for an entry about to be created
    pub fn next_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// True when another entry fits
    pub fn has_capacity(&self) -> bool {
        self.entries.len() < self.max_entries
    }

    /// Add an entry
    ///
    /// # Errors
    ///
    /// Returns error if the registry is full or the participant already has
    /// an entry.
    pub fn insert(&mut self, entry: PeerEntry) -> Result<()> {
        if self.entries.contains_key(entry.participant_id()) {
            return Err(Error::PeerConnectionError(format!(
                "Participant {} already has a connection",
                entry.participant_id()
            )));
        }

        if !self.has_capacity() {
            return Err(Error::CapacityExceeded(self.max_entries));
        }

        info!("Registering participant: {}", entry.participant_id());
        self.entries.insert(entry.participant_id().clone(), entry);
        Ok(())
    }

    /// Remove an entry; the caller closes it
    pub fn remove(&mut self, participant_id: &ParticipantId) -> Option<PeerEntry> {
        let entry = self.entries.remove(participant_id);
        if entry.is_some() {
            info!("Unregistering participant: {}", participant_id);
        }
        entry
    }

    /// Remove every entry; the caller closes them
    pub fn drain(&mut self) -> Vec<PeerEntry> {
        debug!("Draining {} participant entries", self.entries.len());
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    /// Look up an entry
    pub fn get(&self, participant_id: &ParticipantId) -> Option<&PeerEntry> {
        self.entries.get(participant_id)
    }

    /// Look up an entry, only if it belongs to `generation`
    pub fn get_current_mut(
        &mut self,
        participant_id: &ParticipantId,
        generation: u64,
    ) -> Option<&mut PeerEntry> {
        self.entries
            .get_mut(participant_id)
            .filter(|entry| entry.generation == generation)
    }

    /// Check if a participant has an entry
    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.entries.contains_key(participant_id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entry is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered participant ids, sorted
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Recorded remote streams, sorted by participant id
    pub fn streams(&self) -> Vec<(ParticipantId, RemoteStream)> {
        let mut streams: Vec<(ParticipantId, RemoteStream)> = self
            .entries
            .values()
            .filter_map(|e| e.remote_stream.clone().map(|s| (e.participant_id.clone(), s)))
            .collect();
        streams.sort_by(|a, b| a.0.cmp(&b.0));
        streams
    }

    /// List every entry regardless of state
    pub fn list(&self) -> Vec<PeerInfo> {
        let mut infos: Vec<PeerInfo> = self.entries.values().map(PeerEntry::info).collect();
        infos.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        infos
    }
}
