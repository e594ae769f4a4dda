//! Event types for PetalSonic

use crate::emitter::EmitterId;

/// Playback lifecycle notifications, drained with
/// [`PetalSonicEmitter::poll_events`](crate::PetalSonicEmitter::poll_events).
#[derive(Debug, Clone, PartialEq)]
pub enum PetalSonicEvent {
    Started {
        emitter_id: EmitterId,
        offset: f64,
    },
    Paused {
        emitter_id: EmitterId,
        position: f64,
    },
    Resumed {
        emitter_id: EmitterId,
        position: f64,
    },
    /// Explicit stop. Never emitted for a natural end.
    Stopped {
        emitter_id: EmitterId,
    },
    /// A span ended naturally and playback restarted from the start offset.
    Repeated {
        emitter_id: EmitterId,
        remaining: u32,
    },
    /// The last span of a play cycle ended naturally.
    Completed {
        emitter_id: EmitterId,
    },
}

impl PetalSonicEvent {
    pub fn emitter_id(&self) -> EmitterId {
        match self {
            Self::Started { emitter_id, .. }
            | Self::Paused { emitter_id, .. }
            | Self::Resumed { emitter_id, .. }
            | Self::Stopped { emitter_id }
            | Self::Repeated { emitter_id, .. }
            | Self::Completed { emitter_id } => *emitter_id,
        }
    }

    /// True for events caused by the clip running out rather than a caller.
    pub fn is_natural_end(&self) -> bool {
        matches!(self, Self::Repeated { .. } | Self::Completed { .. })
    }
}
