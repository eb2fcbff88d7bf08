//! Events emitted by the engine for the host to poll.

use crate::channel::SfxPlayback;
use crate::emitter::EmitterId;

/// Which channel an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Bgm,
    Sfx,
}

/// Events emitted by the audio manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A BGM cue started playing.
    BgmStarted(EmitterId),
    /// An SFX cue finished its traversal or was stopped.
    SfxFinished(SfxPlayback),
    /// An emitter completed its stop sequence.
    EmitterStopped(EmitterId),
    /// A play request was rejected because the cue had no clips.
    CueRejected { channel: ChannelKind },
    /// A play request failed.
    PlayFailed { channel: ChannelKind, error: String },
}
