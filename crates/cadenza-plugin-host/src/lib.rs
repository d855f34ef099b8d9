//! Plugin-hosting core of the Cadenza audio engine.
//!
//! Every loadable audio-processing plugin (synthesizer, effect, sampler)
//! specializes the machinery in this crate: the clamped parameter/program/
//! state model, the bounded cross-thread event queues, the state mirroring
//! toward remote observers, and the lifecycle of live audio resources. The
//! hard contract is between the deadline-bound audio callback and every
//! other actor that wants to change plugin state or inject events without
//! blocking or corrupting the audio path.
//!
//! Format-specific loading, introspection and DSP live in backend
//! implementations of [`FormatBackend`]; the audio server's port and graph
//! API is consumed through [`AudioServer`]; UI/automation glue observes
//! changes through a [`NotificationSink`].

mod control;
mod error;
mod events;
mod instance;
mod library;
mod midi;
mod mirror;
mod params;

pub use cadenza_remote::{
    BroadcastSink, HostMessage, InstanceId, PeerAddr, PeerMessage, PeerSink, RemoteEndpoint,
};
pub use error::HostError;
pub use events::{PostEvent, PostEventKind, PostEventQueue, MAX_POST_EVENTS};
pub use instance::{
    AudioPortGroup, AudioServer, FormatBackend, HostHandles, LifecycleState, PluginInstance,
    PluginLayout, PortDirection, PortHandle, PortKind, ProcessContext,
};
pub use library::PluginLibrary;
pub use midi::{ExternalNote, ExternalNoteQueue, NoteScratch, MAX_MIDI_EVENTS};
pub use params::{
    CustomData, CustomDataKind, CustomDataStore, MidiProgram, MidiProgramTable, ParameterData,
    ParameterKind, ParameterRanges, ProgramTable, MAX_PARAMETERS, PARAMETER_ACTIVE,
    PARAMETER_BALANCE_LEFT, PARAMETER_BALANCE_RIGHT, PARAMETER_DRYWET, PARAMETER_NULL,
    PARAMETER_VOLUME,
};

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Plugin binary standards the host can dispatch to a format backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PluginFormat {
    Ladspa = 0,
    Dssi = 1,
    Lv2 = 2,
    Vst2 = 3,
    Sf2 = 4,
}

impl PluginFormat {
    /// Whether a MIDI program switch must re-snapshot parameter defaults.
    /// Only formats whose bank/program model never shifts defaults on its
    /// own need the host to do it for them.
    pub(crate) fn resnapshot_on_midi_program(self) -> bool {
        matches!(self, PluginFormat::Sf2)
    }

    /// Whether custom data replays to a peer as a structured transfer
    /// rather than plain key/value configure calls.
    pub(crate) fn structured_transfer(self) -> bool {
        matches!(self, PluginFormat::Lv2)
    }

    /// Whether the peer expects the flat single-number MIDI program shape.
    pub(crate) fn flat_midi_programs(self) -> bool {
        matches!(self, PluginFormat::Dssi)
    }
}

/// Coarse category a backend reports for its plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum PluginCategory {
    #[default]
    None = 0,
    Synth = 1,
    Delay = 2,
    Eq = 3,
    Filter = 4,
    Dynamics = 5,
    Modulator = 6,
    Utility = 7,
    Other = 8,
}

/// Capability-hint bits carried in an instance's hint bitmask.
pub mod hints {
    /// The instance is an out-of-process bridge for crash isolation or ABI
    /// workarounds.
    pub const IS_BRIDGE: u32 = 1 << 0;
    pub const IS_SYNTH: u32 = 1 << 1;
    pub const HAS_GUI: u32 = 1 << 2;
    pub const USES_CHUNKS: u32 = 1 << 3;
    pub const CAN_DRYWET: u32 = 1 << 4;
    pub const CAN_VOLUME: u32 = 1 << 5;
    pub const CAN_BALANCE: u32 = 1 << 6;
}

/// What a notification delivered to the local sink is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Debug,
    ParameterChanged,
    ProgramChanged,
    MidiProgramChanged,
    NoteOn,
    NoteOff,
}

/// The single callback shape exposed to UI/automation glue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallbackEvent {
    pub kind: CallbackKind,
    pub instance: InstanceId,
    pub index: i32,
    pub secondary: i32,
    pub value: f32,
}

/// Local observer of instance state changes. Implementations must be cheap
/// and non-blocking; they may run on control-path threads.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: CallbackEvent);
}

/// A [`NotificationSink`] backed by an unbounded channel, for hosts that
/// poll notifications from their UI loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<CallbackEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<CallbackEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: CallbackEvent) {
        let _ = self.tx.send(event);
    }
}
