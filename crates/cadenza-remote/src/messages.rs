use serde::{Deserialize, Serialize};

/// Outbound calls on the host-wide broadcast channel.
///
/// The fixed resync order a cold-starting observer relies on is: `AddPlugin`,
/// `SetPluginData`, `SetPluginPorts`, the five reserved control values as
/// `SetParameterValue`, per-parameter `SetParameterData` + ranges, program
/// count/names/cursor, MIDI-program count/entries/cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostMessage {
    AddPlugin {
        name: String,
    },
    SetPluginData {
        format: i32,
        category: i32,
        hints: u32,
        real_name: String,
        label: String,
        maker: String,
        copyright: String,
        unique_id: i64,
    },
    SetPluginPorts {
        audio_ins: u32,
        audio_outs: u32,
        midi_ins: u32,
        midi_outs: u32,
        param_ins: u32,
        param_outs: u32,
        param_total: u32,
    },
    /// Current value of a parameter, or of a reserved control when `index`
    /// is negative.
    SetParameterValue {
        index: i32,
        value: f32,
    },
    SetDefaultValue {
        index: u32,
        value: f32,
    },
    SetParameterData {
        index: u32,
        kind: i32,
        hints: u32,
        name: String,
        unit: String,
        current: f32,
    },
    SetParameterRanges {
        index: u32,
        min: f32,
        max: f32,
        default: f32,
        step: f32,
        step_small: f32,
        step_large: f32,
    },
    SetProgramCount {
        count: u32,
    },
    SetProgramName {
        index: u32,
        name: String,
    },
    SetProgram {
        index: i32,
    },
    SetMidiProgramCount {
        count: u32,
    },
    SetMidiProgramData {
        index: u32,
        bank: u32,
        program: u32,
        name: String,
    },
    SetMidiProgram {
        index: i32,
    },
    NoteOn {
        note: u8,
        velocity: u8,
    },
    NoteOff {
        note: u8,
    },
}

/// Outbound calls on an instance's private peer channel.
///
/// For a host-side instance the peer is the out-of-process bridge it spawned;
/// for an instance running inside a bridge the peer is the master host, and
/// the `Bridge*` variants carry the pared resync it needs to reach
/// operational parity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Parameter (or reserved control, negative index) value keyed by the
    /// plugin-native index.
    Control {
        rindex: i32,
        value: f32,
    },
    Program {
        index: i32,
    },
    /// `flat` selects the single-number program shape used by formats whose
    /// bank/program model is flat.
    MidiProgram {
        bank: u32,
        program: u32,
        flat: bool,
    },
    Configure {
        key: String,
        value: String,
    },
    /// Structured custom-data transfer for formats with a typed state model.
    EventTransfer {
        kind: String,
        key: String,
        value: String,
    },
    Show,
    NoteOn {
        note: u8,
        velocity: u8,
    },
    NoteOff {
        note: u8,
    },
    BridgeAudioCount {
        ins: u32,
        outs: u32,
        total: u32,
    },
    BridgeMidiCount {
        ins: u32,
        outs: u32,
        total: u32,
    },
    BridgeParameterCount {
        ins: u32,
        outs: u32,
        total: u32,
    },
    BridgeParameterInfo {
        index: u32,
        name: String,
        unit: String,
    },
    BridgeParameterData {
        index: u32,
        kind: i32,
        rindex: i32,
        hints: u32,
        midi_channel: u8,
        midi_cc: i16,
    },
    BridgeParameterRanges {
        index: u32,
        default: f32,
        min: f32,
        max: f32,
        step: f32,
        step_small: f32,
        step_large: f32,
    },
}
