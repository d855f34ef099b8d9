//! State mutation entry points: global controls, parameters, programs,
//! custom data, and note injection. Every setter chooses, per call, which
//! of the propagation paths to take; the paths have no ordering dependency
//! on each other.

use std::sync::atomic::Ordering;

use cadenza_remote::{HostMessage, PeerMessage};

use crate::events::PostEventKind;
use crate::instance::PluginInstance;
use crate::params::{
    CustomDataKind, ParameterKind, PARAMETER_ACTIVE, PARAMETER_BALANCE_LEFT,
    PARAMETER_BALANCE_RIGHT, PARAMETER_DRYWET, PARAMETER_VOLUME,
};
use crate::{hints, CallbackEvent, CallbackKind};

/// The reserved controls a bridged instance intercepts on the native-index
/// path, resolved once instead of re-derived per call-site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservedControl {
    Active,
    DryWet,
    Volume,
    BalanceLeft,
    BalanceRight,
}

// The original dispatch tested the balance-left condition twice, leaving
// balance-right unreachable; this table maps each index to its own setter.
// See DESIGN.md.
const RESERVED_CONTROLS: [(i32, ReservedControl); 5] = [
    (PARAMETER_ACTIVE, ReservedControl::Active),
    (PARAMETER_DRYWET, ReservedControl::DryWet),
    (PARAMETER_VOLUME, ReservedControl::Volume),
    (PARAMETER_BALANCE_LEFT, ReservedControl::BalanceLeft),
    (PARAMETER_BALANCE_RIGHT, ReservedControl::BalanceRight),
];

fn reserved_control(rindex: i32) -> Option<ReservedControl> {
    RESERVED_CONTROLS
        .iter()
        .find(|(index, _)| *index == rindex)
        .map(|(_, control)| *control)
}

impl PluginInstance {
    /// Fan-out shared by every control and parameter change: the host-wide
    /// broadcast, the bridge peer (bridged instances only), and the local
    /// notification sink. Any subset is valid.
    pub(crate) fn mirror_control(
        &self,
        index: i32,
        value: f32,
        notify_remote: bool,
        notify_observer: bool,
    ) {
        if notify_remote {
            if let Some(broadcast) = &self.broadcast {
                broadcast.send(self.id, HostMessage::SetParameterValue { index, value });
            }
            if self.has_hint(hints::IS_BRIDGE) {
                self.send_peer(PeerMessage::Control {
                    rindex: index,
                    value,
                });
            }
        }
        if notify_observer {
            self.notify_observer(CallbackEvent {
                kind: CallbackKind::ParameterChanged,
                instance: self.id,
                index,
                secondary: 0,
                value,
            });
        }
    }

    pub(crate) fn send_peer(&self, message: PeerMessage) {
        let peer = self.peer.lock();
        if let Some(sink) = &peer.sink {
            sink.send(message);
        }
    }

    // --- global controls ---

    pub fn set_active(&self, active: bool, notify_remote: bool, notify_observer: bool) {
        self.active.store(active, Ordering::Relaxed);
        let value = if active { 1.0 } else { 0.0 };
        self.mirror_control(PARAMETER_ACTIVE, value, notify_remote, notify_observer);
    }

    pub fn set_dry_wet(&self, value: f32, notify_remote: bool, notify_observer: bool) {
        let value = value.clamp(0.0, 1.0);
        self.dry_wet.store(value, Ordering::Relaxed);
        self.mirror_control(PARAMETER_DRYWET, value, notify_remote, notify_observer);
    }

    pub fn set_volume(&self, value: f32, notify_remote: bool, notify_observer: bool) {
        let value = value.clamp(0.0, 1.27);
        self.volume.store(value, Ordering::Relaxed);
        self.mirror_control(PARAMETER_VOLUME, value, notify_remote, notify_observer);
    }

    pub fn set_balance_left(&self, value: f32, notify_remote: bool, notify_observer: bool) {
        let value = value.clamp(-1.0, 1.0);
        self.balance_left.store(value, Ordering::Relaxed);
        self.mirror_control(
            PARAMETER_BALANCE_LEFT,
            value,
            notify_remote,
            notify_observer,
        );
    }

    pub fn set_balance_right(&self, value: f32, notify_remote: bool, notify_observer: bool) {
        let value = value.clamp(-1.0, 1.0);
        self.balance_right.store(value, Ordering::Relaxed);
        self.mirror_control(
            PARAMETER_BALANCE_RIGHT,
            value,
            notify_remote,
            notify_observer,
        );
    }

    // --- parameters ---

    /// Writes a parameter through the backend (which clamps into the
    /// parameter's range) and propagates the stored value. Broadcast only
    /// applies to input parameters; output parameters still reach the
    /// local observer.
    pub fn set_parameter_value(
        &self,
        index: u32,
        value: f32,
        notify_remote: bool,
        notify_observer: bool,
    ) {
        let is_input = match self.parameter_data(index) {
            Some(data) => data.kind == ParameterKind::Input,
            None => {
                log::debug!("set_parameter_value: index {index} out of range");
                return;
            }
        };
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        backend.write_parameter(index, value);
        let stored = backend.read_parameter(index);

        if notify_remote && is_input {
            if let Some(broadcast) = &self.broadcast {
                broadcast.send(
                    self.id,
                    HostMessage::SetParameterValue {
                        index: index as i32,
                        value: stored,
                    },
                );
            }
            if self.has_hint(hints::IS_BRIDGE) {
                self.send_peer(PeerMessage::Control {
                    rindex: index as i32,
                    value: stored,
                });
            }
        }
        if notify_observer {
            self.notify_observer(CallbackEvent {
                kind: CallbackKind::ParameterChanged,
                instance: self.id,
                index: index as i32,
                secondary: 0,
                value: stored,
            });
        }
    }

    /// Addresses a parameter by the plugin binary's own index. Bridged
    /// instances intercept the reserved control indices and route them to
    /// the dedicated setters; everything else scans the parameter table,
    /// first match wins, later duplicates are not applied.
    pub fn set_parameter_value_by_rindex(
        &self,
        rindex: i32,
        value: f32,
        notify_remote: bool,
        notify_observer: bool,
    ) {
        if self.has_hint(hints::IS_BRIDGE) {
            if let Some(control) = reserved_control(rindex) {
                return match control {
                    ReservedControl::Active => {
                        self.set_active(value > 0.0, notify_remote, notify_observer)
                    }
                    ReservedControl::DryWet => {
                        self.set_dry_wet(value, notify_remote, notify_observer)
                    }
                    ReservedControl::Volume => {
                        self.set_volume(value, notify_remote, notify_observer)
                    }
                    ReservedControl::BalanceLeft => {
                        self.set_balance_left(value, notify_remote, notify_observer)
                    }
                    ReservedControl::BalanceRight => {
                        self.set_balance_right(value, notify_remote, notify_observer)
                    }
                };
            }
        }

        let index = {
            let tables = self.tables.read();
            tables.data.iter().position(|data| data.rindex == rindex)
        };
        if let Some(index) = index {
            self.set_parameter_value(index as u32, value, notify_remote, notify_observer);
        }
    }

    pub fn set_parameter_midi_channel(&self, index: u32, channel: u8) {
        let mut tables = self.tables.write();
        if let Some(data) = tables.data.get_mut(index as usize) {
            data.midi_channel = channel;
        }
    }

    pub fn set_parameter_midi_cc(&self, index: u32, midi_cc: i16) {
        let mut tables = self.tables.write();
        if let Some(data) = tables.data.get_mut(index as usize) {
            data.midi_cc = midi_cc;
        }
    }

    // --- programs ---

    /// Selects a program and re-snapshots every parameter's default from
    /// its current live value: a program switch redefines what "default"
    /// means for subsequent resets.
    pub fn set_program(&self, index: i32, notify_remote: bool, notify_observer: bool) {
        {
            self.tables.write().programs.current = index;
        }

        if notify_remote {
            if let Some(broadcast) = &self.broadcast {
                broadcast.send(self.id, HostMessage::SetProgram { index });
            }
            if self.has_hint(hints::IS_BRIDGE) {
                self.send_peer(PeerMessage::Program { index });
            }
        }
        if notify_observer {
            self.notify_observer(CallbackEvent {
                kind: CallbackKind::ProgramChanged,
                instance: self.id,
                index,
                secondary: 0,
                value: 0.0,
            });
        }

        self.resnapshot_defaults(notify_remote);
    }

    /// Selects a MIDI program. The default re-snapshot only happens for
    /// formats whose bank/program switches never shift parameter defaults
    /// on their own.
    pub fn set_midi_program(&self, index: i32, notify_remote: bool, notify_observer: bool) {
        {
            self.tables.write().midi_programs.current = index;
        }

        if notify_remote {
            if let Some(broadcast) = &self.broadcast {
                broadcast.send(self.id, HostMessage::SetMidiProgram { index });
            }
            if self.has_hint(hints::IS_BRIDGE) {
                self.send_peer(PeerMessage::Program { index });
            }
        }
        if notify_observer {
            self.notify_observer(CallbackEvent {
                kind: CallbackKind::MidiProgramChanged,
                instance: self.id,
                index,
                secondary: 0,
                value: 0.0,
            });
        }

        if self.format.resnapshot_on_midi_program() {
            self.resnapshot_defaults(notify_remote);
        }
    }

    /// Selects a MIDI program by its bank/program pair; no-op when no table
    /// entry matches.
    pub fn set_midi_program_by_bank_program(
        &self,
        bank: u32,
        program: u32,
        notify_remote: bool,
        notify_observer: bool,
    ) {
        let index = self.tables.read().midi_programs.position(bank, program);
        if let Some(index) = index {
            self.set_midi_program(index as i32, notify_remote, notify_observer);
        }
    }

    fn resnapshot_defaults(&self, notify_remote: bool) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let mut tables = self.tables.write();
        for (index, ranges) in tables.ranges.iter_mut().enumerate() {
            ranges.default = backend.read_parameter(index as u32);
            ranges.fix_default();
            if notify_remote {
                if let Some(broadcast) = &self.broadcast {
                    broadcast.send(
                        self.id,
                        HostMessage::SetDefaultValue {
                            index: index as u32,
                            value: ranges.default,
                        },
                    );
                }
            }
        }
    }

    // --- custom data ---

    /// Unique-key upsert of opaque plugin state. Invalid-kind submissions
    /// and transient-protocol keys never reach the store.
    pub fn set_custom_data(&self, kind: CustomDataKind, key: &str, value: &str) -> bool {
        log::debug!("set_custom_data({kind:?}, {key})");
        self.custom.lock().set(kind, key, value)
    }

    // --- notes ---

    /// Queues a synthetic note for the next audio cycle and mirrors it.
    pub fn send_midi_note(
        &self,
        on: bool,
        note: u8,
        velocity: u8,
        notify_remote: bool,
        notify_observer: bool,
    ) {
        self.ext_notes.inject(on, note, velocity);

        if notify_remote {
            if let Some(broadcast) = &self.broadcast {
                let message = if on {
                    HostMessage::NoteOn { note, velocity }
                } else {
                    HostMessage::NoteOff { note }
                };
                broadcast.send(self.id, message);
            }
        }
        if notify_observer {
            self.notify_observer(CallbackEvent {
                kind: if on {
                    CallbackKind::NoteOn
                } else {
                    CallbackKind::NoteOff
                },
                instance: self.id,
                index: note as i32,
                secondary: velocity as i32,
                value: 0.0,
            });
        }
    }

    /// The all-notes-off panic: a full 128-note sweep into the injection
    /// queue plus the matching deferred notifications. The two queue locks
    /// are taken one after the other, never nested.
    pub fn send_all_notes_off(&self) {
        self.ext_notes.inject_all_notes_off();
        self.post_events.post_all_notes_off();
    }

    /// Queues a deferred note notification from the audio callback after
    /// the backend consumed a note event.
    pub fn postpone_note_event(&self, on: bool, note: u8, velocity: u8) {
        let kind = if on {
            PostEventKind::NoteOn
        } else {
            PostEventKind::NoteOff
        };
        self.post_events
            .postpone(kind, note as i32, velocity as f32, None);
    }
}
