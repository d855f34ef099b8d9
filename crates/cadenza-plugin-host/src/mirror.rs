//! State mirroring toward remote observers: the deterministic full resync
//! for a cold-starting broadcast listener, the pared resync a bridged
//! instance reports upstream, and the re-attach path used when a bridge's
//! remote counterpart restarts.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cadenza_remote::{HostMessage, PeerAddr, PeerMessage, PeerSink, RemoteEndpoint};

use crate::hints;
use crate::instance::PluginInstance;
use crate::params::{
    CustomDataKind, MAX_PARAMETERS, PARAMETER_ACTIVE, PARAMETER_BALANCE_LEFT,
    PARAMETER_BALANCE_RIGHT, PARAMETER_DRYWET, PARAMETER_VOLUME,
};

/// Poll budget for a just-spawned peer: 40 attempts, 100 ms apart.
const PEER_READY_RETRIES: u32 = 40;
const PEER_READY_INTERVAL: Duration = Duration::from_millis(100);

impl PluginInstance {
    /// Pushes the complete instance state to the host-wide broadcast
    /// listener, in the fixed order a cold-starting observer relies on:
    /// identity, ports, global controls, parameters, programs, MIDI
    /// programs. No-op while no listener is registered.
    pub fn register_to_broadcast(&self) {
        let Some(broadcast) = &self.broadcast else {
            return;
        };
        if !broadcast.is_registered() {
            return;
        }
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let id = self.id;
        let name = self.name.clone().unwrap_or_default();

        broadcast.send(id, HostMessage::AddPlugin { name: name.clone() });
        broadcast.send(
            id,
            HostMessage::SetPluginData {
                format: self.format as i32,
                category: backend.category() as i32,
                hints: self.hint_mask,
                real_name: name,
                label: backend.label(),
                maker: backend.maker(),
                copyright: backend.copyright(),
                unique_id: backend.unique_id(),
            },
        );

        let (param_ins, param_outs, param_total) = self.parameter_count_info();
        broadcast.send(
            id,
            HostMessage::SetPluginPorts {
                audio_ins: self.audio_in_count(),
                audio_outs: self.audio_out_count(),
                midi_ins: self.midi_in_count(),
                midi_outs: self.midi_out_count(),
                param_ins,
                param_outs,
                param_total,
            },
        );

        let active = if self.is_active() { 1.0 } else { 0.0 };
        for (index, value) in [
            (PARAMETER_ACTIVE, active),
            (PARAMETER_DRYWET, self.dry_wet()),
            (PARAMETER_VOLUME, self.volume()),
            (PARAMETER_BALANCE_LEFT, self.balance_left()),
            (PARAMETER_BALANCE_RIGHT, self.balance_right()),
        ] {
            broadcast.send(id, HostMessage::SetParameterValue { index, value });
        }

        if param_total > 0 && param_total < MAX_PARAMETERS {
            let tables = self.tables.read();
            for (index, (data, ranges)) in tables.data.iter().zip(&tables.ranges).enumerate() {
                let index = index as u32;
                broadcast.send(
                    id,
                    HostMessage::SetParameterData {
                        index,
                        kind: data.kind as i32,
                        hints: data.hints,
                        name: backend.parameter_name(index),
                        unit: backend.parameter_unit(index),
                        current: backend.read_parameter(index),
                    },
                );
                broadcast.send(
                    id,
                    HostMessage::SetParameterRanges {
                        index,
                        min: ranges.min,
                        max: ranges.max,
                        default: ranges.default,
                        step: ranges.step,
                        step_small: ranges.step_small,
                        step_large: ranges.step_large,
                    },
                );
            }
        }

        {
            let tables = self.tables.read();
            broadcast.send(
                id,
                HostMessage::SetProgramCount {
                    count: tables.programs.names.len() as u32,
                },
            );
            for (index, name) in tables.programs.names.iter().enumerate() {
                broadcast.send(
                    id,
                    HostMessage::SetProgramName {
                        index: index as u32,
                        name: name.clone(),
                    },
                );
            }
            broadcast.send(
                id,
                HostMessage::SetProgram {
                    index: tables.programs.current,
                },
            );

            broadcast.send(
                id,
                HostMessage::SetMidiProgramCount {
                    count: tables.midi_programs.entries.len() as u32,
                },
            );
            for (index, entry) in tables.midi_programs.entries.iter().enumerate() {
                broadcast.send(
                    id,
                    HostMessage::SetMidiProgramData {
                        index: index as u32,
                        bank: entry.bank,
                        program: entry.program,
                        name: entry.name.clone(),
                    },
                );
            }
            broadcast.send(
                id,
                HostMessage::SetMidiProgram {
                    index: tables.midi_programs.current,
                },
            );
        }
    }

    /// The pared resync an instance running inside a bridge reports to its
    /// master host: port and parameter counts plus per-parameter
    /// descriptors, ranges and defaults — only what the remote side needs
    /// to reach operational parity. The bridge is authoritative for its own
    /// UI, so nothing goes to the notification sink.
    pub fn resync_bridge_peer(&self) {
        let audio_ins = self.audio_in_count();
        let audio_outs = self.audio_out_count();
        self.send_peer(PeerMessage::BridgeAudioCount {
            ins: audio_ins,
            outs: audio_outs,
            total: audio_ins + audio_outs,
        });

        let midi_ins = self.midi_in_count();
        let midi_outs = self.midi_out_count();
        self.send_peer(PeerMessage::BridgeMidiCount {
            ins: midi_ins,
            outs: midi_outs,
            total: midi_ins + midi_outs,
        });

        let (param_ins, param_outs, param_total) = self.parameter_count_info();
        self.send_peer(PeerMessage::BridgeParameterCount {
            ins: param_ins,
            outs: param_outs,
            total: param_total,
        });

        if param_total == 0 || param_total >= MAX_PARAMETERS {
            return;
        }
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        let descriptors: Vec<_> = {
            let tables = self.tables.read();
            tables
                .data
                .iter()
                .zip(&tables.ranges)
                .map(|(data, ranges)| (*data, *ranges))
                .collect()
        };
        for (index, (data, ranges)) in descriptors.iter().enumerate() {
            let index = index as u32;
            self.send_peer(PeerMessage::BridgeParameterInfo {
                index,
                name: backend.parameter_name(index),
                unit: backend.parameter_unit(index),
            });
            self.send_peer(PeerMessage::BridgeParameterData {
                index,
                kind: data.kind as i32,
                rindex: data.rindex,
                hints: data.hints,
                midi_channel: data.midi_channel,
                midi_cc: data.midi_cc,
            });
            self.send_peer(PeerMessage::BridgeParameterRanges {
                index,
                default: ranges.default,
                min: ranges.min,
                max: ranges.max,
                step: ranges.step,
                step_small: ranges.step_small,
                step_large: ranges.step_large,
            });

            // Re-assert the default through the regular setter path, with
            // every propagation toggle off.
            self.set_parameter_value(index, ranges.default, false, false);
        }
    }

    /// (Re)points the private endpoint at a new peer and replays everything
    /// it needs to catch up: persisted custom data, program selections, and
    /// every parameter's current value. This is the re-attach path used
    /// when a bridge's remote counterpart restarts.
    pub fn update_remote_target(
        &self,
        source: Option<PeerAddr>,
        target_url: &str,
        sink: Arc<dyn PeerSink>,
    ) {
        {
            let mut peer = self.peer.lock();
            peer.endpoint.clear();
            peer.endpoint.source = source;
            if let Some((addr, path)) = PeerAddr::from_url(target_url) {
                peer.endpoint.target = Some(addr);
                peer.endpoint.path = path;
            }
            peer.sink = Some(sink);
        }

        for entry in self.custom_data() {
            if self.format.structured_transfer() {
                self.send_peer(PeerMessage::EventTransfer {
                    kind: entry.kind.as_str().to_string(),
                    key: entry.key,
                    value: entry.value,
                });
            } else if entry.kind == CustomDataKind::String {
                self.send_peer(PeerMessage::Configure {
                    key: entry.key,
                    value: entry.value,
                });
            }
        }

        let current_program = self.current_program();
        if current_program >= 0 {
            self.send_peer(PeerMessage::Program {
                index: current_program,
            });
        }
        let current_midi = self.current_midi_program();
        if current_midi >= 0 {
            if let Some(entry) = self.midi_program(current_midi as u32) {
                self.send_peer(PeerMessage::MidiProgram {
                    bank: entry.bank,
                    program: entry.program,
                    flat: self.format.flat_midi_programs(),
                });
            }
        }

        let rindexes: Vec<i32> = {
            let tables = self.tables.read();
            tables.data.iter().map(|data| data.rindex).collect()
        };
        if let Some(backend) = self.backend.as_ref() {
            for (index, rindex) in rindexes.iter().enumerate() {
                self.send_peer(PeerMessage::Control {
                    rindex: *rindex,
                    value: backend.read_parameter(index as u32),
                });
            }
        }

        if self.has_hint(hints::IS_BRIDGE) {
            let active = if self.is_active() { 1.0 } else { 0.0 };
            for (rindex, value) in [
                (PARAMETER_ACTIVE, active),
                (PARAMETER_DRYWET, self.dry_wet()),
                (PARAMETER_VOLUME, self.volume()),
                (PARAMETER_BALANCE_LEFT, self.balance_left()),
                (PARAMETER_BALANCE_RIGHT, self.balance_right()),
            ] {
                self.send_peer(PeerMessage::Control { rindex, value });
            }
        }
    }

    /// Waits (bounded) for the peer address to become known, then asks the
    /// peer to show itself. Returns `false` when the peer never reported
    /// within the ~4 s budget; the caller decides whether to respawn it.
    pub fn await_remote_ready(&self) -> bool {
        for _ in 0..PEER_READY_RETRIES {
            if self.peer.lock().endpoint.is_attached() {
                self.send_peer(PeerMessage::Show);
                return true;
            }
            thread::sleep(PEER_READY_INTERVAL);
        }
        log::warn!("remote peer for instance {:?} never became ready", self.id);
        false
    }

    /// Snapshot of the current peer endpoint bookkeeping.
    pub fn remote_endpoint(&self) -> RemoteEndpoint {
        self.peer.lock().endpoint.clone()
    }
}
