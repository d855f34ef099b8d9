use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use parking_lot::{Mutex, RwLock};

use cadenza_remote::{BroadcastSink, InstanceId, PeerSink, RemoteEndpoint};

use crate::error::HostError;
use crate::events::{PostEvent, PostEventKind, PostEventQueue};
use crate::library::PluginLibrary;
use crate::midi::{ExternalNote, ExternalNoteQueue, NoteScratch};
use crate::params::{
    CustomData, CustomDataStore, MidiProgram, MidiProgramTable, ParameterData, ParameterKind,
    ParameterRanges, ProgramTable,
};
use crate::{CallbackEvent, CallbackKind, NotificationSink, PluginCategory, PluginFormat};

/// Opaque handle to a port registered with the audio server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Audio,
    Midi,
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Port and activation API consumed from the audio server collaborator.
pub trait AudioServer: Send + Sync {
    fn register_port(
        &self,
        name: &str,
        kind: PortKind,
        direction: PortDirection,
    ) -> Option<PortHandle>;
    fn unregister_port(&self, handle: PortHandle);
    fn activate(&self);
    fn deactivate(&self);
}

/// One direction of audio ports: opaque handles plus the parallel mapping
/// from array index to the plugin-native port index.
#[derive(Debug, Default)]
pub struct AudioPortGroup {
    pub handles: Vec<PortHandle>,
    pub rindexes: Vec<u32>,
}

impl AudioPortGroup {
    pub fn count(&self) -> u32 {
        self.handles.len() as u32
    }
}

#[derive(Debug, Default)]
pub(crate) struct PortGroup {
    pub audio_in: AudioPortGroup,
    pub audio_out: AudioPortGroup,
    pub midi_in: Option<PortHandle>,
    pub midi_out: Option<PortHandle>,
    pub control_in: Option<PortHandle>,
    pub control_out: Option<PortHandle>,
}

/// Everything a format backend discovered about its plugin binary,
/// consumed by [`PluginInstance::reload`] to (re)build ports and tables.
#[derive(Debug, Default)]
pub struct PluginLayout {
    pub audio_in_rindexes: Vec<u32>,
    pub audio_out_rindexes: Vec<u32>,
    pub wants_midi_in: bool,
    pub wants_midi_out: bool,
    pub parameters: Vec<(ParameterData, ParameterRanges)>,
    pub program_names: Vec<String>,
    pub midi_programs: Vec<MidiProgram>,
}

/// Per-cycle processing input handed to the backend. Injected notes are
/// spliced ahead of host-delivered events, in arrival order.
#[derive(Debug)]
pub struct ProcessContext<'a> {
    pub frames: u32,
    pub notes: &'a [ExternalNote],
}

/// Contract every concrete plugin format backend must honor.
///
/// `read_parameter` and `write_parameter` take `&self` because the audio
/// callback and control threads reach them concurrently; implementations
/// own whatever interior synchronization their plugin API needs.
/// `write_parameter` must clamp with [`ParameterRanges::fix_value`] before
/// the write reaches the plugin binary.
pub trait FormatBackend: Send {
    /// Open the plugin binary (formats that ship native code do it through
    /// the provided loader) and resolve whatever entry points the format
    /// needs. A failure leaves the instance in `Constructed`, never
    /// activated, with the loader error retrievable from the library.
    fn initialize(&mut self, path: &Path, library: &mut PluginLibrary) -> Result<(), HostError>;

    /// Discover ports, parameters and programs. Called on every reload.
    fn describe(&self) -> PluginLayout;

    fn category(&self) -> PluginCategory {
        PluginCategory::None
    }

    fn unique_id(&self) -> i64 {
        0
    }

    fn label(&self) -> String {
        String::new()
    }

    fn maker(&self) -> String {
        String::new()
    }

    fn copyright(&self) -> String {
        String::new()
    }

    fn parameter_name(&self, _index: u32) -> String {
        String::new()
    }

    fn parameter_symbol(&self, _index: u32) -> String {
        String::new()
    }

    fn parameter_unit(&self, _index: u32) -> String {
        String::new()
    }

    fn parameter_text(&self, _index: u32) -> String {
        String::new()
    }

    fn read_parameter(&self, index: u32) -> f32;

    fn write_parameter(&self, index: u32, value: f32);

    fn process(&mut self, context: &ProcessContext<'_>);

    fn buffer_size_changed(&mut self, _frames: u32) {}
}

/// Lifecycle of a plugin instance. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Loaded,
    Activated,
    Deactivated,
    Removed,
}

/// Collaborator handles an instance is created with.
pub struct HostHandles {
    pub server: Arc<dyn AudioServer>,
    pub broadcast: Option<Arc<dyn BroadcastSink>>,
    pub observer: Option<Arc<dyn NotificationSink>>,
}

/// The tables the audio callback reads and control threads replace
/// wholesale on reload.
#[derive(Debug, Default)]
pub(crate) struct PluginTables {
    pub data: Vec<ParameterData>,
    pub ranges: Vec<ParameterRanges>,
    pub programs: ProgramTable,
    pub midi_programs: MidiProgramTable,
}

pub(crate) struct PeerState {
    pub endpoint: RemoteEndpoint,
    pub sink: Option<Arc<dyn PeerSink>>,
}

/// A loaded plugin and all host-side machinery around it: identity, ports,
/// clamped parameter/program state, cross-thread event queues, and the
/// mirroring channels toward remote observers.
pub struct PluginInstance {
    pub(crate) format: PluginFormat,
    pub(crate) state: LifecycleState,
    pub(crate) id: InstanceId,
    pub(crate) hint_mask: u32,
    pub(crate) name: Option<String>,
    pub(crate) filename: Option<PathBuf>,
    pub(crate) control_in_channel: u8,

    // Global controls, read by the audio callback and written by control
    // threads. Atomics replace the unsynchronized fields a non-memory-safe
    // host would get away with.
    pub(crate) active: AtomicBool,
    pub(crate) active_before: AtomicBool,
    pub(crate) dry_wet: AtomicF32,
    pub(crate) volume: AtomicF32,
    pub(crate) balance_left: AtomicF32,
    pub(crate) balance_right: AtomicF32,

    pub(crate) tables: RwLock<PluginTables>,
    pub(crate) ports: PortGroup,
    pub(crate) custom: Mutex<CustomDataStore>,
    pub(crate) post_events: PostEventQueue,
    pub(crate) ext_notes: ExternalNoteQueue,
    pub(crate) peer: Mutex<PeerState>,

    pub(crate) server: Arc<dyn AudioServer>,
    pub(crate) broadcast: Option<Arc<dyn BroadcastSink>>,
    pub(crate) observer: Option<Arc<dyn NotificationSink>>,

    pub(crate) library: PluginLibrary,
    pub(crate) backend: Option<Box<dyn FormatBackend>>,
}

impl PluginInstance {
    pub fn new(format: PluginFormat, host: HostHandles) -> Self {
        Self {
            format,
            state: LifecycleState::Constructed,
            id: InstanceId::UNASSIGNED,
            hint_mask: 0,
            name: None,
            filename: None,
            control_in_channel: 0,
            active: AtomicBool::new(false),
            active_before: AtomicBool::new(false),
            dry_wet: AtomicF32::new(1.0),
            volume: AtomicF32::new(1.0),
            balance_left: AtomicF32::new(-1.0),
            balance_right: AtomicF32::new(1.0),
            tables: RwLock::new(PluginTables::default()),
            ports: PortGroup::default(),
            custom: Mutex::new(CustomDataStore::default()),
            post_events: PostEventQueue::new(),
            ext_notes: ExternalNoteQueue::new(),
            peer: Mutex::new(PeerState {
                endpoint: RemoteEndpoint::default(),
                sink: None,
            }),
            server: host.server,
            broadcast: host.broadcast,
            observer: host.observer,
            library: PluginLibrary::new(),
            backend: None,
        }
    }

    /// Assigns the host-wide slot id. Done once per assignment by the host.
    pub fn set_id(&mut self, id: InstanceId) {
        self.id = id;
    }

    pub fn add_hints(&mut self, mask: u32) {
        self.hint_mask |= mask;
    }

    /// Hands the plugin binary to the backend for loading and entry-point
    /// discovery, then performs the initial reload. On failure the instance
    /// stays in `Constructed` and is never activated.
    pub fn load(
        &mut self,
        path: &Path,
        name: &str,
        mut backend: Box<dyn FormatBackend>,
    ) -> Result<(), HostError> {
        if self.state != LifecycleState::Constructed {
            return Err(HostError::InvalidState(format!(
                "load from {:?}",
                self.state
            )));
        }
        if !path.exists() {
            return Err(HostError::MissingBinary(path.to_path_buf()));
        }

        backend.initialize(path, &mut self.library)?;
        self.backend = Some(backend);
        self.name = Some(name.to_string());
        self.filename = Some(path.to_path_buf());
        self.state = LifecycleState::Loaded;
        log::debug!("loaded {} from {}", name, path.display());

        self.reload()
    }

    /// Atomically replaces the port group, parameter table and program
    /// tables from a fresh backend discovery pass. Legal from `Loaded` or
    /// `Deactivated`.
    pub fn reload(&mut self) -> Result<(), HostError> {
        match self.state {
            LifecycleState::Loaded | LifecycleState::Deactivated => {}
            other => {
                return Err(HostError::InvalidState(format!("reload from {other:?}")));
            }
        }
        let layout = match self.backend.as_ref() {
            Some(backend) => backend.describe(),
            None => return Err(HostError::InvalidState("reload without backend".into())),
        };

        // Old ports go away before anything new appears; the callback never
        // sees a half-replaced group.
        self.unregister_ports();

        let mut ports = PortGroup::default();
        for (i, rindex) in layout.audio_in_rindexes.iter().enumerate() {
            let name = format!("input_{}", i + 1);
            if let Some(handle) =
                self.server
                    .register_port(&name, PortKind::Audio, PortDirection::Input)
            {
                ports.audio_in.handles.push(handle);
                ports.audio_in.rindexes.push(*rindex);
            }
        }
        for (i, rindex) in layout.audio_out_rindexes.iter().enumerate() {
            let name = format!("output_{}", i + 1);
            if let Some(handle) =
                self.server
                    .register_port(&name, PortKind::Audio, PortDirection::Output)
            {
                ports.audio_out.handles.push(handle);
                ports.audio_out.rindexes.push(*rindex);
            }
        }
        if layout.wants_midi_in {
            ports.midi_in =
                self.server
                    .register_port("midi-in", PortKind::Midi, PortDirection::Input);
        }
        if layout.wants_midi_out {
            ports.midi_out =
                self.server
                    .register_port("midi-out", PortKind::Midi, PortDirection::Output);
        }
        let has_param_inputs = layout
            .parameters
            .iter()
            .any(|(data, _)| data.kind == ParameterKind::Input);
        let has_param_outputs = layout
            .parameters
            .iter()
            .any(|(data, _)| data.kind == ParameterKind::Output);
        if has_param_inputs {
            ports.control_in =
                self.server
                    .register_port("control-in", PortKind::Control, PortDirection::Input);
        }
        if has_param_outputs {
            ports.control_out = self.server.register_port(
                "control-out",
                PortKind::Control,
                PortDirection::Output,
            );
        }
        self.ports = ports;

        let mut tables = PluginTables::default();
        for (data, mut ranges) in layout.parameters {
            ranges.fix_default();
            tables.data.push(data);
            tables.ranges.push(ranges);
        }
        tables.programs = ProgramTable {
            names: layout.program_names,
            current: -1,
        };
        tables.midi_programs = MidiProgramTable {
            entries: layout.midi_programs,
            current: -1,
        };
        *self.tables.write() = tables;

        log::debug!(
            "reload: {} audio in, {} audio out, {} parameters",
            self.ports.audio_in.count(),
            self.ports.audio_out.count(),
            self.tables.read().data.len()
        );
        Ok(())
    }

    pub fn activate(&mut self) -> Result<(), HostError> {
        match self.state {
            LifecycleState::Loaded | LifecycleState::Deactivated => {
                self.server.activate();
                self.state = LifecycleState::Activated;
                Ok(())
            }
            other => Err(HostError::InvalidState(format!("activate from {other:?}"))),
        }
    }

    pub fn deactivate(&mut self) -> Result<(), HostError> {
        match self.state {
            LifecycleState::Activated => {
                self.server.deactivate();
                self.state = LifecycleState::Deactivated;
                Ok(())
            }
            other => Err(HostError::InvalidState(format!(
                "deactivate from {other:?}"
            ))),
        }
    }

    /// Tears the instance down. The order is a correctness invariant:
    /// ports are unregistered and the server deactivated first so the audio
    /// callback can no longer observe the instance, then the tables go,
    /// then the binary, then the owned strings. Every step null-checks its
    /// resource, so removal of a partially constructed instance is safe.
    pub fn remove(&mut self) {
        log::debug!("removing instance {:?}", self.id);

        if self.state == LifecycleState::Activated {
            self.server.deactivate();
        }
        self.unregister_ports();

        *self.tables.write() = PluginTables::default();

        // The backend holds symbols into the library; it has to go first.
        self.backend = None;
        let _ = self.library.close();

        self.name = None;
        self.filename = None;
        self.custom.lock().clear();

        self.state = LifecycleState::Removed;
    }

    fn unregister_ports(&mut self) {
        for handle in self.ports.audio_in.handles.drain(..) {
            self.server.unregister_port(handle);
        }
        for handle in self.ports.audio_out.handles.drain(..) {
            self.server.unregister_port(handle);
        }
        self.ports.audio_in.rindexes.clear();
        self.ports.audio_out.rindexes.clear();
        let singles = [
            self.ports.midi_in.take(),
            self.ports.midi_out.take(),
            self.ports.control_in.take(),
            self.ports.control_out.take(),
        ];
        for handle in singles.into_iter().flatten() {
            self.server.unregister_port(handle);
        }
    }

    /// One audio cycle. Drains the injection queue exactly once and splices
    /// the injected notes ahead of host-delivered events before handing
    /// everything to the backend. Requires an activated instance; with the
    /// processing flag off, the backend sees exactly one silencing cycle on
    /// the falling edge of the flag and nothing after.
    pub fn process(&mut self, frames: u32, host_notes: &[ExternalNote]) {
        if self.state != LifecycleState::Activated {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        let mut notes = NoteScratch::new();
        self.ext_notes.drain_into(&mut notes);
        for note in host_notes {
            if notes.push(*note).is_err() {
                break;
            }
        }

        let active = self.active.load(Ordering::Relaxed);
        if active {
            backend.process(&ProcessContext {
                frames,
                notes: &notes,
            });
        } else if self.active_before.load(Ordering::Relaxed) {
            // Falling edge of the processing flag: one cycle of note-offs
            // so the plugin goes silent instead of ringing on.
            notes.clear();
            for note in 0..128u16 {
                let _ = notes.push(ExternalNote {
                    on: false,
                    note: note as u8,
                    velocity: 0,
                });
            }
            backend.process(&ProcessContext {
                frames,
                notes: &notes,
            });
        }
        self.active_before.store(active, Ordering::Relaxed);
    }

    pub fn buffer_size_changed(&mut self, frames: u32) {
        if let Some(backend) = self.backend.as_mut() {
            backend.buffer_size_changed(frames);
        }
    }

    /// Validates that an inbound control message targets this instance.
    /// A mismatch mutates nothing and surfaces as a single diagnostic
    /// notification carrying the claimed and actual ids.
    pub fn accepts_message(&self, target: InstanceId) -> bool {
        if target == self.id {
            return true;
        }
        log::debug!(
            "control message for instance {:?} reached instance {:?}",
            target,
            self.id
        );
        self.notify_observer(CallbackEvent {
            kind: CallbackKind::Debug,
            instance: target,
            index: self.id.0,
            secondary: 0,
            value: 0.0,
        });
        false
    }

    /// Queues a notification for later delivery off the real-time path.
    pub fn postpone_event(
        &self,
        kind: PostEventKind,
        index: i32,
        value: f32,
        payload: Option<Arc<[u8]>>,
    ) {
        self.post_events.postpone(kind, index, value, payload);
    }

    /// Drains all deferred notifications, called from the host's idle step.
    pub fn drain_deferred(&self, out: &mut Vec<PostEvent>) {
        self.post_events.drain_into(out);
    }

    pub(crate) fn notify_observer(&self, event: CallbackEvent) {
        if let Some(observer) = &self.observer {
            observer.notify(event);
        }
    }

    pub(crate) fn has_hint(&self, mask: u32) -> bool {
        self.hint_mask & mask != 0
    }

    // --- identity and state accessors ---

    pub fn format(&self) -> PluginFormat {
        self.format
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn hints(&self) -> u32 {
        self.hint_mask
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn library(&self) -> &PluginLibrary {
        &self.library
    }

    pub fn control_in_channel(&self) -> u8 {
        self.control_in_channel
    }

    pub fn set_control_in_channel(&mut self, channel: u8) {
        self.control_in_channel = channel;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn dry_wet(&self) -> f32 {
        self.dry_wet.load(Ordering::Relaxed)
    }

    pub fn volume(&self) -> f32 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn balance_left(&self) -> f32 {
        self.balance_left.load(Ordering::Relaxed)
    }

    pub fn balance_right(&self) -> f32 {
        self.balance_right.load(Ordering::Relaxed)
    }

    // --- port and table accessors ---

    pub fn audio_in_count(&self) -> u32 {
        self.ports.audio_in.count()
    }

    pub fn audio_out_count(&self) -> u32 {
        self.ports.audio_out.count()
    }

    pub fn midi_in_count(&self) -> u32 {
        self.ports.midi_in.is_some() as u32
    }

    pub fn midi_out_count(&self) -> u32 {
        self.ports.midi_out.is_some() as u32
    }

    pub fn parameter_count(&self) -> u32 {
        self.tables.read().data.len() as u32
    }

    /// Splits the parameter count into inputs, outputs and total.
    pub fn parameter_count_info(&self) -> (u32, u32, u32) {
        let tables = self.tables.read();
        let mut ins = 0;
        let mut outs = 0;
        for data in &tables.data {
            match data.kind {
                ParameterKind::Input => ins += 1,
                ParameterKind::Output => outs += 1,
            }
        }
        (ins, outs, tables.data.len() as u32)
    }

    pub fn parameter_data(&self, index: u32) -> Option<ParameterData> {
        self.tables.read().data.get(index as usize).copied()
    }

    pub fn parameter_ranges(&self, index: u32) -> Option<ParameterRanges> {
        self.tables.read().ranges.get(index as usize).copied()
    }

    /// Current live value of a parameter, read from the backend.
    pub fn parameter_value(&self, index: u32) -> Option<f32> {
        if index >= self.parameter_count() {
            return None;
        }
        self.backend
            .as_ref()
            .map(|backend| backend.read_parameter(index))
    }

    pub fn program_count(&self) -> u32 {
        self.tables.read().programs.names.len() as u32
    }

    pub fn current_program(&self) -> i32 {
        self.tables.read().programs.current
    }

    pub fn program_name(&self, index: u32) -> Option<String> {
        self.tables
            .read()
            .programs
            .names
            .get(index as usize)
            .cloned()
    }

    pub fn midi_program_count(&self) -> u32 {
        self.tables.read().midi_programs.entries.len() as u32
    }

    pub fn current_midi_program(&self) -> i32 {
        self.tables.read().midi_programs.current
    }

    pub fn midi_program(&self, index: u32) -> Option<MidiProgram> {
        self.tables
            .read()
            .midi_programs
            .entries
            .get(index as usize)
            .cloned()
    }

    pub fn custom_data_count(&self) -> u32 {
        self.custom.lock().len() as u32
    }

    pub fn custom_data(&self) -> Vec<CustomData> {
        self.custom.lock().entries().to_vec()
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        if self.state != LifecycleState::Removed {
            self.remove();
        }
    }
}
