#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cadenza_plugin_host::{
    AudioServer, CallbackEvent, ExternalNote, FormatBackend, HostError, HostHandles, HostMessage,
    InstanceId, MidiProgram, NotificationSink, ParameterData, ParameterRanges, PeerMessage,
    PeerSink, PluginFormat, PluginInstance, PluginLayout, PluginLibrary, PortDirection,
    PortHandle, PortKind, ProcessContext,
};
use cadenza_remote::BroadcastSink;

/// Audio-server stub that records every port/activation call in order.
#[derive(Default)]
pub struct StubServer {
    next_handle: AtomicU64,
    pub ops: Mutex<Vec<String>>,
    pub registered: Mutex<Vec<PortHandle>>,
}

impl AudioServer for StubServer {
    fn register_port(
        &self,
        name: &str,
        _kind: PortKind,
        _direction: PortDirection,
    ) -> Option<PortHandle> {
        let handle = PortHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.ops.lock().unwrap().push(format!("register {name}"));
        self.registered.lock().unwrap().push(handle);
        Some(handle)
    }

    fn unregister_port(&self, handle: PortHandle) {
        self.ops.lock().unwrap().push("unregister".to_string());
        self.registered.lock().unwrap().retain(|h| *h != handle);
    }

    fn activate(&self) {
        self.ops.lock().unwrap().push("activate".to_string());
    }

    fn deactivate(&self) {
        self.ops.lock().unwrap().push("deactivate".to_string());
    }
}

#[derive(Default)]
pub struct RecordingBroadcast {
    pub registered: AtomicBool,
    pub messages: Mutex<Vec<(InstanceId, HostMessage)>>,
}

impl RecordingBroadcast {
    pub fn registered() -> Arc<Self> {
        let broadcast = Self::default();
        broadcast.registered.store(true, Ordering::Relaxed);
        Arc::new(broadcast)
    }

    pub fn take(&self) -> Vec<(InstanceId, HostMessage)> {
        std::mem::take(&mut self.messages.lock().unwrap())
    }
}

impl BroadcastSink for RecordingBroadcast {
    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Relaxed)
    }

    fn send(&self, instance: InstanceId, message: HostMessage) {
        self.messages.lock().unwrap().push((instance, message));
    }
}

#[derive(Default)]
pub struct RecordingPeer {
    pub messages: Mutex<Vec<PeerMessage>>,
}

impl RecordingPeer {
    pub fn take(&self) -> Vec<PeerMessage> {
        std::mem::take(&mut self.messages.lock().unwrap())
    }
}

impl PeerSink for RecordingPeer {
    fn send(&self, message: PeerMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingObserver {
    pub fn take(&self) -> Vec<CallbackEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

impl NotificationSink for RecordingObserver {
    fn notify(&self, event: CallbackEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Format-backend stub with an in-memory parameter store. Does not open a
/// real binary; `write_parameter` clamps through the declared ranges the
/// way a real backend must.
pub struct StubBackend {
    pub layout: StubLayout,
    pub values: Arc<Mutex<Vec<f32>>>,
    pub process_calls: Arc<AtomicU32>,
    pub seen_notes: Arc<Mutex<Vec<Vec<ExternalNote>>>>,
}

#[derive(Clone, Default)]
pub struct StubLayout {
    pub audio_ins: u32,
    pub audio_outs: u32,
    pub wants_midi_in: bool,
    pub parameters: Vec<(ParameterData, ParameterRanges)>,
    pub programs: Vec<String>,
    pub midi_programs: Vec<MidiProgram>,
}

impl StubBackend {
    pub fn new(layout: StubLayout) -> Self {
        let values = layout
            .parameters
            .iter()
            .map(|(_, ranges)| ranges.default)
            .collect();
        Self {
            layout,
            values: Arc::new(Mutex::new(values)),
            process_calls: Arc::new(AtomicU32::new(0)),
            seen_notes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handles the test keeps after the backend is boxed into an instance.
    pub fn probes(
        &self,
    ) -> (
        Arc<Mutex<Vec<f32>>>,
        Arc<AtomicU32>,
        Arc<Mutex<Vec<Vec<ExternalNote>>>>,
    ) {
        (
            Arc::clone(&self.values),
            Arc::clone(&self.process_calls),
            Arc::clone(&self.seen_notes),
        )
    }
}

impl FormatBackend for StubBackend {
    fn initialize(&mut self, _path: &Path, _library: &mut PluginLibrary) -> Result<(), HostError> {
        Ok(())
    }

    fn describe(&self) -> PluginLayout {
        PluginLayout {
            audio_in_rindexes: (0..self.layout.audio_ins).collect(),
            audio_out_rindexes: (0..self.layout.audio_outs).collect(),
            wants_midi_in: self.layout.wants_midi_in,
            wants_midi_out: false,
            parameters: self.layout.parameters.clone(),
            program_names: self.layout.programs.clone(),
            midi_programs: self.layout.midi_programs.clone(),
        }
    }

    fn parameter_name(&self, index: u32) -> String {
        format!("param {index}")
    }

    fn parameter_unit(&self, _index: u32) -> String {
        String::new()
    }

    fn read_parameter(&self, index: u32) -> f32 {
        self.values.lock().unwrap()[index as usize]
    }

    fn write_parameter(&self, index: u32, value: f32) {
        let ranges = self.layout.parameters[index as usize].1;
        self.values.lock().unwrap()[index as usize] = ranges.fix_value(value);
    }

    fn process(&mut self, context: &ProcessContext<'_>) {
        self.process_calls.fetch_add(1, Ordering::Relaxed);
        self.seen_notes.lock().unwrap().push(context.notes.to_vec());
    }
}

pub struct TestRig {
    pub server: Arc<StubServer>,
    pub broadcast: Arc<RecordingBroadcast>,
    pub observer: Arc<RecordingObserver>,
    pub instance: PluginInstance,
    pub values: Arc<Mutex<Vec<f32>>>,
    pub process_calls: Arc<AtomicU32>,
    pub seen_notes: Arc<Mutex<Vec<Vec<ExternalNote>>>>,
    // Keeps the fake binary alive for the instance's lifetime.
    _binary: tempfile::NamedTempFile,
}

/// Builds a loaded instance around a [`StubBackend`] with the given layout.
pub fn load_instance(format: PluginFormat, layout: StubLayout) -> TestRig {
    let server = Arc::new(StubServer::default());
    let broadcast = RecordingBroadcast::registered();
    let observer = Arc::new(RecordingObserver::default());

    let mut instance = PluginInstance::new(
        format,
        HostHandles {
            server: Arc::clone(&server) as Arc<dyn AudioServer>,
            broadcast: Some(Arc::clone(&broadcast) as Arc<dyn BroadcastSink>),
            observer: Some(Arc::clone(&observer) as Arc<dyn NotificationSink>),
        },
    );

    let backend = StubBackend::new(layout);
    let (values, process_calls, seen_notes) = backend.probes();

    let binary = tempfile::NamedTempFile::new().expect("temp plugin binary");
    instance
        .load(binary.path(), "stub", Box::new(backend))
        .expect("load stub plugin");

    TestRig {
        server,
        broadcast,
        observer,
        instance,
        values,
        process_calls,
        seen_notes,
        _binary: binary,
    }
}

/// One input parameter with the classic `{0, 1, 0.5}` range.
pub fn unit_parameter(rindex: i32) -> (ParameterData, ParameterRanges) {
    (
        ParameterData::input(rindex),
        ParameterRanges {
            min: 0.0,
            max: 1.0,
            default: 0.5,
            ..ParameterRanges::default()
        },
    )
}
