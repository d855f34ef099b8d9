/// Upper bound on the parameter count mirrored to remote observers;
/// plugins beyond it keep working locally but skip per-parameter resync.
pub const MAX_PARAMETERS: u32 = 200;

/// Reserved control indices, disjoint from the non-negative parameter
/// indices. Inbound control messages use them to address the global
/// controls of an instance.
pub const PARAMETER_NULL: i32 = -1;
pub const PARAMETER_ACTIVE: i32 = -2;
pub const PARAMETER_DRYWET: i32 = -3;
pub const PARAMETER_VOLUME: i32 = -4;
pub const PARAMETER_BALANCE_LEFT: i32 = -5;
pub const PARAMETER_BALANCE_RIGHT: i32 = -6;

/// Direction of a parameter as seen from the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ParameterKind {
    Input = 0,
    Output = 1,
}

/// Per-parameter descriptor, paired 1:1 with a [`ParameterRanges`].
#[derive(Debug, Clone, Copy)]
pub struct ParameterData {
    pub kind: ParameterKind,
    /// The parameter's index in the plugin binary's own indexing scheme.
    pub rindex: i32,
    pub hints: u32,
    pub midi_channel: u8,
    pub midi_cc: i16,
}

impl ParameterData {
    pub fn input(rindex: i32) -> Self {
        Self {
            kind: ParameterKind::Input,
            rindex,
            hints: 0,
            midi_channel: 0,
            midi_cc: -1,
        }
    }

    pub fn output(rindex: i32) -> Self {
        Self {
            kind: ParameterKind::Output,
            ..Self::input(rindex)
        }
    }
}

/// Value range of a parameter. Invariant: `min <= default <= max`; every
/// externally observable value is clamped into `[min, max]` before storage
/// or propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRanges {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub step: f32,
    pub step_small: f32,
    pub step_large: f32,
}

impl ParameterRanges {
    /// Clamps `value` into `[min, max]`. Backends call this before every
    /// write into the plugin binary.
    pub fn fix_value(&self, value: f32) -> f32 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Restores the `min <= default <= max` invariant after a reload or a
    /// default re-snapshot.
    pub fn fix_default(&mut self) {
        self.default = self.fix_value(self.default);
    }
}

impl Default for ParameterRanges {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            default: 0.0,
            step: 0.01,
            step_small: 0.0001,
            step_large: 0.1,
        }
    }
}

/// Ordered program names plus the current-selection cursor (-1 = none).
/// Replaced wholesale on reload, never mutated incrementally.
#[derive(Debug, Clone)]
pub struct ProgramTable {
    pub names: Vec<String>,
    pub current: i32,
}

impl Default for ProgramTable {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            current: -1,
        }
    }
}

/// A bank/program pair with its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiProgram {
    pub bank: u32,
    pub program: u32,
    pub name: String,
}

/// Ordered MIDI programs plus the current-selection cursor (-1 = none).
#[derive(Debug, Clone)]
pub struct MidiProgramTable {
    pub entries: Vec<MidiProgram>,
    pub current: i32,
}

impl Default for MidiProgramTable {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            current: -1,
        }
    }
}

impl MidiProgramTable {
    pub fn position(&self, bank: u32, program: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.bank == bank && entry.program == program)
    }
}

/// Kind tag of an opaque custom key/value state entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomDataKind {
    Invalid,
    String,
    Binary,
}

impl CustomDataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomDataKind::Invalid => "invalid",
            CustomDataKind::String => "string",
            CustomDataKind::Binary => "binary",
        }
    }
}

/// One opaque state entry a plugin asked the host to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomData {
    pub kind: CustomDataKind,
    pub key: String,
    pub value: String,
}

/// Keys used only for live remote-control bookkeeping; they never reach
/// persisted state.
fn is_transient_key(key: &str) -> bool {
    key.starts_with("OSC:") || key == "guiVisible"
}

/// Unique-key store for custom plugin state. Last writer wins.
#[derive(Debug, Default)]
pub struct CustomDataStore {
    entries: Vec<CustomData>,
}

impl CustomDataStore {
    /// Upserts an entry, filtering out invalid-kind submissions and
    /// transient-protocol keys. Returns whether the entry was stored.
    pub fn set(&mut self, kind: CustomDataKind, key: &str, value: &str) -> bool {
        let keep = match kind {
            CustomDataKind::Invalid => false,
            CustomDataKind::String => !is_transient_key(key),
            CustomDataKind::Binary => true,
        };
        if !keep {
            return false;
        }

        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.key == key) {
            entry.kind = kind;
            entry.value = value.to_string();
        } else {
            self.entries.push(CustomData {
                kind,
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        true
    }

    pub fn get(&self, key: &str) -> Option<&CustomData> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn entries(&self) -> &[CustomData] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
