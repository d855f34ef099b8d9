use parking_lot::Mutex;

/// Capacity of the external MIDI injection buffer.
pub const MAX_MIDI_EVENTS: usize = 512;

/// A synthetic note event injected from outside the audio path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalNote {
    pub on: bool,
    pub note: u8,
    pub velocity: u8,
}

/// Scratch buffer the audio callback drains injected notes into. Fixed
/// capacity, no heap allocation inside the cycle.
pub type NoteScratch = heapless::Vec<ExternalNote, MAX_MIDI_EVENTS>;

/// Bounded, mutex-guarded buffer of synthetic note events headed for the
/// next audio cycle.
///
/// The queue has its own mutex, separate from the deferred event queue's,
/// so control-thread notification traffic never contends with the audio
/// callback. Holding this mutex inside the callback is a deliberate,
/// bounded exception to lock-freedom: the critical section is O(capacity)
/// with no syscalls and no unbounded work.
pub struct ExternalNoteQueue {
    slots: Mutex<Box<[Option<ExternalNote>]>>,
}

impl ExternalNoteQueue {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(vec![None; MAX_MIDI_EVENTS].into_boxed_slice()),
        }
    }

    /// Stores a note event in the first free slot. Callable from any
    /// non-audio thread; silently drops when the buffer is full.
    pub fn inject(&self, on: bool, note: u8, velocity: u8) {
        let mut slots = self.slots.lock();
        match slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(ExternalNote { on, note, velocity }),
            None => log::debug!("external MIDI buffer full, dropping note {note}"),
        }
    }

    /// Copies all pending notes out in arrival order and invalidates every
    /// slot. The audio callback calls this exactly once at the start of each
    /// cycle and splices the result ahead of host-delivered events.
    pub fn drain_into(&self, out: &mut NoteScratch) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            if let Some(note) = slot.take() {
                // Capacities match, the push cannot fail.
                let _ = out.push(note);
            }
        }
    }

    /// Writes a note-off for every MIDI note into the first 128 slots,
    /// overwriting whatever is there. The panic sweep always goes through
    /// in full, even at the cost of pending injected notes.
    pub fn inject_all_notes_off(&self) {
        let mut slots = self.slots.lock();
        for note in 0..128u16 {
            slots[note as usize] = Some(ExternalNote {
                on: false,
                note: note as u8,
                velocity: 0,
            });
        }
    }
}

impl Default for ExternalNoteQueue {
    fn default() -> Self {
        Self::new()
    }
}
