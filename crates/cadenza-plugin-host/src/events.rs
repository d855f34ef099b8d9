use std::sync::Arc;

use parking_lot::Mutex;

/// Capacity of the deferred event buffer.
pub const MAX_POST_EVENTS: usize = 152;

/// Number of slots an all-notes-off burst needs (one per MIDI note).
const NOTE_SWEEP: usize = 128;

/// Kind of a deferred notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostEventKind {
    Debug,
    ParameterChange,
    ProgramChange,
    MidiProgramChange,
    NoteOn,
    NoteOff,
    Custom,
}

/// A notification generated on any thread (including the audio callback)
/// for later delivery off the real-time path.
#[derive(Debug, Clone)]
pub struct PostEvent {
    pub kind: PostEventKind,
    pub index: i32,
    pub value: f32,
    pub payload: Option<Arc<[u8]>>,
}

/// Bounded, mutex-guarded buffer of deferred notifications.
///
/// Producers never block beyond the critical section and never grow the
/// buffer: when all slots are taken new events are dropped. These are
/// UI-facing notifications, not state of record, so loss under extreme load
/// is traded for a hard ceiling on blocking time and memory.
pub struct PostEventQueue {
    slots: Mutex<Box<[Option<PostEvent>]>>,
}

impl PostEventQueue {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(vec![None; MAX_POST_EVENTS].into_boxed_slice()),
        }
    }

    /// Stores an event in the first free slot. Callable from any thread;
    /// silently drops the event when the buffer is full.
    pub fn postpone(
        &self,
        kind: PostEventKind,
        index: i32,
        value: f32,
        payload: Option<Arc<[u8]>>,
    ) {
        let mut slots = self.slots.lock();
        match slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(PostEvent {
                    kind,
                    index,
                    value,
                    payload,
                });
            }
            None => log::debug!("post-event buffer full, dropping {kind:?} event"),
        }
    }

    /// Copies every pending event out in submission order and invalidates
    /// all slots, in a single critical section. Called periodically by the
    /// non-real-time consumer.
    pub fn drain_into(&self, out: &mut Vec<PostEvent>) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            if let Some(event) = slot.take() {
                out.push(event);
            }
        }
    }

    /// Posts the 128-note-off sweep of an all-notes-off panic.
    ///
    /// The burst needs 128 contiguous slots starting at the first free one.
    /// When the tail would not fit, the landing pad moves back over the
    /// newest entries instead of dropping any part of the sweep; a
    /// completely full buffer lands it at slot 0, over the oldest.
    pub fn post_all_notes_off(&self) {
        let mut slots = self.slots.lock();
        let mut pad = slots.iter().position(|slot| slot.is_none()).unwrap_or(0);
        if pad + NOTE_SWEEP > MAX_POST_EVENTS {
            log::warn!("post-event buffer full, making room for all notes off now");
            pad = MAX_POST_EVENTS - NOTE_SWEEP;
        }
        for note in 0..NOTE_SWEEP {
            slots[pad + note] = Some(PostEvent {
                kind: PostEventKind::NoteOff,
                index: note as i32,
                value: 0.0,
                payload: None,
            });
        }
    }
}

impl Default for PostEventQueue {
    fn default() -> Self {
        Self::new()
    }
}
