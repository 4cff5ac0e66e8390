use log::error;
use serde::{Deserialize, Serialize};

pub const LANE_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Lane {
    Left = 0,
    Down = 1,
    Up = 2,
    Right = 3,
}

impl Lane {
    pub const ALL: [Lane; LANE_COUNT] = [Lane::Left, Lane::Down, Lane::Up, Lane::Right];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub fn from_index(index: usize) -> Option<Lane> {
        Self::ALL.get(index).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Owner {
    Player,
    Opponent,
}

/// Lifecycle of a single note. Transitions only move forward:
///
/// `NotSpawned -> Spawned -> Hit` for taps,
/// `NotSpawned -> Spawned -> Held -> {ReleasedEarly | Finished}` for holds,
/// and `Spawned -> Missed` for anything that was never hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteState {
    NotSpawned,
    Spawned,
    Held,
    Hit,
    ReleasedEarly,
    Finished,
    Missed,
}

impl NoteState {
    pub fn can_transition_to(self, next: NoteState) -> bool {
        use NoteState::*;
        matches!(
            (self, next),
            (NotSpawned, Spawned)
                | (Spawned, Hit)
                | (Spawned, Held)
                | (Spawned, Missed)
                | (Held, ReleasedEarly)
                | (Held, Finished)
        )
    }

    #[inline(always)]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NoteState::Hit | NoteState::ReleasedEarly | NoteState::Finished | NoteState::Missed
        )
    }
}

#[derive(Clone, Debug)]
pub struct Note {
    pub lane: Lane,
    pub strum_time_ms: f64,
    pub sustain_length_ms: f64,
    pub owner: Owner,
    state: NoteState,
}

impl Note {
    pub fn new(lane: Lane, strum_time_ms: f64, sustain_length_ms: f64, owner: Owner) -> Self {
        Self {
            lane,
            strum_time_ms,
            sustain_length_ms,
            owner,
            state: NoteState::NotSpawned,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> NoteState {
        self.state
    }

    #[inline(always)]
    pub fn is_hold(&self) -> bool {
        self.sustain_length_ms > 0.0
    }

    #[inline(always)]
    pub fn end_time_ms(&self) -> f64 {
        self.strum_time_ms + self.sustain_length_ms
    }

    #[inline(always)]
    pub fn spawned(&self) -> bool {
        self.state != NoteState::NotSpawned
    }

    #[inline(always)]
    pub fn was_hit(&self) -> bool {
        matches!(
            self.state,
            NoteState::Hit | NoteState::Held | NoteState::ReleasedEarly | NoteState::Finished
        )
    }

    #[inline(always)]
    pub fn too_late(&self) -> bool {
        self.state == NoteState::Missed
    }

    #[inline(always)]
    pub fn is_being_held(&self) -> bool {
        self.state == NoteState::Held
    }

    /// Spawned and still waiting for a hit or a miss.
    #[inline(always)]
    pub fn is_judgeable(&self) -> bool {
        self.state == NoteState::Spawned
    }

    /// Fraction of the hold body already consumed at `now_ms`, in `[0, 1]`.
    /// Tap notes and holds that were never hit report 0.
    pub fn hold_progress(&self, now_ms: f64) -> f64 {
        if !self.is_hold() {
            return 0.0;
        }
        match self.state {
            NoteState::Held => {
                ((now_ms - self.strum_time_ms) / self.sustain_length_ms).clamp(0.0, 1.0)
            }
            NoteState::Finished => 1.0,
            _ => 0.0,
        }
    }

    /// How many of `segment_count` hold body pieces have scrolled through
    /// the receptor while the hold was engaged.
    pub fn hold_segments_destroyed(&self, now_ms: f64, segment_count: usize) -> usize {
        let consumed = (self.hold_progress(now_ms) * segment_count as f64).floor() as usize;
        consumed.min(segment_count)
    }

    /// Moves the note to `next`. Returns false (and leaves the note alone) on
    /// an illegal transition, which only happens if the frame order was
    /// broken somewhere upstream.
    pub(crate) fn transition(&mut self, next: NoteState) -> bool {
        if !self.state.can_transition_to(next) {
            error!(
                "Illegal note transition {:?} -> {:?} (lane {:?}, strum {:.1}ms)",
                self.state, next, self.lane, self.strum_time_ms
            );
            debug_assert!(false, "illegal note transition {:?} -> {:?}", self.state, next);
            return false;
        }
        self.state = next;
        true
    }

    pub(crate) fn reset_state(&mut self) {
        self.state = NoteState::NotSpawned;
    }
}
