use crate::game::events::Outcome;
use crate::game::note::{LANE_COUNT, Lane, NoteState, Owner};
use crate::game::timeline::NoteTimeline;
use log::{debug, error};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveHold {
    pub note_index: usize,
    pub end_time_ms: f64,
}

/// At most one engaged hold per lane for one strumline.
#[derive(Clone, Debug)]
pub struct HoldRegistry {
    owner: Owner,
    slots: [Option<ActiveHold>; LANE_COUNT],
}

/// How a lane release should treat a hold that is not over yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReleaseMode {
    /// Releasing before `end - early_margin_ms` drops the hold.
    Timed { early_margin_ms: f64 },
    /// Always counts as held to the end.
    Complete,
}

impl HoldRegistry {
    pub fn new(owner: Owner) -> Self {
        Self {
            owner,
            slots: [None; LANE_COUNT],
        }
    }

    #[inline(always)]
    pub fn owner(&self) -> Owner {
        self.owner
    }

    #[inline(always)]
    pub fn active(&self, lane: Lane) -> Option<&ActiveHold> {
        self.slots[lane.index()].as_ref()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Moves a freshly hit hold note into `Held` and claims its lane.
    /// Returns false if the lane is already occupied or the note could not
    /// be moved, in which case nothing changes.
    pub fn begin(&mut self, timeline: &mut NoteTimeline, note_index: usize) -> bool {
        let (lane, end_time_ms) = {
            let note = timeline.note(note_index);
            (note.lane, note.end_time_ms())
        };
        if let Some(existing) = &self.slots[lane.index()] {
            error!(
                "Lane {:?} already holds note {}, refusing note {}",
                lane, existing.note_index, note_index
            );
            debug_assert!(false, "two holds active in lane {:?}", lane);
            return false;
        }
        if !timeline.note_mut(note_index).transition(NoteState::Held) {
            return false;
        }
        self.slots[lane.index()] = Some(ActiveHold {
            note_index,
            end_time_ms,
        });
        debug!(
            "{:?} hold engaged: note {} lane {:?} until {:.1}ms",
            self.owner, note_index, lane, end_time_ms
        );
        true
    }

    /// Completes every hold whose end time has passed.
    pub fn finish_due(&mut self, timeline: &mut NoteTimeline, now_ms: f64, out: &mut Vec<Outcome>) {
        for lane in Lane::ALL {
            let due = self.slots[lane.index()].is_some_and(|hold| now_ms >= hold.end_time_ms);
            if due {
                self.complete(timeline, lane, out);
            }
        }
    }

    /// Lets go of `lane`. A release with no engaged hold does nothing.
    pub fn release(
        &mut self,
        timeline: &mut NoteTimeline,
        lane: Lane,
        now_ms: f64,
        mode: ReleaseMode,
        out: &mut Vec<Outcome>,
    ) {
        let Some(hold) = self.slots[lane.index()] else {
            return;
        };
        let early = match mode {
            ReleaseMode::Timed { early_margin_ms } => now_ms < hold.end_time_ms - early_margin_ms,
            ReleaseMode::Complete => false,
        };
        if !early {
            self.complete(timeline, lane, out);
            return;
        }

        self.slots[lane.index()] = None;
        if timeline.note_mut(hold.note_index).transition(NoteState::ReleasedEarly) {
            debug!(
                "{:?} hold dropped: note {} lane {:?} released {:.1}ms before end",
                self.owner,
                hold.note_index,
                lane,
                hold.end_time_ms - now_ms
            );
            out.push(Outcome::Miss {
                note: Some(hold.note_index),
                owner: self.owner,
                lane,
            });
        }
    }

    pub fn release_all(
        &mut self,
        timeline: &mut NoteTimeline,
        now_ms: f64,
        mode: ReleaseMode,
        out: &mut Vec<Outcome>,
    ) {
        for lane in Lane::ALL {
            self.release(timeline, lane, now_ms, mode, out);
        }
    }

    pub fn clear(&mut self) {
        self.slots = [None; LANE_COUNT];
    }

    fn complete(&mut self, timeline: &mut NoteTimeline, lane: Lane, out: &mut Vec<Outcome>) {
        let Some(hold) = self.slots[lane.index()].take() else {
            return;
        };
        if timeline.note_mut(hold.note_index).transition(NoteState::Finished) {
            out.push(Outcome::HoldFinished {
                note: hold.note_index,
                owner: self.owner,
                lane,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::note::Note;

    fn engaged(sustain: f64) -> (NoteTimeline, HoldRegistry) {
        let mut timeline =
            NoteTimeline::new(vec![Note::new(Lane::Up, 1000.0, sustain, Owner::Player)]);
        timeline.spawn(0.0, 2000.0, 1500.0);
        let mut holds = HoldRegistry::new(Owner::Player);
        assert!(holds.begin(&mut timeline, 0));
        (timeline, holds)
    }

    const TIMED: ReleaseMode = ReleaseMode::Timed { early_margin_ms: 160.0 };

    #[test]
    fn unreleased_hold_finishes_once_at_end() {
        let (mut timeline, mut holds) = engaged(500.0);
        let mut out = Vec::new();
        holds.finish_due(&mut timeline, 1499.0, &mut out);
        assert!(out.is_empty());
        holds.finish_due(&mut timeline, 1500.0, &mut out);
        holds.finish_due(&mut timeline, 1600.0, &mut out);
        assert_eq!(
            out,
            vec![Outcome::HoldFinished { note: 0, owner: Owner::Player, lane: Lane::Up }]
        );
        assert_eq!(timeline.note(0).state(), NoteState::Finished);
        assert_eq!(holds.active_count(), 0);
    }

    #[test]
    fn early_release_is_a_miss() {
        let (mut timeline, mut holds) = engaged(500.0);
        let mut out = Vec::new();
        holds.release(&mut timeline, Lane::Up, 1200.0, TIMED, &mut out);
        assert_eq!(
            out,
            vec![Outcome::Miss { note: Some(0), owner: Owner::Player, lane: Lane::Up }]
        );
        assert_eq!(timeline.note(0).state(), NoteState::ReleasedEarly);
    }

    #[test]
    fn release_near_the_end_counts_as_finished() {
        let (mut timeline, mut holds) = engaged(500.0);
        let mut out = Vec::new();
        holds.release(&mut timeline, Lane::Up, 1345.0, TIMED, &mut out);
        assert!(matches!(out[0], Outcome::HoldFinished { note: 0, .. }));
    }

    #[test]
    fn complete_mode_never_drops() {
        let (mut timeline, mut holds) = engaged(500.0);
        let mut out = Vec::new();
        holds.release_all(&mut timeline, 1001.0, ReleaseMode::Complete, &mut out);
        assert!(matches!(out[0], Outcome::HoldFinished { .. }));
        assert_eq!(timeline.note(0).state(), NoteState::Finished);
    }

    #[test]
    fn release_without_hold_is_a_no_op() {
        let mut timeline = NoteTimeline::new(vec![Note::new(Lane::Up, 1000.0, 0.0, Owner::Player)]);
        let mut holds = HoldRegistry::new(Owner::Player);
        let mut out = Vec::new();
        holds.release(&mut timeline, Lane::Left, 500.0, TIMED, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    #[should_panic(expected = "two holds active in lane Up")]
    fn second_hold_in_a_lane_is_refused() {
        let mut timeline = NoteTimeline::new(vec![
            Note::new(Lane::Up, 1000.0, 500.0, Owner::Player),
            Note::new(Lane::Up, 1200.0, 500.0, Owner::Player),
        ]);
        timeline.spawn(0.0, 2000.0, 1500.0);
        let mut holds = HoldRegistry::new(Owner::Player);
        assert!(holds.begin(&mut timeline, 0));
        holds.begin(&mut timeline, 1);
    }
}
