use crate::game::note::{LANE_COUNT, Lane, Note, NoteState, Owner};
use crate::game::scroll::ScrollSpeedSetting;
use log::{debug, trace};

#[inline(always)]
const fn owner_slot(owner: Owner) -> usize {
    match owner {
        Owner::Player => 0,
        Owner::Opponent => 1,
    }
}

/// Where a live note sits relative to its receptor this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleNote {
    pub note_index: usize,
    pub lane: Lane,
    pub owner: Owner,
    /// Positive while the head is still approaching the receptor.
    pub offset_px: f64,
    /// Length of the hold body still left to scroll, 0 for taps.
    pub hold_length_px: f64,
}

/// Owns every note of the chart. Notes are sorted by strum time and never
/// reordered, so indices stay valid for the whole session.
///
/// Spawned notes are mirrored into per-owner, per-lane arrow lists that the
/// judge, the sweeps and the scroll view walk instead of the full chart.
#[derive(Clone, Debug)]
pub struct NoteTimeline {
    notes: Vec<Note>,
    spawn_cursor: usize,
    arrows: [[Vec<usize>; LANE_COUNT]; 2],
    skipped: usize,
}

impl NoteTimeline {
    pub fn new(notes: Vec<Note>) -> Self {
        debug_assert!(
            notes
                .windows(2)
                .all(|pair| pair[0].strum_time_ms <= pair[1].strum_time_ms),
            "timeline notes must be sorted by strum time"
        );
        Self {
            notes,
            spawn_cursor: 0,
            arrows: Default::default(),
            skipped: 0,
        }
    }

    #[inline(always)]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[inline(always)]
    pub fn note(&self, index: usize) -> &Note {
        &self.notes[index]
    }

    #[inline(always)]
    pub(crate) fn note_mut(&mut self, index: usize) -> &mut Note {
        &mut self.notes[index]
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    #[inline(always)]
    pub fn spawn_cursor(&self) -> usize {
        self.spawn_cursor
    }

    /// Notes passed over by the spawn window because they were already stale.
    #[inline(always)]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Indices of live notes in one lane, oldest first.
    #[inline(always)]
    pub fn lane_arrows(&self, owner: Owner, lane: Lane) -> &[usize] {
        &self.arrows[owner_slot(owner)][lane.index()]
    }

    /// Indices of every live note for `owner`, lane by lane.
    pub fn live_indices(&self, owner: Owner) -> Vec<usize> {
        self.arrows[owner_slot(owner)]
            .iter()
            .flat_map(|lane| lane.iter().copied())
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.arrows.iter().flatten().map(Vec::len).sum()
    }

    /// Spawns every note whose strum time falls before `now + lead_ms`.
    /// Notes that are already more than `stale_ms` in the past are skipped
    /// and stay `NotSpawned`, so seeking forward does not dump a pile of
    /// misses on the player. Returns how many notes were spawned.
    pub fn spawn(&mut self, now_ms: f64, lead_ms: f64, stale_ms: f64) -> usize {
        let horizon = now_ms + lead_ms;
        let stale_before = now_ms - stale_ms;
        let mut spawned = 0;

        while self.spawn_cursor < self.notes.len()
            && self.notes[self.spawn_cursor].strum_time_ms < horizon
        {
            let index = self.spawn_cursor;
            self.spawn_cursor += 1;

            let note = &mut self.notes[index];
            if note.strum_time_ms < stale_before {
                self.skipped += 1;
                trace!(
                    "Skipping stale note {} (lane {:?}, strum {:.1}ms, now {:.1}ms)",
                    index, note.lane, note.strum_time_ms, now_ms
                );
                continue;
            }
            if note.transition(NoteState::Spawned) {
                self.arrows[owner_slot(note.owner)][note.lane.index()].push(index);
                spawned += 1;
            }
        }
        spawned
    }

    /// Drops notes that no longer need to be drawn or judged. Hits and
    /// completed holds go immediately; misses and dropped holds keep
    /// scrolling past the receptor for `cull_after_ms`.
    pub fn cull(&mut self, now_ms: f64, cull_after_ms: f64) -> usize {
        let notes = &self.notes;
        let mut removed = 0;
        for lane in self.arrows.iter_mut().flatten() {
            let before = lane.len();
            lane.retain(|&index| {
                let note = &notes[index];
                match note.state() {
                    NoteState::Hit | NoteState::Finished => false,
                    NoteState::Missed | NoteState::ReleasedEarly => {
                        now_ms - note.end_time_ms() <= cull_after_ms
                    }
                    _ => true,
                }
            });
            removed += before - lane.len();
        }
        removed
    }

    /// Everything spawned and every note still pending has been dealt with.
    pub fn is_exhausted(&self) -> bool {
        self.spawn_cursor >= self.notes.len() && self.live_count() == 0
    }

    /// Latest point in time any note still matters.
    pub fn end_time_ms(&self) -> f64 {
        self.notes
            .iter()
            .map(Note::end_time_ms)
            .fold(0.0, f64::max)
    }

    /// Scroll positions of every live note for one owner.
    pub fn visible(
        &self,
        owner: Owner,
        now_ms: f64,
        scroll: ScrollSpeedSetting,
        chart_speed: f64,
    ) -> Vec<VisibleNote> {
        let mut out = Vec::new();
        for lane in Lane::ALL {
            for &index in self.lane_arrows(owner, lane) {
                let note = &self.notes[index];
                let remaining_body = if note.is_being_held() {
                    (note.end_time_ms() - now_ms).max(0.0)
                } else {
                    note.sustain_length_ms
                };
                out.push(VisibleNote {
                    note_index: index,
                    lane,
                    owner,
                    offset_px: scroll.offset_px(note.strum_time_ms - now_ms, chart_speed),
                    hold_length_px: scroll.offset_px(remaining_body, chart_speed),
                });
            }
        }
        out
    }

    pub fn reset(&mut self) {
        for note in &mut self.notes {
            note.reset_state();
        }
        for lane in self.arrows.iter_mut().flatten() {
            lane.clear();
        }
        self.spawn_cursor = 0;
        self.skipped = 0;
        debug!("Timeline reset ({} notes).", self.notes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(times: &[(Lane, f64, Owner)]) -> NoteTimeline {
        NoteTimeline::new(
            times
                .iter()
                .map(|&(lane, t, owner)| Note::new(lane, t, 0.0, owner))
                .collect(),
        )
    }

    #[test]
    fn spawns_inside_lead_window_only() {
        let mut tl = timeline(&[
            (Lane::Left, 1000.0, Owner::Player),
            (Lane::Up, 1500.0, Owner::Opponent),
            (Lane::Down, 2500.0, Owner::Player),
        ]);

        assert_eq!(tl.spawn(0.0, 2000.0, 1500.0), 2);
        assert_eq!(tl.lane_arrows(Owner::Player, Lane::Left).len(), 1);
        assert_eq!(tl.lane_arrows(Owner::Opponent, Lane::Up).len(), 1);
        assert!(tl.lane_arrows(Owner::Player, Lane::Down).is_empty());

        assert_eq!(tl.spawn(600.0, 2000.0, 1500.0), 1);
        assert_eq!(tl.spawn_cursor(), 3);
    }

    #[test]
    fn stale_notes_are_never_spawned() {
        let mut tl = timeline(&[
            (Lane::Left, 100.0, Owner::Player),
            (Lane::Left, 4000.0, Owner::Player),
        ]);
        assert_eq!(tl.spawn(3000.0, 2000.0, 1500.0), 1);
        assert_eq!(tl.skipped(), 1);
        assert_eq!(tl.note(0).state(), NoteState::NotSpawned);
        assert_eq!(tl.lane_arrows(Owner::Player, Lane::Left), &[1]);
    }

    #[test]
    fn cull_keeps_misses_scrolling_for_a_while() {
        let mut tl = timeline(&[
            (Lane::Left, 100.0, Owner::Player),
            (Lane::Down, 100.0, Owner::Player),
        ]);
        tl.spawn(0.0, 2000.0, 1500.0);
        tl.note_mut(0).transition(NoteState::Hit);
        tl.note_mut(1).transition(NoteState::Missed);

        assert_eq!(tl.cull(400.0, 1000.0), 1);
        assert_eq!(tl.live_count(), 1);
        assert_eq!(tl.cull(1200.0, 1000.0), 1);
        assert!(tl.is_exhausted());
    }

    #[test]
    fn visible_offsets_scale_with_scroll_speed() {
        let mut tl = NoteTimeline::new(vec![Note::new(Lane::Up, 1000.0, 400.0, Owner::Player)]);
        tl.spawn(0.0, 2000.0, 1500.0);
        let view = tl.visible(Owner::Player, 500.0, ScrollSpeedSetting::XMod(1.0), 1.0);
        assert_eq!(view.len(), 1);
        assert!((view[0].offset_px - 225.0).abs() < 1e-9);
        assert!((view[0].hold_length_px - 180.0).abs() < 1e-9);

        tl.note_mut(0).transition(NoteState::Held);
        let view = tl.visible(Owner::Player, 1200.0, ScrollSpeedSetting::XMod(1.0), 1.0);
        assert!(view[0].offset_px < 0.0);
        assert!((view[0].hold_length_px - 90.0).abs() < 1e-9);
    }

    #[test]
    fn reset_rewinds_everything() {
        let mut tl = timeline(&[(Lane::Right, 100.0, Owner::Player)]);
        tl.spawn(0.0, 2000.0, 1500.0);
        tl.note_mut(0).transition(NoteState::Hit);
        tl.reset();
        assert_eq!(tl.spawn_cursor(), 0);
        assert_eq!(tl.live_count(), 0);
        assert_eq!(tl.note(0).state(), NoteState::NotSpawned);
        assert_eq!(tl.spawn(0.0, 2000.0, 1500.0), 1);
    }

    #[test]
    fn end_time_covers_sustains() {
        let tl = NoteTimeline::new(vec![
            Note::new(Lane::Left, 1000.0, 0.0, Owner::Player),
            Note::new(Lane::Down, 1200.0, 900.0, Owner::Opponent),
        ]);
        assert_eq!(tl.end_time_ms(), 2100.0);
    }
}
