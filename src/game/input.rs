use crate::config::GhostTapping;
use crate::game::events::Outcome;
use crate::game::hold::{HoldRegistry, ReleaseMode};
use crate::game::judgment::{HitWindows, Judgment, Rating};
use crate::game::note::{LANE_COUNT, Lane, Note, NoteState};
use crate::game::timeline::NoteTimeline;
use log::{debug, trace};

/// A lane press or release captured between frames. `song_time_ms` is the
/// song position the edge happened at, when the caller knows it; otherwise
/// the edge is judged at the frame's position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEdge {
    pub lane: Lane,
    pub pressed: bool,
    pub song_time_ms: Option<f64>,
}

/// Picks the note a press on `lane` at `song_position_ms` should hit.
///
/// Only `Spawned` notes in `lane` within the max judge range are
/// considered. The closest one wins; on an exact tie the earlier candidate
/// in `candidates` is kept.
pub fn judge_input(
    windows: &HitWindows,
    lane: Lane,
    song_position_ms: f64,
    notes: &[Note],
    candidates: &[usize],
) -> Option<(usize, Judgment)> {
    let mut best: Option<(usize, f64)> = None;
    for &index in candidates {
        let note = &notes[index];
        if note.lane != lane || !note.is_judgeable() {
            continue;
        }
        let abs = (song_position_ms - note.strum_time_ms).abs();
        if !windows.in_judge_range(abs) {
            continue;
        }
        if best.is_none_or(|(_, best_abs)| abs < best_abs) {
            best = Some((index, abs));
        }
    }
    best.map(|(index, _)| {
        let delta = song_position_ms - notes[index].strum_time_ms;
        (index, windows.judgment_for(delta))
    })
}

/// Mutable view of one strumline handed to a driver for a single phase of
/// the frame. Anything the driver resolves is appended to `out`.
pub struct Playfield<'a> {
    pub timeline: &'a mut NoteTimeline,
    pub holds: &'a mut HoldRegistry,
    pub windows: &'a HitWindows,
    pub out: &'a mut Vec<Outcome>,
}

impl Playfield<'_> {
    fn apply_hit(&mut self, note_index: usize, judgment: Judgment) {
        let owner = self.holds.owner();
        let (lane, is_hold) = {
            let note = self.timeline.note(note_index);
            (note.lane, note.is_hold())
        };

        if judgment.rating == Rating::Miss {
            if self.timeline.note_mut(note_index).transition(NoteState::Missed) {
                self.out.push(Outcome::Miss {
                    note: Some(note_index),
                    owner,
                    lane,
                });
            }
            return;
        }

        let moved = if is_hold {
            self.holds.begin(self.timeline, note_index)
        } else {
            self.timeline.note_mut(note_index).transition(NoteState::Hit)
        };
        if moved {
            debug!(
                "{:?} hit: note {} lane {:?} {:?} ({:+.1}ms, {} pts)",
                owner,
                note_index,
                lane,
                judgment.rating,
                judgment.time_diff_ms,
                judgment.score_delta
            );
            self.out.push(Outcome::Hit {
                note: note_index,
                owner,
                lane,
                judgment,
            });
        }
    }
}

/// Something that turns time and lane edges into hits for one strumline.
/// The frame loop calls `passive_sweep`, then the edges, then `autoplay`.
pub trait InputDriver {
    /// Marks notes that can no longer be hit as missed.
    fn passive_sweep(&mut self, _field: &mut Playfield<'_>, _now_ms: f64) {}

    /// Hits notes without any input.
    fn autoplay(&mut self, _field: &mut Playfield<'_>, _now_ms: f64) {}

    fn press(&mut self, field: &mut Playfield<'_>, lane: Lane, now_ms: f64);

    fn release(&mut self, field: &mut Playfield<'_>, lane: Lane, now_ms: f64);

    /// Gives up every hold this driver is responsible for. Called right
    /// before another driver takes over the strumline.
    fn disengage(&mut self, field: &mut Playfield<'_>, now_ms: f64);
}

#[derive(Clone, Debug)]
pub struct HumanInput {
    ghost_tapping: GhostTapping,
    lanes_down: [bool; LANE_COUNT],
}

impl HumanInput {
    pub fn new(ghost_tapping: GhostTapping) -> Self {
        Self {
            ghost_tapping,
            lanes_down: [false; LANE_COUNT],
        }
    }

    #[inline(always)]
    pub fn is_down(&self, lane: Lane) -> bool {
        self.lanes_down[lane.index()]
    }
}

impl InputDriver for HumanInput {
    fn passive_sweep(&mut self, field: &mut Playfield<'_>, now_ms: f64) {
        let owner = field.holds.owner();
        let mut expired: Vec<usize> = Vec::new();
        for lane in Lane::ALL {
            for &index in field.timeline.lane_arrows(owner, lane) {
                let note = field.timeline.note(index);
                if note.is_judgeable() && field.windows.is_long_miss(now_ms - note.strum_time_ms) {
                    expired.push(index);
                }
            }
        }
        expired.sort_unstable();

        for index in expired {
            let note = field.timeline.note_mut(index);
            let lane = note.lane;
            if note.transition(NoteState::Missed) {
                debug!("MISSED: note {} lane {:?} at {:.1}ms", index, lane, now_ms);
                field.out.push(Outcome::Miss {
                    note: Some(index),
                    owner,
                    lane,
                });
            }
        }
    }

    fn press(&mut self, field: &mut Playfield<'_>, lane: Lane, now_ms: f64) {
        if self.lanes_down[lane.index()] {
            trace!("Lane {:?} already down, ignoring repeat press", lane);
            return;
        }
        self.lanes_down[lane.index()] = true;

        let owner = field.holds.owner();
        let found = judge_input(
            field.windows,
            lane,
            now_ms,
            field.timeline.notes(),
            field.timeline.lane_arrows(owner, lane),
        );
        match found {
            Some((index, judgment)) => field.apply_hit(index, judgment),
            None => match self.ghost_tapping {
                GhostTapping::Ignore => trace!("Ghost tap on lane {:?} ignored", lane),
                GhostTapping::Miss => {
                    debug!("Ghost tap on lane {:?} at {:.1}ms counts as a miss", lane, now_ms);
                    field.out.push(Outcome::Miss {
                        note: None,
                        owner,
                        lane,
                    });
                }
            },
        }
    }

    fn release(&mut self, field: &mut Playfield<'_>, lane: Lane, now_ms: f64) {
        if !self.lanes_down[lane.index()] {
            return;
        }
        self.lanes_down[lane.index()] = false;
        let mode = ReleaseMode::Timed {
            early_margin_ms: field.windows.shit_ms,
        };
        field.holds.release(field.timeline, lane, now_ms, mode, field.out);
    }

    fn disengage(&mut self, field: &mut Playfield<'_>, now_ms: f64) {
        let mode = ReleaseMode::Timed {
            early_margin_ms: field.windows.shit_ms,
        };
        field.holds.release_all(field.timeline, now_ms, mode, field.out);
        self.lanes_down = [false; LANE_COUNT];
    }
}

/// Perfect autoplay: every note is hit dead on at its strum time and holds
/// are kept until they end. Drives the opponent strumline and bot play.
#[derive(Clone, Debug, Default)]
pub struct BotInput;

impl InputDriver for BotInput {
    fn autoplay(&mut self, field: &mut Playfield<'_>, now_ms: f64) {
        let owner = field.holds.owner();
        let mut due: Vec<usize> = field
            .timeline
            .live_indices(owner)
            .into_iter()
            .filter(|&index| {
                let note = field.timeline.note(index);
                note.is_judgeable() && note.strum_time_ms <= now_ms
            })
            .collect();
        due.sort_unstable();

        for index in due {
            let (lane, is_hold) = {
                let note = field.timeline.note(index);
                (note.lane, note.is_hold())
            };
            // A new hold in a lane that is still sustaining the previous one
            // takes the lane over; the old hold counts as completed.
            if is_hold && field.holds.active(lane).is_some() {
                field
                    .holds
                    .release(field.timeline, lane, now_ms, ReleaseMode::Complete, field.out);
            }
            let judgment = Judgment {
                rating: Rating::Sick,
                time_diff_ms: 0.0,
                score_delta: field.windows.score_note(0.0),
            };
            field.apply_hit(index, judgment);
        }
    }

    fn press(&mut self, _field: &mut Playfield<'_>, lane: Lane, _now_ms: f64) {
        trace!("Bot play active, ignoring press on lane {:?}", lane);
    }

    fn release(&mut self, _field: &mut Playfield<'_>, lane: Lane, _now_ms: f64) {
        trace!("Bot play active, ignoring release on lane {:?}", lane);
    }

    fn disengage(&mut self, field: &mut Playfield<'_>, now_ms: f64) {
        field
            .holds
            .release_all(field.timeline, now_ms, ReleaseMode::Complete, field.out);
    }
}

/// The driver currently in charge of the player strumline.
#[derive(Clone, Debug)]
pub enum Driver {
    Human(HumanInput),
    Bot(BotInput),
}

impl Driver {
    pub fn new(bot_play: bool, ghost_tapping: GhostTapping) -> Self {
        if bot_play {
            Driver::Bot(BotInput)
        } else {
            Driver::Human(HumanInput::new(ghost_tapping))
        }
    }

    #[inline(always)]
    pub fn is_bot(&self) -> bool {
        matches!(self, Driver::Bot(_))
    }

    fn inner(&mut self) -> &mut dyn InputDriver {
        match self {
            Driver::Human(human) => human,
            Driver::Bot(bot) => bot,
        }
    }
}

impl InputDriver for Driver {
    fn passive_sweep(&mut self, field: &mut Playfield<'_>, now_ms: f64) {
        self.inner().passive_sweep(field, now_ms);
    }

    fn autoplay(&mut self, field: &mut Playfield<'_>, now_ms: f64) {
        self.inner().autoplay(field, now_ms);
    }

    fn press(&mut self, field: &mut Playfield<'_>, lane: Lane, now_ms: f64) {
        self.inner().press(field, lane, now_ms);
    }

    fn release(&mut self, field: &mut Playfield<'_>, lane: Lane, now_ms: f64) {
        self.inner().release(field, lane, now_ms);
    }

    fn disengage(&mut self, field: &mut Playfield<'_>, now_ms: f64) {
        self.inner().disengage(field, now_ms);
    }
}
