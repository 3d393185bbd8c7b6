//! Detail view over a list of selected frames.

use crate::frame::FrameRef;
use crate::locator::Playback;

/// What the detail view is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailState {
    /// Closed.
    Idle,
    /// Still image visible, playback target being resolved.
    Loading,
    /// Still image visible, resolution finished.
    ShowImage,
    /// Embedded player visible.
    ShowVideo,
}

/// Modal state machine: `Idle -> Loading -> ShowImage <-> ShowVideo`.
///
/// Moving to another frame returns to `Loading` and hands back the frame
/// that needs a fresh resolution; results for frames that are no longer
/// current are dropped.
#[derive(Debug)]
pub struct DetailView {
    frames: Vec<FrameRef>,
    position: usize,
    state: DetailState,
    playback: Option<Playback>,
}

impl Default for DetailView {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailView {
    /// A closed view.
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            position: 0,
            state: DetailState::Idle,
            playback: None,
        }
    }

    /// Opens the view on `frames[position]`. Returns the frame to resolve, or
    /// `None` (view stays closed) when `position` is out of range.
    pub fn open(&mut self, frames: Vec<FrameRef>, position: usize) -> Option<&FrameRef> {
        if position >= frames.len() {
            return None;
        }
        self.frames = frames;
        self.position = position;
        self.state = DetailState::Loading;
        self.playback = None;
        self.frames.get(self.position)
    }

    /// Records the resolution for the frame at `position`. Returns `false`
    /// when the view has since moved on or closed.
    pub fn apply_playback(&mut self, position: usize, playback: Option<Playback>) -> bool {
        if self.state != DetailState::Loading || position != self.position {
            return false;
        }
        self.playback = playback;
        self.state = DetailState::ShowImage;
        true
    }

    /// Switches between image and player. Without a resolved playback the
    /// image stays up.
    pub fn toggle(&mut self) -> DetailState {
        self.state = match self.state {
            DetailState::ShowImage if self.playback.is_some() => DetailState::ShowVideo,
            DetailState::ShowVideo => DetailState::ShowImage,
            other => other,
        };
        self.state
    }

    /// Moves to the next frame, if any.
    pub fn next(&mut self) -> Option<&FrameRef> {
        if self.state == DetailState::Idle || self.position + 1 >= self.frames.len() {
            return None;
        }
        self.move_to(self.position + 1)
    }

    /// Moves to the previous frame, if any.
    pub fn prev(&mut self) -> Option<&FrameRef> {
        if self.state == DetailState::Idle || self.position == 0 {
            return None;
        }
        self.move_to(self.position - 1)
    }

    /// Closes the view.
    pub fn close(&mut self) {
        self.state = DetailState::Idle;
        self.playback = None;
        self.frames.clear();
        self.position = 0;
    }

    /// Current state.
    pub fn state(&self) -> DetailState {
        self.state
    }

    /// Index of the current frame in the list.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of frames in the list.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the list is empty (always true while closed).
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame currently shown.
    pub fn current(&self) -> Option<&FrameRef> {
        if self.state == DetailState::Idle {
            return None;
        }
        self.frames.get(self.position)
    }

    /// Resolved playback for the current frame.
    pub fn playback(&self) -> Option<&Playback> {
        self.playback.as_ref()
    }

    fn move_to(&mut self, position: usize) -> Option<&FrameRef> {
        self.position = position;
        self.state = DetailState::Loading;
        self.playback = None;
        self.frames.get(self.position)
    }
}
