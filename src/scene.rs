/*!
    touch-driven selection of the running demo

    the selector is a pure state machine: it is fed one decoded touch per rendered frame, and returns the next mode when the touch gestures ask for a change. Nothing here talks to the chip.
*/

use crate::{
    host::LinkConfig,
    registers::TouchXY,
    };


/// scene owning the device
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DemoMode {
    Logo,
    /// the only mode using the capture link
    VideoCube,
    Teapot,
}
impl DemoMode {
    /// whether this mode needs the capture link supervised
    pub fn captures(&self) -> bool {
        *self == DemoMode::VideoCube
    }
}

/// decoded touch register
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Touch {
    Absent,
    Touching {
        /// screen pixels
        x: i16,
        y: i16,
        /// normalized in [-1, 1], y pointing up
        nx: f32,
        ny: f32,
    },
}
impl Touch {
    pub fn decode(raw: TouchXY, width: u32, height: u32) -> Self {
        if raw.x == TouchXY::NO_TOUCH
            {return Touch::Absent}
        let (w, h) = (width as f32, height as f32);
        Touch::Touching {
            x: raw.x,
            y: raw.y,
            nx: ((2. * f32::from(raw.x) - w) / w).clamp(-1., 1.),
            ny: (-(2. * f32::from(raw.y) - h) / h).clamp(-1., 1.),
        }
    }
    pub fn touching(&self) -> bool {
        matches!(self, Touch::Touching {..})
    }
    /// whether the touch is in the square hot-zone of the top left corner
    pub fn in_corner(&self, size: i16) -> bool {
        match *self {
            Touch::Touching {x, y, ..} => x < size && y < size,
            Touch::Absent => false,
        }
    }
}

/// settings of the demo loop
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SceneConfig {
    /// screen size in pixels, used to normalize touches
    pub width: u32,
    pub height: u32,
    /// size of the top left hot-zone switching scenes
    pub hot_zone: i16,
    /// untouched frames before the video cube gives back to the logo
    pub videocube_frames: u32,
    /// untouched frames before the teapot gives back to the logo
    pub teapot_frames: u32,
    /// capture link supervised during the video cube
    pub link: LinkConfig,
}
impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1200,
            hot_zone: 100,
            videocube_frames: 3_600,
            teapot_frames: 3_000,
            link: LinkConfig::default(),
        }
    }
}


/**
    transitions between demo modes

    - the logo switches to the video cube on the second consecutive touching frame
    - the video cube switches to the teapot on a held touch in the hot-zone, or back to the logo after enough untouched frames
    - the teapot switches back to the logo on a held touch in the hot-zone, or after enough untouched frames
*/
#[derive(Clone, Debug)]
pub struct SceneSelector {
    config: SceneConfig,
    mode: DemoMode,
    /// previous frame was touching
    held: bool,
    /// consecutive untouched frames
    idle: u32,
}
impl SceneSelector {
    pub fn new(config: SceneConfig) -> Self {
        Self::starting(config, DemoMode::Logo)
    }
    pub fn starting(config: SceneConfig, mode: DemoMode) -> Self {
        Self {config, mode, held: false, idle: 0}
    }
    pub fn mode(&self) -> DemoMode {self.mode}
    pub fn config(&self) -> &SceneConfig {&self.config}

    /// feed the touch of the frame just rendered, return the mode to switch to if any
    pub fn frame(&mut self, touch: Touch) -> Option<DemoMode> {
        let held = self.held && touch.touching();
        let corner = held && touch.in_corner(self.config.hot_zone);
        self.held = touch.touching();
        // a single tap is not enough to keep a scene alive
        if held
            {self.idle = 0}
        else
            {self.idle = self.idle.saturating_add(1)}

        let next = match self.mode {
            DemoMode::Logo if held => Some(DemoMode::VideoCube),
            DemoMode::Logo => None,
            DemoMode::VideoCube if corner => Some(DemoMode::Teapot),
            DemoMode::VideoCube if self.idle >= self.config.videocube_frames => Some(DemoMode::Logo),
            DemoMode::VideoCube => None,
            DemoMode::Teapot if corner || self.idle >= self.config.teapot_frames => Some(DemoMode::Logo),
            DemoMode::Teapot => None,
        };
        if let Some(mode) = next {
            *self = Self::starting(self.config, mode);
        }
        next
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const RELEASED: Touch = Touch::Absent;

    fn at(x: i16, y: i16) -> Touch {
        Touch::decode(TouchXY {x, y}, 1920, 1200)
    }

    #[test]
    fn no_touch_marker() {
        assert_eq!(Touch::decode(TouchXY {y: 0, x: -32768}, 1920, 1200), Touch::Absent);
        assert!(at(0, 0).touching());
        assert!(at(-32767, 0).touching());
    }

    #[test]
    fn normalization_spans_the_screen() {
        let Touch::Touching {nx, ny, ..} = at(0, 0) else {panic!("not touching")};
        assert_eq!((nx, ny), (-1., 1.));
        let Touch::Touching {nx, ny, ..} = at(1920, 1200) else {panic!("not touching")};
        assert_eq!((nx, ny), (1., -1.));
        let Touch::Touching {nx, ny, ..} = at(960, 600) else {panic!("not touching")};
        assert_eq!((nx, ny), (0., 0.));
        for x in [i16::MIN + 1, -500, 3000, i16::MAX] {
            let Touch::Touching {nx, ny, ..} = at(x, x) else {panic!("not touching")};
            assert!((-1. ..= 1.).contains(&nx));
            assert!((-1. ..= 1.).contains(&ny));
        }
    }

    #[test]
    fn logo_needs_a_held_touch() {
        let mut selector = SceneSelector::new(SceneConfig::default());
        assert_eq!(selector.frame(at(500, 500)), None);
        assert_eq!(selector.frame(RELEASED), None);
        assert_eq!(selector.frame(at(500, 500)), None);
        assert_eq!(selector.frame(at(510, 500)), Some(DemoMode::VideoCube));
        assert_eq!(selector.mode(), DemoMode::VideoCube);
    }

    #[test]
    fn corner_switches_videocube_to_teapot_and_back() {
        let mut selector = SceneSelector::starting(SceneConfig::default(), DemoMode::VideoCube);
        // touch outside the corner only spins the cube
        assert_eq!(selector.frame(at(500, 500)), None);
        assert_eq!(selector.frame(at(600, 500)), None);
        assert_eq!(selector.frame(RELEASED), None);
        // a single touching frame in the corner is not enough
        assert_eq!(selector.frame(at(10, 10)), None);
        assert_eq!(selector.frame(at(10, 10)), Some(DemoMode::Teapot));
        assert_eq!(selector.frame(at(10, 10)), None);
        assert_eq!(selector.frame(at(10, 10)), Some(DemoMode::Logo));
    }

    #[test]
    fn idle_frames_return_to_logo() {
        let config = SceneConfig {videocube_frames: 5, teapot_frames: 3, .. Default::default()};
        let mut selector = SceneSelector::starting(config, DemoMode::VideoCube);
        for _ in 0 .. 3 {
            assert_eq!(selector.frame(RELEASED), None);
        }
        // a held touch restarts the count
        assert_eq!(selector.frame(at(500, 500)), None);
        assert_eq!(selector.frame(at(500, 500)), None);
        for _ in 0 .. 4 {
            assert_eq!(selector.frame(RELEASED), None);
        }
        assert_eq!(selector.frame(RELEASED), Some(DemoMode::Logo));

        let mut selector = SceneSelector::starting(config, DemoMode::Teapot);
        assert_eq!(selector.frame(RELEASED), None);
        assert_eq!(selector.frame(RELEASED), None);
        assert_eq!(selector.frame(RELEASED), Some(DemoMode::Logo));
        // the logo never times out
        for _ in 0 .. 10 {
            assert_eq!(selector.frame(RELEASED), None);
        }
    }

    #[test]
    fn taps_do_not_keep_a_scene_alive() {
        let config = SceneConfig {videocube_frames: 4, .. Default::default()};
        let mut selector = SceneSelector::starting(config, DemoMode::VideoCube);
        assert_eq!(selector.frame(RELEASED), None);
        assert_eq!(selector.frame(at(500, 500)), None);
        assert_eq!(selector.frame(RELEASED), None);
        assert_eq!(selector.frame(at(500, 500)), Some(DemoMode::Logo));
    }
}
