use bitflags::bitflags;

bitflags! {
    /// Properties a view animates, plus the transient transition markers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AnimatedProperty: u32 {
        const ZOOM = 0x001;
        const OPACITY = 0x002;
        const POSITION = 0x004;
        const HIDE_WHEN_DONE = 0x008;
        const SHOWING = 0x010;
        const HIDING = 0x020;
    }
}

impl AnimatedProperty {
    /// The properties that can actually be tweened.
    pub const VISUAL: Self = Self::ZOOM.union(Self::OPACITY).union(Self::POSITION);

    /// Parse config names ("opacity", "zoom", "position"). Unknown names are ignored.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        names
            .iter()
            .fold(Self::empty(), |acc, name| match name.as_ref() {
                "opacity" => acc | Self::OPACITY,
                "zoom" => acc | Self::ZOOM,
                "position" => acc | Self::POSITION,
                _ => acc,
            })
    }

    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::OPACITY) {
            names.push("opacity");
        }
        if self.contains(Self::ZOOM) {
            names.push("zoom");
        }
        if self.contains(Self::POSITION) {
            names.push("position");
        }
        names
    }
}

/// Per-instance compositing state. Becomes `Ready` once any window has content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposeState {
    #[default]
    None,
    Ready,
}

/// Transition outcomes reported back to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    Shown,
    Hidden,
}
