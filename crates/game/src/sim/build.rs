use rkyv::{Archive, Deserialize, Serialize};

pub const BUILD_TIME_SECS: f32 = 3.0;

/// Pillbox build cycle: `Built -> Unbuilding -> Carried -> Building -> Built`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum BuildStatus {
    Built,
    Unbuilding,
    Carried,
    Building,
}

impl BuildStatus {
    #[inline]
    pub fn is_solid(self) -> bool {
        !matches!(self, Self::Carried)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Built => "built",
            Self::Unbuilding => "unbuilding",
            Self::Carried => "carried",
            Self::Building => "building",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PillboxState {
    status: BuildStatus,
    built_pct: f32,
}

impl Default for PillboxState {
    fn default() -> Self {
        Self::built()
    }
}

impl PillboxState {
    pub fn built() -> Self {
        Self {
            status: BuildStatus::Built,
            built_pct: 1.0,
        }
    }

    pub fn carried() -> Self {
        Self {
            status: BuildStatus::Carried,
            built_pct: 0.0,
        }
    }

    /// Build progress applied per tick at the given tick rate.
    pub fn step_per_tick(ticks_per_second: u32) -> f32 {
        1.0 / (BUILD_TIME_SECS * ticks_per_second.max(1) as f32)
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn built_pct(&self) -> f32 {
        self.built_pct
    }

    pub fn is_solid(&self) -> bool {
        self.status.is_solid()
    }

    pub fn is_carried(&self) -> bool {
        self.status == BuildStatus::Carried
    }

    pub fn pack_step(&mut self, step: f32) -> BuildStatus {
        match self.status {
            BuildStatus::Carried => {}
            BuildStatus::Built | BuildStatus::Unbuilding | BuildStatus::Building => {
                self.built_pct = (self.built_pct - step.max(0.0)).max(0.0);
                self.set_status(BuildStatus::Unbuilding);
                if self.built_pct <= 0.0 {
                    self.set_status(BuildStatus::Carried);
                }
            }
        }
        self.status
    }

    pub fn unpack_step(&mut self, step: f32) -> BuildStatus {
        match self.status {
            BuildStatus::Built => {}
            BuildStatus::Carried | BuildStatus::Building | BuildStatus::Unbuilding => {
                self.built_pct = (self.built_pct + step.max(0.0)).min(1.0);
                self.set_status(BuildStatus::Building);
                if self.built_pct >= 1.0 {
                    self.set_status(BuildStatus::Built);
                }
            }
        }
        self.status
    }

    pub fn cancel_unbuilding(&mut self) {
        self.set_status(BuildStatus::Built);
    }

    pub fn cancel_building(&mut self) {
        self.set_status(BuildStatus::Carried);
    }

    /// Overwrites the state with a snapshot from another machine. The
    /// percentage is clamped so a malformed value cannot break the invariants.
    pub fn apply_remote(&mut self, status: BuildStatus, built_pct: f32) {
        self.built_pct = if built_pct.is_nan() {
            0.0
        } else {
            built_pct.clamp(0.0, 1.0)
        };
        self.set_status(status);
    }

    fn set_status(&mut self, status: BuildStatus) {
        self.status = status;
        match status {
            BuildStatus::Built => self.built_pct = 1.0,
            BuildStatus::Carried => self.built_pct = 0.0,
            BuildStatus::Unbuilding | BuildStatus::Building => {}
        }
    }
}
