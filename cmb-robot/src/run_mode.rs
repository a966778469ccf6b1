use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Set of recovery steps, bits `RESTART=1`, `RELISTEN=2`, `RELOGIN=4`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RunMode(u8);

impl RunMode {
    pub const RESTART: RunMode = RunMode(1);
    pub const RELISTEN: RunMode = RunMode(1 << 1);
    pub const RELOGIN: RunMode = RunMode(1 << 2);

    /// First recovery attempt of an anomaly.
    pub const DEFAULT: RunMode = RunMode(Self::RELISTEN.0 | Self::RELOGIN.0);
    /// Escalation after a failed recovery.
    pub const FULL: RunMode = RunMode(Self::RESTART.0 | Self::RELISTEN.0 | Self::RELOGIN.0);

    const NAMES: [(RunMode, &'static str); 3] = [
        (Self::RESTART, "restart"),
        (Self::RELISTEN, "relisten"),
        (Self::RELOGIN, "relogin"),
    ];

    pub const fn empty() -> Self {
        RunMode(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// `None` when `bits` carries anything outside the three steps.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::FULL.0 == 0 {
            Some(RunMode(bits))
        } else {
            None
        }
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: RunMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: RunMode) -> Self {
        RunMode(self.0 | other.0)
    }

    pub fn insert(&mut self, other: RunMode) {
        self.0 |= other.0;
    }
}

impl BitOr for RunMode {
    type Output = RunMode;

    fn bitor(self, rhs: RunMode) -> RunMode {
        self.union(rhs)
    }
}

impl BitOrAssign for RunMode {
    fn bitor_assign(&mut self, rhs: RunMode) {
        self.insert(rhs);
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(mode, _)| self.contains(*mode))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

impl fmt::Debug for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunMode({self})")
    }
}

/// Parses `restart,relisten`, `relisten|relogin`, `full` or `none`.
impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mode = RunMode::empty();
        for part in s.split([',', '|']).map(str::trim).filter(|p| !p.is_empty()) {
            let part = part.to_ascii_lowercase();
            match part.as_str() {
                "none" => {}
                "full" => mode |= RunMode::FULL,
                other => {
                    let (step, _) = Self::NAMES
                        .iter()
                        .find(|(_, name)| *name == other)
                        .ok_or_else(|| format!("unknown run mode step: {other}"))?;
                    mode |= *step;
                }
            }
        }
        Ok(mode)
    }
}
