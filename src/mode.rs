//! Process-wide engine mode.
//!
//! Debug mode turns on route registration logging and diagnostics such as the
//! "headers already written" warning. Release and test modes keep the hot path
//! quiet.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Engine run mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Debug,
    Release,
    Test,
}

impl Mode {
    /// Get the mode name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Mode::Debug => "debug",
            Mode::Release => "release",
            Mode::Test => "test",
        }
    }

    const fn code(self) -> u8 {
        match self {
            Mode::Debug => 0,
            Mode::Release => 1,
            Mode::Test => 2,
        }
    }

    const fn from_code(code: u8) -> Self {
        match code {
            1 => Mode::Release,
            2 => Mode::Test,
            _ => Mode::Debug,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Mode::Debug),
            "release" => Ok(Mode::Release),
            "test" => Ok(Mode::Test),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

static MODE: AtomicU8 = AtomicU8::new(0);

/// Set the process-wide mode.
pub fn set_mode(mode: Mode) {
    MODE.store(mode.code(), Ordering::Relaxed);
}

/// Get the process-wide mode.
pub fn mode() -> Mode {
    Mode::from_code(MODE.load(Ordering::Relaxed))
}

/// Check if the engine runs in debug mode.
#[inline]
pub fn is_debugging() -> bool {
    mode() == Mode::Debug
}
