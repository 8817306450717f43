//! Protocol configuration and per-mode defaults.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Largest chunk the consumer may hand to [`crate::Endpoint::send`].
pub const MAX_CHUNK: usize = 256;

/// Sliding-window discipline of an endpoint.
///
/// Both ends of a link must be configured with the same mode; there is no
/// in-band negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Go-Back-N: cumulative acks, one timer, whole-window retransmission.
    Gbn,

    /// Selective Repeat: per-frame acks and timers, receive-side reordering.
    Sr,
}

impl Mode {
    /// Default window length for this mode.
    ///
    /// Selective repeat runs a much wider window since a timeout costs only
    /// one frame instead of the whole window.
    pub const fn default_window(self) -> usize {
        match self {
            Mode::Gbn => 5,
            Mode::Sr => 30,
        }
    }

    /// Default retransmission timer for this mode.
    pub const fn default_timer(self) -> Duration {
        match self {
            Mode::Gbn => Duration::from_millis(300),
            Mode::Sr => Duration::from_millis(100),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Gbn => "GBN",
            Mode::Sr => "SR",
        })
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gbn" => Ok(Mode::Gbn),
            "sr" => Ok(Mode::Sr),
            other => Err(format!("unknown mode `{other}` (expected `gbn` or `sr`)")),
        }
    }
}

/// Which side of the link an endpoint plays, for the statistics log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Client => "Client",
            Role::Server => "Server",
        })
    }
}

/// Endpoint configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Window discipline.
    pub mode: Mode,

    /// Maximum number of unacknowledged frames in flight.
    pub window_len: usize,

    /// Retransmission timer duration.
    pub timer: Duration,

    /// Largest chunk accepted by `send`.
    pub max_chunk: usize,
}

impl Config {
    /// Creates a configuration with the mode's default window and timer.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            window_len: mode.default_window(),
            timer: mode.default_timer(),
            max_chunk: MAX_CHUNK,
        }
    }

    /// Overrides the window length.
    pub fn with_window_len(mut self, window_len: usize) -> Self {
        assert!(window_len > 0, "window length must be positive");
        self.window_len = window_len;
        self
    }

    /// Overrides the retransmission timer.
    pub fn with_timer(mut self, timer: Duration) -> Self {
        assert!(!timer.is_zero(), "timer must be positive");
        self.timer = timer;
        self
    }
}
