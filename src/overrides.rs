//! Operator overrides applied between trials.
//!
//! A running episode can be steered from another thread through an
//! `mpsc::Receiver<Override>`. The binary feeds it from stdin using the line
//! grammar parsed by [`Override::parse`]:
//!
//! | line        | effect                                  |
//! |-------------|-----------------------------------------|
//! | `p 2,1,0`   | replace the arm pattern                 |
//! | `m 3`       | change units per trial (`1..=3`)        |
//! | `s`         | log per-arm statistics                  |
//! | `pause`     | toggle pause                            |
//! | empty line  | resume if paused                        |
//! | `quit`      | stop after the current trial            |

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::validate_units;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Override {
    SetPattern { pattern: Vec<usize> },
    SetUnits { units: u32 },
    ShowStats,
    TogglePause,
    Resume,
    Stop,
}

impl Override {
    /// Parse one operator line. Arm ranges are checked later, against the
    /// running policy.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Resume);
        }
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };
        match (cmd.to_ascii_lowercase().as_str(), arg.is_empty()) {
            ("p", false) => {
                let pattern = arg
                    .split(',')
                    .map(|t| t.trim().parse::<usize>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| Error::config("pattern", format!("{arg:?}: {e}")))?;
                Ok(Self::SetPattern { pattern })
            }
            ("m", false) => {
                let units = arg
                    .parse::<u32>()
                    .map_err(|e| Error::config("units_per_trial", format!("{arg:?}: {e}")))?;
                validate_units(units)?;
                Ok(Self::SetUnits { units })
            }
            ("s", true) => Ok(Self::ShowStats),
            ("pause", true) => Ok(Self::TogglePause),
            ("quit" | "q", true) => Ok(Self::Stop),
            _ => Err(Error::config("override", format!("unrecognized command {line:?}"))),
        }
    }
}

impl FromStr for Override {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
