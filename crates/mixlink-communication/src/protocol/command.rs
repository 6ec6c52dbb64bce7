//! MASTER Command Model
//!
//! Every command the MASTER firmware understands, as a typed value. The wire
//! text is a verb token followed by space-separated arguments; booleans render
//! as `1`/`0`. Grouped pulses append `pin:ms` tuples after the target, parallel
//! pulses append `target:pin:ms` tuples. Encoding is pure: the same value
//! always renders the same text.
//!
//! UID-based variants address a slave by its bus-unique identifier and are
//! preferred over the numeric-ID variants, whose IDs can shift when slaves
//! re-announce.

use serde::Serialize;
use std::fmt;

/// One pin of a grouped pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PinPulse {
    /// Output pin on the slave
    pub pin: u8,
    /// Pulse length in milliseconds
    pub duration_ms: u32,
}

impl PinPulse {
    /// Create a pin pulse
    pub fn new(pin: u8, duration_ms: u32) -> Self {
        Self { pin, duration_ms }
    }
}

impl fmt::Display for PinPulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pin, self.duration_ms)
    }
}

/// One slave/pin pair of an ID-based parallel pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IdPinPulse {
    /// Numeric slave ID
    pub id: u8,
    /// Output pin on the slave
    pub pin: u8,
    /// Pulse length in milliseconds
    pub duration_ms: u32,
}

impl IdPinPulse {
    /// Create an ID-addressed pulse
    pub fn new(id: u8, pin: u8, duration_ms: u32) -> Self {
        Self {
            id,
            pin,
            duration_ms,
        }
    }
}

impl fmt::Display for IdPinPulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.id, self.pin, self.duration_ms)
    }
}

/// One slave/pin pair of a UID-based parallel pulse
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UidPinPulse {
    /// Slave UID, e.g. `0x12345678`
    pub uid: String,
    /// Output pin on the slave
    pub pin: u8,
    /// Pulse length in milliseconds
    pub duration_ms: u32,
}

impl UidPinPulse {
    /// Create a UID-addressed pulse
    pub fn new(uid: impl Into<String>, pin: u8, duration_ms: u32) -> Self {
        Self {
            uid: uid.into(),
            pin,
            duration_ms,
        }
    }
}

impl fmt::Display for UidPinPulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.uid, self.pin, self.duration_ms)
    }
}

/// Logging behaviour of grouped and parallel UID pulses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseLogging {
    /// No log output
    #[default]
    Off,
    /// Record to the MASTER's log
    Log,
    /// Record and echo the log entries back
    LogView,
}

impl PulseLogging {
    /// Verb suffix appended to `pulsegrp_uid` / `pulsepar_uid`
    pub fn verb_suffix(self) -> &'static str {
        match self {
            Self::Off => "",
            Self::Log => "_log",
            Self::LogView => "_logview",
        }
    }
}

/// Command kinds, for grouping and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandKind {
    // General
    Help,
    Version,
    Reannounce,
    Discover,
    Scan,
    Ping,

    // Control (ID-based)
    Set,
    SetPwm,
    Pulse,
    PulseGroup,
    PulseParallel,

    // Control (UID-based)
    PingUid,
    SetUid,
    SetPwmUid,
    PulseUid,
    PulseGroupUid,
    PulseGroupUidLog,
    PulseGroupUidLogView,
    PulseParallelUid,
    PulseParallelUidLog,
    PulseParallelUidLogView,

    // Monitoring
    Total,
    TotalClear,
    Active,
    Log,

    // Debug
    Debug,
    Errors,
    Recover,

    // Table & summary
    Table,
    Summary,
    Clear,

    // EEPROM
    EeMap,
    EeClear,
    EeSave,
    MapSet,
    MapDel,
    MapShow,
    MapList,
    MapExport,
    MapImport,

    // Test
    TestAll,
    BatchTest,

    // Batch dispensing
    BatchPrep,
    BatchRun,
    BatchAbort,

    Custom,
}

/// A command for the MASTER
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// `help`
    Help,
    /// `ver`
    Version,
    /// `reannounce`: ask slaves to announce themselves again
    Reannounce,
    /// `discover`
    Discover,
    /// `scan`
    Scan,
    /// `ping <id>`
    Ping { id: u8 },

    /// `set <id> <pin> <1|0>`
    Set { id: u8, pin: u8, on: bool },
    /// `setpwm <id> <pin> <duty>`
    SetPwm { id: u8, pin: u8, duty: u8 },
    /// `pulse <id> <pin> <ms>`
    Pulse { id: u8, pin: u8, duration_ms: u32 },
    /// `pulsegrp <id> <pin:ms>...`
    PulseGroup { id: u8, pulses: Vec<PinPulse> },
    /// `pulsepar <id:pin:ms>...`
    PulseParallel { pulses: Vec<IdPinPulse> },

    /// `ping_uid <uid>`
    PingUid { uid: String },
    /// `set_uid <uid> <pin> <1|0>`
    SetUid { uid: String, pin: u8, on: bool },
    /// `setpwm_uid <uid> <pin> <duty>`
    SetPwmUid { uid: String, pin: u8, duty: u8 },
    /// `pulse_uid <uid> <pin> <ms>`
    PulseUid { uid: String, pin: u8, duration_ms: u32 },
    /// `pulsegrp_uid[_log|_logview] <uid> <pin:ms>...`
    PulseGroupUid {
        uid: String,
        pulses: Vec<PinPulse>,
        logging: PulseLogging,
    },
    /// `pulsepar_uid[_log|_logview] <uid:pin:ms>...`
    PulseParallelUid {
        pulses: Vec<UidPinPulse>,
        logging: PulseLogging,
    },

    /// `total`
    Total,
    /// `total_clear`
    TotalClear,
    /// `active`
    Active,
    /// `log <count>`
    Log { count: u32 },

    /// `debug <1|0>`
    Debug { enabled: bool },
    /// `errors`
    Errors,
    /// `recover`
    Recover,

    /// `table`
    Table,
    /// `summary`
    Summary,
    /// `clear`
    Clear,

    /// `eemap`
    EeMap,
    /// `eeclear`
    EeClear,
    /// `eesave`
    EeSave,
    /// `mapset <id> <uid>`
    MapSet { id: u8, uid: String },
    /// `mapdel <id>`
    MapDel { id: u8 },
    /// `mapshow <id>`
    MapShow { id: u8 },
    /// `maplist`
    MapList,
    /// `mapexport`
    MapExport,
    /// `mapimport <payload>`, payload as produced by `mapexport`
    MapImport { payload: String },

    /// `testall`
    TestAll,
    /// `batchtest`
    BatchTest,

    /// `batchprep <uid> <pin:ms>...`: stage pulses for the next `batchrun`
    BatchPrep { uid: String, pulses: Vec<PinPulse> },
    /// `batchrun`
    BatchRun,
    /// `batchabort`
    BatchAbort,

    /// Caller-supplied text, sent verbatim
    Custom { text: String },
}

impl Command {
    /// `help`
    pub fn help() -> Self {
        Self::Help
    }

    /// `discover`
    pub fn discover() -> Self {
        Self::Discover
    }

    /// `scan`
    pub fn scan() -> Self {
        Self::Scan
    }

    /// `ping_uid <uid>`
    pub fn ping_uid(uid: impl Into<String>) -> Self {
        Self::PingUid { uid: uid.into() }
    }

    /// `set_uid <uid> <pin> <1|0>`
    pub fn set_uid(uid: impl Into<String>, pin: u8, on: bool) -> Self {
        Self::SetUid {
            uid: uid.into(),
            pin,
            on,
        }
    }

    /// `setpwm_uid <uid> <pin> <duty>`
    pub fn set_pwm_uid(uid: impl Into<String>, pin: u8, duty: u8) -> Self {
        Self::SetPwmUid {
            uid: uid.into(),
            pin,
            duty,
        }
    }

    /// `pulse_uid <uid> <pin> <ms>`
    pub fn pulse_uid(uid: impl Into<String>, pin: u8, duration_ms: u32) -> Self {
        Self::PulseUid {
            uid: uid.into(),
            pin,
            duration_ms,
        }
    }

    /// `pulsegrp_uid_log <uid> <pin:ms>...`
    pub fn pulse_group_uid_log(uid: impl Into<String>, pulses: Vec<PinPulse>) -> Self {
        Self::PulseGroupUid {
            uid: uid.into(),
            pulses,
            logging: PulseLogging::Log,
        }
    }

    /// `pulsepar_uid_log <uid:pin:ms>...`
    pub fn pulse_parallel_uid_log(pulses: Vec<UidPinPulse>) -> Self {
        Self::PulseParallelUid {
            pulses,
            logging: PulseLogging::Log,
        }
    }

    /// `batchprep <uid> <pin:ms>...`
    pub fn batch_prep(uid: impl Into<String>, pulses: Vec<PinPulse>) -> Self {
        Self::BatchPrep {
            uid: uid.into(),
            pulses,
        }
    }

    /// `table`
    pub fn table() -> Self {
        Self::Table
    }

    /// `summary`
    pub fn summary() -> Self {
        Self::Summary
    }

    /// Raw text, sent as-is
    pub fn custom(text: impl Into<String>) -> Self {
        Self::Custom { text: text.into() }
    }

    /// The kind of this command
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Help => CommandKind::Help,
            Self::Version => CommandKind::Version,
            Self::Reannounce => CommandKind::Reannounce,
            Self::Discover => CommandKind::Discover,
            Self::Scan => CommandKind::Scan,
            Self::Ping { .. } => CommandKind::Ping,
            Self::Set { .. } => CommandKind::Set,
            Self::SetPwm { .. } => CommandKind::SetPwm,
            Self::Pulse { .. } => CommandKind::Pulse,
            Self::PulseGroup { .. } => CommandKind::PulseGroup,
            Self::PulseParallel { .. } => CommandKind::PulseParallel,
            Self::PingUid { .. } => CommandKind::PingUid,
            Self::SetUid { .. } => CommandKind::SetUid,
            Self::SetPwmUid { .. } => CommandKind::SetPwmUid,
            Self::PulseUid { .. } => CommandKind::PulseUid,
            Self::PulseGroupUid { logging, .. } => match logging {
                PulseLogging::Off => CommandKind::PulseGroupUid,
                PulseLogging::Log => CommandKind::PulseGroupUidLog,
                PulseLogging::LogView => CommandKind::PulseGroupUidLogView,
            },
            Self::PulseParallelUid { logging, .. } => match logging {
                PulseLogging::Off => CommandKind::PulseParallelUid,
                PulseLogging::Log => CommandKind::PulseParallelUidLog,
                PulseLogging::LogView => CommandKind::PulseParallelUidLogView,
            },
            Self::Total => CommandKind::Total,
            Self::TotalClear => CommandKind::TotalClear,
            Self::Active => CommandKind::Active,
            Self::Log { .. } => CommandKind::Log,
            Self::Debug { .. } => CommandKind::Debug,
            Self::Errors => CommandKind::Errors,
            Self::Recover => CommandKind::Recover,
            Self::Table => CommandKind::Table,
            Self::Summary => CommandKind::Summary,
            Self::Clear => CommandKind::Clear,
            Self::EeMap => CommandKind::EeMap,
            Self::EeClear => CommandKind::EeClear,
            Self::EeSave => CommandKind::EeSave,
            Self::MapSet { .. } => CommandKind::MapSet,
            Self::MapDel { .. } => CommandKind::MapDel,
            Self::MapShow { .. } => CommandKind::MapShow,
            Self::MapList => CommandKind::MapList,
            Self::MapExport => CommandKind::MapExport,
            Self::MapImport { .. } => CommandKind::MapImport,
            Self::TestAll => CommandKind::TestAll,
            Self::BatchTest => CommandKind::BatchTest,
            Self::BatchPrep { .. } => CommandKind::BatchPrep,
            Self::BatchRun => CommandKind::BatchRun,
            Self::BatchAbort => CommandKind::BatchAbort,
            Self::Custom { .. } => CommandKind::Custom,
        }
    }

    /// The verb token; `None` for custom text
    pub fn verb(&self) -> Option<&'static str> {
        let verb = match self.kind() {
            CommandKind::Help => "help",
            CommandKind::Version => "ver",
            CommandKind::Reannounce => "reannounce",
            CommandKind::Discover => "discover",
            CommandKind::Scan => "scan",
            CommandKind::Ping => "ping",
            CommandKind::Set => "set",
            CommandKind::SetPwm => "setpwm",
            CommandKind::Pulse => "pulse",
            CommandKind::PulseGroup => "pulsegrp",
            CommandKind::PulseParallel => "pulsepar",
            CommandKind::PingUid => "ping_uid",
            CommandKind::SetUid => "set_uid",
            CommandKind::SetPwmUid => "setpwm_uid",
            CommandKind::PulseUid => "pulse_uid",
            CommandKind::PulseGroupUid => "pulsegrp_uid",
            CommandKind::PulseGroupUidLog => "pulsegrp_uid_log",
            CommandKind::PulseGroupUidLogView => "pulsegrp_uid_logview",
            CommandKind::PulseParallelUid => "pulsepar_uid",
            CommandKind::PulseParallelUidLog => "pulsepar_uid_log",
            CommandKind::PulseParallelUidLogView => "pulsepar_uid_logview",
            CommandKind::Total => "total",
            CommandKind::TotalClear => "total_clear",
            CommandKind::Active => "active",
            CommandKind::Log => "log",
            CommandKind::Debug => "debug",
            CommandKind::Errors => "errors",
            CommandKind::Recover => "recover",
            CommandKind::Table => "table",
            CommandKind::Summary => "summary",
            CommandKind::Clear => "clear",
            CommandKind::EeMap => "eemap",
            CommandKind::EeClear => "eeclear",
            CommandKind::EeSave => "eesave",
            CommandKind::MapSet => "mapset",
            CommandKind::MapDel => "mapdel",
            CommandKind::MapShow => "mapshow",
            CommandKind::MapList => "maplist",
            CommandKind::MapExport => "mapexport",
            CommandKind::MapImport => "mapimport",
            CommandKind::TestAll => "testall",
            CommandKind::BatchTest => "batchtest",
            CommandKind::BatchPrep => "batchprep",
            CommandKind::BatchRun => "batchrun",
            CommandKind::BatchAbort => "batchabort",
            CommandKind::Custom => return None,
        };
        Some(verb)
    }

    /// Wire text without the line terminator
    pub fn text(&self) -> String {
        self.to_string()
    }
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for item in items {
        write!(f, " {}", item)?;
    }
    Ok(())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(verb) = self.verb() else {
            return match self {
                Self::Custom { text } => f.write_str(text),
                _ => Ok(()),
            };
        };

        f.write_str(verb)?;
        match self {
            Self::Ping { id } | Self::MapDel { id } | Self::MapShow { id } => write!(f, " {}", id),
            Self::Set { id, pin, on } => write!(f, " {} {} {}", id, pin, flag(*on)),
            Self::SetPwm { id, pin, duty } => write!(f, " {} {} {}", id, pin, duty),
            Self::Pulse {
                id,
                pin,
                duration_ms,
            } => write!(f, " {} {} {}", id, pin, duration_ms),
            Self::PulseGroup { id, pulses } => {
                write!(f, " {}", id)?;
                write_list(f, pulses)
            }
            Self::PulseParallel { pulses } => write_list(f, pulses),
            Self::PingUid { uid } => write!(f, " {}", uid),
            Self::SetUid { uid, pin, on } => write!(f, " {} {} {}", uid, pin, flag(*on)),
            Self::SetPwmUid { uid, pin, duty } => write!(f, " {} {} {}", uid, pin, duty),
            Self::PulseUid {
                uid,
                pin,
                duration_ms,
            } => write!(f, " {} {} {}", uid, pin, duration_ms),
            Self::PulseGroupUid { uid, pulses, .. } | Self::BatchPrep { uid, pulses } => {
                write!(f, " {}", uid)?;
                write_list(f, pulses)
            }
            Self::PulseParallelUid { pulses, .. } => write_list(f, pulses),
            Self::Log { count } => write!(f, " {}", count),
            Self::Debug { enabled } => write!(f, " {}", flag(*enabled)),
            Self::MapSet { id, uid } => write!(f, " {} {}", id, uid),
            Self::MapImport { payload } => write!(f, " {}", payload),
            _ => Ok(()),
        }
    }
}
