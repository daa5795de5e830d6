//! Closed enumerations carried in event headers and system parameters.
//!
//! Both enumerations travel as JSON numbers. Values outside the known range
//! are rejected with [`InvalidKind`] when decoding and when converting from a
//! raw number.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvalidKind;

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $value:literal => $label:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u32", into = "u32")]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $value,
            )+
        }

        impl $name {
            /// Every value in wire order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the numeric wire value.
            #[must_use]
            pub const fn as_u32(self) -> u32 {
                self as u32
            }

            /// Returns the conventional upper-case name used in logs.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = InvalidKind;

            fn try_from(value: u32) -> Result<Self, InvalidKind> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(InvalidKind::new(stringify!($name), other)),
                }
            }
        }

        impl From<$name> for u32 {
            fn from(kind: $name) -> Self {
                kind.as_u32()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_enum! {
    /// Kind of work an event represents.
    EventType {
        /// Type not set.
        #[default]
        Unknown = 0 => "EV_UNKNOWN",
        /// Application-internal event; never leaves the process.
        Base = 1 => "EV_BASE",
        /// Generic script execution request.
        Script = 2 => "EV_SCRIPT",
        /// Perl script execution request.
        Perl = 3 => "EV_PERL",
        /// Binary execution request.
        Bin = 4 => "EV_BIN",
        /// URL fetch request.
        Url = 5 => "EV_URL",
        /// Result of a previous request.
        Result = 6 => "EV_RESULT",
        /// Worker completion notice.
        WorkerDone = 7 => "EV_WORKER_DONE",
        /// Control command; see [`Command`].
        Command = 8 => "EV_COMMAND",
        /// Reply to a stream submission.
        Reply = 9 => "EV_REPLY",
        /// Broker-generated failure notice.
        Error = 10 => "EV_ERROR",
    }
}

closed_enum! {
    /// Control command carried by [`EventType::Command`] events.
    Command {
        /// No command.
        #[default]
        None = 0 => "CMD_NONE",
        /// Produce statistics.
        Stats = 1 => "CMD_STATS",
        /// Reset statistics counters.
        ResetStats = 2 => "CMD_RESET_STATS",
        /// Reopen the log file.
        ReopenLog = 3 => "CMD_REOPEN_LOG",
        /// Reread configuration.
        RereadConf = 4 => "CMD_REREAD_CONF",
        /// Finish current work and exit.
        ExitWhenDone = 5 => "CMD_EXIT_WHEN_DONE",
        /// Send a UDP packet.
        SendUdpPacket = 6 => "CMD_SEND_UDP_PACKET",
        /// Timer signal.
        TimerSignal = 7 => "CMD_TIMER_SIGNAL",
        /// Child process signal.
        ChildSignal = 8 => "CMD_CHILD_SIGNAL",
        /// Application-defined command.
        App = 9 => "CMD_APP",
        /// Broker shutdown.
        Shutdown = 10 => "CMD_SHUTDOWN",
        /// Nucleus configuration.
        NucleusConf = 11 => "CMD_NUCLEUS_CONF",
        /// Dump internal state.
        DumpState = 12 => "CMD_DUMP_STATE",
        /// Network interface configuration.
        NetworkIfConf = 13 => "CMD_NETWORKIF_CONF",
        /// Queue drained.
        EndOfQueue = 14 => "CMD_END_OF_QUEUE",
        /// Main configuration.
        MainConf = 15 => "CMD_MAIN_CONF",
        /// Persistent application sub-protocol, selected by the `cmd` parameter.
        PersistentApp = 16 => "CMD_PERSISTENT_APP",
        /// Generic event command.
        Event = 17 => "CMD_EVENT",
        /// Worker configuration.
        WorkerConf = 18 => "CMD_WORKER_CONF",
    }
}

impl Command {
    /// Returns true for [`Command::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
