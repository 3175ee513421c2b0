//! spamd response status codes.
//!
//! spamd reuses the BSD `sysexits.h` values for its protocol status.

use core::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum StatusCode {
    Ok,
    Usage,
    DataErr,
    NoInput,
    NoUser,
    NoHost,
    Unavailable,
    Software,
    OsErr,
    OsFile,
    CantCreat,
    IoErr,
    TempFail,
    Protocol,
    NoPerm,
    Config,
    Timeout,
    Unknown(u32),
}

impl StatusCode {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Checks if the daemon reported a condition worth retrying later.
    #[must_use]
    pub const fn is_temporary(self) -> bool {
        matches!(self, Self::TempFail | Self::Unavailable | Self::Timeout)
    }

    /// The symbolic name spamd puts in the status line, e.g. `EX_OK`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "EX_OK",
            Self::Usage => "EX_USAGE",
            Self::DataErr => "EX_DATAERR",
            Self::NoInput => "EX_NOINPUT",
            Self::NoUser => "EX_NOUSER",
            Self::NoHost => "EX_NOHOST",
            Self::Unavailable => "EX_UNAVAILABLE",
            Self::Software => "EX_SOFTWARE",
            Self::OsErr => "EX_OSERR",
            Self::OsFile => "EX_OSFILE",
            Self::CantCreat => "EX_CANTCREAT",
            Self::IoErr => "EX_IOERR",
            Self::TempFail => "EX_TEMPFAIL",
            Self::Protocol => "EX_PROTOCOL",
            Self::NoPerm => "EX_NOPERM",
            Self::Config => "EX_CONFIG",
            Self::Timeout => "EX_TIMEOUT",
            Self::Unknown(_) => "EX_UNKNOWN",
        }
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Ok,
            64 => Self::Usage,
            65 => Self::DataErr,
            66 => Self::NoInput,
            67 => Self::NoUser,
            68 => Self::NoHost,
            69 => Self::Unavailable,
            70 => Self::Software,
            71 => Self::OsErr,
            72 => Self::OsFile,
            73 => Self::CantCreat,
            74 => Self::IoErr,
            75 => Self::TempFail,
            76 => Self::Protocol,
            77 => Self::NoPerm,
            78 => Self::Config,
            79 => Self::Timeout,
            _ => Self::Unknown(value),
        }
    }
}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        match value {
            StatusCode::Ok => 0,
            StatusCode::Usage => 64,
            StatusCode::DataErr => 65,
            StatusCode::NoInput => 66,
            StatusCode::NoUser => 67,
            StatusCode::NoHost => 68,
            StatusCode::Unavailable => 69,
            StatusCode::Software => 70,
            StatusCode::OsErr => 71,
            StatusCode::OsFile => 72,
            StatusCode::CantCreat => 73,
            StatusCode::IoErr => 74,
            StatusCode::TempFail => 75,
            StatusCode::Protocol => 76,
            StatusCode::NoPerm => 77,
            StatusCode::Config => 78,
            StatusCode::Timeout => 79,
            StatusCode::Unknown(v) => v,
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", u32::from(*self))
    }
}
