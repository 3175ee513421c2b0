//! spamd commands and the response shape each one produces.

use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Training class for a TELL request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    Ham,
    Spam,
}

impl MessageClass {
    /// Value of the `Message-class` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ham => "ham",
            Self::Spam => "spam",
        }
    }
}

/// Whether a TELL request adds or removes a message from training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TellAction {
    Learn,
    Forget,
}

impl TellAction {
    /// Name of the directive header (`Set` or `Remove`).
    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Learn => "Set",
            Self::Forget => "Remove",
        }
    }

    /// Name of the header spamd uses to acknowledge the directive.
    #[must_use]
    pub const fn acknowledgement(self) -> &'static str {
        match self {
            Self::Learn => "DidSet",
            Self::Forget => "DidRemove",
        }
    }
}

/// What follows the header block of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// Headers only.
    None,
    /// A complete (possibly rewritten) message.
    Message,
    /// An itemized list of matched rules.
    Rules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Score only.
    Check,
    /// Score plus the names of matched rules.
    Symbols,
    /// Score plus the full report.
    Report,
    /// Score plus the report, only if the message is spam.
    ReportIfSpam,
    /// Score plus the rewritten message.
    Process,
    /// Score plus the rewritten headers.
    Headers,
    /// Liveness check.
    Ping,
    /// Learn or forget a message.
    Tell {
        class: MessageClass,
        action: TellAction,
    },
}

impl Command {
    /// The command token sent on the request line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Check => "CHECK",
            Self::Symbols => "SYMBOLS",
            Self::Report => "REPORT",
            Self::ReportIfSpam => "REPORT_IFSPAM",
            Self::Process => "PROCESS",
            Self::Headers => "HEADERS",
            Self::Ping => "PING",
            Self::Tell { .. } => "TELL",
        }
    }

    /// Whether the request carries a message body.
    #[must_use]
    pub const fn has_body(self) -> bool {
        !matches!(self, Self::Ping)
    }

    /// Whether the response must carry a `Spam:` header.
    ///
    /// spamd answers PING and TELL without one.
    #[must_use]
    pub const fn requires_verdict(self) -> bool {
        !matches!(self, Self::Ping | Self::Tell { .. })
    }

    /// Body shape of the response to this command.
    ///
    /// With `raw_body` set, CHECK is decoded as a message echo.
    #[must_use]
    pub const fn body_shape(self, raw_body: bool) -> BodyShape {
        match self {
            Self::Process | Self::Headers => BodyShape::Message,
            Self::Symbols | Self::Report | Self::ReportIfSpam => BodyShape::Rules,
            Self::Check if raw_body => BodyShape::Message,
            Self::Check | Self::Ping | Self::Tell { .. } => BodyShape::None,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
