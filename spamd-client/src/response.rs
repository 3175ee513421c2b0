//! Response decoding.
//!
//! ```text
//! SPAMD/<version> <code> <message>\r\n
//! Spam: <True|False> ; <score> / <threshold>\r\n
//! <Name>: <value>\r\n
//! \r\n
//! <body>
//! ```
//!
//! The body shape depends on the command: nothing, an echoed message, or a
//! rule report.

use spamd_common::{incoming, internal};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::{
    command::{BodyShape, Command, TellAction},
    compression,
    config::ClientConfig,
    deadline::Deadline,
    error::{ClientError, Phase, Result},
    headers::Headers,
    status::StatusCode,
};

/// Protocol token expected on the status line.
pub const PROTOCOL_NAME: &str = "SPAMD";

/// Upper bound on the status line plus header block.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// A rule the daemon matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    /// Contribution to the total score. SYMBOLS responses in spamd's
    /// comma-separated form carry no scores and report `0.0`.
    pub score: f64,
    pub description: String,
}

/// A message echoed back by PROCESS or HEADERS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// A decoded spamd response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The command this response answers.
    pub command: Command,
    /// Protocol version, e.g. `1.5`.
    pub version: String,
    pub status: StatusCode,
    pub status_message: String,
    pub is_spam: bool,
    pub score: f64,
    /// The score at which the daemon considers a message spam.
    pub threshold: f64,
    pub headers: Headers,
    /// Present for PROCESS and HEADERS, and for CHECK in raw-body mode.
    pub message: Option<Message>,
    /// Non-empty only for SYMBOLS, REPORT and `REPORT_IFSPAM`.
    pub rules: Vec<Rule>,
    /// The undecoded (decompressed) body, kept in raw-body mode.
    pub raw_body: Option<Vec<u8>>,
}

impl Response {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether spamd acknowledged a TELL learn directive.
    #[must_use]
    pub fn did_set(&self) -> bool {
        self.headers.contains(TellAction::Learn.acknowledgement())
    }

    /// Whether spamd acknowledged a TELL forget directive.
    #[must_use]
    pub fn did_remove(&self) -> bool {
        self.headers.contains(TellAction::Forget.acknowledgement())
    }
}

/// Status line plus header block.
#[derive(Debug, Clone, PartialEq)]
pub struct Head {
    pub version: String,
    pub status: StatusCode,
    pub status_message: String,
    pub headers: Headers,
}

/// Decodes responses for one command.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    command: Command,
    raw_body: bool,
    max_response_size: usize,
}

impl Decoder {
    #[must_use]
    pub const fn new(command: Command, config: &ClientConfig) -> Self {
        Self {
            command,
            raw_body: config.raw_body,
            max_response_size: config.max_response_size,
        }
    }

    /// Reads and decodes a complete response from `reader`.
    ///
    /// Every read is bounded by `deadline`. Nothing is retried here.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Timeout`] if the deadline passes
    /// - [`ClientError::TruncatedResponse`] if the stream ends early
    /// - [`ClientError::Daemon`] for a non-zero status code
    /// - [`ClientError::Protocol`] for malformed input
    pub async fn decode<R>(&self, reader: &mut R, deadline: Deadline) -> Result<Response>
    where
        R: AsyncBufRead + Unpin,
    {
        let head = self.read_head(reader, deadline).await?;

        if !head.status.is_success() {
            return Err(ClientError::Daemon {
                code: head.status,
                message: head.status_message,
                headers: head.headers,
            });
        }

        let body = self.read_body(reader, &head, deadline).await?;
        self.assemble(head, body)
    }

    /// Reads the status line and header block.
    async fn read_head<R>(&self, reader: &mut R, deadline: Deadline) -> Result<Head>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut consumed = 0usize;
        let mut status_line: Option<String> = None;
        let mut header_lines: Vec<String> = Vec::new();

        loop {
            let remaining = MAX_HEAD_SIZE.saturating_sub(consumed);
            if remaining == 0 {
                return Err(ClientError::Protocol(format!(
                    "Header block exceeds {MAX_HEAD_SIZE} bytes"
                )));
            }

            let mut line = Vec::new();
            let n = deadline
                .within(
                    Phase::Read,
                    (&mut *reader)
                        .take(remaining as u64)
                        .read_until(b'\n', &mut line),
                )
                .await?
                .map_err(|source| ClientError::Io {
                    phase: Phase::Read,
                    source,
                })?;
            consumed += n;

            if n == 0 {
                // spamd closes after a bare PONG status line.
                if status_line.is_some() && matches!(self.command, Command::Ping) {
                    break;
                }
                return Err(ClientError::TruncatedResponse {
                    expected: None,
                    received: consumed,
                });
            }

            if line.last() != Some(&b'\n') {
                if n == remaining {
                    return Err(ClientError::Protocol(format!(
                        "Header block exceeds {MAX_HEAD_SIZE} bytes"
                    )));
                }
                return Err(ClientError::TruncatedResponse {
                    expected: None,
                    received: consumed,
                });
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            incoming!("{text}");

            if status_line.is_none() {
                if text.is_empty() {
                    return Err(ClientError::Protocol("Empty status line".into()));
                }
                status_line = Some(text.to_string());
            } else if text.is_empty() {
                break;
            } else {
                header_lines.push(text.to_string());
            }
        }

        let status_line = status_line.unwrap_or_default();
        let (version, status, status_message) = parse_status_line(&status_line)?;
        let headers = parse_header_lines(&header_lines)?;

        Ok(Head {
            version,
            status,
            status_message,
            headers,
        })
    }

    /// Reads the body declared by `head`.
    async fn read_body<R>(&self, reader: &mut R, head: &Head, deadline: Deadline) -> Result<Vec<u8>>
    where
        R: AsyncBufRead + Unpin,
    {
        let declared = head
            .headers
            .get("Content-length")
            .map(|value| {
                value.trim().parse::<usize>().map_err(|e| {
                    ClientError::Protocol(format!("Invalid Content-length '{value}': {e}"))
                })
            })
            .transpose()?;

        if declared.is_none() && matches!(self.command, Command::Ping) {
            return Ok(Vec::new());
        }

        let limit = declared.unwrap_or(self.max_response_size);
        if limit > self.max_response_size {
            return Err(ClientError::Protocol(format!(
                "Declared body of {limit} bytes exceeds the {} byte limit",
                self.max_response_size
            )));
        }

        let mut body = Vec::with_capacity(limit.min(64 * 1024));
        // One extra byte detects bodies that overrun the limit.
        let cap = if declared.is_some() { limit } else { limit + 1 };
        deadline
            .within(Phase::Read, (&mut *reader).take(cap as u64).read_to_end(&mut body))
            .await?
            .map_err(|source| ClientError::Io {
                phase: Phase::Read,
                source,
            })?;

        match declared {
            Some(expected) if body.len() < expected => Err(ClientError::TruncatedResponse {
                expected: Some(expected),
                received: body.len(),
            }),
            None if body.len() > self.max_response_size => Err(ClientError::Protocol(format!(
                "Body exceeds the {} byte limit",
                self.max_response_size
            ))),
            _ => Ok(body),
        }
    }

    /// Builds the response from a successful head and its raw body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] if the verdict header is missing or
    /// malformed, the body cannot be decompressed, or the body does not
    /// have the shape the command calls for.
    pub fn assemble(&self, head: Head, body: Vec<u8>) -> Result<Response> {
        let body = self.decompress(&head.headers, body)?;

        let (is_spam, score, threshold) = match head.headers.get("Spam") {
            Some(value) => parse_spam_header(value)?,
            None if self.command.requires_verdict() => {
                return Err(ClientError::Protocol(format!(
                    "{} response is missing the Spam header",
                    self.command
                )));
            }
            None => (false, 0.0, 0.0),
        };

        let mut message = None;
        let mut rules = Vec::new();

        match self.command.body_shape(self.raw_body) {
            BodyShape::None => {}
            BodyShape::Message => {
                if !(body.is_empty() && matches!(self.command, Command::Check)) {
                    message = Some(parse_message(&body)?);
                }
            }
            BodyShape::Rules => {
                rules = parse_rules(&String::from_utf8_lossy(&body))?;
            }
        }

        Ok(Response {
            command: self.command,
            version: head.version,
            status: head.status,
            status_message: head.status_message,
            is_spam,
            score,
            threshold,
            headers: head.headers,
            message,
            rules,
            raw_body: self.raw_body.then_some(body),
        })
    }

    fn decompress(&self, headers: &Headers, body: Vec<u8>) -> Result<Vec<u8>> {
        match headers.get("Compress").map(str::trim) {
            None => Ok(body),
            Some(_) if body.is_empty() => Ok(body),
            Some(scheme) if scheme.eq_ignore_ascii_case(compression::ZLIB) => {
                compression::decompress(&body, self.max_response_size).map_err(|e| {
                    ClientError::Protocol(format!("Invalid compressed body: {e}"))
                })
            }
            Some(scheme) => Err(ClientError::Protocol(format!(
                "Unsupported compression '{scheme}'"
            ))),
        }
    }
}

/// Parses `SPAMD/<version> <code> <message>`.
///
/// # Errors
///
/// Returns [`ClientError::Protocol`] if the line is malformed.
pub fn parse_status_line(line: &str) -> Result<(String, StatusCode, String)> {
    let malformed = || ClientError::Protocol(format!("Malformed status line: '{line}'"));

    let (protocol, rest) = line.split_once(' ').ok_or_else(malformed)?;
    let (name, version) = protocol.split_once('/').ok_or_else(malformed)?;
    if name != PROTOCOL_NAME
        || version.is_empty()
        || !version.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return Err(malformed());
    }

    let rest = rest.trim_start();
    let (code, message) = rest.split_once(' ').unwrap_or((rest, ""));
    let code = code.parse::<u32>().map_err(|_| malformed())?;

    Ok((
        version.to_string(),
        StatusCode::from(code),
        message.trim().to_string(),
    ))
}

/// Parses `Name: value` lines. Lines starting with whitespace continue the
/// previous header.
fn parse_header_lines(lines: &[String]) -> Result<Headers> {
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(lines.len());

    for line in lines {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = pairs.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
        }

        let (name, value) = line
            .split_once(':')
            .filter(|(name, _)| !name.trim().is_empty() && !name.contains(' '))
            .ok_or_else(|| ClientError::Protocol(format!("Malformed header line: '{line}'")))?;
        pairs.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(pairs.into_iter().collect())
}

/// Parses `True|False ; <score> / <threshold>`.
///
/// # Errors
///
/// Returns [`ClientError::Protocol`] if the value is malformed.
pub fn parse_spam_header(value: &str) -> Result<(bool, f64, f64)> {
    let malformed = || ClientError::Protocol(format!("Malformed Spam header: '{value}'"));

    let (verdict, scores) = value.split_once(';').ok_or_else(malformed)?;
    let verdict = match verdict.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => true,
        "false" | "no" => false,
        _ => return Err(malformed()),
    };

    let (score, threshold) = scores.split_once('/').ok_or_else(malformed)?;
    let parse = |number: &str| {
        number
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(malformed)
    };

    Ok((verdict, parse(score)?, parse(threshold)?))
}

/// Splits an echoed message into its header mapping and body.
///
/// # Errors
///
/// Returns [`ClientError::Protocol`] if the header block cannot be parsed.
pub fn parse_message(data: &[u8]) -> Result<Message> {
    let (parsed, offset) = mailparse::parse_headers(data)
        .map_err(|e| ClientError::Protocol(format!("Malformed message headers: {e}")))?;

    let headers = parsed
        .iter()
        .map(|header| (header.get_key(), header.get_value()))
        .collect();

    Ok(Message {
        headers,
        body: data.get(offset..).unwrap_or_default().to_vec(),
    })
}

/// Parses a rule report.
///
/// Rule lines read `<score> <NAME> <description>`. A leading summary line
/// and any prose are skipped. Inside spamd's report table, indented lines
/// continue the previous rule's description. A single comma-separated line
/// of rule names (spamd's SYMBOLS form) yields unscored rules.
///
/// # Errors
///
/// Returns [`ClientError::Protocol`] if the body has content but no rule
/// could be read from it.
pub fn parse_rules(body: &str) -> Result<Vec<Rule>> {
    let lines: Vec<&str> = body
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect();

    let Some(first) = lines.first() else {
        return Ok(Vec::new());
    };

    if lines.len() == 1 {
        if is_summary_line(first) {
            return Ok(Vec::new());
        }
        if let Some(rule) = parse_rule_line(first) {
            return Ok(vec![rule]);
        }
        return parse_symbol_list(first).ok_or_else(|| {
            ClientError::Protocol(format!("Unrecognised rule report line: '{}'", first.trim()))
        });
    }

    let mut rules: Vec<Rule> = Vec::new();
    let mut in_table = false;
    let mut unparsed = 0usize;

    for (index, line) in lines.iter().enumerate() {
        if is_table_separator(line) {
            in_table = true;
            continue;
        }

        if let Some(rule) = parse_rule_line(line) {
            rules.push(rule);
            continue;
        }

        if in_table && line.starts_with([' ', '\t']) {
            if let Some(last) = rules.last_mut() {
                if !last.description.is_empty() {
                    last.description.push(' ');
                }
                last.description.push_str(line.trim());
                continue;
            }
        }

        // The leading summary line is expected not to parse.
        if index > 0 {
            unparsed += 1;
        }
    }

    if rules.is_empty() && unparsed > 0 && !in_table {
        return Err(ClientError::Protocol(format!(
            "No rules could be parsed from {unparsed} report line(s)"
        )));
    }

    Ok(rules)
}

fn parse_rule_line(line: &str) -> Option<Rule> {
    let (score, rest) = split_token(line.trim())?;
    let score = score.parse::<f64>().ok().filter(|s| s.is_finite())?;

    let rest = rest.trim_start();
    let (name, description) = split_token(rest).unwrap_or((rest, ""));
    if !is_rule_name(name) {
        return None;
    }

    Some(Rule {
        name: name.to_string(),
        score,
        description: description.trim().to_string(),
    })
}

fn parse_symbol_list(line: &str) -> Option<Vec<Rule>> {
    let line = line.trim();
    if line.contains(char::is_whitespace) {
        return None;
    }

    let mut rules = Vec::new();
    for name in line.split(',').filter(|name| !name.is_empty()) {
        if is_rule_name(name) {
            rules.push(Rule {
                name: name.to_string(),
                score: 0.0,
                description: String::new(),
            });
        } else {
            internal!(level = DEBUG, "Skipping malformed symbol name: '{name}'");
        }
    }

    (!rules.is_empty()).then_some(rules)
}

/// Matches spamd's `<score>/<threshold>` report summary line.
fn is_summary_line(line: &str) -> bool {
    line.trim().split_once('/').is_some_and(|(score, threshold)| {
        score.trim().parse::<f64>().is_ok() && threshold.trim().parse::<f64>().is_ok()
    })
}

fn split_token(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    Some(
        text.split_once(char::is_whitespace)
            .unwrap_or((text, "")),
    )
}

fn is_rule_name(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && token.chars().any(|c| c.is_ascii_uppercase())
}

fn is_table_separator(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("----") && line.chars().all(|c| c == '-' || c == ' ')
}
