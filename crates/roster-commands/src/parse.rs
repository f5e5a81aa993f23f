//! Command-line parsing: `/name[@bot] args...` into a typed [`Command`].

use chrono::NaiveDate;
use roster_core::dates::parse_date;
use roster_core::record::NewRecord;

use crate::error::{UsageError, CREATE_USAGE, DELETE_USAGE, RENEW_USAGE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    ChatId,
    PingDb,
    CreateUser(NewRecord),
    DeleteUser { national_id: String },
    Renew { national_id: String, registration: NaiveDate },
    /// `None` lists everything expired or expiring soon.
    Check { national_id: Option<String> },
}

impl Command {
    /// Name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::ChatId => "chatid",
            Command::PingDb => "pingdb",
            Command::CreateUser(_) => "createuser",
            Command::DeleteUser { .. } => "deleteuser",
            Command::Renew { .. } => "renew",
            Command::Check { .. } => "check",
        }
    }
}

/// Commands answered for every user, allowlisted or not.
const PUBLIC_COMMANDS: &[&str] = &["start", "help", "chatid"];

/// Split `/name@bot rest` into the lowercase name and the raw rest.
fn split_command(text: &str) -> Option<(String, &str)> {
    let body = text.trim().strip_prefix('/')?;
    let (head, rest) = match body.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), rest))
}

pub fn is_public_command(text: &str) -> bool {
    split_command(text).is_some_and(|(name, _)| PUBLIC_COMMANDS.contains(&name.as_str()))
}

/// Parse a chat message.
///
/// Returns `None` when the text is not a known command, `Some(Err)` when the
/// command is known but its arguments are unusable.
pub fn parse_command(text: &str) -> Option<Result<Command, UsageError>> {
    let (name, rest) = split_command(text)?;
    let mut args = rest.split_whitespace();

    let parsed = match name.as_str() {
        "start" => Ok(Command::Start),
        "help" => Ok(Command::Help),
        "chatid" => Ok(Command::ChatId),
        "pingdb" => Ok(Command::PingDb),
        "createuser" => parse_create(rest).map(Command::CreateUser),
        "deleteuser" => match args.next() {
            Some(national_id) => Ok(Command::DeleteUser {
                national_id: national_id.to_string(),
            }),
            None => Err(UsageError::Usage {
                usage: DELETE_USAGE,
            }),
        },
        "renew" => match (args.next(), args.next()) {
            (Some(national_id), Some(date)) => parse_date(date)
                .map(|registration| Command::Renew {
                    national_id: national_id.to_string(),
                    registration,
                })
                .map_err(UsageError::from),
            _ => Err(UsageError::Usage { usage: RENEW_USAGE }),
        },
        "check" => Ok(Command::Check {
            national_id: args.next().map(str::to_string),
        }),
        _ => return None,
    };
    Some(parsed)
}

/// `Name|Birth|NationalID|Room|Registered`
fn parse_create(raw: &str) -> Result<NewRecord, UsageError> {
    if raw.is_empty() || !raw.contains('|') {
        return Err(UsageError::Usage {
            usage: CREATE_USAGE,
        });
    }
    let parts: Vec<&str> = raw.split('|').map(str::trim).collect();
    let [name, birth, national_id, room, registered] = parts[..] else {
        return Err(UsageError::FieldCount { found: parts.len() });
    };
    let birth = parse_date(birth)?;
    let registered = parse_date(registered)?;
    Ok(NewRecord::new(name, birth, national_id, room, registered)?)
}
