//! Command routing — slash commands are dispatched distinctly from free
//! text and may interrupt any conversation step.

/// The commands the assistant understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start` — reset the session.
    Start,
    /// `/48h` — begin a 48-hour request.
    Request48h,
    /// `/list` — ask for the secret code, then export the weekly list.
    List,
}

impl Command {
    /// Parse a leading slash command. Telegram's `/cmd@BotName` form is
    /// accepted; unknown commands and free text return `None`.
    pub fn parse(text: &str) -> Option<Command> {
        let first = text.trim().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(Self::Start),
            "48h" => Some(Self::Request48h),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}
