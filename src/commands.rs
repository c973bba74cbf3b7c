//! Parsing of inbound text into bot commands.

use crate::quotes::QuoteStyle;
use crate::tiktok::extract_tiktok_url;

/// Text prefix (case-insensitive) that starts a multi-choice music search
pub const MUSIC_TEXT_PREFIX: &str = "муз";

/// Numeric id argument of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdArgument {
    Missing,
    Invalid,
    Id(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quote(QuoteStyle),
    MyQuote(Option<i64>),
    HerQuote(Option<i64>),
    ChatQuote(Option<i64>),
    MyChatQuote(Option<i64>),
    AllQuote,
    DeleteQuote(IdArgument),
    /// `/myz`: download the best match directly
    MusicBest(String),
    /// `муз ...`: present several matches to choose from
    MusicOptions(String),
    SavePhoto(Option<String>),
    Photos,
    RandomTikTok,
    TikTokLink(String),
}

/// Parse a message text; `None` means the text is not addressed to the bot
pub fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix('/') {
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        // Commands in groups arrive as `/cmd@BotName`
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        if let Some(command) = parse_slash_command(&name, args) {
            return Some(command);
        }
    }

    if let Some(query) = strip_music_prefix(trimmed) {
        return Some(Command::MusicOptions(query));
    }

    extract_tiktok_url(trimmed).map(|url| Command::TikTokLink(url.to_string()))
}

fn parse_slash_command(name: &str, args: &str) -> Option<Command> {
    let number = || args.split_whitespace().next().and_then(|n| n.parse().ok());

    let command = match name {
        "start" | "help" => Command::Help,
        "quote" | "q" => Command::Quote(QuoteStyle::Classic),
        "quote2" | "q2" => Command::Quote(QuoteStyle::Emoji),
        "my_quote" | "m_q" => Command::MyQuote(number()),
        "her_quote" | "h_q" => Command::HerQuote(number()),
        "chat_quote" | "c_q" => Command::ChatQuote(number()),
        "mchat_quote" | "mc_q" => Command::MyChatQuote(number()),
        "all_quote" => Command::AllQuote,
        "delete_quote" | "d_q" => Command::DeleteQuote(match args.split_whitespace().next() {
            None => IdArgument::Missing,
            Some(raw) => raw.parse().map_or(IdArgument::Invalid, IdArgument::Id),
        }),
        "myz" => Command::MusicBest(args.to_string()),
        "save_photo" | "save_scan" => {
            Command::SavePhoto(Some(args.to_string()).filter(|a| !a.is_empty()))
        }
        "photos" | "scans" => Command::Photos,
        "tiktok" => Command::RandomTikTok,
        _ => return None,
    };
    Some(command)
}

fn strip_music_prefix(text: &str) -> Option<String> {
    let prefix_len = MUSIC_TEXT_PREFIX.chars().count();
    let head: String = text.chars().take(prefix_len).collect();
    if head.to_lowercase() != MUSIC_TEXT_PREFIX {
        return None;
    }

    let rest: String = text.chars().skip(prefix_len).collect();
    // "музыка" is an ordinary word, not a search
    if rest.chars().next().is_some_and(|c| !c.is_whitespace()) {
        return None;
    }
    Some(rest.trim().to_string())
}
