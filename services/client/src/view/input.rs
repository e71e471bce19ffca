//! Parsing of lines typed at the prompt.

/// What the user asked for with one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// Plain text: a question, or a spoken line in voice mode.
    Say(String),
    /// Join or leave the voice room
    ToggleVoice,
    /// Play or stop the audio of a visible message (1-based)
    ToggleAudio(usize),
    /// Copy the text of a visible message (1-based)
    Copy(usize),
    /// Print the whole visible conversation again
    History,
    Help,
    Quit,
    /// A known command used with missing or bad arguments
    Usage(&'static str),
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
Type a question and press Enter to send it.

  /voice      join or leave the voice room
  /play <n>   play or stop the audio of message n
  /copy <n>   copy the text of message n
  /history    show the whole conversation again
  /help       show this help
  /quit       exit voxchat";

/// Parses one line. `//` at the start escapes a literal slash.
pub fn parse_input(line: &str) -> UserInput {
    let line = line.trim();
    if let Some(escaped) = line.strip_prefix("//") {
        return UserInput::Say(format!("/{}", escaped));
    }
    let Some(command) = line.strip_prefix('/') else {
        return UserInput::Say(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();
    match name.as_str() {
        "voice" | "v" => UserInput::ToggleVoice,
        "play" | "p" => match parse_index(arg) {
            Some(n) => UserInput::ToggleAudio(n),
            None => UserInput::Usage("/play <n>"),
        },
        "copy" | "c" => match parse_index(arg) {
            Some(n) => UserInput::Copy(n),
            None => UserInput::Usage("/copy <n>"),
        },
        "history" => UserInput::History,
        "help" | "?" => UserInput::Help,
        "quit" | "q" | "exit" => UserInput::Quit,
        _ => UserInput::Unknown(name),
    }
}

fn parse_index(arg: Option<&str>) -> Option<usize> {
    arg?.parse::<usize>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_said() {
        assert_eq!(
            parse_input("  What is Rust?  "),
            UserInput::Say("What is Rust?".to_string())
        );
        assert_eq!(parse_input(""), UserInput::Say(String::new()));
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_input("/voice"), UserInput::ToggleVoice);
        assert_eq!(parse_input("/PLAY 3"), UserInput::ToggleAudio(3));
        assert_eq!(parse_input("/c 12"), UserInput::Copy(12));
        assert_eq!(parse_input("/history"), UserInput::History);
        assert_eq!(parse_input("/?"), UserInput::Help);
        assert_eq!(parse_input("/exit"), UserInput::Quit);
    }

    #[test]
    fn test_bad_arguments() {
        assert_eq!(parse_input("/play"), UserInput::Usage("/play <n>"));
        assert_eq!(parse_input("/play 0"), UserInput::Usage("/play <n>"));
        assert_eq!(parse_input("/copy two"), UserInput::Usage("/copy <n>"));
    }

    #[test]
    fn test_unknown_and_escaped() {
        assert_eq!(parse_input("/dance"), UserInput::Unknown("dance".to_string()));
        assert_eq!(parse_input("/"), UserInput::Unknown(String::new()));
        assert_eq!(
            parse_input("//etc/hosts is a file?"),
            UserInput::Say("/etc/hosts is a file?".to_string())
        );
    }
}
