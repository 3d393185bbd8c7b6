/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Free text: search the active corpus.
    Search(String),
    /// Switch the active corpus.
    Corpus(String),
    /// List configured corpora.
    Corpora,
    /// Open the detail view on a 1-based result number.
    Open(usize),
    /// Open the detail view on an arbitrary frame key.
    Show { key: String, image_id: u64 },
    Next,
    Prev,
    /// Toggle between still image and video.
    Play,
    Close,
    /// Record an uploaded video name.
    Upload(String),
    Uploads,
    /// Set the sample-video flag.
    Sample(bool),
    Help,
    Quit,
    /// Blank line.
    Nothing,
}

/// Parses a console line. Errors carry a message for the user.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Nothing);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Search(line.to_string()));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "corpus" if !arg.is_empty() => Ok(Command::Corpus(arg.to_string())),
        "corpus" => Err("usage: :corpus <id>".to_string()),
        "corpora" => Ok(Command::Corpora),
        "open" => arg
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Command::Open)
            .ok_or_else(|| "usage: :open <result number>".to_string()),
        "show" => parse_show(arg),
        "next" | "n" => Ok(Command::Next),
        "prev" | "p" => Ok(Command::Prev),
        "play" => Ok(Command::Play),
        "close" => Ok(Command::Close),
        "upload" if !arg.is_empty() => Ok(Command::Upload(arg.to_string())),
        "upload" => Err("usage: :upload <video name>".to_string()),
        "uploads" => Ok(Command::Uploads),
        "sample" => match arg {
            "on" => Ok(Command::Sample(true)),
            "off" => Ok(Command::Sample(false)),
            _ => Err("usage: :sample on|off".to_string()),
        },
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command ':{other}' (try :help)")),
    }
}

fn parse_show(arg: &str) -> Result<Command, String> {
    const USAGE: &str = "usage: :show <frame key> [image id]";
    let mut parts = arg.split_whitespace();
    let key = parts.next().ok_or_else(|| USAGE.to_string())?;
    let image_id = match parts.next() {
        Some(raw) => raw.parse().map_err(|_| USAGE.to_string())?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(USAGE.to_string());
    }
    Ok(Command::Show {
        key: key.to_string(),
        image_id,
    })
}

pub const HELP: &str = "\
<text>            search the active corpus
:corpus <id>      switch corpus (clears results)
:corpora          list corpora
:open <n>         show result n
:show <key> [id]  show any frame key (V004_12, L13/L13_V001/40, L13_V001_40)
:next / :prev     move within the opened results
:play             toggle between frame and video
:close            close the frame view
:upload <name>    record an uploaded video
:uploads          list uploaded videos
:sample on|off    mark the sample lecture as available
:quit             exit";
