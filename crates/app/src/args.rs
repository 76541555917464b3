use std::fmt;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { command: Command, flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { command, flag } => {
                write!(f, "{} requires {flag}", command.name())
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Create,
    List,
    Delete,
    Run,
    Review,
    Show,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "create" => Some(Self::Create),
            "list" => Some(Self::List),
            "delete" => Some(Self::Delete),
            "run" => Some(Self::Run),
            "review" => Some(Self::Review),
            "show" => Some(Self::Show),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Delete => "delete",
            Self::Run => "run",
            Self::Review => "review",
            Self::Show => "show",
        }
    }
}

/// Parsed command line. Per-command flags stay optional here and are checked
/// with `require` once the command runs.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub db_url: Option<String>,
    pub fixture: Option<PathBuf>,
    pub owner: Option<u64>,
    pub user: Option<u64>,
    pub quiz: Option<u64>,
    pub result: Option<u64>,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub count: Option<usize>,
    pub page: Option<u32>,
}

pub enum Parsed {
    Help,
    Command(Command, Args),
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app create --owner <id> --name <name> --tag <topic> --count <n>");
    eprintln!("  app list   --owner <id> [--page <n>]");
    eprintln!("  app delete --quiz <id>");
    eprintln!("  app run    --quiz <id> --user <id>     # type /cancel to stop");
    eprintln!("  app review --result <id>");
    eprintln!("  app show   --result <id>");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --db <sqlite_url>      (default sqlite://quiz.sqlite3)");
    eprintln!("  --fixture <file.json>  serve questions from a local fixture");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_CORPUS_BASE_URL, QUIZ_MAX_QUESTIONS, QUIZ_LIST_PAGE_SIZE,");
    eprintln!("  QUIZ_SAMPLING_UNIVERSE_CAP, QUIZ_SAMPLING_MAX_ATTEMPTS, QUIZ_HTTP_TIMEOUT_SECS,");
    eprintln!("  RUST_LOG");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

pub fn parse(argv: impl IntoIterator<Item = String>) -> Result<Parsed, ArgsError> {
    let mut args = argv.into_iter();
    let command = match args.next().as_deref() {
        None | Some("--help" | "-h" | "help") => return Ok(Parsed::Help),
        Some(first) => {
            Command::from_arg(first).ok_or_else(|| ArgsError::UnknownCommand(first.to_owned()))?
        }
    };

    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(&mut args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                parsed.db_url = Some(normalize_sqlite_url(value));
            }
            "--fixture" => parsed.fixture = Some(require_value(&mut args, "--fixture")?.into()),
            "--owner" => parsed.owner = Some(number(&mut args, "--owner")?),
            "--user" => parsed.user = Some(number(&mut args, "--user")?),
            "--quiz" => parsed.quiz = Some(number(&mut args, "--quiz")?),
            "--result" => parsed.result = Some(number(&mut args, "--result")?),
            "--name" => parsed.name = Some(require_value(&mut args, "--name")?),
            "--tag" => parsed.tag = Some(require_value(&mut args, "--tag")?),
            "--count" => parsed.count = Some(number(&mut args, "--count")?),
            "--page" => parsed.page = Some(number(&mut args, "--page")?),
            "--help" | "-h" => return Ok(Parsed::Help),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(Parsed::Command(command, parsed))
}

pub fn require<T: Clone>(
    command: Command,
    value: &Option<T>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    value.clone().ok_or(ArgsError::MissingFlag { command, flag })
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its directory exist before sqlx opens it.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}
