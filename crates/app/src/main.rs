mod args;

use std::fmt;
use std::fs::File;
use std::io::BufReader as StdBufReader;
use std::sync::Arc;

use corpus::{CorpusClient, FixtureCorpus};
use quiz_core::model::{QuizId, ResultId, UserId};
use services::{
    Clock, QuizConfig, QuizServiceError, QuizServices, ReviewCursor, ReviewDecision, ReviewError,
    ReviewStep, SessionError, SessionKey, StepOutcome,
};
use storage::repository::{QuizRepository, ResultRepository, Storage};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command, Parsed, prepare_sqlite_file, print_usage, require};

const DATE_FORMAT: &str = "%Y.%m.%d";
const DATETIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";
const CANCEL: &str = "/cancel";

type Input = Lines<BufReader<Stdin>>;

/// A service failure already logged in full; only the user-facing text remains.
#[derive(Debug)]
struct Reported(&'static str);

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for Reported {}

trait UserFacing: std::error::Error {
    fn user_message(&self) -> &'static str;
}

impl UserFacing for QuizServiceError {
    fn user_message(&self) -> &'static str {
        QuizServiceError::user_message(self)
    }
}

impl UserFacing for SessionError {
    fn user_message(&self) -> &'static str {
        SessionError::user_message(self)
    }
}

impl UserFacing for ReviewError {
    fn user_message(&self) -> &'static str {
        ReviewError::user_message(self)
    }
}

fn report(err: impl UserFacing) -> Reported {
    warn!(error = %err, "command failed");
    Reported(err.user_message())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn build_services(args: &Args) -> Result<QuizServices, Box<dyn std::error::Error>> {
    let mut config = QuizConfig::from_env();
    if let Some(db_url) = &args.db_url {
        config.db_url.clone_from(db_url);
    }

    prepare_sqlite_file(&config.db_url)?;

    let Some(path) = &args.fixture else {
        return Ok(QuizServices::new_sqlite(config, Clock::system()).await?);
    };
    let fixture = FixtureCorpus::from_json_reader(StdBufReader::new(File::open(path)?))?;
    info!(path = %path.display(), questions = fixture.len(), "using fixture corpus");
    let corpus: Arc<dyn CorpusClient> = Arc::new(fixture);
    let storage = Storage::sqlite(&config.db_url).await?;
    Ok(QuizServices::with_parts(config, Clock::system(), storage, corpus))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (cmd, args) = match args::parse(std::env::args().skip(1)) {
        Ok(Parsed::Help) => {
            print_usage();
            return Ok(());
        }
        Ok(Parsed::Command(cmd, args)) => (cmd, args),
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    let services = build_services(&args).await?;
    match cmd {
        Command::Create => create(&services, cmd, &args).await,
        Command::List => list(&services, cmd, &args).await,
        Command::Delete => delete(&services, cmd, &args).await,
        Command::Run => run_quiz(&services, cmd, &args).await,
        Command::Review => review(&services, cmd, &args).await,
        Command::Show => show(&services, cmd, &args).await,
    }
}

async fn create(
    services: &QuizServices,
    cmd: Command,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let owner = UserId::new(require(cmd, &args.owner, "--owner")?);
    let name = require(cmd, &args.name, "--name")?;
    let tag = require(cmd, &args.tag, "--tag")?;
    let count = require(cmd, &args.count, "--count")?;

    println!("Collecting {count} questions about {tag:?}...");
    let quiz = services
        .quizzes()
        .create_quiz(owner, &name, &tag, count)
        .await
        .map_err(report)?;
    println!(
        "Quiz #{} {:?} created with {} questions.",
        quiz.id(),
        quiz.name(),
        quiz.question_count()
    );
    Ok(())
}

async fn list(
    services: &QuizServices,
    cmd: Command,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let owner = UserId::new(require(cmd, &args.owner, "--owner")?);
    // Pages are one-based on the command line.
    let page = args.page.unwrap_or(1).saturating_sub(1);

    let listing = services
        .quizzes()
        .list_quizzes(owner, page)
        .await
        .map_err(report)?;
    if listing.items.is_empty() {
        println!("No quizzes yet.");
        return Ok(());
    }

    let pagination = listing.pagination;
    println!(
        "Quizzes (page {} of {}, {} total):",
        pagination.page() + 1,
        pagination.page_count(),
        pagination.total()
    );
    for quiz in &listing.items {
        println!(
            "  #{:<5} {:<40} {:>2} questions  {}",
            quiz.id(),
            quiz.name(),
            quiz.question_count(),
            quiz.created_at().format(DATE_FORMAT)
        );
    }
    if pagination.has_prev() {
        println!("  previous: --page {}", pagination.page());
    }
    if pagination.has_next() {
        println!("  next: --page {}", pagination.page() + 2);
    }
    Ok(())
}

async fn delete(
    services: &QuizServices,
    cmd: Command,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let quiz_id = QuizId::new(require(cmd, &args.quiz, "--quiz")?);
    services
        .quizzes()
        .delete_quiz(quiz_id)
        .await
        .map_err(report)?;
    println!("Quiz #{quiz_id} deleted.");
    Ok(())
}

async fn run_quiz(
    services: &QuizServices,
    cmd: Command,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let quiz_id = QuizId::new(require(cmd, &args.quiz, "--quiz")?);
    let user = UserId::new(require(cmd, &args.user, "--user")?);
    let runner = services.runner();
    let key = SessionKey::new(format!("console:{user}"));

    let result_id = runner
        .start(key.clone(), quiz_id, user)
        .await
        .map_err(report)?;
    println!("Run #{result_id} started. Type {CANCEL} to stop.");

    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
    let mut answer = String::new();
    loop {
        match runner.step(&key, &answer).await {
            Ok(StepOutcome::Question(prompt)) => {
                println!();
                println!("Question {}/{}:", prompt.number, prompt.total);
                println!("{}", prompt.text);
            }
            Ok(StepOutcome::Finished(summary)) => {
                println!();
                println!(
                    "Finished: {} of {} correct, score {}.",
                    summary.correct, summary.total, summary.score
                );
                println!("Completed at {}.", summary.completed_at.format(DATETIME_FORMAT));
                if !summary.score.is_perfect() {
                    println!("Review incorrect answers with: review --result {result_id}");
                }
                return Ok(());
            }
            Err(e @ (SessionError::Corpus(_) | SessionError::Storage(_))) => {
                println!("{}. Press Enter to retry.", report(e));
                let Some(line) = input.next_line().await? else {
                    runner.cancel(&key)?;
                    return Ok(());
                };
                if line.trim() == CANCEL {
                    runner.cancel(&key)?;
                    println!("Run cancelled.");
                    return Ok(());
                }
                continue;
            }
            Err(e) => return Err(report(e).into()),
        }

        let Some(line) = input.next_line().await? else {
            runner.cancel(&key)?;
            return Ok(());
        };
        if line.trim() == CANCEL {
            runner.cancel(&key)?;
            println!("Run cancelled.");
            return Ok(());
        }
        answer = line;
    }
}

async fn review(
    services: &QuizServices,
    cmd: Command,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let result_id = ResultId::new(require(cmd, &args.result, "--result")?);
    let review = services.review();
    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
    let mut cursor = ReviewCursor::start();

    loop {
        let turn = review.step(result_id, cursor).await.map_err(report)?;
        if let Some(accepted) = turn.accepted.filter(|a| a.changed) {
            println!("Accepted. Score is now {}.", accepted.score);
        }

        let prompt = match turn.next {
            ReviewStep::Complete(summary) => {
                println!(
                    "Review complete: {} of {} correct, score {}.",
                    summary.correct, summary.total, summary.score
                );
                return Ok(());
            }
            ReviewStep::Prompt(prompt) => prompt,
        };

        println!();
        println!("{} incorrect answer(s) left.", prompt.remaining);
        println!("Question: {}", prompt.question_text);
        println!("Answer: {}", prompt.reference_answer);
        if let Some(alternate) = &prompt.alternate_answer {
            println!("Also accepted: {alternate}");
        }
        println!("You answered: {}", prompt.submitted);
        println!("Accept? [y/n, {CANCEL} to stop]");

        let Some(line) = input.next_line().await? else {
            return Ok(());
        };
        cursor = match line.trim().to_lowercase().as_str() {
            "y" | "yes" => prompt.cursor_for(ReviewDecision::Accept),
            "n" | "no" => prompt.cursor_for(ReviewDecision::Reject),
            CANCEL => return Ok(()),
            _ => {
                println!("Please answer y or n.");
                ReviewCursor {
                    rank: prompt.rank,
                    accept: None,
                }
            }
        };
    }
}

async fn show(
    services: &QuizServices,
    cmd: Command,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let result_id = ResultId::new(require(cmd, &args.result, "--result")?);
    let storage = services.storage();
    let Some(result) = storage.results.get_result(result_id).await? else {
        println!("{}", ReviewError::UnknownResult(result_id).user_message());
        return Ok(());
    };
    let quiz_name = storage
        .quizzes
        .get_quiz(result.quiz_id)
        .await?
        .map_or_else(|| "(deleted quiz)".to_owned(), |q| q.name().to_owned());

    println!("Run #{} of {:?} by user {}", result.id, quiz_name, result.user_id);
    println!("Started:   {}", result.started_at.format(DATETIME_FORMAT));
    match result.completed_at {
        Some(at) => println!("Completed: {}", at.format(DATETIME_FORMAT)),
        None => println!("Completed: not finished"),
    }
    println!("Score:     {}", result.score);
    for (i, answer) in result.answers.iter().enumerate() {
        let mark = if answer.correct { "+" } else { "-" };
        println!("  {mark} {:>2}. {}", i + 1, answer.text);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
