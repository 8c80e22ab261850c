//! Interactive console
//!
//! Prompts, menu loop and printing. Everything here is presentation: role
//! checks and error recovery belong to the [`Dispatcher`].
//!
//! Every prompt requires a TTY on stdin.

use anyhow::Result;
use dialoguer::{Input, Password};

use crate::catalog::{BookDraft, BookRecord, Identifier, NewUser, UserMode};
use crate::config::FolioConfig;
use crate::dispatch::{Action, Command, Dispatcher, Outcome, REJECTION_MESSAGE};
use crate::gateway::{Gateway, Notice, NoticeObserver};
use crate::session::Credentials;

/// Prints notices to stderr as they arrive
#[derive(Debug, Default)]
pub struct StderrNotices;

impl NoticeObserver for StderrNotices {
    fn on_notice(&self, notice: &Notice) {
        eprintln!("{notice}");
    }
}

fn prompt_text(prompt: &str) -> Result<String> {
    Ok(Input::<String>::new().with_prompt(prompt).allow_empty(true).interact_text()?)
}

fn prompt_int(prompt: &str) -> Result<i32> {
    Ok(Input::<i32>::new().with_prompt(prompt).interact_text()?)
}

fn prompt_identifier(prompt: &str, default: Option<&str>) -> Result<Identifier> {
    let mut input = Input::<String>::new().with_prompt(prompt).validate_with(|value: &String| {
        Identifier::new(value).map(|_| ()).map_err(|e| e.message())
    });
    if let Some(default) = default {
        input = input.default(default.to_string());
    }
    Ok(Identifier::new(input.interact_text()?)?)
}

/// Ask for whatever the flags and config did not provide
pub fn prompt_credentials(
    database: Option<&str>,
    username: Option<&str>,
    config: &FolioConfig,
) -> Result<Credentials> {
    let database = match database {
        Some(name) => name.to_string(),
        None => prompt_identifier("Enter database name", None)?.to_string(),
    };

    let username = match username {
        Some(name) => name.to_string(),
        None => prompt_identifier("Enter username", None)?.to_string(),
    };

    let password = match config.resolve_password()? {
        Some(password) => password,
        None => Password::new().with_prompt("Enter password").allow_empty_password(true).interact()?,
    };

    Ok(Credentials::new(database, username, password))
}

/// Ask for the table every book operation works on
pub fn prompt_table(preset: Option<&str>) -> Result<Identifier> {
    prompt_identifier("Enter table name for operations", preset)
}

fn prompt_draft(prefix: &str) -> Result<BookDraft> {
    let title = prompt_text(&format!("Enter {prefix}Title"))?;
    let author = prompt_text(&format!("Enter {prefix}Author"))?;
    let publisher = prompt_text(&format!("Enter {prefix}Publisher"))?;
    let year = prompt_int(&format!("Enter {prefix}Year"))?;
    Ok(BookDraft::new(title, author, publisher, year))
}

/// Collect the parameters `action` needs
pub fn read_command(action: Action) -> Result<Command> {
    let command = match action {
        Action::CreateDatabase => Command::CreateDatabase(prompt_identifier(
            "Enter the name of the database to create",
            None,
        )?),
        Action::DropDatabase => {
            Command::DropDatabase(prompt_identifier("Enter the name of the database to drop", None)?)
        }
        Action::CreateTable => Command::CreateTable,
        Action::ClearTable => Command::ClearTable,
        Action::AddBook => Command::AddBook(prompt_draft("")?),
        Action::UpdateBook => {
            let id = prompt_int("Enter the ID of the book to update")?;
            Command::UpdateBook { id, book: prompt_draft("new ")? }
        }
        Action::DeleteBookByTitle => {
            Command::DeleteBookByTitle(prompt_text("Enter the Title of the book to delete")?)
        }
        Action::SearchBooksByTitle => {
            Command::SearchBooksByTitle(prompt_text("Enter part of the Title to search")?)
        }
        Action::ViewAllRecords => Command::ViewAllRecords,
        Action::CreateDbUser => {
            let username = prompt_identifier("Enter new DB username", None)?;
            let password = Password::new()
                .with_prompt("Enter new DB user password")
                .allow_empty_password(true)
                .interact()?;
            let mode = UserMode::parse(&prompt_text("Enter access mode for new user (admin/guest)")?);
            Command::CreateDbUser(NewUser { username, password, mode })
        }
        Action::Exit => Command::Exit,
    };

    Ok(command)
}

/// Parse a menu choice; anything but a positive number is `None`
#[must_use]
pub fn parse_choice(input: &str) -> Option<u32> {
    input.trim().parse().ok().filter(|choice| *choice > 0)
}

/// Books as printed after a search
#[must_use]
pub fn format_books(books: &[BookRecord]) -> String {
    if books.is_empty() {
        return "No books found.\n".to_string();
    }

    books.iter().map(|book| format!("{book}\n")).collect()
}

/// Menu loop. Returns on Exit, or with the error that made going on impossible.
///
/// Prompts are read through `dialoguer`, which needs an interactive terminal.
/// With stdin piped from a file or another process the first prompt fails
/// with "not a terminal" and the loop returns that error, so scripted
/// sessions cannot drive the menu.
pub async fn run<G: Gateway>(dispatcher: &Dispatcher<G>) -> Result<()> {
    let menu = dispatcher.menu();

    loop {
        println!();
        print!("{}", menu.render());

        let choice = prompt_text("Choose an operation")?;
        let Some(action) = parse_choice(&choice).and_then(|number| menu.resolve(number)) else {
            println!("{REJECTION_MESSAGE}");
            continue;
        };

        // Refuse before prompting for parameters the caller may not use.
        if dispatcher.authorize(action).is_err() {
            println!("{REJECTION_MESSAGE}");
            continue;
        }

        let command = read_command(action)?;
        match dispatcher.dispatch(command).await {
            Outcome::Completed(message) => println!("{message}"),
            Outcome::Books(books) => print!("{}", format_books(&books)),
            Outcome::Unavailable => println!("{REJECTION_MESSAGE}"),
            Outcome::Failed(e) if e.is_recoverable() => eprintln!("Error: {e}"),
            Outcome::Failed(e) => return Err(e.into()),
            Outcome::Exit => return Ok(()),
        }
    }
}
