// UI layer: the command grammar and the interactive flows, built on
// `dialoguer` prompts. User-facing rejections are printed messages, never
// errors; only filesystem faults propagate out of here.

use anyhow::Result;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use std::path::Path;
use std::process;
use std::time::Instant;

use crate::api::{ComicClient, Session};
use crate::archive::Archive;

/// Everything a user can type at the prompt or pass as the single
/// command-line argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Latest,
    Single(u32),
    Range { low: u32, high: u32 },
    Random,
    All,
    List,
    Head,
    Tail,
    Wipe,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    /// Classify a user token. Range bounds are validated against the
    /// session upper bound here; single numbers are validated at execution
    /// time so the "does not exist" message can be produced.
    pub fn parse(token: &str, upper_bound: Option<u32>) -> Self {
        let token = token.trim();
        if token.is_empty() || token == "n" {
            return Command::Latest;
        }
        if is_digits(token) {
            return match token.parse() {
                Ok(num) => Command::Single(num),
                Err(_) => Command::Invalid(token.to_string()),
            };
        }
        if let Some(range) = parse_range(token, upper_bound) {
            return range;
        }
        match token {
            "r" => Command::Random,
            "all" => Command::All,
            "ls" => Command::List,
            "head" => Command::Head,
            "tail" => Command::Tail,
            "wipe" => Command::Wipe,
            "help" => Command::Help,
            "q" | "quit" => Command::Quit,
            other => Command::Invalid(other.to_string()),
        }
    }
}

fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// A range token is two integers joined by a hyphen, with `low < high` and
/// `high` no greater than the known upper bound (unbounded when the bound
/// is unknown). Anything else is not a range.
fn parse_range(token: &str, upper_bound: Option<u32>) -> Option<Command> {
    let (low, high) = token.split_once('-')?;
    if !is_digits(low) || !is_digits(high) {
        return None;
    }
    let low = low.parse().ok()?;
    let high = high.parse().ok()?;
    if low < high && upper_bound.map_or(true, |upper| high <= upper) {
        Some(Command::Range { low, high })
    } else {
        None
    }
}

/// `0` and `404` never exist on the service; anything past the known upper
/// bound does not exist yet. With no known bound nothing is rejected here,
/// since the archive may still hold the comic.
fn nonexistent(num: u32, upper_bound: Option<u32>) -> bool {
    num == 0 || num == 404 || upper_bound.map_or(false, |upper| num > upper)
}

/// Owns the client, the archive and the session snapshot, and drives every
/// command. Constructed once in `main`; there is no other state.
pub struct App {
    client: ComicClient,
    archive: Archive,
    session: Session,
}

impl App {
    pub fn new(client: ComicClient, archive: Archive, session: Session) -> Self {
        App {
            client,
            archive,
            session,
        }
    }

    /// Interactive prompt loop. Blocks until the user quits.
    pub fn run_prompt(&mut self) -> Result<()> {
        println!("Welcome to comicstash!");
        println!("Type \"help\" to show a list of commands.");
        loop {
            let choice: String = Input::new()
                .with_prompt(">")
                .allow_empty(true)
                .interact_text()?;
            if !self.exec(&choice)? {
                break;
            }
        }
        Ok(())
    }

    /// Execute one token. Returns false when the user asked to quit.
    pub fn exec(&mut self, token: &str) -> Result<bool> {
        match Command::parse(token, self.session.upper_bound) {
            Command::Latest => self.show_latest()?,
            Command::Single(num) => self.show_number(num)?,
            Command::Range { low, high } => self.fetch_range(low, high)?,
            Command::Random => self.random()?,
            Command::All => self.fetch_all()?,
            Command::List => print_items(self.archive.listing()?),
            Command::Head => print_items(&self.archive.head()?),
            Command::Tail => print_items(&self.archive.tail()?),
            Command::Wipe => self.wipe()?,
            Command::Help => print_help(),
            Command::Quit => return Ok(false),
            Command::Invalid(token) => {
                println!("{token} is not a valid choice. Try again. You can do it.");
            }
        }
        Ok(true)
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.client.clear_cache()
    }

    fn show_latest(&mut self) -> Result<()> {
        match self.session.upper_bound {
            Some(latest) => self.show_number(latest),
            None => {
                println!("Server not found / No internet connection.");
                Ok(())
            }
        }
    }

    /// Show a comic by number, downloading it first when it is not in the
    /// archive.
    fn show_number(&mut self, num: u32) -> Result<()> {
        if nonexistent(num, self.session.upper_bound) {
            println!("That comic does not exist!");
            return Ok(());
        }
        if let Some(filename) = self.archive.find(num)? {
            return self.display(&filename);
        }
        if !self.session.connected {
            println!("Server not found / No internet connection.");
            return Ok(());
        }
        println!("Not in archive. Downloading fresh...");
        match self.download(num) {
            Ok(filename) => self.display(&filename),
            Err(err) => {
                log::warn!("download of comic {num} failed: {err:#}");
                println!("Could not download comic {num}.");
                Ok(())
            }
        }
    }

    /// The fetch-and-persist pipeline: metadata document, image bytes,
    /// archive write. Returns the derived filename.
    fn download(&mut self, num: u32) -> Result<String> {
        let meta = self.client.fetch_metadata(num)?;
        let image = self.client.fetch_image(&meta.img)?;
        self.archive.store(&meta, &image)
    }

    /// Download every missing comic in `low..=high`, skipping the two
    /// numbers the service never serves. A failed download is logged and
    /// skipped; the loop never stops early.
    fn fetch_range(&mut self, low: u32, high: u32) -> Result<()> {
        if !self.session.connected {
            println!("Server not found / No internet access.");
            return Ok(());
        }
        println!("Attempting download of comics {low} through {high}...");
        let bar = ProgressBar::new(u64::from(high) - u64::from(low) + 1);
        bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] [{wide_bar}] {pos}/{len}").unwrap(),
        );
        let started = Instant::now();
        let mut count = 0u32;
        for num in low..=high {
            bar.inc(1);
            if num == 0 || num == 404 {
                continue;
            }
            if self.archive.find(num)?.is_some() {
                continue;
            }
            match self.download(num) {
                Ok(_) => {
                    bar.println(format!("Downloaded comic {num}."));
                    count += 1;
                }
                Err(err) => log::warn!("skipping comic {num}: {err:#}"),
            }
        }
        bar.finish_and_clear();
        println!(
            "Downloaded {count} new comics in {:.2} s.",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Download the whole archive after an explicit confirmation.
    fn fetch_all(&mut self) -> Result<()> {
        let Some(upper) = self.session.upper_bound else {
            println!("Server not found / No internet access.");
            return Ok(());
        };
        println!("This will attempt to download every comic.");
        if confirmed()? {
            self.fetch_range(1, upper)?;
        }
        Ok(())
    }

    /// Random comic: any number below the upper bound when connected,
    /// otherwise a random pick from the archive.
    fn random(&mut self) -> Result<()> {
        if self.session.connected {
            let upper = self.session.upper_bound.unwrap_or(2).max(2);
            let num = rand::thread_rng().gen_range(1..upper);
            return self.show_number(num);
        }
        let filename = {
            let listing = self.archive.listing()?;
            if listing.is_empty() {
                println!("You don't have any comics on you, nor are you connected to the internet...");
                return Ok(());
            }
            listing[rand::thread_rng().gen_range(0..listing.len())].clone()
        };
        self.display(&filename)
    }

    /// Destructive: clears the archive and the transport cache after an
    /// explicit confirmation. Declining removes nothing.
    fn wipe(&mut self) -> Result<()> {
        println!("This will delete all cache and comic files.");
        if !confirmed()? {
            return Ok(());
        }
        println!("Clearing cache and comic archive...");
        self.archive.wipe()?;
        self.client.clear_cache()?;
        println!("Done.");
        Ok(())
    }

    /// Print the comic header and caption, then hand the file path to the
    /// external viewer.
    fn display(&self, filename: &str) -> Result<()> {
        if let Some(num) = filename.split('-').next().and_then(|p| p.parse::<u32>().ok()) {
            println!("Comic #{num}!");
        }
        if let Some(caption) = self.archive.caption_for(filename)? {
            println!("Mouseover text: {caption}");
        }
        open_viewer(&self.archive.path_of(filename));
        Ok(())
    }
}

fn confirmed() -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt("Are you sure?")
        .default(false)
        .interact()?)
}

fn print_items(items: &[String]) {
    for item in items {
        println!("{item}");
    }
}

fn print_help() {
    let cmds = [
        "n       -> Get the latest comic!",
        "###     -> Get comic number ###!",
        "xxx-yyy -> Get comics #xxx to #yyy!",
        "r       -> Get a random comic!",
        "ls      -> Show a list of all comics downloaded.",
        "head    -> Show your first ten comics.",
        "tail    -> Show your last ten comics.",
        "all     -> Get ALL the comics. (Be careful)",
        "wipe    -> Clears cache and comic archive.",
        "q       -> Get outta here!",
    ];
    for cmd in cmds {
        println!("{cmd}");
    }
}

/// Spawn the external image viewer. `COMIC_VIEWER` overrides the OS
/// default opener. Failures are logged, not fatal.
fn open_viewer(path: &Path) {
    let mut command = match std::env::var("COMIC_VIEWER") {
        Ok(viewer) => {
            let mut command = process::Command::new(viewer);
            command.arg(path);
            command
        }
        Err(_) => default_viewer(path),
    };
    if let Err(err) = command.spawn() {
        log::warn!("failed to launch viewer: {err}");
        println!("Could not open a viewer; the file is at {}", path.display());
    }
}

#[cfg(target_os = "macos")]
fn default_viewer(path: &Path) -> process::Command {
    let mut command = process::Command::new("open");
    command.arg(path);
    command
}

#[cfg(all(unix, not(target_os = "macos")))]
fn default_viewer(path: &Path) -> process::Command {
    let mut command = process::Command::new("xdg-open");
    command.arg(path);
    command
}

#[cfg(windows)]
fn default_viewer(path: &Path) -> process::Command {
    let mut command = process::Command::new("cmd");
    command.args(["/C", "start", ""]).arg(path);
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_n_map_to_latest() {
        assert_eq!(Command::parse("", Some(500)), Command::Latest);
        assert_eq!(Command::parse("n", Some(500)), Command::Latest);
        assert_eq!(Command::parse("  ", None), Command::Latest);
    }

    #[test]
    fn digits_parse_as_single() {
        assert_eq!(Command::parse("42", Some(500)), Command::Single(42));
        assert_eq!(Command::parse("0", Some(500)), Command::Single(0));
        // Out-of-bound numbers still parse; execution rejects them.
        assert_eq!(Command::parse("9999", Some(500)), Command::Single(9999));
    }

    #[test]
    fn named_commands_parse() {
        assert_eq!(Command::parse("r", None), Command::Random);
        assert_eq!(Command::parse("all", None), Command::All);
        assert_eq!(Command::parse("ls", None), Command::List);
        assert_eq!(Command::parse("head", None), Command::Head);
        assert_eq!(Command::parse("tail", None), Command::Tail);
        assert_eq!(Command::parse("wipe", None), Command::Wipe);
        assert_eq!(Command::parse("help", None), Command::Help);
        assert_eq!(Command::parse("q", None), Command::Quit);
        assert_eq!(Command::parse("quit", None), Command::Quit);
    }

    #[test]
    fn range_requires_ascending_bounds_within_the_upper_bound() {
        assert_eq!(
            Command::parse("250-252", Some(500)),
            Command::Range { low: 250, high: 252 }
        );
        // The range containing the permanently missing numbers still parses;
        // the fetch loop skips them.
        assert_eq!(
            Command::parse("0-404", Some(500)),
            Command::Range { low: 0, high: 404 }
        );
        assert_eq!(
            Command::parse("5-2", Some(500)),
            Command::Invalid("5-2".into())
        );
        assert_eq!(
            Command::parse("10-501", Some(500)),
            Command::Invalid("10-501".into())
        );
    }

    #[test]
    fn range_is_unbounded_when_the_upper_bound_is_unknown() {
        assert_eq!(
            Command::parse("1-9000", None),
            Command::Range { low: 1, high: 9000 }
        );
    }

    #[test]
    fn garbage_tokens_are_invalid() {
        for token in ["abc", "1-2-3", "-5", "5-", "+5", "99999999999999", "1 2"] {
            assert_eq!(
                Command::parse(token, Some(500)),
                Command::Invalid(token.to_string()),
                "token {token:?} should be invalid"
            );
        }
    }

    #[test]
    fn permanently_missing_numbers_do_not_exist() {
        assert!(nonexistent(0, Some(500)));
        assert!(nonexistent(404, Some(500)));
        assert!(nonexistent(501, Some(500)));
        assert!(!nonexistent(500, Some(500)));
        assert!(!nonexistent(1, Some(500)));
    }

    #[test]
    fn unknown_upper_bound_only_rejects_the_permanent_holes() {
        assert!(nonexistent(0, None));
        assert!(nonexistent(404, None));
        assert!(!nonexistent(9999, None));
    }
}
