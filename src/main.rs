use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use contact_picker::config::{self, Config, Inclusion};
use contact_picker::vdir::{AccessPrompt, VdirSource};
use contact_picker::{
    ContactRecord, PickerController, PickerDelegate, PickerError, PickerState, SortOrder,
    SubtitleField,
};

#[derive(Parser, Debug)]
#[command(name = "contact-picker", version, about = "Browse and pick contacts from a vCard directory")]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the alphabetical index
    List(ListArgs),
    /// Print contacts matching a query
    Search(SearchArgs),
    /// Pick contacts interactively from stdin commands
    Pick(PickArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    #[arg(long, value_enum)]
    include: Option<IncludeArg>,

    #[arg(long, value_enum)]
    subtitle: Option<SubtitleArg>,

    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Name to search for; an empty query disables the filter
    query: String,

    #[arg(long, value_enum)]
    include: Option<IncludeArg>,

    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct PickArgs {
    /// Toggle rows and commit with `done` instead of picking one row
    #[arg(long, default_value_t = false)]
    multi: bool,

    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    #[arg(long, value_enum)]
    include: Option<IncludeArg>,

    #[arg(long, value_enum)]
    subtitle: Option<SubtitleArg>,

    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Default,
    Given,
    Family,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Default => SortOrder::SystemDefault,
            SortArg::Given => SortOrder::GivenName,
            SortArg::Family => SortOrder::FamilyName,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IncludeArg {
    All,
    #[value(name = "has_phone")]
    HasPhone,
    #[value(name = "has_email")]
    HasEmail,
}

impl From<IncludeArg> for Inclusion {
    fn from(value: IncludeArg) -> Self {
        match value {
            IncludeArg::All => Inclusion::All,
            IncludeArg::HasPhone => Inclusion::HasPhone,
            IncludeArg::HasEmail => Inclusion::HasEmail,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SubtitleArg {
    Phone,
    Email,
    Birthday,
    Organization,
}

impl From<SubtitleArg> for SubtitleField {
    fn from(value: SubtitleArg) -> Self {
        match value {
            SubtitleArg::Phone => SubtitleField::PhoneNumber,
            SubtitleArg::Email => SubtitleField::Email,
            SubtitleArg::Birthday => SubtitleField::Birthday,
            SubtitleArg::Organization => SubtitleField::Organization,
        }
    }
}

/// Prints outcomes as they are reported and remembers the last failure.
struct CliReporter {
    json: bool,
    failure: Option<PickerError>,
}

impl CliReporter {
    fn new(json: bool) -> Self {
        Self {
            json,
            failure: None,
        }
    }

    fn print_selection(&self, records: &[ContactRecord]) {
        if self.json {
            print_json(&records);
        } else {
            for record in records {
                println!("selected: {}", record.display_name());
            }
        }
    }
}

impl PickerDelegate for CliReporter {
    fn on_fetch_failed(&mut self, error: &PickerError) {
        self.failure = Some(error.clone());
    }

    fn on_cancelled(&mut self, reason: Option<&PickerError>) {
        if self.json {
            print_json(&CancelReport {
                cancelled: true,
                reason: reason.map(ToString::to_string),
            });
        } else {
            match reason {
                Some(reason) => println!("cancelled: {reason}"),
                None => println!("cancelled"),
            }
        }
    }

    fn on_single_selected(&mut self, record: &ContactRecord) {
        self.print_selection(std::slice::from_ref(record));
    }

    fn on_multi_selected(&mut self, records: &[ContactRecord]) {
        self.print_selection(records);
    }
}

#[derive(Serialize)]
struct CancelReport {
    cancelled: bool,
    reason: Option<String>,
}

#[derive(Serialize)]
struct SectionReport<'a> {
    key: &'a str,
    records: &'a [ContactRecord],
}

#[derive(Serialize)]
struct SearchReport<'a> {
    filter_active: bool,
    records: Vec<&'a ContactRecord>,
}

/// Asks on stderr and reads the answer from stdin.
struct StdinPrompt;

#[async_trait]
impl AccessPrompt for StdinPrompt {
    async fn ask(&self, app_name: &str) -> Option<bool> {
        eprint!("Allow {app_name} to access your contacts? [y/N] ");
        let _ = io::stderr().flush();
        match read_line().await {
            Ok(Some(answer)) => {
                let answer = answer.trim().to_ascii_lowercase();
                Some(answer == "y" || answer == "yes")
            }
            Ok(None) => None,
            Err(err) => {
                warn!("failed to read access answer: {err:#}");
                None
            }
        }
    }
}

type Controller = PickerController<VdirSource, CliReporter>;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::List(args) => handle_list(args, &config).await,
        Command::Search(args) => handle_search(args, &config).await,
        Command::Pick(args) => handle_pick(args, &config).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn open_controller(
    config: &Config,
    sort: Option<SortArg>,
    include: Option<IncludeArg>,
    subtitle: Option<SubtitleArg>,
    multi: bool,
    json: bool,
) -> Controller {
    let mut settings = config.picker.clone();
    if let Some(sort) = sort {
        settings.sort_order = sort.into();
    }
    if let Some(include) = include {
        settings.include = include.into();
    }
    if let Some(subtitle) = subtitle {
        settings.subtitle = subtitle.into();
    }
    if multi {
        settings.multi_select = true;
    }

    let source = VdirSource::new(config.vdir.clone(), config.app_name.clone())
        .with_policy(config.access)
        .with_prompt(Arc::new(StdinPrompt))
        .with_default_sort_order(config.default_sort_order);

    PickerController::new(
        Arc::new(source),
        CliReporter::new(json),
        settings.to_picker_config(&config.app_name),
    )
}

/// Display the picker and wait for the first load. A failure ends the command.
async fn load(controller: &mut Controller) -> Result<()> {
    controller.display();
    controller.settle().await;
    take_failure(controller)
}

fn take_failure(controller: &mut Controller) -> Result<()> {
    match controller.delegate_mut().failure.take() {
        Some(err) => Err(anyhow!(err)),
        None => Ok(()),
    }
}

async fn handle_list(args: ListArgs, config: &Config) -> Result<()> {
    let mut controller = open_controller(
        config,
        args.sort,
        args.include,
        args.subtitle,
        false,
        args.json,
    );
    load(&mut controller).await?;

    let index = controller.index();
    if args.json {
        let sections: Vec<SectionReport<'_>> = index
            .keys()
            .iter()
            .filter_map(|key| {
                index.section(key).map(|records| SectionReport {
                    key: key.as_str(),
                    records,
                })
            })
            .collect();
        print_json(&sections);
        return Ok(());
    }

    if index.is_empty() {
        println!("No contacts");
        return Ok(());
    }
    let view = controller.view();
    for section in 0..view.section_count() {
        println!("{}", view.section_title(section).unwrap_or_default());
        for row in 0..view.rows_in_section(section) {
            if let Some(row) = view.row(contact_picker::RowRef::new(section, row)) {
                println!("  {}  {}", row.title, row.subtitle);
            }
        }
    }
    Ok(())
}

async fn handle_search(args: SearchArgs, config: &Config) -> Result<()> {
    let mut controller = open_controller(config, None, args.include, None, false, args.json);
    load(&mut controller).await?;

    controller.set_query(&args.query);
    controller.settle().await;
    take_failure(&mut controller)?;

    let view = controller.view();
    if args.json {
        print_json(&SearchReport {
            filter_active: view.is_filtering(),
            records: view.rows().map(|(_, record)| record).collect(),
        });
        return Ok(());
    }

    if !view.is_filtering() {
        println!("No filter active ({} contacts)", view.total_records());
        return Ok(());
    }
    let mut matched = false;
    for (at, _) in view.rows() {
        if let Some(row) = view.row(at) {
            println!("{}  {}", row.title, row.subtitle);
            matched = true;
        }
    }
    if !matched {
        println!("No matches for \"{}\"", args.query);
    }
    Ok(())
}

async fn handle_pick(args: PickArgs, config: &Config) -> Result<()> {
    let mut controller = open_controller(
        config,
        args.sort,
        args.include,
        args.subtitle,
        args.multi,
        args.json,
    );
    load(&mut controller).await?;
    print_rows(&controller, args.json);

    while !controller.is_finished() {
        let Some(line) = read_line().await? else {
            controller.cancel();
            break;
        };
        let line = line.trim();

        match line {
            "" => {}
            "done" => {
                controller.done();
                if !controller.is_finished() {
                    eprintln!("nothing selected");
                }
            }
            "cancel" | "q" => controller.cancel(),
            _ if line.starts_with('/') => {
                controller.set_query(&line[1..]);
                controller.settle().await;
                if let Some(err) = controller.delegate_mut().failure.take() {
                    eprintln!("error: {err}");
                }
                print_rows(&controller, args.json);
            }
            _ => match line.parse::<usize>() {
                Ok(number) if number >= 1 => {
                    let target = controller.view().rows().nth(number - 1).map(|(at, _)| at);
                    match target {
                        Some(at) => {
                            controller.activate(at);
                            if controller.config().multi_select {
                                print_rows(&controller, args.json);
                            }
                        }
                        None => eprintln!("no row {number}"),
                    }
                }
                _ => eprintln!("unknown command `{line}`"),
            },
        }

        controller.settle().await;
        if controller.state() == PickerState::Idle {
            take_failure(&mut controller)?;
        }
    }
    Ok(())
}

/// Numbered rows as shown; goes to stderr in JSON mode so stdout only carries
/// reports.
fn print_rows(controller: &Controller, json: bool) {
    let view = controller.view();
    let mut out: Box<dyn Write> = if json {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };
    let mut current_section = None;
    for (number, (at, _)) in view.rows().enumerate() {
        if current_section != Some(at.section) {
            current_section = Some(at.section);
            if let Some(title) = view.section_title(at.section) {
                let _ = writeln!(out, "{title}");
            }
        }
        if let Some(row) = view.row(at) {
            let mark = if row.checked { "[x] " } else { "" };
            let _ = writeln!(out, "{:>4}. {mark}{}  {}", number + 1, row.title, row.subtitle);
        }
    }
    if current_section.is_none() {
        let _ = writeln!(out, "No contacts");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(encoded) => println!("{encoded}"),
        Err(err) => warn!("failed to encode JSON output: {err}"),
    }
}

/// One line from stdin, or `None` at end of input.
async fn read_line() -> Result<Option<String>> {
    tokio::task::spawn_blocking(|| -> Result<Option<String>> {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        Ok(if read == 0 { None } else { Some(line) })
    })
    .await
    .map_err(|err| anyhow!("stdin reader failed: {err}"))?
}
