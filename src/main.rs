use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use medsync::{
    config, logging,
    kv::{FileStore, KeyValueStore},
    planner::{Planner, UNAVAILABLE},
    task::{Task, TaskDraft, DATE_FORMAT},
    ui,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{error::Error, io, path::PathBuf, rc::Rc};
use tracing::info;

#[derive(Parser)]
#[command(name = "medsync", version, about = "Tasks, notes and targets in the terminal")]
struct Cli {
    /// Directory holding the database image, goals, config and log.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file to use instead of `config.json` in the data directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive planner (default).
    Tui,
    /// List active tasks and history.
    Tasks,
    /// Add a task.
    AddTask {
        title: String,
        /// Start time, HH:MM. Defaults to now.
        #[arg(long, default_value = "")]
        start: String,
        /// End time, HH:MM. Defaults to the configured end of day.
        #[arg(long, default_value = "")]
        end: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Flip a task's completion mark.
    Toggle { id: i64 },
    /// Delete a task.
    RemoveTask { id: i64 },
    /// Delete every expired task.
    ClearHistory,
    /// List notes, most recently edited first.
    Notes,
    AddNote { content: String },
    EditNote { id: i64, content: String },
    RemoveNote { id: i64 },
    /// List targets with their progress.
    Goals,
    /// Add a target ending at 23:59:59 on DATE (YYYY-MM-DD).
    AddGoal { title: String, date: String },
    /// Remove a target by its index in `goals`.
    RemoveGoal { index: usize },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = config::load(cli.data_dir.as_deref(), cli.config.as_deref())?;
    let log_path = logging::init(&config)?;
    info!(data_dir = ?config.data_dir, ?log_path, "starting medsync");

    let kv: Rc<dyn KeyValueStore> = Rc::new(FileStore::open(&config.data_dir)?);
    let mut planner = Planner::open(kv, &config.default_end_time)?;
    let now = Local::now().naive_local();
    planner.refresh(now)?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => run_tui(&mut planner, &config)?,
        Commands::Tasks => {
            println!("{}:", planner.active_label());
            print_tasks(&planner.tasks.active);
            println!("{}:", planner.history_label());
            print_tasks(&planner.tasks.history);
        }
        Commands::AddTask { title, start, end, description } => {
            let draft = TaskDraft { title, start, end, description };
            let outcome = planner.add_task(&draft, now)?;
            let task = applied(&planner, outcome)?;
            println!("Added task #{} ({} - {})", task.id, task.start, task.end);
        }
        Commands::Toggle { id } => {
            let outcome = planner.toggle_task(id, now)?;
            let completed = applied(&planner, outcome)?;
            println!("Task #{id} {}", if completed { "completed" } else { "reopened" });
        }
        Commands::RemoveTask { id } => {
            let outcome = planner.delete_task(id, now)?;
            applied(&planner, outcome)?;
            println!("Removed task #{id}");
        }
        Commands::ClearHistory => {
            let outcome = planner.clear_history(now)?;
            let removed = applied(&planner, outcome)?;
            println!("Removed {removed} expired tasks");
        }
        Commands::Notes => {
            for note in &planner.notes {
                println!("[#{}] {} {}", note.id, note.updated_day(), note.content);
            }
        }
        Commands::AddNote { content } => {
            let outcome = planner.add_note(&content, now)?;
            let note = applied(&planner, outcome)?;
            println!("Saved note #{}", note.id);
        }
        Commands::EditNote { id, content } => {
            let outcome = planner.update_note(id, &content, now)?;
            applied(&planner, outcome)?;
            println!("Updated note #{id}");
        }
        Commands::RemoveNote { id } => {
            let outcome = planner.delete_note(id, now)?;
            applied(&planner, outcome)?;
            println!("Removed note #{id}");
        }
        Commands::Goals => {
            let now = Utc::now();
            for (i, goal) in planner.goals().iter().enumerate() {
                println!(
                    "[{i}] {} - {} ({:.0}%)",
                    goal.title,
                    goal.countdown(now),
                    goal.progress(now)
                );
            }
        }
        Commands::AddGoal { title, date } => {
            let day = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)?;
            planner.add_goal(&title, day, Utc::now())?;
            println!("Added target {title:?} due {day}");
        }
        Commands::RemoveGoal { index } => {
            let goal = planner.remove_goal(index)?;
            println!("Removed target {:?}", goal.title);
        }
    }
    Ok(())
}

/// Unwraps the result of a planner change, failing if the store was unavailable.
fn applied<T>(planner: &Planner, outcome: Option<T>) -> Result<T, Box<dyn Error>> {
    outcome.ok_or_else(|| planner.status.clone().unwrap_or_else(|| UNAVAILABLE.to_string()).into())
}

fn print_tasks(tasks: &[Task]) {
    for task in tasks {
        println!(
            "- [{}] #{} {} ({} - {}) {}",
            if task.completed { "x" } else { " " },
            task.id,
            task.title,
            task.start,
            task.end,
            task.description
        );
    }
}

fn run_tui(planner: &mut Planner, config: &config::Config) -> Result<(), Box<dyn Error>> {
    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = ui::run_app(&mut terminal, planner, config.refresh_interval());

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("{:?}", err);
    }
    Ok(())
}
