use crate::error::Result;
use crate::goal::Goal;
use crate::planner::{Planner, View};
use crate::task::{Task, TaskDraft, DATE_FORMAT};
use chrono::{DateTime, Local, NaiveDate, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::{
    io,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

const HELP: &str =
    "q quit | tab/arrows switch view | up/down select | a add | space toggle | e edit | d delete | c clear history";

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    planner: &mut Planner,
    refresh_every: Duration,
) -> io::Result<()> {
    let result = planner_refresh(planner);
    report(planner, result);
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| draw(f, planner, Utc::now()))?;

        let timeout = refresh_every.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let needs_redraw = match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Tab | KeyCode::Right => {
                        planner.switch_view(1);
                        false
                    }
                    KeyCode::BackTab | KeyCode::Left => {
                        planner.switch_view(-1);
                        false
                    }
                    KeyCode::Up => {
                        planner.move_selection(-1);
                        false
                    }
                    KeyCode::Down => {
                        planner.move_selection(1);
                        false
                    }
                    KeyCode::Char('a') => {
                        add_in_view(planner);
                        true
                    }
                    KeyCode::Char(' ') | KeyCode::Enter => {
                        if let Some(id) = planner.selected_task().map(|t| t.id) {
                            let result = planner.toggle_task(id, now_local());
                            report(planner, result.map(drop));
                        }
                        false
                    }
                    KeyCode::Char('e') => {
                        edit_selected_note(planner);
                        true
                    }
                    KeyCode::Char('d') => {
                        delete_selected(planner);
                        false
                    }
                    KeyCode::Char('c') if planner.view == View::History => {
                        let result = planner.clear_history(now_local());
                        report(planner, result.map(drop));
                        false
                    }
                    _ => false,
                };
                if needs_redraw {
                    terminal.clear()?;
                }
            }
        }

        if last_tick.elapsed() >= refresh_every {
            debug!("checking for expired tasks");
            planner.status = None;
            let result = planner_refresh(planner);
            report(planner, result);
            last_tick = Instant::now();
        }
    }
}

fn now_local() -> chrono::NaiveDateTime {
    Local::now().naive_local()
}

fn planner_refresh(planner: &mut Planner) -> Result<()> {
    planner.refresh(now_local())
}

/// Turns an operation error into the status line instead of ending the session.
fn report(planner: &mut Planner, result: Result<()>) {
    if let Err(err) = result {
        warn!(%err, "operation failed");
        planner.status = Some(err.to_string());
    }
}

fn add_in_view(planner: &mut Planner) {
    match planner.view {
        View::Tasks | View::History => {
            let Some(title) = prompt("Task title") else { return };
            let Some(start) = prompt("Start time (HH:MM, empty for now)") else { return };
            let Some(end) = prompt("End time (HH:MM, empty for end of day)") else { return };
            let Some(description) = prompt("Description") else { return };
            let draft = TaskDraft { title, start, end, description };
            let result = planner.add_task(&draft, now_local());
            report(planner, result.map(drop));
        }
        View::Notes => {
            let Some(content) = prompt("Note") else { return };
            let result = planner.add_note(&content, now_local());
            if result.as_ref().is_ok_and(Option::is_some) {
                planner.status = Some("Saved Successfully".to_string());
            }
            report(planner, result.map(drop));
        }
        View::Targets => {
            let Some(title) = prompt("Target title") else { return };
            let Some(day) = prompt("Target date (YYYY-MM-DD)") else { return };
            match NaiveDate::parse_from_str(day.trim(), DATE_FORMAT) {
                Ok(day) if !title.trim().is_empty() => {
                    let result = planner.add_goal(&title, day, Utc::now());
                    report(planner, result);
                }
                _ => planner.status = Some("Please enter title and date".to_string()),
            }
        }
    }
}

fn edit_selected_note(planner: &mut Planner) {
    let Some(note) = planner.selected_note().cloned() else { return };
    let answer = prompt(&format!("Edit note, empty to cancel (was: {})", note.content));
    let Some(content) = edited_content(answer) else { return };
    let result = planner.update_note(note.id, &content, now_local());
    report(planner, result.map(drop));
}

/// A blank answer to the edit prompt keeps the note as it is.
fn edited_content(answer: Option<String>) -> Option<String> {
    answer.filter(|content| !content.trim().is_empty())
}

fn delete_selected(planner: &mut Planner) {
    let now = now_local();
    let result = match planner.view {
        View::Tasks | View::History => match planner.selected_task().map(|t| t.id) {
            Some(id) => planner.delete_task(id, now).map(drop),
            None => Ok(()),
        },
        View::Notes => match planner.selected_note().map(|n| n.id) {
            Some(id) if confirm("Delete this note?") => planner.delete_note(id, now).map(drop),
            _ => Ok(()),
        },
        View::Targets => {
            if planner.goals().is_empty() {
                Ok(())
            } else {
                planner.remove_goal(planner.selected).map(drop)
            }
        }
    };
    report(planner, result);
}

fn draw(f: &mut Frame, planner: &Planner, now: DateTime<Utc>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    let tabs: Vec<Span> = View::ALL
        .iter()
        .flat_map(|v| {
            let style = if *v == planner.view {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            [Span::styled(format!(" {} ", v.title()), style), Span::raw("|")]
        })
        .collect();
    f.render_widget(Paragraph::new(Line::from(tabs)), chunks[0]);

    let (title, items) = match planner.view {
        View::Tasks => (planner.active_label(), task_items(&planner.tasks.active)),
        View::History => (planner.history_label(), task_items(&planner.tasks.history)),
        View::Notes => (
            format!("{} Notes", planner.notes.len()),
            planner
                .notes
                .iter()
                .map(|n| {
                    ListItem::new(Line::from(vec![
                        Span::styled(format!("{} ", n.updated_day()), Style::default().fg(Color::DarkGray)),
                        Span::raw(n.content.lines().next().unwrap_or_default().to_string()),
                    ]))
                })
                .collect(),
        ),
        View::Targets => (
            format!("{} Targets", planner.goals().len()),
            planner.goals().iter().map(|g| goal_item(g, now)).collect(),
        ),
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(planner.selected));
    f.render_stateful_widget(list, chunks[1], &mut state);

    f.render_widget(
        Paragraph::new(planner.status_line()).style(Style::default().fg(Color::Yellow)),
        chunks[2],
    );
    f.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}

fn task_items(tasks: &[Task]) -> Vec<ListItem<'_>> {
    tasks
        .iter()
        .map(|t| {
            let title_style = if t.completed {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::raw(if t.completed { "[x] " } else { "[ ] " }),
                Span::styled(&t.title, title_style),
                Span::raw(format!("  {} - {}  ", t.start, t.end)),
                Span::styled(&t.description, Style::default().fg(Color::Gray)),
            ]))
        })
        .collect()
}

fn goal_item(goal: &Goal, now: DateTime<Utc>) -> ListItem<'_> {
    const WIDTH: usize = 20;
    let pct = goal.progress(now);
    let filled = ((pct / 100.0) * WIDTH as f64).round() as usize;
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(WIDTH - filled));
    let start = goal.start_date.with_timezone(&Local).format(DATE_FORMAT);
    let end = goal.end_date.with_timezone(&Local).format(DATE_FORMAT);
    ListItem::new(vec![
        Line::from(vec![
            Span::styled(&goal.title, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("  {}", goal.countdown(now))),
        ]),
        Line::from(format!("[{bar}] {pct:.0}%  Start: {start}  Target: {end}")),
    ])
}

fn prompt(message: &str) -> Option<String> {
    disable_raw_mode().ok();
    println!("{}", message);
    let mut input = String::new();
    let result = io::stdin().read_line(&mut input);
    enable_raw_mode().ok();
    result.ok().map(|_| input.trim().to_string())
}

fn confirm(message: &str) -> bool {
    prompt(&format!("{message} [y/N]")).is_some_and(|answer| answer.eq_ignore_ascii_case("y"))
}
