use crate::error::Result;
use crate::expiry::{self, Partition};
use crate::goal::{Goal, GoalBook};
use crate::kv::KeyValueStore;
use crate::note::Note;
use crate::store::Store;
use crate::task::{Task, TaskDraft};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::rc::Rc;
use tracing::{debug, warn};

pub const UNAVAILABLE: &str = "Database unavailable, changes are not saved";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Tasks,
    History,
    Notes,
    Targets,
}

impl View {
    pub const ALL: [View; 4] = [View::Tasks, View::History, View::Notes, View::Targets];

    pub fn title(self) -> &'static str {
        match self {
            View::Tasks => "TASKS",
            View::History => "HISTORY",
            View::Notes => "NOTES",
            View::Targets => "TARGETS",
        }
    }
}

/// One session over the task/note store and the goal list.
///
/// When the store fails to open the planner keeps running without it: reads
/// come back empty and every task or note change is dropped with a status
/// message. Goals are unaffected.
#[derive(Debug)]
pub struct Planner {
    store: Option<Store>,
    goals: GoalBook,
    default_end: String,
    pub tasks: Partition,
    pub notes: Vec<Note>,
    pub status: Option<String>,
    pub view: View,
    pub selected: usize,
}

impl Planner {
    pub fn open(kv: Rc<dyn KeyValueStore>, default_end: &str) -> Result<Self> {
        let (store, status) = match Store::open(kv.clone()) {
            Ok(store) => (Some(store), None),
            Err(err) => {
                warn!(%err, "database init failed");
                (None, Some(format!("{UNAVAILABLE}: {err}")))
            }
        };
        Ok(Self {
            store,
            goals: GoalBook::load(kv)?,
            default_end: default_end.to_string(),
            tasks: Partition::default(),
            notes: Vec::new(),
            status,
            view: View::default(),
            selected: 0,
        })
    }

    /// The message for the status bar: the last outcome, else whether
    /// changes are being saved.
    pub fn status_line(&self) -> &str {
        match &self.status {
            Some(status) => status,
            None if self.store.is_none() => UNAVAILABLE,
            None => "Ready",
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// Re-reads both tables and re-partitions tasks against `now`.
    pub fn refresh(&mut self, now: NaiveDateTime) -> Result<()> {
        let (tasks, notes) = match &self.store {
            Some(store) => (store.list_tasks()?, store.list_notes()?),
            None => (Vec::new(), Vec::new()),
        };
        self.tasks = expiry::partition(tasks, now);
        self.notes = notes;
        debug!(
            active = self.tasks.active.len(),
            history = self.tasks.history.len(),
            notes = self.notes.len(),
            "refreshed"
        );
        self.clamp_selection();
        Ok(())
    }

    fn mutate<T>(
        &mut self,
        now: NaiveDateTime,
        op: impl FnOnce(&mut Store) -> Result<T>,
    ) -> Result<Option<T>> {
        let Some(store) = self.store.as_mut() else {
            warn!("store unavailable, change dropped");
            self.status = Some(UNAVAILABLE.to_string());
            return Ok(None);
        };
        let out = op(store)?;
        self.status = None;
        self.refresh(now)?;
        Ok(Some(out))
    }

    pub fn add_task(&mut self, draft: &TaskDraft, now: NaiveDateTime) -> Result<Option<Task>> {
        let task = draft.resolve(now, &self.default_end)?;
        self.mutate(now, |store| store.add_task(&task))
    }

    pub fn toggle_task(&mut self, id: i64, now: NaiveDateTime) -> Result<Option<bool>> {
        self.mutate(now, |store| store.toggle_task(id))
    }

    pub fn delete_task(&mut self, id: i64, now: NaiveDateTime) -> Result<Option<()>> {
        self.mutate(now, |store| store.delete_task(id))
    }

    /// Deletes every task currently in history.
    pub fn clear_history(&mut self, now: NaiveDateTime) -> Result<Option<usize>> {
        self.refresh(now)?;
        let ids: Vec<i64> = self.tasks.history.iter().map(|t| t.id).collect();
        self.mutate(now, |store| store.delete_tasks(&ids))
    }

    pub fn add_note(&mut self, content: &str, now: NaiveDateTime) -> Result<Option<Note>> {
        self.mutate(now, |store| store.add_note(content))
    }

    pub fn update_note(&mut self, id: i64, content: &str, now: NaiveDateTime) -> Result<Option<Note>> {
        self.mutate(now, |store| store.update_note(id, content))
    }

    pub fn delete_note(&mut self, id: i64, now: NaiveDateTime) -> Result<Option<()>> {
        self.mutate(now, |store| store.delete_note(id))
    }

    pub fn goals(&self) -> &[Goal] {
        self.goals.goals()
    }

    pub fn add_goal(&mut self, title: &str, day: NaiveDate, now: DateTime<Utc>) -> Result<()> {
        let goal = Goal::new(title, day, now)?;
        self.goals.add(goal)?;
        self.status = None;
        Ok(())
    }

    pub fn remove_goal(&mut self, index: usize) -> Result<Goal> {
        let goal = self.goals.remove(index)?;
        self.status = None;
        self.clamp_selection();
        Ok(goal)
    }

    pub fn active_label(&self) -> String {
        format!("{} Active", self.tasks.active.len())
    }

    pub fn history_label(&self) -> String {
        format!("{} Records", self.tasks.history.len())
    }

    fn rows_in_view(&self) -> usize {
        match self.view {
            View::Tasks => self.tasks.active.len(),
            View::History => self.tasks.history.len(),
            View::Notes => self.notes.len(),
            View::Targets => self.goals().len(),
        }
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.rows_in_view().saturating_sub(1));
    }

    pub fn switch_view(&mut self, direction: isize) {
        let current = View::ALL.iter().position(|v| *v == self.view).unwrap_or(0) as isize;
        let next = (current + direction).rem_euclid(View::ALL.len() as isize) as usize;
        self.view = View::ALL[next];
        self.selected = 0;
    }

    pub fn move_selection(&mut self, direction: isize) {
        let max = self.rows_in_view().saturating_sub(1) as isize;
        self.selected = (self.selected as isize + direction).clamp(0, max) as usize;
    }

    pub fn selected_task(&self) -> Option<&Task> {
        match self.view {
            View::Tasks => self.tasks.active.get(self.selected),
            View::History => self.tasks.history.get(self.selected),
            _ => None,
        }
    }

    pub fn selected_note(&self) -> Option<&Note> {
        match self.view {
            View::Notes => self.notes.get(self.selected),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::store::DB_KEY;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn draft(title: &str, end: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            start: "08:00".to_string(),
            end: end.to_string(),
            ..Default::default()
        }
    }

    fn planner() -> Planner {
        Planner::open(Rc::new(MemoryStore::new()), "23:59").unwrap()
    }

    #[test]
    fn tasks_move_to_history_as_time_passes() {
        let mut p = planner();
        p.add_task(&draft("morning", "09:00"), at(8, 0)).unwrap();
        p.add_task(&draft("evening", "18:00"), at(8, 0)).unwrap();
        assert_eq!(p.active_label(), "2 Active");
        assert_eq!(p.history_label(), "0 Records");

        p.refresh(at(9, 1)).unwrap();
        assert_eq!(p.tasks.active[0].title, "evening");
        assert_eq!(p.tasks.history[0].title, "morning");
        assert_eq!(p.history_label(), "1 Records");
    }

    #[test]
    fn toggling_does_not_move_tasks() {
        let mut p = planner();
        let task = p.add_task(&draft("chart", "18:00"), at(8, 0)).unwrap().unwrap();
        assert_eq!(p.toggle_task(task.id, at(8, 5)).unwrap(), Some(true));
        assert_eq!(p.tasks.active.len(), 1);
        assert!(p.tasks.active[0].completed);
    }

    #[test]
    fn clear_history_removes_only_expired() {
        let mut p = planner();
        p.add_task(&draft("done", "09:00"), at(8, 0)).unwrap();
        p.add_task(&draft("pending", "18:00"), at(8, 0)).unwrap();
        assert_eq!(p.clear_history(at(12, 0)).unwrap(), Some(1));
        assert!(p.tasks.history.is_empty());
        assert_eq!(p.tasks.active.len(), 1);
    }

    #[test]
    fn notes_newest_first() {
        let mut p = planner();
        let first = p.add_note("first", at(8, 0)).unwrap().unwrap();
        p.add_note("second", at(8, 0)).unwrap();
        assert_eq!(p.notes[0].content, "second");
        p.update_note(first.id, "first, edited", at(8, 0)).unwrap();
        assert_eq!(p.notes.len(), 2);
        p.delete_note(first.id, at(8, 0)).unwrap();
        assert_eq!(p.notes.len(), 1);
    }

    #[test]
    fn unavailable_store_turns_mutations_into_noops() {
        let kv = Rc::new(MemoryStore::new());
        kv.set(DB_KEY, "!!corrupt!!").unwrap();
        let mut p = Planner::open(kv.clone(), "23:59").unwrap();
        assert!(!p.is_available());
        assert!(p.status.as_deref().unwrap().starts_with(UNAVAILABLE));

        p.status = None;
        assert_eq!(p.add_task(&draft("lost", "09:00"), at(8, 0)).unwrap(), None);
        assert_eq!(p.add_note("lost", at(8, 0)).unwrap(), None);
        assert_eq!(p.toggle_task(1, at(8, 0)).unwrap(), None);
        assert_eq!(p.status.as_deref(), Some(UNAVAILABLE));
        p.refresh(at(8, 0)).unwrap();
        assert!(p.tasks.active.is_empty());
        // The broken image is left alone.
        assert_eq!(kv.get(DB_KEY).unwrap().as_deref(), Some("!!corrupt!!"));

        // Goals do not depend on the database.
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap();
        p.add_goal("Run 10k", NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(), now).unwrap();
        assert_eq!(p.goals().len(), 1);
    }

    #[test]
    fn successful_change_clears_stale_status() {
        let mut p = planner();
        p.status = Some("sqlite: disk I/O error".to_string());
        assert_eq!(p.status_line(), "sqlite: disk I/O error");
        p.add_note("vitals at 6", at(8, 0)).unwrap();
        assert_eq!(p.status, None);
        assert_eq!(p.status_line(), "Ready");
    }

    #[test]
    fn unavailable_store_keeps_status_line_after_clearing() {
        let kv = Rc::new(MemoryStore::new());
        kv.set(DB_KEY, "!!corrupt!!").unwrap();
        let mut p = Planner::open(kv, "23:59").unwrap();
        p.status = None;
        assert_eq!(p.status_line(), UNAVAILABLE);
    }

    #[test]
    fn invalid_draft_is_an_error() {
        let mut p = planner();
        assert!(p.add_task(&draft("  ", "09:00"), at(8, 0)).is_err());
    }

    #[test]
    fn selection_wraps_views_and_clamps_rows() {
        let mut p = planner();
        p.add_task(&draft("a", "18:00"), at(8, 0)).unwrap();
        p.add_task(&draft("b", "18:00"), at(8, 0)).unwrap();
        p.move_selection(5);
        assert_eq!(p.selected, 1);
        assert_eq!(p.selected_task().unwrap().title, "b");
        p.move_selection(-9);
        assert_eq!(p.selected, 0);

        p.switch_view(-1);
        assert_eq!(p.view, View::Targets);
        p.switch_view(1);
        assert_eq!(p.view, View::Tasks);

        p.selected = 1;
        let id = p.selected_task().unwrap().id;
        p.delete_task(id, at(8, 0)).unwrap();
        assert_eq!(p.selected, 0);
    }
}
