use crate::error::StoreError;
use crate::identity::Principal;
use crate::queue::{Command, CommandKind, Outcome, TaskQueue};
use crate::tasks::{Task, TaskRepo, format_date, today};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    All,
    Today,
    Leftover,
}

impl TaskFilter {
    pub fn all() -> [TaskFilter; 3] {
        [TaskFilter::All, TaskFilter::Today, TaskFilter::Leftover]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "All",
            TaskFilter::Today => "Today",
            TaskFilter::Leftover => "Leftover",
        }
    }

    pub fn next(self) -> TaskFilter {
        match self {
            TaskFilter::All => TaskFilter::Today,
            TaskFilter::Today => TaskFilter::Leftover,
            TaskFilter::Leftover => TaskFilter::All,
        }
    }
}

/// A store failure reported back to the UI.
#[derive(Debug)]
pub struct Failure {
    pub kind: CommandKind,
    pub error: StoreError,
}

impl Failure {
    pub fn message(&self) -> String {
        format!("Failed to {}: {}", self.kind.verb(), self.error)
    }
}

/// Tasks that survive the visibility flag and the filter, in list order.
/// Hidden completed tasks are dropped before the filter applies.
pub fn visible_tasks<'a>(
    tasks: &'a [Task],
    filter: TaskFilter,
    show_completed: bool,
    today: &str,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| show_completed || !task.done)
        .filter(|task| match filter {
            TaskFilter::All => true,
            TaskFilter::Today => task.date == today,
            TaskFilter::Leftover => !task.done,
        })
        .collect()
}

/// State behind the task list screen for one signed-in principal.
pub struct TaskListController {
    principal: Principal,
    queue: TaskQueue,
    tasks: Vec<Task>,
    filter: TaskFilter,
    show_completed: bool,
    pending_delete: Option<String>,
    /// Target `done` of toggles still in the queue, by task id.
    queued_toggles: HashMap<String, bool>,
    /// Ids with a delete still in the queue.
    queued_deletes: HashSet<String>,
    /// Commands the worker never received.
    undelivered: Vec<Failure>,
    loaded: bool,
}

impl TaskListController {
    pub fn new(principal: Principal, repo: TaskRepo) -> Self {
        let queue = TaskQueue::spawn(repo, principal.clone());
        Self {
            principal,
            queue,
            tasks: Vec::new(),
            filter: TaskFilter::All,
            show_completed: true,
            pending_delete: None,
            queued_toggles: HashMap::new(),
            queued_deletes: HashSet::new(),
            undelivered: Vec::new(),
            loaded: false,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn show_completed(&self) -> bool {
        self.show_completed
    }

    pub fn is_busy(&self) -> bool {
        self.queue.in_flight() > 0
    }

    /// True once any read has landed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn pending_delete(&self) -> Option<&str> {
        self.pending_delete.as_deref()
    }

    /// True while a confirmed delete of `id` has not answered yet.
    pub fn is_deleting(&self, id: &str) -> bool {
        self.queued_deletes.contains(id)
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
    }

    pub fn set_show_completed(&mut self, show: bool) {
        self.show_completed = show;
    }

    pub fn refresh(&mut self) {
        self.dispatch(Command::Refresh);
    }

    /// Returns `false` without touching the store when the title is blank.
    pub fn add_task(&mut self, title: &str, date: Option<NaiveDate>) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        self.dispatch(Command::Add {
            title: title.to_string(),
            date,
        });
        true
    }

    /// Flips `done` for a known task. Returns `false` for unknown ids and
    /// for tasks with a delete queued.
    pub fn toggle_task(&mut self, id: &str) -> bool {
        if self.is_deleting(id) {
            return false;
        }
        let current = match self.queued_toggles.get(id) {
            Some(queued) => *queued,
            None => match self.task(id) {
                Some(task) => task.done,
                None => return false,
            },
        };
        let done = !current;
        self.queued_toggles.insert(id.to_string(), done);
        self.dispatch(Command::Toggle {
            id: id.to_string(),
            done,
        });
        true
    }

    /// Arms the delete confirmation. Nothing is sent until `confirm_delete`.
    pub fn request_delete(&mut self, id: &str) -> bool {
        if self.task(id).is_none() || self.is_deleting(id) {
            return false;
        }
        self.pending_delete = Some(id.to_string());
        true
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn confirm_delete(&mut self) -> bool {
        let Some(id) = self.pending_delete.take() else {
            return false;
        };
        self.queued_deletes.insert(id.clone());
        self.dispatch(Command::Delete { id });
        true
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.visible_tasks_on(today())
    }

    pub fn visible_tasks_on(&self, day: NaiveDate) -> Vec<&Task> {
        visible_tasks(&self.tasks, self.filter, self.show_completed, &format_date(day))
    }

    /// Applies every outcome that has arrived and returns the failures.
    pub fn poll(&mut self) -> Vec<Failure> {
        let mut failures = Vec::new();
        while let Some(outcome) = self.queue.try_next() {
            if let Some(failure) = self.apply(outcome) {
                failures.push(failure);
            }
        }
        failures.append(&mut self.undelivered);
        failures
    }

    /// Waits until every queued command has answered.
    pub fn settle(&mut self) -> Vec<Failure> {
        let mut failures = Vec::new();
        while let Some(outcome) = self.queue.wait_next() {
            if let Some(failure) = self.apply(outcome) {
                failures.push(failure);
            }
        }
        failures.append(&mut self.undelivered);
        failures
    }

    fn dispatch(&mut self, command: Command) {
        info!("event=command_queued module=controller kind={:?}", command.kind());
        if let Some(outcome) = self.queue.submit(command)
            && let Some(failure) = self.apply(outcome)
        {
            self.undelivered.push(failure);
        }
    }

    fn apply(&mut self, outcome: Outcome) -> Option<Failure> {
        let failure = match outcome {
            Outcome::Loaded { tasks, .. } => {
                self.tasks = tasks;
                self.loaded = true;
                None
            }
            Outcome::Failed {
                kind,
                rejected,
                error,
            } => {
                if let Some(id) = rejected {
                    match kind {
                        CommandKind::Toggle => {
                            self.queued_toggles.remove(&id);
                        }
                        CommandKind::Delete => {
                            self.queued_deletes.remove(&id);
                        }
                        CommandKind::Refresh | CommandKind::Add => {}
                    }
                }
                Some(Failure { kind, error })
            }
        };

        if self.queue.in_flight() == 0 {
            self.queued_toggles.clear();
            self.queued_deletes.clear();
        }
        if let Some(id) = self.pending_delete.as_deref()
            && self.task(id).is_none()
        {
            self.pending_delete = None;
        }
        failure
    }
}
