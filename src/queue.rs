//! Per-principal command worker.
//!
//! All store traffic for a signed-in user goes through one thread that takes
//! commands in submission order, so a mutation and the read that follows it
//! never interleave with another mutation.

use crate::error::StoreError;
use crate::identity::Principal;
use crate::tasks::{Task, TaskRepo};
use chrono::NaiveDate;
use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Add {
        title: String,
        date: Option<NaiveDate>,
    },
    Toggle {
        id: String,
        done: bool,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Refresh,
    Add,
    Toggle,
    Delete,
}

impl CommandKind {
    pub fn verb(&self) -> &'static str {
        match self {
            CommandKind::Refresh => "load tasks",
            CommandKind::Add => "add task",
            CommandKind::Toggle => "update task",
            CommandKind::Delete => "delete task",
        }
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Refresh => CommandKind::Refresh,
            Command::Add { .. } => CommandKind::Add,
            Command::Toggle { .. } => CommandKind::Toggle,
            Command::Delete { .. } => CommandKind::Delete,
        }
    }

    /// Task id a toggle or delete acts on.
    pub fn target(&self) -> Option<&str> {
        match self {
            Command::Toggle { id, .. } | Command::Delete { id } => Some(id),
            Command::Refresh | Command::Add { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// The command succeeded and this is the partition as read right after it.
    Loaded { kind: CommandKind, tasks: Vec<Task> },
    /// `rejected` names the task whose mutation was not applied. It is `None`
    /// when only the follow-up read failed.
    Failed {
        kind: CommandKind,
        rejected: Option<String>,
        error: StoreError,
    },
}

pub struct TaskQueue {
    commands: Sender<Command>,
    outcomes: Receiver<Outcome>,
    in_flight: usize,
}

impl TaskQueue {
    pub fn spawn(repo: TaskRepo, principal: Principal) -> Self {
        let (command_tx, command_rx) = mpsc::channel::<Command>();
        let (outcome_tx, outcome_rx) = mpsc::channel();

        thread::spawn(move || {
            for command in command_rx {
                let outcome = execute(&repo, &principal, command);
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
            debug!("event=worker_stopped module=queue");
        });

        Self {
            commands: command_tx,
            outcomes: outcome_rx,
            in_flight: 0,
        }
    }

    /// Queues a command. When the worker is gone the failure comes back as
    /// an outcome instead.
    pub fn submit(&mut self, command: Command) -> Option<Outcome> {
        let kind = command.kind();
        let rejected = command.target().map(str::to_string);
        match self.commands.send(command) {
            Ok(()) => {
                self.in_flight += 1;
                None
            }
            Err(_) => Some(Outcome::Failed {
                kind,
                rejected,
                error: StoreError::WorkerStopped,
            }),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn try_next(&mut self) -> Option<Outcome> {
        if self.in_flight == 0 {
            return None;
        }
        match self.outcomes.try_recv() {
            Ok(outcome) => {
                self.in_flight -= 1;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.worker_lost()),
        }
    }

    /// Blocks for the next outcome. `None` when nothing is in flight.
    pub fn wait_next(&mut self) -> Option<Outcome> {
        if self.in_flight == 0 {
            return None;
        }
        match self.outcomes.recv() {
            Ok(outcome) => {
                self.in_flight -= 1;
                Some(outcome)
            }
            Err(_) => Some(self.worker_lost()),
        }
    }

    fn worker_lost(&mut self) -> Outcome {
        warn!(
            "event=worker_lost module=queue in_flight={}",
            self.in_flight
        );
        self.in_flight = 0;
        Outcome::Failed {
            kind: CommandKind::Refresh,
            rejected: None,
            error: StoreError::WorkerStopped,
        }
    }
}

fn execute(repo: &TaskRepo, principal: &Principal, command: Command) -> Outcome {
    let kind = command.kind();
    let target = command.target().map(str::to_string);
    let mutation = match command {
        Command::Refresh => Ok(()),
        Command::Add { title, date } => repo.add(principal, &title, date).map(|_| ()),
        Command::Toggle { id, done } => repo.toggle(principal, &id, done),
        Command::Delete { id } => repo.delete(principal, &id),
    };

    if let Err(error) = mutation {
        warn!("event=command_failed module=queue kind={kind:?} stage=mutation error={error}");
        return Outcome::Failed {
            kind,
            rejected: target,
            error,
        };
    }
    match repo.list(principal) {
        Ok(tasks) => Outcome::Loaded { kind, tasks },
        Err(error) => {
            warn!("event=command_failed module=queue kind={kind:?} stage=list error={error}");
            Outcome::Failed {
                kind,
                rejected: None,
                error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn queue() -> TaskQueue {
        TaskQueue::spawn(
            TaskRepo::new(Box::new(MemoryStore::new())),
            Principal::new("q@x.io"),
        )
    }

    #[test]
    fn outcomes_arrive_in_submission_order() {
        let mut queue = queue();
        assert!(queue.submit(Command::Add { title: "one".to_string(), date: None }).is_none());
        assert!(queue.submit(Command::Add { title: "two".to_string(), date: None }).is_none());
        assert!(queue.submit(Command::Refresh).is_none());
        assert_eq!(queue.in_flight(), 3);

        let counts: Vec<(CommandKind, usize)> = std::iter::from_fn(|| queue.wait_next())
            .map(|outcome| match outcome {
                Outcome::Loaded { kind, tasks } => (kind, tasks.len()),
                Outcome::Failed { error, .. } => panic!("unexpected failure: {error}"),
            })
            .collect();
        assert_eq!(
            counts,
            vec![
                (CommandKind::Add, 1),
                (CommandKind::Add, 2),
                (CommandKind::Refresh, 2)
            ]
        );
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.try_next().is_none());
    }
}
