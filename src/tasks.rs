use crate::error::StoreError;
use crate::identity::Principal;
use crate::store::TreeStore;
use chrono::{Local, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const TASKS_ROOT: &str = "todos";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub done: bool,
}

/// Stored shape of a task node. The node key is the task id.
#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
struct TaskRecord {
    title: String,
    done: bool,
    date: String,
}

/// Store path segment for a principal. Database keys may not contain `.`.
pub fn partition_key(principal: &Principal) -> String {
    principal.email().replace('.', ",")
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Task access for one tree store, keyed by principal.
pub struct TaskRepo {
    store: Box<dyn TreeStore>,
}

impl TaskRepo {
    pub fn new(store: Box<dyn TreeStore>) -> Self {
        Self { store }
    }

    pub fn list(&self, principal: &Principal) -> Result<Vec<Task>, StoreError> {
        let key = partition_key(principal);
        let Some(tree) = self.store.read(&partition_path(&key))? else {
            info!("event=tasks_listed module=tasks partition={key} count=0 exists=false");
            return Ok(Vec::new());
        };

        let Value::Object(children) = tree else {
            warn!("event=partition_malformed module=tasks partition={key}");
            return Ok(Vec::new());
        };

        let mut tasks = Vec::with_capacity(children.len());
        for (id, node) in children {
            if !node.is_object() {
                warn!("event=task_skipped module=tasks partition={key} id={id} reason=not_object");
                continue;
            }
            let record: TaskRecord = match serde_json::from_value(node) {
                Ok(record) => record,
                Err(err) => {
                    warn!("event=task_skipped module=tasks partition={key} id={id} reason={err}");
                    continue;
                }
            };
            tasks.push(Task {
                id,
                title: record.title,
                date: record.date,
                done: record.done,
            });
        }

        info!(
            "event=tasks_listed module=tasks partition={key} count={}",
            tasks.len()
        );
        Ok(tasks)
    }

    /// Creates an open task dated `date`, or today when `None`. Returns the new id.
    pub fn add(
        &self,
        principal: &Principal,
        title: &str,
        date: Option<NaiveDate>,
    ) -> Result<String, StoreError> {
        let key = partition_key(principal);
        let record = TaskRecord {
            title: title.to_string(),
            done: false,
            date: format_date(date.unwrap_or_else(today)),
        };
        let id = self
            .store
            .push(&partition_path(&key), &serde_json::to_value(&record)?)?;
        info!("event=task_added module=tasks partition={key} id={id}");
        Ok(id)
    }

    pub fn toggle(&self, principal: &Principal, id: &str, done: bool) -> Result<(), StoreError> {
        let key = partition_key(principal);
        let mut fields = Map::new();
        fields.insert("done".to_string(), Value::Bool(done));
        self.store.update(&task_path(&key, id), &fields)?;
        info!("event=task_toggled module=tasks partition={key} id={id} done={done}");
        Ok(())
    }

    pub fn delete(&self, principal: &Principal, id: &str) -> Result<(), StoreError> {
        let key = partition_key(principal);
        self.store.remove(&task_path(&key, id))?;
        info!("event=task_deleted module=tasks partition={key} id={id}");
        Ok(())
    }
}

fn partition_path(key: &str) -> String {
    format!("{TASKS_ROOT}/{key}")
}

fn task_path(key: &str, id: &str) -> String {
    format!("{TASKS_ROOT}/{key}/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn repo() -> (TaskRepo, MemoryStore) {
        let store = MemoryStore::new();
        (TaskRepo::new(Box::new(store.clone())), store)
    }

    #[test]
    fn partition_key_replaces_every_dot() {
        let principal = Principal::new("first.last@mail.example.com");
        assert_eq!(partition_key(&principal), "first,last@mail,example,com");
        assert_eq!(partition_key(&principal), partition_key(&principal.clone()));
    }

    #[test]
    fn list_of_missing_partition_is_empty() {
        let (repo, _) = repo();
        let tasks = repo.list(&Principal::new("nobody@x.io")).expect("list");
        assert!(tasks.is_empty());
    }

    #[test]
    fn add_defaults_to_open_task_dated_today() {
        let (repo, _) = repo();
        let principal = Principal::new("a.b@example.com");
        let id = repo.add(&principal, "Buy milk", None).expect("add");

        let tasks = repo.list(&principal).expect("list");
        assert_eq!(
            tasks,
            vec![Task {
                id,
                title: "Buy milk".to_string(),
                date: format_date(today()),
                done: false,
            }]
        );
    }

    #[test]
    fn add_writes_under_normalized_partition() {
        let (repo, store) = repo();
        let principal = Principal::new("a.b@example.com");
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let id = repo.add(&principal, "Call", Some(date)).expect("add");

        let node = store
            .read(&format!("todos/a,b@example,com/{id}"))
            .expect("read")
            .expect("stored");
        assert_eq!(node, json!({"title": "Call", "done": false, "date": "2024-03-09"}));
    }

    #[test]
    fn toggle_updates_only_done() {
        let (repo, _) = repo();
        let principal = Principal::new("p@x.io");
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let id = repo.add(&principal, "A", Some(date)).expect("add");

        repo.toggle(&principal, &id, true).expect("toggle");
        let task = repo.list(&principal).expect("list").remove(0);
        assert!(task.done);
        assert_eq!(task.title, "A");
        assert_eq!(task.date, "2024-01-01");
    }

    #[test]
    fn delete_removes_task_and_missing_id_is_noop() {
        let (repo, _) = repo();
        let principal = Principal::new("p@x.io");
        let keep = repo.add(&principal, "keep", None).expect("add");
        let gone = repo.add(&principal, "gone", None).expect("add");

        repo.delete(&principal, &gone).expect("delete");
        repo.delete(&principal, "-does-not-exist").expect("delete missing");

        let ids: Vec<String> = repo
            .list(&principal)
            .expect("list")
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![keep]);
    }

    #[test]
    fn partitions_are_isolated() {
        let (repo, _) = repo();
        let alice = Principal::new("alice@x.io");
        let bob = Principal::new("bob@x.io");
        repo.add(&alice, "mine", None).expect("add");

        assert!(repo.list(&bob).expect("list").is_empty());
        assert_eq!(repo.list(&alice).expect("list").len(), 1);
    }

    #[test]
    fn list_tolerates_partial_and_scalar_children() {
        let (repo, store) = repo();
        let principal = Principal::new("p@x.io");
        let mut fields = Map::new();
        fields.insert("-a".to_string(), json!({"title": "only title"}));
        fields.insert("-b".to_string(), json!(42));
        store.update("todos/p@x,io", &fields).expect("seed");

        let tasks = repo.list(&principal).expect("list");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "-a");
        assert!(!tasks[0].done);
        assert_eq!(tasks[0].date, "");
    }

    #[test]
    fn list_skips_children_with_mistyped_fields() {
        let (repo, store) = repo();
        let principal = Principal::new("p@x.io");
        let mut fields = Map::new();
        fields.insert("-a".to_string(), json!({"title": "fine", "done": true}));
        fields.insert("-b".to_string(), json!({"title": "odd", "done": "yes"}));
        store.update("todos/p@x,io", &fields).expect("seed");

        let tasks = repo.list(&principal).expect("list");
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].done);
    }
}
