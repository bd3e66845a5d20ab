use super::{TreeStore, split_path};
use crate::error::StoreError;
use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// In-process JSON tree. Clones share the same tree.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    root: Map<String, Value>,
    ids: PushIdGenerator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TreeStore for MemoryStore {
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = split_path(path)?;
        let inner = self.lock();
        let mut node = inner.root.get(segments[0]);
        for segment in &segments[1..] {
            node = node.and_then(|value| value.get(*segment));
        }
        Ok(match node {
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(Value::Null) | None => None,
            Some(value) => Some(value.clone()),
        })
    }

    fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.lock();
        let id = inner.ids.next(Utc::now().timestamp_millis());
        let parent = object_at_mut(&mut inner.root, &segments);
        parent.insert(id.clone(), value.clone());
        Ok(id)
    }

    fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.lock();
        let node = object_at_mut(&mut inner.root, &segments);
        for (key, value) in fields {
            node.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let mut inner = self.lock();
        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };
        let mut node = &mut inner.root;
        for segment in parents {
            match node.get_mut(*segment) {
                Some(Value::Object(child)) => node = child,
                _ => return Ok(()),
            }
        }
        node.remove(*last);
        Ok(())
    }
}

/// Walks to the object at `segments`, creating objects along the way and
/// replacing scalars, which is how the database treats writes below a leaf.
fn object_at_mut<'a>(root: &'a mut Map<String, Value>, segments: &[&str]) -> &'a mut Map<String, Value> {
    let mut node = root;
    for segment in segments {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just made an object"),
        };
    }
    node
}

/// Firebase-style push ids: 8 chars of millisecond timestamp followed by 12
/// random chars. Within one millisecond the random tail is incremented, so ids
/// from one generator are strictly increasing.
#[derive(Default)]
pub(crate) struct PushIdGenerator {
    last_millis: i64,
    last_random: [u8; 12],
}

impl PushIdGenerator {
    pub(crate) fn next(&mut self, now_millis: i64) -> String {
        if now_millis == self.last_millis {
            for slot in self.last_random.iter_mut().rev() {
                if *slot == 63 {
                    *slot = 0;
                } else {
                    *slot += 1;
                    break;
                }
            }
        } else {
            self.last_millis = now_millis;
            let mut rng = rand::thread_rng();
            for slot in self.last_random.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
        }

        let mut id = String::with_capacity(20);
        let mut stamp = [0u8; 8];
        let mut remaining = now_millis.max(0);
        for slot in stamp.iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }
        id.extend(stamp.iter().map(|b| *b as char));
        id.extend(self.last_random.iter().map(|i| PUSH_CHARS[*i as usize] as char));
        id
    }
}
