//! In-memory [`Cluster`] with failure injection

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::cluster::{Cluster, ResourceStore};
use crate::{Error, Result};

pub const CREATED_AT: &str = "2026-01-01T00:00:00Z";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    Create,
    Get,
    Delete,
    List,
}

type Key = (String, String);

/// Objects are kept as JSON keyed by `(kind, name)`
#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<BTreeMap<Key, Value>>,
    failures: Mutex<BTreeSet<(String, Op)>>,
    deletes: Mutex<Vec<Key>>,
}

fn kind<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).into_owned()
}

#[allow(clippy::unwrap_used)]
impl FakeCluster {
    /// Makes every `op` on `K` fail with a timeout
    pub fn fail<K: Resource<DynamicType = ()>>(&self, op: Op) {
        self.failures.lock().unwrap().insert((kind::<K>(), op));
    }

    pub fn insert<K: Resource<DynamicType = ()> + Serialize>(&self, object: &K) {
        let mut value = serde_json::to_value(object).unwrap();
        value["metadata"]["creationTimestamp"] = json!(CREATED_AT);
        self.objects
            .lock()
            .unwrap()
            .insert((kind::<K>(), object.name_any()), value);
    }

    pub fn contains<K: Resource<DynamicType = ()>>(&self, name: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(kind::<K>(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Every delete attempt, successful or not, in call order
    pub fn deletes(&self) -> Vec<Key> {
        self.deletes.lock().unwrap().clone()
    }

    fn check(&self, kind: &str, op: Op) -> Result<()> {
        if self.failures.lock().unwrap().contains(&(kind.to_string(), op)) {
            let operation = match op {
                Op::Create => "create",
                Op::Get => "get",
                Op::Delete => "delete",
                Op::List => "list",
            };
            return Err(Error::Timeout {
                kind: kind.to_string(),
                operation,
            });
        }
        Ok(())
    }

    fn create_value(&self, kind: String, name: String, mut value: Value) -> Result<Value> {
        self.check(&kind, Op::Create)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (kind, name);
        if objects.contains_key(&key) {
            let (kind, name) = key;
            return Err(Error::Conflict { kind, name });
        }
        value["metadata"]["creationTimestamp"] = json!(CREATED_AT);
        objects.insert(key, value.clone());
        Ok(value)
    }

    fn get_value(&self, kind: String, name: &str) -> Result<Value> {
        self.check(&kind, Op::Get)?;
        let key = (kind, name.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or(Error::NotFound {
                kind: key.0,
                name: key.1,
            })
    }

    fn delete_value(&self, kind: String, name: &str) -> Result<()> {
        let key = (kind, name.to_string());
        self.deletes.lock().unwrap().push(key.clone());
        self.check(&key.0, Op::Delete)?;
        match self.objects.lock().unwrap().remove(&key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound {
                kind: key.0,
                name: key.1,
            }),
        }
    }

    fn list_values(&self, kind: &str, selector: &str) -> Result<Vec<Value>> {
        self.check(kind, Op::List)?;
        let (label, expected) = selector.split_once('=').unwrap_or((selector, ""));
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, _), value)| {
                k == kind && value["metadata"]["labels"][label].as_str() == Some(expected)
            })
            .map(|(_, value)| value.clone())
            .collect())
    }
}

impl<K> ResourceStore<K> for FakeCluster
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Send + Sync,
{
    async fn create(&self, object: &K) -> Result<K> {
        let value = self.create_value(kind::<K>(), object.name_any(), serde_json::to_value(object)?)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get(&self, name: &str) -> Result<K> {
        Ok(serde_json::from_value(self.get_value(kind::<K>(), name)?)?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.delete_value(kind::<K>(), name)
    }

    async fn list(&self, label_selector: &str) -> Result<Vec<K>> {
        self.list_values(&kind::<K>(), label_selector)?
            .into_iter()
            .map(|value| -> Result<K> { Ok(serde_json::from_value(value)?) })
            .collect()
    }
}

impl Cluster for FakeCluster {
    fn namespace(&self) -> &str {
        "apps"
    }
}
