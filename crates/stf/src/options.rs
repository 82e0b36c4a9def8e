// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-call options bag.
//!
//! Carries two independent stores for one dial/listen call:
//!
//! - a **config tree**: dotted-path writes of serializable values,
//!   staged by [`Options::set_config`] and merged into the readable
//!   tree by [`Options::load`];
//! - an **object side-table**: opaque caller-owned objects (identity
//!   keys, callbacks) that cannot flow through a serialized tree.
//!
//! A bag lives for exactly one call and is not shared across threads
//! during it.

use std::any::Any;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A function option mutating the bag; applied in order by
/// [`crate::dial`] and [`crate::listen`], first error aborts.
pub type TransportOption = Box<dyn FnOnce(&mut Options) -> Result<()> + Send>;

/// Typed configuration plus object side-table for one call.
#[derive(Default)]
pub struct Options {
    staged: Vec<(String, Value)>,
    config: Map<String, Value>,
    objects: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Options {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a config write at the given path.
    ///
    /// Writes become visible to [`Options::get_config`] once
    /// [`Options::load`] merges them.
    pub fn set_config<T: Serialize>(&mut self, value: T, path: &[&str]) -> Result<()> {
        if path.is_empty() {
            return Err(Error::Config("config path must not be empty".to_string()));
        }
        let value = serde_json::to_value(value)
            .map_err(|e| Error::Config(format!("unserializable config value: {}", e)))?;
        self.staged.push((path.join("."), value));
        Ok(())
    }

    /// Merge all staged writes into the config tree.
    ///
    /// Object values merge recursively; anything else replaces the
    /// previous value at its path. Later writes win.
    pub fn load(&mut self) -> Result<()> {
        for (path, value) in std::mem::take(&mut self.staged) {
            let mut node = &mut self.config;
            let mut parts = path.split('.').peekable();
            while let Some(part) = parts.next() {
                if parts.peek().is_none() {
                    merge_into(node, part, value);
                    break;
                }
                let child = node
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !child.is_object() {
                    *child = Value::Object(Map::new());
                }
                node = child
                    .as_object_mut()
                    .expect("child was just made an object");
            }
        }
        Ok(())
    }

    /// Read a typed value from the config tree.
    ///
    /// Returns `Ok(None)` when the path is absent, and a config error
    /// when the value exists but does not decode as `T`.
    pub fn get_config<T: DeserializeOwned>(&self, path: &[&str]) -> Result<Option<T>> {
        if path.is_empty() {
            return Err(Error::Config("config path must not be empty".to_string()));
        }
        let mut current = match self.config.get(path[0]) {
            Some(value) => value,
            None => return Ok(None),
        };
        for part in &path[1..] {
            match current.get(part) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        serde_json::from_value(current.clone())
            .map(Some)
            .map_err(|e| Error::Config(format!("config value at {}: {}", path.join("."), e)))
    }

    /// Store an opaque object at the given path. The table keeps the
    /// box as-is; nothing is copied.
    pub fn set_object(&mut self, obj: Box<dyn Any + Send + Sync>, path: &[&str]) {
        self.objects.insert(path.join("."), obj);
    }

    /// Borrow an object previously stored at the path, downcast to `T`.
    pub fn get_object<T: Any + Send + Sync>(&self, path: &[&str]) -> Option<&T> {
        self.objects
            .get(&path.join("."))
            .and_then(|obj| obj.downcast_ref::<T>())
    }
}

fn merge_into(node: &mut Map<String, Value>, key: &str, value: Value) {
    match (node.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming {
                merge_into(existing, &k, v);
            }
        }
        (_, value) => {
            node.insert(key.to_string(), value);
        }
    }
}
