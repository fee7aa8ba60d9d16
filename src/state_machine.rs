/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The replicated state that committed log entries are applied to.
//!
//! A replica driver applies each committed [`LogEntry`] to a [`StateMachine`] in log order and
//! sends the returned value back to the client. [`KeyValueState`] is a minimal store over string
//! keys that understands two operations:
//!
//! | Request                  | Response                                   |
//! |--------------------------|--------------------------------------------|
//! | `["read", key]`          | The value stored at `key`, or `null`.      |
//! | `["write", key, value]`  | `true`. A missing `value` stores `""`.     |
//!
//! Any other request yields `null`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::log::LogEntry;

pub trait StateMachine {
    /// Apply `request` and return the response for the client.
    fn commit(&mut self, request: &Value) -> Value;

    /// Apply the request carried by `entry`. Empty entries are skipped and yield `null`.
    fn commit_entry(&mut self, entry: &LogEntry) -> Value {
        if entry.is_empty() {
            Value::Null
        } else {
            self.commit(entry.request())
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyValueState {
    values: BTreeMap<String, String>,
}

impl KeyValueState {
    pub fn new() -> KeyValueState {
        KeyValueState::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl StateMachine for KeyValueState {
    fn commit(&mut self, request: &Value) -> Value {
        let (operation, key) = match request.as_array().map(Vec::as_slice) {
            Some([Value::String(operation), Value::String(key), ..]) => (operation, key),
            _ => return Value::Null,
        };

        match operation.as_str() {
            "read" => self
                .values
                .get(key)
                .map(|value| Value::String(value.clone()))
                .unwrap_or(Value::Null),
            "write" => {
                let value = match request.get(2) {
                    Some(Value::String(value)) => value.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                self.values.insert(key.clone(), value);
                Value::Bool(true)
            }
            _ => Value::Null,
        }
    }
}
