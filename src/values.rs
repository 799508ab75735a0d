//! Columnar accumulation of log entries into a logs frame

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::extract;
use crate::models::cloud::LogEntry;
use crate::models::frame::{DataLink, Field, FieldConfig, FieldValues, Frame};
use crate::models::level::Level;
use crate::models::query::DerivedFieldRule;
use crate::template::{Scope, Template};

/// Data links to attach to output fields, keyed by field name
pub type FieldLinks = HashMap<String, Vec<DataLink>>;

struct DerivedRule {
    name: String,
    template: Template,
}

/// Parallel column buffers for one sub-query
///
/// Every column, derived ones included, grows by exactly one element per
/// appended entry, so all columns always have the same length.
pub struct LogEntriesValues {
    extract_fields: Vec<String>,
    rules: Vec<DerivedRule>,

    timestamps: Vec<DateTime<Utc>>,
    contents: Vec<String>,
    levels: Vec<String>,
    ids: Vec<String>,
    streams: Vec<String>,
    resource_types: Vec<String>,
    resource_ids: Vec<String>,
    messages: Vec<String>,
    payloads: Vec<String>,
    derived: Vec<Vec<Option<String>>>,
}

impl LogEntriesValues {
    pub fn new(extract_fields: Vec<String>, rules: &[DerivedFieldRule]) -> Self {
        let mut values = Self {
            extract_fields,
            rules: Vec::new(),
            timestamps: Vec::new(),
            contents: Vec::new(),
            levels: Vec::new(),
            ids: Vec::new(),
            streams: Vec::new(),
            resource_types: Vec::new(),
            resource_ids: Vec::new(),
            messages: Vec::new(),
            payloads: Vec::new(),
            derived: Vec::new(),
        };
        values.add_derived_rules(rules);
        values
    }

    /// Compile derived rules. Rules whose template does not compile are
    /// dropped here and never produce a column.
    fn add_derived_rules(&mut self, rules: &[DerivedFieldRule]) {
        for rule in rules {
            let template = match Template::compile(&rule.template) {
                Ok(template) => template,
                Err(err) => {
                    debug!(rule = %rule.name, error = %err, "Dropping derived field with invalid template");
                    continue;
                }
            };
            match self.rules.iter_mut().find(|r| r.name == rule.name) {
                Some(existing) => existing.template = template,
                None => {
                    self.rules.push(DerivedRule {
                        name: rule.name.clone(),
                        template,
                    });
                    self.derived.push(Vec::new());
                }
            }
        }
    }

    /// Names of the derived columns, in output order
    pub fn derived_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn append(&mut self, entry: &LogEntry) {
        let timestamp = entry.timestamp.with_timezone(&Utc);
        let level = Level::from_service(entry.level);
        let no_payload = Map::new();
        let payload = entry.json_payload.as_ref().unwrap_or(&no_payload);

        self.timestamps.push(timestamp);
        self.levels.push(level.as_str().to_string());
        self.ids.push(entry.uid.clone());
        self.streams.push(entry.stream_name.clone());
        self.resource_types.push(entry.resource.resource_type.clone());
        self.resource_ids.push(entry.resource.id.clone());
        self.messages.push(entry.message.clone());
        self.payloads.push(extract::json_text(payload));

        let rendered: Vec<String> = if self.rules.is_empty() {
            Vec::new()
        } else {
            let builtins = builtin_scope(timestamp, level, entry);
            self.rules
                .iter()
                .map(|rule| {
                    rule.template
                        .render(&[Scope::Map(payload), Scope::Map(&builtins)])
                })
                .collect()
        };
        for (column, value) in self.derived.iter_mut().zip(&rendered) {
            column.push(Some(value.clone()).filter(|v| !v.is_empty()));
        }

        let extracted = extract::extract_fields(&self.extract_fields, payload, |name| {
            self.rules
                .iter()
                .position(|r| r.name == name)
                .map(|i| rendered[i].as_str())
        });
        self.contents
            .push(extract::content_line(&entry.message, &extracted));
    }

    /// Build the logs frame: fixed columns first, then derived columns
    pub fn into_frame(self, name: &str, group_id: &str, links: &FieldLinks) -> Frame {
        let mut fields = vec![
            Field::new("timestamp", FieldValues::Time(self.timestamps)),
            Field::new("content", FieldValues::String(self.contents)).with_label("group", group_id),
            Field::new("level", FieldValues::String(self.levels)),
            Field::new("id", FieldValues::String(self.ids)),
            Field::new("stream", FieldValues::String(self.streams)),
            Field::new("resource_type", FieldValues::String(self.resource_types)),
            Field::new("resource_id", FieldValues::String(self.resource_ids)),
            Field::new("message", FieldValues::String(self.messages)),
            Field::new("json_payload", FieldValues::String(self.payloads)),
        ];
        for (rule, values) in self.rules.into_iter().zip(self.derived) {
            fields.push(Field::new(rule.name, FieldValues::NullableString(values)));
        }

        for field in &mut fields {
            if let Some(field_links) = links.get(&field.name).filter(|l| !l.is_empty()) {
                field.config = Some(FieldConfig {
                    links: field_links.clone(),
                });
            }
        }

        Frame::new(name, fields)
    }
}

fn builtin_scope(timestamp: DateTime<Utc>, level: Level, entry: &LogEntry) -> Map<String, Value> {
    let mut scope = Map::new();
    scope.insert(
        "timestamp".to_string(),
        Value::String(timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    );
    scope.insert("level".to_string(), Value::String(level.as_str().to_string()));
    scope.insert("id".to_string(), Value::String(entry.uid.clone()));
    scope.insert("stream".to_string(), Value::String(entry.stream_name.clone()));
    scope.insert(
        "resource_type".to_string(),
        Value::String(entry.resource.resource_type.clone()),
    );
    scope.insert(
        "resource_id".to_string(),
        Value::String(entry.resource.id.clone()),
    );
    scope.insert("message".to_string(), Value::String(entry.message.clone()));
    scope
}
