use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A pending crawl job: a name plus arbitrary JSON-compatible arguments.
///
/// Serialises flat — `{"name": "...", <args...>}` — which is exactly the
/// payload shape persisted in the queue table. The `priority` argument is
/// never part of a `Job`; the queue extracts it at enqueue time and
/// stores it in its own column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Identifying string for the job (e.g. a spider name).
    pub name: String,
    /// Caller-supplied arguments. Values may nest mappings and sequences
    /// of strings, numbers, booleans, and null.
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

impl Job {
    /// Build a job descriptor from a name and its arguments.
    ///
    /// A caller-supplied `name` argument key is dropped — the job name
    /// always wins, and keeping both would duplicate the key in the
    /// flattened payload.
    pub fn new(name: impl Into<String>, mut args: Map<String, Value>) -> Self {
        args.remove("name");
        Self {
            name: name.into(),
            args,
        }
    }

    /// Look up a single argument value.
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn serialises_flat() {
        let job = Job::new("fetch", args(json!({"depth": 2, "follow": true})));
        let v = serde_json::to_value(&job).expect("to_value");
        assert_eq!(v, json!({"name": "fetch", "depth": 2, "follow": true}));
    }

    #[test]
    fn roundtrips_through_json() {
        let job = Job::new(
            "fetch",
            args(json!({"seed": "https://example.org", "tags": ["a", "b"], "meta": {"retries": null}})),
        );
        let text = serde_json::to_string(&job).expect("to_string");
        let back: Job = serde_json::from_str(&text).expect("from_str");
        assert_eq!(back, job);
    }

    #[test]
    fn name_argument_is_overridden() {
        let job = Job::new("real", args(json!({"name": "impostor", "x": 1})));
        assert_eq!(job.name, "real");
        assert!(job.arg("name").is_none());
        assert_eq!(job.arg("x"), Some(&json!(1)));
    }

    #[test]
    fn missing_name_fails_to_decode() {
        assert!(serde_json::from_str::<Job>("{\"depth\": 2}").is_err());
    }
}
