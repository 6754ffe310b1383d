//! ASL definition data model and static validation.
//!
//! A definition is a `(StartAt, States)` pair where each state carries a
//! `Type` discriminator plus kind-dependent fields. The model deserializes
//! the JSON emitted by the workflow generator; `Retry`/`Catch` shapes are
//! recognized so such definitions parse, but carry no runtime behaviour.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Definition-level errors raised before the first state runs.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("definition has no states")]
    Empty,
    #[error("StartAt state '{0}' is not defined in States")]
    UnknownStartAt(String),
    #[error("state '{state}' transitions to undefined state '{next}'")]
    DanglingNext { state: String, next: String },
    #[error("no state named '{0}'")]
    UnknownState(String),
    #[error("invalid definition JSON: {0}")]
    Parse(String),
}

/// An ASL state machine: a start state name plus named states.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateMachine {
    pub start_at: String,
    pub states: HashMap<String, State>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl StateMachine {
    /// Parse a definition from raw JSON text.
    pub fn from_json(text: &str) -> Result<Self, DefinitionError> {
        serde_json::from_str(text).map_err(|e| DefinitionError::Parse(e.to_string()))
    }

    /// Static checks: `StartAt` resolves, every transition target exists,
    /// recursively for Map iterators and Parallel branches.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.states.is_empty() {
            return Err(DefinitionError::Empty);
        }
        if !self.states.contains_key(&self.start_at) {
            return Err(DefinitionError::UnknownStartAt(self.start_at.clone()));
        }
        for (name, state) in &self.states {
            for next in state.transition_targets() {
                if !self.states.contains_key(next) {
                    return Err(DefinitionError::DanglingNext {
                        state: name.clone(),
                        next: next.to_string(),
                    });
                }
            }
            match state {
                State::Map(map) => map.iterator.validate()?,
                State::Parallel(parallel) => {
                    for branch in &parallel.branches {
                        branch.validate()?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A single state, discriminated by its `Type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "Type")]
pub enum State {
    Pass(PassState),
    Task(TaskState),
    Choice(ChoiceState),
    Wait(WaitState),
    Succeed(SucceedState),
    Fail(FailState),
    Map(MapState),
    Parallel(ParallelState),
}

impl State {
    /// Human-readable kind name, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            State::Pass(_) => "Pass",
            State::Task(_) => "Task",
            State::Choice(_) => "Choice",
            State::Wait(_) => "Wait",
            State::Succeed(_) => "Succeed",
            State::Fail(_) => "Fail",
            State::Map(_) => "Map",
            State::Parallel(_) => "Parallel",
        }
    }

    /// The state's input selection path, when it has one.
    pub fn input_path(&self) -> Option<&str> {
        match self {
            State::Pass(s) => s.input_path.as_deref(),
            State::Task(s) => s.input_path.as_deref(),
            State::Choice(s) => s.input_path.as_deref(),
            State::Wait(s) => s.input_path.as_deref(),
            State::Succeed(s) => s.input_path.as_deref(),
            State::Fail(_) => None,
            State::Map(s) => s.input_path.as_deref(),
            State::Parallel(s) => s.input_path.as_deref(),
        }
    }

    /// The state's parameter template, when it has one.
    pub fn parameters(&self) -> Option<&Value> {
        match self {
            State::Pass(s) => s.parameters.as_ref(),
            State::Task(s) => s.parameters.as_ref(),
            State::Map(s) => s.parameters.as_ref(),
            _ => None,
        }
    }

    /// Every state name this state can transition to.
    pub fn transition_targets(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        match self {
            State::Pass(s) => targets.extend(s.next.as_deref()),
            State::Task(s) => targets.extend(s.next.as_deref()),
            State::Wait(s) => targets.extend(s.next.as_deref()),
            State::Map(s) => targets.extend(s.next.as_deref()),
            State::Parallel(s) => targets.extend(s.next.as_deref()),
            State::Choice(s) => {
                for rule in &s.choices {
                    targets.extend(rule.next.as_deref());
                }
                targets.extend(s.default.as_deref());
            }
            State::Succeed(_) | State::Fail(_) => {}
        }
        targets
    }
}

/// Pass: forwards its effective input, optionally replaced by `Result`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PassState {
    #[serde(default)]
    pub input_path: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub result_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}

/// Task: invokes a catalog method named by `Resource`, or routed through the
/// lambda-invoke convention (`FunctionName` + `Payload` in `Parameters`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub input_path: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub result_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
    #[serde(default)]
    pub retry: Vec<RetryPolicy>,
    #[serde(default)]
    pub catch: Vec<CatchClause>,
}

/// Choice: ordered rules tested against a path-addressed variable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceState {
    #[serde(default)]
    pub input_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceRule>,
    #[serde(default)]
    pub default: Option<String>,
}

/// One choice rule. Any present comparator that fires selects the rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChoiceRule {
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub numeric_greater_than: Option<f64>,
    #[serde(default)]
    pub numeric_greater_than_equals: Option<f64>,
    #[serde(default)]
    pub numeric_less_than: Option<f64>,
    #[serde(default)]
    pub numeric_less_than_equals: Option<f64>,
    #[serde(default)]
    pub string_equals: Option<String>,
    #[serde(default)]
    pub string_greater_than: Option<String>,
    #[serde(default)]
    pub string_greater_than_equals: Option<String>,
    #[serde(default)]
    pub string_less_than: Option<String>,
    #[serde(default)]
    pub string_less_than_equals: Option<String>,
    #[serde(default)]
    pub timestamp_equals: Option<String>,
    #[serde(default)]
    pub timestamp_greater_than: Option<String>,
    #[serde(default)]
    pub timestamp_greater_than_equals: Option<String>,
    #[serde(default)]
    pub timestamp_less_than: Option<String>,
    #[serde(default)]
    pub timestamp_less_than_equals: Option<String>,
    #[serde(default)]
    pub boolean_equals: Option<bool>,
    #[serde(default)]
    pub is_null: Option<bool>,
    #[serde(default)]
    pub is_numeric: Option<bool>,
    #[serde(default)]
    pub is_string: Option<bool>,
    #[serde(default)]
    pub is_boolean: Option<bool>,
    #[serde(default)]
    pub is_timestamp: Option<bool>,
}

/// Wait: delays by the sum of whichever delay sources are present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitState {
    #[serde(default)]
    pub input_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub seconds: Option<f64>,
    #[serde(default)]
    pub seconds_path: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub timestamp_path: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}

/// Succeed: terminates the run, forwarding the current data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SucceedState {
    #[serde(default)]
    pub input_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Fail: terminates the run with an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FailState {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
}

/// Map: runs the iterator machine once per element of a sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapState {
    #[serde(default)]
    pub input_path: Option<String>,
    #[serde(default)]
    pub items_path: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    pub iterator: StateMachine,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub result_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}

/// Parallel: runs every branch machine over the same input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParallelState {
    #[serde(default)]
    pub input_path: Option<String>,
    pub branches: Vec<StateMachine>,
    #[serde(default)]
    pub result_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub end: bool,
}

/// Retry shape, recognized for forward compatibility only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetryPolicy {
    #[serde(default)]
    pub error_equals: Vec<String>,
    #[serde(default)]
    pub interval_seconds: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub backoff_rate: Option<f64>,
}

/// Catch shape, recognized for forward compatibility only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatchClause {
    #[serde(default)]
    pub error_equals: Vec<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub result_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_definition() {
        let machine = StateMachine::from_json(
            r#"{
                "StartAt": "Check",
                "States": {
                    "Check": {
                        "Type": "Choice",
                        "Choices": [
                            {"Variable": "$.n", "NumericLessThan": 10, "Next": "Lo"}
                        ],
                        "Default": "Hi"
                    },
                    "Lo": {"Type": "Pass", "Result": {"band": "low"}, "Next": "Done"},
                    "Hi": {"Type": "Pass", "Result": {"band": "high"}, "Next": "Done"},
                    "Done": {"Type": "Succeed"}
                }
            }"#,
        )
        .expect("definition parses");

        assert_eq!(machine.start_at, "Check");
        assert_eq!(machine.states.len(), 4);
        machine.validate().expect("definition validates");
        let State::Choice(choice) = &machine.states["Check"] else {
            panic!("expected a choice state");
        };
        assert_eq!(choice.choices[0].numeric_less_than, Some(10.0));
        assert_eq!(choice.default.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_parse_task_with_retry_and_catch_shapes() {
        let machine = StateMachine::from_json(
            r#"{
                "StartAt": "Fetch",
                "States": {
                    "Fetch": {
                        "Type": "Task",
                        "Resource": "GetLatestPrice",
                        "Retry": [{"ErrorEquals": ["States.ALL"], "MaxAttempts": 2}],
                        "Catch": [{"ErrorEquals": ["States.ALL"], "Next": "Fetch"}],
                        "End": true
                    }
                }
            }"#,
        )
        .expect("definition parses");
        let State::Task(task) = &machine.states["Fetch"] else {
            panic!("expected a task state");
        };
        assert_eq!(task.retry.len(), 1);
        assert_eq!(task.catch.len(), 1);
    }

    #[test]
    fn test_validate_rejects_unknown_start_at() {
        let machine = StateMachine::from_json(
            r#"{"StartAt": "Nope", "States": {"A": {"Type": "Succeed"}}}"#,
        )
        .expect("definition parses");
        assert!(matches!(
            machine.validate(),
            Err(DefinitionError::UnknownStartAt(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_validate_rejects_dangling_next() {
        let machine = StateMachine::from_json(
            r#"{"StartAt": "A", "States": {"A": {"Type": "Pass", "Next": "Ghost"}}}"#,
        )
        .expect("definition parses");
        assert!(matches!(
            machine.validate(),
            Err(DefinitionError::DanglingNext { next, .. }) if next == "Ghost"
        ));
    }

    #[test]
    fn test_validate_recurses_into_iterator_and_branches() {
        let machine = StateMachine::from_json(
            r#"{
                "StartAt": "Fan",
                "States": {
                    "Fan": {
                        "Type": "Map",
                        "ItemsPath": "$.items",
                        "Iterator": {
                            "StartAt": "Inner",
                            "States": {"Inner": {"Type": "Pass", "Next": "Ghost"}}
                        },
                        "End": true
                    }
                }
            }"#,
        )
        .expect("definition parses");
        assert!(matches!(
            machine.validate(),
            Err(DefinitionError::DanglingNext { next, .. }) if next == "Ghost"
        ));
    }

    #[test]
    fn test_unknown_state_type_is_a_parse_error() {
        let parsed = StateMachine::from_json(
            r#"{"StartAt": "A", "States": {"A": {"Type": "Teleport"}}}"#,
        );
        assert!(matches!(parsed, Err(DefinitionError::Parse(_))));
    }
}
