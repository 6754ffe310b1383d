//! ASL state machine interpreter.
//!
//! Walks states per a definition, applies the InputPath / Parameters /
//! ResultPath / OutputPath plumbing, dispatches on state kind, and drives
//! concurrency for Map and Parallel. Data flows as JSON values; every
//! state's output is merged into a run-wide accumulator, which becomes the
//! final result. The accumulator is mutated only by the dispatch loop
//! between state transitions; sub-interpretations communicate through their
//! returned value.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{try_join_all, BoxFuture};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use futures_util::FutureExt;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::definition::{
    ChoiceRule, ChoiceState, MapState, ParallelState, PassState, State, StateMachine, TaskState,
    WaitState,
};
use crate::error::InterpreterError;
use crate::path::{apply_path, get_by_path, merge_values, place_by_path, PathError};
use crate::registry::{InvokeError, MethodRegistry};

/// Resource string that routes a Task through the lambda-invoke calling
/// convention: the method name comes from `Parameters.FunctionName` and the
/// arguments from `Parameters.Payload`.
pub const LAMBDA_INVOKE_RESOURCE: &str = "arn:aws:states:::lambda:invoke";

/// Drives ASL interpretations against a method registry.
pub struct Interpreter {
    registry: Arc<dyn MethodRegistry>,
    cancel: CancellationToken,
}

struct StateOutcome {
    output: Value,
    transition: Transition,
}

enum Transition {
    Next(String),
    End,
}

impl Interpreter {
    pub fn new(registry: Arc<dyn MethodRegistry>) -> Self {
        Self {
            registry,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally-owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this interpreter's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `definition` to completion over `input`, returning the
    /// accumulated global data.
    pub async fn interpret(
        &self,
        definition: &StateMachine,
        input: Value,
    ) -> Result<Value, InterpreterError> {
        definition.validate()?;
        info!(start_at = %definition.start_at, states = definition.states.len(), "interpretation started");
        let result = self.run_machine(definition, input).await;
        match &result {
            Ok(_) => info!("interpretation completed"),
            Err(error) => info!(%error, "interpretation failed"),
        }
        result
    }

    fn run_machine<'a>(
        &'a self,
        definition: &'a StateMachine,
        input: Value,
    ) -> BoxFuture<'a, Result<Value, InterpreterError>> {
        async move {
            let mut global = input.clone();
            let mut current = input;
            let mut state_name = definition.start_at.clone();
            loop {
                if self.cancel.is_cancelled() {
                    return Err(InterpreterError::Cancelled);
                }
                let state = definition.states.get(&state_name).ok_or_else(|| {
                    crate::definition::DefinitionError::UnknownState(state_name.clone())
                })?;
                let state_input = apply_path(&current, state.input_path())?;
                let effective = match state.parameters() {
                    Some(template) => resolve_parameters(&state_input, &global, template)?,
                    None => state_input.clone(),
                };
                debug!(state = %state_name, kind = state.kind(), "state entered");
                let outcome = self
                    .handle_state(&state_name, state, state_input, effective, &global)
                    .await?;
                global = merge_values(global, outcome.output.clone());
                match outcome.transition {
                    Transition::End => return Ok(global),
                    Transition::Next(next) => {
                        current = outcome.output;
                        state_name = next;
                    }
                }
            }
        }
        .boxed()
    }

    async fn handle_state(
        &self,
        name: &str,
        state: &State,
        state_input: Value,
        effective: Value,
        global: &Value,
    ) -> Result<StateOutcome, InterpreterError> {
        match state {
            State::Pass(pass) => handle_pass(name, pass, state_input, effective),
            State::Task(task) => self.handle_task(name, task, state_input, effective).await,
            State::Choice(choice) => handle_choice(name, choice, effective),
            State::Wait(wait) => self.handle_wait(name, wait, effective, global).await,
            State::Succeed(succeed) => {
                let output = apply_path(&effective, succeed.output_path.as_deref())?;
                Ok(StateOutcome {
                    output,
                    transition: Transition::End,
                })
            }
            State::Fail(fail) => Err(InterpreterError::FailState {
                error: fail.error.clone().unwrap_or_else(|| "FailState".to_string()),
                cause: fail.cause.clone().unwrap_or_else(|| "Failure".to_string()),
            }),
            State::Map(map) => self.handle_map(name, map, state_input, effective, global).await,
            State::Parallel(parallel) => {
                self.handle_parallel(name, parallel, state_input, effective).await
            }
        }
    }

    async fn handle_task(
        &self,
        name: &str,
        task: &TaskState,
        state_input: Value,
        effective: Value,
    ) -> Result<StateOutcome, InterpreterError> {
        let resource = task.resource.trim();
        if resource.is_empty() {
            return Err(InterpreterError::Resource {
                state: name.to_string(),
                message: "Task state has no Resource".to_string(),
            });
        }
        let (method, payload) = if resource == LAMBDA_INVOKE_RESOURCE {
            lambda_invoke_target(name, effective)
        } else {
            (resource.to_string(), effective)
        };
        let args = argument_array(payload);
        debug!(state = %name, method = %method, argc = args.len(), "invoking method");

        let invocation = self.registry.invoke(&method, args);
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(InterpreterError::Cancelled),
            result = invocation => result,
        }
        .map_err(|error| match error {
            InvokeError::NotFound { .. } => InterpreterError::Resource {
                state: name.to_string(),
                message: error.to_string(),
            },
            InvokeError::Host(message) => InterpreterError::Host {
                method: method.clone(),
                message,
            },
        })?;

        let output = place_result(
            name,
            &state_input,
            task.result_path.as_deref(),
            task.output_path.as_deref(),
            result,
        )?;
        Ok(StateOutcome {
            output,
            transition: transition(&task.next, task.end),
        })
    }

    async fn handle_wait(
        &self,
        name: &str,
        wait: &WaitState,
        effective: Value,
        global: &Value,
    ) -> Result<StateOutcome, InterpreterError> {
        let mut delay = Duration::ZERO;
        if let Some(seconds) = wait.seconds {
            delay += seconds_to_duration(seconds);
        }
        if let Some(path) = &wait.seconds_path {
            let value = read_with_fallback(&effective, global, path)?;
            if let Some(seconds) = as_number(&value) {
                delay += seconds_to_duration(seconds);
            }
        }
        if let Some(text) = &wait.timestamp {
            if let Some(instant) = parse_timestamp(text) {
                delay += until_instant(instant);
            }
        }
        if let Some(path) = &wait.timestamp_path {
            let value = read_with_fallback(&effective, global, path)?;
            if let Some(instant) = value.as_str().and_then(parse_timestamp) {
                delay += until_instant(instant);
            }
        }
        if !delay.is_zero() {
            debug!(state = %name, delay_ms = delay.as_millis() as u64, "waiting");
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(InterpreterError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        let output = apply_path(&effective, wait.output_path.as_deref())?;
        Ok(StateOutcome {
            output,
            transition: transition(&wait.next, wait.end),
        })
    }

    async fn handle_map(
        &self,
        name: &str,
        map: &MapState,
        state_input: Value,
        effective: Value,
        global: &Value,
    ) -> Result<StateOutcome, InterpreterError> {
        let items_value = match &map.items_path {
            Some(path) => read_with_fallback(&effective, global, path)?,
            None => effective,
        };
        let Value::Array(items) = items_value else {
            return Err(InterpreterError::Data {
                state: name.to_string(),
                message: "Map items did not resolve to a sequence".to_string(),
            });
        };

        let mut sub_inputs = Vec::with_capacity(items.len());
        for item in items {
            let sub_input = match &map.parameters {
                Some(template) => resolve_parameters(&item, global, template)?,
                None => item,
            };
            sub_inputs.push(sub_input);
        }

        let in_flight = match map.max_concurrency {
            Some(limit) if limit > 0 => limit.min(sub_inputs.len().max(1)),
            _ => sub_inputs.len().max(1),
        };
        debug!(state = %name, items = sub_inputs.len(), in_flight, "map fan-out");

        // `buffered` keeps results in input order regardless of completion
        // order, while capping how many iterations run at once. The first
        // error drops the stream, so siblings stop at their next suspension
        // point and unstarted items never launch.
        let outputs: Vec<Value> = stream::iter(
            sub_inputs
                .into_iter()
                .map(|sub_input| self.run_machine(&map.iterator, sub_input)),
        )
        .buffered(in_flight)
        .try_collect()
        .await?;

        let output = place_result(
            name,
            &state_input,
            map.result_path.as_deref(),
            map.output_path.as_deref(),
            Value::Array(outputs),
        )?;
        Ok(StateOutcome {
            output,
            transition: transition(&map.next, map.end),
        })
    }

    async fn handle_parallel(
        &self,
        name: &str,
        parallel: &ParallelState,
        state_input: Value,
        effective: Value,
    ) -> Result<StateOutcome, InterpreterError> {
        debug!(state = %name, branches = parallel.branches.len(), "parallel fan-out");
        let branch_outputs = try_join_all(
            parallel
                .branches
                .iter()
                .map(|branch| self.run_machine(branch, effective.clone())),
        )
        .await?;

        let mut merged = Value::Null;
        for branch_output in branch_outputs {
            merged = merge_values(merged, branch_output);
        }

        let output = place_result(
            name,
            &state_input,
            parallel.result_path.as_deref(),
            parallel.output_path.as_deref(),
            merged,
        )?;
        Ok(StateOutcome {
            output,
            transition: transition(&parallel.next, parallel.end),
        })
    }
}

fn handle_pass(
    name: &str,
    pass: &PassState,
    state_input: Value,
    effective: Value,
) -> Result<StateOutcome, InterpreterError> {
    let result = pass.result.clone().unwrap_or(effective);
    let output = place_result(
        name,
        &state_input,
        pass.result_path.as_deref(),
        pass.output_path.as_deref(),
        result,
    )?;
    Ok(StateOutcome {
        output,
        transition: transition(&pass.next, pass.end),
    })
}

fn handle_choice(
    name: &str,
    choice: &ChoiceState,
    effective: Value,
) -> Result<StateOutcome, InterpreterError> {
    if choice.choices.is_empty() {
        return Err(InterpreterError::Choice(name.to_string()));
    }
    for rule in &choice.choices {
        let Some(next) = &rule.next else {
            continue;
        };
        // The variable is read from the current data only. Unlike Wait and
        // Map reads, a null here never falls back to the accumulator.
        let variable = match rule.variable.as_deref() {
            Some(path) => get_by_path(&effective, path)?,
            None => Value::Null,
        };
        if choice_matches(rule, &variable) {
            debug!(state = %name, next = %next, "choice matched");
            let output = apply_path(&effective, choice.output_path.as_deref())?;
            return Ok(StateOutcome {
                output,
                transition: Transition::Next(next.clone()),
            });
        }
    }
    let output = apply_path(&effective, choice.output_path.as_deref())?;
    match &choice.default {
        Some(default) => Ok(StateOutcome {
            output,
            transition: Transition::Next(default.clone()),
        }),
        None => Ok(StateOutcome {
            output,
            transition: Transition::End,
        }),
    }
}

/// Place `result` at the explicit result path, or at the synthetic
/// `$.<stateName>` when none is given, then apply the output path. The
/// synthetic default keeps every state's output observable in the
/// accumulator under the state's own name.
fn place_result(
    name: &str,
    state_input: &Value,
    result_path: Option<&str>,
    output_path: Option<&str>,
    result: Value,
) -> Result<Value, InterpreterError> {
    let synthetic;
    let path = match result_path {
        Some(path) if !path.is_empty() => path,
        _ => {
            synthetic = format!("$.{name}");
            &synthetic
        }
    };
    let placed = place_by_path(state_input, path, result)?;
    Ok(apply_path(&placed, output_path)?)
}

fn transition(next: &Option<String>, end: bool) -> Transition {
    match next {
        Some(next) if !end => Transition::Next(next.clone()),
        _ => Transition::End,
    }
}

/// Render a parameter template: map keys ending in `.$` are replaced by the
/// value at the path they name, other map entries and sequence elements
/// recurse, and scalars are taken verbatim.
fn resolve_parameters(
    data: &Value,
    global: &Value,
    template: &Value,
) -> Result<Value, PathError> {
    match template {
        Value::Object(map) => {
            let mut resolved = Map::new();
            for (key, entry) in map {
                if let Some(target) = key.strip_suffix(".$") {
                    let path = entry
                        .as_str()
                        .ok_or_else(|| PathError::TemplateNotAString(key.clone()))?;
                    resolved.insert(target.to_string(), read_with_fallback(data, global, path)?);
                } else {
                    resolved.insert(key.clone(), resolve_parameters(data, global, entry)?);
                }
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| resolve_parameters(data, global, item))
                .collect::<Result<_, _>>()?,
        )),
        scalar => Ok(scalar.clone()),
    }
}

/// Read from the current data, falling back to the global accumulator when
/// the current read yields null.
fn read_with_fallback(current: &Value, global: &Value, path: &str) -> Result<Value, PathError> {
    let value = get_by_path(current, path)?;
    if value.is_null() {
        get_by_path(global, path)
    } else {
        Ok(value)
    }
}

fn lambda_invoke_target(state_name: &str, built: Value) -> (String, Value) {
    let Value::Object(map) = built else {
        return (state_name.to_string(), built);
    };
    let method = map
        .get("FunctionName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| state_name.to_string());
    let payload = match map.get("Payload") {
        Some(payload) => payload.clone(),
        None => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "FunctionName" && key != "Payload")
                .collect(),
        ),
    };
    (method, payload)
}

/// Positional arguments: a map contributes its values in iteration order, a
/// sequence its elements, anything else becomes a single argument.
fn argument_array(payload: Value) -> Vec<Value> {
    match payload {
        Value::Object(map) => map.into_iter().map(|(_, value)| value).collect(),
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Disjunctive rule evaluation: any present comparator that fires selects
/// the rule. Generated definitions rely on the or-logic, so it must not be
/// tightened to all-must-match.
fn choice_matches(rule: &ChoiceRule, variable: &Value) -> bool {
    let number = as_number(variable);
    if let (Some(expected), Some(actual)) = (rule.numeric_greater_than, number) {
        if actual > expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (rule.numeric_greater_than_equals, number) {
        if actual >= expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (rule.numeric_less_than, number) {
        if actual < expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (rule.numeric_less_than_equals, number) {
        if actual <= expected {
            return true;
        }
    }

    let text = as_ordinal_string(variable);
    if let (Some(expected), Some(actual)) = (&rule.string_equals, &text) {
        if actual == expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (&rule.string_greater_than, &text) {
        if actual > expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (&rule.string_greater_than_equals, &text) {
        if actual >= expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (&rule.string_less_than, &text) {
        if actual < expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (&rule.string_less_than_equals, &text) {
        if actual <= expected {
            return true;
        }
    }

    let instant = variable.as_str().and_then(parse_timestamp);
    if let (Some(expected), Some(actual)) = (parse_rule_timestamp(&rule.timestamp_equals), instant)
    {
        if actual == expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) =
        (parse_rule_timestamp(&rule.timestamp_greater_than), instant)
    {
        if actual > expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (
        parse_rule_timestamp(&rule.timestamp_greater_than_equals),
        instant,
    ) {
        if actual >= expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) =
        (parse_rule_timestamp(&rule.timestamp_less_than), instant)
    {
        if actual < expected {
            return true;
        }
    }
    if let (Some(expected), Some(actual)) = (
        parse_rule_timestamp(&rule.timestamp_less_than_equals),
        instant,
    ) {
        if actual <= expected {
            return true;
        }
    }

    if let (Some(expected), Some(actual)) = (rule.boolean_equals, as_bool(variable)) {
        if actual == expected {
            return true;
        }
    }

    if let Some(expected) = rule.is_null {
        if variable.is_null() == expected {
            return true;
        }
    }
    if let Some(expected) = rule.is_numeric {
        if number.is_some() == expected {
            return true;
        }
    }
    if let Some(expected) = rule.is_string {
        if variable.is_string() == expected {
            return true;
        }
    }
    if let Some(expected) = rule.is_boolean {
        if variable.is_boolean() == expected {
            return true;
        }
    }
    if let Some(expected) = rule.is_timestamp {
        if instant.is_some() == expected {
            return true;
        }
    }

    false
}

fn parse_rule_timestamp(text: &Option<String>) -> Option<DateTime<Utc>> {
    text.as_deref().and_then(parse_timestamp)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_ordinal_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}

fn until_instant(instant: DateTime<Utc>) -> Duration {
    (instant - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
