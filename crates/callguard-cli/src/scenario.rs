//! JSON call scenarios.
//!
//! A scenario declares classes, functions with contracts (by type name, as
//! ordered `[param, type]` pairs) and a list of calls. Loading it builds a
//! [`Runtime`] holding every class and function; running it pushes each call
//! through one execution context.
//!
//! ```json
//! {
//!   "classes": [{ "name": "Animal" }, { "name": "Dog", "base": "Animal" }],
//!   "functions": [
//!     { "name": "pet", "params": ["a"], "contracts": [["a", "Animal"]] }
//!   ],
//!   "calls": [{ "function": "pet", "args": [{ "instance": "Dog" }] }]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use callguard_core::{
    Annotation, CallError, CallFrame, ContextId, ContractTable, FunctionObject, TypeId, Value,
};
use callguard_runtime::{Body, Runtime, RuntimeConfig, RuntimeError};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("call #{index} names unknown function '{name}'")]
    UnknownFunction { index: usize, name: String },

    #[error("function '{name}' is defined twice")]
    DuplicateFunction { name: String },

    #[error("unsupported argument value: {0}")]
    BadArgument(serde_json::Value),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
}

/// A contract as written in the scenario: a type name, or a list of names
/// for a union.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContractSpec {
    Name(String),
    Union(Vec<String>),
}

/// What a function's body does when it runs.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    /// Returns the first argument.
    #[default]
    Echo,
    /// Returns `None`.
    Unit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    /// Contracts keyed by parameter name, in declaration order.
    #[serde(default)]
    pub contracts: Vec<(String, ContractSpec)>,
    #[serde(default)]
    pub body: BodyKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallSpec {
    pub function: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
    #[serde(default)]
    pub calls: Vec<CallSpec>,
}

/// Outcome of one call, as printed by `callguard run`.
#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    pub index: usize,
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CallError>,
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A scenario loaded into a runtime, with every call's arguments resolved.
pub struct Loaded {
    pub runtime: Runtime,
    functions: HashMap<String, Arc<FunctionObject>>,
    calls: Vec<(String, Vec<Value>)>,
}

impl Loaded {
    pub fn build(scenario: &Scenario, config: RuntimeConfig) -> Result<Self, ScenarioError> {
        let runtime = Runtime::new(config);

        for class in &scenario.classes {
            let base = class
                .base
                .as_deref()
                .map(|name| lookup_type(&runtime, name))
                .transpose()?;
            runtime.register_class(&class.name, base)?;
        }

        let mut functions = HashMap::new();
        for def in &scenario.functions {
            if functions.contains_key(&def.name) {
                return Err(ScenarioError::DuplicateFunction {
                    name: def.name.clone(),
                });
            }
            let contracts = def
                .contracts
                .iter()
                .map(|(param, contract)| (param.clone(), annotation(&runtime, contract)))
                .collect::<ContractTable>();
            let params: Vec<&str> = def.params.iter().map(String::as_str).collect();
            let function =
                runtime.define_function(&def.name, &params, contracts, body(def.body));
            debug!(name = %def.name, contracts = function.contracts.len(), "loaded function");
            functions.insert(def.name.clone(), function);
        }

        let mut calls = Vec::with_capacity(scenario.calls.len());
        for (index, call) in scenario.calls.iter().enumerate() {
            if !functions.contains_key(&call.function) {
                return Err(ScenarioError::UnknownFunction {
                    index,
                    name: call.function.clone(),
                });
            }
            let args = call
                .args
                .iter()
                .map(|arg| to_value(&runtime, arg))
                .collect::<Result<Vec<_>, _>>()?;
            calls.push((call.function.clone(), args));
        }

        Ok(Loaded {
            runtime,
            functions,
            calls,
        })
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Runs every call in order through `context`.
    pub fn run(&self, context: ContextId) -> Vec<CallReport> {
        self.calls
            .iter()
            .enumerate()
            .filter_map(|(index, (name, args))| {
                let function = self.functions.get(name)?;
                let outcome = self.runtime.call(context, function, args.clone());
                Some(match outcome {
                    Ok(value) => CallReport {
                        index,
                        function: name.clone(),
                        result: Some(value),
                        error: None,
                    },
                    Err(err) => CallReport {
                        index,
                        function: name.clone(),
                        result: None,
                        error: Some(err),
                    },
                })
            })
            .collect()
    }
}

fn lookup_type(runtime: &Runtime, name: &str) -> Result<TypeId, ScenarioError> {
    runtime
        .type_by_name(name)
        .ok_or_else(|| ScenarioError::UnknownType {
            name: name.to_string(),
        })
}

/// Known type names become concrete types. Unknown names are kept as forward
/// references, which the checker cannot evaluate.
fn annotation(runtime: &Runtime, contract: &ContractSpec) -> Annotation {
    let single = |name: &str| match runtime.type_by_name(name) {
        Some(ty) => Annotation::Type(ty),
        None => Annotation::Forward(name.to_string()),
    };
    match contract {
        ContractSpec::Name(name) => single(name),
        ContractSpec::Union(names) => Annotation::Union(names.iter().map(|n| single(n)).collect()),
    }
}

fn body(kind: BodyKind) -> Body {
    match kind {
        BodyKind::Echo => {
            Arc::new(|frame: &CallFrame| Ok(frame.local(0).cloned().unwrap_or(Value::None)))
        }
        BodyKind::Unit => Arc::new(|_frame: &CallFrame| Ok(Value::None)),
    }
}

/// Converts a JSON argument to a runtime value.
///
/// `{"instance": "<class>"}` builds a class instance and `{"type": "<name>"}`
/// a type object; other objects are rejected. Integers must fit in an `i64`.
fn to_value(runtime: &Runtime, json: &serde_json::Value) -> Result<Value, ScenarioError> {
    use serde_json::Value as Json;

    Ok(match json {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None if n.is_u64() => return Err(ScenarioError::BadArgument(json.clone())),
            None => Value::Float(
                n.as_f64()
                    .ok_or_else(|| ScenarioError::BadArgument(json.clone()))?,
            ),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(
            items
                .iter()
                .map(|item| to_value(runtime, item))
                .collect::<Result<_, _>>()?,
        ),
        Json::Object(map) => match (map.get("instance"), map.get("type")) {
            (Some(Json::String(class)), None) if map.len() == 1 => Value::Instance {
                class: lookup_type(runtime, class)?,
            },
            (None, Some(Json::String(name))) if map.len() == 1 => {
                Value::Type(lookup_type(runtime, name)?)
            }
            _ => return Err(ScenarioError::BadArgument(json.clone())),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use callguard_check::{CheckError, CheckerConfig, TypeChecker, UnsupportedPolicy};
    use callguard_core::ErrorKind;

    const PETS: &str = r#"{
        "classes": [{ "name": "Animal" }, { "name": "Dog", "base": "Animal" }],
        "functions": [
            { "name": "pet", "params": ["a"], "contracts": [["a", "Animal"]] },
            { "name": "link", "params": ["n"], "contracts": [["n", "Node"]], "body": "unit" }
        ],
        "calls": [
            { "function": "pet", "args": [{ "instance": "Animal" }] },
            { "function": "pet", "args": [{ "instance": "Dog" }] },
            { "function": "link", "args": [1] }
        ]
    }"#;

    #[test]
    fn loads_classes_functions_and_calls() {
        let scenario = Scenario::from_json(PETS).unwrap();
        let loaded = Loaded::build(&scenario, RuntimeConfig::default()).unwrap();

        assert_eq!(loaded.function_count(), 2);
        assert_eq!(loaded.call_count(), 3);
        let dog = loaded.runtime.type_by_name("Dog").unwrap();
        let animal = loaded.runtime.type_by_name("Animal").unwrap();
        assert!(loaded.runtime.is_subclass(dog, animal));
    }

    #[test]
    fn unknown_contract_names_become_forward_references() {
        let scenario = Scenario::from_json(PETS).unwrap();
        let loaded = Loaded::build(&scenario, RuntimeConfig::default()).unwrap();
        let link = &loaded.functions["link"];
        assert_eq!(
            link.contracts.get("n"),
            Some(&Annotation::Forward("Node".into()))
        );
    }

    #[test]
    fn unchecked_run_executes_every_call() {
        let scenario = Scenario::from_json(PETS).unwrap();
        let loaded = Loaded::build(&scenario, RuntimeConfig::default()).unwrap();
        let reports = loaded.run(ContextId(0));
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.error.is_none()));
    }

    fn load_pets(config: RuntimeConfig) -> Loaded {
        Loaded::build(&Scenario::from_json(PETS).unwrap(), config).unwrap()
    }

    fn rejected(reports: &[CallReport]) -> Vec<(usize, String)> {
        reports
            .iter()
            .filter_map(|r| Some((r.index, r.error.as_ref()?.message.clone())))
            .collect()
    }

    #[test]
    fn checked_run_rejects_subclass_instance() {
        let loaded = load_pets(RuntimeConfig::default());
        let checker = TypeChecker::new(CheckerConfig::default());
        checker.enable(&loaded.runtime).unwrap();

        let reports = loaded.run(ContextId(0));
        assert_eq!(reports.len(), 3);
        assert_eq!(
            rejected(&reports),
            vec![(1, "expected type 'Animal', got 'Dog' for parameter 'a'".to_string())]
        );
        assert_eq!(reports[1].error.as_ref().unwrap().kind, ErrorKind::TypeError);
        assert!(reports[1].result.is_none());

        // The forward reference is skipped and the call runs.
        assert_eq!(reports[2].result, Some(Value::None));

        let stats = checker.stats().unwrap();
        assert_eq!(stats.intercepted, 3);
        assert_eq!(stats.checked, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.faults, 1);
        checker.disable(&loaded.runtime).unwrap();
    }

    #[test]
    fn forward_reference_is_rejected_under_reject_policy() {
        let loaded = load_pets(RuntimeConfig::default());
        let checker = TypeChecker::new(CheckerConfig {
            unsupported: UnsupportedPolicy::Reject,
        });
        checker.enable(&loaded.runtime).unwrap();

        let reports = loaded.run(ContextId(0));
        assert_eq!(
            rejected(&reports),
            vec![
                (1, "expected type 'Animal', got 'Dog' for parameter 'a'".to_string()),
                (
                    2,
                    "unsupported contract for parameter 'n': expected a type, found a forward reference"
                        .to_string()
                ),
            ]
        );
    }

    #[test]
    fn enable_fails_without_referrer_query() {
        let loaded = load_pets(RuntimeConfig {
            referrer_query: false,
            ..RuntimeConfig::default()
        });
        let checker = TypeChecker::new(CheckerConfig::default());
        assert!(matches!(
            checker.enable(&loaded.runtime),
            Err(CheckError::MissingReferrerQuery)
        ));
        assert!(!checker.is_enabled());

        // Calls still run unchecked.
        assert!(rejected(&loaded.run(ContextId(0))).is_empty());
    }

    #[test]
    fn call_to_unknown_function_is_rejected() {
        let scenario = Scenario::from_json(r#"{ "calls": [{ "function": "ghost" }] }"#).unwrap();
        match Loaded::build(&scenario, RuntimeConfig::default()) {
            Err(ScenarioError::UnknownFunction { index, name }) => {
                assert_eq!(index, 0);
                assert_eq!(name, "ghost");
            }
            other => panic!("expected UnknownFunction, got {:?}", other.err()),
        }
    }

    #[test]
    fn json_arguments_map_to_values() {
        let rt = Runtime::default();
        let json: serde_json::Value =
            serde_json::from_str(r#"[null, true, 3, 2.5, "s", [1], {"type": "int"}]"#).unwrap();
        assert_eq!(
            to_value(&rt, &json).unwrap(),
            Value::List(vec![
                Value::None,
                Value::Bool(true),
                Value::Int(3),
                Value::Float(2.5),
                Value::from("s"),
                Value::List(vec![Value::Int(1)]),
                Value::Type(TypeId::INT),
            ])
        );
    }

    #[test]
    fn unknown_argument_objects_are_rejected() {
        let rt = Runtime::default();
        let json = serde_json::json!({ "instance": "Missing" });
        assert!(matches!(
            to_value(&rt, &json),
            Err(ScenarioError::UnknownType { .. })
        ));
        let json = serde_json::json!({ "other": 1 });
        assert!(matches!(to_value(&rt, &json), Err(ScenarioError::BadArgument(_))));
    }

    #[test]
    fn out_of_range_integer_is_rejected() {
        let rt = Runtime::default();
        let json: serde_json::Value = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(to_value(&rt, &json), Err(ScenarioError::BadArgument(_))));

        let json: serde_json::Value = serde_json::from_str("-9223372036854775808").unwrap();
        assert_eq!(to_value(&rt, &json).unwrap(), Value::Int(i64::MIN));
    }
}
