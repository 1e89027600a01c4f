//! State types and their explicit field and method tables.
//!
//! A state type's fields are its serde keys. Methods and computed values are
//! listed by name and dispatched through [`StateType::invoke`] and
//! [`StateType::compute`]; nothing is discovered at runtime.
//!
//! ```ignore
//! #[derive(Default, Serialize, Deserialize)]
//! struct CounterState { count: i64 }
//!
//! impl StateType for CounterState {
//!     fn methods() -> &'static [&'static str] { &["increment"] }
//!
//!     fn invoke(&mut self, method: &str, _args: &Value) -> Result<Value, ModelError> {
//!         match method {
//!             "increment" => { self.count += 1; Ok(json!(self.count)) }
//!             other => Err(ModelError::UnknownMethod(other.to_string())),
//!         }
//!     }
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use state_protocol_types::StateData;
use tracing::warn;

use crate::ModelError;

/// A concrete state type.
pub trait StateType: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Key used to look up the declaration. Defaults to the unqualified type name.
    fn type_ident() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Callable method names.
    fn methods() -> &'static [&'static str] {
        &[]
    }

    /// Computed value names.
    fn computations() -> &'static [&'static str] {
        &[]
    }

    fn compute(&self, _name: &str) -> Option<Value> {
        None
    }

    fn invoke(&mut self, method: &str, _args: &Value) -> Result<Value, ModelError> {
        Err(ModelError::UnknownMethod(method.to_string()))
    }
}

/// Deserialize a method's arguments.
pub fn parse_args<A: DeserializeOwned>(method: &str, args: &Value) -> Result<A, ModelError> {
    serde_json::from_value(args.clone()).map_err(|e| ModelError::InvalidArguments {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Object-safe view of a [`StateType`] instance, used by the proxy.
pub trait StateModel: Send + Sync {
    /// Current value of a field; `None` if the type has no such field.
    fn read_field(&self, field: &str) -> Result<Option<Value>, ModelError>;

    fn write_field(&mut self, field: &str, value: Value) -> Result<(), ModelError>;

    fn compute_value(&self, name: &str) -> Option<Value>;

    fn call_method(&mut self, method: &str, args: &Value) -> Result<Value, ModelError>;

    /// Every field, by serde key.
    fn capture(&self) -> Result<StateData, ModelError>;

    /// Replace the whole instance with a previous capture.
    fn restore(&mut self, data: StateData) -> Result<(), ModelError>;

    /// Copy loaded fields by name. Unknown keys are ignored, missing keys keep
    /// their current values, and a value of the wrong shape is skipped.
    fn apply(&mut self, data: &StateData) -> Result<usize, ModelError>;
}

fn to_object<T: Serialize>(value: &T) -> Result<StateData, ModelError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(ModelError::NotAnObject),
    }
}

impl<T: StateType> StateModel for T {
    fn read_field(&self, field: &str) -> Result<Option<Value>, ModelError> {
        let mut fields = to_object(self)?;
        Ok(fields.remove(field))
    }

    fn write_field(&mut self, field: &str, value: Value) -> Result<(), ModelError> {
        let mut fields = to_object(self)?;
        if !fields.contains_key(field) {
            return Err(ModelError::UnknownField(field.to_string()));
        }
        fields.insert(field.to_string(), value);
        *self = serde_json::from_value(Value::Object(fields))?;
        Ok(())
    }

    fn compute_value(&self, name: &str) -> Option<Value> {
        self.compute(name)
    }

    fn call_method(&mut self, method: &str, args: &Value) -> Result<Value, ModelError> {
        if !T::methods().contains(&method) {
            return Err(ModelError::UnknownMethod(method.to_string()));
        }
        self.invoke(method, args)
    }

    fn capture(&self) -> Result<StateData, ModelError> {
        to_object(self)
    }

    fn restore(&mut self, data: StateData) -> Result<(), ModelError> {
        *self = serde_json::from_value(Value::Object(data))?;
        Ok(())
    }

    fn apply(&mut self, data: &StateData) -> Result<usize, ModelError> {
        let mut fields = to_object(self)?;
        let mut applied = 0;
        for (key, value) in data {
            if !fields.contains_key(key) {
                continue;
            }
            let mut candidate = fields.clone();
            candidate.insert(key.clone(), value.clone());
            match serde_json::from_value::<T>(Value::Object(candidate.clone())) {
                Ok(_) => {
                    fields = candidate;
                    applied += 1;
                }
                Err(e) => {
                    warn!(
                        state_type = T::type_ident(),
                        field = %key,
                        error = %e,
                        "Stored value does not fit field, keeping default"
                    );
                }
            }
        }
        *self = serde_json::from_value(Value::Object(fields))?;
        Ok(applied)
    }
}
