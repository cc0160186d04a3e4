//! The GraphQL data source.
//!
//! The external GraphQL engine treats the runtime as a data source: it
//! hands over an envelope naming a function and its selection set, and
//! receives the standard `{"data":...}` / `{"errors":[...]}` document.
//! Guest output lines become GraphQL errors with a severity recovered
//! from their prefix; the result value is reshaped against the selection
//! set before emission.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use borealis_core::ExecutionContext;

use crate::error::{EngineError, Result};
use crate::runtime::FunctionRuntime;
use crate::template::{CallInfo, TemplateField};

/// A GraphQL error in the response document.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlError {
    pub message: String,
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ErrorExtensions>,
}

/// Error extensions: the severity recovered from the guest's output line.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorExtensions {
    pub level: String,
}

/// The data source entry point.
pub struct Source {
    runtime: Arc<FunctionRuntime>,
}

impl Source {
    /// Creates a data source over a function runtime.
    pub fn new(runtime: Arc<FunctionRuntime>) -> Self {
        Self { runtime }
    }

    /// The function runtime behind this source.
    pub fn runtime(&self) -> &Arc<FunctionRuntime> {
        &self.runtime
    }

    /// Resolves one envelope and writes the response document.
    pub fn load(
        &self,
        ctx: &ExecutionContext,
        input: &[u8],
        writer: &mut dyn Write,
    ) -> Result<()> {
        let call_info: CallInfo =
            serde_json::from_slice(input).map_err(|e| EngineError::Envelope(e.to_string()))?;

        let (result, errors, fn_err) = self.call_function(ctx, &call_info);
        if let Some(ref err) = fn_err {
            tracing::error!(function = %call_info.function.name, error = %err, "Failed to call function.");
        }

        write_response(writer, result, errors, fn_err, &call_info)
    }

    /// Runs the function, converting captured output lines to errors.
    /// A null result is treated as absent, matching the response shapes
    /// in [`write_response`].
    fn call_function(
        &self,
        ctx: &ExecutionContext,
        call_info: &CallInfo,
    ) -> (Option<Value>, Vec<GraphQlError>, Option<EngineError>) {
        let invocation =
            match self
                .runtime
                .invoke(ctx, &call_info.function.name, &call_info.parameters)
            {
                Ok(invocation) => invocation,
                Err(err) => return (None, Vec::new(), Some(err)),
            };

        // stdout lines first, then stderr lines
        let mut errors = transform_errors(&invocation.output.stdout, &call_info.function);
        errors.extend(transform_errors(
            &invocation.output.stderr,
            &call_info.function,
        ));

        match invocation.result {
            Ok(Value::Null) => (None, errors, None),
            Ok(value) => (Some(value), errors, None),
            Err(err) => (None, errors, Some(err.into())),
        }
    }
}

fn write_response(
    writer: &mut dyn Write,
    result: Option<Value>,
    mut errors: Vec<GraphQlError>,
    fn_err: Option<EngineError>,
    call_info: &CallInfo,
) -> Result<()> {
    // surface the function error unless it describes an internal defect
    if let Some(err) = fn_err {
        if err.is_user_visible() {
            errors.push(GraphQlError {
                message: err.to_string(),
                path: vec![call_info.function.alias_or_name().to_string()],
                extensions: Some(ErrorExtensions {
                    level: "error".to_string(),
                }),
            });
        }
    }

    let json_errors = if errors.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&errors).map_err(|e| EngineError::Serialize(e.to_string()))?)
    };

    // with no result to shape, errors stand alone
    if result.is_none() {
        if let Some(errs) = &json_errors {
            write!(writer, "{{\"errors\":{errs}}}")?;
            return Ok(());
        }
    }

    let value = result.unwrap_or(Value::Null);
    let shaped = transform_data(&value, &call_info.function)?;
    let data =
        serde_json::to_string(&shaped).map_err(|e| EngineError::Serialize(e.to_string()))?;

    match json_errors {
        Some(errs) => write!(writer, "{{\"data\":{data},\"errors\":{errs}}}")?,
        None => write!(writer, "{{\"data\":{data}}}")?,
    }

    Ok(())
}

/// Wraps the shaped value under the field's alias-or-name.
fn transform_data(value: &Value, tf: &TemplateField) -> Result<Value> {
    let shaped = transform_value(value, tf)?;
    let mut out = Map::new();
    out.insert(tf.alias_or_name().to_string(), shaped);
    Ok(Value::Object(out))
}

/// Reshapes a value against a selection set.
///
/// A template without children passes the value through untouched.
/// Objects are rebuilt with exactly the selected children, keyed by
/// alias-or-name in selection order; arrays shape element-wise with the
/// same template; anything else cannot carry a selection.
pub fn transform_value(value: &Value, tf: &TemplateField) -> Result<Value> {
    if tf.fields.is_empty() {
        return Ok(value.clone());
    }

    match value {
        Value::Object(obj) => {
            let mut shaped = Map::new();
            for field in &tf.fields {
                let child = obj.get(&field.name).ok_or_else(|| {
                    EngineError::Shape(format!("field '{}' not found in result", field.name))
                })?;
                shaped.insert(
                    field.alias_or_name().to_string(),
                    transform_value(child, field)?,
                );
            }
            Ok(Value::Object(shaped))
        }

        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| transform_value(item, tf))
                .collect::<Result<_>>()?,
        )),

        _ => Err(EngineError::Shape("expected object or array".to_string())),
    }
}

/// Converts captured output to GraphQL errors, one per non-empty line.
fn transform_errors(output: &str, tf: &TemplateField) -> Vec<GraphQlError> {
    output
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| transform_error(line, tf))
        .collect()
}

/// Recovers a severity from a recognized line prefix; unrecognized lines
/// become messages without extensions.
fn transform_error(message: &str, tf: &TemplateField) -> GraphQlError {
    let (level, message) = match message.split_once(": ") {
        Some(("Debug", rest)) => (Some("debug"), rest),
        Some(("Info", rest)) => (Some("info"), rest),
        Some(("Warning", rest)) => (Some("warning"), rest),
        Some(("Error", rest)) => (Some("error"), rest),
        Some(("abort", rest)) => (Some("fatal"), rest),
        _ => (None, message),
    };

    GraphQlError {
        message: message.to_string(),
        path: vec![tf.alias_or_name().to_string()],
        extensions: level.map(|l| ErrorExtensions {
            level: l.to_string(),
        }),
    }
}
