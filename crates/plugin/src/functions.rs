//! Function invocation: named parameters in, decoded result out.

use serde_json::{Map, Value};

use borealis_core::Function;

use crate::adapter::WasmAdapter;
use crate::error::{PluginError, Result};
use crate::instance::ModuleInstance;
use crate::registry::Plugin;

impl ModuleInstance {
    /// Invokes an exported function with named parameters.
    ///
    /// Parameters are encoded in declaration order: a missing parameter
    /// falls back to its declared default, then to null when the type is
    /// nullable, and otherwise fails the call. Every pin taken while
    /// encoding is released before this returns, on success and on error.
    pub fn call_function(&mut self, name: &str, params: &Map<String, Value>) -> Result<Value> {
        let function = self
            .plugin()
            .metadata()
            .export(name)
            .cloned()
            .ok_or_else(|| PluginError::FunctionNotFound(name.to_string()))?;

        let mut wa = self.adapter()?;
        let frame = wa.enter_pin_frame();
        let outcome = invoke(&mut wa, &function, params);
        let cleanup = wa.exit_pin_frame(frame);

        let value = outcome?;
        cleanup?;
        if wa.live_pins() != 0 {
            return Err(PluginError::PinLeak(wa.live_pins()));
        }
        Ok(value)
    }
}

fn invoke(wa: &mut WasmAdapter<'_>, function: &Function, params: &Map<String, Value>) -> Result<Value> {
    let handlers = wa.handlers();
    let type_info = handlers.type_info().clone();

    let mut words = Vec::with_capacity(function.parameters.len());
    for param in &function.parameters {
        let value = match params.get(&param.name) {
            Some(v) => v.clone(),
            None => match &param.default {
                Some(default) => default.clone(),
                None if type_info.is_nullable(&param.type_name) => Value::Null,
                None => return Err(PluginError::MissingParameter(param.name.clone())),
            },
        };

        let handler = handlers.get(&param.type_name)?;
        words.extend(handler.encode(wa, &value)?);
    }

    let results = wa.invoke_raw(&function.name, &words)?;

    match function.results.as_slice() {
        [] => Ok(Value::Null),
        [result] => {
            let handler = handlers.get(&result.type_name)?;
            handler.decode(wa, &results)
        }
        _ => Err(PluginError::Marshal(format!(
            "function {} declares multiple results",
            function.name
        ))),
    }
}

/// Validates that the named export can serve as an embedder: exactly one
/// `string[]` parameter and exactly one `f32[][]` or `f64[][]` result.
pub fn validate_embedder(plugin: &Plugin, name: &str) -> Result<()> {
    let function = plugin
        .metadata()
        .export(name)
        .ok_or_else(|| PluginError::FunctionNotFound(name.to_string()))?;

    let ti = plugin.type_info();

    if function.parameters.len() != 1 || function.results.len() != 1 {
        return Err(PluginError::InvalidEmbedder);
    }

    let param = &function.parameters[0].type_name;
    match ti.array_element(param) {
        Some(element) if ti.is_string(element) => {}
        _ => return Err(PluginError::InvalidEmbedder),
    }

    let result = &function.results[0].type_name;
    let inner = ti
        .array_element(result)
        .ok_or(PluginError::InvalidEmbedder)?;
    let element = ti.array_element(inner).ok_or(PluginError::InvalidEmbedder)?;
    if !ti.is_float(element) {
        return Err(PluginError::InvalidEmbedder);
    }

    Ok(())
}
