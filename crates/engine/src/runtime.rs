//! Function invocation over the plugin registry and module instance pool.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};

use borealis_core::{
    ClassificationResult, CoreError, ExecutionContext, FunctionInvoker, GraphQlExecutor, HostEnv,
    ModelInfo, ModelProvider,
};
use borealis_plugin::{InstanceOutput, PluginError, PluginRegistry, WasmHost};

use crate::error::{EngineError, Result};

/// One finished invocation: the function's outcome plus everything the
/// guest wrote to its output streams.
pub struct Invocation {
    /// The decoded result, or the failure that ended the call.
    pub result: std::result::Result<Value, PluginError>,

    /// Captured stdout/stderr.
    pub output: InstanceOutput,

    /// Execution id assigned to this invocation.
    pub execution_id: String,
}

/// Dispatches function calls: looks up the plugin, acquires an isolated
/// module instance, invokes, and closes the instance.
///
/// The host environment is wired after construction because its collection
/// service calls back into this runtime for embedding.
pub struct FunctionRuntime {
    host: Arc<WasmHost>,
    registry: Arc<PluginRegistry>,
    env: OnceLock<Arc<HostEnv>>,
}

impl FunctionRuntime {
    /// Creates a runtime over a host and plugin registry.
    pub fn new(host: Arc<WasmHost>, registry: Arc<PluginRegistry>) -> Self {
        Self {
            host,
            registry,
            env: OnceLock::new(),
        }
    }

    /// Wires the host environment. Later calls are ignored.
    pub fn wire(&self, env: Arc<HostEnv>) {
        let _ = self.env.set(env);
    }

    /// The plugin registry behind this runtime.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    fn env(&self) -> Result<Arc<HostEnv>> {
        self.env.get().cloned().ok_or(EngineError::NotWired)
    }

    /// Invokes a function with named parameters, returning the outcome
    /// together with the captured guest output.
    ///
    /// Returns `Err` only when the call could not start (unknown function,
    /// instantiation failure); guest failures come back inside
    /// [`Invocation::result`] so callers still see the output streams.
    pub fn invoke(
        &self,
        ctx: &ExecutionContext,
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<Invocation> {
        let (plugin, _) = self
            .registry
            .find_function(name)
            .ok_or_else(|| PluginError::FunctionNotFound(name.to_string()))?;

        // fresh execution id per invocation, shared cancellation
        let call_ctx = ctx.child().with_plugin(plugin.metadata().clone());
        let execution_id = call_ctx.execution_id().to_string();

        tracing::debug!(function = name, execution_id = %execution_id, "invoking function");

        let mut instance = self.host.acquire(&plugin, call_ctx, self.env()?)?;
        let result = instance.call_function(name, params);
        let output = instance.close();

        Ok(Invocation {
            result,
            output,
            execution_id,
        })
    }
}

impl FunctionInvoker for FunctionRuntime {
    fn validate_embedder(&self, name: &str) -> borealis_core::Result<()> {
        let (plugin, _) = self
            .registry
            .find_function(name)
            .ok_or_else(|| CoreError::UnknownFunction(name.to_string()))?;
        borealis_plugin::validate_embedder(&plugin, name).map_err(Into::into)
    }

    fn call(
        &self,
        ctx: &ExecutionContext,
        name: &str,
        args: Vec<Value>,
    ) -> borealis_core::Result<Value> {
        let (_, function) = self
            .registry
            .find_function(name)
            .ok_or_else(|| CoreError::UnknownFunction(name.to_string()))?;

        // positional arguments map onto declared parameters in order
        let mut params = Map::new();
        for (param, arg) in function.parameters.iter().zip(args) {
            params.insert(param.name.clone(), arg);
        }

        let invocation = self.invoke(ctx, name, &params).map_err(CoreError::from)?;
        invocation.result.map_err(Into::into)
    }
}

/// Placeholder for deployments without an attached GraphQL engine; the
/// `executeGQL` host function fails cleanly instead of hanging.
pub struct DetachedGraphQl;

impl GraphQlExecutor for DetachedGraphQl {
    fn execute(
        &self,
        _ctx: &ExecutionContext,
        _query: &str,
        _variables: &str,
    ) -> borealis_core::Result<String> {
        Err(CoreError::Graphql(
            "no GraphQL engine is attached to this runtime".to_string(),
        ))
    }
}

/// Placeholder for deployments without configured model providers.
pub struct UnconfiguredModels;

impl ModelProvider for UnconfiguredModels {
    fn lookup_model(&self, name: &str) -> borealis_core::Result<ModelInfo> {
        Err(CoreError::Model(format!("model {name} is not configured")))
    }

    fn invoke_model(
        &self,
        _ctx: &ExecutionContext,
        model: &str,
        _input: &str,
    ) -> borealis_core::Result<String> {
        Err(CoreError::Model(format!("model {model} is not configured")))
    }

    fn compute_embedding(
        &self,
        _ctx: &ExecutionContext,
        model: &str,
        _sentences: &HashMap<String, String>,
    ) -> borealis_core::Result<HashMap<String, Vec<f64>>> {
        Err(CoreError::Model(format!("model {model} is not configured")))
    }

    fn invoke_classifier(
        &self,
        _ctx: &ExecutionContext,
        model: &str,
        _sentences: &HashMap<String, String>,
    ) -> borealis_core::Result<HashMap<String, ClassificationResult>> {
        Err(CoreError::Model(format!("model {model} is not configured")))
    }

    fn invoke_text_generator(
        &self,
        _ctx: &ExecutionContext,
        model: &str,
        _instruction: &str,
        _sentence: &str,
        _format: &str,
    ) -> borealis_core::Result<String> {
        Err(CoreError::Model(format!("model {model} is not configured")))
    }
}
