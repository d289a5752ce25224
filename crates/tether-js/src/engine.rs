//! Boa context paired with the registry that pins its values.

use std::time::Instant;

use boa_engine::{Context, JsValue, Source};
use tether_core::{EmbeddedRuntime, Registry};
use tracing::{debug, warn};

use crate::config::{EngineConfig, LimitsConfig};
use crate::error::ScriptResult;

/// One JavaScript interpreter instance as the bridge sees it.
///
/// Values held in the registry are ordinary rooted boa values, so the engine's
/// collector keeps them alive until the registry lets go of them.
pub struct JsEngine {
    /// The Boa JavaScript context
    context: Context,
    /// Values pinned on behalf of host-side references
    registry: Registry<JsValue>,
}

impl JsEngine {
    /// Create a context with `config`'s limits and registry settings applied
    ///
    /// # Errors
    /// Returns `Config` if the registry's initial slots cannot be reserved
    pub fn new(config: &EngineConfig) -> ScriptResult<Self> {
        let registry = Registry::with_config(&config.bridge.registry)?;
        Ok(Self::with_registry(&config.limits, registry))
    }

    /// Create a context with `limits` applied, pinning into `registry`
    pub fn with_registry(limits: &LimitsConfig, registry: Registry<JsValue>) -> Self {
        let mut context = Context::default();

        let runtime_limits = context.runtime_limits_mut();
        if let Some(limit) = limits.loop_iteration_limit {
            runtime_limits.set_loop_iteration_limit(limit);
        }
        if let Some(limit) = limits.recursion_limit {
            runtime_limits.set_recursion_limit(limit);
        }

        Self { context, registry }
    }

    /// The underlying context
    pub fn context(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Evaluate `code` and run pending jobs.
    ///
    /// # Errors
    /// Returns `Execution` if the code fails to parse or throws
    pub fn eval(&mut self, code: &str) -> ScriptResult<JsValue> {
        let eval_start = Instant::now();
        let result = self.context.eval(Source::from_bytes(code))?;

        // Settle promises created by the script
        if let Err(error) = self.context.run_jobs() {
            warn!(%error, "pending jobs failed after evaluation");
        }

        debug!(
            eval_time_secs = eval_start.elapsed().as_secs_f64(),
            "evaluated script"
        );
        Ok(result)
    }
}

impl EmbeddedRuntime for JsEngine {
    type Value = JsValue;

    fn registry(&self) -> &Registry<JsValue> {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut Registry<JsValue> {
        &mut self.registry
    }

    fn same_value(&self, left: &JsValue, right: &JsValue) -> bool {
        left.strict_equals(right)
    }

    fn close(mut self) {
        let unpinned = self.registry.clear();
        debug!(unpinned, "closing JavaScript context");
        drop(self.context);
    }
}
