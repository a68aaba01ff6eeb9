use std::sync::Arc;

use crate::{
    Engine, EngineConfig, OperationRequest, TenantModuleBootstrapper,
    executor::OperationError,
    instrument::Instrumentation,
    response::ExecutionOutput,
};

/// Installs a `RUST_LOG`-driven tracing subscriber for the current test
/// process; repeated calls are no-ops.
pub fn init_tracing() {
    #[cfg(test)]
    {
        use tracing_subscriber::EnvFilter;

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// An engine stood up for one test, with conveniences for running
/// operations straight to JSON.
pub struct FeatureTest {
    engine: Engine,
}

impl FeatureTest {
    /// Starts building a [`FeatureTest`].
    pub fn builder() -> FeatureTestBuilder {
        FeatureTestBuilder::default()
    }

    /// The engine under test.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Runs an operation, panicking on anything but a (possibly erroring)
    /// execution.
    pub async fn run(&self, operation: &str) -> serde_json::Value {
        match self.engine.execute(OperationRequest::new(operation)).await {
            Ok(output) => output.to_json(),
            Err(e) => panic!("operation failed to execute: {e}"),
        }
    }

    /// Runs an operation with JSON variables.
    pub async fn run_with_variables(
        &self,
        operation: &str,
        variables: serde_json::Value,
    ) -> serde_json::Value {
        let request = OperationRequest::new(operation).variables_json(variables);
        match self.engine.execute(request).await {
            Ok(output) => output.to_json(),
            Err(e) => panic!("operation failed to execute: {e}"),
        }
    }

    /// Runs a request, surfacing operation-level failures.
    pub async fn try_run(
        &self,
        request: OperationRequest,
    ) -> Result<ExecutionOutput, OperationError> {
        self.engine.execute(request).await
    }
}

/// Builder for a [`FeatureTest`].
#[derive(Default)]
pub struct FeatureTestBuilder {
    sdl: String,
    modules: Vec<TenantModuleBootstrapper>,
    instrumentations: Vec<Arc<dyn Instrumentation>>,
    config: EngineConfig,
}

impl FeatureTestBuilder {
    /// The schema under test, as SDL.
    #[must_use]
    pub fn sdl(mut self, sdl: impl Into<String>) -> Self {
        self.sdl = sdl.into();
        self
    }

    /// Adds a module configured through the closure.
    #[must_use]
    pub fn module(mut self, configure: impl FnOnce(&mut TenantModuleBootstrapper)) -> Self {
        let mut module = TenantModuleBootstrapper::new();
        configure(&mut module);
        self.modules.push(module);
        self
    }

    /// Appends an instrumentation to the chain.
    #[must_use]
    pub fn instrumentation(mut self, instrumentation: Arc<dyn Instrumentation>) -> Self {
        self.instrumentations.push(instrumentation);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Assembles the engine, panicking on schema or bootstrap errors.
    pub fn build(self) -> FeatureTest {
        init_tracing();

        let mut builder = Engine::builder().schema_sdl(self.sdl).config(self.config);
        for module in self.modules {
            builder = builder.module(module);
        }
        for instrumentation in self.instrumentations {
            builder = builder.instrumentation(instrumentation);
        }

        match builder.build() {
            Ok(engine) => FeatureTest { engine },
            Err(e) => panic!("failed to assemble test engine: {e}"),
        }
    }
}
