use super::{Worker, WorkerContext};
use serde_json::Value;

type Hook = Box<dyn Fn(Value) -> Value + Send + Sync>;

/// A worker backed by a closure.
pub struct FnWorker<F> {
    execute: F,
    input_hook: Option<Hook>,
    output_hook: Option<Hook>,
}

impl<F> FnWorker<F>
where
    F: Fn(&Value, &WorkerContext) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(execute: F) -> Self {
        Self {
            execute,
            input_hook: None,
            output_hook: None,
        }
    }

    /// Install an input pre-processing hook.
    pub fn with_input_hook(
        mut self,
        hook: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.input_hook = Some(Box::new(hook));
        self
    }

    /// Install a result post-processing hook.
    pub fn with_output_hook(
        mut self,
        hook: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.output_hook = Some(Box::new(hook));
        self
    }
}

impl<F> Worker for FnWorker<F>
where
    F: Fn(&Value, &WorkerContext) -> anyhow::Result<Value> + Send + Sync,
{
    fn execute(&self, input: &Value, ctx: &WorkerContext) -> anyhow::Result<Value> {
        (self.execute)(input, ctx)
    }

    fn prepare_input(&self, input: Value) -> Value {
        match &self.input_hook {
            Some(hook) => hook(input),
            None => input,
        }
    }

    fn prepare_output(&self, output: Value) -> Value {
        match &self.output_hook {
            Some(hook) => hook(output),
            None => output,
        }
    }
}

impl<F> std::fmt::Debug for FnWorker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnWorker")
            .field("input_hook", &self.input_hook.is_some())
            .field("output_hook", &self.output_hook.is_some())
            .finish()
    }
}
