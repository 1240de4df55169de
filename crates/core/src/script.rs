// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam to the sandboxed scripting runtime.
//!
//! Script fields hand their source to the runtime once at ctx init and invoke
//! the compiled handle on every calculation. Timeouts and sandboxing belong to
//! the runtime.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors reported by the scripting runtime
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    #[error("script compilation failed: {0}")]
    Compile(String),
    #[error("script execution failed: {0}")]
    Execution(String),
    #[error("unknown script handle: {0}")]
    UnknownScript(String),
}

/// Handle to a script compiled by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptId(pub String);

impl std::fmt::Display for ScriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Adapter for the external scripting runtime
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Compile `script` taking positional parameters named `arg_names`.
    async fn compile(&self, script: &str, arg_names: &[String]) -> Result<ScriptId, ScriptError>;

    /// Invoke a compiled script with positional arguments.
    async fn invoke(&self, id: &ScriptId, args: Vec<Value>) -> Result<Value, ScriptError>;

    /// Drop a compiled script.
    async fn release(&self, id: &ScriptId);
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ScriptEngine, ScriptError, ScriptId};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::Arc;

    type Handler = Arc<dyn Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync>;

    /// Recorded script invocation
    #[derive(Debug, Clone)]
    pub struct ScriptCall {
        pub id: ScriptId,
        pub args: Vec<Value>,
    }

    struct FakeScriptState {
        compiled: Vec<(ScriptId, String, Vec<String>)>,
        released: Vec<ScriptId>,
        calls: Vec<ScriptCall>,
        fail_compile: Option<String>,
    }

    /// Fake scripting runtime that answers invocations with a handler closure
    #[derive(Clone)]
    pub struct FakeScriptEngine {
        inner: Arc<Mutex<FakeScriptState>>,
        handler: Handler,
    }

    impl Default for FakeScriptEngine {
        fn default() -> Self {
            Self::new(|_| Ok(Value::Null))
        }
    }

    impl FakeScriptEngine {
        pub fn new(handler: impl Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync + 'static) -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeScriptState {
                    compiled: Vec::new(),
                    released: Vec::new(),
                    calls: Vec::new(),
                    fail_compile: None,
                })),
                handler: Arc::new(handler),
            }
        }

        /// Make every subsequent compile fail with `reason`.
        pub fn fail_compile(&self, reason: impl Into<String>) {
            self.inner.lock().fail_compile = Some(reason.into());
        }

        /// Scripts compiled so far, with their parameter names
        pub fn compiled(&self) -> Vec<(String, Vec<String>)> {
            self.inner.lock().compiled.iter().map(|(_, src, names)| (src.clone(), names.clone())).collect()
        }

        pub fn released(&self) -> Vec<ScriptId> {
            self.inner.lock().released.clone()
        }

        pub fn calls(&self) -> Vec<ScriptCall> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl ScriptEngine for FakeScriptEngine {
        async fn compile(&self, script: &str, arg_names: &[String]) -> Result<ScriptId, ScriptError> {
            let mut inner = self.inner.lock();
            if let Some(reason) = &inner.fail_compile {
                return Err(ScriptError::Compile(reason.clone()));
            }
            let id = ScriptId(format!("script-{}", inner.compiled.len() + 1));
            inner.compiled.push((id.clone(), script.to_string(), arg_names.to_vec()));
            Ok(id)
        }

        async fn invoke(&self, id: &ScriptId, args: Vec<Value>) -> Result<Value, ScriptError> {
            {
                let mut inner = self.inner.lock();
                if !inner.compiled.iter().any(|(known, _, _)| known == id) {
                    return Err(ScriptError::UnknownScript(id.to_string()));
                }
                inner.calls.push(ScriptCall { id: id.clone(), args: args.clone() });
            }
            (self.handler)(&args)
        }

        async fn release(&self, id: &ScriptId) {
            self.inner.lock().released.push(id.clone());
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeScriptEngine, ScriptCall};
