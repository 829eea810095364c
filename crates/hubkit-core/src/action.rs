// ── Actions ──
//
// Invokable operations attached to entities and entity sets. Adapters
// implement `Action`; callers go through `ActionHandle`, which checks
// option keys and coerces values against the live argument schema before
// the adapter sees them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::error::{CoreError, Result};
use crate::path::Path;
use crate::schema::Args;

/// Named option values passed to an action.
pub type Options = serde_json::Map<String, Value>;

#[async_trait]
pub trait Action: Send + Sync {
    fn path(&self) -> Path;

    fn label(&self) -> String;

    /// Argument schema. Called on every invocation and reflection; adapters
    /// must not cache it across calls.
    async fn args(&self, ctx: &Context) -> Result<Args>;

    /// Perform the remote call with already-validated options and return
    /// the raw remote response.
    async fn invoke(&self, options: Options, ctx: &Context) -> Result<Value>;
}

/// Checked entry point to an [`Action`].
#[derive(Clone)]
pub struct ActionHandle {
    inner: Arc<dyn Action>,
}

impl ActionHandle {
    pub fn new(action: Arc<dyn Action>) -> Self {
        Self { inner: action }
    }

    pub fn path(&self) -> Path {
        self.inner.path()
    }

    pub fn label(&self) -> String {
        self.inner.label()
    }

    pub async fn args(&self, ctx: &Context) -> Result<Args> {
        self.inner.args(ctx).await
    }

    /// Validate `options` against the current args, then invoke.
    ///
    /// Unknown keys and values that fail coercion are rejected with
    /// [`CoreError::Validation`] before any remote call.
    pub async fn invoke(&self, options: Options, ctx: &Context) -> Result<Value> {
        let path = self.inner.path();
        let args = self.inner.args(ctx).await?;

        let mut checked = Options::with_capacity(options.len());
        for (key, value) in options {
            let Some(arg) = args.get(&key) else {
                return Err(CoreError::validation(format!(
                    "unknown option '{key}' for action '{path}'"
                )));
            };
            checked.insert(key.clone(), arg.schema.coerce(&key, &value)?);
        }

        debug!(action = %path, options = checked.len(), "invoking action");
        self.inner.invoke(checked, ctx).await
    }
}

impl From<Arc<dyn Action>> for ActionHandle {
    fn from(action: Arc<dyn Action>) -> Self {
        Self::new(action)
    }
}

impl std::fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandle")
            .field("path", &self.inner.path().to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::schema::FieldSchema;

    /// Records the options it was invoked with.
    #[derive(Default)]
    struct Call {
        args_calls: AtomicUsize,
        seen: Mutex<Vec<Options>>,
    }

    #[async_trait]
    impl Action for Call {
        fn path(&self) -> Path {
            Path::new(["projects", "495"]).action("call")
        }

        fn label(&self) -> String {
            "Call".into()
        }

        async fn args(&self, _ctx: &Context) -> Result<Args> {
            self.args_calls.fetch_add(1, Ordering::SeqCst);
            let mut args = Args::new();
            args.insert("channel".into(), FieldSchema::integer("Channel"));
            args.insert("address".into(), FieldSchema::string("Phone number"));
            Ok(args)
        }

        async fn invoke(&self, options: Options, _ctx: &Context) -> Result<Value> {
            self.seen.lock().unwrap().push(options);
            Ok(json!({"call_log_id": 1}))
        }
    }

    fn options(value: Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn coerces_options_before_invoking() {
        let call = Arc::new(Call::default());
        let handle = ActionHandle::new(call.clone());

        let result = handle
            .invoke(
                options(json!({"channel": "3", "address": "5551234"})),
                &Context::anonymous(),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({"call_log_id": 1}));
        assert_eq!(
            call.seen.lock().unwrap()[0],
            options(json!({"channel": 3, "address": "5551234"}))
        );
    }

    #[tokio::test]
    async fn unknown_option_never_reaches_remote() {
        let call = Arc::new(Call::default());
        let handle = ActionHandle::new(call.clone());

        let err = handle
            .invoke(options(json!({"chanel": 3})), &Context::anonymous())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(err.to_string().contains("chanel"));
        assert!(call.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn args_are_recomputed_each_call() {
        let call = Arc::new(Call::default());
        let handle = ActionHandle::new(call.clone());
        let ctx = Context::anonymous();

        handle.args(&ctx).await.unwrap();
        handle.invoke(Options::new(), &ctx).await.unwrap();
        assert_eq!(call.args_calls.load(Ordering::SeqCst), 2);
    }
}
