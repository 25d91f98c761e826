//! Action registry and dispatch.
//!
//! The registry is filled before the implementation starts and is read-only
//! afterwards. Every registered handler's schema is reflected once, at
//! registration; dispatch only looks it up.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bot::BotRef;
use crate::error::{ActionError, SchemaError};
use crate::extract::ActionContext;
use crate::handler::{ActionHandler, BoxedActionHandler, into_handler};
use crate::protocol::ActionResponse;
use crate::schema::{ActionSchema, TypeScope};
use crate::value::Map;

/// What to do when an action name is registered twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the newest handler and log a warning.
    #[default]
    Replace,
    /// Fail the second registration.
    Reject,
}

/// Dispatch behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOptions {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Fail requests carrying params the handler does not declare.
    #[serde(default)]
    pub reject_unknown_params: bool,
}

/// A registered handler with its cached schema.
#[derive(Clone)]
pub struct RegisteredAction {
    schema: Arc<ActionSchema>,
    handler: BoxedActionHandler,
}

impl RegisteredAction {
    pub fn schema(&self) -> &ActionSchema {
        &self.schema
    }
}

/// Maps action names to handlers.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, RegisteredAction>,
    options: DispatchOptions,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DispatchOptions) -> Self {
        Self {
            actions: HashMap::new(),
            options,
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Applies to registrations made after the call and to every dispatch.
    pub fn set_options(&mut self, options: DispatchOptions) {
        self.options = options;
    }

    /// Registers `handler` under `name`.
    ///
    /// Reflects the handler's parameters and resolves their types; a handler
    /// whose types cannot be resolved is rejected here rather than at call
    /// time.
    pub fn register<H, T>(&mut self, name: impl Into<String>, handler: H) -> Result<(), SchemaError>
    where
        H: ActionHandler<T>,
        T: 'static,
    {
        let name = name.into();
        let mut scope = TypeScope::new();
        H::register_types(&mut scope);
        let schema = ActionSchema::analyze(H::parameters(), scope)?;

        if self.actions.contains_key(&name) {
            match self.options.duplicate_policy {
                DuplicatePolicy::Reject => return Err(SchemaError::DuplicateAction(name)),
                DuplicatePolicy::Replace => {
                    warn!(action = %name, "Action handler replaced");
                }
            }
        }

        debug!(
            action = %name,
            params = schema.wire_parameters().count(),
            "Registered action"
        );
        self.actions.insert(
            name,
            RegisteredAction {
                schema: Arc::new(schema),
                handler: into_handler(handler),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAction> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.actions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs `action` and packages the outcome.
    ///
    /// Never fails: unknown actions, bad params, a missing bot, handler
    /// errors and handler panics all become `failed` responses.
    pub async fn dispatch(&self, action: &str, params: Map, bot: Option<BotRef>) -> ActionResponse {
        ActionResponse::from_result(self.call(action, params, bot).await)
    }

    async fn call(
        &self,
        action: &str,
        params: Map,
        bot: Option<BotRef>,
    ) -> Result<crate::Value, ActionError> {
        let Some(registered) = self.actions.get(action) else {
            debug!(action = %action, "Unsupported action");
            return Err(ActionError::unsupported_action(action));
        };

        if self.options.reject_unknown_params {
            let unknown: Vec<_> = params
                .keys()
                .filter(|key| !registered.schema.accepts(key))
                .map(String::as_str)
                .collect();
            if !unknown.is_empty() {
                return Err(ActionError::unsupported_param(format!(
                    "unsupported params: {}",
                    unknown.join(", ")
                )));
            }
        }

        let ctx = ActionContext::new(action, params, bot);
        let result = match AssertUnwindSafe((registered.handler)(ctx))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                warn!(action = %action, panic = %message, "Action handler panicked");
                Err(ActionError::internal(message))
            }
        };

        if let Err(err) = &result {
            debug!(
                action = %action,
                retcode = err.retcode,
                message = %err.message,
                "Action failed"
            );
        }
        result
    }
}
