//! Handler parameter extraction.
//!
//! Each handler argument implements [`FromAction`]. An extractor both
//! describes the wire parameters it consumes (for the schema) and builds
//! itself from an [`ActionContext`] when the action is called.

use std::ops::{Deref, DerefMut};

use crate::bot::BotRef;
use crate::error::CoerceError;
use crate::params::ActionParams;
use crate::schema::{ParameterSpec, TypeScope};
use crate::value::Map;

/// Everything a handler can extract from: the action's params and the bot
/// it was addressed to.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    action: String,
    params: Map,
    bot: Option<BotRef>,
}

impl ActionContext {
    pub fn new(action: impl Into<String>, params: Map, bot: Option<BotRef>) -> Self {
        Self {
            action: action.into(),
            params,
            bot,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn params(&self) -> &Map {
        &self.params
    }

    pub fn bot(&self) -> Option<&BotRef> {
        self.bot.as_ref()
    }
}

/// Why an extractor could not produce its value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractFailure {
    /// Wire parameters failed to coerce.
    Params(Vec<CoerceError>),
    /// The handler needs a bot but none was resolved.
    NoBot,
}

/// A type that can be used as an action handler argument.
pub trait FromAction: Sized + Send {
    /// The parameters this extractor contributes to the handler schema.
    fn parameters() -> Vec<ParameterSpec>;

    fn register_types(_scope: &mut TypeScope) {}

    fn from_action(ctx: &ActionContext) -> Result<Self, ExtractFailure>;
}

/// Extracts the acting bot.
impl FromAction for BotRef {
    fn parameters() -> Vec<ParameterSpec> {
        vec![ParameterSpec::bot("bot")]
    }

    fn from_action(ctx: &ActionContext) -> Result<Self, ExtractFailure> {
        ctx.bot.clone().ok_or(ExtractFailure::NoBot)
    }
}

/// Extracts and coerces the wire parameters into `P`.
///
/// ```rust,ignore
/// async fn hello(Params(p): Params<Hello>, bot: BotRef) -> anyhow::Result<String> {
///     Ok(format!("hello {} from {}", p.name, bot.user_id()))
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Params<P>(pub P);

impl<P> Params<P> {
    pub fn into_inner(self) -> P {
        self.0
    }
}

impl<P> Deref for Params<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.0
    }
}

impl<P> DerefMut for Params<P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.0
    }
}

impl<P: ActionParams + Send> FromAction for Params<P> {
    fn parameters() -> Vec<ParameterSpec> {
        P::parameters()
    }

    fn register_types(scope: &mut TypeScope) {
        P::register_types(scope);
    }

    fn from_action(ctx: &ActionContext) -> Result<Self, ExtractFailure> {
        P::from_params(&ctx.params)
            .map(Params)
            .map_err(ExtractFailure::Params)
    }
}

/// Collects extraction failures across all handler arguments.
#[derive(Debug, Default)]
pub(crate) struct ExtractFailures {
    params: Vec<CoerceError>,
    missing_bot: bool,
}

impl ExtractFailures {
    pub(crate) fn record<T>(&mut self, result: Result<T, ExtractFailure>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(ExtractFailure::Params(errors)) => {
                self.params.extend(errors);
                None
            }
            Err(ExtractFailure::NoBot) => {
                self.missing_bot = true;
                None
            }
        }
    }

    /// Parameter failures take precedence over a missing bot.
    pub(crate) fn into_error(self) -> crate::ActionError {
        if !self.params.is_empty() {
            let message = self
                .params
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return crate::ActionError::bad_param(message);
        }
        if self.missing_bot {
            return crate::ActionError::unknown_self();
        }
        crate::ActionError::internal("handler argument extraction failed")
    }
}
