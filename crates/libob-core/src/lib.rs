//! # libob Core
//!
//! The action-dispatch core of a OneBot 12 implementation.
//!
//! Handlers are ordinary async functions. Their arguments are extractors
//! ([`Params`], [`BotRef`]) whose parameter schema is reflected once, when the
//! handler is registered. Inbound params are coerced against that schema,
//! the acting bot is injected, and the handler's return value is packaged
//! into an [`ActionResponse`] the same way for every transport and encoding.
//!
//! ## Layers
//!
//! - **Values**: [`Value`], [`Map`], [`Bytes`], [`Encoding`]
//! - **Schema**: [`ParameterSpec`], [`TypeDescriptor`], [`TypeScope`], [`ActionSchema`]
//! - **Coercion**: [`Coerce`], [`ActionParams`], [`coerce_union!`]
//! - **Dispatch**: [`ActionHandler`], [`ActionRegistry`], [`ActionError`]
//! - **Runtime support**: [`TaskManager`], [`LifespanManager`], [`authorize`]
//! - **Protocol**: [`ActionRequest`], [`ActionResponse`], [`Event`], [`Bot`]
//!
//! ## Flow
//!
//! ```text
//! ┌───────────┐   ┌───────────────┐   ┌──────────────┐   ┌─────────┐
//! │ transport │──▶│ ActionRequest │──▶│ActionRegistry│──▶│ handler │
//! │  (bytes)  │   │  + bot lookup │   │ coerce/inject│   │         │
//! └───────────┘   └───────────────┘   └──────────────┘   └─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use libob_core::{ActionParams, ActionRegistry, BotRef, Params};
//!
//! #[derive(ActionParams)]
//! struct Hello {
//!     name: String,
//! }
//!
//! async fn hello(Params(p): Params<Hello>, bot: BotRef) -> anyhow::Result<String> {
//!     Ok(format!("hello {} from {}", p.name, bot.user_id()))
//! }
//!
//! let mut registry = ActionRegistry::new();
//! registry.register("hello", hello)?;
//! ```

extern crate self as libob_core;

pub mod auth;
pub mod bot;
pub mod codec;
pub mod coerce;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod extract;
pub mod handler;
pub mod lifespan;
pub mod params;
pub mod protocol;
pub mod retcode;
pub mod schema;
pub mod segment;
pub mod task;
pub mod value;

pub use auth::{authorize, bearer_token};
pub use bot::{Bot, BotRef, BotSelf};
pub use codec::Encoding;
pub use coerce::Coerce;
pub use dispatcher::{ActionRegistry, DispatchOptions, DuplicatePolicy, RegisteredAction};
pub use error::{
    ActionError, ActionResult, CodecError, CoerceError, CoerceErrorKind, LifespanError,
    SchemaError,
};
pub use event::{Event, EventType};
pub use extract::{ActionContext, ExtractFailure, FromAction, Params};
pub use handler::{ActionHandler, BoxedActionHandler, IntoActionResult, into_handler};
pub use lifespan::LifespanManager;
pub use params::ActionParams;
pub use protocol::{
    ActionRequest, ActionResponse, ActionSink, ActionStatus, ImplInfo, ONEBOT_VERSION,
};
pub use schema::{
    ActionSchema, FieldDescriptor, ParamClass, ParamDefault, ParameterSpec, TypeDescriptor,
    TypeScope,
};
pub use segment::Segment;
pub use task::TaskManager;
pub use value::{Bytes, Map, Value, to_value};

pub use libob_macros::ActionParams;

/// Prelude for handler authors.
pub mod prelude {
    pub use super::{
        ActionError, ActionParams, ActionResult, BotRef, Bytes, Coerce, Event, Map, Params,
        Segment, Value, coerce_union,
    };
}
