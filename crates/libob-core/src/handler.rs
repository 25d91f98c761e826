//! Action handlers.
//!
//! [`ActionHandler`] is implemented for async functions taking 0-12
//! [`FromAction`] arguments and returning an [`IntoActionResult`]:
//!
//! ```rust,ignore
//! async fn get_self_info(bot: BotRef) -> ActionResult<Value> { .. }
//!
//! async fn send_message(
//!     Params(p): Params<SendMessage>,
//!     bot: BotRef,
//! ) -> anyhow::Result<MessageReceipt> { .. }
//! ```
//!
//! All arguments are extracted before the handler runs and every failure
//! is reported together.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::ActionError;
use crate::extract::{ActionContext, ExtractFailures, FromAction};
use crate::schema::{ParameterSpec, TypeScope};
use crate::value::{Value, to_value};

// ============================================================================
// IntoActionResult - Handler return values
// ============================================================================

/// A handler return value that becomes the response `data`.
pub trait IntoActionResult: Send {
    fn into_action_result(self) -> Result<Value, ActionError>;
}

impl IntoActionResult for () {
    fn into_action_result(self) -> Result<Value, ActionError> {
        Ok(Value::Null)
    }
}

impl IntoActionResult for Value {
    fn into_action_result(self) -> Result<Value, ActionError> {
        Ok(self)
    }
}

/// `Ok` is serialized into `data`; `Err` picks the retcode through
/// [`ActionError`], so `anyhow::Error` and `ActionError` both work.
impl<T, E> IntoActionResult for Result<T, E>
where
    T: Serialize + Send,
    E: Into<ActionError> + Send,
{
    fn into_action_result(self) -> Result<Value, ActionError> {
        let data = self.map_err(Into::into)?;
        to_value(&data)
            .map_err(|e| ActionError::internal(format!("cannot serialize handler result: {e}")))
    }
}

// ============================================================================
// ActionHandler Trait
// ============================================================================

/// An async function usable as an action handler.
#[async_trait]
pub trait ActionHandler<T>: Clone + Send + Sync + 'static {
    /// The handler's parameters, in argument order.
    fn parameters() -> Vec<ParameterSpec>;

    /// Registers the record types referenced by the arguments.
    fn register_types(scope: &mut TypeScope);

    /// Extracts the arguments and runs the handler.
    async fn call(self, ctx: ActionContext) -> Result<Value, ActionError>;
}

// ============================================================================
// BoxedActionHandler
// ============================================================================

/// A type-erased handler stored in the action registry.
pub type BoxedActionHandler =
    Arc<dyn Fn(ActionContext) -> BoxFuture<'static, Result<Value, ActionError>> + Send + Sync>;

/// Erases a handler function's type.
pub fn into_handler<H, T>(handler: H) -> BoxedActionHandler
where
    H: ActionHandler<T>,
    T: 'static,
{
    Arc::new(move |ctx| handler.clone().call(ctx))
}

// ============================================================================
// Handler implementations for functions
// ============================================================================

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables, irrefutable_let_patterns)]
        #[async_trait]
        impl<F, Fut, Res, $($ty,)*> ActionHandler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoActionResult + 'static,
            $( $ty: FromAction + 'static, )*
        {
            fn parameters() -> Vec<ParameterSpec> {
                let mut parameters = Vec::new();
                $( parameters.extend($ty::parameters()); )*
                parameters
            }

            fn register_types(scope: &mut TypeScope) {
                $( $ty::register_types(scope); )*
            }

            async fn call(self, ctx: ActionContext) -> Result<Value, ActionError> {
                let mut failures = ExtractFailures::default();
                $(
                    let $ty = failures.record($ty::from_action(&ctx));
                )*
                let ($(Some($ty),)*) = ($($ty,)*) else {
                    return Err(failures.into_error());
                };

                (self)($($ty,)*).await.into_action_result()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
