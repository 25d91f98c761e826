//! Declarative action parameter lists.

use crate::error::CoerceError;
use crate::schema::{ParameterSpec, TypeScope};
use crate::value::Map;

/// A struct whose fields are the wire parameters of an action.
///
/// Usually derived:
///
/// ```rust,ignore
/// #[derive(ActionParams)]
/// struct SendMessage {
///     detail_type: String,
///     user_id: Option<String>,
///     #[param(rename = "qq.at_all", default)]
///     at_all: bool,
///     #[param(default = 3)]
///     retries: u32,
/// }
/// ```
///
/// The derive also implements [`Coerce`](crate::Coerce) so the struct can be
/// nested inside other parameters as a record.
pub trait ActionParams: Sized {
    /// Field specs in declaration order.
    fn parameters() -> Vec<ParameterSpec>;

    /// Registers the record types referenced by the fields.
    fn register_types(_scope: &mut TypeScope) {}

    /// Coerces every field, collecting all failures.
    fn from_params(params: &Map) -> Result<Self, Vec<CoerceError>>;
}

impl ActionParams for () {
    fn parameters() -> Vec<ParameterSpec> {
        Vec::new()
    }

    fn from_params(_params: &Map) -> Result<Self, Vec<CoerceError>> {
        Ok(())
    }
}
