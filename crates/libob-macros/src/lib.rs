//! Procedural macros for libob.
//!
//! - `#[derive(ActionParams)]` - Turns a struct into an action parameter list
//!
//! # ActionParams Derive Macro
//!
//! Every named field becomes one wire parameter, in declaration order:
//!
//! ```rust,ignore
//! use libob_core::ActionParams;
//!
//! #[derive(ActionParams)]
//! pub struct SendMessage {
//!     pub detail_type: String,
//!     pub user_id: Option<String>,
//!     pub message: Vec<Segment>,
//!     #[param(rename = "qq.at_all", default)]
//!     pub at_all: bool,
//!     #[param(default = 3)]
//!     pub retries: u32,
//! }
//! ```
//!
//! The struct can also be nested in other parameters; the derive registers
//! it as a named record type so that self-referencing structs work.

mod params;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `ActionParams` and `Coerce` for a struct with named fields.
///
/// # Attributes
///
/// - `#[param(rename = "...")]` - Read the field from another wire name
/// - `#[param(default)]` - Use `Default::default()` when absent
/// - `#[param(default = expr)]` - Use `expr` when absent
/// - `#[action_params(crate = "path")]` - Path to `libob_core` (default `::libob_core`)
#[proc_macro_derive(ActionParams, attributes(param, action_params))]
pub fn derive_action_params(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match params::derive_action_params(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
