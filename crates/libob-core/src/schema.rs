//! Parameter schemas reflected from action handlers.
//!
//! A handler's parameters are described by an ordered list of
//! [`ParameterSpec`]s. Record types are registered by name in a
//! [`TypeScope`]; a parameter refers to them with [`TypeDescriptor::Ref`]
//! until [`ActionSchema::analyze`] resolves the reference once, at
//! registration time.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::SchemaError;
use crate::value::Value;

// ============================================================================
// TypeDescriptor
// ============================================================================

/// The declared type of a parameter or record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Any,
    Null,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    List(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>),
    Optional(Box<TypeDescriptor>),
    /// Alternatives tried in declaration order.
    Union(Vec<TypeDescriptor>),
    /// A resolved record type, looked up in the schema's [`TypeScope`].
    Record(&'static str),
    /// An unresolved reference to a record type.
    Ref(&'static str),
    /// The acting bot. Never part of the wire schema.
    Bot,
}

impl TypeDescriptor {
    pub fn list(inner: TypeDescriptor) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn map(inner: TypeDescriptor) -> Self {
        Self::Map(Box::new(inner))
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Human readable type name, e.g. `list[int]`.
    pub fn type_name(&self) -> String {
        self.to_string()
    }

    fn contains_bot(&self) -> bool {
        match self {
            Self::Bot => true,
            Self::List(inner) | Self::Map(inner) | Self::Optional(inner) => inner.contains_bot(),
            Self::Union(alts) => alts.iter().any(Self::contains_bot),
            _ => false,
        }
    }

    fn has_empty_union(&self) -> bool {
        match self {
            Self::Union(alts) => alts.is_empty() || alts.iter().any(Self::has_empty_union),
            Self::List(inner) | Self::Map(inner) | Self::Optional(inner) => inner.has_empty_union(),
            _ => false,
        }
    }

    /// Replaces every `Ref` with a `Record`, failing on the first unknown name.
    fn resolve(&self, scope: &TypeScope) -> Result<Self, &'static str> {
        Ok(match self {
            Self::Ref(name) | Self::Record(name) => {
                if scope.contains(name) {
                    Self::Record(*name)
                } else {
                    return Err(*name);
                }
            }
            Self::List(inner) => Self::List(Box::new(inner.resolve(scope)?)),
            Self::Map(inner) => Self::Map(Box::new(inner.resolve(scope)?)),
            Self::Optional(inner) => Self::Optional(Box::new(inner.resolve(scope)?)),
            Self::Union(alts) => Self::Union(
                alts.iter()
                    .map(|alt| alt.resolve(scope))
                    .collect::<Result<_, _>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Checks a descriptor that is about to be coerced against wire data.
    fn check_wire(&self, parameter: &str) -> Result<(), SchemaError> {
        if self.contains_bot() {
            return Err(SchemaError::UnsupportedType {
                parameter: parameter.to_string(),
                reason: "the bot can only be injected as a whole parameter".to_string(),
            });
        }
        if self.has_empty_union() {
            return Err(SchemaError::UnsupportedType {
                parameter: parameter.to_string(),
                reason: "union without alternatives".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Null => f.write_str("null"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Map(inner) => write!(f, "map[{inner}]"),
            Self::Optional(inner) => write!(f, "optional[{inner}]"),
            Self::Union(alts) => {
                f.write_str("union[")?;
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{alt}")?;
                }
                f.write_str("]")
            }
            Self::Record(name) | Self::Ref(name) => {
                f.write_str(name.rsplit("::").next().unwrap_or(name))
            }
            Self::Bot => f.write_str("bot"),
        }
    }
}

// ============================================================================
// TypeScope
// ============================================================================

/// A field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub wire_name: &'static str,
    pub ty: TypeDescriptor,
    pub required: bool,
}

/// Named record types visible to a handler's parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeScope {
    records: BTreeMap<&'static str, Vec<FieldDescriptor>>,
}

impl TypeScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record. Returns `false` if the name was already present,
    /// which lets recursive types stop registering themselves.
    pub fn insert_record(&mut self, name: &'static str, fields: Vec<FieldDescriptor>) -> bool {
        if self.records.contains_key(name) {
            return false;
        }
        self.records.insert(name, fields);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn record(&self, name: &str) -> Option<&[FieldDescriptor]> {
        self.records.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// ParameterSpec
// ============================================================================

/// The default of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamDefault {
    /// No default: the parameter must be present on the wire.
    Required,
    /// A default with a wire representation.
    Value(Value),
    /// A default exists but cannot be represented on the wire.
    Opaque,
}

/// How a parameter is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    /// Read from the wire under its own name.
    Normal,
    /// Filled with the acting bot, never read from the wire.
    BotInjected,
    /// Read from the wire under an explicit, usually dotted, name.
    ExtraAnnotated,
}

/// One reflected handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub wire_name: &'static str,
    pub declared_type: TypeDescriptor,
    pub default: ParamDefault,
    pub class: ParamClass,
}

impl ParameterSpec {
    pub fn new(name: &'static str, declared_type: TypeDescriptor) -> Self {
        Self {
            name,
            wire_name: name,
            declared_type,
            default: ParamDefault::Required,
            class: ParamClass::Normal,
        }
    }

    /// The bot injection slot.
    pub fn bot(name: &'static str) -> Self {
        Self {
            class: ParamClass::BotInjected,
            ..Self::new(name, TypeDescriptor::Bot)
        }
    }

    /// Reads the parameter from `wire_name` instead of its own name.
    pub fn renamed(mut self, wire_name: &'static str) -> Self {
        self.wire_name = wire_name;
        self.class = ParamClass::ExtraAnnotated;
        self
    }

    pub fn with_default(mut self, default: ParamDefault) -> Self {
        self.default = default;
        self
    }

    pub fn is_required(&self) -> bool {
        matches!(self.default, ParamDefault::Required)
    }

    /// Whether the parameter is read from the wire.
    pub fn is_wire(&self) -> bool {
        self.class != ParamClass::BotInjected
    }
}

// ============================================================================
// ActionSchema
// ============================================================================

/// The resolved, validated parameter list of a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSchema {
    parameters: Vec<ParameterSpec>,
    scope: TypeScope,
}

impl ActionSchema {
    /// Resolves type references and validates a handler's parameters.
    pub fn analyze(
        parameters: Vec<ParameterSpec>,
        scope: TypeScope,
    ) -> Result<Self, SchemaError> {
        let mut wire_names = HashSet::new();
        let mut resolved = Vec::with_capacity(parameters.len());

        for mut spec in parameters {
            if spec.class == ParamClass::BotInjected {
                if spec.declared_type != TypeDescriptor::Bot {
                    return Err(SchemaError::UnsupportedType {
                        parameter: spec.name.to_string(),
                        reason: format!("bot slot declared as {}", spec.declared_type),
                    });
                }
                resolved.push(spec);
                continue;
            }

            spec.declared_type.check_wire(spec.name)?;
            spec.declared_type = spec.declared_type.resolve(&scope).map_err(|name| {
                SchemaError::UnresolvedType {
                    parameter: spec.name.to_string(),
                    name: name.to_string(),
                }
            })?;

            if !wire_names.insert(spec.wire_name) {
                return Err(SchemaError::DuplicateWireName(spec.wire_name.to_string()));
            }
            resolved.push(spec);
        }

        let mut scope = scope;
        let snapshot = scope.clone();
        for (record, fields) in scope.records.iter_mut() {
            for field in fields.iter_mut() {
                let parameter = format!("{record}.{}", field.wire_name);
                field.ty.check_wire(&parameter)?;
                field.ty = field.ty.resolve(&snapshot).map_err(|name| {
                    SchemaError::UnresolvedType {
                        parameter: parameter.clone(),
                        name: name.to_string(),
                    }
                })?;
            }
        }

        Ok(Self {
            parameters: resolved,
            scope,
        })
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Parameters read from the wire, in declaration order.
    pub fn wire_parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(|p| p.is_wire())
    }

    pub fn scope(&self) -> &TypeScope {
        &self.scope
    }

    /// Whether `key` names a wire parameter.
    pub fn accepts(&self, key: &str) -> bool {
        self.wire_parameters().any(|p| p.wire_name == key)
    }

    pub fn requires_bot(&self) -> bool {
        self.parameters
            .iter()
            .any(|p| p.class == ParamClass::BotInjected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_scope() -> TypeScope {
        let mut scope = TypeScope::new();
        scope.insert_record(
            "tree::Node",
            vec![
                FieldDescriptor {
                    wire_name: "value",
                    ty: TypeDescriptor::Int,
                    required: true,
                },
                FieldDescriptor {
                    wire_name: "children",
                    ty: TypeDescriptor::list(TypeDescriptor::Ref("tree::Node")),
                    required: false,
                },
            ],
        );
        scope
    }

    #[test]
    fn resolves_recursive_forward_references() {
        let schema = ActionSchema::analyze(
            vec![ParameterSpec::new("root", TypeDescriptor::Ref("tree::Node"))],
            node_scope(),
        )
        .unwrap();

        assert_eq!(
            schema.parameters()[0].declared_type,
            TypeDescriptor::Record("tree::Node")
        );
        let fields = schema.scope().record("tree::Node").unwrap();
        assert_eq!(
            fields[1].ty,
            TypeDescriptor::list(TypeDescriptor::Record("tree::Node"))
        );
        assert_eq!(schema.parameters()[0].declared_type.type_name(), "Node");
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let err = ActionSchema::analyze(
            vec![ParameterSpec::new(
                "x",
                TypeDescriptor::optional(TypeDescriptor::Ref("Missing")),
            )],
            TypeScope::new(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::UnresolvedType {
                parameter: "x".into(),
                name: "Missing".into()
            }
        );
    }

    #[test]
    fn bot_is_excluded_from_wire_and_rejected_when_nested() {
        let schema = ActionSchema::analyze(
            vec![
                ParameterSpec::new("text", TypeDescriptor::String),
                ParameterSpec::bot("bot"),
            ],
            TypeScope::new(),
        )
        .unwrap();
        assert!(schema.requires_bot());
        assert!(schema.accepts("text"));
        assert!(!schema.accepts("bot"));
        assert_eq!(schema.wire_parameters().count(), 1);

        let err = ActionSchema::analyze(
            vec![ParameterSpec::new(
                "bots",
                TypeDescriptor::list(TypeDescriptor::Bot),
            )],
            TypeScope::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType { .. }));
    }

    #[test]
    fn duplicate_wire_names_and_empty_unions_are_rejected() {
        let err = ActionSchema::analyze(
            vec![
                ParameterSpec::new("a", TypeDescriptor::Int).renamed("x"),
                ParameterSpec::new("x", TypeDescriptor::Int),
            ],
            TypeScope::new(),
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateWireName("x".into()));

        let err = ActionSchema::analyze(
            vec![ParameterSpec::new("u", TypeDescriptor::Union(vec![]))],
            TypeScope::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType { .. }));
    }
}
