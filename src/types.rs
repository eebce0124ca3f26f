//! Semantic types of predicate expressions and the optional table of
//! message types used to refine references once they are resolved.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::expr::Name;

/// Semantic type of an expression node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Number,
    String,
    /// A whole message, reached through an alias or a nested message field
    Message,
    /// Arrays, enum literals and ranges, with their element type
    Collection(Box<DataType>),
    /// Reference that has not been resolved yet
    Reference,
    /// Resolved, but the concrete type is not statically known
    Unknown,
}

impl DataType {
    pub fn collection(element: DataType) -> Self {
        DataType::Collection(Box::new(element))
    }

    /// `Reference` and `Unknown` are permissive: they are accepted wherever a
    /// concrete type is required and checking is deferred downstream.
    pub fn is_permissive(&self) -> bool {
        matches!(self, DataType::Reference | DataType::Unknown)
    }

    pub fn is_compatible(&self, other: &DataType) -> bool {
        match (self, other) {
            (a, b) if a.is_permissive() || b.is_permissive() => true,
            (DataType::Collection(a), DataType::Collection(b)) => a.is_compatible(b),
            (a, b) => a == b,
        }
    }

    /// Type of the elements of a collection. Permissive types yield `Unknown`.
    pub fn element_type(&self) -> Option<DataType> {
        match self {
            DataType::Collection(element) => Some((**element).clone()),
            t if t.is_permissive() => Some(DataType::Unknown),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, DataType::Bool | DataType::Number | DataType::String)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "boolean"),
            DataType::Number => write!(f, "number"),
            DataType::String => write!(f, "string"),
            DataType::Message => write!(f, "message"),
            DataType::Collection(element) => write!(f, "set of {}", element),
            DataType::Reference => write!(f, "reference"),
            DataType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A family of types an operand or function parameter must belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Bool,
    Number,
    String,
    /// boolean, number or string
    Primitive,
    Collection,
    Message,
}

impl TypeClass {
    pub fn admits(&self, data_type: &DataType) -> bool {
        if data_type.is_permissive() {
            return true;
        }
        match self {
            TypeClass::Bool => *data_type == DataType::Bool,
            TypeClass::Number => *data_type == DataType::Number,
            TypeClass::String => *data_type == DataType::String,
            TypeClass::Primitive => data_type.is_primitive(),
            TypeClass::Collection => matches!(data_type, DataType::Collection(_)),
            TypeClass::Message => *data_type == DataType::Message,
        }
    }

    /// Most general concrete type in this class, if there is a single one
    pub fn representative(&self) -> Option<DataType> {
        match self {
            TypeClass::Bool => Some(DataType::Bool),
            TypeClass::Number => Some(DataType::Number),
            TypeClass::String => Some(DataType::String),
            TypeClass::Primitive => None,
            TypeClass::Collection => Some(DataType::collection(DataType::Unknown)),
            TypeClass::Message => Some(DataType::Message),
        }
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeClass::Bool => write!(f, "boolean"),
            TypeClass::Number => write!(f, "number"),
            TypeClass::String => write!(f, "string"),
            TypeClass::Primitive => write!(f, "primitive value"),
            TypeClass::Collection => write!(f, "collection"),
            TypeClass::Message => write!(f, "message"),
        }
    }
}

/// Static type of a message field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Number,
    String,
    Message(Arc<MessageType>),
    Array {
        element: Box<FieldType>,
        /// `None` for variable-length arrays
        length: Option<usize>,
    },
}

impl FieldType {
    pub fn array(element: FieldType, length: Option<usize>) -> Self {
        FieldType::Array {
            element: Box::new(element),
            length,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FieldType::Bool => DataType::Bool,
            FieldType::Number => DataType::Number,
            FieldType::String => DataType::String,
            FieldType::Message(_) => DataType::Message,
            FieldType::Array { element, .. } => DataType::collection(element.data_type()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Message(message) => write!(f, "{}", message.name),
            FieldType::Array {
                element,
                length: Some(n),
            } => write!(f, "{}[{}]", element, n),
            FieldType::Array {
                element,
                length: None,
            } => write!(f, "{}[]", element),
            other => write!(f, "{}", other.data_type()),
        }
    }
}

/// Named message type with typed fields and constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    pub name: Name,
    fields: BTreeMap<Name, FieldType>,
    constants: BTreeMap<Name, FieldType>,
}

impl MessageType {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
            constants: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<Name>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    pub fn with_constant(mut self, name: impl Into<Name>, field_type: FieldType) -> Self {
        self.constants.insert(name.into(), field_type);
        self
    }

    /// Fields shadow constants of the same name
    pub fn lookup(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name).or_else(|| self.constants.get(name))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().chain(self.constants.keys()).map(|k| &**k)
    }
}

/// Channel name -> message type carried on that channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTypes {
    channels: HashMap<Name, Arc<MessageType>>,
}

impl MessageTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: impl Into<Name>, message: MessageType) -> Self {
        self.channels.insert(channel.into(), Arc::new(message));
        self
    }

    pub fn get(&self, channel: &str) -> Option<&Arc<MessageType>> {
        self.channels.get(channel)
    }
}
