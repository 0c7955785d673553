// Tue Jan 20 2026 - Alex

use std::fmt;

/// A function's calling signature, used by `function_is_callable` to judge
/// whether an indirect call site's operand type could plausibly name a
/// given function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub return_type: Box<Type>,
    pub is_vararg: bool,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, return_type: Type, is_vararg: bool) -> Self {
        Self {
            params,
            return_type: Box::new(return_type),
            is_vararg,
        }
    }
}

/// A minimal statically-typed value type, just rich enough to let the
/// analysis distinguish pointers from non-pointers and to populate a
/// node's type record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Type {
    Void,
    Int(u32),
    Ptr(Box<Type>),
    Struct(Vec<Type>),
    Function(FunctionType),
    /// A type the local pass could not resolve further (e.g. from an
    /// external declaration); distinct from `Void` so it still counts as
    /// "some type lives here" in a node's type record.
    Opaque,
}

impl Type {
    pub fn ptr(inner: Type) -> Self {
        Type::Ptr(Box::new(inner))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr(_))
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Ptr(inner) => write!(f, "{inner}*"),
            Type::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
            Type::Function(ft) => {
                write!(f, "(")?;
                for (i, p) in ft.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                if ft.is_vararg {
                    write!(f, ", ...")?;
                }
                write!(f, ") -> {}", ft.return_type)
            }
            Type::Opaque => write!(f, "opaque"),
        }
    }
}
