//! Values held in a context store.
//!
//! Whether a value may follow a task onto another thread is decided by its
//! variant, never by inspecting its runtime type. Strings, session tokens,
//! authentication principals, primitives and enum values propagate;
//! [`ContextValue::Opaque`] and [`ContextValue::Null`] stay on the thread
//! that stored them.

use super::security::{Authentication, UserToken};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opt-in for enums that may be stored in (and propagated with) a context.
///
/// ```
/// use ctxpool::context::{ContextEnum, ContextValue};
///
/// #[derive(Debug, Clone, Copy)]
/// enum Region { East, West }
///
/// impl ContextEnum for Region {
///     fn variant_name(&self) -> &'static str {
///         match self {
///             Region::East => "East",
///             Region::West => "West",
///         }
///     }
/// }
///
/// let value = ContextValue::enumeration(Region::West);
/// assert!(value.is_propagatable());
/// assert!(value.as_enum().unwrap().is::<Region>());
/// ```
pub trait ContextEnum {
    fn variant_name(&self) -> &'static str;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A captured enum: its type and variant, detached from the original value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: &'static str,
    pub variant: &'static str,
}

impl EnumValue {
    pub fn of<E: ContextEnum>(value: &E) -> Self {
        Self {
            type_name: value.type_name(),
            variant: value.variant_name(),
        }
    }

    pub fn is<E: ContextEnum>(&self) -> bool {
        self.type_name == std::any::type_name::<E>()
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.type_name.rsplit("::").next().unwrap_or(self.type_name);
        write!(f, "{}::{}", short, self.variant)
    }
}

/// A value in a context store.
#[derive(Clone)]
pub enum ContextValue {
    Str(String),
    /// Session token of the current user.
    Token(UserToken),
    /// Authenticated principal, shared immutably.
    Authentication(Arc<Authentication>),
    Bool(bool),
    /// Any signed integer, widened.
    Int(i64),
    /// Any unsigned integer, widened.
    UInt(u64),
    Float(f64),
    Char(char),
    /// An enum that opted in through [`ContextEnum`].
    Enum(EnumValue),
    /// Any other object or collection. Visible on the storing thread only.
    Opaque(Arc<dyn Any + Send + Sync>),
    /// An explicitly empty slot. Never propagated.
    Null,
}

impl ContextValue {
    pub fn enumeration<E: ContextEnum>(value: E) -> Self {
        ContextValue::Enum(EnumValue::of(&value))
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        ContextValue::Opaque(Arc::new(value))
    }

    pub fn is_propagatable(&self) -> bool {
        !matches!(self, ContextValue::Opaque(_) | ContextValue::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContextValue::Str(_) => "string",
            ContextValue::Token(_) => "token",
            ContextValue::Authentication(_) => "authentication",
            ContextValue::Bool(_) => "bool",
            ContextValue::Int(_) => "int",
            ContextValue::UInt(_) => "uint",
            ContextValue::Float(_) => "float",
            ContextValue::Char(_) => "char",
            ContextValue::Enum(_) => "enum",
            ContextValue::Opaque(_) => "opaque",
            ContextValue::Null => "null",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ContextValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ContextValue::Int(n) => Some(*n),
            ContextValue::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ContextValue::UInt(n) => Some(*n),
            ContextValue::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ContextValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&UserToken> {
        match self {
            ContextValue::Token(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_authentication(&self) -> Option<&Arc<Authentication>> {
        match self {
            ContextValue::Authentication(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<EnumValue> {
        match self {
            ContextValue::Enum(e) => Some(*e),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            ContextValue::Opaque(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Str(s) => write!(f, "{:?}", s),
            ContextValue::Token(t) => f
                .debug_struct("UserToken")
                .field("user_id", &t.user_id)
                .field("token_type", &t.token_type)
                .field("state", &t.state)
                .finish_non_exhaustive(),
            ContextValue::Authentication(a) => f
                .debug_struct("Authentication")
                .field("user", &a.user.username)
                .finish_non_exhaustive(),
            ContextValue::Bool(b) => write!(f, "{}", b),
            ContextValue::Int(n) => write!(f, "{}", n),
            ContextValue::UInt(n) => write!(f, "{}", n),
            ContextValue::Float(n) => write!(f, "{}", n),
            ContextValue::Char(c) => write!(f, "{:?}", c),
            ContextValue::Enum(e) => write!(f, "{}", e),
            ContextValue::Opaque(_) => f.write_str("<opaque>"),
            ContextValue::Null => f.write_str("null"),
        }
    }
}

impl PartialEq for ContextValue {
    fn eq(&self, other: &Self) -> bool {
        use ContextValue::*;
        match (self, other) {
            (Str(a), Str(b)) => a == b,
            (Token(a), Token(b)) => a == b,
            (Authentication(a), Authentication(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (Opaque(a), Opaque(b)) => Arc::ptr_eq(a, b),
            (Null, Null) => true,
            _ => false,
        }
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::Str(s)
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Str(s.to_string())
    }
}

impl From<UserToken> for ContextValue {
    fn from(token: UserToken) -> Self {
        ContextValue::Token(token)
    }
}

impl From<Authentication> for ContextValue {
    fn from(auth: Authentication) -> Self {
        ContextValue::Authentication(Arc::new(auth))
    }
}

impl From<Arc<Authentication>> for ContextValue {
    fn from(auth: Arc<Authentication>) -> Self {
        ContextValue::Authentication(auth)
    }
}

impl From<EnumValue> for ContextValue {
    fn from(value: EnumValue) -> Self {
        ContextValue::Enum(value)
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        ContextValue::Bool(b)
    }
}

impl From<char> for ContextValue {
    fn from(c: char) -> Self {
        ContextValue::Char(c)
    }
}

macro_rules! impl_from_number {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for ContextValue {
                fn from(n: $t) -> Self {
                    ContextValue::$variant(n as $target)
                }
            }
        )*
    };
}

impl_from_number!(Int as i64: i8, i16, i32, i64, isize);
impl_from_number!(UInt as u64: u8, u16, u32, u64, usize);
impl_from_number!(Float as f64: f32, f64);

impl<T: Into<ContextValue>> From<Option<T>> for ContextValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ContextValue::Null)
    }
}
