//! Dependency identification tokens.
//!
//! A [`Token`] names a dependency within the container. It is either
//! derived from a Rust type (optionally with a name, for several bindings
//! of the same type) or is a free-standing symbol such as `"config"`.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tadbir_support::rendering::shorten_type_name;

/// Uniquely identifies a dependency in the container.
///
/// Two tokens are equal when they refer to the same type (or both to no
/// type) and carry the same name.
///
/// # Examples
/// ```
/// use tadbir_container::token::Token;
///
/// // Type token
/// let key = Token::of::<String>();
/// assert_eq!(key.type_name(), Some("alloc::string::String"));
/// assert_eq!(key.name(), None);
///
/// // Named type token
/// let primary = Token::named::<String>("database_url");
/// assert_eq!(primary.name(), Some("database_url"));
///
/// // Symbol token
/// let config: Token = "config".into();
/// assert!(config.is_symbol());
/// assert_eq!(config, Token::symbol("config"));
/// ```
#[derive(Clone)]
pub struct Token {
    type_id: Option<TypeId>,
    type_name: &'static str,
    name: Option<Arc<str>>,
}

impl Token {
    /// Creates a token for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: Some(TypeId::of::<T>()),
            type_name: type_name::<T>(),
            name: None,
        }
    }

    /// Creates a named token for type `T`.
    ///
    /// ```
    /// use tadbir_container::token::Token;
    ///
    /// let primary = Token::named::<String>("primary_db");
    /// let replica = Token::named::<String>("replica_db");
    /// assert_ne!(primary, replica);
    /// ```
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: impl Into<Arc<str>>) -> Self {
        Self {
            type_id: Some(TypeId::of::<T>()),
            type_name: type_name::<T>(),
            name: Some(name.into()),
        }
    }

    /// Creates a symbol token that is not tied to any Rust type.
    #[inline]
    pub fn symbol(name: impl Into<Arc<str>>) -> Self {
        Self {
            type_id: None,
            type_name: "",
            name: Some(name.into()),
        }
    }

    /// Returns the [`TypeId`] for type tokens.
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Returns the full type name for type tokens.
    #[inline]
    pub fn type_name(&self) -> Option<&'static str> {
        self.type_id.map(|_| self.type_name)
    }

    /// Returns the name of named type tokens and symbols.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_symbol(&self) -> bool {
        self.type_id.is_none()
    }

    /// Short form used in diagnostics: `config`, `Database`,
    /// `String#primary_db`.
    pub fn label(&self) -> String {
        match (self.type_id, self.name.as_deref()) {
            (None, Some(name)) => name.to_string(),
            (Some(_), Some(name)) => format!("{}#{name}", shorten_type_name(self.type_name)),
            _ => shorten_type_name(self.type_name),
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Token::symbol(name)
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::symbol(name)
    }
}

impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.type_id, self.name.as_deref()) {
            (None, Some(name)) => write!(f, "Token({name:?})"),
            (Some(_), Some(name)) => write!(f, "Token({}, name={name:?})", self.type_name),
            _ => write!(f, "Token({})", self.type_name),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.type_id, self.name.as_deref()) {
            (None, Some(name)) => write!(f, "\"{name}\""),
            (Some(_), Some(name)) => write!(f, "{} (name={name:?})", self.type_name),
            _ => write!(f, "{}", self.type_name),
        }
    }
}
