//! Declared parameter classification (half of C4's input descriptor).
//!
//! spec.md §4.4 derives a parameter's class (`entity` / `config` / `scalar`)
//! from the function's declared type annotation via reflection. Without a
//! host-language reflection surface to inspect, ENCR has the registrant
//! declare the class directly when building a [`crate::Signature`] — the
//! same information, supplied once at registration instead of recovered
//! from a type object.

/// What role a declared parameter plays in signature analysis (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// An entity class other than a configuration entity.
    Entity,
    /// A configuration-entity class, declared directly at the top level.
    Config,
    /// Anything else: a raw scalar argument.
    Scalar,
}

/// One declared parameter of a registered function.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// The parameter's name, as matched against call-site keyword arguments.
    pub name: String,
    /// The parameter's class.
    pub kind: ParamKind,
    /// `true` if the parameter has a default and may be omitted at the call
    /// site.
    pub has_default: bool,
}

impl ParamSpec {
    /// Declare an `entity`-kind parameter.
    pub fn entity(name: impl Into<String>) -> Self {
        ParamSpec {
            name: name.into(),
            kind: ParamKind::Entity,
            has_default: false,
        }
    }

    /// Declare a `config`-kind parameter.
    pub fn config(name: impl Into<String>) -> Self {
        ParamSpec {
            name: name.into(),
            kind: ParamKind::Config,
            has_default: false,
        }
    }

    /// Declare a `scalar`-kind parameter.
    pub fn scalar(name: impl Into<String>) -> Self {
        ParamSpec {
            name: name.into(),
            kind: ParamKind::Scalar,
            has_default: false,
        }
    }

    /// Mark this parameter as having a default value.
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}
