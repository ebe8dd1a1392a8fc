//! The cached per-function signature (C4): declared parameters, the
//! derived input pattern, the declared output descriptor, and the
//! synthesized composite-input field list.

use encr_core::{EncrError, EncrResult};

use crate::composite::{leak_field_names, leak_type_name};
use crate::param::{ParamKind, ParamSpec};
use crate::pattern::{classify_input_pattern, InputPattern, OutputDescriptor};

/// Everything C4 computes and caches for one registered function.
///
/// Built once at `register` time and held by the registry for the
/// function's lifetime, matching §4.4's "computes and caches two
/// descriptors" — there is no per-call re-analysis.
#[derive(Debug, Clone)]
pub struct Signature {
    /// The registered function's name.
    pub function_name: String,
    /// Declared parameters, in call order.
    pub params: Vec<ParamSpec>,
    /// Derived input pattern (§4.4).
    pub input_pattern: InputPattern,
    /// Declared output descriptor (§4.4).
    pub output: OutputDescriptor,
    /// Leaked type name for the synthesized composite input entity class
    /// (§4.4, "the analyzer also synthesizes ... an input entity class").
    composite_type_name: &'static str,
    /// Leaked field names for the synthesized composite input entity class:
    /// every non-config parameter, in declared order.
    composite_field_names: &'static [&'static str],
}

impl Signature {
    /// Analyze a declared parameter list and return shape into a cached
    /// [`Signature`].
    ///
    /// # Errors
    ///
    /// Returns [`EncrError::SignatureError`] if `output` is `None` — the
    /// Rust-native stand-in for spec.md §4.4's "registration rejects a
    /// function whose return annotation is missing" (there being no
    /// reflection surface to omit an annotation from, the registrant must
    /// supply `Some(OutputDescriptor)` explicitly).
    pub fn build(
        function_name: impl Into<String>,
        params: Vec<ParamSpec>,
        output: Option<OutputDescriptor>,
    ) -> EncrResult<Self> {
        let function_name = function_name.into();
        let output = output.ok_or_else(|| {
            EncrError::signature_error(&function_name, "missing return type annotation")
        })?;
        let input_pattern = classify_input_pattern(&params);

        let composite_field_names: Vec<String> = params
            .iter()
            .filter(|p| p.kind != ParamKind::Config)
            .map(|p| p.name.clone())
            .collect();
        let composite_type_name = leak_type_name(&function_name);
        let composite_field_names = leak_field_names(composite_field_names);

        Ok(Signature {
            function_name,
            params,
            input_pattern,
            output,
            composite_type_name,
            composite_field_names,
        })
    }

    /// The leaked type name of this function's synthesized composite input
    /// entity class.
    pub fn composite_type_name(&self) -> &'static str {
        self.composite_type_name
    }

    /// The leaked field-name list of this function's synthesized composite
    /// input entity class (every non-config parameter, declared order).
    pub fn composite_field_names(&self) -> &'static [&'static str] {
        self.composite_field_names
    }

    /// The declared `config`-kind parameter, if this function has one.
    pub fn config_param(&self) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.kind == ParamKind::Config)
    }

    /// The declared `entity`-kind parameters, in order.
    pub fn entity_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.kind == ParamKind::Entity)
    }
}
