use crate::key::ServiceKey;

#[derive(thiserror::Error, Debug)]
pub enum SpecializeErrorKind {
    #[error("Generic arity {arity} isn't supported, max is {max}")]
    UnsupportedArity { arity: usize, max: usize },
    #[error("No open generic registration matches {key}")]
    NoMatchingRegistration { key: ServiceKey },
    #[error("Open generic implementation {implementation} has no constructor for {key}")]
    NoConstructor { implementation: &'static str, key: ServiceKey },
    #[error(
        "Open generic implementation {implementation} has several constructors with {parameters} parameters for {key}"
    )]
    AmbiguousConstructor {
        implementation: &'static str,
        key: ServiceKey,
        parameters: usize,
    },
}
