mod dependency_resolver;
mod dispose;
mod instantiator;
mod register;
mod specialize;

pub use dependency_resolver::ResolveErrorKind;
pub use dispose::{DisposeError, DisposeErrors};
pub use instantiator::{InstantiateErrorKind, InstantiatorErrorKind};
pub use register::RegisterErrorKind;
pub use specialize::SpecializeErrorKind;
