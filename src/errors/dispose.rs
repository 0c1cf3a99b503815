use alloc::{string::ToString as _, vec::Vec};
use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// A failure of a single owned instance to dispose
#[derive(thiserror::Error, Debug)]
#[error("Disposal of {service} failed: {source}")]
pub struct DisposeError {
    pub service: TypeInfo,
    #[source]
    pub source: anyhow::Error,
}

/// All disposal failures collected during one [`crate::Scope::dispose`] call
#[derive(thiserror::Error, Debug)]
pub struct DisposeErrors {
    pub errors: Vec<DisposeError>,
}

impl Display for DisposeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut display = Vec::with_capacity(self.errors.len() + 1);
        display.push("Scope disposal had one or more errors:".to_string());
        for error in &self.errors {
            display.push(alloc::format!("- {error}"));
        }
        f.write_str(&display.join("\n"))
    }
}
