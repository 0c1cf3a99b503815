/// Config for a registry
/// ## Fields
/// - `dispose_on_drop`:
///   If `true`, a scope that is dropped without an explicit [`crate::Scope::dispose`] call
///   disposes its owned instances when the last handle to it is dropped.
///
///   Explicit disposal is the primary contract, this is only a backstop for forgotten calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub dispose_on_drop: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { dispose_on_drop: true }
    }
}
