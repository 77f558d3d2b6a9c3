//! Greeting personalization.

pub mod polish;

pub use polish::PolishSalutations;

/// Turns a free-text display name into a salutation such as `"Pani Anno"`.
///
/// `None` means no confident guess; the template falls back to the generic
/// greeting.
pub trait SalutationProvider: Send + Sync {
    fn salutation_for(&self, display_name: &str) -> Option<String>;
}

/// Provider that never personalizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericSalutation;

impl SalutationProvider for GenericSalutation {
    fn salutation_for(&self, _display_name: &str) -> Option<String> {
        None
    }
}
