//! The crate-wide error type.
//!
//! Each subsystem keeps its own narrow error enum; this umbrella exists for
//! callers that drive several subsystems in one flow and want a single `?`
//! target. Conversions are lossless, and the display text is always the
//! underlying error's.

use thiserror::Error;

use crate::collection::PathError;
use crate::docstring::StyleError;
use crate::encode::EncodeError;
use crate::mro::MroError;
use crate::resolve::ResolveError;
use crate::stubs::MergeError;

/// Any error the crate can produce.
#[derive(Debug, Error)]
pub enum ApiscopeError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Mro(#[from] MroError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ApiscopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_transparent() {
        let err: ApiscopeError = ResolveError::Unresolvable {
            target: "pkg.ghost".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "cannot resolve alias target 'pkg.ghost'");
    }

    #[test]
    fn question_mark_bridges_subsystems() {
        fn inner() -> Result<()> {
            Err(MroError::Conflict {
                class: "pkg.D".to_string(),
            })?;
            Ok(())
        }
        assert!(matches!(inner().unwrap_err(), ApiscopeError::Mro(_)));
    }
}
