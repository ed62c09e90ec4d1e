//! Process-wide playground
//!
//! Convenience for hosts that cannot thread a [`Playground`] through their
//! handlers. Installation is explicit ([`install`]) or happens on first use
//! from the environment ([`playground`]); [`reset`] tears it down between
//! test cases.

use crate::error::VanityError;
use crate::playground::Playground;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

static PLAYGROUND: Lazy<RwLock<Option<Playground>>> = Lazy::new(|| RwLock::new(None));

/// Install `playground` as the process-wide instance
///
/// Returns the previously installed one.
pub fn install(playground: Playground) -> Option<Playground> {
    tracing::info!("Installing process-wide playground");
    PLAYGROUND.write().replace(playground)
}

/// Installed playground
///
/// # Errors
/// `VanityError::NotInstalled` if none is installed.
pub fn installed() -> Result<Playground, VanityError> {
    PLAYGROUND.read().clone().ok_or(VanityError::NotInstalled)
}

/// Installed playground, created from `VANITY_*` variables on first use
///
/// # Errors
/// `VanityError::Config` if the environment holds an invalid value.
pub fn playground() -> Result<Playground, VanityError> {
    if let Some(playground) = PLAYGROUND.read().as_ref() {
        return Ok(playground.clone());
    }

    let mut slot = PLAYGROUND.write();
    if let Some(playground) = slot.as_ref() {
        return Ok(playground.clone());
    }
    let playground = Playground::from_env()?;
    tracing::info!("Initialized process-wide playground from environment");
    *slot = Some(playground.clone());
    Ok(playground)
}

/// Remove the installed playground
///
/// Registered experiments and store contents are untouched; call
/// [`Playground::reset`] on the returned handle to clear them.
pub fn reset() -> Option<Playground> {
    PLAYGROUND.write().take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaygroundConfig;
    use vanity_experiment::ExperimentDefinition;

    // One test owns the global so parallel test threads do not race on it.
    #[test]
    fn install_lookup_and_reset() {
        reset();
        assert!(matches!(installed(), Err(VanityError::NotInstalled)));

        let first = Playground::new(PlaygroundConfig::new().with_test_mode(true));
        first
            .register_experiment(ExperimentDefinition::new("pie_or_cake"))
            .unwrap();
        assert!(install(first).is_none());

        let found = installed().unwrap();
        assert!(found.experiment("pie_or_cake").is_ok());
        assert!(playground().unwrap().experiment("pie_or_cake").is_ok());

        let second = Playground::new(PlaygroundConfig::new().with_test_mode(true));
        let previous = install(second).unwrap();
        assert!(previous.experiment("pie_or_cake").is_ok());
        assert!(installed().unwrap().experiment("pie_or_cake").is_err());

        assert!(reset().is_some());
        assert!(installed().is_err());
    }
}
