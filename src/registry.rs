//! Known machine identities.
//!
//! The registry is owned elsewhere (a fleet database, a config file). Views
//! only consume it: machines listed here but silent in the data still show
//! up, as stopped with no data.

use std::fmt::Debug;

use plcwatch_types::{KeyError, MachineKey};

/// Supplies the set of machines that should be visible even without data.
pub trait MachineRegistry: Send + Sync + Debug {
    fn machines(&self) -> Vec<MachineKey>;

    /// Registry entries not covered by any of `seen`.
    ///
    /// A brand-only entry is covered by any machine of that brand.
    fn missing_from(&self, seen: &[MachineKey]) -> Vec<MachineKey> {
        self.machines()
            .into_iter()
            .filter(|known| !seen.iter().any(|key| key.matches(&known.as_string())))
            .collect()
    }
}

/// A fixed list of machines.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    machines: Vec<MachineKey>,
}

impl StaticRegistry {
    pub fn new(mut machines: Vec<MachineKey>) -> Self {
        machines.sort();
        machines.dedup();
        Self { machines }
    }

    /// Parse joined `brand_model` names (or bare brands).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, KeyError> {
        let machines = names
            .iter()
            .map(|name| MachineKey::parse(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(machines))
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl MachineRegistry for StaticRegistry {
    fn machines(&self) -> Vec<MachineKey> {
        self.machines.clone()
    }
}
