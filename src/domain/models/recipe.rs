use std::fmt;

use serde::{Deserialize, Serialize};

/// Name and linux distribution of an IMS recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImsRecipe {
    pub name: String,
    pub distro: String,
}

impl ImsRecipe {
    pub fn new(name: impl Into<String>, distro: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            distro: distro.into(),
        }
    }

    /// Pods created for this recipe are named `cray-init-recipe-<name>-...`.
    pub fn owns_init_pod(&self, pod_name: &str) -> bool {
        pod_name
            .strip_prefix("cray-init-recipe-")
            .and_then(|rest| rest.strip_prefix(self.name.as_str()))
            .is_some_and(|rest| rest.starts_with('-'))
    }
}

impl fmt::Display for ImsRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.distro)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owns_init_pod() {
        let recipe = ImsRecipe::new("cray-sles15sp4-barebones", "sles15");
        assert!(recipe.owns_init_pod("cray-init-recipe-cray-sles15sp4-barebones-8xk2p"));
        assert!(!recipe.owns_init_pod("cray-init-recipe-cray-sles15sp4-barebones"));
        assert!(!recipe.owns_init_pod("cray-init-recipe-other-8xk2p"));
        assert!(!recipe.owns_init_pod("cray-ims-cray-sles15sp4-barebones-8xk2p"));
    }
}
