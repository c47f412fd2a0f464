//! `cmsdev services`: the keys accepted by `test` and their effective timeouts.

use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, ServiceCheck, ServiceKey};

#[derive(Debug, Serialize)]
pub struct ServiceEntry {
    pub service: String,
    pub check: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ServiceListOutput {
    pub services: Vec<ServiceEntry>,
}

impl ServiceListOutput {
    pub fn from_config(config: &Config) -> Self {
        let services = ServiceKey::ALL
            .iter()
            .map(|key| ServiceEntry {
                service: key.as_str().to_string(),
                check: check_name(key.check()).to_string(),
                timeout_secs: config.timeout_for(*key),
            })
            .collect();
        Self { services }
    }
}

const fn check_name(check: ServiceCheck) -> &'static str {
    match check {
        ServiceCheck::Bos => "bos",
        ServiceCheck::Cfs => "cfs",
        ServiceCheck::Conman => "conman",
        ServiceCheck::Crus => "crus",
        ServiceCheck::Ims => "ims",
        ServiceCheck::IpxeTftp => "ipxe/tftp",
        ServiceCheck::Vcs => "vcs/gitea",
    }
}

impl CommandOutput for ServiceListOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_services(&self.services)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self)
    }
}

pub fn execute(config: &Config, json_mode: bool) {
    output(&ServiceListOutput::from_config(config), json_mode);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_key_with_configured_timeout() {
        let mut config = Config::default();
        config.timeouts.per_service.insert("ims".to_string(), 42);

        let list = ServiceListOutput::from_config(&config);
        assert_eq!(list.services.len(), ServiceKey::ALL.len());
        let ims = list.services.iter().find(|s| s.service == "ims").unwrap();
        assert_eq!(ims.timeout_secs, 42);
        let gitea = list.services.iter().find(|s| s.service == "gitea").unwrap();
        assert_eq!(gitea.check, "vcs/gitea");
    }
}
