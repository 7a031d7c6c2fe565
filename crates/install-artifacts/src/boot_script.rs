//! Inline iPXE script for legacy installs.
//!
//! Legacy Harvester releases can't stream an image, so the node boots the
//! release kernel/initrd directly and the installer is configured entirely
//! through kernel parameters. The install configuration is pulled from the
//! Tinkerbell metadata service.

use crate::error::ArtifactError;
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

const IPXE_TEMPLATE_NAME: &str = "ipxe";
const IPXE_TEMPLATE: &str = include_str!("../templates/ipxe.hbs");

/// Values substituted into the boot script
#[derive(Debug, Clone, Serialize)]
pub struct BootScriptParams<'a> {
    pub version: &'a str,
    /// Base URL of the Harvester release artifacts
    pub image_url: &'a str,
    /// Where the installer fetches its configuration
    pub metadata_url: &'a str,
    pub mac_address: &'a str,
    pub disk: &'a str,
    pub address: &'a str,
    pub netmask: &'a str,
    pub gateway: &'a str,
    pub bond_options: &'a BTreeMap<String, String>,
}

fn create_handlebars() -> Result<Handlebars<'static>, ArtifactError> {
    let mut handlebars = Handlebars::new();
    // iPXE scripts are not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    // a missing value must fail rather than render an empty kernel parameter
    handlebars.set_strict_mode(true);
    handlebars.register_template_string(IPXE_TEMPLATE_NAME, IPXE_TEMPLATE)?;
    Ok(handlebars)
}

/// Render the boot script
pub fn render_boot_script(params: &BootScriptParams<'_>) -> Result<String, ArtifactError> {
    let handlebars = create_handlebars()?;
    let script = handlebars.render(IPXE_TEMPLATE_NAME, params)?;
    debug!(
        "Rendered boot script for {} ({} bytes)",
        params.mac_address,
        script.len()
    );
    Ok(script)
}
