//! Prints the seeder CRDs as a multi-document YAML stream.
//!
//! `cargo run -p crds --bin crdgen > config/crd/bases/seeder.yaml`

use crds::{AddressPool, Cluster, Hardware, Inventory, Workflow};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [
        Inventory::crd(),
        Cluster::crd(),
        AddressPool::crd(),
        Hardware::crd(),
        Workflow::crd(),
    ];

    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }

    Ok(())
}
