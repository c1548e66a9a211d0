//! Generates yaml JSON schemas for the certificate configuration and the App request body.
//! Writes into the directory named by the `SCHEMA_DIR` environment variable.
use std::{fs::File, io::Write, path};

use deploycat_model::{AppRequest, CertificateConfig};
use schemars::schema_for;

#[allow(clippy::unwrap_used)]
fn main() {
    let dir = std::env::var_os("SCHEMA_DIR").unwrap();

    let schemas = [
        ("certificate-config.yaml", schema_for!(CertificateConfig)),
        ("app-request.yaml", schema_for!(AppRequest)),
    ];

    for (file_name, schema) in schemas {
        let yaml = serde_yaml::to_string(&schema).unwrap();
        let mut file = File::create(path::Path::new(&dir).join(file_name)).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
    }
}
