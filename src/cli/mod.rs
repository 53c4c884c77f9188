//! IR-014: CLI subcommands — validate, resolve, key, kinds.

use crate::core::{key, parser, registry::KindRegistry};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the infrastructure definition in a resolve request
    Validate {
        /// Path to the request YAML
        #[arg(short, long, default_value = "request.yaml")]
        file: PathBuf,
    },

    /// Resolve a request into an infrastructure outcome
    Resolve {
        /// Path to the request YAML
        #[arg(short, long, default_value = "request.yaml")]
        file: PathBuf,

        /// Print the outcome as JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Compute an infrastructure key from its parts
    Key {
        /// Environment identifier
        #[arg(long)]
        env: String,

        /// Service identifier
        #[arg(long)]
        service: Option<String>,

        /// Kind-specific key parts, in key order
        parts: Vec<String>,
    },

    /// List supported infrastructure kinds
    Kinds,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Resolve { file, json } => cmd_resolve(&file, json),
        Commands::Key { env, service, parts } => {
            println!("{}", render_key(&env, service.as_deref(), &parts));
            Ok(())
        }
        Commands::Kinds => {
            print!("{}", render_kinds());
            Ok(())
        }
    }
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let request = parser::parse_request_file(file).map_err(|e| e.to_string())?;
    let infra = request.validate().map_err(|e| e.to_string())?;
    let details = infra.details();
    println!(
        "OK: {} ({}, identifier {})",
        details.infra_name,
        infra.kind(),
        details.infra_identifier
    );
    Ok(())
}

fn cmd_resolve(file: &Path, json: bool) -> Result<(), String> {
    let request = parser::parse_request_file(file).map_err(|e| e.to_string())?;
    let outcome = request.resolve(None).map_err(|e| e.to_string())?;
    let rendered = if json {
        serde_json::to_string_pretty(&outcome).map_err(|e| format!("JSON error: {}", e))?
    } else {
        serde_yaml_ng::to_string(&outcome).map_err(|e| format!("YAML error: {}", e))?
    };
    println!("{}", rendered);
    Ok(())
}

fn render_key(env: &str, service: Option<&str>, parts: &[String]) -> String {
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
    let key = key::compute_infra_key(service, env, &parts);
    format!("{}  (short {})", key.key, key.short_key)
}

fn render_kinds() -> String {
    let mut out = String::new();
    for d in KindRegistry::global().kinds() {
        let mut flags = Vec::new();
        if d.supports_dynamic_provisioning {
            flags.push("dynamic");
        }
        if d.legacy_short_key {
            flags.push("short-key");
        }
        out.push_str(&format!(
            "{:<28} key: {:<60} {}\n",
            d.kind.as_str(),
            d.key_fields.join(", "),
            flags.join(" ")
        ));
    }
    out
}
