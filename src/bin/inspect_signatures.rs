//! Print the signature / timestamp graph of a PDF
//!
//! Usage:
//!   cargo run --release --bin inspect_signatures -- signed.pdf
//!   cargo run --release --bin inspect_signatures -- signed.pdf --json --max-depth 16

use std::path::PathBuf;
use std::process::ExitCode;

use pades_oxide::signatures::{AttestationGraph, AttestationKind, SignatureGraphBuilder};
use pades_oxide::DiscoveryConfig;

struct InspectConfig {
    path: PathBuf,
    json: bool,
    max_depth: Option<usize>,
}

impl InspectConfig {
    fn from_args() -> Option<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut path = None;
        let mut json = false;
        let mut max_depth = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--json" => json = true,
                "--max-depth" => {
                    i += 1;
                    max_depth = args.get(i).and_then(|v| v.parse().ok());
                    if max_depth.is_none() {
                        eprintln!("--max-depth expects a number");
                        return None;
                    }
                },
                other if path.is_none() && !other.starts_with("--") => path = Some(PathBuf::from(other)),
                other => {
                    eprintln!("unexpected argument: {}", other);
                    return None;
                },
            }
            i += 1;
        }

        Some(Self {
            path: path?,
            json,
            max_depth,
        })
    }
}

fn print_text(graph: &AttestationGraph) {
    for (attestation, top_level) in graph.iter() {
        let kind = match attestation.kind() {
            AttestationKind::Signature { signer } => {
                format!("signature ({})", signer.as_deref().unwrap_or("unknown signer"))
            },
            AttestationKind::Timestamp { timestamp_type, .. } => format!("timestamp ({:?})", timestamp_type),
        };
        let covered_by: Vec<String> = attestation
            .outer_attestations()
            .iter()
            .map(|fp| format!("{:08x}", fp.unique_id()))
            .collect();
        let integrity = attestation.check_integrity();
        println!(
            "{:08x} {} {} covered-by=[{}] found={} intact={} signature={}",
            attestation.unique_id(),
            kind,
            if top_level { "top-level" } else { "covered" },
            covered_by.join(","),
            integrity.reference_data_found,
            integrity.reference_data_intact,
            integrity.signature_intact,
        );
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(config) = InspectConfig::from_args() else {
        eprintln!("Usage: inspect_signatures <file.pdf> [--json] [--max-depth N]");
        return ExitCode::FAILURE;
    };

    let bytes = match std::fs::read(&config.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", config.path.display(), e);
            return ExitCode::FAILURE;
        },
    };

    let mut discovery = DiscoveryConfig::default();
    if let Some(depth) = config.max_depth {
        discovery = discovery.with_max_revision_depth(depth);
    }
    let graph = match SignatureGraphBuilder::new(discovery).discover(bytes, |_| Ok(())) {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        },
    };

    if config.json {
        match serde_json::to_string_pretty(&graph.summaries()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            },
        }
    } else if graph.is_empty() {
        println!("no signatures found");
    } else {
        print_text(&graph);
    }
    ExitCode::SUCCESS
}
