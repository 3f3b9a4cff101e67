//! Check pointcut options without a catalog.

use super::load_specifications;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ValidationSummary {
    valid: bool,
    specifications: usize,
    with_targets: usize,
}

/// Parse and validate every specification; an invalid one fails the command.
pub fn validate(pointcut_path: &Path, json: bool) -> Result<()> {
    let specifications = load_specifications(pointcut_path)?;
    let summary = ValidationSummary {
        valid: true,
        specifications: specifications.len(),
        with_targets: specifications.iter().filter(|spec| spec.has_targets()).count(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Valid: {} pointcut specification(s), {} with type or object targets",
            summary.specifications, summary.with_targets
        );
    }

    Ok(())
}
