//! Resolve pointcuts against a catalog manifest and report the join points.

use super::{load_config, load_specifications};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use weft_core::{any_of, JoinPoint, Pointcut};
use weft_runtime::Manifest;

#[derive(Serialize)]
struct Resolution {
    types: Vec<String>,
    matched: Vec<String>,
    not_matched: Vec<String>,
}

impl Resolution {
    fn of(pointcut: &Pointcut) -> Self {
        let names = |join_points: &std::collections::BTreeSet<JoinPoint>| {
            join_points.iter().map(ToString::to_string).collect::<Vec<_>>()
        };
        Self {
            types: pointcut
                .candidate_types()
                .matched_keys()
                .map(ToString::to_string)
                .collect(),
            matched: names(pointcut.join_points_matched()),
            not_matched: names(pointcut.join_points_not_matched()),
        }
    }
}

/// Resolve every pointcut in `pointcut_path` and print their union.
pub fn resolve(config_path: &Path, catalog_path: &Path, pointcut_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let manifest = Manifest::from_file(catalog_path).context("Failed to load catalog manifest")?;
    let runtime = manifest.build(config).context("Failed to build catalog")?;

    let pointcuts = load_specifications(pointcut_path)?
        .into_iter()
        .map(|spec| runtime.pointcut(spec))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to resolve pointcut")?;
    let resolution = Resolution::of(&any_of(&pointcuts));

    if json {
        let payload = serde_json::to_string_pretty(&resolution)?;
        println!("{}", payload);
    } else {
        print_section("Matched", &resolution.matched);
        print_section("Not matched", &resolution.not_matched);
    }

    Ok(())
}

fn print_section(title: &str, join_points: &[String]) {
    let noun = if join_points.len() == 1 { "join point" } else { "join points" };
    println!("{}: {} {}", title, join_points.len(), noun);
    for join_point in join_points {
        println!("  {}", join_point);
    }
}
