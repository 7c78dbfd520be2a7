use std::process::Command;

use anyhow::{Context, Result};

/// Tier combinations of `sidepanel-common` that must build on their own
const FEATURE_COMBINATIONS: &[&[&str]] = &[
    &["foundation"],
    &["observability"],
    &["runtime"],
    &["platform"],
    &["runtime", "test-utils"],
];

/// Check that every supported tier combination compiles without defaults.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} sidepanel-common feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, features) in FEATURE_COMBINATIONS.iter().enumerate() {
        let joined = features.join(",");

        println!(
            "\n[{}/{}] cargo check -p sidepanel-common --no-default-features --features {joined}",
            index + 1,
            FEATURE_COMBINATIONS.len(),
        );

        let status = Command::new("cargo")
            .args(["check", "-p", "sidepanel-common", "--no-default-features", "--features"])
            .arg(&joined)
            .status()
            .with_context(|| format!("Failed to run cargo check for '{joined}'"))?;

        if !status.success() {
            anyhow::bail!("Feature combination '{joined}' failed to compile");
        }

        println!("✅ Features '{joined}' compiled successfully");
    }

    println!("\n✅ All {} feature combinations compile successfully!", FEATURE_COMBINATIONS.len());

    Ok(())
}
