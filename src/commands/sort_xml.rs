//! The sort-xml action: sorts the functions of one group of an XML document by name.

use super::pipeline::resolve_path;
use crate::cli::SortXmlArgs;
use crate::formatter::{load_xml, save_xml};
use anyhow::{bail, Context, Result};
use std::path::Path;

pub fn run_sort_xml(args: &SortXmlArgs, root: &Path) -> Result<()> {
    let xml_path = resolve_path(root, &args.xml);
    let output_path = resolve_path(root, &args.output);

    let mut apidoc = load_xml(&xml_path).context("Failed to load XML document")?;
    let Some(group) = apidoc
        .groups
        .iter_mut()
        .find(|g| g.url_prefix == args.group || g.group_name == args.group)
    else {
        bail!("Group not found in Apidoc: {}", args.group);
    };
    group.sort();

    save_xml(&output_path, &apidoc)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    println!("Output: {}", output_path.display());
    Ok(())
}
