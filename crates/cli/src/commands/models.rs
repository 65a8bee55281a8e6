//! Model registry commands

use anyhow::{bail, Result};
use longevity_core::manager::{ModelManager, ModelRegistryEntry};
use tabled::Tabled;

use crate::config::Settings;
use crate::output::{print_info, print_json, print_table, OutputFormat};

/// Row for models table
#[derive(Tabled, serde::Serialize)]
struct ModelRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    model_type: String,
    #[tabled(rename = "File")]
    file_name: String,
    #[tabled(rename = "Directory")]
    directory: String,
    #[tabled(rename = "Default")]
    default: String,
}

impl ModelRow {
    fn new(entry: &ModelRegistryEntry, default_name: &str) -> Self {
        Self {
            name: entry.name.clone(),
            model_type: entry.model_type.clone(),
            file_name: entry.file_name.clone(),
            directory: entry.directory.display().to_string(),
            default: if entry.name == default_name { "*" } else { "" }.to_string(),
        }
    }
}

fn discover(settings: &Settings) -> ModelManager {
    let manager = ModelManager::new(settings.manager_config());
    manager.discover();
    manager
}

/// List every discovered model in registry order
pub fn list_models(settings: &Settings) -> Result<()> {
    let manager = discover(settings);
    let registry = manager.registry();
    let default_name = manager.config().default_name().to_string();

    let rows: Vec<ModelRow> = registry
        .iter()
        .map(|entry| ModelRow::new(entry, &default_name))
        .collect();

    print_table(&rows, settings.format);

    if matches!(settings.format, OutputFormat::Table) {
        print_info(&format!(
            "{} model(s) in {}",
            rows.len(),
            settings.model_dir.display()
        ));
    }

    Ok(())
}

/// Show one registry entry, including its metadata
pub fn show_model(settings: &Settings, name: &str) -> Result<()> {
    let manager = discover(settings);
    let Some(entry) = manager.get_model_info(Some(name)) else {
        bail!("Model '{}' not found in {}", name, settings.model_dir.display());
    };

    match settings.format {
        OutputFormat::Json => print_json(&entry),
        OutputFormat::Table => {
            let default_name = manager.config().default_name().to_string();
            print_table(&[ModelRow::new(&entry, &default_name)], settings.format);
            if entry.metadata.is_empty() {
                print_info("No metadata");
            } else {
                print_json(&entry.metadata);
            }
        }
    }

    Ok(())
}
