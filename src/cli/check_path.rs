use anyhow::Result;

use notegate::config::NotegateConfig;
use notegate::security::{PathValidator, ValidatedPath};

/// Validate `path` the way the server would and print the verdict.
pub fn check_path(config: &NotegateConfig, path: &str, folder: bool) -> Result<()> {
    let validator = PathValidator::new(config.resolved_vault_root()).with_extensions(
        config.vault.allowed_extensions.iter().cloned(),
        config.vault.default_extension.clone(),
    );

    let verdict: Result<Option<ValidatedPath>, _> = if folder {
        validator.validate_folder(path)
    } else {
        validator.validate_with_extension(path, true).map(Some)
    };

    match verdict {
        Ok(Some(normalized)) => {
            println!("OK       {normalized}");
            println!("Resolves {}", normalized.resolve(validator.root()).display());
        }
        Ok(None) => {
            println!("OK       (vault root)");
            println!("Resolves {}", validator.root().display());
        }
        Err(reason) => {
            println!("REJECTED {path}");
            println!("Reason   {reason}");
            std::process::exit(1);
        }
    }
    Ok(())
}
