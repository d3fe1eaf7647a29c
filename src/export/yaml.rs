//! YAML Export functionality
//!
//! Exports the ledger and plans to YAML format for human review.

use crate::error::{VaultError, VaultResult};
use crate::export::json::FullExport;
use crate::storage::Storage;
use std::io::Write;

/// Export the ledger and plans to YAML format
pub fn export_full_yaml<W: Write>(storage: &Storage, writer: &mut W) -> VaultResult<()> {
    let export = FullExport::from_storage(storage)?;

    writeln!(writer, "# OptiVault Ledger Export")
        .map_err(|e| VaultError::Export(e.to_string()))?;
    writeln!(writer, "# Generated: {}", export.exported_at)
        .map_err(|e| VaultError::Export(e.to_string()))?;
    writeln!(writer, "# App Version: {}", export.app_version)
        .map_err(|e| VaultError::Export(e.to_string()))?;
    writeln!(writer).map_err(|e| VaultError::Export(e.to_string()))?;

    serde_yaml::to_writer(writer, &export).map_err(|e| VaultError::Export(e.to_string()))?;

    Ok(())
}

/// Import from a YAML export
pub fn import_from_yaml(yaml_str: &str) -> VaultResult<FullExport> {
    let export: FullExport =
        serde_yaml::from_str(yaml_str).map_err(|e| VaultError::Import(e.to_string()))?;

    export.validate().map_err(VaultError::Import)?;

    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::VaultPaths;
    use crate::storage::demo_snapshot;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_export_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(paths).unwrap();
        storage.ledger.sync(&demo_snapshot(Utc::now())).unwrap();

        let mut output = Vec::new();
        export_full_yaml(&storage, &mut output).unwrap();

        let yaml_string = String::from_utf8(output).unwrap();
        assert!(yaml_string.starts_with("# OptiVault Ledger Export"));

        let imported = import_from_yaml(&yaml_string).unwrap();
        assert_eq!(imported.metadata.source_count, 8);
        assert_eq!(imported.metadata.reservation_set_count, 0);
    }
}
