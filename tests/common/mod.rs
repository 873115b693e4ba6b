#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

pub const ORDERS_CSV: &str = "ID,Full Name,Total\n1,O'Brien,12.50\n2,Alice,7\n";

pub const USERS_SCHEMA: &str = "\
users:
  - name: id
    data_type: integer
    is_nullable: false
    is_identity: true
  - name: full_name
    data_type: text
  - name: total
    data_type: numeric(10,2)
  - name: tenant_id
    data_type: integer
    is_nullable: false
    is_foreign_key: true
    foreign_key_table: tenants
    foreign_key_column: id
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of `name` inside the workspace, without creating it.
    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
