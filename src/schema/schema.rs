//! Catalog management: bootstrap, load, persist and resolve tables.

use std::fs;
use std::iter;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use ahash::AHashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ColstoreError, Result};
use crate::schema::catalog::{self, CATALOG_COLUMNS, CATALOG_TABLES};
use crate::schema::field::{Field, TableDescriptor};
use crate::storage::{DEFAULT_BACKEND, OpenMode, StorageConfig, Table, TableFactory};

/// Configuration for a [`Schema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Options passed to every table handle.
    pub storage: StorageConfig,

    /// Backend tag recorded for tables created through the schema.
    pub default_backend: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        SchemaConfig {
            storage: StorageConfig::default(),
            default_backend: DEFAULT_BACKEND.to_string(),
        }
    }
}

impl SchemaConfig {
    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// One table known to the catalog, with its lazily opened handle.
#[derive(Debug)]
pub struct SchemaTable {
    name: String,
    backend: String,
    declaration: TableDescriptor,
    handle: Option<Box<dyn Table>>,
}

impl SchemaTable {
    fn new(name: String, backend: String, declaration: TableDescriptor) -> Self {
        SchemaTable {
            name,
            backend,
            declaration,
            handle: None,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend tag used to open the table.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// The table's declared path and fields.
    pub fn declaration(&self) -> &TableDescriptor {
        &self.declaration
    }

    /// Whether a handle is currently cached.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn resolve(&mut self, config: &StorageConfig) -> Result<(&mut dyn Table, &TableDescriptor)> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => self.open_or_create(config)?,
        };

        let handle = self.handle.insert(handle);
        Ok((&mut **handle, &self.declaration))
    }

    fn open_or_create(&self, config: &StorageConfig) -> Result<Box<dyn Table>> {
        let path = self.declaration.path();

        match TableFactory::open(&self.backend, path, OpenMode::ReadOnly, config) {
            Ok(handle) => {
                debug!("Opened table '{}' at {}", self.name, path.display());
                Ok(handle)
            }
            Err(e) if e.is_not_found() => {
                info!(
                    "Table '{}' has no file yet, creating {}",
                    self.name,
                    path.display()
                );
                let mut handle = TableFactory::open(&self.backend, path, OpenMode::Truncate, config)?;
                handle.sync()?;
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    fn release(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(mut handle) => handle.close(),
            None => Ok(()),
        }
    }
}

/// The self-describing catalog of a data directory.
///
/// The two catalog tables are always present and listed first; user tables
/// follow in creation order.
#[derive(Debug)]
pub struct Schema {
    /// Catalog directory
    path: PathBuf,
    config: SchemaConfig,
    ca_tables: SchemaTable,
    ca_columns: SchemaTable,
    /// User tables by name
    tables: AHashMap<String, SchemaTable>,
    /// User table names in catalog order
    table_order: Vec<String>,
}

impl Schema {
    /// Open the catalog in `path` with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, SchemaConfig::default())
    }

    /// Open the catalog in `path`, bootstrapping a fresh one if the
    /// directory has none.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: SchemaConfig) -> Result<Self> {
        let path = path.as_ref();
        validate_catalog_path(path)?;

        let tables_path = path.join(CATALOG_TABLES);
        match TableFactory::open(
            DEFAULT_BACKEND,
            &tables_path,
            OpenMode::ReadOnly,
            &config.storage,
        ) {
            Ok(ca_tables) => Self::load(path, config, ca_tables),
            Err(e) if e.is_not_found() => Self::bootstrap(path, config),
            Err(e) => Err(e),
        }
    }

    fn empty(path: &Path, config: SchemaConfig) -> Result<Self> {
        Ok(Schema {
            path: path.to_path_buf(),
            ca_tables: SchemaTable::new(
                CATALOG_TABLES.to_string(),
                DEFAULT_BACKEND.to_string(),
                catalog::tables_descriptor(path)?,
            ),
            ca_columns: SchemaTable::new(
                CATALOG_COLUMNS.to_string(),
                DEFAULT_BACKEND.to_string(),
                catalog::columns_descriptor(path)?,
            ),
            config,
            tables: AHashMap::new(),
            table_order: Vec::new(),
        })
    }

    fn bootstrap(path: &Path, config: SchemaConfig) -> Result<Self> {
        info!("Bootstrapping new catalog in {}", path.display());

        fs::create_dir_all(path)?;
        let mut schema = Self::empty(path, config)?;
        schema.save()?;
        Ok(schema)
    }

    fn load(path: &Path, config: SchemaConfig, mut ca_tables: Box<dyn Table>) -> Result<Self> {
        let columns_path = path.join(CATALOG_COLUMNS);
        let mut ca_columns = match TableFactory::open(
            DEFAULT_BACKEND,
            &columns_path,
            OpenMode::ReadOnly,
            &config.storage,
        ) {
            Ok(table) => table,
            Err(e) if e.is_not_found() => {
                return Err(ColstoreError::catalog_corrupt(format!(
                    "{} exists but {} is missing",
                    CATALOG_TABLES, CATALOG_COLUMNS
                )));
            }
            Err(e) => return Err(e),
        };

        let mut bootstrap_tables = None;
        let mut bootstrap_columns = None;
        let mut tables = AHashMap::new();
        let mut table_order = Vec::new();

        while let Some(row) = ca_tables.read_row()? {
            let (table_path, backend) = catalog::decode_table_row(&row.key, &row.value)?;
            let fields = read_fields(&mut *ca_columns, &row.key)?;
            let declaration = TableDescriptor::new(table_path, fields)?;
            let table = SchemaTable::new(row.key.clone(), backend, declaration);

            let duplicate = match row.key.as_str() {
                CATALOG_TABLES => bootstrap_tables.replace(table).is_some(),
                CATALOG_COLUMNS => bootstrap_columns.replace(table).is_some(),
                _ => {
                    let duplicate = tables.insert(row.key.clone(), table).is_some();
                    if !duplicate {
                        table_order.push(row.key.clone());
                    }
                    duplicate
                }
            };

            if duplicate {
                return Err(ColstoreError::catalog_corrupt(format!(
                    "Table '{}' is listed more than once",
                    row.key
                )));
            }
        }

        ca_columns.close()?;
        ca_tables.close()?;

        let (Some(ca_tables), Some(ca_columns)) = (bootstrap_tables, bootstrap_columns) else {
            return Err(ColstoreError::catalog_corrupt(
                "Catalog does not describe its own tables",
            ));
        };

        info!(
            "Loaded catalog from {} ({} user tables)",
            path.display(),
            table_order.len()
        );

        Ok(Schema {
            path: path.to_path_buf(),
            config,
            ca_tables,
            ca_columns,
            tables,
            table_order,
        })
    }

    /// Rewrite both catalog tables from the in-memory state.
    ///
    /// The two files are replaced one after the other, so a crash in between
    /// can leave them disagreeing.
    pub fn save(&mut self) -> Result<()> {
        // Cached handles may map the files about to be truncated.
        self.ca_tables.release()?;
        self.ca_columns.release()?;

        let storage = &self.config.storage;
        let mut ca_tables = TableFactory::open(
            &self.ca_tables.backend,
            self.ca_tables.declaration.path(),
            OpenMode::Truncate,
            storage,
        )?;
        let mut ca_columns = TableFactory::open(
            &self.ca_columns.backend,
            self.ca_columns.declaration.path(),
            OpenMode::Truncate,
            storage,
        )?;

        let mut table_count = 0;
        for table in self.iter() {
            let path = path_str(table.declaration.path())?;
            let value = catalog::encode_table_row(path, &table.backend)?;
            ca_tables.insert_row(&table.name, &[value.as_slice()])?;

            for field in &table.declaration.fields {
                let value = catalog::encode_column_row(field);
                ca_columns.insert_row(&table.name, &[value.as_slice()])?;
            }
            table_count += 1;
        }

        ca_columns.sync()?;
        ca_tables.sync()?;
        ca_columns.close()?;
        ca_tables.close()?;

        debug!(
            "Saved catalog in {} ({table_count} tables)",
            self.path.display()
        );
        Ok(())
    }

    /// Register a new table and persist the catalog.
    ///
    /// Relative paths are placed under the catalog directory and may not
    /// point at a catalog file. If the catalog cannot be saved, the table is
    /// forgotten again.
    pub fn create_table(&mut self, name: &str, declaration: TableDescriptor) -> Result<()> {
        if declaration.fields.is_empty() {
            return Err(ColstoreError::invalid_schema(
                "Table must have at least one column",
            ));
        }

        if name.is_empty() || name.contains('\0') {
            return Err(ColstoreError::invalid_schema(format!(
                "Invalid table name {name:?}"
            )));
        }

        if catalog::is_catalog_table(name) {
            return Err(ColstoreError::invalid_schema(format!(
                "Table name '{name}' is reserved for the catalog"
            )));
        }

        if self.contains(name) {
            return Err(ColstoreError::invalid_schema(format!(
                "Table '{name}' already exists"
            )));
        }

        let mut declaration = declaration;
        if declaration.path.is_relative() {
            declaration.path = self.path.join(&declaration.path);
        }

        // Saving truncates the catalog files, which must not be mapped by a
        // user table handle.
        if declaration.path == self.ca_tables.declaration.path
            || declaration.path == self.ca_columns.declaration.path
        {
            return Err(ColstoreError::invalid_schema(format!(
                "Table '{name}' cannot be stored in catalog file {}",
                declaration.path.display()
            )));
        }
        catalog::encode_table_row(path_str(declaration.path())?, &self.config.default_backend)?;

        let table = SchemaTable::new(
            name.to_string(),
            self.config.default_backend.clone(),
            declaration,
        );
        self.tables.insert(name.to_string(), table);
        self.table_order.push(name.to_string());

        if let Err(e) = self.save() {
            warn!("Failed to save catalog after creating table '{name}': {e}");
            self.tables.remove(name);
            self.table_order.pop();
            return Err(e);
        }

        info!("Created table '{name}'");
        Ok(())
    }

    /// Look up a table and return its open handle and declaration.
    ///
    /// The handle is opened read-only on first use and cached. A table whose
    /// file does not exist yet is created empty.
    pub fn resolve(&mut self, name: &str) -> Result<(&mut dyn Table, &TableDescriptor)> {
        let table = match name {
            CATALOG_TABLES => &mut self.ca_tables,
            CATALOG_COLUMNS => &mut self.ca_columns,
            _ => self
                .tables
                .get_mut(name)
                .ok_or_else(|| ColstoreError::table_not_found(name))?,
        };

        table.resolve(&self.config.storage)
    }

    /// Whether a table with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Look up a table without opening it.
    pub fn table(&self, name: &str) -> Option<&SchemaTable> {
        match name {
            CATALOG_TABLES => Some(&self.ca_tables),
            CATALOG_COLUMNS => Some(&self.ca_columns),
            _ => self.tables.get(name),
        }
    }

    /// All tables in catalog order, catalog tables first.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaTable> {
        iter::once(&self.ca_tables)
            .chain(iter::once(&self.ca_columns))
            .chain(self.table_order.iter().filter_map(|name| self.tables.get(name)))
    }

    /// Table names in catalog order.
    pub fn table_names(&self) -> Vec<&str> {
        self.iter().map(SchemaTable::name).collect()
    }

    /// Number of tables, catalog tables included.
    pub fn len(&self) -> usize {
        2 + self.tables.len()
    }

    /// Always false: the catalog lists at least itself.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Catalog directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration the catalog was opened with.
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Close every cached table handle.
    ///
    /// All handles are released even if one fails; the first error is
    /// returned.
    pub fn close(mut self) -> Result<()> {
        let mut first_error = None;

        let tables = iter::once(&mut self.ca_tables)
            .chain(iter::once(&mut self.ca_columns))
            .chain(self.tables.values_mut());
        for table in tables {
            if let Err(e) = table.release() {
                warn!("Failed to close table '{}': {e}", table.name);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn validate_catalog_path(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(ColstoreError::invalid_path(format!(
            "Schema path must be absolute: {}",
            path.display()
        )));
    }

    if path.as_os_str().to_string_lossy().ends_with(MAIN_SEPARATOR) {
        return Err(ColstoreError::invalid_path(format!(
            "Schema path must not end with a slash: {}",
            path.display()
        )));
    }

    Ok(())
}

fn read_fields(ca_columns: &mut dyn Table, table: &str) -> Result<Vec<Field>> {
    if !ca_columns.seek_to_key(table)? {
        return Err(ColstoreError::catalog_corrupt(format!(
            "Table '{table}' has no fields"
        )));
    }

    let mut fields = Vec::new();
    while let Some(row) = ca_columns.read_row()? {
        if row.key != table {
            break;
        }
        fields.push(catalog::decode_column_row(table, &row.value)?);
    }

    if fields.is_empty() {
        return Err(ColstoreError::catalog_corrupt(format!(
            "Table '{table}' has no fields"
        )));
    }

    Ok(fields)
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        ColstoreError::invalid_path(format!("Path is not valid UTF-8: {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::FieldType;
    use tempfile::TempDir;

    fn catalog_dir(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("catalog")
    }

    fn docs_descriptor(path: &str) -> TableDescriptor {
        TableDescriptor::new(
            path,
            vec![
                Field::new("id", FieldType::Text).unwrap().primary_key().not_null(),
                Field::new("body", FieldType::Text).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_paths() {
        assert!(matches!(
            Schema::open("relative/catalog"),
            Err(ColstoreError::InvalidPath(_))
        ));

        let temp_dir = TempDir::new().unwrap();
        let trailing = format!("{}/", temp_dir.path().display());
        assert!(matches!(
            Schema::open(trailing),
            Err(ColstoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_bootstrap_writes_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let dir = catalog_dir(&temp_dir);

        let schema = Schema::open(&dir).unwrap();
        assert_eq!(schema.table_names(), vec![CATALOG_TABLES, CATALOG_COLUMNS]);
        assert!(dir.join(CATALOG_TABLES).exists());
        assert!(dir.join(CATALOG_COLUMNS).exists());
        schema.close().unwrap();

        let reopened = Schema::open(&dir).unwrap();
        assert_eq!(reopened.len(), 2);
        let columns = reopened.table(CATALOG_COLUMNS).unwrap();
        assert_eq!(columns.declaration().field_count(), 5);
        assert_eq!(columns.backend(), DEFAULT_BACKEND);
    }

    #[test]
    fn test_create_table_persists() {
        let temp_dir = TempDir::new().unwrap();
        let dir = catalog_dir(&temp_dir);

        let mut schema = Schema::open(&dir).unwrap();
        schema.create_table("docs", docs_descriptor("docs.tbl")).unwrap();
        schema
            .create_table("notes", docs_descriptor("/tmp/notes.tbl"))
            .unwrap();
        schema.close().unwrap();

        let schema = Schema::open(&dir).unwrap();
        assert_eq!(
            schema.table_names(),
            vec![CATALOG_TABLES, CATALOG_COLUMNS, "docs", "notes"]
        );

        let docs = schema.table("docs").unwrap().declaration();
        assert_eq!(docs.path, dir.join("docs.tbl"));
        assert_eq!(docs.fields[0].name.as_str(), "id");
        assert!(docs.fields[0].is_primary_key());
        assert!(docs.fields[0].is_not_null());
        assert!(!docs.fields[1].is_not_null());

        let notes = schema.table("notes").unwrap().declaration();
        assert_eq!(notes.path, PathBuf::from("/tmp/notes.tbl"));
    }

    #[test]
    fn test_create_table_rejects_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let mut schema = Schema::open(catalog_dir(&temp_dir)).unwrap();

        schema.create_table("docs", docs_descriptor("docs.tbl")).unwrap();
        assert!(matches!(
            schema.create_table("docs", docs_descriptor("other.tbl")),
            Err(ColstoreError::InvalidSchema(_))
        ));
        assert!(matches!(
            schema.create_table(CATALOG_TABLES, docs_descriptor("x.tbl")),
            Err(ColstoreError::InvalidSchema(_))
        ));
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_create_table_rejects_empty_declaration() {
        let temp_dir = TempDir::new().unwrap();
        let mut schema = Schema::open(catalog_dir(&temp_dir)).unwrap();

        let empty = TableDescriptor {
            path: PathBuf::from("empty.tbl"),
            fields: Vec::new(),
        };
        assert!(matches!(
            schema.create_table("empty", empty),
            Err(ColstoreError::InvalidSchema(_))
        ));
        assert!(!schema.contains("empty"));
    }

    #[test]
    fn test_create_table_rolls_back_failed_save() {
        let temp_dir = TempDir::new().unwrap();
        let dir = catalog_dir(&temp_dir);
        let mut schema = Schema::open(&dir).unwrap();

        // A directory in place of ca_columns makes the rewrite fail.
        fs::remove_file(dir.join(CATALOG_COLUMNS)).unwrap();
        fs::create_dir(dir.join(CATALOG_COLUMNS)).unwrap();

        let result = schema.create_table("docs", docs_descriptor("docs.tbl"));
        assert!(matches!(result, Err(ColstoreError::Io(_))));
        assert!(!schema.contains("docs"));
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.table_names(), vec![CATALOG_TABLES, CATALOG_COLUMNS]);
    }

    #[test]
    fn test_create_table_rejects_catalog_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        let dir = catalog_dir(&temp_dir);
        let mut schema = Schema::open(&dir).unwrap();

        let relative = docs_descriptor(CATALOG_COLUMNS);
        assert!(matches!(
            schema.create_table("shadow", relative),
            Err(ColstoreError::InvalidSchema(_))
        ));

        let absolute = docs_descriptor(dir.join(CATALOG_TABLES).to_str().unwrap());
        assert!(matches!(
            schema.create_table("shadow", absolute),
            Err(ColstoreError::InvalidSchema(_))
        ));

        assert!(!schema.contains("shadow"));
        schema.create_table("docs", docs_descriptor("docs.tbl")).unwrap();
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_resolve_creates_missing_table() {
        let temp_dir = TempDir::new().unwrap();
        let dir = catalog_dir(&temp_dir);
        let mut schema = Schema::open(&dir).unwrap();
        schema.create_table("docs", docs_descriptor("docs.tbl")).unwrap();

        let (table, declaration) = schema.resolve("docs").unwrap();
        assert_eq!(declaration.field_count(), 2);
        assert!(table.read_row().unwrap().is_none());
        assert!(dir.join("docs.tbl").exists());
        assert!(schema.table("docs").unwrap().is_open());
    }

    #[test]
    fn test_resolve_catalog_tables() {
        let temp_dir = TempDir::new().unwrap();
        let mut schema = Schema::open(catalog_dir(&temp_dir)).unwrap();
        schema.create_table("docs", docs_descriptor("docs.tbl")).unwrap();

        let (table, declaration) = schema.resolve(CATALOG_TABLES).unwrap();
        assert_eq!(declaration.field_count(), 3);

        let mut names = Vec::new();
        while let Some(row) = table.read_row().unwrap() {
            names.push(row.key);
        }
        assert_eq!(names, vec![CATALOG_TABLES, CATALOG_COLUMNS, "docs"]);

        // Saving again drops the cached handle before rewriting.
        schema.create_table("more", docs_descriptor("more.tbl")).unwrap();
        assert!(!schema.table(CATALOG_TABLES).unwrap().is_open());
    }

    #[test]
    fn test_resolve_unknown_table() {
        let temp_dir = TempDir::new().unwrap();
        let mut schema = Schema::open(catalog_dir(&temp_dir)).unwrap();

        match schema.resolve("missing") {
            Err(ColstoreError::TableNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("Expected TableNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_missing_columns_table() {
        let temp_dir = TempDir::new().unwrap();
        let dir = catalog_dir(&temp_dir);
        Schema::open(&dir).unwrap().close().unwrap();

        fs::remove_file(dir.join(CATALOG_COLUMNS)).unwrap();
        assert!(matches!(
            Schema::open(&dir),
            Err(ColstoreError::CatalogCorrupt(_))
        ));
    }

    #[test]
    fn test_load_rejects_table_without_columns() {
        let temp_dir = TempDir::new().unwrap();
        let dir = catalog_dir(&temp_dir);
        let config = StorageConfig::default();
        fs::create_dir_all(&dir).unwrap();

        let mut ca_tables = TableFactory::open(
            DEFAULT_BACKEND,
            &dir.join(CATALOG_TABLES),
            OpenMode::Truncate,
            &config,
        )
        .unwrap();
        let value = catalog::encode_table_row("/tmp/orphan", DEFAULT_BACKEND).unwrap();
        ca_tables.insert_row("orphan", &[value.as_slice()]).unwrap();
        ca_tables.sync().unwrap();
        ca_tables.close().unwrap();

        let mut ca_columns = TableFactory::open(
            DEFAULT_BACKEND,
            &dir.join(CATALOG_COLUMNS),
            OpenMode::Truncate,
            &config,
        )
        .unwrap();
        ca_columns.sync().unwrap();
        ca_columns.close().unwrap();

        match Schema::open(&dir) {
            Err(ColstoreError::CatalogCorrupt(msg)) => assert!(msg.contains("orphan")),
            other => panic!("Expected CatalogCorrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_config_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("colstore.json");
        fs::write(&config_path, r#"{"storage": {"use_mmap": false}}"#).unwrap();

        let config = SchemaConfig::from_file(&config_path).unwrap();
        assert!(!config.storage.use_mmap);
        assert_eq!(config.default_backend, DEFAULT_BACKEND);

        let mut schema = Schema::open_with_config(catalog_dir(&temp_dir), config).unwrap();
        schema.create_table("docs", docs_descriptor("docs.tbl")).unwrap();
        assert!(!schema.config().storage.use_mmap);
    }
}
