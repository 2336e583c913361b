//! Dataset file persistence and the load-once product store

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::DatasetError;
use crate::product::Product;

/// Read-only handle on the harvested dataset.
///
/// The file is read on first access (or eagerly via [`DatasetStore::load`])
/// and shared afterwards. Only one thread performs the read; concurrent first
/// callers wait on `load_lock` and then see the cached list.
pub struct DatasetStore {
    path: PathBuf,
    products: OnceLock<Arc<[Product]>>,
    load_lock: Mutex<()>,
}

impl DatasetStore {
    /// Lazy store; nothing is read until [`DatasetStore::products`]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            products: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    /// Store that reads the file immediately
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let store = Self::new(path);
        store.products()?;
        Ok(store)
    }

    /// Store over an in-memory product list
    pub fn from_products(products: Vec<Product>) -> Self {
        let store = Self::new(PathBuf::new());
        let _ = store.products.set(products.into());
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All products, reading the file on first call
    pub fn products(&self) -> Result<Arc<[Product]>, DatasetError> {
        if let Some(products) = self.products.get() {
            return Ok(Arc::clone(products));
        }

        let _guard = self.load_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(products) = self.products.get() {
            return Ok(Arc::clone(products));
        }
        let loaded: Arc<[Product]> = read_json(&self.path)?.into();
        tracing::info!("Loaded {} products from {:?}", loaded.len(), self.path);
        Ok(Arc::clone(self.products.get_or_init(|| loaded)))
    }
}

/// Parse a dataset JSON file
pub fn read_json(path: &Path) -> Result<Vec<Product>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the dataset as a pretty JSON array, replacing any existing file
pub fn write_json(path: &Path, products: &[Product]) -> Result<(), DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };
    ensure_parent(path).map_err(io_err)?;
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, products).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)
}

/// Flattened CSV projection of a product
#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Product Type")]
    product_type: &'static str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Link")]
    link: &'a str,
    #[serde(rename = "Remote Testing")]
    remote_testing: &'static str,
    #[serde(rename = "Adaptive")]
    adaptive: &'static str,
    #[serde(rename = "Test Types")]
    test_types: String,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "Sections")]
    sections: String,
    #[serde(rename = "Job Family")]
    job_family: Option<u32>,
    #[serde(rename = "Job Level")]
    job_level: Option<u32>,
    #[serde(rename = "Industry")]
    industry: Option<u32>,
    #[serde(rename = "Job Category")]
    job_category: Option<u32>,
    #[serde(rename = "Detail Error")]
    detail_error: &'a str,
}

impl<'a> From<&'a Product> for CsvRow<'a> {
    fn from(p: &'a Product) -> Self {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        Self {
            product_type: p.product_type.as_str(),
            name: &p.name,
            link: &p.link,
            remote_testing: yes_no(p.remote_testing),
            adaptive: yes_no(p.adaptive),
            test_types: p.test_types.join("; "),
            description: &p.description,
            sections: p
                .sections
                .iter()
                .map(|s| format!("{}: {}", s.heading, s.text))
                .collect::<Vec<_>>()
                .join(" | "),
            job_family: p.job_family,
            job_level: p.job_level,
            industry: p.industry,
            job_category: p.job_category,
            detail_error: p.detail_error.as_deref().unwrap_or(""),
        }
    }
}

/// Write the tabular projection, replacing any existing file
pub fn write_csv(path: &Path, products: &[Product]) -> Result<(), DatasetError> {
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };
    ensure_parent(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for product in products {
        writer.serialize(CsvRow::from(product)).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{ProductType, Section};
    use tempfile::tempdir;

    fn sample_products() -> Vec<Product> {
        let mut java = Product::new(ProductType::Individual, "Java 8 (New)", "https://x/java-8/");
        java.test_types = vec!["K".to_string()];
        java.sections = vec![Section::new("Assessment length", "minutes = 18")];
        java.job_category = Some(4);

        let mut bundle = Product::new(ProductType::PrePackaged, "Bank Teller, \"Short\"", "https://x/teller/");
        bundle.remote_testing = true;
        bundle.detail_error = Some("request timed out".to_string());

        vec![java, bundle]
    }

    #[test]
    fn test_json_write_then_lazy_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/products.json");
        let products = sample_products();

        write_json(&path, &products).unwrap();

        let store = DatasetStore::new(&path);
        let loaded = store.products().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], products[0]);
        assert_eq!(loaded[1].detail_error.as_deref(), Some("request timed out"));

        // Second access is served from memory even if the file disappears
        fs::remove_file(&path).unwrap();
        assert_eq!(store.products().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_first_access_shares_one_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.json");
        write_json(&path, &sample_products()).unwrap();

        let store = DatasetStore::new(&path);
        let loaded: Vec<Arc<[Product]>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| store.products().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loaded.len(), 8);
        assert!(loaded.iter().all(|p| Arc::ptr_eq(p, &loaded[0])));
        assert_eq!(loaded[0].len(), 2);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let err = DatasetStore::load(dir.path().join("absent.json")).err().unwrap();
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn test_csv_projection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.csv");
        write_csv(&path, &sample_products()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Product Type,Name,Link,Remote Testing,Adaptive,Test Types"));
        let first = lines.next().unwrap();
        assert!(first.contains("Java 8 (New)"));
        assert!(first.contains("Assessment length: minutes = 18"));
        // Quotes in names are escaped, not split into columns
        assert!(content.contains("\"Bank Teller, \"\"Short\"\"\""));
    }

    #[test]
    fn test_in_memory_store() {
        let store = DatasetStore::from_products(sample_products());
        assert_eq!(store.products().unwrap().len(), 2);
    }
}
