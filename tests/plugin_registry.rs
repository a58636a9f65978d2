use std::sync::Arc;

use dlite::error::{DLiteError, Result};
use dlite::plugin::{self, DriverApi, StorageBackend, PLUGIN_ENV_VAR};
use dlite::storage::Storage;

struct StubDriver {
    name: &'static str,
}

impl DriverApi for StubDriver {
    fn name(&self) -> &str {
        self.name
    }
    fn open(&self, _uri: &str, _options: &str) -> Result<Box<dyn StorageBackend>> {
        Ok(Box::new(StubStorage { name: self.name }))
    }
}

struct StubStorage {
    name: &'static str,
}

impl StorageBackend for StubStorage {
    fn driver(&self) -> &str {
        self.name
    }
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
    fn data_model(
        &self,
        _uuid: &str,
    ) -> Result<Box<dyn dlite::plugin::DataModelBackend>> {
        Err(DLiteError::Driver("stub".to_owned()))
    }
}

// The registry and its search path are process-wide, so the assertions
// that depend on registry order run in a single test.
#[test]
fn registry_lifecycle() {
    // start from an empty search path whatever the environment seeded
    while !plugin::paths().is_empty() {
        plugin::path_remove(0).unwrap();
    }

    // resolution failure on an empty search path names the driver and
    // hints at the environment variable
    let err = Storage::open("nosuchdriver", "somewhere", "r").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("\"nosuchdriver\""), "unexpected message: {message}");
    assert!(message.contains(PLUGIN_ENV_VAR), "unexpected message: {message}");

    // search path editing with negative indices
    plugin::path_append("/opt/plugins");
    plugin::path_append("/usr/lib/plugins");
    plugin::path_insert(-1, "/home/user/plugins");
    let paths = plugin::paths();
    assert_eq!(
        paths,
        [
            std::path::PathBuf::from("/opt/plugins"),
            "/home/user/plugins".into(),
            "/usr/lib/plugins".into(),
        ]
    );
    // out-of-range indices clip
    plugin::path_insert(100, "/tail");
    plugin::path_insert(-100, "/head");
    assert_eq!(plugin::paths().first().unwrap(), &std::path::PathBuf::from("/head"));
    assert_eq!(plugin::paths().last().unwrap(), &std::path::PathBuf::from("/tail"));

    plugin::path_remove(-1).unwrap();
    assert_eq!(plugin::paths().last().unwrap(), &std::path::PathBuf::from("/usr/lib/plugins"));
    while !plugin::paths().is_empty() {
        plugin::path_remove(0).unwrap();
    }
    assert!(plugin::path_remove(0).is_err());

    // with more than one search path entry, the hint is dropped but the
    // paths are listed
    plugin::path_append("/first");
    plugin::path_append("/second");
    let message = Storage::open("nosuchdriver", "somewhere", "r").unwrap_err().to_string();
    assert!(message.contains("/first"));
    assert!(message.contains("/second"));
    assert!(!message.contains(PLUGIN_ENV_VAR));
    plugin::path_remove(-1).unwrap();
    plugin::path_remove(-1).unwrap();

    // registration makes the driver resolvable
    plugin::register(Arc::new(StubDriver { name: "stub" }));
    let api = plugin::lookup("stub").unwrap();
    assert_eq!(api.name(), "stub");
    let storage = Storage::open("stub", "anywhere", "w").unwrap();
    assert!(storage.writable());
    storage.close().unwrap();

    // iteration sees registered drivers
    let names: Vec<String> = plugin::iter().map(|api| api.name().to_owned()).collect();
    assert!(names.contains(&"stub".to_owned()));

    // unload removes them again
    plugin::unload("stub").unwrap();
    assert!(plugin::unload("stub").is_err());
    assert!(plugin::lookup("stub").is_err());

    plugin::register(Arc::new(StubDriver { name: "stub-a" }));
    plugin::register(Arc::new(StubDriver { name: "stub-b" }));
    plugin::unload_all();
    assert_eq!(plugin::iter().count(), 0);
}
