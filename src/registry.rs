//! Persistent service registry: one JSON object mapping service names to
//! canonical `otpauth://` URIs.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::Error;

#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    services: BTreeMap<String, String>,
}

impl Registry {
    /// Load the registry from `path`. An absent file is an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let services = match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).map_err(Error::StoreFormat)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Store(e)),
        };
        Ok(Self { path, services })
    }

    /// Store location: `$TWOFA_STORE` if set, otherwise
    /// `<data dir>/twofa/services.json`.
    pub fn default_path() -> Result<PathBuf, Error> {
        if let Ok(path) = std::env::var("TWOFA_STORE") {
            return Ok(PathBuf::from(path));
        }
        let mut dir = dirs::data_dir().ok_or_else(|| {
            Error::Store(io::Error::new(
                io::ErrorKind::NotFound,
                "cannot determine the user data directory",
            ))
        })?;
        dir.push("twofa");
        dir.push("services.json");
        Ok(dir)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&str, Error> {
        self.services
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))
    }

    /// Overwrites unconditionally; uniqueness is the caller's invariant.
    pub fn put(&mut self, name: &str, uri: &str) -> Result<(), Error> {
        self.services.insert(name.to_string(), uri.to_string());
        self.save()
    }

    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        if self.services.remove(name).is_none() {
            return Err(Error::ServiceNotFound(name.to_string()));
        }
        self.save()
    }

    /// Registered names in stable (sorted) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    fn save(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(Error::Store)?;
        }
        let json = serde_json::to_string_pretty(&self.services).map_err(Error::StoreFormat)?;
        fs::write(&self.path, json).map_err(Error::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_registry() -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path().join("services.json")).unwrap();
        (dir, registry)
    }

    #[test]
    fn absent_file_is_an_empty_registry() {
        let (_dir, registry) = temp_registry();
        assert_eq!(registry.names().count(), 0);
        assert!(!registry.exists("github"));
    }

    #[test]
    fn put_then_get() {
        let (_dir, mut registry) = temp_registry();
        registry.put("github", "otpauth://totp/gh?secret=AAAA").unwrap();
        assert!(registry.exists("github"));
        assert_eq!(
            registry.get("github").unwrap(),
            "otpauth://totp/gh?secret=AAAA"
        );
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        let mut registry = Registry::open(&path).unwrap();
        registry.put("github", "otpauth://totp/gh?secret=AAAA").unwrap();
        registry.put("aws", "otpauth://totp/aws?secret=BBBB").unwrap();

        let reopened = Registry::open(&path).unwrap();
        assert_eq!(reopened.names().collect::<Vec<_>>(), vec!["aws", "github"]);
        assert_eq!(
            reopened.get("aws").unwrap(),
            "otpauth://totp/aws?secret=BBBB"
        );
    }

    #[test]
    fn names_are_case_sensitive() {
        let (_dir, mut registry) = temp_registry();
        registry.put("GitHub", "otpauth://totp/a?secret=AAAA").unwrap();
        assert!(registry.exists("GitHub"));
        assert!(!registry.exists("github"));
    }

    #[test]
    fn get_missing_fails() {
        let (_dir, registry) = temp_registry();
        assert!(matches!(
            registry.get("nope").unwrap_err(),
            Error::ServiceNotFound(name) if name == "nope"
        ));
    }

    #[test]
    fn remove_missing_fails_like_get() {
        let (_dir, mut registry) = temp_registry();
        assert!(matches!(
            registry.remove("nope").unwrap_err(),
            Error::ServiceNotFound(name) if name == "nope"
        ));
    }

    #[test]
    fn remove_deletes_the_record() {
        let (_dir, mut registry) = temp_registry();
        registry.put("github", "otpauth://totp/a?secret=AAAA").unwrap();
        registry.remove("github").unwrap();
        assert!(!registry.exists("github"));
    }

    #[test]
    fn corrupt_store_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Registry::open(&path).unwrap_err(),
            Error::StoreFormat(_)
        ));
    }
}
