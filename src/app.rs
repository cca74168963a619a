//! Credential lifecycle operations: add, delete, generate, display.

use std::path::PathBuf;

use crate::error::Error;
use crate::otp::Credential;
use crate::registry::Registry;
use crate::scan;

/// Where `add` obtains the provisioning QR code from.
pub enum AddSource {
    ImageFile(PathBuf),
    ScreenCapture,
}

/// A freshly computed authentication code. Recomputed on every request,
/// never cached or persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub service: String,
    pub label: String,
    pub code: String,
}

/// All credential operations, bound to one service registry. Constructed
/// once per invocation; every operation is a single sequential transaction
/// against the registry.
pub struct TwoFa {
    registry: Registry,
}

impl TwoFa {
    pub fn open() -> Result<Self, Error> {
        Ok(Self::with_registry(Registry::open(Registry::default_path()?)?))
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    /// Register a new service from a provisioning QR code and return its
    /// first authentication code as confirmation.
    ///
    /// The duplicate check runs before any capture work so the user is not
    /// sent through an interactive capture that cannot succeed.
    pub fn add(&mut self, service: &str, source: &AddSource) -> Result<GeneratedCode, Error> {
        if self.registry.exists(service) {
            return Err(Error::DuplicateService(service.to_string()));
        }
        let payload = match source {
            AddSource::ImageFile(path) => scan::from_image_file(path)?,
            AddSource::ScreenCapture => scan::from_screen_capture()?,
        };
        let credential = Credential::parse(&payload)?;
        self.registry.put(service, &credential.uri())?;
        Ok(GeneratedCode {
            service: service.to_string(),
            label: credential.label.clone(),
            code: credential.code()?,
        })
    }

    pub fn del(&mut self, service: &str) -> Result<(), Error> {
        self.registry.remove(service)
    }

    /// The current code for one registered service.
    pub fn r#gen(&self, service: &str) -> Result<GeneratedCode, Error> {
        let credential = Credential::parse(self.registry.get(service)?)?;
        Ok(GeneratedCode {
            service: service.to_string(),
            label: credential.label.clone(),
            code: credential.code()?,
        })
    }

    /// Codes for every registered service, in registry order. A single
    /// corrupt record aborts the whole listing; zero services is an empty
    /// list, not an error.
    pub fn gen_all(&self) -> Result<Vec<GeneratedCode>, Error> {
        self.registry.names().map(|name| self.r#gen(name)).collect()
    }

    /// The stored provisioning URI, for QR display by the caller.
    pub fn uri(&self, service: &str) -> Result<&str, Error> {
        self.registry.get(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const URI: &str = "otpauth://hotp/blablabla?secret=zalaveavhwdtp4p4lzge5vl5mezvtk73\
                       &algorithm=SHA256&digits=6&counter=0";

    fn twofa(dir: &Path) -> TwoFa {
        TwoFa::with_registry(Registry::open(dir.join("services.json")).unwrap())
    }

    fn qr_image_file(dir: &Path, payload: &str) -> PathBuf {
        let img = qrcode::QrCode::new(payload)
            .unwrap()
            .render::<image::Luma<u8>>()
            .min_dimensions(240, 240)
            .build();
        let path = dir.join("provision.png");
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn add_registers_and_returns_the_first_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut twofa = twofa(dir.path());
        let image = qr_image_file(dir.path(), URI);

        let code = twofa
            .add("github", &AddSource::ImageFile(image))
            .unwrap();
        assert_eq!(code.service, "github");
        assert_eq!(code.label, "blablabla");
        assert_eq!(code.code, "127211");
        assert_eq!(twofa.r#gen("github").unwrap().code, "127211");
    }

    #[test]
    fn add_rejects_a_duplicate_service() {
        let dir = tempfile::tempdir().unwrap();
        let mut twofa = twofa(dir.path());
        let image = qr_image_file(dir.path(), URI);

        twofa
            .add("github", &AddSource::ImageFile(image.clone()))
            .unwrap();
        let err = twofa
            .add("github", &AddSource::ImageFile(image))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateService(name) if name == "github"));
    }

    #[test]
    fn add_rejects_a_non_otpauth_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut twofa = twofa(dir.path());
        let image = qr_image_file(dir.path(), "https://example.com/not-a-credential");

        let err = twofa.add("github", &AddSource::ImageFile(image)).unwrap_err();
        assert!(matches!(err, Error::InvalidUri { .. }));
        assert!(twofa.r#gen("github").is_err());
    }

    #[test]
    fn del_then_gen_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut twofa = twofa(dir.path());
        let image = qr_image_file(dir.path(), URI);

        twofa.add("github", &AddSource::ImageFile(image)).unwrap();
        twofa.del("github").unwrap();
        assert!(matches!(
            twofa.r#gen("github").unwrap_err(),
            Error::ServiceNotFound(_)
        ));
    }

    #[test]
    fn del_of_an_unknown_service_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut twofa = twofa(dir.path());
        assert!(matches!(
            twofa.del("github").unwrap_err(),
            Error::ServiceNotFound(_)
        ));
    }

    #[test]
    fn gen_all_with_no_services_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let twofa = twofa(dir.path());
        assert!(twofa.gen_all().unwrap().is_empty());
    }

    #[test]
    fn gen_all_lists_every_service_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut twofa = twofa(dir.path());
        let image = qr_image_file(dir.path(), URI);

        twofa
            .add("github", &AddSource::ImageFile(image.clone()))
            .unwrap();
        twofa.add("aws", &AddSource::ImageFile(image)).unwrap();

        let codes = twofa.gen_all().unwrap();
        let services: Vec<_> = codes.iter().map(|c| c.service.as_str()).collect();
        assert_eq!(services, vec!["aws", "github"]);
        assert!(codes.iter().all(|c| c.code == "127211"));
    }

    #[test]
    fn gen_all_aborts_on_the_first_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::open(dir.path().join("services.json")).unwrap();
        registry.put("bad", "not-a-provisioning-uri").unwrap();
        registry.put("good", URI).unwrap();

        let twofa = TwoFa::with_registry(registry);
        assert!(matches!(
            twofa.gen_all().unwrap_err(),
            Error::InvalidUri { .. }
        ));
    }

    #[test]
    fn uri_returns_the_stored_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut twofa = twofa(dir.path());
        let image = qr_image_file(dir.path(), URI);

        twofa.add("github", &AddSource::ImageFile(image)).unwrap();
        let stored = twofa.uri("github").unwrap();
        assert!(stored.starts_with("otpauth://hotp/blablabla?"));
        assert!(matches!(
            twofa.uri("missing").unwrap_err(),
            Error::ServiceNotFound(_)
        ));
    }
}
