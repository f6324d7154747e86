//! Certificate Loader (spec §4.8, C8).
//!
//! Reads three PEM files named by the attribute store (`root_ca_name`,
//! `client_cert_name`, `client_key_name`) and registers each with the TLS
//! layer under a configured tag. The filesystem and TLS registration are
//! trait seams ([`CertFile`] / [`TlsRegistry`]) bound by `firmware` to
//! `esp-idf-svc`'s `Vfs`/`EspTls`-style APIs; the buffers returned by
//! [`CertFile`] must outlive the TLS session, which is why this loader
//! holds them for the caller rather than handing back a borrow.

use crate::attr::{names, AttributeStore};
use heapless::Vec;

/// Maximum PEM size this crate will load into a single buffer. The
/// original uses `stat` then allocates exactly that size from the heap;
/// this crate's no_std buffers are fixed-capacity instead, so callers
/// size `N` to the largest cert/key/CA they expect to load.
pub const DEFAULT_PEM_MAX: usize = 4096;

/// One loaded credential buffer.
pub type PemBuffer<const N: usize> = Vec<u8, N>;

/// Filesystem seam: read a named file fully into a caller-provided buffer.
/// Mirrors `stat` + `read` in the source's `lcz_certs_load`.
pub trait CertFile {
    /// Reads `name` into `out`, returning `false` if the file doesn't
    /// exist or is larger than `out`'s capacity.
    fn read_into<const N: usize>(&self, name: &str, out: &mut PemBuffer<N>) -> bool;
}

/// TLS registration seam: register/unregister a PEM credential under a
/// tag (firmware binds this to `esp-idf-svc`'s TLS credential store).
pub trait TlsRegistry {
    fn register_ca(&mut self, tag: u32, pem: &[u8]) -> bool;
    fn register_client_cert(&mut self, tag: u32, pem: &[u8]) -> bool;
    fn register_client_key(&mut self, tag: u32, pem: &[u8]) -> bool;
    fn unregister(&mut self, tag: u32);
}

/// `loaded()` tracks whether all three registrations are currently in
/// effect; `load`/`unload`/`reload` are idempotent (spec §4.8).
pub struct CertificateLoader<const N: usize> {
    tag: u32,
    root_ca: Option<PemBuffer<N>>,
    client_cert: Option<PemBuffer<N>>,
    client_key: Option<PemBuffer<N>>,
}

impl<const N: usize> CertificateLoader<N> {
    pub fn new(tag: u32) -> Self {
        Self { tag, root_ca: None, client_cert: None, client_key: None }
    }

    pub fn loaded(&self) -> bool {
        self.root_ca.is_some() && self.client_cert.is_some() && self.client_key.is_some()
    }

    /// If not already loaded, read the three files named by the
    /// attribute store and register them with `tls` (spec §4.8).
    pub fn load(
        &mut self,
        attrs: &impl AttributeStore,
        files: &impl CertFile,
        tls: &mut impl TlsRegistry,
    ) -> bool {
        if self.loaded() {
            return true;
        }
        let Some(ca_name) = attrs.get_str(names::ROOT_CA_NAME) else { return false };
        let Some(cert_name) = attrs.get_str(names::CLIENT_CERT_NAME) else { return false };
        let Some(key_name) = attrs.get_str(names::CLIENT_KEY_NAME) else { return false };

        let mut ca = PemBuffer::new();
        let mut cert = PemBuffer::new();
        let mut key = PemBuffer::new();
        if !files.read_into(ca_name.as_str(), &mut ca)
            || !files.read_into(cert_name.as_str(), &mut cert)
            || !files.read_into(key_name.as_str(), &mut key)
        {
            return false;
        }

        if !tls.register_ca(self.tag, &ca)
            || !tls.register_client_cert(self.tag, &cert)
            || !tls.register_client_key(self.tag, &key)
        {
            tls.unregister(self.tag);
            return false;
        }

        self.root_ca = Some(ca);
        self.client_cert = Some(cert);
        self.client_key = Some(key);
        true
    }

    /// Deletes the three registrations and drops the held buffers (spec §4.8).
    pub fn unload(&mut self, tls: &mut impl TlsRegistry) {
        tls.unregister(self.tag);
        self.root_ca = None;
        self.client_cert = None;
        self.client_key = None;
    }

    /// Unload then load (spec §4.8 `reload()`).
    pub fn reload(
        &mut self,
        attrs: &impl AttributeStore,
        files: &impl CertFile,
        tls: &mut impl TlsRegistry,
    ) -> bool {
        self.unload(tls);
        self.load(attrs, files, tls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::MemoryAttributeStore;

    struct FakeFiles;
    impl CertFile for FakeFiles {
        fn read_into<const N: usize>(&self, name: &str, out: &mut PemBuffer<N>) -> bool {
            let body = match name {
                "ca.pem" => b"-----BEGIN CERT-----ca-----END CERT-----".as_slice(),
                "cert.pem" => b"-----BEGIN CERT-----cert-----END CERT-----".as_slice(),
                "key.pem" => b"-----BEGIN KEY-----key-----END KEY-----".as_slice(),
                _ => return false,
            };
            out.clear();
            out.extend_from_slice(body).is_ok()
        }
    }

    #[derive(Default)]
    struct FakeTls {
        registered: heapless::Vec<u32, 4>,
    }
    impl TlsRegistry for FakeTls {
        fn register_ca(&mut self, tag: u32, _pem: &[u8]) -> bool {
            self.registered.push(tag).is_ok()
        }
        fn register_client_cert(&mut self, tag: u32, _pem: &[u8]) -> bool {
            self.registered.push(tag).is_ok()
        }
        fn register_client_key(&mut self, tag: u32, _pem: &[u8]) -> bool {
            self.registered.push(tag).is_ok()
        }
        fn unregister(&mut self, tag: u32) {
            self.registered.retain(|&t| t != tag);
        }
    }

    fn attrs() -> MemoryAttributeStore<8> {
        let mut a = MemoryAttributeStore::new();
        a.set_str(names::ROOT_CA_NAME, "ca.pem");
        a.set_str(names::CLIENT_CERT_NAME, "cert.pem");
        a.set_str(names::CLIENT_KEY_NAME, "key.pem");
        a
    }

    #[test]
    fn load_succeeds_and_is_idempotent() {
        let mut loader: CertificateLoader<64> = CertificateLoader::new(1);
        let mut tls = FakeTls::default();
        assert!(loader.load(&attrs(), &FakeFiles, &mut tls));
        assert!(loader.loaded());
        assert_eq!(tls.registered.len(), 3);

        // second call is a no-op, no double registration
        assert!(loader.load(&attrs(), &FakeFiles, &mut tls));
        assert_eq!(tls.registered.len(), 3);
    }

    #[test]
    fn unload_clears_registrations() {
        let mut loader: CertificateLoader<64> = CertificateLoader::new(1);
        let mut tls = FakeTls::default();
        loader.load(&attrs(), &FakeFiles, &mut tls);
        loader.unload(&mut tls);
        assert!(!loader.loaded());
        assert!(tls.registered.is_empty());
    }

    #[test]
    fn missing_attribute_fails_load() {
        let mut loader: CertificateLoader<64> = CertificateLoader::new(1);
        let mut tls = FakeTls::default();
        let empty: MemoryAttributeStore<8> = MemoryAttributeStore::new();
        assert!(!loader.load(&empty, &FakeFiles, &mut tls));
        assert!(!loader.loaded());
    }
}
