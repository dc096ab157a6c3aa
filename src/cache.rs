//! The dedup cache for certificates.
//!
//! The same certificates show up in a great many sessions. Instead of
//! keeping a copy for each of them, sessions intern their decoded
//! certificate into the [`CertCache`] and get back a [`CertRef`], a counted
//! reference to the one canonical record kept for that content. Once the
//! last reference is gone, the record is removed from the cache.
//!
//! The cache is split into shards, each protected by its own mutex. The
//! shard is picked by the first octet of the certificate’s fingerprint.
//! Decoding always happens before any lock is taken.

use std::{error, fmt};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use bytes::Bytes;
use log::{debug, warn};
use serde::Serialize;
use crate::cert::{CertInfo, DecodeError, DecodeStatus, Fingerprint};
use crate::config::Config;
use crate::utils::sync::Mutex;


//------------ CertCache -----------------------------------------------------

/// The shared store of canonical certificate records.
///
/// Values of this type can be cloned cheaply. All clones refer to the same
/// cache.
#[derive(Clone, Debug)]
pub struct CertCache {
    inner: Arc<CacheInner>,
}

impl CertCache {
    /// Creates a new, empty cache using the given configuration.
    pub fn new(config: &Config) -> Self {
        CertCache {
            inner: Arc::new(CacheInner {
                shards: (0..config.cache_shards.max(1)).map(|_| {
                    Mutex::new(HashMap::new())
                }).collect(),
                max_entries: config.cache_max_entries,
                len: AtomicUsize::new(0),
                metrics: Default::default(),
            })
        }
    }

    /// Decodes a certificate and interns it.
    ///
    /// Returns the reference to the canonical record together with the
    /// status of the decoding. A partially decoded certificate is interned
    /// just like a complete one.
    pub fn decode_certificate(
        &self, data: Bytes
    ) -> Result<(CertRef, DecodeStatus), CertError> {
        let decoded = match CertInfo::decode(data) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!("Failed to decode certificate: {}", err);
                return Err(err.into())
            }
        };
        let cert = self.intern(decoded.cert)?;
        Ok((cert, decoded.status))
    }

    /// Interns a certificate record.
    ///
    /// If an equal record is already present, its reference count is
    /// increased and a reference to it is returned. Otherwise the record
    /// becomes the canonical one.
    ///
    /// Fails only if the record would have to be added but the cache has
    /// reached its configured maximum size or memory for it can’t be
    /// allocated.
    pub fn intern(&self, cert: CertInfo) -> Result<CertRef, CacheError> {
        let inner = &self.inner;
        let mut shard = inner.shard(&cert.hash).lock();
        if let Some(entry) = shard.get_mut(&cert) {
            entry.refs += 1;
            inner.metrics.inc_hits();
            return Ok(CertRef {
                cert: entry.cert.clone(),
                cache: inner.clone(),
            })
        }
        if !inner.reserve_entry() {
            inner.metrics.inc_rejected();
            warn!(
                "Certificate cache is full, dropping certificate {}.",
                cert.hash
            );
            return Err(CacheError::Full)
        }
        if shard.try_reserve(1).is_err() {
            inner.len.fetch_sub(1, Ordering::Relaxed);
            inner.metrics.inc_rejected();
            warn!("Out of memory for certificate cache.");
            return Err(CacheError::Full)
        }
        let cert = Arc::new(cert);
        shard.insert(
            CertKey(cert.clone()), Entry { cert: cert.clone(), refs: 1 }
        );
        inner.metrics.inc_misses();
        Ok(CertRef { cert, cache: inner.clone() })
    }

    /// Releases a reference.
    ///
    /// This is the same as dropping the reference. If it was the last one,
    /// the record is removed from the cache.
    pub fn release(&self, cert: CertRef) {
        debug_assert!(Arc::ptr_eq(&self.inner, &cert.cache));
        drop(cert)
    }

    /// Returns the number of live references to an equal record.
    ///
    /// Returns 0 if there is no such record in the cache.
    pub fn ref_count(&self, cert: &CertInfo) -> usize {
        self.inner.shard(&cert.hash).lock().get(cert).map(|entry| {
            entry.refs
        }).unwrap_or(0)
    }

    /// Returns the number of distinct records in the cache.
    pub fn len(&self) -> usize {
        self.inner.len.load(Ordering::Relaxed)
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the cache’s metrics.
    pub fn metrics(&self) -> CacheStats {
        self.inner.metrics.stats(self.len())
    }
}


//------------ CacheInner ----------------------------------------------------

/// The actual data of the cache.
#[derive(Debug)]
struct CacheInner {
    /// The shards.
    shards: Box<[Mutex<HashMap<CertKey, Entry>>]>,

    /// The maximum number of records, if limited.
    max_entries: Option<usize>,

    /// The current number of records across all shards.
    len: AtomicUsize,

    /// The metrics.
    metrics: CacheMetrics,
}

impl CacheInner {
    /// Returns the shard for a fingerprint.
    fn shard(&self, hash: &Fingerprint) -> &Mutex<HashMap<CertKey, Entry>> {
        &self.shards[usize::from(hash.as_slice()[0]) % self.shards.len()]
    }

    /// Accounts for a new record if there is space.
    fn reserve_entry(&self) -> bool {
        match self.max_entries {
            Some(max) => {
                self.len.fetch_update(
                    Ordering::Relaxed, Ordering::Relaxed,
                    |len| if len < max { Some(len + 1) } else { None }
                ).is_ok()
            }
            None => {
                self.len.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }

    /// Adds a reference to a record that already has one.
    fn acquire(&self, cert: &CertInfo) {
        if let Some(entry) = self.shard(&cert.hash).lock().get_mut(cert) {
            entry.refs += 1;
        }
    }

    /// Drops a reference to a record.
    fn release(&self, cert: &CertInfo) {
        let mut shard = self.shard(&cert.hash).lock();
        let remove = match shard.get_mut(cert) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs == 0
            }
            None => false
        };
        if remove {
            shard.remove(cert);
            self.len.fetch_sub(1, Ordering::Relaxed);
            self.metrics.inc_removals();
        }
    }
}


//------------ CertKey -------------------------------------------------------

/// The key of a record in a shard.
///
/// This compares and hashes by the content of the record so that it can be
/// looked up via a plain `&CertInfo`.
#[derive(Debug)]
struct CertKey(Arc<CertInfo>);

impl Borrow<CertInfo> for CertKey {
    fn borrow(&self) -> &CertInfo {
        self.0.as_ref()
    }
}

impl PartialEq for CertKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl Eq for CertKey { }

impl Hash for CertKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state)
    }
}


//------------ Entry ---------------------------------------------------------

/// A record in a shard.
#[derive(Debug)]
struct Entry {
    /// The canonical record.
    cert: Arc<CertInfo>,

    /// The number of live references.
    refs: usize,
}


//------------ CertRef -------------------------------------------------------

/// A counted reference to a canonical certificate record.
///
/// Cloning the reference counts as a new reference. Dropping it releases
/// the reference again.
pub struct CertRef {
    cert: Arc<CertInfo>,
    cache: Arc<CacheInner>,
}

impl CertRef {
    /// Returns whether two references refer to the same record.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.cert, &other.cert)
    }
}

impl Clone for CertRef {
    fn clone(&self) -> Self {
        self.cache.acquire(&self.cert);
        CertRef {
            cert: self.cert.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl Drop for CertRef {
    fn drop(&mut self) {
        self.cache.release(&self.cert)
    }
}

impl Deref for CertRef {
    type Target = CertInfo;

    fn deref(&self) -> &CertInfo {
        self.cert.as_ref()
    }
}

impl AsRef<CertInfo> for CertRef {
    fn as_ref(&self) -> &CertInfo {
        self.cert.as_ref()
    }
}

impl fmt::Debug for CertRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("CertRef").field(&self.cert.hash).finish()
    }
}


//------------ CacheMetrics --------------------------------------------------

/// Counters for the operations of the cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    removals: AtomicU64,
    rejected: AtomicU64,
}

impl CacheMetrics {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn inc_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn inc_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    fn inc_removals(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn stats(&self, entries: usize) -> CacheStats {
        CacheStats {
            entries,
            hits: self.hits(),
            misses: self.misses(),
            removals: self.removals(),
            rejected: self.rejected(),
        }
    }
}


//------------ CacheStats ----------------------------------------------------

/// A snapshot of the cache metrics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// The number of distinct records currently held.
    pub entries: usize,

    /// The number of interned certificates that were already present.
    pub hits: u64,

    /// The number of interned certificates that were added.
    pub misses: u64,

    /// The number of records removed after their last reference was gone.
    pub removals: u64,

    /// The number of certificates rejected because the cache was full.
    pub rejected: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f,
            "{} entries, {} hits, {} misses, {} removals, {} rejected",
            self.entries, self.hits, self.misses, self.removals,
            self.rejected
        )
    }
}


//------------ CacheError ----------------------------------------------------

/// Interning a certificate has failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheError {
    /// There is no more room for new records.
    Full,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CacheError::Full => f.write_str("certificate cache is full"),
        }
    }
}

impl error::Error for CacheError { }


//------------ CertError -----------------------------------------------------

/// Decoding and interning a certificate has failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CertError {
    /// The certificate could not be decoded.
    Decode(DecodeError),

    /// The certificate could not be interned.
    Cache(CacheError),
}

impl From<DecodeError> for CertError {
    fn from(err: DecodeError) -> Self {
        CertError::Decode(err)
    }
}

impl From<CacheError> for CertError {
    fn from(err: CacheError) -> Self {
        CertError::Cache(err)
    }
}

impl fmt::Display for CertError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CertError::Decode(ref err) => err.fmt(f),
            CertError::Cache(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for CertError { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{der, TestCert, CN};

    fn cache() -> CertCache {
        CertCache::new(&Config::default())
    }

    fn other_cert() -> Bytes {
        let mut builder = TestCert::default();
        builder.subject = der::name(&[(CN, 0x0c, "mail.example.com")]);
        builder.to_bytes()
    }

    #[test]
    fn intern_identical() {
        let cache = cache();
        let (one, status) = cache.decode_certificate(
            TestCert::default().to_bytes()
        ).unwrap();
        assert!(status.is_complete());
        let (two, _) = cache.decode_certificate(
            TestCert::default().to_bytes()
        ).unwrap();
        assert!(CertRef::ptr_eq(&one, &two));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.ref_count(&one), 2);

        let (three, _) = cache.decode_certificate(other_cert()).unwrap();
        assert!(!CertRef::ptr_eq(&one, &three));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.ref_count(&three), 1);
    }

    #[test]
    fn release_last_reference() {
        let cache = cache();
        let refs = (0..5).map(|_| {
            cache.decode_certificate(TestCert::default().to_bytes()).unwrap().0
        }).collect::<Vec<_>>();
        let cert = CertInfo::clone(&refs[0]);
        assert_eq!(cache.ref_count(&cert), 5);

        let mut refs = refs.into_iter();
        for _ in 0..4 {
            cache.release(refs.next().unwrap());
        }
        assert_eq!(cache.ref_count(&cert), 1);
        assert_eq!(cache.len(), 1);

        cache.release(refs.next().unwrap());
        assert_eq!(cache.ref_count(&cert), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn clone_and_drop() {
        let cache = cache();
        let (one, _) = cache.decode_certificate(
            TestCert::default().to_bytes()
        ).unwrap();
        let two = one.clone();
        assert_eq!(cache.ref_count(&one), 2);
        drop(one);
        assert_eq!(cache.ref_count(&two), 1);
        assert_eq!(two.subject.common_name.first().unwrap().as_ref(),
                   b"www.example.com");
        drop(two);
        assert!(cache.is_empty());
    }

    #[test]
    fn limited_size() {
        let mut config = Config::default();
        config.cache_max_entries = Some(1);
        let cache = CertCache::new(&config);
        let (one, _) = cache.decode_certificate(
            TestCert::default().to_bytes()
        ).unwrap();
        assert_eq!(
            cache.decode_certificate(other_cert()).unwrap_err(),
            CertError::Cache(CacheError::Full)
        );

        // Hits still work.
        let (two, _) = cache.decode_certificate(
            TestCert::default().to_bytes()
        ).unwrap();
        drop(one);
        drop(two);
        assert!(cache.decode_certificate(other_cert()).is_ok());
        assert_eq!(cache.metrics().rejected, 1);
    }

    #[test]
    fn undecodable() {
        let cache = cache();
        assert!(matches!(
            cache.decode_certificate(Bytes::from_static(b"\x30\x03\x02")),
            Err(CertError::Decode(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn partial_is_interned() {
        let cache = cache();
        let mut encoded = TestCert::default().encode();
        encoded.truncate(encoded.len() - 20);
        let (cert, status) = cache.decode_certificate(
            encoded.into()
        ).unwrap();
        assert!(!status.is_complete());
        assert_eq!(cache.ref_count(&cert), 1);
    }

    #[test]
    fn metrics() {
        let cache = cache();
        let one = cache.decode_certificate(
            TestCert::default().to_bytes()
        ).unwrap().0;
        let two = cache.decode_certificate(
            TestCert::default().to_bytes()
        ).unwrap().0;
        drop(one);
        drop(two);
        assert_eq!(
            cache.metrics(),
            CacheStats {
                entries: 0, hits: 1, misses: 1, removals: 1, rejected: 0
            }
        );
        assert_eq!(
            serde_json::to_string(&cache.metrics()).unwrap(),
            "{\"entries\":0,\"hits\":1,\"misses\":1,\"removals\":1,\
             \"rejected\":0}"
        );
    }

    #[test]
    fn concurrent_intern_and_release() {
        let cache = cache();
        let data = TestCert::default().to_bytes();
        let other = other_cert();
        let cert = CertInfo::decode(data.clone()).unwrap().cert;

        let held = crossbeam_utils::thread::scope(|scope| {
            let handles = (0..8).map(|i| {
                let cache = &cache;
                let data = if i % 2 == 0 { data.clone() } else { other.clone() };
                scope.spawn(move |_| {
                    let mut refs = Vec::new();
                    for _ in 0..100 {
                        refs.push(
                            cache.decode_certificate(data.clone()).unwrap().0
                        );
                    }
                    // Give half of them back right away.
                    refs.truncate(50);
                    refs
                })
            }).collect::<Vec<_>>();
            handles.into_iter().map(|handle| {
                handle.join().unwrap()
            }).collect::<Vec<_>>()
        }).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.ref_count(&cert), 200);
        drop(held);
        assert!(cache.is_empty());
        assert_eq!(cache.metrics().misses, 2);
    }
}
