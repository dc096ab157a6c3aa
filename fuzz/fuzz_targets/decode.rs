#![no_main]

use std::io;
use bytes::Bytes;
use certinfo::{CertCache, CertInfo, Config};
use certinfo::handshake::CertificateList;
use certinfo::output::{JsonWriter, SessionTime, save};
use libfuzzer_sys::fuzz_target;

fuzz_target!{|data: (Vec<u8>, bool, u8)| {
    let (data, handshake, copies) = data;
    let data = Bytes::from(data);
    let certs: Vec<Bytes> = if handshake {
        CertificateList::new(data).collect()
    }
    else {
        vec![data]
    };

    let cache = CertCache::new(&Config::default());
    let mut refs = Vec::new();
    for cert in certs {
        let expected = CertInfo::decode(cert.clone()).ok();
        for _ in 0..=copies % 4 {
            match cache.decode_certificate(cert.clone()) {
                Ok((cert, _)) => {
                    assert_eq!(
                        Some(&*cert), expected.as_ref().map(|item| &item.cert)
                    );
                    save(
                        &mut JsonWriter::new(io::sink()), &cert,
                        SessionTime::from_epoch(0)
                    ).unwrap();
                    refs.push(cert);
                }
                Err(_) => assert!(expected.is_none()),
            }
        }
    }
    drop(refs);
    assert!(cache.is_empty());
}}
