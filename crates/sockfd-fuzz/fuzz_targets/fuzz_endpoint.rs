#![no_main]
use libfuzzer_sys::fuzz_target;
use sockfd_core::inet;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let port = u16::from_le_bytes([data[0], data[1]]);
    let Ok(host) = std::str::from_utf8(&data[2..]) else {
        return;
    };

    match inet::endpoint(host, port) {
        Ok(ep) => {
            // Anything accepted must be exactly what std accepts.
            let std_addr: std::net::Ipv4Addr = host.parse().expect("std rejects an accepted host");
            assert_eq!(ep.octets(), std_addr.octets());
            assert_eq!(ep.port(), port);
            assert_eq!(ep.to_string(), format!("{host}:{port}"));
        }
        Err(err) => {
            assert_eq!(err.host(), host);
            assert!(host.parse::<std::net::Ipv4Addr>().is_err());
        }
    }
});
