//! Contains utilities and helper functions shared by the decoder and the flow table.
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use super::containers::Field;
use super::error::GraphletError;

lazy_static! {
    /// IANA protocol numbers we print by name. Everything else prints as a number.
    static ref PROTOCOL_NAMES: HashMap<u8, &'static str> = {
        let mut m = HashMap::new();
        m.insert(1, "ICMP");
        m.insert(2, "IGMP");
        m.insert(6, "TCP");
        m.insert(17, "UDP");
        m.insert(41, "IPv6");
        m.insert(47, "GRE");
        m.insert(50, "ESP");
        m.insert(51, "AH");
        m.insert(58, "ICMPv6");
        m.insert(89, "OSPF");
        m.insert(132, "SCTP");
        m
    };
}

/// Protocol name for display, falling back to the number.
pub fn protocol_name(protocol: u8) -> String {
    match PROTOCOL_NAMES.get(&protocol) {
        Some(name) => name.to_string(),
        None => protocol.to_string(),
    }
}

/// 128-bit form of an address; IPv4 is IPv4-mapped.
pub fn addr_bits(addr: IpAddr) -> u128 {
    Field::from_addr(addr).raw()
}

/// Checks whether `addr` lies in `net`/`mask`, compared in 128-bit form. A mapped
/// IPv4 mask also covers the `::ffff:` marker.
pub fn in_network(addr: IpAddr, net: IpAddr, mask: IpAddr) -> bool {
    let mask = addr_bits(mask);
    addr_bits(addr) & mask == addr_bits(net) & mask
}

/// Loads a graphlet file into memory.
///
/// Missing, unreadable and empty files are all I/O errors.
pub fn load_file(path: &Path) -> Result<Vec<u8>, GraphletError> {
    log::info!("Loading graphlet file {}", path.display());
    let bytes = fs::read(path).map_err(|source| GraphletError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(GraphletError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    log::debug!("Read {} bytes.", bytes.len());
    Ok(bytes)
}

/// Writes `data` to `path`, creating parent directories as needed.
pub fn save_file(path: &Path, data: &str) -> Result<(), GraphletError> {
    let write_err = |source| GraphletError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, data).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphlet::error::ErrorKind;

    #[test]
    fn test_protocol_names() {
        assert_eq!(protocol_name(6), "TCP");
        assert_eq!(protocol_name(17), "UDP");
        assert_eq!(protocol_name(250), "250");
    }

    #[test]
    fn test_in_network() {
        let net: IpAddr = "10.0.0.0".parse().unwrap();
        let mask: IpAddr = "255.0.0.0".parse().unwrap();
        assert!(in_network("10.1.1.1".parse().unwrap(), net, mask));
        assert!(!in_network("11.1.1.1".parse().unwrap(), net, mask));
        assert!(!in_network("2001:db8::1".parse().unwrap(), net, mask));

        let net6: IpAddr = "2001:db8::".parse().unwrap();
        let mask6: IpAddr = "ffff:ffff::".parse().unwrap();
        assert!(in_network("2001:db8::42".parse().unwrap(), net6, mask6));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_file(Path::new("/nonexistent/graphlets.hpg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_empty_file_is_io_error() {
        let path = std::env::temp_dir().join(format!("graphletviz-empty-{}.hpg", std::process::id()));
        fs::write(&path, b"").unwrap();
        let err = load_file(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        assert!(matches!(err, GraphletError::EmptyFile { .. }));
    }
}
