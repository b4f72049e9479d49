//! Kernel version and distribution details

use std::fs;
use std::path::Path;

use serde::Serialize;

use super::HostPaths;
use crate::{Error, Result};

/// Distribution name and version from `os-release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distro {
    pub name: String,
    pub version: String,
}

/// Running kernel release, e.g. `6.8.0-45-generic`.
pub fn kernel_version(paths: &HostPaths) -> Result<String> {
    let path = &paths.proc_version;
    let text = fs::read_to_string(path).map_err(|e| Error::from_read(path, e))?;

    // "Linux version 6.8.0-45-generic (buildd@...) ..."
    text.split_whitespace()
        .nth(2)
        .map(str::to_string)
        .ok_or_else(|| Error::Parse(format!("unexpected contents in {}", path.display())))
}

/// Distribution details from the primary `os-release`, or the fallback one.
pub fn distro_details(paths: &HostPaths) -> Result<Distro> {
    match parse_os_release(&paths.os_release) {
        Ok(distro) => Ok(distro),
        Err(primary) => parse_os_release(&paths.os_release_fallback).map_err(|_| primary),
    }
}

fn parse_os_release(path: &Path) -> Result<Distro> {
    let text = fs::read_to_string(path).map_err(|e| Error::from_read(path, e))?;

    let mut name = None;
    let mut version = None;
    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
        match key {
            "NAME" => name = Some(value.to_string()),
            "VERSION_ID" => version = Some(value.to_string()),
            _ => {}
        }
    }

    match (name, version) {
        (Some(name), Some(version)) => Ok(Distro { name, version }),
        _ => Err(Error::Parse(format!(
            "cannot find NAME and VERSION_ID in {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, HostPaths) {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths {
            proc_version: dir.path().join("version"),
            os_release: dir.path().join("os-release"),
            os_release_fallback: dir.path().join("usr-lib-os-release"),
            ..HostPaths::default()
        };
        (dir, paths)
    }

    #[test]
    fn test_kernel_version() {
        let (_dir, paths) = fixture();
        assert!(kernel_version(&paths).unwrap_err().is_not_found());

        for bad in ["", "Linux", "Linux version"] {
            fs::write(&paths.proc_version, bad).unwrap();
            assert!(matches!(kernel_version(&paths), Err(Error::Parse(_))), "{bad:?}");
        }

        fs::write(
            &paths.proc_version,
            "Linux version 4.9.0-rc1 (user@host) (gcc version 6.2.0) #1 SMP\n",
        )
        .unwrap();
        assert_eq!(kernel_version(&paths).unwrap(), "4.9.0-rc1");
    }

    #[test]
    fn test_distro_details() {
        let (_dir, paths) = fixture();
        assert!(distro_details(&paths).unwrap_err().is_not_found());

        fs::write(&paths.os_release, "").unwrap();
        assert!(distro_details(&paths).is_err());

        fs::write(
            &paths.os_release_fallback,
            "NAME=\"Fedora\"\nVERSION_ID=40\n",
        )
        .unwrap();
        assert_eq!(
            distro_details(&paths).unwrap(),
            Distro {
                name: "Fedora".into(),
                version: "40".into()
            }
        );

        fs::write(
            &paths.os_release,
            "NAME=\"Ubuntu\"\nVERSION=\"24.04 LTS\"\nVERSION_ID=\"24.04\"\n",
        )
        .unwrap();
        assert_eq!(distro_details(&paths).unwrap().name, "Ubuntu");
        assert_eq!(distro_details(&paths).unwrap().version, "24.04");
    }
}
