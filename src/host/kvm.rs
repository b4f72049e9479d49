//! KVM device node preflight

use super::HostPaths;
use crate::Result;

#[cfg(target_os = "linux")]
use crate::Error;
#[cfg(target_os = "linux")]
use kvm_ioctls::{Cap, Kvm};

/// Stable KVM API version reported by every supported kernel.
pub const KVM_API_VERSION: i32 = 12;

/// Open the KVM device node and create a throw-away VM.
///
/// Fails if the node is missing, reports an unexpected API version or
/// lacks in-kernel IRQCHIP or user memory support.
#[cfg(target_os = "linux")]
pub fn require_kvm_usable(paths: &HostPaths) -> Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let node = &paths.kvm_device;
    if !node.exists() {
        return Err(Error::Kvm(format!("{} not available", node.display())));
    }

    let node_c = CString::new(node.as_os_str().as_bytes())
        .map_err(|e| Error::Kvm(format!("invalid device path {}: {e}", node.display())))?;
    let kvm = Kvm::new_with_path(&node_c)
        .map_err(|e| Error::Kvm(format!("failed to open {}: {e}", node.display())))?;

    let api = kvm.get_api_version();
    if api != KVM_API_VERSION {
        return Err(Error::Kvm(format!("unexpected KVM API version {api}")));
    }
    if !kvm.check_extension(Cap::Irqchip) {
        return Err(Error::Kvm("missing KVM capability: IRQCHIP".to_string()));
    }
    if !kvm.check_extension(Cap::UserMemory) {
        return Err(Error::Kvm("missing KVM capability: USER_MEMORY".to_string()));
    }
    kvm.create_vm()
        .map_err(|e| Error::Kvm(format!("failed to create KVM VM: {e}")))?;

    tracing::debug!("{} is usable", node.display());
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn require_kvm_usable(_paths: &HostPaths) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_missing_device_node() {
        let paths = HostPaths {
            kvm_device: "/nonexistent/kvm".into(),
            ..HostPaths::default()
        };
        let err = require_kvm_usable(&paths).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/kvm not available"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_override_node_is_opened() {
        // opens fine but answers no KVM ioctls
        let paths = HostPaths {
            kvm_device: "/dev/null".into(),
            ..HostPaths::default()
        };
        let err = require_kvm_usable(&paths).unwrap_err();
        assert!(matches!(err, crate::Error::Kvm(_)));
        assert!(!err.to_string().contains("not available"));
    }

    #[test]
    #[ignore = "requires /dev/kvm"]
    fn test_host_kvm_usable() {
        require_kvm_usable(&HostPaths::default()).unwrap();
    }
}
