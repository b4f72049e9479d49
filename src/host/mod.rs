//! Host virtualization capability probe
//!
//! Every entry point takes a [`HostPaths`] naming the information
//! sources to read, so tests can point the probe at fixture files.
//!
//! ```no_run
//! use vmlaunch::host::{self, HostPaths};
//!
//! let paths = HostPaths::default();
//! match host::host_is_vm_capable(&paths) {
//!     Ok(()) => println!("hardware virtualization available"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod cpu;
pub mod info;
pub mod kvm;
pub mod modules;

pub use cpu::{
    block_details, check_cpu_attribs, check_cpu_flags, cpu_details, cpu_flags, cpu_info,
    find_anchored_string, CpuFlags,
};
pub use info::{distro_details, kernel_version, Distro};
pub use kvm::require_kvm_usable;
pub use modules::{check_kernel_modules, have_kernel_module, module_parameter, KernelModule};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, Result};

/// Locations the probe reads host information from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub cpuinfo: PathBuf,
    pub sys_module_dir: PathBuf,
    /// Command run as `CMD <module>`; success means the module is known
    pub modinfo_cmd: PathBuf,
    pub proc_version: PathBuf,
    pub os_release: PathBuf,
    pub os_release_fallback: PathBuf,
    pub kvm_device: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            cpuinfo: PathBuf::from("/proc/cpuinfo"),
            sys_module_dir: PathBuf::from("/sys/module"),
            modinfo_cmd: PathBuf::from("modinfo"),
            proc_version: PathBuf::from("/proc/version"),
            os_release: PathBuf::from("/etc/os-release"),
            os_release_fallback: PathBuf::from("/usr/lib/os-release"),
            kvm_device: PathBuf::from("/dev/kvm"),
        }
    }
}

pub const VENDOR_INTEL: &str = "GenuineIntel";
pub const VENDOR_AMD: &str = "AuthenticAMD";

/// What a host with a given CPU vendor needs for hardware virtualization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuPolicy {
    pub vendor_id: String,
    /// `(attribute, description)` pairs that must appear as words in the CPU info block
    pub attributes: Vec<(String, String)>,
    /// `(flag, description)` pairs, checked in order
    pub flags: Vec<(String, String)>,
    pub modules: BTreeMap<String, KernelModule>,
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl CpuPolicy {
    pub fn intel() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert("kvm".to_string(), KernelModule::new("Kernel-based Virtual Machine"));
        modules.insert(
            "kvm_intel".to_string(),
            KernelModule::new("Intel KVM")
                .parameter("nested", "Y")
                .parameter("unrestricted_guest", "Y"),
        );

        Self {
            vendor_id: VENDOR_INTEL.to_string(),
            attributes: pairs(&[(VENDOR_INTEL, "Intel Architecture CPU")]),
            flags: pairs(&[
                ("lm", "64Bit CPU"),
                ("vmx", "Virtualization support"),
                ("sse4_1", "SSE4.1"),
            ]),
            modules,
        }
    }

    pub fn amd() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert("kvm".to_string(), KernelModule::new("Kernel-based Virtual Machine"));
        modules.insert(
            "kvm_amd".to_string(),
            KernelModule::new("AMD KVM").parameter("nested", "1"),
        );

        Self {
            vendor_id: VENDOR_AMD.to_string(),
            attributes: pairs(&[(VENDOR_AMD, "AMD Architecture CPU")]),
            flags: pairs(&[
                ("lm", "64Bit CPU"),
                ("svm", "Virtualization support"),
                ("sse4_1", "SSE4.1"),
            ]),
            modules,
        }
    }

    /// Built-in policy for `vendor_id`, if there is one.
    pub fn for_vendor(vendor_id: &str) -> Option<Self> {
        match vendor_id {
            VENDOR_INTEL => Some(Self::intel()),
            VENDOR_AMD => Some(Self::amd()),
            _ => None,
        }
    }
}

/// Evaluate `policy` against the host.
///
/// CPU attributes and flags are checked before kernel modules; the first
/// unmet requirement is returned.
pub fn check_host(paths: &HostPaths, policy: &CpuPolicy) -> Result<()> {
    check_block(paths, &cpu_info(&paths.cpuinfo)?, policy)
}

fn check_block(paths: &HostPaths, block: &str, policy: &CpuPolicy) -> Result<()> {
    check_cpu_attribs(block, &policy.attributes)?;
    check_cpu_flags(&cpu_flags(block), &policy.flags)?;
    check_kernel_modules(paths, &policy.modules)?;

    Ok(())
}

/// Pick the policy for the host's CPU vendor and evaluate it.
///
/// The CPU info block must name both the vendor and the model.
pub fn host_is_vm_capable(paths: &HostPaths) -> Result<()> {
    let block = cpu_info(&paths.cpuinfo)?;
    let (vendor, model) = cpu::block_details(&block)?;
    debug!("cpu {} ({})", model, vendor);

    let policy = CpuPolicy::for_vendor(&vendor).ok_or(Error::UnsupportedCpuVendor(vendor))?;
    debug!("using {} capability policy", policy.vendor_id);

    check_block(paths, &block, &policy)?;
    info!("host is capable of hardware virtualization");
    Ok(())
}

/// Summary of the host, as printed by `vmlaunch check`.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub kernel_version: Option<String>,
    pub distro: Option<Distro>,
    pub capable: bool,
    /// Why the host is not capable
    pub reason: Option<String>,
}

impl HostReport {
    /// Gather everything that can be read; unreadable facts are left empty.
    pub fn collect(paths: &HostPaths) -> Self {
        let (vendor, model) = match cpu_details(&paths.cpuinfo) {
            Ok((vendor, model)) => (Some(vendor), Some(model)),
            Err(e) => {
                debug!("cpu details unavailable: {}", e);
                (None, None)
            }
        };

        let verdict = host_is_vm_capable(paths);

        Self {
            vendor,
            model,
            kernel_version: kernel_version(paths).ok(),
            distro: distro_details(paths).ok(),
            capable: verdict.is_ok(),
            reason: verdict.err().map(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let paths = HostPaths::default();
        assert_eq!(paths.cpuinfo, PathBuf::from("/proc/cpuinfo"));
        assert_eq!(paths.sys_module_dir, PathBuf::from("/sys/module"));
        assert_eq!(paths.os_release_fallback, PathBuf::from("/usr/lib/os-release"));
    }

    #[test]
    fn test_policy_for_vendor() {
        let intel = CpuPolicy::for_vendor("GenuineIntel").unwrap();
        let flags: Vec<&str> = intel.flags.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(flags, ["lm", "vmx", "sse4_1"]);
        assert_eq!(intel.modules["kvm_intel"].parameters["nested"], "Y");
        assert_eq!(intel.modules["kvm_intel"].parameters["unrestricted_guest"], "Y");

        let amd = CpuPolicy::for_vendor("AuthenticAMD").unwrap();
        assert!(amd.flags.iter().any(|(f, _)| f == "svm"));
        assert_eq!(amd.modules["kvm_amd"].parameters["nested"], "1");

        assert!(CpuPolicy::for_vendor("").is_none());
        assert!(CpuPolicy::for_vendor("Intel").is_none());
    }

    #[test]
    fn test_missing_cpuinfo_is_not_found() {
        let paths = HostPaths {
            cpuinfo: "/nonexistent/cpuinfo".into(),
            ..HostPaths::default()
        };
        assert!(host_is_vm_capable(&paths).unwrap_err().is_not_found());

        let report = HostReport::collect(&paths);
        assert!(!report.capable);
        assert!(report.vendor.is_none());
        assert!(report.reason.is_some());
    }
}
