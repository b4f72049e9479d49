//! vmlaunch: QEMU command-line compiler and launcher
//!
//! Turns a typed machine description into the exact argument vector
//! `qemu-system-x86_64` expects, runs it with any pre-opened descriptors
//! attached, and reports the outcome with the captured standard error.
//! A separate probe checks whether the host can run KVM guests at all.
//!
//! # Key Features
//!
//! - **Typed devices**: block, network, character, serial, memory objects and 9p shares
//! - **Deterministic compilation**: fixed section order, invalid items skipped
//! - **Descriptor passing**: tap fds inherited as 3, 4, ... and referenced by `fds=`
//! - **Host probe**: CPU vendor, feature flags and KVM module parameters
//!
//! # Example: Build and Launch
//!
//! ```no_run
//! use vmlaunch::devices::{driver, BlockDevice};
//! use vmlaunch::vmm::{Config, Machine, Memory, Smp, TracingLog};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new()
//!         .name("vm0")
//!         .machine(Machine::new("pc-lite", "kvm,kernel_irqchip,nvdimm"))
//!         .memory(Memory { size: "2G".into(), slots: 8, max_mem: "4G".into() })
//!         .smp(Smp { cpus: 2, cores: 1, threads: 1, sockets: 2 })
//!         .device(BlockDevice::new(driver::VIRTIO_BLOCK, "hd0", "/var/lib/vm/root.img"));
//!
//!     if let Err(e) = vmlaunch::launch_qemu(&config, Some(&TracingLog)) {
//!         eprintln!("{}", e.stderr());
//!         return Err(e.into());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Example: Host Probe
//!
//! ```no_run
//! use vmlaunch::host::{host_is_vm_capable, HostPaths};
//!
//! host_is_vm_capable(&HostPaths::default()).expect("host cannot run KVM guests");
//! ```

pub mod devices;
pub mod error;
pub mod host;
pub mod vmm;

pub use error::{Error, Result};
pub use vmm::{launch_custom_qemu, launch_qemu, load_config, Config, QemuCommand};
