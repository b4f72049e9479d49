//! Machine description, argument compilation and process launch
//!
//! A [`Config`](config::Config) is compiled into a
//! [`QemuCommand`](args::QemuCommand) which [`launch_custom_qemu`] runs
//! to completion.

pub mod args;
pub mod config;
pub mod launch;

pub use args::{ExtraFiles, QemuCommand, EXTRA_FD_BASE};
pub use config::{
    load_config, Config, Kernel, Knobs, Machine, Memory, QmpSocket, QmpSocketType, Rtc, Smp,
};
pub use launch::{launch_custom_qemu, LaunchLog, NullLog, TracingLog, DEFAULT_QEMU_BINARY};

use tracing::debug;

use crate::Result;

/// Compile `config` and run the hypervisor until it exits.
///
/// Descriptors carried by network devices are inherited by the child
/// using the numbers referenced in their `fds=` properties.
pub fn launch_qemu(config: &Config, log: Option<&dyn LaunchLog>) -> Result<()> {
    let cmd = config.compile();
    debug!(
        "compiled {} arguments, {} extra files",
        cmd.args.len(),
        cmd.files.len()
    );

    launch_custom_qemu(config.path.as_deref(), &cmd.args, cmd.files.as_slice(), log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_qemu_uses_configured_path() {
        let config = Config::new().path("/bin/false");
        let err = launch_qemu(&config, None).unwrap_err();
        assert!(matches!(err, crate::Error::Exited { .. }));
    }
}
