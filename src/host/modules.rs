//! Kernel module presence and parameter checks

use std::collections::BTreeMap;
use std::fs;
use std::process::{Command, Stdio};

use tracing::debug;

use super::HostPaths;
use crate::{Error, Result};

/// A kernel module the host must have loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelModule {
    /// Human readable description used in diagnostics
    pub description: String,
    /// Required parameter values, keyed by parameter name
    pub parameters: BTreeMap<String, String>,
}

impl KernelModule {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Require `name` to read back as `value`.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// True if the module query command knows `module` or its sysfs directory exists.
pub fn have_kernel_module(paths: &HostPaths, module: &str) -> bool {
    let queried = Command::new(&paths.modinfo_cmd)
        .arg(module)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);

    queried || paths.sys_module_dir.join(module).exists()
}

/// Current value of `module`'s `parameter`, without the trailing newline.
pub fn module_parameter(paths: &HostPaths, module: &str, parameter: &str) -> Result<String> {
    let path = paths
        .sys_module_dir
        .join(module)
        .join("parameters")
        .join(parameter);

    let value = fs::read_to_string(&path).map_err(|e| Error::from_read(&path, e))?;
    Ok(value.trim_end().to_string())
}

/// Check every module in `modules` is present with the required parameters.
///
/// Stops at the first missing module or mismatching parameter.
pub fn check_kernel_modules(
    paths: &HostPaths,
    modules: &BTreeMap<String, KernelModule>,
) -> Result<()> {
    for (name, module) in modules {
        if !have_kernel_module(paths, name) {
            return Err(Error::MissingKernelModule {
                module: name.clone(),
                description: module.description.clone(),
            });
        }
        debug!("kernel module {} present", name);

        for (parameter, expected) in &module.parameters {
            let actual = module_parameter(paths, name, parameter)?;
            if actual != *expected {
                return Err(Error::ModuleParameter {
                    module: name.clone(),
                    parameter: parameter.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
    }

    Ok(())
}
