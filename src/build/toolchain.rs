//! External shader tools and the parameters passed to them.

use crate::build::BuildError;
use crate::process::ToolCommand;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// GLSL to SPIR-V compiler shipped with the Vulkan SDK.
pub const COMPILER_NAME: &str = "glslangValidator";
/// SPIR-V disassembler shipped with the Vulkan SDK.
pub const DISASSEMBLER_NAME: &str = "spirv-dis";
/// Engine reflection tool, built into the tool binaries root.
pub const REFLECTOR_NAME: &str = "SpirvShaderReflection";

/// Environment variable pointing at the Vulkan SDK.
pub const VULKAN_SDK_ENV: &str = "VULKAN_SDK";

pub const DEFAULT_TARGET_ENV: &str = "vulkan1.3";
pub const DEFAULT_GLSL_VERSION: &str = "460";

/// Time a single tool invocation may run before it is killed.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// Rendering API the shaders are compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderApi {
    #[default]
    Vulkan,
}

impl FromStr for RenderApi {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vulkan" | "vk" => Ok(RenderApi::Vulkan),
            _ => Err(BuildError::UnsupportedApi(s.to_string())),
        }
    }
}

/// Resolved tool locations and compiler parameters for one run.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Directory holding the compiler and disassembler, if one could be resolved
    compiler_dir: Option<PathBuf>,
    /// Directory holding the reflection tool; also the tools' working directory
    tools_root: PathBuf,
    target_env: String,
    glsl_version: String,
    disassemble: bool,
    timeout: Option<Duration>,
}

impl Toolchain {
    /// Resolve the toolchain.
    ///
    /// Without an explicit `compiler_dir` the Vulkan SDK's `bin` directory is used.
    /// The target environment is derived from the SDK directory name
    /// (`.../1.3.250.1/bin` gives `vulkan1.3`) unless one is given.
    pub fn resolve(
        compiler_dir: Option<PathBuf>,
        tools_root: PathBuf,
        target_env: Option<String>,
        glsl_version: Option<String>,
    ) -> Self {
        let compiler_dir = compiler_dir.or_else(sdk_bin_dir);
        let target_env = target_env
            .or_else(|| compiler_dir.as_deref().and_then(target_env_from_sdk_dir))
            .unwrap_or_else(|| DEFAULT_TARGET_ENV.to_string());

        Self {
            compiler_dir,
            tools_root,
            target_env,
            glsl_version: glsl_version.unwrap_or_else(|| DEFAULT_GLSL_VERSION.to_string()),
            disassemble: false,
            timeout: None,
        }
    }

    /// Request SPIR-V disassembly of every compiled stage.
    pub fn with_disassembly(mut self, disassemble: bool) -> Self {
        self.disassemble = disassemble;
        self
    }

    /// Kill tool invocations that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn compiler(&self) -> Option<PathBuf> {
        self.compiler_dir.as_ref().map(|dir| dir.join(executable(COMPILER_NAME)))
    }

    pub fn reflector(&self) -> PathBuf {
        self.tools_root.join(executable(REFLECTOR_NAME))
    }

    /// Disassembler path, if disassembly was requested and the tool is installed.
    pub fn disassembler(&self) -> Option<PathBuf> {
        if !self.disassemble {
            return None;
        }
        let path = self.compiler_dir.as_ref()?.join(executable(DISASSEMBLER_NAME));
        path.is_file().then_some(path)
    }

    pub fn compiler_dir(&self) -> Option<&Path> {
        self.compiler_dir.as_deref()
    }

    pub fn tools_root(&self) -> &Path {
        &self.tools_root
    }

    pub fn target_env(&self) -> &str {
        &self.target_env
    }

    pub fn glsl_version(&self) -> &str {
        &self.glsl_version
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Check that the compiler and reflection tool exist.
    pub fn verify(&self) -> Result<(), BuildError> {
        let compiler = self.compiler();
        let compiler_ok = compiler.as_deref().is_some_and(Path::is_file);
        let reflector = self.reflector();
        if compiler_ok && reflector.is_file() {
            return Ok(());
        }

        Err(BuildError::ToolingMissing {
            compiler: compiler.map(|p| p.display().to_string()).unwrap_or_else(|| {
                format!("{} (no compiler directory and {} is not set)", COMPILER_NAME, VULKAN_SDK_ENV)
            }),
            reflector: reflector.display().to_string(),
        })
    }

    /// Base command for a tool, with working directory and timeout applied.
    pub fn command(&self, program: &Path) -> ToolCommand {
        ToolCommand::new(program).current_dir(&self.tools_root).timeout(self.timeout)
    }
}

/// `$VULKAN_SDK/bin`, if the variable is set.
pub fn sdk_bin_dir() -> Option<PathBuf> {
    env::var_os(VULKAN_SDK_ENV).filter(|v| !v.is_empty()).map(|sdk| PathBuf::from(sdk).join("bin"))
}

/// Derive `vulkan<major>.<minor>` from the SDK version directory above `compiler_dir`.
pub fn target_env_from_sdk_dir(compiler_dir: &Path) -> Option<String> {
    let version = compiler_dir.parent()?.file_name()?.to_str()?;
    let mut parts = version.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    Some(format!("vulkan{}.{}", major, minor))
}

fn executable(name: &str) -> String {
    format!("{}{}", name, env::consts::EXE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_target_env_from_sdk_dir() {
        assert_eq!(
            target_env_from_sdk_dir(Path::new("/opt/VulkanSDK/1.3.250.1/bin")),
            Some("vulkan1.3".to_string())
        );
        assert_eq!(
            target_env_from_sdk_dir(Path::new("C:/VulkanSDK/1.2.198.1/Bin")),
            Some("vulkan1.2".to_string())
        );
        assert_eq!(target_env_from_sdk_dir(Path::new("/usr/bin")), None);
        assert_eq!(target_env_from_sdk_dir(Path::new("bin")), None);
    }

    #[test]
    fn test_render_api_from_str() {
        assert_eq!("vulkan".parse::<RenderApi>().unwrap(), RenderApi::Vulkan);
        assert_eq!("VK".parse::<RenderApi>().unwrap(), RenderApi::Vulkan);
        assert!(matches!("dx12".parse::<RenderApi>(), Err(BuildError::UnsupportedApi(_))));
    }

    #[test]
    fn test_explicit_settings_win() {
        let toolchain = Toolchain::resolve(
            Some(PathBuf::from("/sdk/1.2.0/bin")),
            PathBuf::from("/tools"),
            Some("vulkan1.1".to_string()),
            Some("450".to_string()),
        );
        assert_eq!(toolchain.target_env(), "vulkan1.1");
        assert_eq!(toolchain.glsl_version(), "450");
        assert_eq!(
            toolchain.compiler(),
            Some(PathBuf::from("/sdk/1.2.0/bin").join(executable(COMPILER_NAME)))
        );
        assert_eq!(toolchain.reflector(), PathBuf::from("/tools").join(executable(REFLECTOR_NAME)));
    }

    #[test]
    fn test_target_env_derived_from_compiler_dir() {
        let toolchain = Toolchain::resolve(
            Some(PathBuf::from("/sdk/1.2.198/bin")),
            PathBuf::from("/tools"),
            None,
            None,
        );
        assert_eq!(toolchain.target_env(), "vulkan1.2");
        assert_eq!(toolchain.glsl_version(), DEFAULT_GLSL_VERSION);
    }

    #[test]
    #[serial]
    fn test_compiler_dir_falls_back_to_vulkan_sdk() {
        let previous = env::var_os(VULKAN_SDK_ENV);
        env::set_var(VULKAN_SDK_ENV, "/opt/VulkanSDK/1.4.304");

        let toolchain = Toolchain::resolve(None, PathBuf::from("/tools"), None, None);
        assert_eq!(toolchain.compiler_dir(), Some(Path::new("/opt/VulkanSDK/1.4.304/bin")));
        assert_eq!(toolchain.target_env(), "vulkan1.4");

        match previous {
            Some(value) => env::set_var(VULKAN_SDK_ENV, value),
            None => env::remove_var(VULKAN_SDK_ENV),
        }
    }

    #[test]
    #[serial]
    fn test_verify_reports_missing_tools() {
        let previous = env::var_os(VULKAN_SDK_ENV);
        env::remove_var(VULKAN_SDK_ENV);

        let temp = TempDir::new().unwrap();
        let toolchain = Toolchain::resolve(None, temp.path().to_path_buf(), None, None);
        let err = toolchain.verify().unwrap_err();
        assert!(matches!(err, BuildError::ToolingMissing { .. }));
        assert!(err.to_string().contains(VULKAN_SDK_ENV));
        assert_eq!(toolchain.target_env(), DEFAULT_TARGET_ENV);

        if let Some(value) = previous {
            env::set_var(VULKAN_SDK_ENV, value);
        }
    }

    #[test]
    fn test_verify_and_disassembler_lookup() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join(executable(COMPILER_NAME)), "").unwrap();
        fs::write(temp.path().join(executable(REFLECTOR_NAME)), "").unwrap();

        let toolchain = Toolchain::resolve(Some(bin.clone()), temp.path().to_path_buf(), None, None)
            .with_disassembly(true);
        assert!(toolchain.verify().is_ok());
        assert_eq!(toolchain.disassembler(), None);

        fs::write(bin.join(executable(DISASSEMBLER_NAME)), "").unwrap();
        assert_eq!(toolchain.disassembler(), Some(bin.join(executable(DISASSEMBLER_NAME))));
        assert_eq!(toolchain.clone().with_disassembly(false).disassembler(), None);
    }
}
