//! Android Virtual Device definitions
//!
//! The AVDs used by test automation, where they are installed, and how a
//! missing one is fetched.

use andromach_cli::progress;
use andromach_core::config::EmulatorConfig;
use andromach_core::error::{Error, ErrorCode, Result, ResultExt};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use zip::ZipArchive;

/// One AVD known to the emulator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvdInfo {
    /// Value of `--version`
    pub version: &'static str,
    /// Human-readable Android release
    pub description: &'static str,
    /// Name passed to `emulator -avd`
    pub name: &'static str,
    /// Emulator arguments specific to this image
    pub extra_args: &'static [&'static str],
}

/// Every supported AVD
pub const AVDS: &[AvdInfo] = &[
    AvdInfo {
        version: "4.3",
        description: "Android 4.3",
        name: "mozemulator-4.3",
        extra_args: &["-skip-adb-auth", "-verbose", "-show-kernel"],
    },
    AvdInfo {
        version: "x86",
        description: "Android 4.2 x86",
        name: "mozemulator-x86",
        extra_args: &[
            "-skip-adb-auth",
            "-verbose",
            "-show-kernel",
            "-qemu",
            "-m",
            "1024",
            "-enable-kvm",
        ],
    },
    AvdInfo {
        version: "x86-7.0",
        description: "Android 7.0 x86/x86_64",
        name: "mozemulator-x86-7.0",
        extra_args: &[
            "-skip-adb-auth",
            "-verbose",
            "-show-kernel",
            "-ranchu",
            "-selinux",
            "permissive",
            "-memory",
            "3072",
            "-cores",
            "4",
        ],
    },
];

/// Version used when `--version` is not given
pub const DEFAULT_VERSION: &str = "x86-7.0";

/// Look up an AVD by version
pub fn avd_for_version(version: &str) -> Result<&'static AvdInfo> {
    AVDS.iter().find(|a| a.version == version).ok_or_else(|| {
        let known: Vec<&str> = AVDS.iter().map(|a| a.version).collect();
        Error::new(
            ErrorCode::InvalidInput,
            format!("Unknown Android version: {version}"),
        )
        .with_suggestion(format!("Use one of: {}", known.join(", ")))
    })
}

/// Directory holding `<name>.ini` and `<name>.avd/`
pub fn default_avd_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".andromach")
        .join("android-device")
        .join("avd")
}

/// Installed AVDs on the local machine
#[derive(Debug, Clone)]
pub struct AvdStore {
    home: PathBuf,
    archive_url: Option<String>,
}

impl AvdStore {
    /// Store rooted at `home`, fetching from `archive_url`
    pub fn new(home: impl Into<PathBuf>, archive_url: Option<String>) -> Self {
        Self {
            home: home.into(),
            archive_url,
        }
    }

    /// Store described by the `[emulator]` section
    pub fn from_config(config: &EmulatorConfig) -> Self {
        Self::new(
            config.avd_home.clone().unwrap_or_else(default_avd_home),
            config.avd_archive_url.clone(),
        )
    }

    /// AVD home directory, exported to the emulator as `ANDROID_AVD_HOME`
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Whether both the `.ini` and the `.avd` directory are present
    pub fn is_installed(&self, avd: &AvdInfo) -> bool {
        self.home.join(format!("{}.ini", avd.name)).is_file()
            && self.home.join(format!("{}.avd", avd.name)).is_dir()
    }

    /// Archive location for an AVD
    pub fn archive_url(&self, avd: &AvdInfo) -> Result<String> {
        let base = self
            .archive_url
            .as_deref()
            .ok_or_else(|| Error::missing_config("emulator.avd_archive_url"))?;
        Ok(format!("{}/{}.zip", base.trim_end_matches('/'), avd.name))
    }

    /// Download the AVD archive and install it, replacing an existing copy
    pub fn fetch_and_install(&self, avd: &AvdInfo) -> Result<()> {
        let url = self.archive_url(avd)?;
        fs::create_dir_all(&self.home)?;

        let download = tempfile::NamedTempFile::new_in(&self.home)?;
        download_to(&url, download.path()).context(format!("Fetching {url}"))?;
        self.install_archive(avd, download.path())
    }

    /// Unpack a downloaded AVD archive into the AVD home
    ///
    /// The archive holds `<name>.ini` and `<name>.avd/` at its root.
    pub fn install_archive(&self, avd: &AvdInfo, archive: &Path) -> Result<()> {
        let avd_dir = self.home.join(format!("{}.avd", avd.name));
        if avd_dir.exists() {
            fs::remove_dir_all(&avd_dir)?;
        }
        extract_zip(archive, &self.home)?;

        if !self.is_installed(avd) {
            return Err(Error::new(
                ErrorCode::AvdNotFound,
                format!("Archive for {} did not contain {}.ini and {}.avd", avd.name, avd.name, avd.name),
            ));
        }
        tracing::info!(avd = avd.name, home = %self.home.display(), "AVD installed");
        Ok(())
    }
}

/// Stream `url` to `dest`, showing a progress bar
pub fn download_to(url: &str, dest: &Path) -> Result<u64> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(None)
        .build()?;
    let mut response = client.get(url).send()?.error_for_status()?;

    let name = url.rsplit('/').next().unwrap_or(url);
    let pb = progress::download(response.content_length(), name);
    let mut file = File::create(dest)?;
    let total = match io::copy(&mut pb.wrap_read(&mut response), &mut file) {
        Ok(total) => total,
        Err(e) => {
            progress::finish_error(&pb, name);
            return Err(e.into());
        }
    };
    file.flush()?;
    progress::finish_success(&pb, name);
    tracing::debug!(url, bytes = total, "download complete");
    Ok(total)
}

/// Extract a zip archive into `dest`, rejecting entries that escape it
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|_| Error::file_not_found(archive))?;
    let mut zip = ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(Error::new(
                ErrorCode::ArchiveError,
                format!("Unsafe path in archive: {}", entry.name()),
            ));
        };
        let out = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut target = File::create(&out)?;
        io::copy(&mut entry, &mut target)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}
