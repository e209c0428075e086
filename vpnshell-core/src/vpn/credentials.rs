//! Credential artifact handling
//!
//! OpenVPN reads `--auth-user-pass` credentials from a file: username on the
//! first line, password on the second. The file is created owner read/write
//! only before the process is spawned.

use crate::error::StartError;
use crate::types::Credentials;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

#[cfg(unix)]
const CREDENTIALS_MODE: u32 = 0o600;

/// Write the credential artifact, replacing any previous content
pub fn write_credentials(path: &Path, credentials: &Credentials) -> Result<(), StartError> {
    let to_error = |e: std::io::Error| StartError::CredentialWrite {
        path: path.to_string_lossy().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_error)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(CREDENTIALS_MODE);
    }

    let mut file = options.open(path).map_err(to_error)?;

    // mode() only applies on creation; tighten a pre-existing file too
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(CREDENTIALS_MODE))
            .map_err(to_error)?;
    }

    write!(
        file,
        "{}\n{}",
        credentials.username(),
        credentials.expose_password()
    )
    .map_err(to_error)?;
    file.sync_all().map_err(to_error)?;

    debug!("Credentials written to {:?}", path);
    Ok(())
}

/// Remove the credential artifact, ignoring a file that is already gone
pub fn remove_credentials(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed credentials file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove credentials file {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_credentials_content() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("auth.txt");

        write_credentials(&path, &Credentials::new("alice", "s3cret")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "alice\ns3cret");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_credentials_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("auth.txt");
        fs::write(&path, "old\nstale-password-that-is-longer").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        write_credentials(&path, &Credentials::new("bob", "pw")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read_to_string(&path).unwrap(), "bob\npw");
    }

    #[test]
    fn test_remove_missing_credentials_is_noop() {
        let temp_dir = tempdir().unwrap();
        remove_credentials(&temp_dir.path().join("missing.txt"));
    }
}
