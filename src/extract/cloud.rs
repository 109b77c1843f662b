//! Detection of cloud-sync placeholder files.
//!
//! Sync clients leave small stub files in place of content that has not been
//! downloaded. Reading one "succeeds" with garbage, so such files are flagged
//! before any read is attempted.

/// Files under this size in OneDrive/Google Drive folders are stubs.
pub const PLACEHOLDER_SIZE_THRESHOLD: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncProvider {
    OneDrive,
    Dropbox,
    GoogleDrive,
    ICloud,
}

impl SyncProvider {
    pub const ALL: [SyncProvider; 4] = [
        SyncProvider::OneDrive,
        SyncProvider::Dropbox,
        SyncProvider::GoogleDrive,
        SyncProvider::ICloud,
    ];

    /// Whether `path` carries this provider's well-known folder marker.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            SyncProvider::OneDrive => path.contains("OneDrive") || path.contains("onedrive"),
            SyncProvider::Dropbox => path.contains("Dropbox") || path.contains("dropbox"),
            SyncProvider::GoogleDrive => {
                path.contains("Google Drive") || path.contains("GoogleDrive")
            }
            SyncProvider::ICloud => {
                path.contains("iCloud") || path.contains("Library/Mobile Documents")
            }
        }
    }

    /// Every sync folder the path lives in. Folders can nest, so more than
    /// one provider may match.
    pub fn detect(path: &str) -> Vec<Self> {
        Self::ALL.into_iter().filter(|p| p.matches(path)).collect()
    }

    /// Whether a file of `size` bytes is a stub for this provider.
    fn is_stub_size(&self, size: u64) -> bool {
        match self {
            SyncProvider::OneDrive | SyncProvider::GoogleDrive => size < PLACEHOLDER_SIZE_THRESHOLD,
            SyncProvider::Dropbox => size == 0,
            SyncProvider::ICloud => false,
        }
    }
}

/// Classify a file as a cloud placeholder from its path and size. Every
/// matching provider's rule applies.
pub fn is_cloud_placeholder(path: &str, size: u64) -> bool {
    let providers = SyncProvider::detect(path);
    if providers.is_empty() {
        return false;
    }

    if path.ends_with(".icloud") {
        return true;
    }

    providers.iter().any(|p| p.is_stub_size(size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onedrive_size_threshold() {
        let path = "C:/Users/me/OneDrive/Papers/paper.pdf";
        assert!(is_cloud_placeholder(path, 500));
        assert!(!is_cloud_placeholder(path, 50_000));
    }

    #[test]
    fn test_dropbox_only_flags_empty_files() {
        let path = "/home/me/Dropbox/paper.pdf";
        assert!(is_cloud_placeholder(path, 0));
        assert!(!is_cloud_placeholder(path, 10));
    }

    #[test]
    fn test_google_drive_markers() {
        assert!(is_cloud_placeholder("/Volumes/GoogleDrive/My Drive/a.pdf", 100));
        assert!(is_cloud_placeholder("/Users/me/Google Drive/a.pdf", 1023));
        assert!(!is_cloud_placeholder("/Users/me/Google Drive/a.pdf", 1024));
    }

    #[test]
    fn test_icloud_suffix() {
        let stub = "/Users/me/Library/Mobile Documents/com~apple~CloudDocs/.paper.pdf.icloud";
        assert!(is_cloud_placeholder(stub, 200_000));
        assert!(!is_cloud_placeholder(
            "/Users/me/Library/Mobile Documents/com~apple~CloudDocs/paper.pdf",
            10
        ));
    }

    #[test]
    fn test_paths_outside_sync_folders() {
        assert!(SyncProvider::detect("/data/papers/a.pdf").is_empty());
        assert!(!is_cloud_placeholder("/data/papers/a.pdf", 0));
    }

    #[test]
    fn test_nested_sync_folders_apply_every_rule() {
        let path = "/Users/me/Dropbox/Google Drive/a.pdf";
        assert_eq!(
            SyncProvider::detect(path),
            vec![SyncProvider::Dropbox, SyncProvider::GoogleDrive]
        );
        assert!(is_cloud_placeholder(path, 500));
        assert!(!is_cloud_placeholder(path, 5_000));
    }
}
