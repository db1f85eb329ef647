//! Extension publishing: package the build output and upload it.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::ExtensionArchive;
use crate::error::PublishError;
use crate::token::AccessTokenSource;

/// Manifest describing the extension, kept at the project root.
pub const MANIFEST_FILE: &str = "elfsquadrc.yml";
/// Build output produced by the project's own build step.
pub const BUILD_DIR: &str = "dist";
/// Name of the archive written into the build directory and uploaded.
pub const ARCHIVE_FILE: &str = "dist.zip";

/// Archive bytes ready for upload.
#[derive(Debug, Clone)]
pub struct PackagedExtension {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Entry paths, for reporting.
    pub entries: Vec<String>,
}

/// Remote side of publishing.
pub trait ExtensionUploader {
    fn upload(&self, package: &PackagedExtension, access_token: Option<&str>) -> Result<(), PublishError>;
}

/// Locations of the files a publish reads and writes.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub manifest: PathBuf,
    pub build_dir: PathBuf,
}

impl ProjectLayout {
    pub fn at(root: &Path) -> Self {
        ProjectLayout {
            manifest: root.join(MANIFEST_FILE),
            build_dir: root.join(BUILD_DIR),
        }
    }

    fn archive_path(&self) -> PathBuf {
        self.build_dir.join(ARCHIVE_FILE)
    }
}

/// Build the archive for the project without contacting the network.
///
/// Requires the build directory and the manifest. The manifest is copied into
/// the build directory, any previous archive there is removed, and the fresh
/// archive is written back next to the files it contains.
pub fn package(layout: &ProjectLayout) -> Result<PackagedExtension, PublishError> {
    if !layout.build_dir.is_dir() {
        return Err(PublishError::NothingToPublish(layout.build_dir.clone()));
    }
    if !layout.manifest.is_file() {
        return Err(PublishError::MissingManifest(layout.manifest.clone()));
    }

    std::fs::copy(&layout.manifest, layout.build_dir.join(MANIFEST_FILE))?;

    let archive_path = layout.archive_path();
    if archive_path.exists() {
        debug!(path = %archive_path.display(), "removing previous archive");
        std::fs::remove_file(&archive_path)?;
    }

    let archive = ExtensionArchive::from_dir(&layout.build_dir, ARCHIVE_FILE)?;
    let bytes = archive.to_zip()?;
    std::fs::write(&archive_path, &bytes)?;
    info!(entries = archive.len(), size = bytes.len(), "extension archive built");

    Ok(PackagedExtension {
        file_name: ARCHIVE_FILE.to_string(),
        bytes,
        entries: archive.paths().map(str::to_string).collect(),
    })
}

/// Packages the extension and uploads it with the current access token.
pub struct Publisher<'a, T, U> {
    layout: ProjectLayout,
    tokens: &'a T,
    uploader: &'a U,
}

impl<'a, T: AccessTokenSource, U: ExtensionUploader> Publisher<'a, T, U> {
    pub fn new(layout: ProjectLayout, tokens: &'a T, uploader: &'a U) -> Self {
        Publisher {
            layout,
            tokens,
            uploader,
        }
    }

    /// Package then upload. Nothing is sent when packaging fails.
    ///
    /// Without a stored session the upload goes out unauthenticated and the
    /// API decides; a failed token refresh aborts before uploading.
    pub fn publish(&self) -> Result<PackagedExtension, PublishError> {
        let package = package(&self.layout)?;

        let token = self.tokens.access_token()?;
        if token.is_none() {
            warn!("not logged in, uploading without credentials");
        }

        self.uploader.upload(&package, token.as_deref())?;
        info!("extension published");
        Ok(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use std::cell::RefCell;

    struct StaticToken(Option<&'static str>);

    impl AccessTokenSource for StaticToken {
        fn access_token(&self) -> Result<Option<String>, AuthError> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct FailingToken;

    impl AccessTokenSource for FailingToken {
        fn access_token(&self) -> Result<Option<String>, AuthError> {
            Err(AuthError::Provider {
                error: "invalid_grant".into(),
                description: None,
            })
        }
    }

    #[derive(Default)]
    struct RecordingUploader {
        uploads: RefCell<Vec<(Vec<String>, Option<String>)>>,
    }

    impl ExtensionUploader for RecordingUploader {
        fn upload(&self, package: &PackagedExtension, access_token: Option<&str>) -> Result<(), PublishError> {
            self.uploads
                .borrow_mut()
                .push((package.entries.clone(), access_token.map(str::to_string)));
            Ok(())
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "name: \"demo\"\n").unwrap();
        std::fs::create_dir(dir.path().join(BUILD_DIR)).unwrap();
        std::fs::write(dir.path().join(BUILD_DIR).join("a.js"), "alert(1)").unwrap();
        std::fs::write(dir.path().join(BUILD_DIR).join("b.html"), "<p>hi</p>").unwrap();
        dir
    }

    #[test]
    fn missing_build_dir_makes_no_upload() {
        //* Given
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "name: x").unwrap();
        let uploader = RecordingUploader::default();
        let publisher = Publisher::new(ProjectLayout::at(dir.path()), &StaticToken(Some("t")), &uploader);

        //* When
        let result = publisher.publish();

        //* Then
        assert!(matches!(result, Err(PublishError::NothingToPublish(_))));
        assert!(uploader.uploads.borrow().is_empty());
    }

    #[test]
    fn missing_manifest_makes_no_upload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(BUILD_DIR)).unwrap();
        let uploader = RecordingUploader::default();
        let publisher = Publisher::new(ProjectLayout::at(dir.path()), &StaticToken(Some("t")), &uploader);

        let result = publisher.publish();

        assert!(matches!(result, Err(PublishError::MissingManifest(_))));
        assert!(uploader.uploads.borrow().is_empty());
    }

    #[test]
    fn publish_uploads_build_output_and_manifest_with_token() {
        //* Given
        let dir = project();
        let uploader = RecordingUploader::default();
        let publisher = Publisher::new(ProjectLayout::at(dir.path()), &StaticToken(Some("tok")), &uploader);

        //* When
        publisher.publish().unwrap();

        //* Then
        let uploads = uploader.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, vec!["a.js", "b.html", MANIFEST_FILE]);
        assert_eq!(uploads[0].1.as_deref(), Some("tok"));
    }

    #[test]
    fn republishing_does_not_include_previous_archive() {
        let dir = project();
        let layout = ProjectLayout::at(dir.path());

        package(&layout).unwrap();
        assert!(dir.path().join(BUILD_DIR).join(ARCHIVE_FILE).is_file());
        let second = package(&layout).unwrap();

        assert_eq!(second.entries, vec!["a.js", "b.html", MANIFEST_FILE]);
    }

    #[test]
    fn publish_without_session_uploads_unauthenticated() {
        let dir = project();
        let uploader = RecordingUploader::default();
        let publisher = Publisher::new(ProjectLayout::at(dir.path()), &StaticToken(None), &uploader);

        publisher.publish().unwrap();

        assert_eq!(uploader.uploads.borrow()[0].1, None);
    }

    #[test]
    fn refresh_failure_aborts_before_upload() {
        let dir = project();
        let uploader = RecordingUploader::default();
        let publisher = Publisher::new(ProjectLayout::at(dir.path()), &FailingToken, &uploader);

        let result = publisher.publish();

        assert!(matches!(result, Err(PublishError::Auth(_))));
        assert!(uploader.uploads.borrow().is_empty());
    }
}
