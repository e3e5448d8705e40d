//! Unpacking of dependency archives.

use std::path::Path;

use ngstage_common::error::{Result, StageError};

/// Extracts a tar archive into `target`.
///
/// Supports plain `.tar` and gzip-compressed `.tar.gz` / `.tgz` archives.
/// `name` is the archive's file name, which decides the format.
///
/// # Errors
///
/// Returns an error for an unsupported format or if extraction fails.
pub fn extract(archive_path: &Path, name: &str, target: &Path) -> Result<()> {
    tracing::debug!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting archive"
    );

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| StageError::Io { path, source: e }
    };

    std::fs::create_dir_all(target).map_err(io_err(target))?;
    let file = std::fs::File::open(archive_path).map_err(io_err(archive_path))?;

    if is_gzip_archive(name) {
        let decoder = flate2::read::GzDecoder::new(file);
        tar::Archive::new(decoder)
            .unpack(target)
            .map_err(io_err(target))
    } else if is_tar_archive(name) {
        tar::Archive::new(file).unpack(target).map_err(io_err(target))
    } else {
        Err(StageError::Config {
            message: format!("unsupported archive format: {name}"),
        })
    }
}

fn is_gzip_archive(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

fn is_tar_archive(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".tar")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append(builder: &mut tar::Builder<impl std::io::Write>, path: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, path, data)
            .expect("failed to append data");
    }

    fn create_tar(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("nginx.tar");
        let file = std::fs::File::create(&path).expect("failed to create tar file");
        let mut builder = tar::Builder::new(file);
        append(&mut builder, "sbin/nginx", b"#!/bin/sh\n");
        builder.finish().expect("failed to finish tar");
        path
    }

    fn create_tgz(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("nginx.tgz");
        let file = std::fs::File::create(&path).expect("failed to create tgz");
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append(&mut builder, "modules/ngx_stream_module.so", b"so");
        let encoder = builder.into_inner().expect("failed to finish encoder");
        let _ = encoder.finish().expect("failed to finish gzip");
        path
    }

    #[test]
    fn extract_plain_tar() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tar_path = create_tar(dir.path());
        let target = dir.path().join("out");
        extract(&tar_path, "nginx.tar", &target).expect("extract");
        assert_eq!(
            std::fs::read_to_string(target.join("sbin/nginx")).expect("read"),
            "#!/bin/sh\n"
        );
    }

    #[test]
    fn extract_gzip_tar() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tgz = create_tgz(dir.path());
        let target = dir.path().join("out");
        extract(&tgz, "nginx-1.27.3-linux-x64.tgz", &target).expect("extract");
        assert!(target.join("modules/ngx_stream_module.so").is_file());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nginx.zip");
        std::fs::write(&path, b"PK").expect("write");
        let err = extract(&path, "nginx.zip", &dir.path().join("out")).expect_err("unsupported");
        assert!(err.to_string().contains("unsupported archive format"));
    }

    #[test]
    fn missing_archive_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(extract(&dir.path().join("missing.tar"), "missing.tar", &dir.path().join("out")).is_err());
    }
}
