//! Image path resolution: loads an [`ImageSet`] from a ZIP archive, a
//! directory of loose files, or a single raw file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use jtframe_machines::{ImageLoadError, ImageSet};

/// Resolve an image path and load its files into an [`ImageSet`].
///
/// Resolution order:
/// 1. If `path` ends with `.zip` → every file in the archive.
/// 2. If `path` is a directory → every regular file in it.
/// 3. If `path` is a file → that file alone.
///
/// With `entry` set, only that file is kept (it must exist).
pub fn load_image_set(path: &Path, entry: Option<&str>) -> Result<ImageSet, ImageLoadError> {
    let set = if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    {
        load_from_zip(path)?
    } else if path.is_dir() {
        ImageSet::from_directory(path)?
    } else if path.is_file() {
        ImageSet::from_file(path)?
    } else {
        return Err(ImageLoadError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            format!("image path not found: {}", path.display()),
        )));
    };

    match entry {
        Some(name) => {
            let data = set.require(name)?.to_vec();
            Ok(ImageSet::from_entries(vec![(name.to_string(), data)]))
        }
        None => Ok(set),
    }
}

fn zip_error(err: zip::result::ZipError) -> ImageLoadError {
    match err {
        zip::result::ZipError::Io(err) => ImageLoadError::Io(err),
        other => ImageLoadError::Io(std::io::Error::new(ErrorKind::InvalidData, other)),
    }
}

fn load_from_zip(path: &Path) -> Result<ImageSet, ImageLoadError> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?)).map_err(zip_error)?;

    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(zip_error)?;
        if !file.is_file() {
            continue;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        entries.push((file.name().to_owned(), data));
    }
    Ok(ImageSet::from_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("jtframe_image_path_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn create_test_zip(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> std::path::PathBuf {
        let zip_path = dir.join(name);
        let file = File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (fname, data) in files {
            zip.start_file(*fname, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
        zip_path
    }

    #[test]
    fn zip_archive_loads_every_file() {
        let dir = scratch_dir("zip");
        let zip_path = create_test_zip(
            &dir,
            "game.zip",
            &[("gfx.bin", &[0xAA; 16]), ("snd.bin", &[0x55; 4])],
        );

        let set = load_image_set(&zip_path, None).unwrap();
        assert_eq!(set.file_names(), vec!["gfx.bin", "snd.bin"]);
        assert_eq!(set.get("gfx.bin"), Some(&[0xAA; 16][..]));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zip_entry_selects_one_file() {
        let dir = scratch_dir("entry");
        let zip_path = create_test_zip(
            &dir,
            "game.zip",
            &[("gfx.bin", &[0xAA; 16]), ("snd.bin", &[0x55; 4])],
        );

        let set = load_image_set(&zip_path, Some("snd.bin")).unwrap();
        assert_eq!(set.file_names(), vec!["snd.bin"]);
        assert!(matches!(
            load_image_set(&zip_path, Some("missing.bin")),
            Err(ImageLoadError::MissingFile(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn loose_directory() {
        let dir = scratch_dir("loose");
        std::fs::write(dir.join("test.rom"), [0xCC; 4]).unwrap();

        let set = load_image_set(&dir, None).unwrap();
        assert_eq!(set.get("test.rom"), Some(&[0xCC; 4][..]));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn single_raw_file() {
        let dir = scratch_dir("raw");
        let path = dir.join("image.bin");
        std::fs::write(&path, [1, 2, 3]).unwrap();

        let set = load_image_set(&path, None).unwrap();
        assert_eq!(set.get("image.bin"), Some(&[1, 2, 3][..]));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_zip_is_invalid_data() {
        let dir = scratch_dir("corrupt");
        let path = dir.join("broken.zip");
        std::fs::write(&path, b"not an archive").unwrap();

        assert!(matches!(
            load_image_set(&path, None),
            Err(ImageLoadError::Io(err)) if err.kind() == ErrorKind::InvalidData
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_path_is_io_error() {
        let path = std::env::temp_dir().join("jtframe_image_path_does_not_exist.bin");
        assert!(matches!(
            load_image_set(&path, None),
            Err(ImageLoadError::Io(_))
        ));
    }
}
