use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Line sink for a dump file, optionally gzip-compressed.
pub enum DumpWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl DumpWriter {
    /// Truncates or creates `path`.
    pub fn create(path: &Path, compress: bool) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(if compress {
            DumpWriter::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            DumpWriter::Plain(file)
        })
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let out: &mut dyn Write = match self {
            DumpWriter::Plain(w) => w,
            DumpWriter::Gzip(w) => w,
        };
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")
    }

    /// Write the gzip trailer, flush and sync to disk.
    pub fn finish(self) -> io::Result<()> {
        let mut file = match self {
            DumpWriter::Plain(w) => w,
            DumpWriter::Gzip(w) => w.finish()?,
        };
        file.flush()?;
        file.get_ref().sync_all()
    }
}

/// Open a dump for line reading, transparently decompressing gzip content.
pub fn open_dump_reader(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(File::open(path)?);
    let compressed = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Remove a file if it exists. Missing files are not an error.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<String> {
        open_dump_reader(path).unwrap().lines().collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn writes_plain_and_gzip_streams() {
        let dir = tempfile::tempdir().unwrap();
        for compress in [false, true] {
            let path = dir.path().join(format!("dump-{compress}.sql"));
            let mut writer = DumpWriter::create(&path, compress).unwrap();
            writer.write_line("-- header").unwrap();
            writer.write_line("SELECT 1;").unwrap();
            writer.finish().unwrap();

            let raw = fs::read(&path).unwrap();
            assert_eq!(raw.starts_with(&GZIP_MAGIC), compress);
            assert_eq!(read_lines(&path), ["-- header", "SELECT 1;"]);
        }
    }

    #[test]
    fn create_truncates_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.sql");
        fs::write(&path, "old content that is longer\n").unwrap();
        let mut writer = DumpWriter::create(&path, false).unwrap();
        writer.write_line("new").unwrap();
        writer.finish().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn removing_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_if_exists(&dir.path().join("nope")).is_ok());
    }

    #[test]
    fn normalizes_paths_lexically() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("../../a/b/..")), PathBuf::from("../../a"));
        assert_eq!(normalize_path(Path::new("a/b/")), PathBuf::from("a/b"));
    }
}
