//! Output files: encoding, line-ending translation, buffered writes.
//!
//! Rendered template text always uses `\n`. [`OutputFile::write_rendered`]
//! appends the trailing newline, translates `\n` to the configured
//! [`LineEnding`] and encodes the result with the configured
//! [`OutputEncoding`] before it reaches the buffered handle.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encoding of an output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    #[default]
    Utf8,
    /// UTF-8 with a byte order mark at the start of the file.
    Utf8Bom,
    Ascii,
    Latin1,
    /// Windows-1252: Latin-1 with printable characters in `0x80..=0x9F`.
    Cp1252,
}

/// Characters of Windows-1252 bytes `0x80..=0x9F`. Unassigned bytes are `None`.
#[rustfmt::skip]
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

fn cp1252_byte(ch: char) -> Option<u8> {
    match u32::from(ch) {
        code @ (0..=0x7F | 0xA0..=0xFF) => Some(code as u8),
        _ => CP1252_HIGH
            .iter()
            .position(|high| *high == Some(ch))
            .map(|offset| 0x80 + offset as u8),
    }
}

impl OutputEncoding {
    /// Encodes `text`. Characters the encoding cannot represent are an
    /// [`io::ErrorKind::InvalidData`] error.
    pub fn encode<'a>(&self, text: &'a str) -> io::Result<Cow<'a, [u8]>> {
        if matches!(self, OutputEncoding::Utf8 | OutputEncoding::Utf8Bom) || text.is_ascii() {
            return Ok(Cow::Borrowed(text.as_bytes()));
        }
        text.chars()
            .map(|ch| {
                self.encode_char(ch).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("character {:?} cannot be encoded as {}", ch, self.name()),
                    )
                })
            })
            .collect::<io::Result<Vec<u8>>>()
            .map(Cow::Owned)
    }

    fn encode_char(&self, ch: char) -> Option<u8> {
        let code = u32::from(ch);
        match self {
            OutputEncoding::Ascii if code <= 0x7F => Some(code as u8),
            OutputEncoding::Latin1 if code <= 0xFF => Some(code as u8),
            OutputEncoding::Cp1252 => cp1252_byte(ch),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputEncoding::Utf8 => "utf8",
            OutputEncoding::Utf8Bom => "utf-8-sig",
            OutputEncoding::Ascii => "ascii",
            OutputEncoding::Latin1 => "latin-1",
            OutputEncoding::Cp1252 => "cp1252",
        }
    }
}

impl FromStr for OutputEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf8" | "utf-8" => Ok(OutputEncoding::Utf8),
            "utf-8-sig" | "utf8-sig" => Ok(OutputEncoding::Utf8Bom),
            "ascii" | "us-ascii" => Ok(OutputEncoding::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(OutputEncoding::Latin1),
            "cp1252" | "windows-1252" | "win-1252" => Ok(OutputEncoding::Cp1252),
            _ => Err(ConfigError::UnknownEncoding(s.to_string())),
        }
    }
}

/// Line terminator written in place of each `\n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    CrLf,
    Lf,
    Cr,
    /// Text is written untranslated.
    Untranslated,
}

impl LineEnding {
    pub fn translate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let replacement = match self {
            LineEnding::Lf | LineEnding::Untranslated => return Cow::Borrowed(text),
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        };
        if text.contains('\n') {
            Cow::Owned(text.replace('\n', replacement))
        } else {
            Cow::Borrowed(text)
        }
    }
}

impl FromStr for LineEnding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "\r\n" => Ok(LineEnding::CrLf),
            "\n" => Ok(LineEnding::Lf),
            "\r" => Ok(LineEnding::Cr),
            "" => Ok(LineEnding::Untranslated),
            other => match other.to_ascii_uppercase().as_str() {
                "CRLF" => Ok(LineEnding::CrLf),
                "LF" => Ok(LineEnding::Lf),
                "CR" => Ok(LineEnding::Cr),
                _ => Err(ConfigError::UnknownLineEnding(s.to_string())),
            },
        }
    }
}

/// An open output file.
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    writer: BufWriter<File>,
    encoding: OutputEncoding,
    line_ending: LineEnding,
}

impl OutputFile {
    /// Creates (or truncates) the file, creating parent directories first.
    pub fn create(
        path: impl Into<PathBuf>,
        encoding: OutputEncoding,
        line_ending: LineEnding,
    ) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Self::from_file(path, file, encoding, line_ending)
    }

    /// Opens the file for appending, creating it when absent. The byte order
    /// mark is only written to an empty file.
    pub fn append(
        path: impl Into<PathBuf>,
        encoding: OutputEncoding,
        line_ending: LineEnding,
    ) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Self::from_file(path, file, encoding, line_ending)
    }

    fn from_file(
        path: PathBuf,
        file: File,
        encoding: OutputEncoding,
        line_ending: LineEnding,
    ) -> io::Result<Self> {
        let empty = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);
        if encoding == OutputEncoding::Utf8Bom && empty {
            writer.write_all(UTF8_BOM)?;
        }
        tracing::debug!(path = %path.display(), encoding = encoding.name(), "opened output file");
        Ok(Self {
            path,
            writer,
            encoding,
            line_ending,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one rendered template phase followed by a line break.
    pub fn write_rendered(&mut self, text: &str) -> io::Result<()> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        let translated = self.line_ending.translate(&line);
        let bytes = self.encoding.encode(&translated)?;
        self.writer.write_all(&bytes)
    }

    /// Flushes and closes the file.
    pub fn close(mut self) -> io::Result<()> {
        self.writer.flush()?;
        tracing::debug!(path = %self.path.display(), "closed output file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_names() {
        assert_eq!("utf8".parse::<OutputEncoding>().unwrap(), OutputEncoding::Utf8);
        assert_eq!("UTF-8".parse::<OutputEncoding>().unwrap(), OutputEncoding::Utf8);
        assert_eq!("utf-8-sig".parse::<OutputEncoding>().unwrap(), OutputEncoding::Utf8Bom);
        assert_eq!("latin_1".parse::<OutputEncoding>().unwrap(), OutputEncoding::Latin1);
        assert_eq!("ISO-8859-1".parse::<OutputEncoding>().unwrap(), OutputEncoding::Latin1);
        assert_eq!("cp1252".parse::<OutputEncoding>().unwrap(), OutputEncoding::Cp1252);
        assert_eq!("Windows-1252".parse::<OutputEncoding>().unwrap(), OutputEncoding::Cp1252);
        assert!(matches!(
            "ebcdic".parse::<OutputEncoding>(),
            Err(ConfigError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_latin1_encoding() {
        let bytes = OutputEncoding::Latin1.encode("café").unwrap();
        assert_eq!(bytes.as_ref(), b"caf\xE9");
        assert!(OutputEncoding::Latin1.encode("€").is_err());
    }

    #[test]
    fn test_cp1252_encoding() {
        let bytes = OutputEncoding::Cp1252.encode("€ 5 – café „ok“ ™").unwrap();
        assert_eq!(bytes.as_ref(), b"\x80 5 \x96 caf\xE9 \x84ok\x93 \x99");
        assert_eq!(
            OutputEncoding::Cp1252.encode("Œuvre Ÿ").unwrap().as_ref(),
            b"\x8Cuvre \x9F"
        );
        // C1 controls are not part of the code page
        assert!(OutputEncoding::Cp1252.encode("\u{0081}").is_err());
        assert!(OutputEncoding::Cp1252.encode("ā").is_err());
    }

    #[test]
    fn test_ascii_encoding() {
        assert_eq!(OutputEncoding::Ascii.encode("abc").unwrap().as_ref(), b"abc");
        let err = OutputEncoding::Ascii.encode("é").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_line_endings() {
        assert_eq!("\r\n".parse::<LineEnding>().unwrap(), LineEnding::CrLf);
        assert_eq!("lf".parse::<LineEnding>().unwrap(), LineEnding::Lf);
        assert_eq!("".parse::<LineEnding>().unwrap(), LineEnding::Untranslated);
        assert!("\t".parse::<LineEnding>().is_err());

        assert_eq!(LineEnding::CrLf.translate("a\nb\n"), "a\r\nb\r\n");
        assert_eq!(LineEnding::Cr.translate("a\nb"), "a\rb");
        assert_eq!(LineEnding::Lf.translate("a\nb"), "a\nb");
    }

    #[test]
    fn test_write_rendered_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/out.csv");
        let mut file =
            OutputFile::create(&path, OutputEncoding::default(), LineEnding::default()).unwrap();
        file.write_rendered("ID;NAME").unwrap();
        file.write_rendered("1;A\n2;B").unwrap();
        file.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"ID;NAME\r\n1;A\r\n2;B\r\n");
    }

    #[test]
    fn test_bom_and_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "stale content").unwrap();

        let mut file = OutputFile::create(&path, OutputEncoding::Utf8Bom, LineEnding::Lf).unwrap();
        file.write_rendered("x").unwrap();
        file.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"\xEF\xBB\xBFx\n");
    }

    #[test]
    fn test_append_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut file = OutputFile::create(&path, OutputEncoding::Utf8Bom, LineEnding::Lf).unwrap();
        file.write_rendered("a").unwrap();
        file.close().unwrap();
        let mut file = OutputFile::append(&path, OutputEncoding::Utf8Bom, LineEnding::Lf).unwrap();
        file.write_rendered("b").unwrap();
        file.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"\xEF\xBB\xBFa\nb\n");
    }
}
