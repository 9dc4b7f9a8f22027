// Archive module: owns the directory of downloaded comic files and the
// caption index stored alongside them. The directory listing is cached in
// memory and recomputed only after something changes it.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::api::ComicMetadata;

/// Name of the caption index file inside the archive directory. One line
/// per archived comic, `<filename>|<caption>`. Excluded from listings.
const CAPTION_INDEX: &str = ".captions.txt";

pub struct Archive {
    dir: PathBuf,
    // None marks the listing as stale; it is rebuilt on the next read.
    listing: Option<Vec<String>>,
}

impl Archive {
    /// Open the archive in its default location under the data root.
    pub fn from_env() -> Result<Self> {
        Self::open(crate::data_root().join("comics"))
    }

    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).context("Failed to create archive directory")?;
        Ok(Archive { dir, listing: None })
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Sorted filenames currently archived. Zero-padded numbers make the
    /// lexicographic sort equal to numeric order.
    pub fn listing(&mut self) -> Result<&[String]> {
        if self.listing.is_none() {
            let mut names = Vec::new();
            for entry in fs::read_dir(&self.dir).context("Failed to read archive directory")? {
                let name = entry?.file_name().to_string_lossy().into_owned();
                if name != CAPTION_INDEX {
                    names.push(name);
                }
            }
            names.sort();
            self.listing = Some(names);
        }
        Ok(self.listing.as_deref().unwrap_or_default())
    }

    pub fn invalidate(&mut self) {
        self.listing = None;
    }

    /// Find the archived filename for a comic number by its zero-padded
    /// prefix. Linear scan; the archive is at most a few thousand entries.
    pub fn find(&mut self, num: u32) -> Result<Option<String>> {
        let prefix = format!("{num:04}");
        Ok(self
            .listing()?
            .iter()
            .find(|name| name.split('-').next() == Some(prefix.as_str()))
            .cloned())
    }

    /// First ten entries of the listing, or all of them if fewer.
    pub fn head(&mut self) -> Result<Vec<String>> {
        Ok(self.listing()?.iter().take(10).cloned().collect())
    }

    /// Last ten entries of the listing, or all of them if fewer.
    pub fn tail(&mut self) -> Result<Vec<String>> {
        let listing = self.listing()?;
        let skip = listing.len().saturating_sub(10);
        Ok(listing[skip..].to_vec())
    }

    /// Persist a downloaded comic: caption index entry first, then the
    /// image bytes. If the target file already exists nothing is written,
    /// which also keeps the caption index free of duplicate entries.
    /// Returns the derived filename either way.
    pub fn store(&mut self, meta: &ComicMetadata, image: &[u8]) -> Result<String> {
        let filename = filename_for(&meta.title, meta.num, &meta.img);
        let path = self.dir.join(&filename);
        if path.exists() {
            log::debug!("{filename} already archived, skipping write");
            return Ok(filename);
        }
        self.append_caption(&filename, &meta.alt)?;
        fs::write(&path, image).with_context(|| format!("Failed to write {filename}"))?;
        self.invalidate();
        Ok(filename)
    }

    fn append_caption(&self, filename: &str, caption: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(CAPTION_INDEX))
            .context("Failed to open caption index")?;
        writeln!(file, "{filename}|{caption}")?;
        Ok(())
    }

    /// Look up the caption recorded for an archived filename.
    pub fn caption_for(&self, filename: &str) -> Result<Option<String>> {
        let path = self.dir.join(CAPTION_INDEX);
        if !path.exists() {
            return Ok(None);
        }
        let index = fs::read_to_string(path).context("Failed to read caption index")?;
        for line in index.lines() {
            if let Some((name, caption)) = line.split_once('|') {
                if name == filename {
                    return Ok(Some(caption.to_string()));
                }
            }
        }
        Ok(None)
    }

    /// Delete every archived file, caption index included, and mark the
    /// listing stale so the next read sees the empty directory.
    pub fn wipe(&mut self) -> Result<()> {
        crate::clear_dir(&self.dir)?;
        self.invalidate();
        Ok(())
    }
}

/// Derive the archive filename for a comic: zero-padded number, title with
/// `(`, `)`, `/` and spaces stripped, extension taken from the image URL
/// (falling back to png when the URL carries no usable one).
pub fn filename_for(title: &str, num: u32, image_url: &str) -> String {
    let title: String = title
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '/' | ' '))
        .collect();
    format!("{num:04}-{title}.{}", extension_of(image_url))
}

fn extension_of(image_url: &str) -> &str {
    image_url
        .rsplit('.')
        .next()
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or("png")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(num: u32, title: &str) -> ComicMetadata {
        ComicMetadata {
            num,
            title: title.into(),
            img: format!("https://example.com/comics/{num}.png"),
            alt: format!("alt text for {num}"),
        }
    }

    fn open_temp() -> (tempfile::TempDir, Archive) {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path().to_path_buf()).unwrap();
        (dir, archive)
    }

    #[test]
    fn filename_strips_bad_characters() {
        let name = filename_for("Duty Calls (again)/", 386, "https://example.com/duty.png");
        assert_eq!(name, "0386-DutyCallsagain.png");
        for bad in ['(', ')', '/', ' '] {
            assert!(!name.contains(bad));
        }
    }

    #[test]
    fn filename_is_deterministic() {
        let a = filename_for("Exploits of a Mom", 327, "https://example.com/mom.png");
        let b = filename_for("Exploits of a Mom", 327, "https://example.com/mom.png");
        assert_eq!(a, b);
        assert_eq!(a, "0327-ExploitsofaMom.png");
    }

    #[test]
    fn extension_comes_from_the_image_url() {
        assert_eq!(extension_of("https://example.com/pic.jpeg"), "jpeg");
        assert_eq!(extension_of("https://example.com/pic.gif"), "gif");
        // No usable extension in the URL.
        assert_eq!(extension_of("https://example.com/pic"), "png");
        assert_eq!(extension_of("https://example.com/a.b/pic"), "png");
    }

    #[test]
    fn store_then_find() {
        let (_dir, mut archive) = open_temp();
        let filename = archive.store(&meta(42, "Geico"), b"image bytes").unwrap();
        assert_eq!(archive.find(42).unwrap().as_deref(), Some(filename.as_str()));
        assert!(archive.find(43).unwrap().is_none());
    }

    #[test]
    fn store_is_idempotent_and_keeps_one_caption_entry() {
        let (dir, mut archive) = open_temp();
        let first = archive.store(&meta(42, "Geico"), b"image bytes").unwrap();
        let second = archive.store(&meta(42, "Geico"), b"other bytes").unwrap();
        assert_eq!(first, second);
        // The original bytes survive and the index holds a single line.
        assert_eq!(fs::read(dir.path().join(&first)).unwrap(), b"image bytes");
        let index = fs::read_to_string(dir.path().join(CAPTION_INDEX)).unwrap();
        assert_eq!(index.lines().count(), 1);
    }

    #[test]
    fn listing_excludes_the_caption_index_and_sorts() {
        let (_dir, mut archive) = open_temp();
        for num in [12, 3, 7] {
            archive.store(&meta(num, "Title"), b"x").unwrap();
        }
        let names: Vec<&str> = archive.listing().unwrap().iter().map(String::as_str).collect();
        assert_eq!(names, ["0003-Title.png", "0007-Title.png", "0012-Title.png"]);
    }

    #[test]
    fn head_and_tail_return_everything_when_short() {
        let (_dir, mut archive) = open_temp();
        for num in 1..=3 {
            archive.store(&meta(num, "Title"), b"x").unwrap();
        }
        assert_eq!(archive.head().unwrap().len(), 3);
        assert_eq!(archive.tail().unwrap(), archive.head().unwrap());
    }

    #[test]
    fn head_and_tail_cap_at_ten() {
        let (_dir, mut archive) = open_temp();
        for num in 1..=12 {
            archive.store(&meta(num, "Title"), b"x").unwrap();
        }
        let head = archive.head().unwrap();
        let tail = archive.tail().unwrap();
        assert_eq!(head.len(), 10);
        assert_eq!(tail.len(), 10);
        assert_eq!(head[0], "0001-Title.png");
        assert_eq!(tail[9], "0012-Title.png");
    }

    #[test]
    fn caption_lookup_by_exact_filename() {
        let (_dir, mut archive) = open_temp();
        let filename = archive.store(&meta(614, "Woodpecker"), b"x").unwrap();
        assert_eq!(
            archive.caption_for(&filename).unwrap().as_deref(),
            Some("alt text for 614")
        );
        assert!(archive.caption_for("0615-Other.png").unwrap().is_none());
    }

    #[test]
    fn wipe_empties_the_archive() {
        let (dir, mut archive) = open_temp();
        archive.store(&meta(42, "Geico"), b"x").unwrap();
        archive.wipe().unwrap();
        assert!(archive.find(42).unwrap().is_none());
        assert!(archive.listing().unwrap().is_empty());
        assert!(!dir.path().join(CAPTION_INDEX).exists());
    }
}
