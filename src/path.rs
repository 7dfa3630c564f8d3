//! Virtual address grammar.
//!
//! ```text
//! <primary-path>[:<segment>]*
//! ```
//!
//! A `:` separates segments unless it is immediately followed by `\`, which
//! keeps Windows drive letters (`C:\...`) inside the primary path. The
//! grammar only drives display names; nesting structure comes from the
//! parent, offset and length a node is built with.

/// A parsed virtual address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath {
    raw: String,
    /// Byte ranges of the primary path followed by each segment.
    pieces: Vec<(usize, usize)>,
}

impl VirtualPath {
    /// Parse `raw` into its primary path and extension segments.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let bytes = raw.as_bytes();
        let mut pieces = Vec::new();
        let mut start = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if b == b':' && bytes.get(i + 1) != Some(&b'\\') {
                pieces.push((start, i));
                start = i + 1;
            }
        }
        pieces.push((start, bytes.len()));
        Self { raw, pieces }
    }

    /// Compose the address of a segment nested under `self`.
    pub fn join(&self, segment: &str) -> Self {
        Self::parse(format!("{}:{segment}", self.raw))
    }

    /// The full address as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The real-filesystem part of the address.
    pub fn primary(&self) -> &str {
        let (s, e) = self.pieces[0];
        &self.raw[s..e]
    }

    /// Virtual segment names following the primary path.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.pieces[1..].iter().map(|&(s, e)| &self.raw[s..e])
    }

    /// Whether the address names a nested location.
    pub fn is_nested(&self) -> bool {
        self.pieces.len() > 1
    }

    /// Display name: the last segment, or the file name of the primary path.
    pub fn name(&self) -> &str {
        let last = self.segments().last().unwrap_or_else(|| self.primary());
        file_name(last)
    }

    /// Extension of [`Self::name`], without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(i) => Some(&name[i + 1..]),
        }
    }
}

/// Final component of `path`, treating both `/` and `\` as separators.
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_letter_colon_is_kept() {
        let p = VirtualPath::parse(r"C:\game.dat:assets:texture.bin");
        assert_eq!(p.primary(), r"C:\game.dat");
        assert_eq!(p.segments().collect::<Vec<_>>(), ["assets", "texture.bin"]);
        assert!(p.is_nested());
    }

    #[test]
    fn plain_path_has_no_segments() {
        let p = VirtualPath::parse(r"C:\only.dat");
        assert_eq!(p.primary(), r"C:\only.dat");
        assert_eq!(p.segments().len(), 0);
        assert!(!p.is_nested());
    }

    #[test]
    fn name_prefers_last_segment() {
        let p = VirtualPath::parse(r"C:\dir\game.dat:assets:texture.bin");
        assert_eq!(p.name(), "texture.bin");
        assert_eq!(p.extension(), Some("bin"));

        let p = VirtualPath::parse("/data/archive.pak");
        assert_eq!(p.name(), "archive.pak");
        assert_eq!(p.extension(), Some("pak"));
    }

    #[test]
    fn extension_edge_cases() {
        assert_eq!(VirtualPath::parse("/data/README").extension(), None);
        assert_eq!(VirtualPath::parse("/data/.hidden").extension(), None);
        assert_eq!(VirtualPath::parse("/data/a.tar.gz").extension(), Some("gz"));
    }

    #[test]
    fn join_appends_segment() {
        let p = VirtualPath::parse("/data/game.dat").join("assets");
        assert_eq!(p.as_str(), "/data/game.dat:assets");
        assert_eq!(p.primary(), "/data/game.dat");
        assert_eq!(p.name(), "assets");
    }

    #[test]
    fn trailing_and_empty_segments() {
        let p = VirtualPath::parse("a.dat::b");
        assert_eq!(p.segments().collect::<Vec<_>>(), ["", "b"]);

        let p = VirtualPath::parse("a.dat:");
        assert_eq!(p.segments().collect::<Vec<_>>(), [""]);
        assert_eq!(p.name(), "");
    }
}
